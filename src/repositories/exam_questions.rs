use sqlx::PgExecutor;

use crate::db::models::ExamQuestion;

const COLUMNS: &str = "exam_id, question_id, order_index, score";

pub(crate) async fn list_by_exam(
    executor: impl PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<ExamQuestion>, sqlx::Error> {
    sqlx::query_as::<_, ExamQuestion>(&format!(
        "SELECT {COLUMNS} FROM exam_questions WHERE exam_id = $1 ORDER BY order_index"
    ))
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_question_ids(
    executor: impl PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT question_id FROM exam_questions WHERE exam_id = $1 ORDER BY order_index",
    )
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn count_by_exam(
    executor: impl PgExecutor<'_>,
    exam_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM exam_questions WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(executor)
        .await
}

pub(crate) async fn attach(
    executor: impl PgExecutor<'_>,
    exam_id: &str,
    question_id: &str,
    order_index: i32,
    score: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_questions (exam_id, question_id, order_index, score)
         VALUES ($1,$2,$3,$4)",
    )
    .bind(exam_id)
    .bind(question_id)
    .bind(order_index)
    .bind(score)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn update_binding(
    executor: impl PgExecutor<'_>,
    exam_id: &str,
    question_id: &str,
    order_index: i32,
    score: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exam_questions SET order_index = $1, score = $2
         WHERE exam_id = $3 AND question_id = $4",
    )
    .bind(order_index)
    .bind(score)
    .bind(exam_id)
    .bind(question_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn detach(
    executor: impl PgExecutor<'_>,
    exam_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM exam_questions WHERE exam_id = $1 AND question_id = $2")
            .bind(exam_id)
            .bind(question_id)
            .execute(executor)
            .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_by_exam(
    executor: impl PgExecutor<'_>,
    exam_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exam_questions WHERE exam_id = $1")
        .bind(exam_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Copies every binding of `from_exam_id` onto `to_exam_id`, preserving order
/// and score. Used by exam duplication.
pub(crate) async fn copy_all(
    executor: impl PgExecutor<'_>,
    from_exam_id: &str,
    to_exam_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO exam_questions (exam_id, question_id, order_index, score)
         SELECT $2, question_id, order_index, score FROM exam_questions WHERE exam_id = $1",
    )
    .bind(from_exam_id)
    .bind(to_exam_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
