use std::collections::HashMap;

use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::{AttemptOption, AttemptQuestion, ExamAttempt};
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, user_id, exam_id, status, exam_title, exam_description, pass_score, \
    start_at, end_at, score, started_at, finished_at";

const SNAPSHOT_QUESTION_COLUMNS: &str =
    "id, attempt_id, question_id, order_index, score, content, tags";
const SNAPSHOT_OPTION_COLUMNS: &str =
    "id, attempt_question_id, original_option_id, content, is_correct, is_selected";

pub(crate) async fn find_by_id(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!("SELECT {COLUMNS} FROM exam_attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_user_exam(
    executor: impl PgExecutor<'_>,
    user_id: &str,
    exam_id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE user_id = $1 AND exam_id = $2"
    ))
    .bind(user_id)
    .bind(exam_id)
    .fetch_optional(executor)
    .await
}

/// Locks the attempt row so a concurrent submit/terminate/sweep waits for the
/// surrounding transaction.
pub(crate) async fn find_by_user_exam_for_update(
    executor: impl PgExecutor<'_>,
    user_id: &str,
    exam_id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE user_id = $1 AND exam_id = $2 FOR UPDATE"
    ))
    .bind(user_id)
    .bind(exam_id)
    .fetch_optional(executor)
    .await
}

pub(crate) struct StartAttempt<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub exam_id: &'a str,
    pub exam_title: &'a str,
    pub exam_description: Option<&'a str>,
    pub pass_score: i32,
    pub start_at: Option<PrimitiveDateTime>,
    pub end_at: Option<PrimitiveDateTime>,
    pub started_at: PrimitiveDateTime,
}

/// Insert-or-refresh keyed by the (user_id, exam_id) uniqueness constraint:
/// the loser of a concurrent first start lands in the DO UPDATE branch and
/// refreshes the snapshot scalars instead of failing. Finished attempts are
/// excluded by the conflict guard, in which case no row comes back.
pub(crate) async fn upsert_start(
    executor: impl PgExecutor<'_>,
    params: StartAttempt<'_>,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "INSERT INTO exam_attempts (
            id, user_id, exam_id, status, exam_title, exam_description,
            pass_score, start_at, end_at, started_at
        ) VALUES ($1,$2,$3,'in_progress',$4,$5,$6,$7,$8,$9)
        ON CONFLICT (user_id, exam_id) DO UPDATE SET
            status = 'in_progress',
            exam_title = EXCLUDED.exam_title,
            exam_description = EXCLUDED.exam_description,
            pass_score = EXCLUDED.pass_score,
            start_at = EXCLUDED.start_at,
            end_at = EXCLUDED.end_at
        WHERE exam_attempts.finished_at IS NULL
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.exam_id)
    .bind(params.exam_title)
    .bind(params.exam_description)
    .bind(params.pass_score)
    .bind(params.start_at)
    .bind(params.end_at)
    .bind(params.started_at)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn count_snapshot_questions(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attempt_questions WHERE attempt_id = $1")
        .bind(attempt_id)
        .fetch_one(executor)
        .await
}

pub(crate) struct SnapshotQuestion<'a> {
    pub id: &'a str,
    pub attempt_id: &'a str,
    pub question_id: &'a str,
    pub order_index: i32,
    pub score: i32,
    pub content: &'a str,
    pub tags: Vec<String>,
}

pub(crate) async fn insert_snapshot_question(
    executor: impl PgExecutor<'_>,
    params: SnapshotQuestion<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attempt_questions (
            id, attempt_id, question_id, order_index, score, content, tags
        ) VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(params.id)
    .bind(params.attempt_id)
    .bind(params.question_id)
    .bind(params.order_index)
    .bind(params.score)
    .bind(params.content)
    .bind(Json(params.tags))
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) struct SnapshotOption<'a> {
    pub id: &'a str,
    pub attempt_question_id: &'a str,
    pub original_option_id: &'a str,
    pub content: &'a str,
    pub is_correct: bool,
}

pub(crate) async fn insert_snapshot_option(
    executor: impl PgExecutor<'_>,
    params: SnapshotOption<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attempt_options (
            id, attempt_question_id, original_option_id, content, is_correct, is_selected
        ) VALUES ($1,$2,$3,$4,$5,FALSE)",
    )
    .bind(params.id)
    .bind(params.attempt_question_id)
    .bind(params.original_option_id)
    .bind(params.content)
    .bind(params.is_correct)
    .execute(executor)
    .await?;
    Ok(())
}

/// Loads the full snapshot of an attempt, questions in presentation order,
/// each paired with its options.
pub(crate) async fn list_snapshot(
    conn: &mut PgConnection,
    attempt_id: &str,
) -> Result<Vec<(AttemptQuestion, Vec<AttemptOption>)>, sqlx::Error> {
    let questions = sqlx::query_as::<_, AttemptQuestion>(&format!(
        "SELECT {SNAPSHOT_QUESTION_COLUMNS} FROM attempt_questions
         WHERE attempt_id = $1 ORDER BY order_index"
    ))
    .bind(attempt_id)
    .fetch_all(&mut *conn)
    .await?;

    if questions.is_empty() {
        return Ok(Vec::new());
    }

    let question_ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let options = sqlx::query_as::<_, AttemptOption>(&format!(
        "SELECT {SNAPSHOT_OPTION_COLUMNS} FROM attempt_options
         WHERE attempt_question_id = ANY($1) ORDER BY id"
    ))
    .bind(&question_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<String, Vec<AttemptOption>> = HashMap::new();
    for option in options {
        grouped.entry(option.attempt_question_id.clone()).or_default().push(option);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let options = grouped.remove(&question.id).unwrap_or_default();
            (question, options)
        })
        .collect())
}

pub(crate) async fn clear_selections(
    executor: impl PgExecutor<'_>,
    attempt_question_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE attempt_options SET is_selected = FALSE WHERE attempt_question_id = $1")
        .bind(attempt_question_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn select_option(
    executor: impl PgExecutor<'_>,
    attempt_question_id: &str,
    original_option_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempt_options SET is_selected = TRUE
         WHERE attempt_question_id = $1 AND original_option_id = $2",
    )
    .bind(attempt_question_id)
    .bind(original_option_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn finalize_submit(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
    score: i32,
    finished_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exam_attempts SET status = 'submitted', score = $1, finished_at = $2
         WHERE id = $3",
    )
    .bind(score)
    .bind(finished_at)
    .bind(attempt_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Terminated attempts keep whatever score they had (none, normally).
pub(crate) async fn terminate(
    executor: impl PgExecutor<'_>,
    attempt_id: &str,
    finished_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exam_attempts SET status = 'terminated', finished_at = $1 WHERE id = $2",
    )
    .bind(finished_at)
    .bind(attempt_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Bulk force-submit of in-progress attempts whose exam deadline has passed.
/// Expired attempts are not graded: score is forced to 0.
pub(crate) async fn auto_submit_expired(
    executor: impl PgExecutor<'_>,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_attempts a SET status = 'submitted', score = 0, finished_at = $1
         FROM exams e
         WHERE e.id = a.exam_id
           AND a.status = 'in_progress'
           AND e.end_at IS NOT NULL
           AND e.end_at <= $1",
    )
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_by_exam(
    executor: impl PgExecutor<'_>,
    exam_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exam_attempts WHERE exam_id = $1")
        .bind(exam_id)
        .execute(executor)
        .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AttemptListRow {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) user_email: String,
    pub(crate) status: AttemptStatus,
    pub(crate) score: Option<i32>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) finished_at: Option<PrimitiveDateTime>,
}

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<AttemptListRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptListRow>(
        "SELECT a.id, a.user_id, u.email AS user_email, a.status, a.score,
                a.started_at, a.finished_at
         FROM exam_attempts a
         JOIN users u ON u.id = a.user_id
         WHERE a.exam_id = $1
         ORDER BY a.started_at DESC
         OFFSET $2 LIMIT $3",
    )
    .bind(exam_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_exam(pool: &PgPool, exam_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM exam_attempts WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(pool)
        .await
}

/// A candidate's attempts across a set of exams, for the assigned-exams view.
pub(crate) async fn find_for_user_exams(
    pool: &PgPool,
    user_id: &str,
    exam_ids: &[String],
) -> Result<Vec<ExamAttempt>, sqlx::Error> {
    if exam_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE user_id = $1 AND exam_id = ANY($2)"
    ))
    .bind(user_id)
    .bind(exam_ids)
    .fetch_all(pool)
    .await
}
