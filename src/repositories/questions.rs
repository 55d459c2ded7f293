use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::{Question, QuestionOption};

pub(crate) const COLUMNS: &str = "id, content, tags, created_at, updated_at";
const OPTION_COLUMNS: &str = "id, question_id, content, is_correct";

pub(crate) async fn find_by_id(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn fetch_one_by_id(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_one(executor)
        .await
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

/// Subset of `ids` that actually exists in the bank.
pub(crate) async fn filter_existing_ids(
    executor: impl PgExecutor<'_>,
    ids: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_scalar::<_, String>("SELECT id FROM questions WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(executor)
        .await
}

pub(crate) async fn list_options(
    executor: impl PgExecutor<'_>,
    question_id: &str,
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options WHERE question_id = $1 ORDER BY id"
    ))
    .bind(question_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_options_for_questions(
    executor: impl PgExecutor<'_>,
    question_ids: &[String],
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    if question_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options WHERE question_id = ANY($1) ORDER BY id"
    ))
    .bind(question_ids)
    .fetch_all(executor)
    .await
}

pub(crate) struct CreateQuestion<'a> {
    pub id: &'a str,
    pub content: &'a str,
    pub tags: Vec<String>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (id, content, tags, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.content)
    .bind(Json(params.tags))
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) struct CreateOption<'a> {
    pub id: &'a str,
    pub question_id: &'a str,
    pub content: &'a str,
    pub is_correct: bool,
}

pub(crate) async fn create_option(
    executor: impl PgExecutor<'_>,
    params: CreateOption<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO question_options (id, question_id, content, is_correct)
         VALUES ($1,$2,$3,$4)",
    )
    .bind(params.id)
    .bind(params.question_id)
    .bind(params.content)
    .bind(params.is_correct)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) struct UpdateQuestion {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(
    executor: impl PgExecutor<'_>,
    id: &str,
    params: UpdateQuestion,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE questions SET
            content = COALESCE($1, content),
            tags = COALESCE($2, tags),
            updated_at = $3
         WHERE id = $4",
    )
    .bind(params.content)
    .bind(params.tags.map(Json))
    .bind(params.updated_at)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn update_option(
    executor: impl PgExecutor<'_>,
    question_id: &str,
    option_id: &str,
    content: &str,
    is_correct: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE question_options SET content = $1, is_correct = $2
         WHERE id = $3 AND question_id = $4",
    )
    .bind(content)
    .bind(is_correct)
    .bind(option_id)
    .bind(question_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn delete_options(
    executor: impl PgExecutor<'_>,
    question_id: &str,
    option_ids: &[String],
) -> Result<(), sqlx::Error> {
    if option_ids.is_empty() {
        return Ok(());
    }

    sqlx::query("DELETE FROM question_options WHERE question_id = $1 AND id = ANY($2)")
        .bind(question_id)
        .bind(option_ids)
        .execute(executor)
        .await?;
    Ok(())
}

/// Deletes the question; options cascade at the database level. Attempt
/// snapshots keep their copies.
pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
