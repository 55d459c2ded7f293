use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::ExamStatus;

pub(crate) const COLUMNS: &str = "\
    id, title, description, pass_score, assignees, start_at, end_at, \
    status, created_by, updated_by, created_at, updated_at";

pub(crate) async fn find_by_id(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn fetch_one_by_id(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_one(executor)
        .await
}

/// Locks the exam row for the duration of the surrounding transaction.
pub(crate) async fn find_by_id_for_update(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) struct CreateExam<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub pass_score: i32,
    pub assignees: Vec<String>,
    pub start_at: Option<PrimitiveDateTime>,
    pub end_at: Option<PrimitiveDateTime>,
    pub status: ExamStatus,
    pub created_by: &'a str,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl PgExecutor<'_>,
    params: CreateExam<'_>,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, title, description, pass_score, assignees, start_at, end_at,
            status, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.pass_score)
    .bind(Json(params.assignees))
    .bind(params.start_at)
    .bind(params.end_at)
    .bind(params.status)
    .bind(params.created_by)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) struct UpdateExam {
    pub title: Option<String>,
    pub description: Option<String>,
    pub pass_score: Option<i32>,
    pub assignees: Option<Vec<String>>,
    pub start_at: Option<PrimitiveDateTime>,
    pub end_at: Option<PrimitiveDateTime>,
    pub updated_by: String,
    pub updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(
    executor: impl PgExecutor<'_>,
    id: &str,
    params: UpdateExam,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exams SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            pass_score = COALESCE($3, pass_score),
            assignees = COALESCE($4, assignees),
            start_at = COALESCE($5, start_at),
            end_at = COALESCE($6, end_at),
            updated_by = $7,
            updated_at = $8
         WHERE id = $9",
    )
    .bind(params.title)
    .bind(params.description)
    .bind(params.pass_score)
    .bind(params.assignees.map(Json))
    .bind(params.start_at)
    .bind(params.end_at)
    .bind(params.updated_by)
    .bind(params.updated_at)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn set_status(
    executor: impl PgExecutor<'_>,
    id: &str,
    status: ExamStatus,
    updated_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE exams SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(updated_at)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(
    executor: impl PgExecutor<'_>,
    id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(executor).await?;
    Ok(())
}

#[derive(Debug, Default)]
pub(crate) struct ExamListFilter {
    pub created_by_user: Option<String>,
    pub title: Option<String>,
    pub status: Option<ExamStatus>,
    pub created_from: Option<PrimitiveDateTime>,
    pub created_to: Option<PrimitiveDateTime>,
    pub creator_email: Option<String>,
}

fn push_list_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ExamListFilter) {
    builder.push(" WHERE TRUE");

    if let Some(user_id) = &filter.created_by_user {
        builder.push(" AND e.created_by = ");
        builder.push_bind(user_id.clone());
    }
    if let Some(title) = &filter.title {
        builder.push(" AND e.title ILIKE ");
        builder.push_bind(format!("%{title}%"));
    }
    if let Some(status) = filter.status {
        builder.push(" AND e.status = ");
        builder.push_bind(status);
    }
    if let Some(from) = filter.created_from {
        builder.push(" AND e.created_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = filter.created_to {
        builder.push(" AND e.created_at <= ");
        builder.push_bind(to);
    }
    if let Some(email) = &filter.creator_email {
        builder.push(" AND u.email ILIKE ");
        builder.push_bind(format!("%{email}%"));
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExamListRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) pass_score: i32,
    pub(crate) assignees: Json<Vec<String>>,
    pub(crate) start_at: Option<PrimitiveDateTime>,
    pub(crate) end_at: Option<PrimitiveDateTime>,
    pub(crate) status: ExamStatus,
    pub(crate) created_by: String,
    pub(crate) creator_email: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) question_count: i64,
}

pub(crate) async fn list_filtered(
    pool: &PgPool,
    filter: &ExamListFilter,
    skip: i64,
    limit: i64,
) -> Result<Vec<ExamListRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT e.id, e.title, e.description, e.pass_score, e.assignees,
                e.start_at, e.end_at, e.status, e.created_by,
                u.email AS creator_email, e.created_at, e.updated_at,
                (SELECT COUNT(*) FROM exam_questions eq WHERE eq.exam_id = e.id) AS question_count
         FROM exams e
         JOIN users u ON u.id = e.created_by",
    );
    push_list_filters(&mut builder, filter);

    builder.push(" ORDER BY e.updated_at DESC OFFSET ");
    builder.push_bind(skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(limit.clamp(1, 1000));

    builder.build_query_as::<ExamListRow>().fetch_all(pool).await
}

pub(crate) async fn count_filtered(
    pool: &PgPool,
    filter: &ExamListFilter,
) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM exams e JOIN users u ON u.id = e.created_by",
    );
    push_list_filters(&mut builder, filter);

    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

/// Exams visible to a candidate through the assignee list.
pub(crate) async fn list_assigned(
    pool: &PgPool,
    email: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams
         WHERE status IN ('published', 'running', 'ended')
           AND assignees @> $1
         ORDER BY created_at DESC
         OFFSET $2 LIMIT $3",
    ))
    .bind(Json(vec![email.to_string()]))
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_assigned(pool: &PgPool, email: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM exams
         WHERE status IN ('published', 'running', 'ended')
           AND assignees @> $1",
    )
    .bind(Json(vec![email.to_string()]))
    .fetch_one(pool)
    .await
}

/// Bulk time-driven advance: published exams whose window has opened start
/// running. Conditional update keeps concurrent sweeps idempotent.
pub(crate) async fn start_due_published(
    executor: impl PgExecutor<'_>,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exams SET status = 'running', updated_at = $1
         WHERE status = 'published' AND start_at IS NOT NULL AND start_at <= $1",
    )
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Bulk time-driven advance: running exams past their deadline end.
pub(crate) async fn end_due_running(
    executor: impl PgExecutor<'_>,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exams SET status = 'ended', updated_at = $1
         WHERE status = 'running' AND end_at IS NOT NULL AND end_at <= $1",
    )
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
