use axum::{extract::Query, Json};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::PaginatedResponse;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, to_primitive_utc};
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::attempt::{
    attempt_question_details, AttemptDetailResponse, AttemptUserView,
};
use crate::schemas::exam::{status_options, ExamStatusOption, ExamSummaryResponse};
use crate::services::lifecycle;

use super::super::queries::{ListAttemptsQuery, ListExamsQuery};

pub(in crate::api::exams) async fn list_exams(
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Query(params): Query<ListExamsQuery>,
) -> Result<Json<PaginatedResponse<ExamSummaryResponse>>, ApiError> {
    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 1000);

    let filter = repositories::exams::ExamListFilter {
        // Non-admin callers only see the exams they created.
        created_by_user: match user.role {
            UserRole::Admin => None,
            _ => Some(user.id.clone()),
        },
        title: params.title.clone(),
        status: params.status,
        created_from: params.start_date.map(to_primitive_utc),
        created_to: params.end_date.map(to_primitive_utc),
        creator_email: params.created_by.clone(),
    };

    let rows = repositories::exams::list_filtered(state.db(), &filter, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;
    let total_count = repositories::exams::count_filtered(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count exams"))?;

    let items = rows
        .into_iter()
        .map(|row| ExamSummaryResponse {
            id: row.id,
            title: row.title,
            description: row.description,
            pass_score: row.pass_score,
            assignees: row.assignees.0,
            start_at: row.start_at.map(format_primitive),
            end_at: row.end_at.map(format_primitive),
            status: row.status,
            created_by: row.created_by,
            creator_email: row.creator_email,
            created_at: format_primitive(row.created_at),
            updated_at: format_primitive(row.updated_at),
            question_count: row.question_count,
        })
        .collect();

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

pub(in crate::api::exams) async fn list_statuses() -> Json<Vec<ExamStatusOption>> {
    Json(status_options())
}

pub(in crate::api::exams) async fn list_exam_attempts(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Query(params): Query<ListAttemptsQuery>,
) -> Result<Json<PaginatedResponse<AttemptDetailResponse>>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    if !lifecycle::can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Only admin or exam creator can view attempts"));
    }

    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 1000);

    let rows = repositories::attempts::list_by_exam(state.db(), &exam_id, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;
    let total_count = repositories::attempts::count_by_exam(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    let mut conn = state
        .db()
        .acquire()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire connection"))?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let snapshot = repositories::attempts::list_snapshot(&mut conn, &row.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load attempt snapshot"))?;

        items.push(AttemptDetailResponse {
            id: row.id,
            user: AttemptUserView { id: row.user_id, email: row.user_email },
            status: row.status,
            score: row.score,
            started_at: format_primitive(row.started_at),
            finished_at: row.finished_at.map(format_primitive),
            questions: attempt_question_details(&snapshot),
        });
    }

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}
