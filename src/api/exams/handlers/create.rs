use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::types::ExamStatus;
use crate::repositories;
use crate::schemas::exam::{ExamCreate, ExamResponse};
use crate::services::{lifecycle, reconcile};

use super::super::helpers;

pub(in crate::api::exams) async fn create_exam(
    CurrentAdmin(admin): CurrentAdmin,
    state: axum::extract::State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(axum::http::StatusCode, Json<ExamResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if let (Some(start_at), Some(end_at)) = (payload.start_at, payload.end_at) {
        if end_at <= start_at {
            return Err(ApiError::BadRequest("end_at must be after start_at".to_string()));
        }
    }

    let desired = payload
        .questions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|input| reconcile::BindingInput {
            question_id: input.question_id.clone(),
            order_index: input.order_index,
            score: input.score,
        })
        .collect::<Vec<_>>();

    if let Some(order) = reconcile::find_duplicate_order(&desired) {
        return Err(ApiError::BadRequest(format!("Duplicate question order: {order}")));
    }

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let exam_id = helpers::new_id();
    let exam = repositories::exams::create(
        &mut *tx,
        repositories::exams::CreateExam {
            id: &exam_id,
            title: &payload.title,
            description: payload.description.as_deref(),
            pass_score: payload.pass_score,
            assignees: payload.assignees.clone(),
            start_at: payload.start_at.map(to_primitive_utc),
            end_at: payload.end_at.map(to_primitive_utc),
            status: ExamStatus::Draft,
            created_by: &admin.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    if !desired.is_empty() {
        let question_ids: Vec<String> =
            desired.iter().map(|input| input.question_id.clone()).collect();
        helpers::ensure_questions_exist(&mut *tx, &question_ids).await?;

        let diff = reconcile::diff_bindings(&[], &desired);
        helpers::apply_binding_diff(&mut *tx, &exam_id, &diff).await?;
    }

    let response = helpers::exam_to_response(&mut *tx, exam).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        user_id = %admin.id,
        exam_id = %exam_id,
        action = "exam_create",
        "Exam created"
    );

    Ok((axum::http::StatusCode::CREATED, Json(response)))
}

pub(in crate::api::exams) async fn duplicate_exam(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<(axum::http::StatusCode, Json<ExamResponse>), ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    if !lifecycle::can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Only admin or exam creator can duplicate exam"));
    }

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let copy_id = helpers::new_id();
    let copy_title = format!("{} (Copy)", exam.title);
    let copy = repositories::exams::create(
        &mut *tx,
        repositories::exams::CreateExam {
            id: &copy_id,
            title: &copy_title,
            description: exam.description.as_deref(),
            pass_score: exam.pass_score,
            assignees: exam.assignees.0.clone(),
            // Schedule is reset: the copy is re-planned by its owner.
            start_at: None,
            end_at: None,
            status: ExamStatus::Draft,
            created_by: &user.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to duplicate exam"))?;

    repositories::exam_questions::copy_all(&mut *tx, &exam.id, &copy_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to copy exam questions"))?;

    let response = helpers::exam_to_response(&mut *tx, copy).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        user_id = %user.id,
        exam_id = %exam_id,
        copy_id = %copy_id,
        action = "exam_duplicate",
        "Exam duplicated"
    );

    Ok((axum::http::StatusCode::CREATED, Json(response)))
}
