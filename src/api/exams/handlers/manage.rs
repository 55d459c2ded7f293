use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::types::ExamStatus;
use crate::repositories;
use crate::schemas::exam::{ExamResponse, ExamUpdate};
use crate::services::events::DomainEvent;
use crate::services::{lifecycle, reconcile};

use super::super::helpers;

pub(in crate::api::exams) async fn get_exam(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    if !lifecycle::can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Access denied"));
    }

    let mut conn = state
        .db()
        .acquire()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire connection"))?;
    let response = helpers::exam_to_response(&mut conn, exam).await?;

    Ok(Json(response))
}

pub(in crate::api::exams) async fn update_exam(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<ExamResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let exam = repositories::exams::find_by_id_for_update(&mut *tx, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    if !lifecycle::can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Only admin or exam creator can edit exam"));
    }

    if !lifecycle::can_edit(exam.status) {
        return Err(ApiError::BadRequest("Cannot edit an exam that has ended".to_string()));
    }

    let effective_start = payload.start_at.map(to_primitive_utc).or(exam.start_at);
    let effective_end = payload.end_at.map(to_primitive_utc).or(exam.end_at);
    if let (Some(start_at), Some(end_at)) = (effective_start, effective_end) {
        if end_at <= start_at {
            return Err(ApiError::BadRequest("end_at must be after start_at".to_string()));
        }
    }

    let now = primitive_now_utc();
    repositories::exams::update(
        &mut *tx,
        &exam_id,
        repositories::exams::UpdateExam {
            title: payload.title.clone(),
            description: payload.description.clone(),
            pass_score: payload.pass_score,
            assignees: payload.assignees.clone(),
            start_at: payload.start_at.map(to_primitive_utc),
            end_at: payload.end_at.map(to_primitive_utc),
            updated_by: user.id.clone(),
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update exam"))?;

    // The question list, when supplied, is reconciled in the same transaction
    // as the scalar patch.
    if let Some(questions) = &payload.questions {
        let desired: Vec<reconcile::BindingInput> = questions
            .iter()
            .map(|input| reconcile::BindingInput {
                question_id: input.question_id.clone(),
                order_index: input.order_index,
                score: input.score,
            })
            .collect();

        if let Some(order) = reconcile::find_duplicate_order(&desired) {
            return Err(ApiError::BadRequest(format!("Duplicate question order: {order}")));
        }

        let question_ids: Vec<String> =
            desired.iter().map(|input| input.question_id.clone()).collect();
        helpers::ensure_questions_exist(&mut *tx, &question_ids).await?;

        let existing = repositories::exam_questions::list_question_ids(&mut *tx, &exam_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch exam questions"))?;

        let diff = reconcile::diff_bindings(&existing, &desired);
        helpers::apply_binding_diff(&mut *tx, &exam_id, &diff).await?;
    }

    let updated = repositories::exams::fetch_one_by_id(&mut *tx, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated exam"))?;
    let response = helpers::exam_to_response(&mut *tx, updated).await?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok(Json(response))
}

pub(in crate::api::exams) async fn delete_exam(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<axum::http::StatusCode, ApiError> {
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let exam = repositories::exams::find_by_id_for_update(&mut *tx, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    if !lifecycle::can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Only admin or exam creator can delete exam"));
    }

    if !lifecycle::can_remove(exam.status) {
        return Err(ApiError::BadRequest(format!(
            "Cannot delete exam with status {}",
            exam.status.as_str()
        )));
    }

    repositories::exam_questions::delete_by_exam(&mut *tx, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam questions"))?;
    repositories::attempts::delete_by_exam(&mut *tx, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam attempts"))?;
    repositories::exams::delete_by_id(&mut *tx, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        user_id = %user.id,
        exam_id = %exam_id,
        action = "exam_delete",
        "Exam deleted"
    );

    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub(in crate::api::exams) async fn publish_exam(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    if !lifecycle::can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Only admin or exam creator can publish"));
    }

    let question_count = repositories::exam_questions::count_by_exam(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count exam questions"))?;

    if question_count == 0 {
        return Err(ApiError::BadRequest(
            "Exam must have at least one question to be published".to_string(),
        ));
    }

    if !lifecycle::can_publish(exam.status) {
        return Err(ApiError::BadRequest(format!(
            "Cannot publish exam with status {}",
            exam.status.as_str()
        )));
    }

    set_status_and_respond(&state, &user.id, &exam_id, ExamStatus::Published, "exam_publish")
        .await
        .map(|response| {
            state.events().emit(DomainEvent::ExamPublished {
                exam_id: response.id.clone(),
                title: response.title.clone(),
            });
            Json(response)
        })
}

pub(in crate::api::exams) async fn unpublish_exam(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    if !lifecycle::can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Only admin or exam creator can unpublish"));
    }

    if !lifecycle::can_unpublish(exam.status) {
        return Err(ApiError::BadRequest(format!(
            "Cannot unpublish exam with status {}",
            exam.status.as_str()
        )));
    }

    set_status_and_respond(&state, &user.id, &exam_id, ExamStatus::Draft, "exam_unpublish")
        .await
        .map(Json)
}

pub(in crate::api::exams) async fn archive_exam(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    if !lifecycle::can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Only admin or exam creator can archive"));
    }

    if !lifecycle::can_archive(exam.status) {
        return Err(ApiError::BadRequest(format!(
            "Cannot archive exam with status {}",
            exam.status.as_str()
        )));
    }

    set_status_and_respond(&state, &user.id, &exam_id, ExamStatus::Archived, "exam_archive")
        .await
        .map(Json)
}

async fn set_status_and_respond(
    state: &AppState,
    user_id: &str,
    exam_id: &str,
    status: ExamStatus,
    action: &'static str,
) -> Result<ExamResponse, ApiError> {
    let now = primitive_now_utc();
    repositories::exams::set_status(state.db(), exam_id, status, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update exam status"))?;

    let updated = repositories::exams::fetch_one_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated exam"))?;

    let mut conn = state
        .db()
        .acquire()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire connection"))?;
    let response = helpers::exam_to_response(&mut conn, updated).await?;

    tracing::info!(
        user_id = %user_id,
        exam_id = %exam_id,
        status = status.as_str(),
        action = action,
        "Exam status changed"
    );

    Ok(response)
}
