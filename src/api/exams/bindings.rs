use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::db::models::Exam;
use crate::repositories;
use crate::schemas::exam::{ExamQuestionInput, ExamQuestionsReplace, ExamQuestionView};
use crate::services::{lifecycle, reconcile};

use super::helpers;

pub(super) async fn list_bindings(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let _exam = fetch_managed_exam(&state, &user, &exam_id).await?;

    let mut conn = state
        .db()
        .acquire()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire connection"))?;
    let items = helpers::fetch_bindings(&mut conn, &exam_id).await?;

    Ok(Json(binding_list_body(items)))
}

/// Diff-applying batch replace: order/score updates, attaches and detaches
/// all land in one transaction.
pub(super) async fn replace_bindings(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Json(payload): Json<ExamQuestionsReplace>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let exam = fetch_managed_exam(&state, &user, &exam_id).await?;
    if !lifecycle::can_edit(exam.status) {
        return Err(ApiError::BadRequest("Cannot edit an exam that has ended".to_string()));
    }

    let desired: Vec<reconcile::BindingInput> = payload
        .questions
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

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let question_ids: Vec<String> =
        desired.iter().map(|input| input.question_id.clone()).collect();
    helpers::ensure_questions_exist(&mut *tx, &question_ids).await?;

    let existing = repositories::exam_questions::list_question_ids(&mut *tx, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam questions"))?;

    let diff = reconcile::diff_bindings(&existing, &desired);
    helpers::apply_binding_diff(&mut *tx, &exam_id, &diff).await?;

    let items = helpers::fetch_bindings(&mut *tx, &exam_id).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        user_id = %user.id,
        exam_id = %exam_id,
        updated = diff.to_update.len(),
        attached = diff.to_attach.len(),
        detached = diff.to_detach.len(),
        action = "exam_questions_replace",
        "Exam questions reconciled"
    );

    Ok(Json(binding_list_body(items)))
}

pub(super) async fn attach_question(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Json(payload): Json<ExamQuestionInput>,
) -> Result<(axum::http::StatusCode, Json<serde_json::Value>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let exam = fetch_managed_exam(&state, &user, &exam_id).await?;
    if !lifecycle::can_edit(exam.status) {
        return Err(ApiError::BadRequest("Cannot edit an exam that has ended".to_string()));
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    helpers::ensure_questions_exist(&mut *tx, std::slice::from_ref(&payload.question_id)).await?;

    let existing = repositories::exam_questions::list_question_ids(&mut *tx, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam questions"))?;

    if existing.iter().any(|question_id| question_id == &payload.question_id) {
        return Err(ApiError::Conflict("Question is already attached to this exam".to_string()));
    }

    repositories::exam_questions::attach(
        &mut *tx,
        &exam_id,
        &payload.question_id,
        payload.order_index,
        payload.score.unwrap_or(reconcile::DEFAULT_BINDING_SCORE),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to attach exam question"))?;

    let items = helpers::fetch_bindings(&mut *tx, &exam_id).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok((axum::http::StatusCode::CREATED, Json(binding_list_body(items))))
}

pub(super) async fn detach_question(
    axum::extract::Path((exam_id, question_id)): axum::extract::Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<axum::http::StatusCode, ApiError> {
    let exam = fetch_managed_exam(&state, &user, &exam_id).await?;
    if !lifecycle::can_edit(exam.status) {
        return Err(ApiError::BadRequest("Cannot edit an exam that has ended".to_string()));
    }

    let detached = repositories::exam_questions::detach(state.db(), &exam_id, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to detach exam question"))?;

    if !detached {
        return Err(ApiError::NotFound("Question is not attached to this exam".to_string()));
    }

    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn fetch_managed_exam(
    state: &AppState,
    user: &crate::db::models::User,
    exam_id: &str,
) -> Result<Exam, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    };

    if !lifecycle::can_manage_exam(user, &exam) {
        return Err(ApiError::Forbidden("Only admin or exam creator can manage exam questions"));
    }

    Ok(exam)
}

fn binding_list_body(items: Vec<ExamQuestionView>) -> serde_json::Value {
    let total = items.len();
    serde_json::json!({ "items": items, "total": total })
}
