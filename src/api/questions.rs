use axum::{routing::get, Json, Router};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::repositories;
use crate::schemas::exam::parse_offset_datetime_flexible;
use crate::schemas::question::{QuestionCreate, QuestionResponse, QuestionUpdate};
use crate::services::reconcile::{self, OptionInput};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_questions).post(create_question)).route(
        "/:question_id",
        get(get_question).patch(update_question).delete(delete_question),
    )
}

async fn list_questions(
    CurrentAdmin(_admin): CurrentAdmin,
    state: axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let questions = repositories::questions::list_all(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    let question_ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let options = repositories::questions::list_options_for_questions(state.db(), &question_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list options"))?;

    let mut grouped: std::collections::HashMap<String, Vec<_>> = std::collections::HashMap::new();
    for option in options {
        grouped.entry(option.question_id.clone()).or_default().push(option);
    }

    let mut items = Vec::with_capacity(questions.len());
    for question in questions {
        let own_options = grouped.remove(&question.id).unwrap_or_default();
        items.push(QuestionResponse::from_db(question, own_options));
    }

    let total = items.len();
    Ok(Json(serde_json::json!({ "items": items, "total": total })))
}

async fn get_question(
    axum::extract::Path(question_id): axum::extract::Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    state: axum::extract::State<AppState>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let question = repositories::questions::find_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?;

    let Some(question) = question else {
        return Err(ApiError::NotFound("Question not found".to_string()));
    };

    let options = repositories::questions::list_options(state.db(), &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;

    Ok(Json(QuestionResponse::from_db(question, options)))
}

async fn create_question(
    CurrentAdmin(admin): CurrentAdmin,
    state: axum::extract::State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(axum::http::StatusCode, Json<QuestionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if !reconcile::has_single_correct_option(payload.options.iter().map(|o| o.is_correct)) {
        return Err(ApiError::BadRequest(
            "Each question must have exactly one correct option".to_string(),
        ));
    }

    let now = primitive_now_utc();
    let question_id = Uuid::new_v4().to_string();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let question = repositories::questions::create(
        &mut *tx,
        repositories::questions::CreateQuestion {
            id: &question_id,
            content: &payload.content,
            tags: payload.tags.clone(),
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    for option in &payload.options {
        repositories::questions::create_option(
            &mut *tx,
            repositories::questions::CreateOption {
                id: &Uuid::new_v4().to_string(),
                question_id: &question_id,
                content: &option.content,
                is_correct: option.is_correct,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create option"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let options = repositories::questions::list_options(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;

    tracing::info!(
        admin_id = %admin.id,
        question_id = %question_id,
        action = "question_create",
        "Question created"
    );

    Ok((axum::http::StatusCode::CREATED, Json(QuestionResponse::from_db(question, options))))
}

async fn update_question(
    axum::extract::Path(question_id): axum::extract::Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    state: axum::extract::State<AppState>,
    Json(payload): Json<QuestionUpdate>,
) -> Result<Json<QuestionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if !reconcile::has_single_correct_option(payload.options.iter().map(|o| o.is_correct)) {
        return Err(ApiError::BadRequest(
            "Each question must have exactly one correct option".to_string(),
        ));
    }

    let known_updated_at = parse_revision(&payload.updated_at)?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let question = repositories::questions::find_by_id(&mut *tx, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?;

    let Some(question) = question else {
        return Err(ApiError::NotFound("Question not found".to_string()));
    };

    // Optimistic lock: the caller must have seen the latest revision.
    if known_updated_at != question.updated_at {
        return Err(ApiError::Conflict("Question has been modified by another user".to_string()));
    }

    let existing_options = repositories::questions::list_options(&mut *tx, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;
    let existing_ids: Vec<String> =
        existing_options.iter().map(|option| option.id.clone()).collect();

    let incoming: Vec<OptionInput> = payload
        .options
        .iter()
        .map(|option| OptionInput {
            id: option.id.clone(),
            content: option.content.clone(),
            is_correct: option.is_correct,
        })
        .collect();
    let diff = reconcile::diff_options(&existing_ids, &incoming);

    let now = primitive_now_utc();
    repositories::questions::update(
        &mut *tx,
        &question_id,
        repositories::questions::UpdateQuestion {
            content: payload.content.clone(),
            tags: payload.tags.clone(),
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update question"))?;

    for (option_id, option) in &diff.to_update {
        repositories::questions::update_option(
            &mut *tx,
            &question_id,
            option_id,
            &option.content,
            option.is_correct,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update option"))?;
    }

    for option in &diff.to_create {
        repositories::questions::create_option(
            &mut *tx,
            repositories::questions::CreateOption {
                id: &Uuid::new_v4().to_string(),
                question_id: &question_id,
                content: &option.content,
                is_correct: option.is_correct,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create option"))?;
    }

    repositories::questions::delete_options(&mut *tx, &question_id, &diff.to_delete)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete options"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let updated = repositories::questions::fetch_one_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated question"))?;
    let options = repositories::questions::list_options(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;

    Ok(Json(QuestionResponse::from_db(updated, options)))
}

async fn delete_question(
    axum::extract::Path(question_id): axum::extract::Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    state: axum::extract::State<AppState>,
) -> Result<axum::http::StatusCode, ApiError> {
    let deleted = repositories::questions::delete_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;

    if !deleted {
        return Err(ApiError::NotFound("Question not found".to_string()));
    }

    tracing::info!(
        admin_id = %admin.id,
        question_id = %question_id,
        action = "question_delete",
        "Question deleted"
    );

    Ok(axum::http::StatusCode::NO_CONTENT)
}

fn parse_revision(raw: &str) -> Result<time::PrimitiveDateTime, ApiError> {
    parse_offset_datetime_flexible(raw)
        .map(to_primitive_utc)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid updated_at: {raw}")))
}
