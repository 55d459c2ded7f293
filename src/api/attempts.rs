use std::collections::{HashMap, HashSet};

use axum::{
    extract::Query,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::{default_limit, PaginatedResponse};
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::{
    result_question_views, start_question_views, AssignedExamResponse, AttemptResultResponse,
    StartExamResponse, StartExamView, SubmitExamRequest, SubmitExamResponse,
};
use crate::services::{grading, lifecycle};

#[derive(Debug, Deserialize)]
struct AssignedQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/assigned", get(list_assigned_exams))
        .route("/exams/:exam_id/start", post(start_attempt))
        .route("/exams/:exam_id/submit", post(submit_attempt))
        .route("/exams/:exam_id/result", get(get_result))
        .route("/:attempt_id/terminate", post(terminate_attempt))
}

/// Exams the caller can see through the assignee list, annotated with the
/// caller's own attempt state.
async fn list_assigned_exams(
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Query(params): Query<AssignedQuery>,
) -> Result<Json<PaginatedResponse<AssignedExamResponse>>, ApiError> {
    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 1000);

    let exams = repositories::exams::list_assigned(state.db(), &user.email, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list assigned exams"))?;
    let total_count = repositories::exams::count_assigned(state.db(), &user.email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count assigned exams"))?;

    let exam_ids: Vec<String> = exams.iter().map(|exam| exam.id.clone()).collect();
    let attempts = repositories::attempts::find_for_user_exams(state.db(), &user.id, &exam_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load attempts"))?;
    let attempt_map: HashMap<String, _> =
        attempts.into_iter().map(|attempt| (attempt.exam_id.clone(), attempt)).collect();

    let mut items = Vec::with_capacity(exams.len());
    for exam in exams {
        let question_count = repositories::exam_questions::count_by_exam(state.db(), &exam.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count exam questions"))?;

        let attempt = attempt_map.get(&exam.id);
        let attempt_status = lifecycle::assigned_exam_status(
            exam.status,
            attempt.map(|attempt| (attempt.status, attempt.finished_at)),
        );

        items.push(AssignedExamResponse {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            pass_score: exam.pass_score,
            start_at: exam.start_at.map(format_primitive),
            end_at: exam.end_at.map(format_primitive),
            status: exam.status,
            created_at: format_primitive(exam.created_at),
            question_count,
            attempt_status,
            attempt_score: attempt.and_then(|attempt| attempt.score),
        });
    }

    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

/// Starts (or re-enters) the caller's attempt. The first entry snapshots the
/// exam's questions and options inside the same transaction; re-entry only
/// refreshes the schedule scalars and returns the existing snapshot.
async fn start_attempt(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<StartExamResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    let Some(exam) = exam else {
        return Err(ApiError::BadRequest("Exam not available".to_string()));
    };

    if !lifecycle::is_startable(exam.status) {
        return Err(ApiError::BadRequest("Exam not available".to_string()));
    }

    if !lifecycle::is_assigned(&exam.assignees.0, &user.email) {
        return Err(ApiError::Forbidden("You are not assigned to take this exam"));
    }

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let existing =
        repositories::attempts::find_by_user_exam_for_update(&mut *tx, &user.id, &exam_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    if let Some(attempt) = &existing {
        if attempt.finished_at.is_some() {
            return Err(finished_attempt_error(attempt.status));
        }
    }

    let attempt = repositories::attempts::upsert_start(
        &mut *tx,
        repositories::attempts::StartAttempt {
            id: &Uuid::new_v4().to_string(),
            user_id: &user.id,
            exam_id: &exam_id,
            exam_title: &exam.title,
            exam_description: exam.description.as_deref(),
            pass_score: exam.pass_score,
            start_at: exam.start_at,
            end_at: exam.end_at,
            started_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to upsert attempt"))?;

    // The conflict guard withholds the row when a concurrent caller finished
    // the attempt between our lock probe and the upsert.
    let Some(attempt) = attempt else {
        return Err(ApiError::BadRequest("Exam already submitted".to_string()));
    };

    let snapshot_count =
        repositories::attempts::count_snapshot_questions(&mut *tx, &attempt.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to count snapshot"))?;

    if snapshot_count == 0 {
        materialize_snapshot(&mut tx, &attempt.id, &exam_id).await?;
    }

    let snapshot = repositories::attempts::list_snapshot(&mut tx, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load snapshot"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        user_id = %user.id,
        exam_id = %exam_id,
        attempt_id = %attempt.id,
        action = "attempt_start",
        "Attempt started"
    );

    Ok(Json(StartExamResponse {
        attempt_id: attempt.id,
        exam: StartExamView {
            id: exam.id,
            title: attempt.exam_title,
            description: attempt.exam_description,
            pass_score: attempt.pass_score,
            start_at: attempt.start_at.map(format_primitive),
            end_at: attempt.end_at.map(format_primitive),
            questions: start_question_views(snapshot),
        },
    }))
}

/// Records the caller's selections on the snapshot, grades from that same
/// snapshot and finalizes the attempt, all in one transaction.
async fn submit_attempt(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
    Json(payload): Json<SubmitExamRequest>,
) -> Result<Json<SubmitExamResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let unique_question_ids: HashSet<&str> =
        payload.answers.iter().map(|answer| answer.question_id.as_str()).collect();
    if unique_question_ids.len() != payload.answers.len() {
        return Err(ApiError::BadRequest("Duplicate answers detected".to_string()));
    }

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let attempt =
        repositories::attempts::find_by_user_exam_for_update(&mut *tx, &user.id, &exam_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    let Some(attempt) = attempt else {
        return Err(ApiError::BadRequest("Exam not started".to_string()));
    };

    if attempt.finished_at.is_some() {
        return Err(ApiError::BadRequest("Exam already submitted".to_string()));
    }

    let mut snapshot = repositories::attempts::list_snapshot(&mut tx, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load snapshot"))?;

    for answer in &payload.answers {
        let Some((question, options)) = snapshot
            .iter_mut()
            .find(|(question, _)| question.question_id == answer.question_id)
        else {
            // Answers to questions outside the snapshot are ignored.
            continue;
        };

        repositories::attempts::clear_selections(&mut *tx, &question.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to clear selections"))?;
        repositories::attempts::select_option(&mut *tx, &question.id, &answer.option_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to record selection"))?;

        for option in options.iter_mut() {
            option.is_selected = option.original_option_id == answer.option_id;
        }
    }

    let outcome = grading::grade_attempt(&snapshot);

    repositories::attempts::finalize_submit(&mut *tx, &attempt.id, outcome.score, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to finalize attempt"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        user_id = %user.id,
        exam_id = %exam_id,
        attempt_id = %attempt.id,
        score = outcome.score,
        action = "attempt_submit",
        "Attempt submitted"
    );

    Ok(Json(SubmitExamResponse {
        attempt_id: attempt.id,
        status: AttemptStatus::Submitted,
        score: outcome.score,
        total_score: outcome.max_score,
        correct_count: outcome.correct_count,
        finished_at: format_primitive(now),
    }))
}

/// Result view for a finished attempt, reconstructed from the same snapshot
/// the grading read.
async fn get_result(
    axum::extract::Path(exam_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<AttemptResultResponse>, ApiError> {
    let attempt = repositories::attempts::find_by_user_exam(state.db(), &user.id, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    let Some(attempt) = attempt else {
        return Err(ApiError::BadRequest("Exam not completed".to_string()));
    };

    if attempt.finished_at.is_none() {
        return Err(ApiError::BadRequest("Exam not completed".to_string()));
    }

    let mut conn = state
        .db()
        .acquire()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire connection"))?;
    let snapshot = repositories::attempts::list_snapshot(&mut conn, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load snapshot"))?;

    let score = attempt.score.unwrap_or(0);
    let total_score = snapshot.iter().map(|(question, _)| question.score).sum();

    Ok(Json(AttemptResultResponse {
        exam_id,
        score,
        total_score,
        pass: grading::is_passing(score, attempt.pass_score),
        questions: result_question_views(&snapshot),
    }))
}

/// Admin/owner force-stop of a running attempt. No score is assigned.
async fn terminate_attempt(
    axum::extract::Path(attempt_id): axum::extract::Path<String>,
    CurrentUser(user): CurrentUser,
    state: axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    let Some(attempt) = attempt else {
        return Err(ApiError::NotFound("Attempt not found".to_string()));
    };

    let exam = repositories::exams::fetch_one_by_id(state.db(), &attempt.exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?;

    if !lifecycle::can_manage_exam(&user, &exam) {
        return Err(ApiError::Forbidden("Only admin or exam creator can terminate attempts"));
    }

    if attempt.status != AttemptStatus::InProgress {
        return Err(ApiError::BadRequest(format!(
            "Cannot terminate attempt with status {}",
            attempt.status.as_str()
        )));
    }

    let now = primitive_now_utc();
    repositories::attempts::terminate(state.db(), &attempt_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to terminate attempt"))?;

    tracing::info!(
        user_id = %user.id,
        attempt_id = %attempt_id,
        exam_id = %attempt.exam_id,
        action = "attempt_terminate",
        "Attempt terminated"
    );

    Ok(Json(serde_json::json!({
        "id": attempt_id,
        "status": AttemptStatus::Terminated,
        "finished_at": format_primitive(now),
    })))
}

fn finished_attempt_error(status: AttemptStatus) -> ApiError {
    match status {
        AttemptStatus::Terminated => {
            ApiError::BadRequest("Exam attempt has been terminated".to_string())
        }
        _ => ApiError::BadRequest("Exam already submitted".to_string()),
    }
}

/// Copies the exam's current bindings, questions and options into the
/// attempt. Runs exactly once, on first entry.
async fn materialize_snapshot(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt_id: &str,
    exam_id: &str,
) -> Result<(), ApiError> {
    let bindings = repositories::exam_questions::list_by_exam(&mut **tx, exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam questions"))?;

    for binding in bindings {
        let question = repositories::questions::find_by_id(&mut **tx, &binding.question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?;

        let Some(question) = question else {
            continue;
        };

        let attempt_question_id = Uuid::new_v4().to_string();
        repositories::attempts::insert_snapshot_question(
            &mut **tx,
            repositories::attempts::SnapshotQuestion {
                id: &attempt_question_id,
                attempt_id,
                question_id: &question.id,
                order_index: binding.order_index,
                score: binding.score,
                content: &question.content,
                tags: question.tags.0.clone(),
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to snapshot question"))?;

        let options = repositories::questions::list_options(&mut **tx, &question.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;

        for option in options {
            repositories::attempts::insert_snapshot_option(
                &mut **tx,
                repositories::attempts::SnapshotOption {
                    id: &Uuid::new_v4().to_string(),
                    attempt_question_id: &attempt_question_id,
                    original_option_id: &option.id,
                    content: &option.content,
                    is_correct: option.is_correct,
                },
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to snapshot option"))?;
        }
    }

    Ok(())
}
