use std::collections::HashMap;

use sqlx::PgConnection;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::db::models::Exam;
use crate::repositories;
use crate::schemas::exam::{ExamQuestionView, ExamResponse};
use crate::schemas::question::QuestionResponse;
use crate::services::reconcile::BindingDiff;

/// Loads the ordered bindings of an exam together with their questions and
/// options, shaped for the API response.
pub(super) async fn fetch_bindings(
    conn: &mut PgConnection,
    exam_id: &str,
) -> Result<Vec<ExamQuestionView>, ApiError> {
    let bindings = repositories::exam_questions::list_by_exam(&mut *conn, exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam questions"))?;

    let question_ids: Vec<String> =
        bindings.iter().map(|binding| binding.question_id.clone()).collect();

    let mut questions = HashMap::new();
    for question_id in &question_ids {
        if let Some(question) = repositories::questions::find_by_id(&mut *conn, question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        {
            questions.insert(question.id.clone(), question);
        }
    }

    let options = repositories::questions::list_options_for_questions(&mut *conn, &question_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch options"))?;
    let mut grouped: HashMap<String, Vec<_>> = HashMap::new();
    for option in options {
        grouped.entry(option.question_id.clone()).or_default().push(option);
    }

    let mut views = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let Some(question) = questions.remove(&binding.question_id) else {
            continue;
        };
        let own_options = grouped.remove(&question.id).unwrap_or_default();
        views.push(ExamQuestionView {
            question_id: binding.question_id,
            order_index: binding.order_index,
            score: binding.score,
            question: QuestionResponse::from_db(question, own_options),
        });
    }

    Ok(views)
}

pub(super) async fn exam_to_response(
    conn: &mut PgConnection,
    exam: Exam,
) -> Result<ExamResponse, ApiError> {
    let questions = fetch_bindings(conn, &exam.id).await?;
    Ok(ExamResponse::from_db(exam, questions))
}

/// Rejects binding inputs that reference questions missing from the bank.
pub(super) async fn ensure_questions_exist(
    conn: &mut PgConnection,
    question_ids: &[String],
) -> Result<(), ApiError> {
    let existing = repositories::questions::filter_existing_ids(&mut *conn, question_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check questions"))?;

    let existing: std::collections::HashSet<&str> =
        existing.iter().map(String::as_str).collect();
    let missing: Vec<&str> = question_ids
        .iter()
        .map(String::as_str)
        .filter(|question_id| !existing.contains(question_id))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Invalid question IDs: {}", missing.join(", "))))
    }
}

/// Applies a computed binding diff. Caller owns the transaction.
pub(super) async fn apply_binding_diff(
    conn: &mut PgConnection,
    exam_id: &str,
    diff: &BindingDiff,
) -> Result<(), ApiError> {
    for change in &diff.to_update {
        repositories::exam_questions::update_binding(
            &mut *conn,
            exam_id,
            &change.question_id,
            change.order_index,
            change.score,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update exam question"))?;
    }

    for change in &diff.to_attach {
        repositories::exam_questions::attach(
            &mut *conn,
            exam_id,
            &change.question_id,
            change.order_index,
            change.score,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to attach exam question"))?;
    }

    for question_id in &diff.to_detach {
        repositories::exam_questions::detach(&mut *conn, exam_id, question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to detach exam question"))?;
    }

    Ok(())
}

pub(super) fn new_id() -> String {
    Uuid::new_v4().to_string()
}
