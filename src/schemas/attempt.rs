use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{AttemptOption, AttemptQuestion};
use crate::db::types::{AttemptStatus, ExamStatus};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitAnswer {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(alias = "optionId")]
    #[validate(length(min = 1, message = "option_id must not be empty"))]
    pub(crate) option_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitExamRequest {
    #[validate(nested)]
    pub(crate) answers: Vec<SubmitAnswer>,
}

/// Option view handed to a candidate mid-attempt: correctness withheld.
#[derive(Debug, Serialize)]
pub(crate) struct StartOptionView {
    pub(crate) id: String,
    pub(crate) content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartQuestionView {
    pub(crate) question_id: String,
    pub(crate) order_index: i32,
    pub(crate) score: i32,
    pub(crate) content: String,
    pub(crate) tags: Vec<String>,
    pub(crate) options: Vec<StartOptionView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartExamView {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) pass_score: i32,
    pub(crate) start_at: Option<String>,
    pub(crate) end_at: Option<String>,
    pub(crate) questions: Vec<StartQuestionView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartExamResponse {
    pub(crate) attempt_id: String,
    pub(crate) exam: StartExamView,
}

pub(crate) fn start_question_views(
    snapshot: Vec<(AttemptQuestion, Vec<AttemptOption>)>,
) -> Vec<StartQuestionView> {
    snapshot
        .into_iter()
        .map(|(question, options)| StartQuestionView {
            question_id: question.question_id,
            order_index: question.order_index,
            score: question.score,
            content: question.content,
            tags: question.tags.0,
            options: options
                .into_iter()
                .map(|option| StartOptionView {
                    id: option.original_option_id,
                    content: option.content,
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitExamResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) score: i32,
    pub(crate) total_score: i32,
    pub(crate) correct_count: usize,
    pub(crate) finished_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultQuestionView {
    pub(crate) question_id: String,
    pub(crate) content: String,
    pub(crate) tags: Vec<String>,
    pub(crate) score: i32,
    pub(crate) selected_option_id: Option<String>,
    pub(crate) selected_option_content: Option<String>,
    pub(crate) correct_option_id: Option<String>,
    pub(crate) correct_option_content: Option<String>,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResultResponse {
    pub(crate) exam_id: String,
    pub(crate) score: i32,
    pub(crate) total_score: i32,
    pub(crate) pass: bool,
    pub(crate) questions: Vec<ResultQuestionView>,
}

pub(crate) fn result_question_views(
    snapshot: &[(AttemptQuestion, Vec<AttemptOption>)],
) -> Vec<ResultQuestionView> {
    snapshot
        .iter()
        .map(|(question, options)| {
            let selected = options.iter().find(|option| option.is_selected);
            let correct = options.iter().find(|option| option.is_correct);

            ResultQuestionView {
                question_id: question.question_id.clone(),
                content: question.content.clone(),
                tags: question.tags.0.clone(),
                score: question.score,
                selected_option_id: selected.map(|option| option.original_option_id.clone()),
                selected_option_content: selected.map(|option| option.content.clone()),
                correct_option_id: correct.map(|option| option.original_option_id.clone()),
                correct_option_content: correct.map(|option| option.content.clone()),
                is_correct: selected.map(|option| option.is_correct).unwrap_or(false),
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignedExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) pass_score: i32,
    pub(crate) start_at: Option<String>,
    pub(crate) end_at: Option<String>,
    pub(crate) status: ExamStatus,
    pub(crate) created_at: String,
    pub(crate) question_count: i64,
    pub(crate) attempt_status: &'static str,
    pub(crate) attempt_score: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptOptionDetail {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptQuestionDetail {
    pub(crate) question_id: String,
    pub(crate) order_index: i32,
    pub(crate) score: i32,
    pub(crate) content: String,
    pub(crate) selected_option: Option<AttemptOptionDetail>,
    pub(crate) is_correct: bool,
    pub(crate) all_options: Vec<AttemptOptionDetail>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptUserView {
    pub(crate) id: String,
    pub(crate) email: String,
}

/// Admin-facing attempt row with the full per-question reconstruction.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptDetailResponse {
    pub(crate) id: String,
    pub(crate) user: AttemptUserView,
    pub(crate) status: AttemptStatus,
    pub(crate) score: Option<i32>,
    pub(crate) started_at: String,
    pub(crate) finished_at: Option<String>,
    pub(crate) questions: Vec<AttemptQuestionDetail>,
}

pub(crate) fn attempt_question_details(
    snapshot: &[(AttemptQuestion, Vec<AttemptOption>)],
) -> Vec<AttemptQuestionDetail> {
    snapshot
        .iter()
        .map(|(question, options)| {
            let selected = options.iter().find(|option| option.is_selected);

            AttemptQuestionDetail {
                question_id: question.question_id.clone(),
                order_index: question.order_index,
                score: question.score,
                content: question.content.clone(),
                selected_option: selected.map(|option| AttemptOptionDetail {
                    id: option.original_option_id.clone(),
                    content: option.content.clone(),
                    is_correct: option.is_correct,
                }),
                is_correct: selected.map(|option| option.is_correct).unwrap_or(false),
                all_options: options
                    .iter()
                    .map(|option| AttemptOptionDetail {
                        id: option.original_option_id.clone(),
                        content: option.content.clone(),
                        is_correct: option.is_correct,
                    })
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn snapshot_question(question_id: &str, score: i32) -> AttemptQuestion {
        AttemptQuestion {
            id: format!("aq-{question_id}"),
            attempt_id: "attempt-1".to_string(),
            question_id: question_id.to_string(),
            order_index: 1,
            score,
            content: "What is 2 + 2?".to_string(),
            tags: Json(vec!["math".to_string()]),
        }
    }

    fn snapshot_option(id: &str, is_correct: bool, is_selected: bool) -> AttemptOption {
        AttemptOption {
            id: format!("ao-{id}"),
            attempt_question_id: "aq-q1".to_string(),
            original_option_id: id.to_string(),
            content: format!("option {id}"),
            is_correct,
            is_selected,
        }
    }

    #[test]
    fn start_views_withhold_correctness() {
        let snapshot = vec![(
            snapshot_question("q1", 10),
            vec![snapshot_option("a", true, false), snapshot_option("b", false, false)],
        )];

        let views = start_question_views(snapshot);
        let serialized = serde_json::to_value(&views).expect("serialize");
        assert!(serialized[0]["options"][0].get("is_correct").is_none());
        assert_eq!(serialized[0]["options"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn result_views_pair_selected_and_correct() {
        let snapshot = vec![(
            snapshot_question("q1", 10),
            vec![snapshot_option("a", true, false), snapshot_option("b", false, true)],
        )];

        let views = result_question_views(&snapshot);
        assert_eq!(views[0].selected_option_id, Some("b".to_string()));
        assert_eq!(views[0].correct_option_id, Some("a".to_string()));
        assert!(!views[0].is_correct);
    }
}
