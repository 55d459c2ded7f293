use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Question, QuestionOption};

#[derive(Debug, Deserialize, Serialize, Validate)]
pub(crate) struct OptionCreate {
    #[validate(length(min = 1, message = "option content must not be empty"))]
    pub(crate) content: String,
    #[serde(default)]
    #[serde(alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub(crate) content: String,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    #[validate(length(min = 2, message = "a question needs at least two options"), nested)]
    pub(crate) options: Vec<OptionCreate>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub(crate) struct OptionUpdate {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[validate(length(min = 1, message = "option content must not be empty"))]
    pub(crate) content: String,
    #[serde(default)]
    #[serde(alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

/// `updated_at` is the caller's last-seen revision marker; a mismatch against
/// the stored value rejects the edit.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub(crate) content: Option<String>,
    #[serde(default)]
    pub(crate) tags: Option<Vec<String>>,
    #[validate(length(min = 2, message = "a question needs at least two options"), nested)]
    pub(crate) options: Vec<OptionUpdate>,
    #[serde(alias = "updatedAt")]
    pub(crate) updated_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OptionResponse {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) tags: Vec<String>,
    pub(crate) options: Vec<OptionResponse>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question, options: Vec<QuestionOption>) -> Self {
        Self {
            id: question.id,
            content: question.content,
            tags: question.tags.0,
            options: options
                .into_iter()
                .map(|option| OptionResponse {
                    id: option.id,
                    content: option.content,
                    is_correct: option.is_correct,
                })
                .collect(),
            created_at: format_primitive(question.created_at),
            updated_at: format_primitive(question.updated_at),
        }
    }
}
