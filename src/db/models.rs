use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptStatus, ExamStatus, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) content: String,
    pub(crate) tags: Json<Vec<String>>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) content: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) pass_score: i32,
    pub(crate) assignees: Json<Vec<String>>,
    pub(crate) start_at: Option<PrimitiveDateTime>,
    pub(crate) end_at: Option<PrimitiveDateTime>,
    pub(crate) status: ExamStatus,
    pub(crate) created_by: String,
    pub(crate) updated_by: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One (exam, question) binding carrying presentation order and points.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamQuestion {
    pub(crate) exam_id: String,
    pub(crate) question_id: String,
    pub(crate) order_index: i32,
    pub(crate) score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamAttempt {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) exam_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) exam_title: String,
    pub(crate) exam_description: Option<String>,
    pub(crate) pass_score: i32,
    pub(crate) start_at: Option<PrimitiveDateTime>,
    pub(crate) end_at: Option<PrimitiveDateTime>,
    pub(crate) score: Option<i32>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) finished_at: Option<PrimitiveDateTime>,
}

/// Question state copied into an attempt when it starts. Later bank edits
/// never reach these rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptQuestion {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) order_index: i32,
    pub(crate) score: i32,
    pub(crate) content: String,
    pub(crate) tags: Json<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptOption {
    pub(crate) id: String,
    pub(crate) attempt_question_id: String,
    pub(crate) original_option_id: String,
    pub(crate) content: String,
    pub(crate) is_correct: bool,
    pub(crate) is_selected: bool,
}
