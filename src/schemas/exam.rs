use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::Exam;
use crate::db::types::ExamStatus;
use crate::schemas::question::QuestionResponse;

#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct ExamQuestionInput {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(alias = "order")]
    #[validate(range(min = 1, message = "order must be positive"))]
    pub(crate) order_index: i32,
    #[serde(default)]
    #[validate(range(min = 0, message = "score must be non-negative"))]
    pub(crate) score: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(alias = "passScore")]
    #[validate(range(min = 0, message = "pass_score must be non-negative"))]
    pub(crate) pass_score: i32,
    #[serde(default)]
    #[validate(custom(function = validate_assignees))]
    pub(crate) assignees: Vec<String>,
    #[serde(
        default,
        alias = "startAt",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) start_at: Option<OffsetDateTime>,
    #[serde(
        default,
        alias = "endAt",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) end_at: Option<OffsetDateTime>,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) questions: Option<Vec<ExamQuestionInput>>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[serde(alias = "passScore")]
    #[validate(range(min = 0, message = "pass_score must be non-negative"))]
    pub(crate) pass_score: Option<i32>,
    #[serde(default)]
    #[validate(custom(function = validate_optional_assignees))]
    pub(crate) assignees: Option<Vec<String>>,
    #[serde(
        default,
        alias = "startAt",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) start_at: Option<OffsetDateTime>,
    #[serde(
        default,
        alias = "endAt",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) end_at: Option<OffsetDateTime>,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) questions: Option<Vec<ExamQuestionInput>>,
}

/// Batch payload for `PUT /exams/:exam_id/questions`.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamQuestionsReplace {
    #[validate(nested)]
    pub(crate) questions: Vec<ExamQuestionInput>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamQuestionView {
    pub(crate) question_id: String,
    pub(crate) order_index: i32,
    pub(crate) score: i32,
    pub(crate) question: QuestionResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) pass_score: i32,
    pub(crate) assignees: Vec<String>,
    pub(crate) start_at: Option<String>,
    pub(crate) end_at: Option<String>,
    pub(crate) status: ExamStatus,
    pub(crate) created_by: String,
    pub(crate) updated_by: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) questions: Vec<ExamQuestionView>,
}

impl ExamResponse {
    pub(crate) fn from_db(exam: Exam, questions: Vec<ExamQuestionView>) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            pass_score: exam.pass_score,
            assignees: exam.assignees.0,
            start_at: exam.start_at.map(format_primitive),
            end_at: exam.end_at.map(format_primitive),
            status: exam.status,
            created_by: exam.created_by,
            updated_by: exam.updated_by,
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
            questions,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamSummaryResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) pass_score: i32,
    pub(crate) assignees: Vec<String>,
    pub(crate) start_at: Option<String>,
    pub(crate) end_at: Option<String>,
    pub(crate) status: ExamStatus,
    pub(crate) created_by: String,
    pub(crate) creator_email: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) question_count: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamStatusOption {
    pub(crate) value: &'static str,
    pub(crate) label: &'static str,
}

pub(crate) fn status_options() -> Vec<ExamStatusOption> {
    vec![
        ExamStatusOption { value: "draft", label: "Draft" },
        ExamStatusOption { value: "published", label: "Published" },
        ExamStatusOption { value: "running", label: "Running" },
        ExamStatusOption { value: "ended", label: "Ended" },
        ExamStatusOption { value: "archived", label: "Archived" },
    ]
}

fn validate_assignees(assignees: &[String]) -> Result<(), validator::ValidationError> {
    for assignee in assignees {
        let looks_like_email = assignee.contains('@') && !assignee.starts_with('@');
        if !looks_like_email {
            return Err(validator::ValidationError::new("assignee_must_be_email"));
        }
    }
    Ok(())
}

fn validate_optional_assignees(assignees: &Vec<String>) -> Result<(), validator::ValidationError> {
    validate_assignees(assignees)
}

pub(crate) fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // datetime-local inputs often come without a timezone.
    if raw.len() == 16 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}:00Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if raw.len() == 19 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    None
}

pub(crate) fn deserialize_option_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_offset_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flexible_parsing_accepts_common_shapes() {
        assert!(parse_offset_datetime_flexible("2026-02-03T09:00:00Z").is_some());
        assert!(parse_offset_datetime_flexible("2026-02-03T09:00:00+03:00").is_some());
        assert!(parse_offset_datetime_flexible("2026-02-03T09:00").is_some());
        assert!(parse_offset_datetime_flexible("2026-02-03T09:00:00").is_some());
        assert!(parse_offset_datetime_flexible("not a date").is_none());
    }

    #[test]
    fn exam_create_deserializes_aliases() {
        let payload: ExamCreate = serde_json::from_value(serde_json::json!({
            "title": "Midterm",
            "passScore": 60,
            "assignees": ["a@example.com"],
            "startAt": "2026-02-03T09:00:00Z",
            "endAt": "2026-02-03T11:00:00Z",
            "questions": [{"questionId": "q1", "order": 1, "score": 50}]
        }))
        .expect("payload");

        assert_eq!(payload.pass_score, 60);
        assert!(payload.start_at.is_some());
        let questions = payload.questions.as_ref().expect("questions");
        assert_eq!(questions[0].question_id, "q1");
        assert_eq!(questions[0].order_index, 1);
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn exam_create_rejects_non_email_assignees() {
        let payload: ExamCreate = serde_json::from_value(serde_json::json!({
            "title": "Midterm",
            "passScore": 60,
            "assignees": ["not-an-email"]
        }))
        .expect("payload");

        assert!(payload.validate().is_err());
    }
}
