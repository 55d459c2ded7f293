use time::PrimitiveDateTime;

use crate::db::models::{Exam, User};
use crate::db::types::{AttemptStatus, ExamStatus, UserRole};

/// Admins may manage any exam; everyone else only the exams they created.
pub(crate) fn can_manage_exam(user: &User, exam: &Exam) -> bool {
    matches!(user.role, UserRole::Admin) || exam.created_by == user.id
}

pub(crate) fn can_publish(status: ExamStatus) -> bool {
    matches!(status, ExamStatus::Draft)
}

pub(crate) fn can_unpublish(status: ExamStatus) -> bool {
    matches!(status, ExamStatus::Published)
}

pub(crate) fn can_archive(status: ExamStatus) -> bool {
    matches!(status, ExamStatus::Ended)
}

pub(crate) fn can_remove(status: ExamStatus) -> bool {
    matches!(status, ExamStatus::Draft | ExamStatus::Archived)
}

pub(crate) fn can_edit(status: ExamStatus) -> bool {
    !matches!(status, ExamStatus::Ended)
}

/// An attempt may only be started while the exam is in its live window.
pub(crate) fn is_startable(status: ExamStatus) -> bool {
    matches!(status, ExamStatus::Running)
}

/// Non-empty assignee lists restrict who may sit the exam; an empty list
/// leaves it open to any authenticated candidate.
pub(crate) fn is_assigned(assignees: &[String], email: &str) -> bool {
    assignees.is_empty() || assignees.iter().any(|assignee| assignee == email)
}

/// Candidate-facing status of an exam in the assigned-exams listing, derived
/// from exam status first and the caller's own attempt second.
pub(crate) fn assigned_exam_status(
    exam_status: ExamStatus,
    attempt: Option<(AttemptStatus, Option<PrimitiveDateTime>)>,
) -> &'static str {
    match exam_status {
        ExamStatus::Published => "UPCOMING",
        ExamStatus::Ended => "ENDED",
        ExamStatus::Running => match attempt {
            Some((AttemptStatus::Submitted, _)) | Some((_, Some(_))) => "COMPLETED",
            Some((AttemptStatus::InProgress, None)) => "IN_PROGRESS",
            Some((AttemptStatus::Terminated, None)) => "TERMINATED",
            None => "NOT_ATTEMPTED",
        },
        _ => "NOT_ATTEMPTED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use sqlx::types::Json;

    fn user(id: &str, role: UserRole) -> User {
        let now = primitive_now_utc();
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            hashed_password: "hash".to_string(),
            full_name: id.to_string(),
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn exam(created_by: &str, status: ExamStatus) -> Exam {
        let now = primitive_now_utc();
        Exam {
            id: "exam-1".to_string(),
            title: "Midterm".to_string(),
            description: None,
            pass_score: 60,
            assignees: Json(Vec::new()),
            start_at: None,
            end_at: None,
            status,
            created_by: created_by.to_string(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn admins_and_creators_manage_exams() {
        let owner = user("owner", UserRole::Candidate);
        let admin = user("root", UserRole::Admin);
        let stranger = user("stranger", UserRole::Candidate);
        let exam = exam("owner", ExamStatus::Draft);

        assert!(can_manage_exam(&owner, &exam));
        assert!(can_manage_exam(&admin, &exam));
        assert!(!can_manage_exam(&stranger, &exam));
    }

    #[test]
    fn transitions_follow_the_lifecycle() {
        assert!(can_publish(ExamStatus::Draft));
        assert!(!can_publish(ExamStatus::Published));

        assert!(can_unpublish(ExamStatus::Published));
        assert!(!can_unpublish(ExamStatus::Running));

        assert!(can_archive(ExamStatus::Ended));
        assert!(!can_archive(ExamStatus::Running));

        assert!(can_remove(ExamStatus::Draft));
        assert!(can_remove(ExamStatus::Archived));
        assert!(!can_remove(ExamStatus::Published));

        assert!(can_edit(ExamStatus::Running));
        assert!(!can_edit(ExamStatus::Ended));

        assert!(is_startable(ExamStatus::Running));
        assert!(!is_startable(ExamStatus::Published));
    }

    #[test]
    fn empty_assignee_list_is_open_to_everyone() {
        assert!(is_assigned(&[], "anyone@example.com"));
        let assignees = vec!["a@example.com".to_string()];
        assert!(is_assigned(&assignees, "a@example.com"));
        assert!(!is_assigned(&assignees, "b@example.com"));
    }

    #[test]
    fn assigned_status_prefers_exam_phase_over_attempt() {
        assert_eq!(assigned_exam_status(ExamStatus::Published, None), "UPCOMING");
        assert_eq!(
            assigned_exam_status(ExamStatus::Ended, Some((AttemptStatus::InProgress, None))),
            "ENDED"
        );
    }

    #[test]
    fn running_exams_reflect_the_callers_attempt() {
        let now = primitive_now_utc();
        assert_eq!(assigned_exam_status(ExamStatus::Running, None), "NOT_ATTEMPTED");
        assert_eq!(
            assigned_exam_status(ExamStatus::Running, Some((AttemptStatus::InProgress, None))),
            "IN_PROGRESS"
        );
        assert_eq!(
            assigned_exam_status(ExamStatus::Running, Some((AttemptStatus::Submitted, Some(now)))),
            "COMPLETED"
        );
        assert_eq!(
            assigned_exam_status(ExamStatus::Running, Some((AttemptStatus::Terminated, None))),
            "TERMINATED"
        );
    }
}
