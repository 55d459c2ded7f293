use crate::db::models::{AttemptOption, AttemptQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GradeOutcome {
    pub(crate) score: i32,
    pub(crate) max_score: i32,
    pub(crate) correct_count: usize,
}

/// Grades an attempt from its own snapshot. A question is awarded its binding
/// score when the selected option is the snapshot's correct option; unanswered
/// or wrong questions contribute 0. The same snapshot backs the result view,
/// so later edits to the question bank never move a graded score.
pub(crate) fn grade_attempt(questions: &[(AttemptQuestion, Vec<AttemptOption>)]) -> GradeOutcome {
    let mut score = 0;
    let mut max_score = 0;
    let mut correct_count = 0;

    for (question, options) in questions {
        let selected = options.iter().find(|option| option.is_selected);
        let correct = options.iter().find(|option| option.is_correct);

        max_score += question.score;

        if matches!((selected, correct), (Some(s), Some(c)) if s.id == c.id) {
            score += question.score;
            correct_count += 1;
        }
    }

    GradeOutcome { score, max_score, correct_count }
}

pub(crate) fn is_passing(score: i32, pass_score: i32) -> bool {
    score >= pass_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AttemptOption, AttemptQuestion};
    use sqlx::types::Json;

    fn question(id: &str, score: i32) -> AttemptQuestion {
        AttemptQuestion {
            id: format!("aq-{id}"),
            attempt_id: "attempt-1".to_string(),
            question_id: id.to_string(),
            order_index: 1,
            score,
            content: format!("question {id}"),
            tags: Json(Vec::new()),
        }
    }

    fn option(id: &str, is_correct: bool, is_selected: bool) -> AttemptOption {
        AttemptOption {
            id: format!("ao-{id}"),
            attempt_question_id: "aq-1".to_string(),
            original_option_id: id.to_string(),
            content: format!("option {id}"),
            is_correct,
            is_selected,
        }
    }

    #[test]
    fn full_marks_when_both_answers_correct() {
        let snapshot = vec![
            (question("q1", 50), vec![option("a", true, true), option("b", false, false)]),
            (question("q2", 50), vec![option("c", false, false), option("d", true, true)]),
        ];

        let outcome = grade_attempt(&snapshot);
        assert_eq!(outcome, GradeOutcome { score: 100, max_score: 100, correct_count: 2 });
        assert!(is_passing(outcome.score, 60));
    }

    #[test]
    fn half_marks_fail_a_sixty_threshold() {
        let snapshot = vec![
            (question("q1", 50), vec![option("a", true, true), option("b", false, false)]),
            (question("q2", 50), vec![option("c", false, true), option("d", true, false)]),
        ];

        let outcome = grade_attempt(&snapshot);
        assert_eq!(outcome.score, 50);
        assert_eq!(outcome.correct_count, 1);
        assert!(!is_passing(outcome.score, 60));
    }

    #[test]
    fn unanswered_questions_contribute_zero() {
        let snapshot = vec![
            (question("q1", 30), vec![option("a", true, false), option("b", false, false)]),
            (question("q2", 20), vec![option("c", true, true), option("d", false, false)]),
        ];

        let outcome = grade_attempt(&snapshot);
        assert_eq!(outcome, GradeOutcome { score: 20, max_score: 50, correct_count: 1 });
    }

    #[test]
    fn grading_is_deterministic_for_the_same_snapshot() {
        let snapshot = vec![(
            question("q1", 10),
            vec![option("a", true, true), option("b", false, false)],
        )];

        assert_eq!(grade_attempt(&snapshot), grade_attempt(&snapshot));
    }

    #[test]
    fn pass_boundary_is_inclusive() {
        assert!(is_passing(60, 60));
        assert!(!is_passing(59, 60));
    }

    #[test]
    fn empty_snapshot_grades_to_zero() {
        assert_eq!(grade_attempt(&[]), GradeOutcome { score: 0, max_score: 0, correct_count: 0 });
    }
}
