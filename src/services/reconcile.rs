use std::collections::HashSet;

/// Desired binding row as supplied by the caller. A missing score falls back
/// to 1 point when the binding is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BindingInput {
    pub(crate) question_id: String,
    pub(crate) order_index: i32,
    pub(crate) score: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BindingChange {
    pub(crate) question_id: String,
    pub(crate) order_index: i32,
    pub(crate) score: i32,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct BindingDiff {
    pub(crate) to_update: Vec<BindingChange>,
    pub(crate) to_attach: Vec<BindingChange>,
    pub(crate) to_detach: Vec<String>,
}

pub(crate) const DEFAULT_BINDING_SCORE: i32 = 1;

/// Returns the first order value that appears more than once, if any.
pub(crate) fn find_duplicate_order(desired: &[BindingInput]) -> Option<i32> {
    let mut seen = HashSet::new();
    desired.iter().find(|input| !seen.insert(input.order_index)).map(|input| input.order_index)
}

/// Three-way partition of the desired binding list against the currently
/// bound question ids: bound-and-desired rows get their order/score updated
/// in place, unbound-but-desired rows are attached, bound-but-undesired rows
/// are detached. The caller applies all three inside one transaction.
pub(crate) fn diff_bindings(existing: &[String], desired: &[BindingInput]) -> BindingDiff {
    let existing_ids: HashSet<&str> = existing.iter().map(String::as_str).collect();
    let desired_ids: HashSet<&str> = desired.iter().map(|input| input.question_id.as_str()).collect();

    let mut diff = BindingDiff::default();

    for input in desired {
        let change = BindingChange {
            question_id: input.question_id.clone(),
            order_index: input.order_index,
            score: input.score.unwrap_or(DEFAULT_BINDING_SCORE),
        };

        if existing_ids.contains(input.question_id.as_str()) {
            diff.to_update.push(change);
        } else {
            diff.to_attach.push(change);
        }
    }

    diff.to_detach = existing
        .iter()
        .filter(|question_id| !desired_ids.contains(question_id.as_str()))
        .cloned()
        .collect();

    diff
}

/// Incoming option row for a question edit. Rows without an id (or with an
/// unknown id) are created; known ids are updated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OptionInput {
    pub(crate) id: Option<String>,
    pub(crate) content: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct OptionDiff {
    pub(crate) to_update: Vec<(String, OptionInput)>,
    pub(crate) to_create: Vec<OptionInput>,
    pub(crate) to_delete: Vec<String>,
}

pub(crate) fn diff_options(existing: &[String], incoming: &[OptionInput]) -> OptionDiff {
    let existing_ids: HashSet<&str> = existing.iter().map(String::as_str).collect();

    let mut diff = OptionDiff::default();
    let mut kept = HashSet::new();

    for option in incoming {
        match option.id.as_deref() {
            Some(id) if existing_ids.contains(id) => {
                kept.insert(id.to_string());
                diff.to_update.push((id.to_string(), option.clone()));
            }
            _ => diff.to_create.push(option.clone()),
        }
    }

    diff.to_delete =
        existing.iter().filter(|id| !kept.contains(id.as_str())).cloned().collect();

    diff
}

/// The question-bank invariant: exactly one option marked correct.
pub(crate) fn has_single_correct_option(flags: impl IntoIterator<Item = bool>) -> bool {
    flags.into_iter().filter(|is_correct| *is_correct).count() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(question_id: &str, order_index: i32, score: Option<i32>) -> BindingInput {
        BindingInput { question_id: question_id.to_string(), order_index, score }
    }

    #[test]
    fn duplicate_orders_are_detected() {
        let desired =
            vec![input("q1", 1, Some(5)), input("q2", 2, Some(5)), input("q3", 2, Some(5))];
        assert_eq!(find_duplicate_order(&desired), Some(2));

        let unique = vec![input("q1", 1, None), input("q2", 2, None)];
        assert_eq!(find_duplicate_order(&unique), None);
    }

    #[test]
    fn diff_partitions_update_attach_detach() {
        let existing = vec!["q1".to_string(), "q2".to_string()];
        let desired = vec![input("q2", 1, Some(10)), input("q3", 2, None)];

        let diff = diff_bindings(&existing, &desired);

        assert_eq!(
            diff.to_update,
            vec![BindingChange { question_id: "q2".to_string(), order_index: 1, score: 10 }]
        );
        assert_eq!(
            diff.to_attach,
            vec![BindingChange {
                question_id: "q3".to_string(),
                order_index: 2,
                score: DEFAULT_BINDING_SCORE
            }]
        );
        assert_eq!(diff.to_detach, vec!["q1".to_string()]);
    }

    #[test]
    fn empty_desired_list_detaches_everything() {
        let existing = vec!["q1".to_string(), "q2".to_string()];
        let diff = diff_bindings(&existing, &[]);

        assert!(diff.to_update.is_empty());
        assert!(diff.to_attach.is_empty());
        assert_eq!(diff.to_detach, existing);
    }

    #[test]
    fn option_diff_matches_by_known_id() {
        let existing = vec!["o1".to_string(), "o2".to_string()];
        let incoming = vec![
            OptionInput { id: Some("o1".to_string()), content: "A".to_string(), is_correct: true },
            OptionInput { id: None, content: "B".to_string(), is_correct: false },
            OptionInput {
                id: Some("ghost".to_string()),
                content: "C".to_string(),
                is_correct: false,
            },
        ];

        let diff = diff_options(&existing, &incoming);

        assert_eq!(diff.to_update.len(), 1);
        assert_eq!(diff.to_update[0].0, "o1");
        assert_eq!(diff.to_create.len(), 2);
        assert_eq!(diff.to_delete, vec!["o2".to_string()]);
    }

    #[test]
    fn single_correct_option_invariant() {
        assert!(has_single_correct_option([true, false, false]));
        assert!(!has_single_correct_option([false, false]));
        assert!(!has_single_correct_option([true, true]));
        assert!(!has_single_correct_option([]));
    }
}
