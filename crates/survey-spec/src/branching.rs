use crate::answers::{AnswerValue, DISMISSED};
use crate::spec::logic::LogicCondition;
use crate::spec::question::QuestionSpec;

impl LogicCondition {
    /// Evaluates the condition against a normalized answer.
    pub fn matches(&self, answer: &AnswerValue) -> bool {
        match self {
            LogicCondition::Equals { value: None } | LogicCondition::NotEquals { value: None } => {
                false
            }
            LogicCondition::Equals { value: Some(value) } => {
                matches!(answer, AnswerValue::List(items) if items.len() == 1 && &items[0] == value)
                    || answer.to_flat_string() == *value
            }
            LogicCondition::NotEquals { value: Some(value) } => match answer {
                AnswerValue::Text(text) => text != value,
                _ => true,
            },
            LogicCondition::LessThan { value } => compare(answer, *value, |a, b| a < b),
            LogicCondition::LessEqual { value } => compare(answer, *value, |a, b| a <= b),
            LogicCondition::GreaterThan { value } => compare(answer, *value, |a, b| a > b),
            LogicCondition::GreaterEqual { value } => compare(answer, *value, |a, b| a >= b),
            LogicCondition::IncludesAll { value } => match answer {
                AnswerValue::List(items) => {
                    !value.is_empty() && value.iter().all(|wanted| items.contains(wanted))
                }
                _ => false,
            },
            LogicCondition::IncludesOne { value } => match answer {
                AnswerValue::List(items) => value.iter().any(|wanted| items.contains(wanted)),
                _ => false,
            },
            LogicCondition::Accepted => answer.as_text() == Some("accepted"),
            LogicCondition::Clicked => answer.as_text() == Some("clicked"),
            LogicCondition::Submitted => match answer {
                AnswerValue::Text(text) => !text.is_empty() && text != DISMISSED,
                AnswerValue::List(items) => !items.is_empty(),
                AnswerValue::Number(_) => true,
            },
            LogicCondition::Skipped => answer.is_empty() || answer.is_dismissed(),
            LogicCondition::Unsupported => false,
        }
    }
}

fn compare(answer: &AnswerValue, value: Option<f64>, op: impl Fn(f64, f64) -> bool) -> bool {
    match (answer.as_number(), value) {
        (Some(answer), Some(value)) => op(answer, value),
        _ => false,
    }
}

/// Destination of the first matching logic rule, in declaration order.
///
/// Rules without a destination are skipped even when they match, so
/// evaluation continues with the next rule. `None` means "continue with the
/// next question in document order".
pub fn next_destination<'a>(question: &'a QuestionSpec, answer: &AnswerValue) -> Option<&'a str> {
    question
        .logic
        .iter()
        .filter_map(|rule| rule.destination.as_deref().map(|dest| (rule, dest)))
        .find(|(rule, _)| rule.condition.matches(answer))
        .map(|(_, destination)| destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{LogicRule, QuestionType};

    fn text(value: &str) -> AnswerValue {
        AnswerValue::Text(value.to_string())
    }

    fn list(values: &[&str]) -> AnswerValue {
        AnswerValue::List(values.iter().map(|value| value.to_string()).collect())
    }

    #[test]
    fn equals_accepts_single_item_lists_and_numbers() {
        let condition = LogicCondition::Equals {
            value: Some("5".into()),
        };
        assert!(condition.matches(&AnswerValue::Number(5.0)));
        assert!(condition.matches(&text("5")));
        assert!(condition.matches(&list(&["5"])));
        assert!(!condition.matches(&list(&["5", "6"])));
    }

    #[test]
    fn not_equals_is_strict() {
        let condition = LogicCondition::NotEquals {
            value: Some("5".into()),
        };
        assert!(!condition.matches(&text("5")));
        assert!(condition.matches(&text("6")));
        assert!(condition.matches(&AnswerValue::Number(5.0)));
    }

    #[test]
    fn numeric_comparisons_need_a_value() {
        assert!(LogicCondition::LessThan { value: Some(7.0) }.matches(&AnswerValue::Number(6.0)));
        assert!(!LogicCondition::LessThan { value: Some(7.0) }.matches(&AnswerValue::Number(7.0)));
        assert!(LogicCondition::LessEqual { value: Some(7.0) }.matches(&AnswerValue::Number(7.0)));
        assert!(LogicCondition::GreaterThan { value: Some(7.0) }.matches(&AnswerValue::Number(8.0)));
        assert!(LogicCondition::GreaterEqual { value: Some(7.0) }.matches(&text("7")));
        assert!(!LogicCondition::GreaterEqual { value: None }.matches(&AnswerValue::Number(9.0)));
        assert!(!LogicCondition::GreaterThan { value: Some(1.0) }.matches(&list(&["5"])));
    }

    #[test]
    fn includes_conditions_need_lists() {
        let all = LogicCondition::IncludesAll {
            value: vec!["a".into(), "b".into()],
        };
        let one = LogicCondition::IncludesOne {
            value: vec!["a".into(), "z".into()],
        };
        assert!(all.matches(&list(&["a", "b", "c"])));
        assert!(!all.matches(&list(&["a"])));
        assert!(one.matches(&list(&["a"])));
        assert!(!one.matches(&list(&["b"])));
        assert!(!one.matches(&text("a")));

        let empty = LogicCondition::IncludesAll { value: Vec::new() };
        assert!(!empty.matches(&list(&["a"])));
    }

    #[test]
    fn conditions_without_values_never_match() {
        assert!(!LogicCondition::Equals { value: None }.matches(&text("")));
        assert!(!LogicCondition::NotEquals { value: None }.matches(&text("x")));
        assert!(!LogicCondition::Unsupported.matches(&text("x")));
    }

    #[test]
    fn submitted_and_skipped_are_complementary_for_text() {
        for (answer, submitted) in [
            (text("hi"), true),
            (text(""), false),
            (text("dismissed"), false),
            (list(&[]), false),
            (list(&["a"]), true),
            (AnswerValue::Number(0.0), true),
        ] {
            assert_eq!(LogicCondition::Submitted.matches(&answer), submitted);
            assert_eq!(LogicCondition::Skipped.matches(&answer), !submitted);
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut question = QuestionSpec::new("q1", QuestionType::Nps, "How likely?");
        question.logic = vec![
            LogicRule::new(
                LogicCondition::Equals {
                    value: Some("5".into()),
                },
                "q9",
            ),
            LogicRule::new(LogicCondition::Submitted, "q3"),
        ];
        assert_eq!(next_destination(&question, &text("5")), Some("q9"));
        assert_eq!(next_destination(&question, &text("4")), Some("q3"));
        assert_eq!(next_destination(&question, &text("")), None);
    }

    #[test]
    fn matching_rule_without_destination_falls_through() {
        let mut question = QuestionSpec::new("q1", QuestionType::OpenText, "Why?");
        question.logic = vec![
            LogicRule {
                condition: LogicCondition::Submitted,
                destination: None,
            },
            LogicRule::new(
                LogicCondition::Equals {
                    value: Some("x".into()),
                },
                "q4",
            ),
        ];
        assert_eq!(next_destination(&question, &text("x")), Some("q4"));
        assert_eq!(next_destination(&question, &text("y")), None);
    }
}
