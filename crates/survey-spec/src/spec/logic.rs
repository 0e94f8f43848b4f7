use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::spec::question::{AnswerShape, QuestionType};

/// Branching condition together with the value it compares against.
///
/// Numeric comparisons carry a number, set comparisons a list of labels, and
/// the literal conditions no value at all. A missing or malformed value, or a
/// condition name this runtime does not know, still parses; such conditions
/// simply never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "condition", rename_all = "camelCase")]
pub enum LogicCondition {
    Equals {
        #[serde(default, deserialize_with = "optional_text")]
        #[schemars(with = "Option<String>")]
        value: Option<String>,
    },
    NotEquals {
        #[serde(default, deserialize_with = "optional_text")]
        #[schemars(with = "Option<String>")]
        value: Option<String>,
    },
    LessThan {
        #[serde(default, deserialize_with = "optional_number")]
        #[schemars(with = "Option<f64>")]
        value: Option<f64>,
    },
    LessEqual {
        #[serde(default, deserialize_with = "optional_number")]
        #[schemars(with = "Option<f64>")]
        value: Option<f64>,
    },
    GreaterThan {
        #[serde(default, deserialize_with = "optional_number")]
        #[schemars(with = "Option<f64>")]
        value: Option<f64>,
    },
    GreaterEqual {
        #[serde(default, deserialize_with = "optional_number")]
        #[schemars(with = "Option<f64>")]
        value: Option<f64>,
    },
    IncludesAll {
        #[serde(default, deserialize_with = "text_list")]
        value: Vec<String>,
    },
    IncludesOne {
        #[serde(default, deserialize_with = "text_list")]
        value: Vec<String>,
    },
    Accepted,
    Clicked,
    Submitted,
    Skipped,
    #[serde(other)]
    Unsupported,
}

/// A single conditional jump attached to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LogicRule {
    #[serde(flatten)]
    pub condition: LogicCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl LogicRule {
    pub fn new(condition: LogicCondition, destination: impl Into<String>) -> Self {
        Self {
            condition,
            destination: Some(destination.into()),
        }
    }
}

impl LogicCondition {
    pub fn name(&self) -> &'static str {
        match self {
            LogicCondition::Equals { .. } => "equals",
            LogicCondition::NotEquals { .. } => "notEquals",
            LogicCondition::LessThan { .. } => "lessThan",
            LogicCondition::LessEqual { .. } => "lessEqual",
            LogicCondition::GreaterThan { .. } => "greaterThan",
            LogicCondition::GreaterEqual { .. } => "greaterEqual",
            LogicCondition::IncludesAll { .. } => "includesAll",
            LogicCondition::IncludesOne { .. } => "includesOne",
            LogicCondition::Accepted => "accepted",
            LogicCondition::Clicked => "clicked",
            LogicCondition::Submitted => "submitted",
            LogicCondition::Skipped => "skipped",
            LogicCondition::Unsupported => "unsupported",
        }
    }

    /// Whether this condition can ever match answers of `kind`.
    pub fn fits(&self, kind: QuestionType) -> bool {
        match self {
            LogicCondition::LessThan { .. }
            | LogicCondition::LessEqual { .. }
            | LogicCondition::GreaterThan { .. }
            | LogicCondition::GreaterEqual { .. } => {
                kind.answer_shape() == Some(AnswerShape::Number)
            }
            LogicCondition::IncludesAll { .. } | LogicCondition::IncludesOne { .. } => {
                kind.answer_shape() == Some(AnswerShape::List)
            }
            LogicCondition::Accepted => kind == QuestionType::Consent,
            LogicCondition::Clicked => kind == QuestionType::Cta,
            LogicCondition::Equals { .. }
            | LogicCondition::NotEquals { .. }
            | LogicCondition::Submitted
            | LogicCondition::Skipped => kind != QuestionType::Unknown,
            LogicCondition::Unsupported => false,
        }
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_text))
}

fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Lists of labels; anything that is not a list reads as empty.
fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.into_iter().filter_map(scalar_text).collect(),
        _ => Vec::new(),
    })
}
