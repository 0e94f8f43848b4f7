use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};

use crate::spec::AnswerShape;

/// Literal stored when a respondent dismisses a question.
pub const DISMISSED: &str = "dismissed";

/// Typed answer value stored in a response.
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

/// Answers keyed by question id.
pub type ResponseData = BTreeMap<String, AnswerValue>;

impl Serialize for AnswerValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AnswerValue::Number(number) => {
                if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
                    serializer.serialize_i64(*number as i64)
                } else {
                    serializer.serialize_f64(*number)
                }
            }
            AnswerValue::Text(text) => serializer.serialize_str(text),
            AnswerValue::List(items) => items.serialize(serializer),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        AnswerValue::Number(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(value: Vec<String>) -> Self {
        AnswerValue::List(value)
    }
}

impl AnswerValue {
    pub fn shape(&self) -> AnswerShape {
        match self {
            AnswerValue::Number(_) => AnswerShape::Number,
            AnswerValue::Text(_) => AnswerShape::Text,
            AnswerValue::List(_) => AnswerShape::List,
        }
    }

    /// Empty text or an empty list; numbers are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Number(_) => false,
            AnswerValue::Text(text) => text.is_empty(),
            AnswerValue::List(items) => items.is_empty(),
        }
    }

    pub fn is_dismissed(&self) -> bool {
        matches!(self, AnswerValue::Text(text) if text == DISMISSED)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Numeric reading of the value; text is parsed, lists have none.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(number) => Some(*number),
            AnswerValue::Text(text) => text.trim().parse().ok(),
            AnswerValue::List(_) => None,
        }
    }

    /// Flat string form used for equality checks: lists are comma joined.
    pub fn to_flat_string(&self) -> String {
        match self {
            AnswerValue::Number(number) => number.to_string(),
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::List(items) => items.join(","),
        }
    }

    /// Human readable form, lists joined with `", "`.
    pub fn display(&self) -> String {
        match self {
            AnswerValue::List(items) => items.join(", "),
            other => other.to_flat_string(),
        }
    }
}
