use serde_json::Value;

use crate::answers::DISMISSED;
use crate::spec::question::{QuestionSpec, QuestionType};

const CLICKED: &str = "clicked";
const ACCEPTED: &str = "accepted";

/// Raw input that passed [`check`] for a specific question.
///
/// This is the only input [`crate::normalize::normalize`] accepts, so an
/// answer can never be normalized without being validated first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidAnswer<'a> {
    question: &'a QuestionSpec,
    raw: &'a str,
    number: Option<f64>,
}

impl<'a> ValidAnswer<'a> {
    pub fn question(&self) -> &'a QuestionSpec {
        self.question
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// Parsed number for NPS and rating questions.
    pub fn number(&self) -> Option<f64> {
        self.number
    }
}

/// Returns `true` when `raw` is an acceptable answer for `question`.
pub fn validate(question: &QuestionSpec, raw: Option<&str>) -> bool {
    check(question, raw).is_some()
}

/// Validates `raw` against the question constraints.
///
/// Absent input is treated as the empty string. Empty input skips an
/// optional question of any answerable type and is rejected on a required
/// one. Never panics; anything unparseable is simply invalid.
pub fn check<'a>(question: &'a QuestionSpec, raw: Option<&'a str>) -> Option<ValidAnswer<'a>> {
    let raw = raw.unwrap_or("");
    if raw.is_empty() {
        if question.required || !is_answerable(question) {
            return None;
        }
        return Some(ValidAnswer {
            question,
            raw,
            number: None,
        });
    }

    let number = match question.kind {
        QuestionType::OpenText => None,
        QuestionType::MultipleChoiceSingle => {
            if question.choices.is_empty() {
                return None;
            }
            if !question.has_other_choice() && !question.matches_choice_label(raw) {
                return None;
            }
            None
        }
        QuestionType::MultipleChoiceMulti => {
            if question.choices.is_empty() {
                return None;
            }
            if !question.has_other_choice()
                && !raw
                    .split(',')
                    .all(|token| question.matches_choice_label(token))
            {
                return None;
            }
            None
        }
        QuestionType::Nps => {
            let number = parse_numeric(raw)?;
            if number.fract() != 0.0 || !(0.0..=10.0).contains(&number) {
                return None;
            }
            Some(number)
        }
        QuestionType::Rating => {
            let range = f64::from(question.range?);
            let number = parse_numeric(raw)?;
            if number.fract() != 0.0 || number < 1.0 || number > range {
                return None;
            }
            Some(number)
        }
        QuestionType::Cta => {
            if !literal_allowed(question, raw, CLICKED) {
                return None;
            }
            None
        }
        QuestionType::Consent => {
            if !literal_allowed(question, raw, ACCEPTED) {
                return None;
            }
            None
        }
        QuestionType::PictureSelection => {
            let mut count = 0;
            for token in raw.split(',') {
                if !question.has_choice_id(token) {
                    return None;
                }
                count += 1;
            }
            if !question.allow_multi && count > 1 {
                return None;
            }
            None
        }
        QuestionType::Unknown => return None,
    };

    Some(ValidAnswer {
        question,
        raw,
        number,
    })
}

fn is_answerable(question: &QuestionSpec) -> bool {
    match question.kind {
        QuestionType::MultipleChoiceSingle
        | QuestionType::MultipleChoiceMulti
        | QuestionType::PictureSelection => !question.choices.is_empty(),
        QuestionType::Rating => question.range.is_some(),
        QuestionType::Unknown => false,
        _ => true,
    }
}

fn literal_allowed(question: &QuestionSpec, raw: &str, positive: &str) -> bool {
    if question.required && raw == DISMISSED {
        return false;
    }
    raw == positive || raw == DISMISSED
}

/// Parses numeric input the way prefill values arrive from URLs.
///
/// Literal `&` is replaced with `;` before parsing so stray query-string
/// separators make the value unparseable instead of silently truncating it.
pub(crate) fn parse_numeric(raw: &str) -> Option<f64> {
    let escaped = raw.replace('&', ";");
    match serde_json::from_str::<Value>(&escaped).ok()? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
