use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::answers::ResponseData;

static RECALL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#recall:([A-Za-z0-9_-]+)/fallback:([^#]*)#").expect("recall pattern compiles")
});

/// Replaces `#recall:<questionId>/fallback:<text>#` placeholders with the
/// respondent's earlier answers.
///
/// Missing or empty answers use the fallback; underscores in the fallback are
/// shown as spaces.
pub fn apply<'a>(text: &'a str, answers: &ResponseData) -> Cow<'a, str> {
    RECALL_PATTERN.replace_all(text, |caps: &Captures<'_>| {
        let question_id = &caps[1];
        match answers.get(question_id) {
            Some(answer) if !answer.is_empty() => answer.display(),
            _ => caps[2].replace('_', " "),
        }
    })
}

/// Question ids referenced by recall placeholders in `text`.
pub fn referenced_questions(text: &str) -> Vec<&str> {
    RECALL_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|id| id.as_str()))
        .collect()
}
