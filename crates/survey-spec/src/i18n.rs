use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::{ChoiceSpec, QuestionSpec, SurveySpec, ThankYouCard};

/// Language used when a survey does not flag one as default.
pub const FALLBACK_LANGUAGE: &str = "en";

/// Language-code keyed form of a localized string.
///
/// Stored documents mark the map with an `_i18n_: true` entry; it is kept on
/// round trips and never treated as a language.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct LocalizedMap {
    #[serde(rename = "_i18n_", default, skip_serializing_if = "std::ops::Not::not")]
    pub marker: bool,
    #[serde(flatten)]
    pub values: BTreeMap<String, String>,
}

/// A text field that is either a legacy single-language string or a
/// per-language map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Localized(LocalizedMap),
}

impl Default for LocalizedText {
    fn default() -> Self {
        LocalizedText::Plain(String::new())
    }
}

impl From<&str> for LocalizedText {
    fn from(value: &str) -> Self {
        LocalizedText::Plain(value.to_string())
    }
}

impl LocalizedText {
    /// Builds a marked map from `(language, text)` pairs.
    pub fn localized<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        LocalizedText::Localized(LocalizedMap {
            marker: true,
            values: entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        })
    }

    /// Resolves the text for `language`, see [`resolve`].
    pub fn resolve<'a>(&'a self, language: &str, default_language: &str) -> &'a str {
        resolve(self, language, default_language)
    }

    /// True when `text` equals this value in any of its languages.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            LocalizedText::Plain(plain) => plain == text,
            LocalizedText::Localized(map) => map.values.values().any(|value| value == text),
        }
    }

    /// Text of every language, or the plain string.
    pub fn variants(&self) -> Vec<&str> {
        match self {
            LocalizedText::Plain(plain) => vec![plain.as_str()],
            LocalizedText::Localized(map) => map.values.values().map(String::as_str).collect(),
        }
    }

    /// Rebuilds the value so it carries exactly `languages` (plus the default).
    ///
    /// Plain text lands under `default_language`; missing languages are added
    /// empty and languages outside the list are dropped.
    pub fn localize(&self, languages: &[String], default_language: &str) -> LocalizedText {
        let mut values = match self {
            LocalizedText::Plain(plain) => {
                BTreeMap::from([(default_language.to_string(), plain.clone())])
            }
            LocalizedText::Localized(map) => map.values.clone(),
        };
        for language in languages {
            values.entry(language.clone()).or_default();
        }
        values.retain(|code, _| code == default_language || languages.contains(code));
        LocalizedText::Localized(LocalizedMap {
            marker: true,
            values,
        })
    }
}

/// Resolves a localized value to the string shown for `language`.
///
/// Plain strings are returned as-is whatever the language. Maps return the
/// requested language when it is non-empty, then the default language, then
/// the empty string.
pub fn resolve<'a>(value: &'a LocalizedText, language: &str, default_language: &str) -> &'a str {
    match value {
        LocalizedText::Plain(plain) => plain,
        LocalizedText::Localized(map) => map
            .values
            .get(language)
            .filter(|text| !text.is_empty())
            .or_else(|| map.values.get(default_language))
            .map(String::as_str)
            .unwrap_or(""),
    }
}

/// Like [`resolve`] for optional fields; absent fields resolve to `""`.
pub fn resolve_opt<'a>(
    value: Option<&'a LocalizedText>,
    language: &str,
    default_language: &str,
) -> &'a str {
    value
        .map(|value| resolve(value, language, default_language))
        .unwrap_or("")
}

/// True iff every required language maps to a non-blank string.
///
/// A plain string carries no language codes, so it is only complete when no
/// language is required.
pub fn is_complete(value: &LocalizedText, required_languages: &[String]) -> bool {
    match value {
        LocalizedText::Plain(_) => required_languages.is_empty(),
        LocalizedText::Localized(map) => required_languages.iter().all(|language| {
            map.values
                .get(language)
                .is_some_and(|text| !text.trim().is_empty())
        }),
    }
}

/// True when the value holds text for more than one language.
pub fn contains_translations(value: &LocalizedText) -> bool {
    matches!(value, LocalizedText::Localized(map) if map.values.len() > 1)
}

/// A language enabled on a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SurveyLanguage {
    pub code: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Returns the language flagged as default, or English.
pub fn default_language(languages: &[SurveyLanguage]) -> SurveyLanguage {
    languages
        .iter()
        .find(|language| language.default)
        .cloned()
        .unwrap_or_else(|| SurveyLanguage {
            code: FALLBACK_LANGUAGE.to_string(),
            default: true,
            alias: Some("English".to_string()),
        })
}

fn localize_opt(
    value: &mut Option<LocalizedText>,
    languages: &[String],
    default_language: &str,
) {
    if let Some(text) = value.as_mut() {
        *text = text.localize(languages, default_language);
    }
}

fn translate_choice(choice: &mut ChoiceSpec, languages: &[String], default_language: &str) {
    choice.label = choice.label.localize(languages, default_language);
}

fn translate_question(question: &mut QuestionSpec, languages: &[String], default_language: &str) {
    question.headline = question.headline.localize(languages, default_language);
    for field in question.localized_fields_mut() {
        localize_opt(field, languages, default_language);
    }
    for choice in &mut question.choices {
        translate_choice(choice, languages, default_language);
    }
}

fn translate_thank_you_card(card: &mut ThankYouCard, languages: &[String], default_language: &str) {
    localize_opt(&mut card.headline, languages, default_language);
    localize_opt(&mut card.subheader, languages, default_language);
}

/// Returns a copy of the survey where every text field is a map carrying
/// exactly `languages`.
pub fn translate_survey(
    survey: &SurveySpec,
    languages: &[String],
    default_language: &str,
) -> SurveySpec {
    let mut translated = survey.clone();
    for question in &mut translated.questions {
        translate_question(question, languages, default_language);
    }
    if let Some(card) = translated.thank_you_card.as_mut() {
        translate_thank_you_card(card, languages, default_language);
    }
    translated
}

/// Lists `(question id, field)` pairs whose text misses one of `languages`.
pub fn incomplete_translations(
    survey: &SurveySpec,
    languages: &[String],
) -> Vec<(String, String)> {
    let mut incomplete = Vec::new();
    for question in &survey.questions {
        for (field, value) in question.localized_fields() {
            if !is_complete(value, languages) {
                incomplete.push((question.id.clone(), field.to_string()));
            }
        }
        for (idx, choice) in question.choices.iter().enumerate() {
            if choice.image_url.is_none() && !is_complete(&choice.label, languages) {
                incomplete.push((question.id.clone(), format!("choices[{}].label", idx)));
            }
        }
    }
    incomplete
}
