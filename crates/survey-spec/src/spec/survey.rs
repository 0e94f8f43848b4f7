use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::i18n::{LocalizedText, SurveyLanguage, default_language};
use crate::spec::question::QuestionSpec;

/// Destination sentinel meaning "past the last question".
pub const END_DESTINATION: &str = "end";

/// Card shown once the survey is finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThankYouCard {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheader: Option<LocalizedText>,
}

/// Immutable survey document handed to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SurveySpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub environment_id: String,
    pub questions: Vec<QuestionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thank_you_card: Option<ThankYouCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<SurveyLanguage>,
}

impl SurveySpec {
    pub fn question(&self, id: &str) -> Option<&QuestionSpec> {
        self.questions.iter().find(|question| question.id == id)
    }

    pub fn question_index(&self, id: &str) -> Option<usize> {
        self.questions.iter().position(|question| question.id == id)
    }

    pub fn first_question(&self) -> Option<&QuestionSpec> {
        self.questions.first()
    }

    pub fn last_question(&self) -> Option<&QuestionSpec> {
        self.questions.last()
    }

    /// Code of the survey's default language.
    pub fn default_language(&self) -> String {
        default_language(&self.languages).code
    }

    /// True when the first question's headline has text for `code`.
    pub fn is_available_in(&self, code: &str) -> bool {
        match self.first_question().map(|question| &question.headline) {
            Some(LocalizedText::Localized(map)) => {
                map.values.get(code).is_some_and(|text| !text.is_empty())
            }
            _ => false,
        }
    }
}
