use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::i18n::LocalizedText;
use crate::spec::logic::LogicRule;

/// Choice id that marks a trailing free-text "other" option.
pub const OTHER_CHOICE_ID: &str = "other";

/// Supported question kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum QuestionType {
    OpenText,
    MultipleChoiceSingle,
    MultipleChoiceMulti,
    Nps,
    Rating,
    Cta,
    Consent,
    PictureSelection,
    /// Any type this runtime does not know; never accepts an answer.
    #[serde(other)]
    Unknown,
}

/// Shape a stored answer takes for a question type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerShape {
    Text,
    Number,
    List,
}

impl QuestionType {
    /// Expected answer shape, `None` for unknown types.
    pub fn answer_shape(&self) -> Option<AnswerShape> {
        match self {
            QuestionType::OpenText
            | QuestionType::MultipleChoiceSingle
            | QuestionType::Cta
            | QuestionType::Consent => Some(AnswerShape::Text),
            QuestionType::Nps | QuestionType::Rating => Some(AnswerShape::Number),
            QuestionType::MultipleChoiceMulti | QuestionType::PictureSelection => {
                Some(AnswerShape::List)
            }
            QuestionType::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::OpenText => "openText",
            QuestionType::MultipleChoiceSingle => "multipleChoiceSingle",
            QuestionType::MultipleChoiceMulti => "multipleChoiceMulti",
            QuestionType::Nps => "nps",
            QuestionType::Rating => "rating",
            QuestionType::Cta => "cta",
            QuestionType::Consent => "consent",
            QuestionType::PictureSelection => "pictureSelection",
            QuestionType::Unknown => "unknown",
        }
    }
}

/// Presentation scale for rating questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RatingScale {
    Number,
    Smiley,
    Star,
}

/// One selectable option. Picture choices carry an image instead of a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceSpec {
    pub id: String,
    #[serde(default)]
    pub label: LocalizedText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Definition of a single survey question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub headline: LocalizedText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheader: Option<LocalizedText>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_label: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_button_label: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ChoiceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_option_placeholder: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<RatingScale>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_label: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_label: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismiss_button_label: Option<LocalizedText>,
    #[serde(default)]
    pub allow_multi: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logic: Vec<LogicRule>,
}

impl QuestionSpec {
    /// Minimal question with a plain headline; mostly useful for fixtures.
    pub fn new(id: impl Into<String>, kind: QuestionType, headline: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            headline: LocalizedText::Plain(headline.into()),
            subheader: None,
            required: false,
            placeholder: None,
            button_label: None,
            back_button_label: None,
            choices: Vec::new(),
            other_option_placeholder: None,
            range: None,
            scale: None,
            lower_label: None,
            upper_label: None,
            html: None,
            label: None,
            dismiss_button_label: None,
            allow_multi: false,
            logic: Vec::new(),
        }
    }

    /// True when the last choice is the free-text "other" option.
    pub fn has_other_choice(&self) -> bool {
        self.choices
            .last()
            .is_some_and(|choice| choice.id == OTHER_CHOICE_ID)
    }

    /// True when `text` equals one of the choice labels in any language.
    pub fn matches_choice_label(&self, text: &str) -> bool {
        self.choices.iter().any(|choice| choice.label.matches(text))
    }

    pub fn has_choice_id(&self, id: &str) -> bool {
        self.choices.iter().any(|choice| choice.id == id)
    }

    /// Named localized text fields, headline included, that are present.
    pub fn localized_fields(&self) -> Vec<(&'static str, &LocalizedText)> {
        let optional = [
            ("subheader", &self.subheader),
            ("placeholder", &self.placeholder),
            ("buttonLabel", &self.button_label),
            ("backButtonLabel", &self.back_button_label),
            ("otherOptionPlaceholder", &self.other_option_placeholder),
            ("lowerLabel", &self.lower_label),
            ("upperLabel", &self.upper_label),
            ("html", &self.html),
            ("label", &self.label),
            ("dismissButtonLabel", &self.dismiss_button_label),
        ];
        std::iter::once(("headline", &self.headline))
            .chain(
                optional
                    .into_iter()
                    .filter_map(|(name, value)| value.as_ref().map(|value| (name, value))),
            )
            .collect()
    }

    /// Optional localized text fields, headline excluded.
    pub(crate) fn localized_fields_mut(&mut self) -> [&mut Option<LocalizedText>; 10] {
        [
            &mut self.subheader,
            &mut self.placeholder,
            &mut self.button_label,
            &mut self.back_button_label,
            &mut self.other_option_placeholder,
            &mut self.lower_label,
            &mut self.upper_label,
            &mut self.html,
            &mut self.label,
            &mut self.dismiss_button_label,
        ]
    }
}
