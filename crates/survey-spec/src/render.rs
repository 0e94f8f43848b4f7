use serde_json::{Map, Value, json};

use crate::answers::{AnswerValue, ResponseData};
use crate::i18n::{LocalizedText, resolve, resolve_opt};
use crate::player::SurveyPlayer;
use crate::progress::calculate_progress;
use crate::recall;
use crate::redirect::normalize_redirect_url;
use crate::spec::question::{QuestionSpec, QuestionType};
use crate::spec::{END_DESTINATION, SurveySpec};

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The current question waits for an answer.
    NeedInput,
    /// The survey is finished.
    Complete,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
        }
    }
}

/// Choice with its label resolved for the active language.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderChoice {
    pub id: String,
    pub label: String,
    pub image_url: Option<String>,
}

/// The current question with every text resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderQuestion {
    pub id: String,
    pub kind: QuestionType,
    pub headline: String,
    pub subheader: Option<String>,
    pub placeholder: Option<String>,
    pub button_label: Option<String>,
    pub back_button_label: Option<String>,
    pub lower_label: Option<String>,
    pub upper_label: Option<String>,
    pub required: bool,
    pub choices: Vec<RenderChoice>,
    pub range: Option<u32>,
    pub allow_multi: bool,
    pub draft_value: Option<AnswerValue>,
}

/// Thank-you card with resolved text.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderThankYou {
    pub headline: String,
    pub subheader: Option<String>,
}

/// View model for the player's current step.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPayload {
    pub survey_id: String,
    pub survey_name: String,
    pub language: String,
    pub status: RenderStatus,
    pub progress: f64,
    pub is_first: bool,
    pub is_last: bool,
    pub preview: bool,
    pub question: Option<RenderQuestion>,
    pub thank_you: Option<RenderThankYou>,
    pub redirect: Option<String>,
}

struct TextResolver<'a> {
    language: &'a str,
    default_language: &'a str,
    answers: &'a ResponseData,
}

impl TextResolver<'_> {
    fn text(&self, value: &LocalizedText) -> String {
        let resolved = resolve(value, self.language, self.default_language);
        recall::apply(resolved, self.answers).into_owned()
    }

    fn optional(&self, value: Option<&LocalizedText>) -> Option<String> {
        let resolved = resolve_opt(value, self.language, self.default_language);
        if resolved.is_empty() {
            None
        } else {
            Some(recall::apply(resolved, self.answers).into_owned())
        }
    }
}

fn render_question(
    question: &QuestionSpec,
    resolver: &TextResolver<'_>,
    draft_value: Option<&AnswerValue>,
) -> RenderQuestion {
    RenderQuestion {
        id: question.id.clone(),
        kind: question.kind,
        headline: resolver.text(&question.headline),
        subheader: resolver.optional(question.subheader.as_ref()),
        placeholder: resolver.optional(question.placeholder.as_ref()),
        button_label: resolver.optional(question.button_label.as_ref()),
        back_button_label: resolver.optional(question.back_button_label.as_ref()),
        lower_label: resolver.optional(question.lower_label.as_ref()),
        upper_label: resolver.optional(question.upper_label.as_ref()),
        required: question.required,
        choices: question
            .choices
            .iter()
            .map(|choice| RenderChoice {
                id: choice.id.clone(),
                label: resolve(&choice.label, resolver.language, resolver.default_language)
                    .to_string(),
                image_url: choice.image_url.clone(),
            })
            .collect(),
        range: match question.kind {
            QuestionType::Nps => Some(10),
            _ => question.range,
        },
        allow_multi: question.allow_multi,
        draft_value: draft_value.cloned(),
    }
}

struct View<'a> {
    survey: &'a SurveySpec,
    resolver: TextResolver<'a>,
    current_question_id: &'a str,
    finished: bool,
    progress: f64,
    draft_value: Option<&'a AnswerValue>,
    preview: bool,
    redirect: Option<String>,
}

fn assemble(view: View<'_>) -> RenderPayload {
    let survey = view.survey;
    let resolver = &view.resolver;
    let question = if view.finished {
        None
    } else {
        survey
            .question(view.current_question_id)
            .map(|question| render_question(question, resolver, view.draft_value))
    };
    let thank_you = if view.finished {
        survey
            .thank_you_card
            .as_ref()
            .filter(|card| card.enabled)
            .map(|card| RenderThankYou {
                headline: resolver
                    .optional(card.headline.as_ref())
                    .unwrap_or_default(),
                subheader: resolver.optional(card.subheader.as_ref()),
            })
    } else {
        None
    };

    RenderPayload {
        survey_id: survey.id.clone(),
        survey_name: survey.name.clone(),
        language: resolver.language.to_string(),
        status: if view.finished {
            RenderStatus::Complete
        } else {
            RenderStatus::NeedInput
        },
        progress: view.progress,
        is_first: survey
            .first_question()
            .is_some_and(|question| question.id == view.current_question_id),
        is_last: survey
            .last_question()
            .is_some_and(|question| question.id == view.current_question_id),
        preview: view.preview,
        question,
        thank_you,
        redirect: if view.finished { view.redirect } else { None },
    }
}

/// Builds the view model for the player's current step.
pub fn build_render_payload(player: &SurveyPlayer) -> RenderPayload {
    let state = player.state();
    assemble(View {
        survey: player.survey(),
        resolver: TextResolver {
            language: player.language(),
            default_language: player.default_language(),
            answers: player.answers(),
        },
        current_question_id: &state.current_question_id,
        finished: state.finished,
        progress: state.progress,
        draft_value: state.draft_value.as_ref(),
        preview: player.is_preview(),
        redirect: player
            .pending_redirect()
            .map(|redirect| redirect.url().to_string()),
    })
}

/// Builds the view model for `question_id` without a running player.
///
/// [`END_DESTINATION`] renders the completion step, with the survey's
/// redirect target when it has a valid one.
pub fn build_question_payload(
    survey: &SurveySpec,
    question_id: &str,
    language: Option<&str>,
    answers: &ResponseData,
) -> RenderPayload {
    let default_language = survey.default_language();
    let finished = question_id == END_DESTINATION;
    let redirect = survey
        .redirect_url
        .as_deref()
        .and_then(|raw| normalize_redirect_url(raw).ok())
        .map(|url| url.to_string());
    assemble(View {
        survey,
        resolver: TextResolver {
            language: language.unwrap_or(&default_language),
            default_language: &default_language,
            answers,
        },
        current_question_id: question_id,
        finished,
        progress: if finished {
            1.0
        } else {
            calculate_progress(survey, question_id).unwrap_or(0.0)
        },
        draft_value: None,
        preview: true,
        redirect,
    })
}

fn question_to_json(question: &RenderQuestion) -> Value {
    let mut map = Map::new();
    map.insert("id".into(), Value::String(question.id.clone()));
    map.insert("type".into(), Value::String(question.kind.as_str().into()));
    map.insert("headline".into(), Value::String(question.headline.clone()));
    map.insert("required".into(), Value::Bool(question.required));
    for (key, value) in [
        ("subheader", &question.subheader),
        ("placeholder", &question.placeholder),
        ("buttonLabel", &question.button_label),
        ("backButtonLabel", &question.back_button_label),
        ("lowerLabel", &question.lower_label),
        ("upperLabel", &question.upper_label),
    ] {
        if let Some(value) = value {
            map.insert(key.into(), Value::String(value.clone()));
        }
    }
    if !question.choices.is_empty() {
        map.insert(
            "choices".into(),
            Value::Array(
                question
                    .choices
                    .iter()
                    .map(|choice| {
                        let mut entry = json!({ "id": choice.id, "label": choice.label });
                        if let Some(image_url) = &choice.image_url {
                            entry["imageUrl"] = Value::String(image_url.clone());
                        }
                        entry
                    })
                    .collect(),
            ),
        );
    }
    if let Some(range) = question.range {
        map.insert("range".into(), json!(range));
    }
    if question.kind == QuestionType::PictureSelection {
        map.insert("allowMulti".into(), Value::Bool(question.allow_multi));
    }
    if let Some(draft) = &question.draft_value {
        map.insert("draftValue".into(), json!(draft));
    }
    Value::Object(map)
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    json!({
        "survey_id": payload.survey_id,
        "survey_name": payload.survey_name,
        "language": payload.language,
        "status": payload.status.as_str(),
        "progress": payload.progress,
        "is_first": payload.is_first,
        "is_last": payload.is_last,
        "preview": payload.preview,
        "question": payload.question.as_ref().map(question_to_json),
        "thank_you": payload.thank_you.as_ref().map(|card| json!({
            "headline": card.headline,
            "subheader": card.subheader,
        })),
        "redirect": payload.redirect,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    let percent = (payload.progress * 100.0).round();
    lines.push(format!(
        "Survey: {} ({}) [{}%]",
        if payload.survey_name.is_empty() {
            &payload.survey_id
        } else {
            &payload.survey_name
        },
        payload.language,
        percent
    ));

    if let Some(question) = &payload.question {
        let mut headline = question.headline.clone();
        if question.required {
            headline.push_str(" *");
        }
        lines.push(headline);
        if let Some(subheader) = &question.subheader {
            lines.push(format!("  {}", subheader));
        }
        for (idx, choice) in question.choices.iter().enumerate() {
            let label = if choice.label.is_empty() {
                choice.id.as_str()
            } else {
                choice.label.as_str()
            };
            lines.push(format!("  {}) {}", idx + 1, label));
        }
        if let Some(hint) = input_hint(question) {
            lines.push(format!("  ({})", hint));
        }
        if let Some(draft) = &question.draft_value {
            lines.push(format!("  Saved answer: {}", draft.display()));
        }
    } else {
        match &payload.thank_you {
            Some(card) => {
                lines.push(card.headline.clone());
                if let Some(subheader) = &card.subheader {
                    lines.push(subheader.clone());
                }
            }
            None => lines.push("Thank you! Your response has been recorded.".to_string()),
        }
        if let Some(redirect) = &payload.redirect {
            lines.push(format!("Redirecting to {}", redirect));
        }
    }

    lines.join("\n")
}

fn input_hint(question: &RenderQuestion) -> Option<String> {
    match question.kind {
        QuestionType::Nps => Some("0-10".to_string()),
        QuestionType::Rating => question.range.map(|range| format!("1-{}", range)),
        QuestionType::Cta => Some("clicked / dismissed".to_string()),
        QuestionType::Consent => Some("accepted / dismissed".to_string()),
        QuestionType::MultipleChoiceMulti => Some("comma separated labels".to_string()),
        QuestionType::PictureSelection if question.allow_multi => {
            Some("comma separated choice ids".to_string())
        }
        QuestionType::PictureSelection => Some("one choice id".to_string()),
        _ => None,
    }
}
