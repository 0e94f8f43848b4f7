use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use survey_spec::{
    AnswerValue, END_DESTINATION, LocalizedText, PlayerError, RenderPayload, ResponseData,
    SurveySpec, build_question_payload, check as check_answer, check_survey, next_question, normalize,
    render_json_ui as survey_render_json_ui, render_text as survey_render_text,
};

const DEFAULT_SURVEY: &str = include_str!("../assets/default_survey.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse answer: {0}")]
    AnswerParse(#[source] serde_json::Error),
    #[error("failed to parse localized text: {0}")]
    TextParse(#[source] serde_json::Error),
    #[error("survey '{0}' is not available")]
    SurveyUnavailable(String),
    #[error("question '{0}' is not part of the survey")]
    QuestionUnavailable(String),
    #[error("answer for question '{0}' is not valid")]
    InvalidAnswer(String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Player(#[from] PlayerError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    survey_json: Option<String>,
}

fn load_survey(config_json: &str) -> Result<SurveySpec, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let survey_json = config.survey_json.as_deref().unwrap_or(DEFAULT_SURVEY);

    serde_json::from_str(survey_json).map_err(ComponentError::ConfigParse)
}

fn ensure_survey(survey_id: &str, config_json: &str) -> Result<SurveySpec, ComponentError> {
    let survey = load_survey(config_json)?;
    if survey.id != survey_id {
        Err(ComponentError::SurveyUnavailable(survey_id.to_string()))
    } else {
        Ok(survey)
    }
}

fn parse_context(ctx_json: &str) -> Value {
    serde_json::from_str(ctx_json).unwrap_or_else(|_| Value::Object(Map::new()))
}

fn parse_answers(answers_json: &str) -> ResponseData {
    serde_json::from_str(answers_json).unwrap_or_default()
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

pub fn describe(survey_id: &str, config_json: &str) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|survey| {
        serde_json::to_value(survey).map_err(ComponentError::JsonEncode)
    }))
}

pub fn check(survey_id: &str, config_json: &str) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|survey| {
        let issues = check_survey(&survey);
        Ok(json!({
            "valid": issues.is_empty(),
            "issues": serde_json::to_value(issues).map_err(ComponentError::JsonEncode)?,
        }))
    }))
}

pub fn validate_answer(survey_id: &str, config_json: &str, question_id: &str, raw: &str) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|survey| {
        let question = survey
            .question(question_id)
            .ok_or_else(|| ComponentError::QuestionUnavailable(question_id.to_string()))?;
        Ok(json!({
            "question_id": question_id,
            "valid": check_answer(question, Some(raw)).is_some(),
        }))
    }))
}

pub fn normalize_answer(
    survey_id: &str,
    config_json: &str,
    question_id: &str,
    raw: &str,
) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|survey| {
        let question = survey
            .question(question_id)
            .ok_or_else(|| ComponentError::QuestionUnavailable(question_id.to_string()))?;
        let valid = check_answer(question, Some(raw))
            .ok_or_else(|| ComponentError::InvalidAnswer(question_id.to_string()))?;
        Ok(json!({
            "question_id": question_id,
            "value": normalize(valid),
        }))
    }))
}

pub fn next_destination(
    survey_id: &str,
    config_json: &str,
    question_id: &str,
    answer_json: &str,
) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|survey| {
        let question = survey
            .question(question_id)
            .ok_or_else(|| ComponentError::QuestionUnavailable(question_id.to_string()))?;
        let answer: AnswerValue =
            serde_json::from_str(answer_json).map_err(ComponentError::AnswerParse)?;
        let next = next_question(&survey, question, &answer)?;
        Ok(json!({
            "status": if next.is_some() { "need_input" } else { "complete" },
            "next_question_id": next,
        }))
    }))
}

pub fn resolve_text(text_json: &str, language: &str, default_language: &str, answers_json: &str) -> String {
    respond(
        serde_json::from_str::<LocalizedText>(text_json)
            .map_err(ComponentError::TextParse)
            .map(|text| {
                let answers = parse_answers(answers_json);
                let resolved = text.resolve(language, default_language);
                json!({ "text": survey_spec::recall::apply(resolved, &answers) })
            }),
    )
}

fn render_payload(
    survey_id: &str,
    config_json: &str,
    ctx_json: &str,
    answers_json: &str,
) -> Result<RenderPayload, ComponentError> {
    let survey = ensure_survey(survey_id, config_json)?;
    let ctx = parse_context(ctx_json);
    let answers = parse_answers(answers_json);
    let question_id = match ctx.get("question_id").and_then(Value::as_str) {
        Some(id) if id == END_DESTINATION || survey.question(id).is_some() => id.to_string(),
        Some(id) => return Err(ComponentError::QuestionUnavailable(id.to_string())),
        None => survey
            .first_question()
            .map(|question| question.id.clone())
            .ok_or_else(|| PlayerError::EmptySurvey(survey.id.clone()))?,
    };
    let language = ctx.get("language").and_then(Value::as_str);
    Ok(build_question_payload(
        &survey,
        &question_id,
        language,
        &answers,
    ))
}

pub fn render_text(survey_id: &str, config_json: &str, ctx_json: &str, answers_json: &str) -> String {
    respond_string(
        render_payload(survey_id, config_json, ctx_json, answers_json)
            .map(|payload| survey_render_text(&payload)),
    )
}

pub fn render_json_ui(
    survey_id: &str,
    config_json: &str,
    ctx_json: &str,
    answers_json: &str,
) -> String {
    respond(
        render_payload(survey_id, config_json, ctx_json, answers_json)
            .map(|payload| survey_render_json_ui(&payload)),
    )
}
