//! Survey player: walks a respondent through a survey document.
//!
//! The player moves through three phases. It starts in
//! [`PlayerPhase::Prefilling`], where it resolves the respondent, resumes a
//! draft, records the display, and applies a first-question prefill. After
//! [`SurveyPlayer::start`] it is [`PlayerPhase::Active`] until the last
//! answer is submitted and it becomes [`PlayerPhase::Finished`].
//!
//! Local navigation never waits on the response backend succeeding; backend
//! failures are logged and the respondent keeps going.
//!
//! Going back always returns to the previous question in document order.
//! Branching history is not tracked, so after a logic jump `back` lands on
//! the question just before the current one, not on the question that
//! jumped.

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::answers::{AnswerValue, ResponseData};
use crate::backend::{InMemoryBackend, ResponseBackend, ResponseMeta, ResponsePayload};
use crate::branching::next_destination;
use crate::normalize::normalize;
use crate::options::PlayerOptions;
use crate::progress::calculate_progress;
use crate::redirect::{LogNavigator, Navigator, RedirectHandle, normalize_redirect_url, schedule_redirect};
use crate::spec::{END_DESTINATION, QuestionSpec, SurveySpec};
use crate::store::DraftStore;
use crate::validate::check;

/// Failures that leave the player unable to continue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayerError {
    #[error("survey '{0}' has no questions")]
    EmptySurvey(String),
    #[error("question '{0}' is not part of the survey")]
    QuestionNotFound(String),
    #[error("player is {0}; an active question is required")]
    NotActive(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    Prefilling,
    Active,
    Finished,
}

impl PlayerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerPhase::Prefilling => "prefilling",
            PlayerPhase::Active => "active",
            PlayerPhase::Finished => "finished",
        }
    }
}

/// Observable state of a player session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    /// Current question id, or [`END_DESTINATION`] once finished.
    pub current_question_id: String,
    pub progress: f64,
    pub finished: bool,
    pub response_id: Option<String>,
    pub display_id: Option<String>,
    /// Draft answer previously stored for the current question.
    pub draft_value: Option<AnswerValue>,
}

/// Result of submitting an answer.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The answer did not satisfy the question; nothing changed.
    Rejected,
    /// The player moved on to another question.
    Advanced { question_id: String },
    /// The survey is complete.
    Finished { redirect: Option<Url> },
}

/// Collaborators a player talks to.
#[derive(Clone)]
pub struct PlayerServices {
    pub backend: Arc<dyn ResponseBackend>,
    pub drafts: DraftStore,
    pub navigator: Arc<dyn Navigator>,
}

impl PlayerServices {
    pub fn new(
        backend: Arc<dyn ResponseBackend>,
        drafts: DraftStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            backend,
            drafts,
            navigator,
        }
    }

    /// In-memory backend and drafts, logging navigator.
    pub fn offline() -> Self {
        Self::new(
            Arc::new(InMemoryBackend::new()),
            DraftStore::in_memory(),
            Arc::new(LogNavigator),
        )
    }
}

/// Id of the question that follows `question` once it is answered with
/// `answer`, or `None` when the survey ends.
///
/// Logic rules win over document order. A rule pointing at a question that
/// does not exist is a structural failure.
pub fn next_question(
    survey: &SurveySpec,
    question: &QuestionSpec,
    answer: &AnswerValue,
) -> Result<Option<String>, PlayerError> {
    if let Some(destination) = next_destination(question, answer) {
        if destination == END_DESTINATION {
            return Ok(None);
        }
        return survey
            .question(destination)
            .map(|next| Some(next.id.clone()))
            .ok_or_else(|| PlayerError::QuestionNotFound(destination.to_string()));
    }
    let index = survey
        .question_index(&question.id)
        .ok_or_else(|| PlayerError::QuestionNotFound(question.id.clone()))?;
    Ok(survey.questions.get(index + 1).map(|next| next.id.clone()))
}

/// `value` as it is stored for `question`, or `None` when it does not fit.
///
/// The value must have the question type's shape and pass [`check`] on its
/// flat form. Empty values on optional questions become the skipped value.
fn fitted_answer(question: &QuestionSpec, value: AnswerValue) -> Option<AnswerValue> {
    let flat = value.to_flat_string();
    let valid = check(question, Some(&flat))?;
    if value.is_empty() {
        return Some(normalize(valid));
    }
    (question.kind.answer_shape() == Some(value.shape())).then_some(value)
}

pub struct SurveyPlayer {
    survey: Arc<SurveySpec>,
    options: PlayerOptions,
    services: PlayerServices,
    phase: PlayerPhase,
    state: PlayerState,
    answers: ResponseData,
    person_id: Option<String>,
    language: String,
    default_language: String,
    redirect: Option<RedirectHandle>,
}

impl std::fmt::Debug for SurveyPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurveyPlayer")
            .field("survey_id", &self.survey.id)
            .field("phase", &self.phase)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SurveyPlayer {
    /// Creates a player positioned on the first question, still prefilling.
    pub fn new(
        survey: Arc<SurveySpec>,
        options: PlayerOptions,
        services: PlayerServices,
    ) -> Result<Self, PlayerError> {
        let first = survey
            .first_question()
            .ok_or_else(|| PlayerError::EmptySurvey(survey.id.clone()))?
            .id
            .clone();
        let default_language = survey.default_language();
        let language = options
            .language
            .clone()
            .unwrap_or_else(|| default_language.clone());
        Ok(Self {
            state: PlayerState {
                current_question_id: first,
                progress: 0.0,
                finished: false,
                response_id: None,
                display_id: None,
                draft_value: None,
            },
            survey,
            options,
            services,
            phase: PlayerPhase::Prefilling,
            answers: ResponseData::new(),
            person_id: None,
            language,
            default_language,
            redirect: None,
        })
    }

    /// Runs the startup phase once: respondent, draft resume, display,
    /// prefill. Later calls do nothing.
    pub async fn start(&mut self) -> Result<(), PlayerError> {
        if self.phase != PlayerPhase::Prefilling {
            return Ok(());
        }

        if !self.options.preview {
            self.resolve_person().await;
        }
        self.resume_from_draft();
        if !self.options.preview {
            self.create_display().await;
        }
        self.apply_prefill().await?;

        if self.phase == PlayerPhase::Prefilling {
            self.phase = PlayerPhase::Active;
        }
        tracing::debug!(
            survey_id = %self.survey.id,
            question_id = %self.state.current_question_id,
            phase = self.phase.as_str(),
            "survey player started"
        );
        Ok(())
    }

    async fn resolve_person(&mut self) {
        let result = self
            .services
            .backend
            .get_or_create_person(
                &self.survey.environment_id,
                self.options.user_id.as_deref(),
                &self.options.base_url,
            )
            .await;
        match result {
            Ok(person) => self.person_id = Some(person.id),
            Err(err) => {
                tracing::warn!(survey_id = %self.survey.id, error = %err, "could not resolve respondent")
            }
        }
    }

    fn resume_from_draft(&mut self) {
        let Some(stored) = self.services.drafts.get_all(&self.survey.id) else {
            return;
        };
        let draft = stored
            .into_iter()
            .filter_map(|(question_id, value)| {
                let question = self.survey.question(&question_id)?;
                match fitted_answer(question, value) {
                    Some(value) => Some((question_id, value)),
                    None => {
                        tracing::warn!(
                            survey_id = %self.survey.id,
                            question_id = %question_id,
                            "dropping draft answer that does not fit its question"
                        );
                        None
                    }
                }
            })
            .collect::<ResponseData>();
        let questions = &self.survey.questions;
        let last_answered = questions
            .iter()
            .rposition(|question| draft.contains_key(&question.id));
        if let Some(index) = last_answered
            && let Some(next) = questions.get(index + 1)
        {
            tracing::info!(
                survey_id = %self.survey.id,
                question_id = %next.id,
                "resuming survey from draft"
            );
            self.state.current_question_id = next.id.clone();
            self.state.progress = calculate_progress(&self.survey, &next.id).unwrap_or(0.0);
            self.state.draft_value = draft.get(&next.id).cloned();
            self.answers = draft;
        }
    }

    async fn create_display(&mut self) {
        let result = self
            .services
            .backend
            .create_display(&self.survey.id, &self.options.base_url)
            .await;
        match result {
            Ok(display) => self.state.display_id = Some(display.id),
            Err(err) => {
                tracing::warn!(survey_id = %self.survey.id, error = %err, "could not record display")
            }
        }
    }

    async fn apply_prefill(&mut self) -> Result<(), PlayerError> {
        let survey = Arc::clone(&self.survey);
        let Some(first) = survey.first_question() else {
            return Ok(());
        };
        if self.state.current_question_id != first.id {
            return Ok(());
        }
        let Some(raw) = self.options.prefill.get(&first.id).cloned() else {
            return Ok(());
        };
        match check(first, Some(&raw)) {
            Some(valid) => {
                tracing::debug!(survey_id = %survey.id, question_id = %first.id, "prefilling first question");
                self.commit(first, normalize(valid)).await?;
            }
            None => {
                tracing::debug!(survey_id = %survey.id, question_id = %first.id, "ignoring invalid prefill value")
            }
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), PlayerError> {
        match self.phase {
            PlayerPhase::Active => Ok(()),
            other => Err(PlayerError::NotActive(other.as_str())),
        }
    }

    fn current_index(&self) -> Result<usize, PlayerError> {
        self.survey
            .question_index(&self.state.current_question_id)
            .ok_or_else(|| PlayerError::QuestionNotFound(self.state.current_question_id.clone()))
    }

    /// Validates, normalizes, and submits raw input for the current question.
    pub async fn submit_raw(&mut self, raw: Option<&str>) -> Result<SubmitOutcome, PlayerError> {
        self.ensure_active()?;
        let survey = Arc::clone(&self.survey);
        let question = &survey.questions[self.current_index()?];
        match check(question, raw) {
            Some(valid) => self.commit(question, normalize(valid)).await,
            None => Ok(SubmitOutcome::Rejected),
        }
    }

    /// Submits an already typed answer for the current question.
    ///
    /// Values whose shape does not fit the question type, or that fail the
    /// question constraints, are rejected.
    pub async fn submit(&mut self, value: AnswerValue) -> Result<SubmitOutcome, PlayerError> {
        self.ensure_active()?;
        let survey = Arc::clone(&self.survey);
        let question = &survey.questions[self.current_index()?];
        match fitted_answer(question, value) {
            Some(value) => self.commit(question, value).await,
            None => Ok(SubmitOutcome::Rejected),
        }
    }

    async fn commit(
        &mut self,
        question: &QuestionSpec,
        value: AnswerValue,
    ) -> Result<SubmitOutcome, PlayerError> {
        let next = next_question(&self.survey, question, &value)?;
        self.answers.insert(question.id.clone(), value.clone());
        let finished = next.is_none();

        if let Some(next_id) = &next {
            tracing::debug!(
                survey_id = %self.survey.id,
                from = %question.id,
                to = %next_id,
                "advancing to next question"
            );
            self.state.draft_value = self.services.drafts.get_one(&self.survey.id, next_id);
            self.state.progress = calculate_progress(&self.survey, next_id).unwrap_or(0.0);
            self.state.current_question_id = next_id.clone();
        }

        self.sync_response(finished, &question.id, &value).await;

        match next {
            Some(question_id) => Ok(SubmitOutcome::Advanced { question_id }),
            None => Ok(SubmitOutcome::Finished {
                redirect: self.finish(&value),
            }),
        }
    }

    async fn sync_response(&mut self, finished: bool, question_id: &str, value: &AnswerValue) {
        if self.options.preview {
            return;
        }
        let payload = self.payload(finished);
        let backend = Arc::clone(&self.services.backend);
        let base_url = self.options.base_url.clone();

        match self.state.response_id.clone() {
            None => match backend.create_response(&payload, &base_url).await {
                Ok(created) => {
                    tracing::info!(survey_id = %self.survey.id, response_id = %created.id, "response created");
                    self.state.response_id = Some(created.id);
                    if let Some(display_id) = self.state.display_id.clone()
                        && let Err(err) = backend.mark_display_responded(&display_id, &base_url).await
                    {
                        tracing::warn!(display_id = %display_id, error = %err, "could not mark display responded");
                    }
                }
                Err(err) => {
                    tracing::warn!(survey_id = %self.survey.id, error = %err, "could not create response")
                }
            },
            Some(response_id) => {
                if let Err(err) = backend
                    .update_response(&payload, &response_id, &base_url)
                    .await
                {
                    tracing::warn!(response_id = %response_id, error = %err, "could not update response");
                }
            }
        }

        let answer = ResponseData::from([(question_id.to_string(), value.clone())]);
        self.services.drafts.store(&self.survey.id, &answer);
    }

    fn finish(&mut self, last_answer: &AnswerValue) -> Option<Url> {
        self.phase = PlayerPhase::Finished;
        self.state.finished = true;
        self.state.progress = 1.0;
        self.state.current_question_id = END_DESTINATION.to_string();
        self.state.draft_value = None;
        self.services.drafts.clear(&self.survey.id);
        tracing::info!(survey_id = %self.survey.id, "survey finished");

        let raw = self.survey.redirect_url.as_deref()?;
        if last_answer.is_dismissed() {
            return None;
        }
        let url = match normalize_redirect_url(raw) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(redirect_url = raw, error = %err, "ignoring invalid redirect url");
                return None;
            }
        };
        self.redirect = schedule_redirect(
            url.clone(),
            self.options.redirect_delay,
            Arc::clone(&self.services.navigator),
        );
        Some(url)
    }

    /// Moves to the previous question in document order.
    ///
    /// An in-progress `answer` for the current question is kept in the draft
    /// first, unless it does not fit the question. On the first question this
    /// does nothing.
    pub async fn back(&mut self, answer: Option<AnswerValue>) -> Result<(), PlayerError> {
        self.ensure_active()?;
        let index = self.current_index()?;
        if index == 0 {
            return Ok(());
        }
        let question = &self.survey.questions[index];
        if let Some(answer) = answer.and_then(|answer| fitted_answer(question, answer)) {
            let data = ResponseData::from([(question.id.clone(), answer)]);
            self.services.drafts.store(&self.survey.id, &data);
        }
        let previous = self.survey.questions[index - 1].id.clone();
        tracing::debug!(survey_id = %self.survey.id, to = %previous, "going back");
        self.state.draft_value = self.services.drafts.get_one(&self.survey.id, &previous);
        self.state.progress = calculate_progress(&self.survey, &previous).unwrap_or(0.0);
        self.state.current_question_id = previous;
        Ok(())
    }

    /// Moves to the next question in document order, keeping `answer` only
    /// in the draft. On the last question the answer is submitted instead.
    ///
    /// Answers that [`SurveyPlayer::submit`] would reject are rejected here
    /// too, without moving.
    pub async fn advance(&mut self, answer: AnswerValue) -> Result<SubmitOutcome, PlayerError> {
        self.ensure_active()?;
        let index = self.current_index()?;
        let Some(next) = self.survey.questions.get(index + 1).map(|next| next.id.clone()) else {
            return self.submit(answer).await;
        };
        let Some(answer) = fitted_answer(&self.survey.questions[index], answer) else {
            return Ok(SubmitOutcome::Rejected);
        };
        let data = ResponseData::from([(self.state.current_question_id.clone(), answer)]);
        self.services.drafts.store(&self.survey.id, &data);
        self.state.draft_value = self.services.drafts.get_one(&self.survey.id, &next);
        self.state.progress = calculate_progress(&self.survey, &next).unwrap_or(0.0);
        self.state.current_question_id = next.clone();
        Ok(SubmitOutcome::Advanced { question_id: next })
    }

    /// Returns to the first question. Remote response and draft are kept;
    /// a pending redirect is cancelled.
    pub fn restart(&mut self) {
        if self.phase == PlayerPhase::Prefilling {
            return;
        }
        if let Some(redirect) = self.redirect.take() {
            redirect.cancel();
        }
        let first = self.survey.questions[0].id.clone();
        self.state.draft_value = self.services.drafts.get_one(&self.survey.id, &first);
        self.state.current_question_id = first;
        self.state.progress = 0.0;
        self.state.finished = false;
        self.phase = PlayerPhase::Active;
        tracing::debug!(survey_id = %self.survey.id, "survey restarted");
    }

    /// Cancels a scheduled redirect, if any.
    pub fn cancel_redirect(&mut self) {
        if let Some(redirect) = self.redirect.take() {
            redirect.cancel();
        }
    }

    /// Payload describing the response as it stands.
    pub fn payload(&self, finished: bool) -> ResponsePayload {
        ResponsePayload {
            survey_id: self.survey.id.clone(),
            person_id: self.person_id.clone(),
            finished,
            data: self.answers.clone(),
            meta: ResponseMeta {
                url: self.options.page_url.clone(),
            },
            language: Some(self.language.clone()),
        }
    }

    pub fn survey(&self) -> &SurveySpec {
        &self.survey
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn phase(&self) -> PlayerPhase {
        self.phase
    }

    pub fn progress(&self) -> f64 {
        self.state.progress
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    pub fn is_preview(&self) -> bool {
        self.options.preview
    }

    pub fn answers(&self) -> &ResponseData {
        &self.answers
    }

    pub fn person_id(&self) -> Option<&str> {
        self.person_id.as_deref()
    }

    /// Current question, `None` once finished.
    pub fn current_question(&self) -> Option<&QuestionSpec> {
        self.survey.question(&self.state.current_question_id)
    }

    pub fn is_first_question(&self) -> bool {
        self.survey
            .first_question()
            .is_some_and(|question| question.id == self.state.current_question_id)
    }

    pub fn is_last_question(&self) -> bool {
        self.survey
            .last_question()
            .is_some_and(|question| question.id == self.state.current_question_id)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
    }

    pub fn pending_redirect(&self) -> Option<&RedirectHandle> {
        self.redirect.as_ref()
    }
}
