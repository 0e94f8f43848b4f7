//! Remote collaborators the player reports to.
//!
//! The player never depends on these calls succeeding: failures are logged
//! and local navigation carries on.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_cbor::{to_vec, value::to_value};
use thiserror::Error;

use crate::answers::ResponseData;

pub type BackendResult<T> = Result<T, BackendError>;

/// Failures reported by a response backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("response backend unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Resolved respondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Person {
    pub id: String,
}

/// Recorded survey impression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Display {
    pub id: String,
}

/// Page metadata attached to a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Body sent when creating or updating a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub survey_id: String,
    pub person_id: Option<String>,
    pub finished: bool,
    pub data: ResponseData,
    #[serde(default)]
    pub meta: ResponseMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ResponsePayload {
    /// Canonical CBOR encoding of the payload.
    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        let canonical = to_value(self)?;
        to_vec(&canonical)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Response as echoed back by the backend after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreatedResponse {
    pub id: String,
    pub data: ResponseData,
}

/// Storage service for respondents, displays, and responses.
///
/// Every call carries the base URL of the service because the player may be
/// embedded in a page served from another origin.
#[async_trait]
pub trait ResponseBackend: Send + Sync {
    async fn get_or_create_person(
        &self,
        environment_id: &str,
        user_id: Option<&str>,
        base_url: &str,
    ) -> BackendResult<Person>;

    async fn create_display(&self, survey_id: &str, base_url: &str) -> BackendResult<Display>;

    async fn mark_display_responded(&self, display_id: &str, base_url: &str) -> BackendResult<()>;

    async fn create_response(
        &self,
        payload: &ResponsePayload,
        base_url: &str,
    ) -> BackendResult<CreatedResponse>;

    async fn update_response(
        &self,
        payload: &ResponsePayload,
        response_id: &str,
        base_url: &str,
    ) -> BackendResult<()>;
}

/// Stored response kept by [`InMemoryBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub id: String,
    pub payload: ResponsePayload,
}

/// Call log entry, handy for asserting what the player reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    GetOrCreatePerson { user_id: Option<String> },
    CreateDisplay { survey_id: String },
    MarkDisplayResponded { display_id: String },
    CreateResponse { survey_id: String, finished: bool },
    UpdateResponse { response_id: String, finished: bool },
}

#[derive(Debug, Default)]
struct InMemoryState {
    next_id: usize,
    responses: Vec<StoredResponse>,
    responded_displays: Vec<String>,
    calls: Vec<BackendCall>,
    failure: Option<BackendError>,
}

/// Backend that keeps everything in memory (tests, local preview, CLI).
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<InMemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail with `error` until cleared.
    pub fn fail_with(&self, error: Option<BackendError>) {
        self.lock().failure = error;
    }

    pub fn responses(&self) -> Vec<StoredResponse> {
        self.lock().responses.clone()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    pub fn responded_displays(&self) -> Vec<String> {
        self.lock().responded_displays.clone()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: BackendCall) -> BackendResult<MutexGuard<'_, InMemoryState>> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.failure.clone() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

fn next_id(state: &mut InMemoryState, prefix: &str) -> String {
    state.next_id += 1;
    format!("{}-{}", prefix, state.next_id)
}

#[async_trait]
impl ResponseBackend for InMemoryBackend {
    async fn get_or_create_person(
        &self,
        _environment_id: &str,
        user_id: Option<&str>,
        _base_url: &str,
    ) -> BackendResult<Person> {
        let mut state = self.record(BackendCall::GetOrCreatePerson {
            user_id: user_id.map(str::to_string),
        })?;
        let id = match user_id {
            Some(user_id) => format!("person-{}", user_id),
            None => next_id(&mut state, "person"),
        };
        Ok(Person { id })
    }

    async fn create_display(&self, survey_id: &str, _base_url: &str) -> BackendResult<Display> {
        let mut state = self.record(BackendCall::CreateDisplay {
            survey_id: survey_id.to_string(),
        })?;
        Ok(Display {
            id: next_id(&mut state, "display"),
        })
    }

    async fn mark_display_responded(&self, display_id: &str, _base_url: &str) -> BackendResult<()> {
        let mut state = self.record(BackendCall::MarkDisplayResponded {
            display_id: display_id.to_string(),
        })?;
        state.responded_displays.push(display_id.to_string());
        Ok(())
    }

    async fn create_response(
        &self,
        payload: &ResponsePayload,
        _base_url: &str,
    ) -> BackendResult<CreatedResponse> {
        let mut state = self.record(BackendCall::CreateResponse {
            survey_id: payload.survey_id.clone(),
            finished: payload.finished,
        })?;
        let id = next_id(&mut state, "response");
        state.responses.push(StoredResponse {
            id: id.clone(),
            payload: payload.clone(),
        });
        Ok(CreatedResponse {
            id,
            data: payload.data.clone(),
        })
    }

    async fn update_response(
        &self,
        payload: &ResponsePayload,
        response_id: &str,
        _base_url: &str,
    ) -> BackendResult<()> {
        let mut state = self.record(BackendCall::UpdateResponse {
            response_id: response_id.to_string(),
            finished: payload.finished,
        })?;
        let stored = state
            .responses
            .iter_mut()
            .find(|stored| stored.id == response_id)
            .ok_or_else(|| BackendError::NotFound(response_id.to_string()))?;
        stored.payload.data.extend(payload.data.clone());
        stored.payload.finished = payload.finished;
        stored.payload.meta = payload.meta.clone();
        Ok(())
    }
}
