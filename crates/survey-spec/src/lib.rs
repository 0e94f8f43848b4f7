#![allow(missing_docs)]

pub mod answers;
pub mod backend;
pub mod branching;
pub mod check;
pub mod i18n;
pub mod normalize;
pub mod options;
pub mod player;
pub mod progress;
pub mod recall;
pub mod redirect;
pub mod render;
pub mod spec;
pub mod store;
pub mod validate;

pub use answers::{AnswerValue, DISMISSED, ResponseData};
pub use backend::{
    BackendCall, BackendError, BackendResult, CreatedResponse, InMemoryBackend, ResponseBackend,
    ResponseMeta, ResponsePayload,
};
pub use branching::next_destination;
pub use check::{SurveyIssue, check_survey};
pub use i18n::{
    FALLBACK_LANGUAGE, LocalizedText, SurveyLanguage, contains_translations, default_language,
    incomplete_translations, is_complete, resolve, translate_survey,
};
pub use normalize::normalize;
pub use options::PlayerOptions;
pub use player::{
    PlayerError, PlayerPhase, PlayerServices, PlayerState, SubmitOutcome, SurveyPlayer,
    next_question,
};
pub use progress::calculate_progress;
pub use redirect::{
    LogNavigator, Navigator, REDIRECT_DELAY, RedirectHandle, normalize_redirect_url,
    schedule_redirect,
};
pub use render::{
    RenderPayload, RenderQuestion, RenderStatus, build_question_payload, build_render_payload,
    render_json_ui, render_text,
};
pub use spec::{
    END_DESTINATION, LogicCondition, LogicRule, QuestionSpec, QuestionType, SurveySpec,
};
pub use store::{DraftStorage, DraftStore, FileStorage, MemoryStorage, StoreError, draft_key};
pub use validate::{ValidAnswer, check, validate};
