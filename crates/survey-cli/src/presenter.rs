use std::fmt::Write;

use survey_spec::render::RenderQuestion;
use survey_spec::{QuestionType, RenderPayload, ResponsePayload, render_json_ui, render_text};

/// Controls which bits of state the player prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: question prompts only.
    Clean,
    /// Verbose output: progress, question ids, and input hints.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum RenderMode {
    Text,
    Json,
}

/// Prints each player step and the final response.
pub struct PlayerPresenter {
    verbosity: Verbosity,
    mode: RenderMode,
}

impl PlayerPresenter {
    pub fn new(verbosity: Verbosity, mode: RenderMode) -> Self {
        Self { verbosity, mode }
    }

    pub fn show_step(&self, payload: &RenderPayload) {
        match self.mode {
            RenderMode::Text => println!("{}", render_text(payload)),
            RenderMode::Json => {
                let ui = render_json_ui(payload);
                match serde_json::to_string_pretty(&ui) {
                    Ok(pretty) => println!("{}", pretty),
                    Err(err) => eprintln!("Failed to render step as JSON: {}", err),
                }
            }
        }
        if self.verbosity.is_verbose()
            && let Some(question) = &payload.question
        {
            println!(
                "[{} · {} · first={} last={}]",
                question.id,
                question.kind.as_str(),
                payload.is_first,
                payload.is_last
            );
        }
    }

    pub fn show_commands(&self, payload: &RenderPayload) {
        let mut commands = vec![":exit", ":restart", ":lang <code>"];
        if !payload.is_first {
            commands.insert(0, ":back");
        }
        println!("Commands: {}", commands.join(", "));
    }

    pub fn show_rejected(&self, question: &RenderQuestion) {
        eprintln!("Invalid answer for '{}'.", question.headline);
        if let Some(expected) = expected_input(question) {
            eprintln!("  Expected: {}", expected);
        }
    }

    pub fn show_completion(&self, payload: &ResponsePayload) {
        println!("Done ✅");
        match payload.to_json_pretty() {
            Ok(pretty) => println!("{}", pretty),
            Err(err) => eprintln!("Failed to serialize response to JSON: {}", err),
        }
        match payload.to_cbor() {
            Ok(bytes) => println!("Response (CBOR hex): {}", encode_hex(&bytes)),
            Err(err) => eprintln!("Failed to serialize response to CBOR: {}", err),
        }
    }
}

/// Human description of what a question accepts.
pub fn expected_input(question: &RenderQuestion) -> Option<String> {
    let labels = || {
        question
            .choices
            .iter()
            .map(|choice| choice.label.as_str())
            .collect::<Vec<_>>()
            .join("/")
    };
    match question.kind {
        QuestionType::OpenText if question.required => Some("non-empty text".to_string()),
        QuestionType::MultipleChoiceSingle => Some(format!("one of {} or its number", labels())),
        QuestionType::MultipleChoiceMulti => {
            Some(format!("comma separated choices from {}", labels()))
        }
        QuestionType::Nps => Some("a whole number from 0 to 10".to_string()),
        QuestionType::Rating => question
            .range
            .map(|range| format!("a whole number from 1 to {}", range)),
        QuestionType::Cta if question.required => Some("clicked".to_string()),
        QuestionType::Cta => Some("clicked or dismissed".to_string()),
        QuestionType::Consent if question.required => Some("accepted".to_string()),
        QuestionType::Consent => Some("accepted or dismissed".to_string()),
        QuestionType::PictureSelection => {
            let ids = question
                .choices
                .iter()
                .map(|choice| choice.id.as_str())
                .collect::<Vec<_>>()
                .join("/");
            Some(format!("choice ids from {}", ids))
        }
        _ => None,
    }
}

pub fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(&mut encoded, "{:02x}", byte).expect("writing to string cannot fail");
    }
    encoded
}
