mod presenter;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use component_survey::{normalize_answer, validate_answer};
use presenter::{PlayerPresenter, RenderMode, Verbosity};
use serde_json::{Value, json};
use survey_spec::render::RenderQuestion;
use survey_spec::{
    DraftStore, FileStorage, InMemoryBackend, LogNavigator, PlayerOptions, PlayerServices,
    QuestionType, SubmitOutcome, SurveyPlayer, SurveySpec, build_render_payload, check_survey,
    incomplete_translations,
};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Terminal survey player",
    long_about = "Plays survey documents in a text shell and checks them for structural problems"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a survey question by question.
    Play {
        /// Path to the survey JSON document.
        #[arg(long, value_name = "SURVEY")]
        survey: PathBuf,
        /// Page URL the survey is opened with (preview, userId, lang and prefill parameters).
        #[arg(long, value_name = "URL")]
        url: Option<String>,
        /// Directory keeping draft answers between runs.
        #[arg(long, value_name = "DIR")]
        draft_dir: Option<PathBuf>,
        /// Language code to display.
        #[arg(long, value_name = "CODE")]
        lang: Option<String>,
        /// Run without recording anything remotely.
        #[arg(long)]
        preview: bool,
        /// Render output mode for each step.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
        /// Show verbose output and debug logging.
        #[arg(long, alias = "debug")]
        verbose: bool,
    },
    /// Check a survey document for structural problems.
    Check {
        /// Path to the survey JSON document.
        #[arg(long, value_name = "SURVEY")]
        survey: PathBuf,
        /// Comma separated languages every text must be translated into.
        #[arg(long, value_name = "CODES", value_delimiter = ',')]
        languages: Vec<String>,
    },
    /// Print the JSON schema of survey documents.
    Schema,
    /// Validate a raw answer for one question and print its normalized value.
    ValidateAnswer {
        /// Path to the survey JSON document.
        #[arg(long, value_name = "SURVEY")]
        survey: PathBuf,
        /// Question id.
        #[arg(long, value_name = "ID")]
        question: String,
        /// Raw answer as typed by a respondent.
        #[arg(long, value_name = "RAW", allow_hyphen_values = true)]
        value: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let verbose = matches!(cli.command, Command::Play { verbose: true, .. });
    init_tracing(verbose);

    match cli.command {
        Command::Play {
            survey,
            url,
            draft_dir,
            lang,
            preview,
            format,
            verbose,
        } => {
            let options = build_options(url.as_deref(), lang, preview)?;
            run_play(survey, options, draft_dir, format, verbose).await
        }
        Command::Check { survey, languages } => run_check(survey, languages),
        Command::Schema => run_schema(),
        Command::ValidateAnswer {
            survey,
            question,
            value,
        } => run_validate_answer(survey, &question, &value),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn load_survey(path: &Path) -> CliResult<(String, SurveySpec)> {
    let contents = fs::read_to_string(path)?;
    let survey = serde_json::from_str(&contents)?;
    Ok((contents, survey))
}

fn build_options(url: Option<&str>, lang: Option<String>, preview: bool) -> CliResult<PlayerOptions> {
    let mut options = match url {
        Some(url) => PlayerOptions::from_url_str(url)?,
        None => PlayerOptions::default(),
    };
    if preview {
        options.preview = true;
        options.user_id = None;
    }
    if let Some(lang) = lang {
        options.language = Some(lang);
    }
    Ok(options)
}

async fn run_play(
    survey_path: PathBuf,
    options: PlayerOptions,
    draft_dir: Option<PathBuf>,
    format: RenderMode,
    verbose: bool,
) -> CliResult<()> {
    let (_, survey) = load_survey(&survey_path)?;
    tracing::debug!(
        survey_id = %survey.id,
        questions = survey.questions.len(),
        preview = options.preview,
        "loaded survey"
    );
    let drafts = match draft_dir {
        Some(dir) => DraftStore::new(Arc::new(FileStorage::new(dir))),
        None => DraftStore::in_memory(),
    };
    let services = PlayerServices::new(
        Arc::new(InMemoryBackend::new()),
        drafts,
        Arc::new(LogNavigator),
    );
    let mut player = SurveyPlayer::new(Arc::new(survey), options, services)?;
    player.start().await?;

    let presenter = PlayerPresenter::new(Verbosity::from_verbose(verbose), format);

    loop {
        let payload = build_render_payload(&player);
        presenter.show_step(&payload);
        if player.is_finished() {
            presenter.show_completion(&player.payload(true));
            break;
        }
        let Some(question) = payload.question.as_ref() else {
            return Err("player has no current question".into());
        };
        if verbose {
            presenter.show_commands(&payload);
        }

        let input = read_answer()?;
        match parse_command(&input) {
            Some(ShellCommand::Exit) => return Err("survey aborted by user".into()),
            Some(ShellCommand::Back) => player.back(None).await?,
            Some(ShellCommand::Restart) => player.restart(),
            Some(ShellCommand::Lang(code)) => {
                if !player.survey().is_available_in(&code) {
                    eprintln!("Survey has no '{}' translation, falling back to defaults.", code);
                }
                player.set_language(code);
            }
            Some(ShellCommand::Unknown(name)) => eprintln!("Unknown command ':{}'.", name),
            None => {
                let prepared = prepare_answer(question, &input);
                if player.submit_raw(Some(&prepared)).await? == SubmitOutcome::Rejected {
                    presenter.show_rejected(question);
                }
            }
        }
    }

    Ok(())
}

/// Player shell commands. They start with `:` so any other line, including
/// the word "back", is an answer.
#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Exit,
    Back,
    Restart,
    Lang(String),
    Unknown(String),
}

fn parse_command(input: &str) -> Option<ShellCommand> {
    let command = input.strip_prefix(':')?;
    let (name, argument) = match command.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (command, ""),
    };
    Some(match name.to_ascii_lowercase().as_str() {
        "exit" => ShellCommand::Exit,
        "back" => ShellCommand::Back,
        "restart" => ShellCommand::Restart,
        "lang" if !argument.is_empty() => ShellCommand::Lang(argument.to_string()),
        _ => ShellCommand::Unknown(command.to_string()),
    })
}

fn read_answer() -> CliResult<String> {
    print!("> ");
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Err("input closed before the survey finished".into());
    }
    Ok(input.trim().to_string())
}

/// Maps shell shortcuts to the raw form the validator expects: choice numbers
/// become labels (or ids for picture choices) and list separators are tidied.
fn prepare_answer(question: &RenderQuestion, raw: &str) -> String {
    let pick = |token: &str| -> String {
        let token = token.trim();
        match token.parse::<usize>() {
            Ok(number) if number >= 1 && number <= question.choices.len() => {
                let choice = &question.choices[number - 1];
                if question.kind == QuestionType::PictureSelection || choice.label.is_empty() {
                    choice.id.clone()
                } else {
                    choice.label.clone()
                }
            }
            _ => token.to_string(),
        }
    };
    match question.kind {
        QuestionType::MultipleChoiceSingle => pick(raw),
        QuestionType::MultipleChoiceMulti | QuestionType::PictureSelection => {
            raw.split(',').map(pick).collect::<Vec<_>>().join(",")
        }
        _ => raw.trim().to_string(),
    }
}

fn run_check(survey_path: PathBuf, languages: Vec<String>) -> CliResult<()> {
    let (_, survey) = load_survey(&survey_path)?;
    let issues = check_survey(&survey);
    let untranslated = if languages.is_empty() {
        Vec::new()
    } else {
        incomplete_translations(&survey, &languages)
    };

    let valid = issues.is_empty() && untranslated.is_empty();
    println!("Check result: {}", if valid { "valid" } else { "invalid" });
    if !issues.is_empty() {
        println!("Issues:");
        for issue in &issues {
            println!(
                "  {} [{}] {}",
                issue.path.as_deref().unwrap_or("<unknown>"),
                issue.code,
                issue.message
            );
        }
    }
    if !untranslated.is_empty() {
        println!("Missing translations ({}):", languages.join(", "));
        for (question_id, field) in &untranslated {
            println!("  {}.{}", question_id, field);
        }
    }

    if valid {
        Ok(())
    } else {
        Err("survey check failed".into())
    }
}

fn run_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(SurveySpec);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_validate_answer(survey_path: PathBuf, question_id: &str, raw: &str) -> CliResult<()> {
    let (contents, survey) = load_survey(&survey_path)?;
    let config_json = json!({ "survey_json": contents }).to_string();
    let validation =
        parse_component_result(&validate_answer(&survey.id, &config_json, question_id, raw))?;
    if validation["valid"] != Value::Bool(true) {
        println!("Answer is invalid for '{}'", question_id);
        return Err("answer validation failed".into());
    }
    let normalized =
        parse_component_result(&normalize_answer(&survey.id, &config_json, question_id, raw))?;
    println!("Answer is valid for '{}'", question_id);
    println!("{}", serde_json::to_string_pretty(&normalized["value"])?);
    Ok(())
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}
