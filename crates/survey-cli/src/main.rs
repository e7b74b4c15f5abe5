mod logging;
mod sink;
mod wizard;

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use logging::{LogConfig, init_logging};
use serde_json::Number;
use sink::{DraftFile, ResponseSink};
use survey_session::{
    ControllerError, ControllerOptions, DEFAULT_AUTOSAVE_INTERVAL, FormController, SubmitOutcome,
};
use survey_spec::{
    AnswerSet, AnswerValue, QuestionType, RenderQuestion, SurveyDefinition, ValidationReport,
    validate_answers,
};
use tracing::{info, warn};
use wizard::{AnswerParseError, PromptContext, RenderMode, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Text-based survey runner",
    long_about = "Runs branching survey definitions in the terminal and validates stored responses"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fill in a survey interactively.
    Run {
        /// Path to the survey definition JSON.
        #[arg(long, value_name = "DEFINITION")]
        definition: PathBuf,
        /// Previously saved answers or draft to resume from.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Where the completed response is written (stdout when omitted).
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Draft file; enables save-draft and autosave.
        #[arg(long, value_name = "FILE")]
        drafts: Option<PathBuf>,
        /// Render output mode for each section.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
        /// Seconds between autosaves.
        #[arg(
            long,
            value_name = "SECS",
            env = "TRUSTY_SURVEY_AUTOSAVE_SECS",
            default_value_t = DEFAULT_AUTOSAVE_INTERVAL.as_secs(),
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        autosave_secs: u64,
    },
    /// Validate stored answers against a definition.
    Validate {
        /// Path to the survey definition JSON.
        #[arg(long, value_name = "DEFINITION")]
        definition: PathBuf,
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Check a definition for structural problems.
    Check {
        /// Path to the survey definition JSON.
        #[arg(long, value_name = "DEFINITION")]
        definition: PathBuf,
    },
    /// Print the JSON Schema of the definition format.
    Schema,
}

struct RunArgs {
    definition: PathBuf,
    answers: Option<PathBuf>,
    out: Option<PathBuf>,
    drafts: Option<PathBuf>,
    format: RenderMode,
    autosave_interval: Duration,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose))?;
    match cli.command {
        Command::Run {
            definition,
            answers,
            out,
            drafts,
            format,
            autosave_secs,
        } => run_survey(RunArgs {
            definition,
            answers,
            out,
            drafts,
            format,
            autosave_interval: Duration::from_secs(autosave_secs),
        }),
        Command::Validate {
            definition,
            answers,
        } => run_validate(&definition, &answers),
        Command::Check { definition } => run_check(&definition),
        Command::Schema => run_schema(),
    }
}

fn load_definition(path: &Path) -> CliResult<SurveyDefinition> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read definition {}: {}", path.display(), err))?;
    Ok(serde_json::from_str(&raw)?)
}

fn load_answers(path: &Path) -> CliResult<AnswerSet> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read answers {}: {}", path.display(), err))?;
    Ok(serde_json::from_str(&raw)?)
}

fn run_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(SurveyDefinition);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_check(definition_path: &Path) -> CliResult<()> {
    let definition = load_definition(definition_path)?;
    match definition.lint() {
        Ok(()) => {
            println!(
                "Definition '{}' is valid: {} sections, {} questions",
                definition.id,
                definition.sections.len(),
                definition.questions().count()
            );
            Ok(())
        }
        Err(problems) => {
            println!("Definition '{}' has problems:", definition.id);
            for problem in &problems {
                println!("  - {}", problem);
            }
            Err(format!("{} definition problem(s)", problems.len()).into())
        }
    }
}

fn run_validate(definition_path: &Path, answers_path: &Path) -> CliResult<()> {
    let definition = load_definition(definition_path)?;
    let answers = load_answers(answers_path)?;
    if answers.survey_id != definition.id {
        warn!(
            expected = %definition.id,
            found = %answers.survey_id,
            "answers were recorded for a different survey id"
        );
    }

    let report = validate_answers(&definition, &answers);
    println!(
        "Validation result: {}",
        if report.valid { "valid" } else { "invalid" }
    );
    describe_validation(&report);

    if report.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(report: &ValidationReport) {
    if !report.errors.is_empty() {
        println!("Errors:");
        for error in &report.errors {
            println!(
                "  {} - {} ({})",
                error.question_id,
                error.message,
                error.code.as_str()
            );
        }
    }
    if !report.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            report.unknown_fields.join(", ")
        );
    }
}

fn run_survey(args: RunArgs) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_wizard(args))
}

/// What the respondent typed at a question prompt.
enum Input {
    Answer(AnswerValue),
    Skip,
    Back,
    Draft,
}

async fn run_wizard(args: RunArgs) -> CliResult<()> {
    let definition = load_definition(&args.definition)?;
    let sink = ResponseSink::new(args.out.clone(), args.drafts.clone());
    let mut controller = FormController::new(definition, sink)?.with_options(ControllerOptions {
        autosave_interval: args.autosave_interval,
    });
    if let Some(drafts) = &args.drafts {
        controller = controller.with_partial_save(DraftFile::new(drafts));
    }
    if let Some(path) = &args.answers {
        controller = controller.resume(load_answers(path)?);
    }
    if controller.start_autosave()? {
        info!(interval = ?args.autosave_interval, "autosave enabled");
    }

    let mut presenter = WizardPresenter::new(args.format);
    let mut asked = BTreeSet::new();

    loop {
        let payload = controller
            .render()
            .ok_or("survey has no visible sections")?;
        presenter.show_section(&payload);

        let visible = payload.visible_questions().collect::<Vec<_>>();
        let pending = visible
            .iter()
            .enumerate()
            .find(|(_, question)| !asked.contains(&question.id));

        let Some((position, question)) = pending else {
            if payload.is_last {
                match controller.submit().await {
                    Ok(SubmitOutcome::Submitted) => {
                        presenter.show_completion(controller.answers());
                        return Ok(());
                    }
                    Ok(SubmitOutcome::Invalid { errors, .. }) => {
                        presenter.show_errors(&errors);
                        asked.retain(|id| !errors.contains_key(id));
                        presenter.forget_section();
                    }
                    Err(ControllerError::Handler(err)) => {
                        presenter.show_submit_failure(&err);
                        if !confirm_retry().await? {
                            return Err("survey aborted by user".into());
                        }
                    }
                    Err(err) => return Err(err.into()),
                }
            } else if controller.next() {
                asked.clear();
            } else {
                presenter.show_errors(controller.errors());
                asked.retain(|id| !controller.errors().contains_key(id));
            }
            continue;
        };

        let prompt = PromptContext::new(question, position + 1, visible.len());
        match prompt_question(&prompt, question, &presenter).await? {
            Input::Answer(value) => {
                controller.set_answer(&question.id, value)?;
                asked.insert(question.id.clone());
                prompt_custom_input(&mut controller, question, &presenter).await?;
            }
            Input::Skip => {
                controller.clear_answer(&question.id)?;
                asked.insert(question.id.clone());
            }
            Input::Back => {
                if controller.previous() {
                    asked.clear();
                } else {
                    presenter.show_notice("Already at the first section.");
                }
            }
            Input::Draft => match controller.save_draft().await {
                Ok(()) => presenter.show_notice("Draft saved."),
                Err(ControllerError::DraftUnavailable) => {
                    presenter.show_notice("Saving a draft is not available here.")
                }
                Err(err) => eprintln!("Saving the draft failed: {}", err),
            },
        }
    }
}

async fn prompt_question(
    prompt: &PromptContext,
    question: &RenderQuestion,
    presenter: &WizardPresenter,
) -> CliResult<Input> {
    loop {
        presenter.show_prompt(prompt);
        let input = read_line("> ").await?;
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("survey aborted by user".into());
        }
        match trimmed {
            ":back" => return Ok(Input::Back),
            ":draft" => return Ok(Input::Draft),
            _ => {}
        }

        match parse_answer(question, trimmed) {
            Ok(Some(value)) => return Ok(Input::Answer(value)),
            Ok(None) => return Ok(Input::Skip),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

/// Asks whether to submit again; answers stay in memory either way.
async fn confirm_retry() -> CliResult<bool> {
    let input = read_line("Press enter to retry, or type exit to abort: ").await?;
    Ok(!input.trim().eq_ignore_ascii_case("exit"))
}

/// Asks for the free-text companion of an answer that picked the custom option.
async fn prompt_custom_input(
    controller: &mut FormController,
    question: &RenderQuestion,
    presenter: &WizardPresenter,
) -> CliResult<()> {
    let Some(custom) = &question.custom_input else {
        return Ok(());
    };
    let triggered = controller
        .answers()
        .get(&question.id)
        .is_some_and(|answer| answer.triggers(&custom.trigger));
    if !triggered {
        return Ok(());
    }
    let label = custom.placeholder.as_deref().unwrap_or("Please specify");
    let text = read_line(&format!("{}: ", label)).await?;
    if !controller.set_custom_input(&question.id, text.trim())? {
        presenter.show_notice("Custom text was not attached.");
    }
    Ok(())
}

/// Reads one line from stdin without blocking the runtime's worker threads.
async fn read_line(prompt: &str) -> CliResult<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let (read, line) = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|read| (read, line))
    })
    .await??;
    if read == 0 {
        return Err("input closed before the survey was completed".into());
    }
    Ok(line)
}

/// Parses raw input for a question; `Ok(None)` leaves an optional question unanswered.
fn parse_answer(question: &RenderQuestion, raw: &str) -> Result<Option<AnswerValue>, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if let Some(current) = &question.current_value {
            return Ok(Some(current.clone().without_custom()));
        }
        if !question.required {
            return Ok(None);
        }
        return Err(AnswerParseError::new(
            "This question requires an answer.",
            None,
        ));
    }

    let value = match question.kind {
        QuestionType::Radio => AnswerValue::Text(parse_choice(question, raw)?),
        QuestionType::Checkbox => parse_choices(question, raw)?,
        QuestionType::Scale => parse_rating(question, raw)?,
        QuestionType::Number => parse_number(raw)?,
        QuestionType::Text | QuestionType::Textarea | QuestionType::Email => {
            AnswerValue::Text(raw.to_string())
        }
    };
    Ok(Some(value))
}

/// Accepts an option value, its label, or its 1-based number.
fn parse_choice(question: &RenderQuestion, raw: &str) -> Result<String, AnswerParseError> {
    let by_number = raw
        .parse::<usize>()
        .ok()
        .and_then(|number| number.checked_sub(1))
        .and_then(|index| question.options.get(index));
    let by_name = || {
        question.options.iter().find(|option| {
            option.value.eq_ignore_ascii_case(raw) || option.label.eq_ignore_ascii_case(raw)
        })
    };
    by_number
        .or_else(by_name)
        .map(|option| option.value.clone())
        .ok_or_else(|| {
            let allowed = question
                .options
                .iter()
                .map(|option| option.value.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            AnswerParseError::new(
                format!("Choose one of: {}.", allowed),
                Some(format!("allowed values: {}", allowed)),
            )
        })
}

fn parse_choices(question: &RenderQuestion, raw: &str) -> Result<AnswerValue, AnswerParseError> {
    let mut selected = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let value = parse_choice(question, part)?;
        if !selected.contains(&value) {
            selected.push(value);
        }
    }
    Ok(AnswerValue::Choices(selected))
}

fn parse_rating(question: &RenderQuestion, raw: &str) -> Result<AnswerValue, AnswerParseError> {
    let rating = raw.parse::<i64>().map_err(|_| {
        AnswerParseError::new(
            "Please enter a whole number.",
            Some("expected integer rating".to_string()),
        )
    })?;
    if let Some(scale) = &question.scale
        && (rating < scale.min || rating > scale.max)
    {
        return Err(AnswerParseError::new(
            format!("Choose a rating between {} and {}.", scale.min, scale.max),
            None,
        ));
    }
    Ok(AnswerValue::from(rating))
}

fn parse_number(raw: &str) -> Result<AnswerValue, AnswerParseError> {
    if let Ok(whole) = raw.parse::<i64>() {
        return Ok(AnswerValue::from(whole));
    }
    raw.parse::<f64>()
        .map_err(|_| {
            AnswerParseError::new(
                "Please enter a number.",
                Some("expected number".to_string()),
            )
        })
        .and_then(|value| {
            Number::from_f64(value)
                .map(AnswerValue::Number)
                .ok_or_else(|| {
                    AnswerParseError::new(
                        "Please enter a finite number.",
                        Some("number must be finite".to_string()),
                    )
                })
        })
}
