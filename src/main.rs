//! Voxledger binary: initialization plus a minimal line-based transport.
//!
//! The stdin REPL stands in for a chat transport: each line is tokenized
//! into a typed command (with `yes`/`no` mapped to confirm/reject, matching
//! how a chat keyboard would), and `voice <path> [format]` feeds an audio
//! file through the full transcription pipeline. All real logic lives in
//! the library; this file only parses lines and renders outcomes.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use voxledger::config;
use voxledger::core::pipeline::{Command, Incoming, Orchestrator, Outcome};
use voxledger::errors::Result;
use voxledger::voice::openai::OpenAiVoice;

/// The single local REPL session acts as one chat user.
const LOCAL_CHAT_ID: i64 = 1;

const USAGE: &str = "commands:\n\
    \x20 add_expense <amount> <category> [description]\n\
    \x20 add_income <amount> <category> [description]\n\
    \x20 balance\n\
    \x20 stats day|week|month|year\n\
    \x20 delete_last\n\
    \x20 voice <path> [format]\n\
    \x20 yes / no  - confirm or reject a voice transaction\n\
    \x20 quit";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars may also be set externally
    dotenvy::dotenv().ok();

    // 3. Load application configuration
    let app_config = config::load_app_config()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;
    info!("Configuration loaded.");

    // 4. Initialize database
    let db = config::create_connection(&app_config)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    config::create_tables(&db)
        .await
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;
    info!("Database initialized successfully.");

    // 5. Wire the voice adapters. The key is read here, directly before
    // use, and never stored in AppConfig.
    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        tracing::warn!("OPENAI_API_KEY not set; voice messages will fail until it is provided");
        String::new()
    });
    let voice = Arc::new(OpenAiVoice::new(&app_config, api_key)?);

    let orchestrator = Orchestrator::new(db, &app_config, voice.clone(), voice);

    run_repl(&orchestrator).await
}

/// Reads lines from stdin, maps them to inbound events, prints outcomes.
async fn run_repl(orchestrator: &Orchestrator) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{USAGE}\n").as_bytes()).await?;

    while let Some(line) = lines.next_line().await? {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let incoming = match tokens.as_slice() {
            [] => continue,
            ["quit" | "exit"] => break,
            ["yes"] => Incoming::Command(Command::Confirm),
            ["no"] => Incoming::Command(Command::Reject),
            ["voice", path, rest @ ..] => match load_voice_payload(path, rest.first()).await {
                Ok(incoming) => incoming,
                Err(e) => {
                    stdout.write_all(format!("{e}\n").as_bytes()).await?;
                    continue;
                }
            },
            _ => match Command::from_tokens(&tokens) {
                Ok(command) => Incoming::Command(command),
                Err(e) => {
                    stdout.write_all(format!("{e}\n{USAGE}\n").as_bytes()).await?;
                    continue;
                }
            },
        };

        let outcome = orchestrator.handle(LOCAL_CHAT_ID, incoming).await;
        stdout
            .write_all(format!("{}\n", render(&outcome)).as_bytes())
            .await?;
    }
    Ok(())
}

/// Reads an audio file and derives the format hint from the argument or the
/// file extension.
async fn load_voice_payload(path: &str, format: Option<&&str>) -> Result<Incoming> {
    let audio = tokio::fs::read(path).await?;
    let format_hint = format.map_or_else(
        || {
            std::path::Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string()
        },
        |f| (*f).to_string(),
    );
    Ok(Incoming::Voice { audio, format_hint })
}

/// Renders a structured outcome for the terminal. A chat transport would do
/// the equivalent with its own formatting and keyboards.
fn render(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Recorded(row) => format!(
            "recorded {} {} in '{}' (transaction {})",
            row.direction, row.amount, row.category, row.id
        ),
        Outcome::ConfirmationRequested(pending) => format!(
            "heard: {:?}\nproposed {} {} in '{}'{} - confirm? (yes/no, expires {})",
            pending.transcript,
            pending.candidate.direction,
            pending.candidate.amount,
            pending.candidate.category,
            pending
                .candidate
                .description
                .as_deref()
                .map(|d| format!(", \"{d}\""))
                .unwrap_or_default(),
            pending.expires_at.format("%H:%M:%S UTC"),
        ),
        Outcome::Committed(row) => format!(
            "saved {} {} in '{}' (transaction {})",
            row.direction, row.amount, row.category, row.id
        ),
        Outcome::Discarded => "discarded the pending transaction".to_string(),
        Outcome::NothingPending => "nothing to confirm".to_string(),
        Outcome::Balance(report) => format!(
            "income {} | expense {} | net {}",
            report.income, report.expense, report.net
        ),
        Outcome::Stats(report) => {
            let mut out = format!(
                "stats for {} (since {}): income {} | expense {} | net {} | {} transactions",
                report.period,
                report.since.format("%Y-%m-%d %H:%M UTC"),
                report.income,
                report.expense,
                report.net,
                report.count
            );
            for totals in [&report.income_by_category, &report.expense_by_category] {
                for entry in totals.iter().take(5) {
                    out.push_str(&format!("\n  {}: {}", entry.category, entry.total));
                }
            }
            out
        }
        Outcome::Deleted(row) => format!(
            "deleted last transaction: {} {} in '{}'",
            row.direction, row.amount, row.category
        ),
        Outcome::NothingToDelete => "no transactions to delete".to_string(),
        Outcome::NoTransactionDetected { transcript } => {
            format!("heard: {transcript:?}\nno transaction detected - try 'spent 200 on food'")
        }
        Outcome::TranscriptionFailed { .. } | Outcome::ExtractionFailed { .. } => {
            "could not process the audio, please try again".to_string()
        }
        Outcome::Invalid { reason } => format!("invalid input: {reason}"),
        Outcome::Help => USAGE.to_string(),
        Outcome::Failed { .. } => "something went wrong, please try again".to_string(),
    }
}
