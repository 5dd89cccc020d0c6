use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use mathscene::Provider;
use mathscene::core::config::{self, Overrides};
use mathscene::core::validate::RepairPolicy;
use mathscene::core::{Agent, RepresentationMethod};
use serde::Serialize;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "mathscene",
    about = "Turns K-12 math questions into interactive scenarios"
)]
struct Args {
    /// Questions to answer. Reads one per line from stdin when omitted.
    questions: Vec<String>,

    /// LLM provider to use
    #[arg(short, long, value_enum)]
    provider: Option<Provider>,

    /// Model name, passed to the provider as-is
    #[arg(short, long)]
    model: Option<String>,

    /// Skip routing and always build this representation
    #[arg(long, value_enum)]
    method: Option<RepresentationMethod>,

    #[arg(long, value_enum)]
    repair_policy: Option<RepairPolicy>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Config file to use instead of ~/.mathscene/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "mathscene.log")]
    log_file: PathBuf,

    #[arg(long, value_enum, default_value_t = LogLevel::Debug)]
    log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create(&args.log_file) {
        let _ = WriteLogger::init(args.log_level.into(), log_config, log_file);
    }

    let file_config = match &args.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    let overrides = Overrides {
        provider: args.provider,
        model: args.model.clone(),
        repair_policy: args.repair_policy,
        request_timeout_secs: args.timeout,
    };
    let resolved = match file_config.and_then(|c| config::resolve(&c, &overrides)) {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("Startup failed: {}", e);
            eprintln!("mathscene: {e}");
            return ExitCode::from(2);
        }
    };

    info!(
        "mathscene starting up with provider {:?}, model {}, reasoning {}",
        resolved.provider,
        resolved.model_name,
        resolved.effort.label()
    );

    let questions = if args.questions.is_empty() {
        match read_stdin_questions().await {
            Ok(questions) => questions,
            Err(e) => {
                eprintln!("mathscene: failed to read stdin: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        args.questions.clone()
    };

    let provider = mathscene::connect(&resolved);
    let agent = Agent::from_config(&resolved, provider, args.method);

    if run(&agent, &questions, resolved.max_concurrent_requests, args.pretty).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Answers every question and prints one JSON document per question, in
/// input order. Returns false if any question failed or the run was
/// interrupted.
async fn run(agent: &Agent, questions: &[String], concurrency: usize, pretty: bool) -> bool {
    let mut answers = stream::iter(questions)
        .map(|question| async move { (question, agent.answer(question).await) })
        .buffered(concurrency.max(1));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut all_ok = true;
    loop {
        tokio::select! {
            next = answers.next() => match next {
                Some((_, Ok(answer))) => {
                    all_ok &= emit(&answer.scenario, pretty);
                }
                Some((question, Err(e))) => {
                    emit(&e.report(question), pretty);
                    all_ok = false;
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                warn!("Interrupted; dropping outstanding requests");
                return false;
            }
        }
    }
    all_ok
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> bool {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(json) => {
            println!("{json}");
            true
        }
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            false
        }
    }
}

async fn read_stdin_questions() -> std::io::Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut questions = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            questions.push(line);
        }
    }
    Ok(questions)
}
