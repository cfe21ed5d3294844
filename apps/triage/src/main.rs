mod ats;
mod config;
mod errors;
mod extract;
mod llm_client;
mod scoring;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ats::intake::{inspect_job, process_job};
use crate::ats::{AtsClient, HttpTransport};
use crate::config::Config;
use crate::errors::AppError;
use crate::extract::DocumentExtractor;
use crate::llm_client::LlmClient;
use crate::scoring::find_best_candidates;

/// Pulls candidate resumes for a job out of the ATS and ranks them with a
/// language model.
#[derive(Debug, Parser)]
#[command(name = "triage", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Arguments of `run`, used when no subcommand is given.
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download, extract and score in one go (default).
    Run(RunArgs),
    /// Print the extracted text of every supported file in a folder.
    Extract {
        folder: PathBuf,
    },
    /// Score folders that were already downloaded.
    Score(PipelineArgs),
    /// List a job's contacts, applications and documents without downloading.
    Inspect {
        #[arg(long, env = "TRIAGE_JOB_ID")]
        job_id: String,
    },
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// ATS job id.
    #[arg(long, env = "TRIAGE_JOB_ID")]
    job_id: Option<String>,

    /// Pipeline stage whose candidates are pulled.
    #[arg(long, env = "TRIAGE_STAGE", default_value = "Good Fit")]
    stage: String,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

/// Overrides for values otherwise taken from `Config`.
#[derive(Debug, Clone, Default, Args)]
struct PipelineArgs {
    #[arg(long)]
    resume_dir: Option<PathBuf>,

    #[arg(long)]
    job_docs_dir: Option<PathBuf>,

    /// Chat model used for scoring.
    #[arg(long)]
    model: Option<String>,
}

impl PipelineArgs {
    fn resume_dir<'a>(&'a self, config: &'a Config) -> &'a Path {
        self.resume_dir.as_deref().unwrap_or(&config.resume_dir)
    }

    fn job_docs_dir<'a>(&'a self, config: &'a Config) -> &'a Path {
        self.job_docs_dir.as_deref().unwrap_or(&config.job_docs_dir)
    }

    fn model<'a>(&'a self, config: &'a Config) -> &'a str {
        self.model.as_deref().unwrap_or(&config.openai_model)
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = try_main().await {
        if let Some(usage) = e.downcast_ref::<clap::Error>() {
            usage.exit();
        }
        let code = e
            .downcast_ref::<AppError>()
            .map(AppError::code)
            .unwrap_or("FATAL");
        error!(code, "{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    // .env before parsing: the CLI's env fallbacks read it too.
    dotenvy::dotenv().ok();
    let (cli, config) = load(std::env::args_os(), Config::from_env)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting triage v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Run(cli.run)) {
        Command::Run(args) => print_json(&run(&config, &args).await?),
        Command::Extract { folder } => {
            let texts = DocumentExtractor::new(&config.doc_converter)
                .scan_folder_blocking(&folder)
                .await?;
            print_json(&texts)
        }
        Command::Score(args) => print_json(&score(&config, &args).await?),
        Command::Inspect { job_id } => {
            let ats = build_ats_client(&config)?;
            let listing = inspect_job(&ats, &job_id).await.map_err(AppError::from)?;
            print_json(&listing)
        }
    }
}

/// Parses arguments, then builds the config. A bad environment therefore
/// never gets in the way of `--help` or `--version`.
fn load<I, T>(args: I, load_config: impl FnOnce() -> Result<Config>) -> Result<(Cli, Config)>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let config = load_config()?;
    Ok((cli, config))
}

/// The full pipeline: clear output folders, pull resumes and job documents,
/// extract, score.
async fn run(config: &Config, args: &RunArgs) -> Result<Vec<scoring::ScoreResult>> {
    let job_id = args
        .job_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::Config("TRIAGE_JOB_ID (or --job-id) must be set".to_string()))?;

    // Every credential is checked before the first request or file write.
    let ats = build_ats_client(config)?;
    let llm = build_llm_client(config, args.pipeline.model(config))?;

    let resume_dir = args.pipeline.resume_dir(config);
    let docs_dir = args.pipeline.job_docs_dir(config);
    reset_dir(resume_dir).await?;
    reset_dir(docs_dir).await?;

    info!("Processing job {job_id} for stage '{}'", args.stage);
    let summary = process_job(&ats, job_id, &args.stage, resume_dir, docs_dir)
        .await
        .map_err(AppError::from)?;
    info!(
        seen = summary.contacts_seen,
        in_stage = summary.contacts_in_stage,
        resumes = summary.resumes_written,
        skipped = summary.contacts_skipped,
        documents = summary.documents_written,
        "Intake finished"
    );

    let extractor = DocumentExtractor::new(&config.doc_converter);
    Ok(find_best_candidates(&llm, &extractor, resume_dir, docs_dir).await?)
}

async fn score(config: &Config, args: &PipelineArgs) -> Result<Vec<scoring::ScoreResult>> {
    let llm = build_llm_client(config, args.model(config))?;
    let extractor = DocumentExtractor::new(&config.doc_converter);
    Ok(find_best_candidates(
        &llm,
        &extractor,
        args.resume_dir(config),
        args.job_docs_dir(config),
    )
    .await?)
}

fn build_ats_client(config: &Config) -> Result<AtsClient> {
    let api_key = config.require_ats_key()?;
    let transport = HttpTransport::new(&config.ats_base_url, api_key)
        .map_err(AppError::from)
        .context("Failed to build ATS HTTP client")?;
    info!(
        "ATS client initialized ({}, {:?} paging)",
        config.ats_base_url, config.ats_page_style
    );
    Ok(AtsClient::new(
        Arc::new(transport),
        config.ats_page_style,
        config.ats_page_size,
    ))
}

fn build_llm_client(config: &Config, model: &str) -> Result<LlmClient> {
    let api_key = config.require_openai_key()?;
    let llm = LlmClient::new(api_key, &config.openai_base_url, model)
        .map_err(AppError::from)
        .context("Failed to build LLM HTTP client")?;
    info!("LLM client initialized (model: {model})");
    Ok(llm)
}

/// Deletes `dir` with everything in it and creates it again empty.
async fn reset_dir(dir: &Path) -> Result<(), AppError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(dir).await?;
    info!("Cleared output folder {}", dir.display());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
