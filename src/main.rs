use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use review_lens::backend::ChatBackend;
use review_lens::config::{AppConfig, CONFIG_ENV};
use review_lens::labeler::CategoryDefinition;
use review_lens::pipeline::{load_reviews, run_classify, run_report};
use review_lens::render::render_markdown;
use review_lens::report::{write_json, Smoothing};

/// Review Lens - rating trends and topic breakdowns for plugin reviews
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the report summary from a JSON array of reviews
    Report {
        /// Review JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the summary JSON (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Product name shown in the report title
        #[arg(long, default_value = "JetBrains Plugin")]
        title: String,

        /// Trailing buckets that count as recent
        #[arg(long)]
        recent_buckets: Option<usize>,

        /// Print a Markdown summary instead of JSON
        #[arg(long)]
        markdown: bool,

        /// Size the bucket smoothing window from the bucket count
        #[arg(long)]
        adaptive_smoothing: bool,
    },
    /// Label reviews through the chat backend and write them back with categories
    Classify {
        /// Review JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Labeled review JSON (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Category as "Name: description" (repeatable)
        #[arg(long = "category")]
        categories: Vec<CategoryDefinition>,

        #[arg(long)]
        batch_size: Option<usize>,
    },
}

fn emit(output: Option<&PathBuf>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!("Output written - path={}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the report, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut cfg = AppConfig::resolve(args.config.as_deref())?;

    match args.command {
        Command::Report {
            input,
            output,
            title,
            recent_buckets,
            markdown,
            adaptive_smoothing,
        } => {
            if let Some(n) = recent_buckets {
                cfg.report.recent_buckets = n;
            }
            if adaptive_smoothing {
                cfg.report.smoothing = Smoothing::Adaptive;
            }
            let reviews = load_reviews(&input)?;
            let report = run_report(&cfg, reviews, &title)?;

            if markdown {
                emit(output.as_ref(), &render_markdown(&report))?;
            } else if let Some(path) = output.as_ref() {
                write_json(path, &report)?;
                info!("Report written - path={}", path.display());
            } else {
                emit(None, &serde_json::to_string_pretty(&report)?)?;
            }
        }
        Command::Classify {
            input,
            output,
            categories,
            batch_size,
        } => {
            if categories.is_empty() {
                bail!("at least one --category \"Name: description\" is required");
            }
            if let Some(n) = batch_size {
                cfg.backend.batch_size = n;
            }
            cfg.validate()?;

            let token = std::env::var(&cfg.backend.api_key_env).with_context(|| {
                format!(
                    "API token not found; set the {} environment variable",
                    cfg.backend.api_key_env
                )
            })?;
            if token.trim().is_empty() {
                bail!("{} is set but empty", cfg.backend.api_key_env);
            }
            debug!("Using model {} at {}", cfg.backend.model, cfg.backend.api_base);

            let backend = ChatBackend::new(
                &cfg.backend.api_base,
                &cfg.backend.model,
                token.trim(),
                Duration::from_secs(cfg.backend.timeout_secs),
            )?;

            let mut reviews = load_reviews(&input)?;
            let stats = run_classify(&cfg, &backend, &mut reviews, &categories).await;
            if stats.degraded_batches > 0 {
                warn!(
                    "Some batches fell back to Others - degraded={}/{}",
                    stats.degraded_batches, stats.batches
                );
            }

            match output.as_ref() {
                Some(path) => write_json(path, &reviews)?,
                None => emit(None, &serde_json::to_string_pretty(&reviews)?)?,
            }
        }
    }

    Ok(())
}
