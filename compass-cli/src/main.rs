//! Compass - command-line front end for Mood Compass
//!
//! Reads one journal entry, runs the extraction pipeline and prints the
//! wellness report. Logs go to stderr so stdout stays parseable.

mod config;
mod output;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use compass_agent::{MoodCompass, PipelineError, ReportOptions};
use config::Args;

/// Mood analysis failed.
const EXIT_PIPELINE: i32 = 1;
/// Bad arguments, input or configuration.
const EXIT_USAGE: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("compass_agent={0},compass={0},warn", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => usage_error(&args, &format!("{:#}", e)),
    };
    debug!(backend = ?config.backend, pipeline = ?config.pipeline, "Resolved configuration");

    let journal = match args.read_journal() {
        Ok(text) => text,
        Err(e) => usage_error(&args, &format!("{:#}", e)),
    };

    let backend = match config.backend.build() {
        Ok(backend) => backend,
        Err(e) => usage_error(&args, &e.to_string()),
    };

    let compass = MoodCompass::new(backend).with_config(config.pipeline);
    let options = ReportOptions {
        max_attempts: None,
        movies: args.movies,
        books: args.books,
    };

    match compass.report(&journal, &options).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", output::render_report(&report));
            }
            Ok(())
        }
        Err(err) => {
            let code = match err {
                PipelineError::Input(_) | PipelineError::Configuration(_) => EXIT_USAGE,
                PipelineError::Transport { .. } | PipelineError::ValidationExhausted { .. } => {
                    EXIT_PIPELINE
                }
            };
            error!(error = %err, "Mood analysis failed");
            report_error(&args, &err)?;
            std::process::exit(code);
        }
    }
}

fn report_error(args: &Args, err: &PipelineError) -> anyhow::Result<()> {
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "error": err }))?
        );
    } else {
        eprintln!("error: {}", err);
    }
    Ok(())
}

fn usage_error(args: &Args, message: &str) -> ! {
    error!("Configuration error: {}", message);
    if args.json {
        println!("{}", serde_json::json!({ "error": { "kind": "configuration", "detail": message } }));
    } else {
        eprintln!("error: {}", message);
    }
    std::process::exit(EXIT_USAGE);
}
