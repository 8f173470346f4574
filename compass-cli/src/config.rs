//! Configuration for the compass CLI
//!
//! CLI arguments and environment variable handling using clap, layered over
//! an optional YAML file.

use anyhow::{bail, Context};
use clap::Parser;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use compass_agent::{CompassConfig, Provider};

/// Mood Compass - turn a journal entry into a mood record and suggestions
#[derive(Parser, Debug, Clone)]
#[command(name = "compass")]
#[command(about = "Analyze a journal entry and suggest books and movies for the mood")]
pub struct Args {
    /// Journal entry text (reads --file or stdin when omitted)
    #[arg(conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the journal entry from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Model provider: gemini, openai or ollama
    #[arg(long, env = "COMPASS_PROVIDER")]
    pub provider: Option<Provider>,

    /// Model name (provider default when omitted)
    #[arg(long, env = "COMPASS_MODEL")]
    pub model: Option<String>,

    /// Endpoint override for the provider API
    #[arg(long, env = "COMPASS_BASE_URL")]
    pub base_url: Option<String>,

    /// API key (falls back to GEMINI_API_KEY or OPENAI_API_KEY)
    #[arg(long, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Number of movies to suggest (0-5)
    #[arg(long, default_value = "0")]
    pub movies: usize,

    /// Number of books to suggest (0-5)
    #[arg(long, default_value = "0")]
    pub books: usize,

    /// Validation attempts per extraction
    #[arg(long, env = "COMPASS_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Deadline for a single backend call in milliseconds
    #[arg(long, env = "COMPASS_CALL_TIMEOUT_MS")]
    pub call_timeout_ms: Option<u64>,

    /// YAML config file; flags override its values
    #[arg(long, env = "COMPASS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl Args {
    /// Load the YAML file (if any) and apply flag and environment overrides.
    pub fn load_config(&self) -> anyhow::Result<CompassConfig> {
        let base = match &self.config {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                CompassConfig::from_yaml(&yaml)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => CompassConfig::default(),
        };

        let config = self.apply_overrides(base, |name| std::env::var(name).ok());
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Layer flags over `config`; `env` resolves the provider's key variable.
    pub fn apply_overrides(
        &self,
        mut config: CompassConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> CompassConfig {
        if let Some(provider) = self.provider {
            if provider != config.backend.provider {
                config.backend.model = None;
            }
            config.backend.provider = provider;
        }
        if let Some(model) = &self.model {
            config.backend.model = Some(model.clone());
        }
        if let Some(url) = &self.base_url {
            config.backend.base_url = Some(url.clone());
        }
        if let Some(key) = &self.api_key {
            config.backend.api_key = Some(key.clone());
        }
        if config.backend.api_key.is_none() {
            config.backend.api_key = config.backend.provider.api_key_env().and_then(env);
        }

        if let Some(n) = self.max_attempts {
            config.pipeline.max_attempts = n;
        }
        if let Some(ms) = self.call_timeout_ms {
            config.pipeline.call_timeout_ms = ms;
        }

        config
    }

    /// The journal entry from the argument, the file or stdin.
    pub fn read_journal(&self) -> anyhow::Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        if let Some(path) = &self.file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("reading journal file {}", path.display()));
        }

        let mut stdin = std::io::stdin();
        if stdin.is_terminal() {
            bail!("no journal entry given: pass TEXT, --file, or pipe it on stdin");
        }
        let mut text = String::new();
        stdin
            .read_to_string(&mut text)
            .context("reading journal entry from stdin")?;
        Ok(text)
    }
}
