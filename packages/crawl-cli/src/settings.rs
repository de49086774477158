use anyhow::{Context, Result};
use dotenvy::dotenv;
use listing_crawler::OutputFormat;
use std::env;
use std::path::PathBuf;

/// Process-level settings loaded from environment variables
#[derive(Debug, Clone)]
pub struct Settings {
    /// Overrides the built-in browser user agent when the config has none
    pub user_agent: Option<String>,
    /// Directory used when `--out` is not given
    pub output_dir: PathBuf,
    /// Format used when `--format` is not given
    pub default_format: OutputFormat,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            user_agent: env::var("CRAWL_USER_AGENT").ok().filter(|v| !v.trim().is_empty()),
            output_dir: env::var("CRAWL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            default_format: env::var("CRAWL_FORMAT")
                .unwrap_or_else(|_| "json".to_string())
                .parse()
                .map_err(anyhow::Error::msg)
                .context("CRAWL_FORMAT must be json, jsonl or csv")?,
        })
    }

    /// Where results go when no explicit path is given.
    pub fn default_output(&self, format: OutputFormat) -> PathBuf {
        self.output_dir
            .join(format!("listings.{}", format.extension()))
    }
}
