use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable is optional; startup fails only on unparseable values.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// `None` disables AI extraction; parsing then uses the heuristic parser only.
    pub anthropic_api_key: Option<String>,
    pub ai_timeout: Duration,
    pub llm_max_retries: u32,
    pub max_upload_bytes: usize,
    pub heuristics_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ai_timeout_secs: u64 = parse_or(&lookup, "AI_TIMEOUT_SECS", 60)?;
        if ai_timeout_secs == 0 {
            bail!("AI_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Config {
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: non_empty(&lookup, "RUST_LOG").unwrap_or_else(|| "info".to_string()),
            anthropic_api_key: non_empty(&lookup, "ANTHROPIC_API_KEY"),
            ai_timeout: Duration::from_secs(ai_timeout_secs),
            llm_max_retries: parse_or(&lookup, "LLM_MAX_RETRIES", 3)?,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            heuristics_path: non_empty(&lookup, "RESUME_HEURISTICS_PATH").map(PathBuf::from),
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
