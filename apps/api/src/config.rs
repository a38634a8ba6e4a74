use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Applies to single-shot completions and to each wait for the next
    /// fragment of a streamed reply.
    pub upstream_timeout: Duration,
    /// Extracted resume text is truncated to this many characters.
    pub resume_max_chars: usize,
    /// Raw resume archiving is enabled only when every S3 variable is set.
    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            upstream_timeout: upstream_timeout(parse_env("UPSTREAM_TIMEOUT_SECS", 60))
                .context("UPSTREAM_TIMEOUT_SECS must be a positive whole number of seconds")?,
            resume_max_chars: parse_env("RESUME_MAX_CHARS", 5000)
                .context("RESUME_MAX_CHARS must be a positive integer")?,
            s3: s3_from_env(),
        })
    }
}

fn s3_from_env() -> Option<S3Config> {
    let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
    Some(S3Config {
        bucket: var("S3_BUCKET")?,
        endpoint: var("S3_ENDPOINT")?,
        access_key_id: var("AWS_ACCESS_KEY_ID")?,
        secret_access_key: var("AWS_SECRET_ACCESS_KEY")?,
    })
}

fn upstream_timeout(secs: Result<u64>) -> Result<Duration> {
    match secs? {
        0 => anyhow::bail!("timeout of 0 seconds would fail every upstream call"),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => Ok(raw.trim().parse::<T>()?),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/interview_test".to_string(),
            anthropic_api_key: "test-key".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            upstream_timeout: Duration::from_secs(5),
            resume_max_chars: 5000,
            s3: None,
        }
    }
}
