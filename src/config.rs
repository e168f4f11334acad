use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Base of the public verification URL embedded in every QR code.
    pub public_url: String,
    pub credential_prefix: String,
    pub default_validity_months: u32,
    pub quiz_pass_score: f64,
    pub notify_webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        Ok(Self {
            database_url,
            port: parse_or("PORT", 8081),
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or("./data".into())),
            public_url: env::var("PUBLIC_URL").unwrap_or("http://localhost:3000".into()),
            credential_prefix: env::var("CREDENTIAL_PREFIX").unwrap_or("VMP".into()),
            default_validity_months: parse_or("DEFAULT_VALIDITY_MONTHS", 24),
            quiz_pass_score: parse_or("QUIZ_PASS_SCORE", 70.0),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
impl Config {
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Self {
            database_url: String::new(),
            port: 0,
            data_dir,
            public_url: "https://vmp.test".into(),
            credential_prefix: "VMP".into(),
            default_validity_months: 24,
            quiz_pass_score: 70.0,
            notify_webhook_url: None,
        }
    }
}
