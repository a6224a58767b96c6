use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::i18n::DEFAULT_LANG;

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub database_url: String,
    /// Если не задан, сессии хранятся в памяти процесса
    pub redis_url: Option<String>,
    pub session_ttl: Duration,
    pub admin_ids: Vec<i64>,
    pub default_language: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let session_ttl = match env::var("SESSION_TTL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("SESSION_TTL_SECS must be a number of seconds, got {:?}", raw))?,
            Err(_) => 1800,
        };

        Ok(Self {
            telegram_token: env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN environment variable is required")?,
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://tandem.db".to_string()),
            redis_url: env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty()),
            session_ttl: Duration::from_secs(session_ttl),
            admin_ids: parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default())?,
            default_language: env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| DEFAULT_LANG.to_string()),
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

/// Разбирает список вида `123, 456`; пустые элементы пропускаются
pub fn parse_admin_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().with_context(|| format!("invalid admin id {:?} in ADMIN_IDS", s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_admin_ids() {
        assert_eq!(parse_admin_ids("").unwrap(), Vec::<i64>::new());
        assert_eq!(parse_admin_ids("1, 22 ,,333").unwrap(), vec![1, 22, 333]);
        assert!(parse_admin_ids("1,abc").is_err());
    }
}
