use std::{env, path::PathBuf};

use anyhow::{Context, Result};

pub const DEFAULT_PRECISION: u32 = 2;
pub const MAX_PRECISION: u32 = 6;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub export_dir: PathBuf,
    /// Decimal places used when summary values and chart points are shown.
    pub precision: u32,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = lookup("DATABASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let export_dir = PathBuf::from(
            lookup("SURVEY_REPORT_EXPORT_DIR").unwrap_or_else(|| "./exports".to_string()),
        );

        let precision = lookup("SURVEY_REPORT_PRECISION")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_PRECISION)
            .min(MAX_PRECISION);

        let max_connections = lookup("SURVEY_REPORT_MAX_CONNECTIONS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(5);

        Self {
            database_url,
            export_dir,
            precision,
            max_connections,
        }
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to the survey Postgres instance")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert!(config.database_url.is_none());
        assert_eq!(config.export_dir, PathBuf::from("./exports"));
        assert_eq!(config.precision, DEFAULT_PRECISION);
        assert_eq!(config.max_connections, 5);
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn precision_is_clamped_and_bad_values_ignored() {
        let config = config_from(&[
            ("SURVEY_REPORT_PRECISION", "12"),
            ("SURVEY_REPORT_MAX_CONNECTIONS", "zero"),
            ("DATABASE_URL", " postgres://localhost/survey "),
        ]);
        assert_eq!(config.precision, MAX_PRECISION);
        assert_eq!(config.max_connections, 5);
        assert_eq!(
            config.require_database_url().ok(),
            Some("postgres://localhost/survey")
        );
    }
}
