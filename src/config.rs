use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenv::dotenv;

use crate::review::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};

const DEFAULT_DB_PATH: &str = "gointerview.db";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_DEBOUNCE_MS: u64 = 750;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub request_timeout: Duration,
    pub save_debounce: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            save_debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads overrides from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let temperature: f32 = parse_var(&get, "REVIEW_TEMPERATURE")?.unwrap_or(defaults.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            anyhow::bail!("REVIEW_TEMPERATURE must be between 0 and 2, got {temperature}");
        }

        Ok(Self {
            db_path: get("GOINTERVIEW_DB").map(PathBuf::from).unwrap_or(defaults.db_path),
            model: get("GEMINI_MODEL").unwrap_or(defaults.model),
            api_base: get("GEMINI_API_BASE").unwrap_or(defaults.api_base),
            temperature,
            request_timeout: parse_var(&get, "REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            save_debounce: parse_var(&get, "SAVE_DEBOUNCE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.save_debounce),
        })
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(name)
        .map(|raw| raw.parse::<T>().with_context(|| format!("Invalid value for {name}: '{raw}'")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("gointerview.db"));
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.save_debounce, Duration::from_millis(750));
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("GOINTERVIEW_DB", "/tmp/practice.db"),
            ("GEMINI_MODEL", "gemini-2.5-pro"),
            ("REVIEW_TEMPERATURE", "0.7"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("SAVE_DEBOUNCE_MS", " 200 "),
        ])
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/practice.db"));
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.save_debounce, Duration::from_millis(200));
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = config_from(&[("SAVE_DEBOUNCE_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("SAVE_DEBOUNCE_MS"));

        assert!(config_from(&[("REVIEW_TEMPERATURE", "9")]).is_err());
    }
}
