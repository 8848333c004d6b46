use std::{env, fs, path::Path, time::Duration};

use crate::{domain::RunMode, errors::Error, Result};

const DEFAULT_DATABASE_URL: &str = "memory://";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Typed process configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub mode: RunMode,
    pub database_url: String,
    pub default_locale: String,

    // Shared cache
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,

    // Text model (neuro)
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
}

impl Config {
    /// Load configuration from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_source(env_str)
    }

    /// Parse configuration from an arbitrary key lookup.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = get("BOT_TOKEN")
            .and_then(non_empty)
            .or_else(|| get("TELEGRAM_BOT_TOKEN").and_then(non_empty))
            .ok_or_else(|| {
                Error::Config("BOT_TOKEN environment variable is required".to_string())
            })?;

        let mode = get("APP_ENV")
            .map(|s| RunMode::parse(&s))
            .unwrap_or(RunMode::Development);

        let database_url = match get("DATABASE_URL").and_then(non_empty) {
            Some(url) => url,
            None if mode.is_production() => {
                return Err(Error::Config(
                    "DATABASE_URL environment variable is required in production".to_string(),
                ))
            }
            None => DEFAULT_DATABASE_URL.to_string(),
        };

        let default_locale = get("BOT_LOCALE")
            .and_then(non_empty)
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| "en".to_string());

        let cache_ttl = Duration::from_secs(parse_u64(&get, "CACHE_TTL_SECS")?.unwrap_or(3600));
        let cache_max_entries = parse_u64(&get, "CACHE_MAX_ENTRIES")?.unwrap_or(10_000) as usize;

        let openai_api_key = get("OPENAI_API_KEY").and_then(non_empty);
        let openai_model = get("OPENAI_MODEL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let openai_base_url = get("OPENAI_BASE_URL")
            .and_then(non_empty)
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        Ok(Self {
            bot_token,
            mode,
            database_url,
            default_locale,
            cache_ttl,
            cache_max_entries,
            openai_api_key,
            openai_model,
            openai_base_url,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn parse_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = get(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got `{raw}`")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
