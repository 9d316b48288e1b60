//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"TRV_DATABASE_URL"`).
//! - Callers invoke [`resolve_secrets`] once at startup and pass the result
//!   into constructors; `std::env::var` is not scattered across crates.
//! - `Debug` output **redacts** values.
//! - Error messages reference the env var **NAME**, never the value.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::settings::DEFAULT_DATABASE_URL_ENV;

/// Secrets resolved from the environment for one validation run.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Name of the env var the database URL was read from.
    pub database_url_env: String,
    /// Pre-filter database URL. `None` if the named env var was absent or blank.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("database_url_env", &self.database_url_env)
            .field("database_url", &self.database_url.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ResolvedSecrets {
    /// The database URL, or an error naming the env var that must be set.
    pub fn require_database_url(&self) -> Result<&str> {
        match self.database_url.as_deref() {
            Some(url) => Ok(url),
            None => bail!(
                "SECRETS_MISSING: required env var '{}' (pre-filter database url) is not set or empty",
                self.database_url_env
            ),
        }
    }
}

/// Read a non-empty string at `pointer`, trimmed.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Returns `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve secrets named in `config_json`. Nothing is required at this point:
/// the pre-filter is optional and calls [`ResolvedSecrets::require_database_url`]
/// only when enabled.
pub fn resolve_secrets(config_json: &Value) -> ResolvedSecrets {
    let database_url_env = read_str_at(config_json, "/prefilter/database_url_env")
        .unwrap_or_else(|| DEFAULT_DATABASE_URL_ENV.to_string());
    let database_url = resolve_env(&database_url_env);
    ResolvedSecrets {
        database_url_env,
        database_url,
    }
}
