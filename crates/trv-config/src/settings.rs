//! Typed settings read from the merged config JSON.
//!
//! Every value is read through a JSON pointer and falls back to a default when
//! absent, so an empty config is a valid config. Present-but-malformed values
//! are errors: a typo in YAML must not silently become a default.
//!
//! Keep `consumed_pointers_for_scope` in `lib.rs` in sync with the pointers
//! read here.

use anyhow::{anyhow, bail, Result};
use chrono_tz::Tz;
use serde_json::Value;

pub const DEFAULT_REFERENCE_BASE_URL: &str =
    "https://registers.esma.europa.eu/publication/searchRegister/doMainSearch";
pub const DEFAULT_OFF_VENUE_SENTINEL: &str = "XOFF";
pub const DEFAULT_FAIL_MARKER: &str = "X";
pub const DEFAULT_MARKER_HEADERS: [&str; 4] = [
    "CASISTICA isin non censito",
    "CASISTICA mic code non presente",
    "CASISTICA data di ammissione",
    "CASISTICA data di cessazione",
];
pub const DEFAULT_DATABASE_URL_ENV: &str = "TRV_DATABASE_URL";

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Minimum spacing between two reference requests.
    pub min_request_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSettings {
    pub off_venue_sentinel: String,
    /// Zone of the execution date/time columns. Reference instants (UTC) are
    /// converted into it before comparison.
    pub timezone: Tz,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub fail_marker: String,
    pub marker_headers: [String; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreFilterSettings {
    pub enabled: bool,
    pub eligible_statuses: Vec<String>,
    /// NAME of the env var holding the database URL (never the URL itself).
    pub database_url_env: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorSettings {
    pub reference: ReferenceSettings,
    pub validation: ValidationSettings,
    pub output: OutputSettings,
    pub prefilter: PreFilterSettings,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            reference: ReferenceSettings {
                base_url: DEFAULT_REFERENCE_BASE_URL.to_string(),
                timeout_secs: 30,
                min_request_interval_ms: 500,
            },
            validation: ValidationSettings {
                off_venue_sentinel: DEFAULT_OFF_VENUE_SENTINEL.to_string(),
                timezone: chrono_tz::Europe::Rome,
            },
            output: OutputSettings {
                fail_marker: DEFAULT_FAIL_MARKER.to_string(),
                marker_headers: DEFAULT_MARKER_HEADERS.map(|s| s.to_string()),
            },
            prefilter: PreFilterSettings {
                enabled: false,
                eligible_statuses: vec!["RF".to_string()],
                database_url_env: DEFAULT_DATABASE_URL_ENV.to_string(),
            },
        }
    }
}

impl ValidatorSettings {
    pub fn from_config_json(config: &Value) -> Result<Self> {
        let d = ValidatorSettings::default();

        let base_url = read_string(config, "/reference/base_url")?
            .unwrap_or(d.reference.base_url);
        let timeout_secs =
            read_u64(config, "/reference/timeout_secs")?.unwrap_or(d.reference.timeout_secs);
        if timeout_secs == 0 {
            bail!("config /reference/timeout_secs must be > 0");
        }
        let min_request_interval_ms = read_u64(config, "/reference/min_request_interval_ms")?
            .unwrap_or(d.reference.min_request_interval_ms);

        let off_venue_sentinel = read_string(config, "/validation/off_venue_sentinel")?
            .unwrap_or(d.validation.off_venue_sentinel);
        let timezone = match read_string(config, "/validation/timezone")? {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow!("config /validation/timezone invalid '{name}': {e}"))?,
            None => d.validation.timezone,
        };

        let fail_marker =
            read_string(config, "/output/fail_marker")?.unwrap_or(d.output.fail_marker);
        let marker_headers = match read_string_list(config, "/output/marker_headers")? {
            Some(list) => {
                let n = list.len();
                <[String; 4]>::try_from(list).map_err(|_| {
                    anyhow!("config /output/marker_headers must list exactly 4 labels, got {n}")
                })?
            }
            None => d.output.marker_headers,
        };

        let enabled = read_bool(config, "/prefilter/enabled")?.unwrap_or(d.prefilter.enabled);
        let eligible_statuses = read_string_list(config, "/prefilter/eligible_statuses")?
            .unwrap_or(d.prefilter.eligible_statuses);
        let database_url_env = read_string(config, "/prefilter/database_url_env")?
            .unwrap_or(d.prefilter.database_url_env);

        Ok(Self {
            reference: ReferenceSettings {
                base_url,
                timeout_secs,
                min_request_interval_ms,
            },
            validation: ValidationSettings {
                off_venue_sentinel,
                timezone,
            },
            output: OutputSettings {
                fail_marker,
                marker_headers,
            },
            prefilter: PreFilterSettings {
                enabled,
                eligible_statuses,
                database_url_env,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Pointer readers
// ---------------------------------------------------------------------------

fn read_string(config: &Value, pointer: &str) -> Result<Option<String>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() {
                bail!("config {pointer} must not be blank");
            }
            Ok(Some(t.to_string()))
        }
        Some(other) => bail!("config {pointer} must be a string, got {other}"),
    }
}

fn read_u64(config: &Value, pointer: &str) -> Result<Option<u64>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| anyhow!("config {pointer} must be a non-negative integer, got {v}")),
    }
}

fn read_bool(config: &Value, pointer: &str) -> Result<Option<bool>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| anyhow!("config {pointer} must be a boolean, got {v}")),
    }
}

fn read_string_list(config: &Value, pointer: &str) -> Result<Option<Vec<String>>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(s) => out.push(s.trim().to_string()),
                    None => bail!("config {pointer}/{i} must be a string, got {item}"),
                }
            }
            Ok(Some(out))
        }
        Some(other) => bail!("config {pointer} must be a list, got {other}"),
    }
}
