//! trv-reference
//!
//! Reference-data boundary for instrument validation.
//!
//! This crate owns the [`ReferenceLookup`] abstraction, the [`ReferenceFact`]
//! snapshot it returns, the market code normalizer, and the concrete
//! adapters (FIRDS register over HTTP, in-memory/snapshot).
//! It does **not** cache: one lookup per identifier per run is enforced by the
//! caller (`trv-validate`).

pub mod firds;
pub mod memory;
pub mod venue;

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use firds::{parse_reference_instant, FirdsReference};
pub use memory::InMemoryReference;
pub use venue::{is_off_venue, normalize_venue};

// ---------------------------------------------------------------------------
// Reference facts
// ---------------------------------------------------------------------------

/// Reference data for one instrument on one trading venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueFact {
    /// Market identifier code, upper-case.
    pub mic: String,
    /// Admission to trading (UTC). `None` when absent or unparseable.
    #[serde(default)]
    pub approval_start: Option<DateTime<Utc>>,
    /// Maturity / termination (UTC). `None` when absent or unparseable.
    #[serde(default)]
    pub maturity: Option<DateTime<Utc>>,
}

/// Everything the reference source knows about an identifier.
///
/// Existence of a `ReferenceFact` is the presence flag: unknown identifiers
/// are reported as [`LookupError::NotFound`] instead. Venues keep the order in
/// which the source returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFact {
    pub identifier: String,
    #[serde(default)]
    pub venues: Vec<VenueFact>,
}

impl ReferenceFact {
    /// Upper-case MIC codes known for this instrument.
    pub fn mic_set(&self) -> BTreeSet<String> {
        self.venues
            .iter()
            .map(|v| v.mic.trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .collect()
    }

    pub fn has_mic(&self, code: &str) -> bool {
        self.venue(code).is_some()
    }

    /// Venue whose MIC equals `code` (case-insensitive, trimmed).
    pub fn venue(&self, code: &str) -> Option<&VenueFact> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }
        self.venues
            .iter()
            .find(|v| v.mic.trim().eq_ignore_ascii_case(code))
    }

    /// First venue as returned by the source.
    pub fn first_venue(&self) -> Option<&VenueFact> {
        self.venues.first()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Lookup failures surfaced to the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The identifier is unknown to the reference source.
    NotFound,
    /// The source could not be reached or answered with garbage.
    Unavailable(String),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NotFound => write!(f, "identifier not found in reference source"),
            LookupError::Unavailable(msg) => write!(f, "reference source unavailable: {msg}"),
        }
    }
}

impl std::error::Error for LookupError {}

// ---------------------------------------------------------------------------
// Lookup trait
// ---------------------------------------------------------------------------

/// Pluggable reference source.
///
/// Implementations must not retry on behalf of the validator beyond their own
/// transport contract, and must not cache across identifiers.
#[async_trait::async_trait]
pub trait ReferenceLookup: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn lookup(&self, identifier: &str) -> Result<ReferenceFact, LookupError>;
}
