//! Per-run reference cache.
//!
//! One lookup per distinct identifier per run. The first `Unavailable` answer
//! poisons the cache for the rest of the run: no further lookups are issued
//! and every identifier, including ones already resolved, reads as not found.

use std::collections::HashMap;

use tracing::{debug, warn};
use trv_reference::{LookupError, ReferenceFact, ReferenceLookup};

pub struct ReferenceCache<'a> {
    lookup: &'a dyn ReferenceLookup,
    entries: HashMap<String, Option<ReferenceFact>>,
    unavailable: Option<String>,
    calls: usize,
}

impl<'a> ReferenceCache<'a> {
    pub fn new(lookup: &'a dyn ReferenceLookup) -> Self {
        Self {
            lookup,
            entries: HashMap::new(),
            unavailable: None,
            calls: 0,
        }
    }

    /// Fetch `identifier` unless it was fetched already or the source is down.
    pub async fn prime(&mut self, identifier: &str) {
        if self.unavailable.is_some() || self.entries.contains_key(identifier) {
            return;
        }

        self.calls += 1;
        match self.lookup.lookup(identifier).await {
            Ok(fact) => {
                self.entries.insert(identifier.to_string(), Some(fact));
            }
            Err(LookupError::NotFound) => {
                debug!(identifier, "identifier not found in reference source");
                self.entries.insert(identifier.to_string(), None);
            }
            Err(LookupError::Unavailable(reason)) => {
                warn!(
                    identifier,
                    source = self.lookup.source_name(),
                    %reason,
                    "reference source unavailable; treating every identifier as not found for this run"
                );
                self.unavailable = Some(reason);
            }
        }
    }

    /// Cached fact, `None` for not found or when the source went down.
    pub fn get(&self, identifier: &str) -> Option<&ReferenceFact> {
        if self.unavailable.is_some() {
            return None;
        }
        self.entries.get(identifier).and_then(|e| e.as_ref())
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable.is_some()
    }

    /// Lookups actually issued to the source.
    pub fn calls(&self) -> usize {
        self.calls
    }
}
