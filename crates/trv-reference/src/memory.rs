//! In-memory reference source.
//!
//! Serves facts from a fixed map. Used for offline runs (snapshot file) and in
//! tests, where [`InMemoryReference::calls`] proves the one-lookup-per-identifier
//! contract of the caller.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};

use crate::{LookupError, ReferenceFact, ReferenceLookup};

#[derive(Debug, Default)]
pub struct InMemoryReference {
    facts: HashMap<String, ReferenceFact>,
    unavailable: bool,
    calls: AtomicUsize,
}

impl InMemoryReference {
    pub fn new(facts: impl IntoIterator<Item = ReferenceFact>) -> Self {
        let facts = facts
            .into_iter()
            .map(|f| (f.identifier.trim().to_ascii_uppercase(), f))
            .collect();
        Self {
            facts,
            unavailable: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A source that answers every lookup with `Unavailable`.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Load a JSON array of [`ReferenceFact`] records.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read reference snapshot failed: {}", path.display()))?;
        let facts: Vec<ReferenceFact> = serde_json::from_str(&raw)
            .with_context(|| format!("parse reference snapshot failed: {}", path.display()))?;
        Ok(Self::new(facts))
    }

    /// Number of `lookup` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReferenceLookup for InMemoryReference {
    fn source_name(&self) -> &'static str {
        "in_memory"
    }

    async fn lookup(&self, identifier: &str) -> Result<ReferenceFact, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(LookupError::Unavailable("in-memory source offline".to_string()));
        }
        self.facts
            .get(&identifier.trim().to_ascii_uppercase())
            .cloned()
            .ok_or(LookupError::NotFound)
    }
}
