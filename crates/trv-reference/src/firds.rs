//! FIRDS register adapter.
//!
//! Queries the ESMA FIRDS register search endpoint for one identifier and maps
//! each returned document (one per trading venue) to a [`VenueFact`].
//!
//! Mapping:
//! - `mic` -> venue MIC
//! - `mrkt_trdng_start_date` -> approval start
//! - `bnd_maturity_date`, else `mrkt_trdng_trmination_date` -> maturity
//!
//! Failure mapping:
//! - empty result set -> [`LookupError::NotFound`]
//! - transport error, timeout, any non-2xx (404 included), undecodable body
//!   -> [`LookupError::Unavailable`]
//!
//! A 404 means the endpoint is wrong, not that the identifier is unknown.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::{LookupError, ReferenceFact, ReferenceLookup, VenueFact};

/// Documents requested per page.
const PAGE_SIZE: usize = 10;
/// Upper bound on pages fetched for one identifier.
const MAX_PAGES: usize = 20;

/// FIRDS-backed reference source.
#[derive(Debug)]
pub struct FirdsReference {
    http: reqwest::Client,
    base_url: String,
    min_interval: Duration,
    /// Earliest instant the next request may be sent.
    next_slot: Mutex<Option<Instant>>,
}

impl FirdsReference {
    pub fn new(base_url: String, timeout: Duration, min_interval: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build firds http client failed")?;
        Ok(Self {
            http,
            base_url,
            min_interval,
            next_slot: Mutex::new(None),
        })
    }

    /// Wait until the rate-limit slot opens, then claim the next one.
    async fn pace(&self) {
        let wait = {
            let mut slot = self.next_slot.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let at = match *slot {
                Some(t) if t > now => t,
                _ => now,
            };
            *slot = Some(at + self.min_interval);
            at.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    async fn fetch_page(&self, identifier: &str, start: usize) -> Result<SearchBody, LookupError> {
        self.pace().await;

        let payload = SearchRequest::for_identifier(identifier, start);
        debug!(identifier, start, "firds request");

        let resp = self
            .http
            .post(&self.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LookupError::Unavailable(format!("firds request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Unavailable(format!(
                "firds http error status={}",
                status.as_u16()
            )));
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| LookupError::Unavailable(format!("firds response decode failed: {e}")))?;

        body.response.ok_or_else(|| {
            LookupError::Unavailable("firds response missing 'response' object".to_string())
        })
    }
}

#[async_trait::async_trait]
impl ReferenceLookup for FirdsReference {
    fn source_name(&self) -> &'static str {
        "firds"
    }

    async fn lookup(&self, identifier: &str) -> Result<ReferenceFact, LookupError> {
        let mut docs: Vec<FirdsDoc> = Vec::new();
        let mut start = 0usize;

        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(identifier, start).await?;
            let got = page.docs.len();
            docs.extend(page.docs);

            let total = page.num_found.map(|n| n as usize).unwrap_or(docs.len());
            if got == 0 || docs.len() >= total {
                break;
            }
            start += got;
        }

        if docs.is_empty() {
            return Err(LookupError::NotFound);
        }

        debug!(identifier, venues = docs.len(), "firds lookup resolved");
        Ok(fact_from_docs(identifier, docs))
    }
}

fn fact_from_docs(identifier: &str, docs: Vec<FirdsDoc>) -> ReferenceFact {
    let venues = docs
        .into_iter()
        .map(|d| {
            let maturity_raw = non_blank(d.bnd_maturity_date.as_deref())
                .or_else(|| non_blank(d.mrkt_trdng_trmination_date.as_deref()));
            VenueFact {
                mic: d.mic.unwrap_or_default().trim().to_ascii_uppercase(),
                approval_start: non_blank(d.mrkt_trdng_start_date.as_deref())
                    .and_then(parse_reference_instant),
                maturity: maturity_raw.and_then(parse_reference_instant),
            }
        })
        .collect();

    ReferenceFact {
        identifier: identifier.to_string(),
        venues,
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a reference-source timestamp as UTC.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` (fraction
/// after `.` ignored), `YYYY-MM-DD` and `DD/MM/YYYY` (midnight). Returns
/// `None` for anything else.
pub fn parse_reference_instant(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_zone = s.trim_end_matches('Z');
    let no_frac = no_zone.split('.').next().unwrap_or(no_zone);
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(no_frac, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|ndt| Utc.from_utc_datetime(&ndt));
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    core: &'static str,
    paging_size: String,
    start: usize,
    keyword: &'static str,
    sort_field: &'static str,
    criteria: [Criterion<'a>; 2],
    wt: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Criterion<'a> {
    name: &'static str,
    value: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    is_parent: bool,
}

impl<'a> SearchRequest<'a> {
    fn for_identifier(identifier: &'a str, start: usize) -> Self {
        Self {
            core: "esma_registers_firds",
            paging_size: PAGE_SIZE.to_string(),
            start,
            keyword: "",
            sort_field: "isin asc",
            criteria: [
                Criterion {
                    name: "isin",
                    value: identifier,
                    kind: "text",
                    is_parent: true,
                },
                Criterion {
                    name: "firdsPublicationDateCustomSearchInputField",
                    value: "(latest_received_flag:1)",
                    kind: "customSearchInputFieldQuery",
                    is_parent: true,
                },
            ],
            wt: "json",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: Option<SearchBody>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default, rename = "numFound")]
    num_found: Option<u64>,
    #[serde(default)]
    docs: Vec<FirdsDoc>,
}

#[derive(Debug, Deserialize)]
struct FirdsDoc {
    #[serde(default)]
    mic: Option<String>,
    #[serde(default)]
    mrkt_trdng_start_date: Option<String>,
    #[serde(default)]
    bnd_maturity_date: Option<String>,
    #[serde(default)]
    mrkt_trdng_trmination_date: Option<String>,
}

// -----------------
// Tests (no network)
// -----------------

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    #[test]
    fn reference_instant_formats() {
        assert_eq!(
            parse_reference_instant("2019-03-04T08:00:00Z"),
            Some(utc(2019, 3, 4, 8, 0, 0))
        );
        assert_eq!(
            parse_reference_instant("2019-03-04T09:00:00+01:00"),
            Some(utc(2019, 3, 4, 8, 0, 0))
        );
        assert_eq!(
            parse_reference_instant("2019-03-04 08:00:00.123456"),
            Some(utc(2019, 3, 4, 8, 0, 0))
        );
        assert_eq!(
            parse_reference_instant("2019-03-04T08:00:00"),
            Some(utc(2019, 3, 4, 8, 0, 0))
        );
        assert_eq!(parse_reference_instant("2030-12-31"), Some(utc(2030, 12, 31, 0, 0, 0)));
        assert_eq!(parse_reference_instant("31/12/2030"), Some(utc(2030, 12, 31, 0, 0, 0)));
    }

    #[test]
    fn reference_instant_garbage_is_none() {
        assert_eq!(parse_reference_instant(""), None);
        assert_eq!(parse_reference_instant("n/a"), None);
        assert_eq!(parse_reference_instant("2019-13-45"), None);
    }

    #[test]
    fn request_payload_shape() {
        let v = serde_json::to_value(SearchRequest::for_identifier("IT0001234567", 10)).unwrap();
        assert_eq!(v["core"], "esma_registers_firds");
        assert_eq!(v["pagingSize"], "10");
        assert_eq!(v["start"], 10);
        assert_eq!(v["sortField"], "isin asc");
        assert_eq!(v["criteria"][0]["name"], "isin");
        assert_eq!(v["criteria"][0]["value"], "IT0001234567");
        assert_eq!(v["criteria"][0]["type"], "text");
        assert_eq!(v["criteria"][0]["isParent"], true);
        assert_eq!(v["criteria"][1]["value"], "(latest_received_flag:1)");
        assert_eq!(v["wt"], "json");
    }

    #[test]
    fn docs_map_to_venues_with_maturity_fallback() {
        let docs: Vec<FirdsDoc> = serde_json::from_value(serde_json::json!([
            {
                "mic": "mtaa",
                "mrkt_trdng_start_date": "2020-01-02T08:00:00Z",
                "bnd_maturity_date": "2030-06-30"
            },
            {
                "mic": "XMIL",
                "mrkt_trdng_start_date": "garbage",
                "bnd_maturity_date": "",
                "mrkt_trdng_trmination_date": "2029-01-01T00:00:00Z"
            },
            { "mrkt_trdng_start_date": null }
        ]))
        .unwrap();

        let fact = fact_from_docs("IT0001234567", docs);
        assert_eq!(fact.venues.len(), 3);
        assert_eq!(fact.venues[0].mic, "MTAA");
        assert_eq!(fact.venues[0].approval_start, Some(utc(2020, 1, 2, 8, 0, 0)));
        assert_eq!(fact.venues[0].maturity, Some(utc(2030, 6, 30, 0, 0, 0)));
        assert_eq!(fact.venues[1].approval_start, None);
        assert_eq!(fact.venues[1].maturity, Some(utc(2029, 1, 1, 0, 0, 0)));
        assert_eq!(fact.venues[2].mic, "");
        assert_eq!(fact.mic_set().len(), 2);
    }
}
