//! Run artifacts: the annotated layout, the summary, and the run manifest.
//!
//! Layout of one run directory:
//!
//! ```text
//! <exports_root>/<run_id>/
//!   annotated.csv   input rows + four marker columns
//!   summary.json    RunSummary
//!   manifest.json   RunManifest
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use trv_config::OutputSettings;
use trv_layout::{Check, OutcomeVector, ParsedLayout, RawTable};
use trv_validate::RunSummary;
use uuid::Uuid;

pub const MANIFEST_SCHEMA_VERSION: i32 = 1;

// ---------------------------------------------------------------------------
// Marker overlay
// ---------------------------------------------------------------------------

/// Input rows with four marker cells appended to each.
///
/// - column-header row: the marker header labels
/// - evaluated order rows: the fail marker per failed check, blank otherwise
/// - every other row (preamble, group headers, separators, excluded orders): blanks
///
/// Rows are padded to the table width first so marker columns line up.
/// Original cell text is never touched.
pub fn overlay_markers(
    table: &RawTable,
    layout: &ParsedLayout,
    output: &OutputSettings,
) -> Vec<Vec<String>> {
    let width = table.width();
    let outcomes: HashMap<usize, OutcomeVector> =
        layout.orders().map(|o| (o.row, o.outcome)).collect();

    table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut out = row.clone();
            out.resize(width.max(row.len()), String::new());

            if i == layout.header_row {
                out.extend(output.marker_headers.iter().cloned());
            } else if let Some(v) = outcomes.get(&i) {
                out.extend(Check::ALL.iter().map(|c| {
                    if v.is_failed(*c) {
                        output.fail_marker.clone()
                    } else {
                        String::new()
                    }
                }));
            } else {
                out.extend(std::iter::repeat(String::new()).take(Check::ALL.len()));
            }
            out
        })
        .collect()
}

/// Write `rows` as delimited text in `encoding` (the input's encoding, so
/// original cells come back byte for byte).
pub fn write_annotated_csv(
    path: &Path,
    rows: &[Vec<String>],
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<()> {
    let mut w = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(Vec::new());

    for row in rows {
        w.write_record(row)
            .with_context(|| format!("write annotated csv failed: {}", path.display()))?;
    }
    let buf = w.into_inner().map_err(|e| {
        anyhow::anyhow!("flush annotated csv failed: {}: {}", path.display(), e.error())
    })?;
    let text = String::from_utf8(buf).context("annotated csv is not utf-8")?;

    let (bytes, _, _) = encoding.encode(&text);
    fs::write(path, &bytes)
        .with_context(|| format!("create annotated csv failed: {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    pub input_path: String,
    pub input_sha256: String,
    pub input_encoding: String,
    pub config_hash: String,
    pub reference_source: String,
    pub git_hash: String,
    pub host_fingerprint: String,
    pub created_at_utc: DateTime<Utc>,
    pub artifacts: ArtifactList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactList {
    pub annotated_csv: String,
    pub summary_json: String,
    pub manifest_json: String,
}

pub struct InitRunArtifactsArgs<'a> {
    pub exports_root: &'a Path, // e.g. ../exports
    pub run_id: Uuid,
    pub input_path: &'a Path,
    pub input_sha256: &'a str,
    pub config_hash: &'a str,
    pub git_hash: &'a str,
    pub host_fingerprint: &'a str,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

pub struct InitRunArtifactsResult {
    pub run_dir: PathBuf,
    pub annotated_path: PathBuf,
    pub summary_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Create the run directory and write all three artifacts.
pub fn init_run_artifacts(
    args: InitRunArtifactsArgs<'_>,
    annotated: &[Vec<String>],
    summary: &RunSummary,
) -> Result<InitRunArtifactsResult> {
    // exports/<run_id>/
    let run_dir = args.exports_root.join(args.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create exports dir failed: {}", run_dir.display()))?;

    let artifacts = ArtifactList {
        annotated_csv: "annotated.csv".to_string(),
        summary_json: "summary.json".to_string(),
        manifest_json: "manifest.json".to_string(),
    };

    let annotated_path = run_dir.join(&artifacts.annotated_csv);
    write_annotated_csv(&annotated_path, annotated, args.delimiter, args.encoding)?;

    let summary_path = run_dir.join(&artifacts.summary_json);
    write_json(&summary_path, summary).context("serialize summary failed")?;

    let manifest = RunManifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        run_id: args.run_id,
        input_path: args.input_path.display().to_string(),
        input_sha256: args.input_sha256.to_string(),
        input_encoding: args.encoding.name().to_string(),
        config_hash: args.config_hash.to_string(),
        reference_source: summary.reference_source.clone(),
        git_hash: args.git_hash.to_string(),
        host_fingerprint: args.host_fingerprint.to_string(),
        created_at_utc: Utc::now(),
        artifacts: artifacts.clone(),
    };
    let manifest_path = run_dir.join(&artifacts.manifest_json);
    write_json(&manifest_path, &manifest).context("serialize manifest failed")?;

    Ok(InitRunArtifactsResult {
        run_dir,
        annotated_path,
        summary_path,
        manifest_path,
    })
}

/// sha256 of a file's bytes, hex encoded.
pub fn file_sha256(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read input failed: {}", path.display()))?;
    Ok(trv_config::sha256_hex(&bytes))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, format!("{json}\n"))
        .with_context(|| format!("write failed: {}", path.display()))?;
    Ok(())
}
