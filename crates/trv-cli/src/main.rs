use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use trv_config::{ConfigScope, LoadedConfig, UnusedKeyPolicy, ValidatorSettings};
use trv_layout::{parse_layout, read_csv_file};
use trv_reference::{normalize_venue, FirdsReference, InMemoryReference, ReferenceLookup};
use trv_validate::{apply_prefilter, OrderPreFilter, Validator};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "trv")]
#[command(about = "Transaction reporting validator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an order layout and write the annotated copy + summary
    Validate {
        /// Input layout (delimited text export of the spreadsheet)
        #[arg(long)]
        input: PathBuf,

        /// Layered config paths in merge order (base -> site -> run)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Field delimiter of the input (and of the annotated output)
        #[arg(long, default_value_t = ';')]
        delimiter: char,

        /// Root folder for run directories
        #[arg(long = "exports-root", default_value = "../exports")]
        exports_root: PathBuf,

        /// Serve reference data from a JSON snapshot instead of FIRDS
        #[arg(long = "reference-snapshot")]
        reference_snapshot: Option<PathBuf>,

        /// Skip the order-status pre-filter even when enabled in config
        #[arg(long = "no-prefilter", default_value_t = false)]
        no_prefilter: bool,

        /// Fail on config keys nothing reads (default: warn)
        #[arg(long = "strict-config", default_value_t = false)]
        strict_config: bool,
    },

    /// Print the normalized form of a venue code
    NormalizeVenue { code: String },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Order-status database commands
    Db {
        /// Layered config paths; only prefilter.database_url_env is read
        #[arg(long = "config")]
        config_paths: Vec<String>,

        #[command(subcommand)]
        cmd: DbCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations (creates the order_status table)
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Validate {
            input,
            config_paths,
            delimiter,
            exports_root,
            reference_snapshot,
            no_prefilter,
            strict_config,
        } => {
            let delimiter = delimiter_byte(delimiter)?;
            let loaded = load_config(&config_paths)?;
            let policy = if strict_config {
                UnusedKeyPolicy::Fail
            } else {
                UnusedKeyPolicy::Warn
            };
            let report =
                trv_config::report_unused_keys(ConfigScope::Validate, &loaded.config_json, policy)?;
            if !report.is_clean() {
                warn!(keys = ?report.unused_leaf_pointers, "unused config keys");
            }
            let settings = ValidatorSettings::from_config_json(&loaded.config_json)?;

            let table = read_csv_file(&input, delimiter)
                .with_context(|| format!("read input failed: {}", input.display()))?;
            let mut layout = parse_layout(&table)
                .with_context(|| format!("layout rejected: {}", input.display()))?;
            for d in &layout.discrepancies {
                warn!(
                    identifier = %d.identifier,
                    row = d.header_row,
                    declared = d.declared,
                    parsed = d.parsed,
                    "occurrence count mismatch"
                );
            }
            info!(
                groups = layout.groups.len(),
                orders = layout.order_count(),
                "layout parsed"
            );

            let prefilter = if settings.prefilter.enabled && !no_prefilter {
                build_prefilter(&loaded, &settings)
            } else {
                None
            };
            let eligibility = apply_prefilter(prefilter.as_deref(), &layout).await;

            let lookup: Box<dyn ReferenceLookup> = match &reference_snapshot {
                Some(path) => Box::new(InMemoryReference::from_json_file(path)?),
                None => Box::new(FirdsReference::new(
                    settings.reference.base_url.clone(),
                    Duration::from_secs(settings.reference.timeout_secs),
                    Duration::from_millis(settings.reference.min_request_interval_ms),
                )?),
            };

            let summary = Validator::new(lookup.as_ref(), &settings.validation)
                .run(&mut layout, &eligibility)
                .await;
            debug!("{summary}");

            let annotated = trv_artifacts::overlay_markers(&table, &layout, &settings.output);
            let run_id = Uuid::new_v4();
            let input_sha256 = trv_artifacts::file_sha256(&input)?;
            let git_hash = get_git_hash().unwrap_or_else(|| "UNKNOWN".to_string());
            let host_fp = host_fingerprint();

            let art = trv_artifacts::init_run_artifacts(
                trv_artifacts::InitRunArtifactsArgs {
                    exports_root: &exports_root,
                    run_id,
                    input_path: &input,
                    input_sha256: &input_sha256,
                    config_hash: &loaded.config_hash,
                    git_hash: &git_hash,
                    host_fingerprint: &host_fp,
                    delimiter,
                    encoding: table.encoding(),
                },
                &annotated,
                &summary,
            )?;

            println!("run_id={}", run_id);
            println!("run_dir={}", art.run_dir.display());
            println!("config_hash={}", loaded.config_hash);
            for t in &summary.checks {
                println!("check{}_passed={}", t.check.number(), t.passed);
                println!("check{}_total={}", t.check.number(), t.total);
            }
            println!("orders_excluded_by_prefilter={}", summary.orders_excluded_by_prefilter);
            println!("discrepancies={}", summary.discrepancies.len());
            println!("reference_unavailable={}", summary.reference_unavailable);
        }
        Commands::NormalizeVenue { code } => {
            println!("normalized={}", normalize_venue(Some(&code)));
        }
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = trv_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
        Commands::Db { config_paths, cmd } => {
            let pool = if config_paths.is_empty() {
                trv_db::connect_from_env().await?
            } else {
                let loaded = load_config(&config_paths)?;
                let report = trv_config::report_unused_keys(
                    ConfigScope::Db,
                    &loaded.config_json,
                    UnusedKeyPolicy::Warn,
                )?;
                debug!(ignored = report.unused_leaf_pointers.len(), "db scope config keys ignored");
                let secrets = trv_config::resolve_secrets(&loaded.config_json);
                trv_db::connect(secrets.require_database_url()?).await?
            };
            match cmd {
                DbCmd::Status => {
                    let s = trv_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_order_status_table={}",
                        s.ok, s.has_order_status_table
                    );
                }
                DbCmd::Migrate => {
                    trv_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    // stdout carries key=value results; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    if paths.is_empty() {
        return LoadedConfig::empty();
    }
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    trv_config::load_layered_yaml(&path_refs)
}

/// Pre-filter from config, or `None` (logged) when it cannot be set up.
fn build_prefilter(
    loaded: &LoadedConfig,
    settings: &ValidatorSettings,
) -> Option<Box<dyn OrderPreFilter>> {
    let secrets = trv_config::resolve_secrets(&loaded.config_json);
    let built = secrets.require_database_url().and_then(|url| {
        trv_db::OrderStatusPreFilter::new(url, settings.prefilter.eligible_statuses.clone())
    });
    match built {
        Ok(f) => Some(Box::new(f)),
        Err(e) => {
            warn!(error = %e, "pre-filter unavailable; validating all orders");
            None
        }
    }
}

fn delimiter_byte(c: char) -> Result<u8> {
    if !c.is_ascii() {
        bail!("delimiter must be a single ASCII character, got {c:?}");
    }
    Ok(c as u8)
}

fn get_git_hash() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8(out.stdout).ok()?;
    Some(s.trim().to_string())
}

/// Non-sensitive host fingerprint for run attribution. Not a hardware id.
fn host_fingerprint() -> String {
    let hostname = std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "UNKNOWN_HOST".to_string());
    let username = std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "UNKNOWN_USER".to_string());
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    format!("{hostname}|{username}|{os}|{arch}")
}
