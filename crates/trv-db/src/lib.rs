use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::debug;
use trv_layout::ParsedLayout;
use trv_validate::{eligible_rows_by_status, OrderPreFilter, PreFilterError};

pub const ENV_DB_URL: &str = "TRV_DATABASE_URL";

/// Connect to Postgres at `url`.
pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Connect to Postgres using TRV_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='order_status'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_order_status_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_order_status_table: bool,
}

/// Insert or replace the status of one order.
pub async fn upsert_order_status(
    pool: &PgPool,
    order_number: &str,
    status: &str,
    updated_at_utc: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into order_status (order_number, status, updated_at_utc)
        values ($1, $2, $3)
        on conflict (order_number) do update
          set status = excluded.status,
              updated_at_utc = excluded.updated_at_utc
        "#,
    )
    .bind(order_number)
    .bind(status)
    .bind(updated_at_utc)
    .execute(pool)
    .await
    .with_context(|| format!("upsert_order_status failed for {order_number}"))?;

    Ok(())
}

/// Known statuses for `order_numbers`. Unknown numbers are simply absent.
pub async fn fetch_order_statuses(
    pool: &PgPool,
    order_numbers: &[String],
) -> Result<HashMap<String, String>, sqlx::Error> {
    if order_numbers.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(String, String)> = sqlx::query_as::<_, (String, String)>(
        r#"
        select order_number, status
        from order_status
        where order_number = any($1)
        "#,
    )
    .bind(order_numbers)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Pre-filter adapter
// ---------------------------------------------------------------------------

/// Pre-filter backed by the `order_status` table.
///
/// The pool connects lazily, so an unreachable database surfaces as
/// [`PreFilterError::Unavailable`] on first use instead of at construction.
pub struct OrderStatusPreFilter {
    pool: PgPool,
    eligible_statuses: Vec<String>,
}

impl OrderStatusPreFilter {
    pub fn new(database_url: &str, eligible_statuses: Vec<String>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(database_url)
            .context("invalid pre-filter database url")?;
        Ok(Self::with_pool(pool, eligible_statuses))
    }

    pub fn with_pool(pool: PgPool, eligible_statuses: Vec<String>) -> Self {
        Self {
            pool,
            eligible_statuses,
        }
    }
}

#[async_trait::async_trait]
impl OrderPreFilter for OrderStatusPreFilter {
    fn name(&self) -> &'static str {
        "order_status"
    }

    async fn eligible_rows(&self, layout: &ParsedLayout) -> Result<BTreeSet<usize>, PreFilterError> {
        let numbers: Vec<String> = layout
            .orders()
            .filter_map(|o| o.order_number.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let statuses = fetch_order_statuses(&self.pool, &numbers)
            .await
            .map_err(classify)?;
        debug!(
            requested = numbers.len(),
            known = statuses.len(),
            "order statuses fetched"
        );

        Ok(eligible_rows_by_status(
            layout,
            &statuses,
            &self.eligible_statuses,
        ))
    }
}

fn classify(e: sqlx::Error) -> PreFilterError {
    match e {
        sqlx::Error::Database(db) => PreFilterError::Query(db.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::RowNotFound => {
            PreFilterError::Query(e.to_string())
        }
        other => PreFilterError::Unavailable(other.to_string()),
    }
}
