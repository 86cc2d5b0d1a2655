//! Database layer: migrations, event ingestion, read model and cursor management.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};

use crate::errors::{IndexerError, Result};
use crate::events::{
    CampaignEvent, ContributionRecord, EventKind, EventRecord, ProjectRecord, StartedDetails,
};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    // Every connection to `:memory:` is its own database, so keep exactly one alive.
    let pool = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Cursor helpers
// ─────────────────────────────────────────────────────────

/// Read the last-seen ledger from the cursor row.
/// Returns `0` when no cursor has been persisted yet.
pub async fn get_last_ledger(pool: &SqlitePool) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT last_ledger FROM indexer_cursor WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Persist the last-seen ledger (and optionally a pagination cursor string).
pub async fn save_cursor(
    pool: &SqlitePool,
    last_ledger: i64,
    last_cursor: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE indexer_cursor SET last_ledger = ?1, last_cursor = ?2 WHERE id = 1")
        .bind(last_ledger)
        .bind(last_cursor)
        .execute(pool)
        .await?;
    Ok(())
}

/// Read back the raw cursor string (used to resume pagination mid-ledger).
pub async fn get_cursor_string(pool: &SqlitePool) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT last_cursor FROM indexer_cursor WHERE id = 1")
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(v,)| v))
}

// ─────────────────────────────────────────────────────────
// Event writes
// ─────────────────────────────────────────────────────────

/// Persist a batch of decoded events and fold them into the read model.
///
/// The whole batch is one transaction. Events whose `event_id` is already
/// stored are skipped, so replaying a page is harmless. Events with an
/// unparseable or overflowing amount are stored but not applied.
///
/// Returns the number of newly stored events.
pub async fn insert_events(pool: &SqlitePool, events: &[CampaignEvent]) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for ev in events {
        let rows_affected = sqlx::query(
            r#"
            INSERT OR IGNORE INTO events
                (event_id, event_type, project_id, actor, amount, new_total,
                 ledger, timestamp, contract_id, tx_hash)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&ev.event_id)
        .bind(ev.kind.as_str())
        .bind(ev.project_id.map(|id| id.to_string()))
        .bind(&ev.actor)
        .bind(&ev.amount)
        .bind(&ev.new_total)
        .bind(ev.ledger)
        .bind(ev.timestamp)
        .bind(&ev.contract_id)
        .bind(&ev.tx_hash)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 1 {
            // A malformed payload keeps its raw row but leaves the read model alone,
            // so one bad event cannot wedge the batch.
            match apply_event(&mut tx, ev).await {
                Ok(()) => {}
                Err(e @ (IndexerError::EventParse(_) | IndexerError::AmountOverflow { .. })) => {
                    warn!("Event {} stored but not applied: {e}", ev.event_id);
                }
                Err(e) => return Err(e),
            }
            count += 1;
        }
    }

    tx.commit().await?;
    Ok(count)
}

/// Update `projects` / `contributions` for one newly stored event.
async fn apply_event(tx: &mut Transaction<'_, Sqlite>, ev: &CampaignEvent) -> Result<()> {
    let Some(project_id) = ev.project_id else {
        warn!("Event {} has no project id; read model unchanged", ev.event_id);
        return Ok(());
    };

    match ev.kind {
        EventKind::ProjectStarted => {
            let details = ev.started.clone().unwrap_or_else(|| StartedDetails {
                title: String::new(),
                description: String::new(),
                image_link: String::new(),
                deadline: 0,
                goal: "0".to_string(),
            });
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO projects
                    (project_id, creator, title, description, image_link, goal, deadline, started_ledger)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(project_id)
            .bind(ev.actor.clone().unwrap_or_default())
            .bind(details.title)
            .bind(details.description)
            .bind(details.image_link)
            .bind(details.goal)
            .bind(details.deadline)
            .bind(ev.ledger)
            .execute(&mut **tx)
            .await?;
        }
        EventKind::ReceivedFunding => {
            let amount = parse_amount(ev.amount.as_deref())?;
            match &ev.actor {
                Some(contributor) => add_contribution(tx, ev, project_id, contributor, amount).await?,
                None => warn!(
                    "Funding event {} has no contributor; per-contributor total skipped",
                    ev.event_id
                ),
            }

            if let Some(new_total) = &ev.new_total {
                sqlx::query("UPDATE projects SET balance = ?1 WHERE project_id = ?2")
                    .bind(new_total)
                    .bind(project_id)
                    .execute(&mut **tx)
                    .await?;
            }
        }
        EventKind::ProjectExpired => {
            sqlx::query(
                "UPDATE projects SET status = 'expired' WHERE project_id = ?1 AND status = 'fundraising'",
            )
            .bind(project_id)
            .execute(&mut **tx)
            .await?;
        }
        EventKind::CreatorPaid => {
            let amount = parse_amount(ev.amount.as_deref())?;
            let paid: Option<(String,)> =
                sqlx::query_as("SELECT paid_out FROM projects WHERE project_id = ?1")
                    .bind(project_id)
                    .fetch_optional(&mut **tx)
                    .await?;
            let paid_out = parse_amount(paid.as_ref().map(|(a,)| a.as_str()))?
                .checked_add(amount)
                .ok_or_else(|| IndexerError::AmountOverflow {
                    event: ev.event_id.clone(),
                    project_id,
                })?;

            sqlx::query(
                "UPDATE projects SET balance = '0', paid_out = ?1, status = 'successful' WHERE project_id = ?2",
            )
            .bind(paid_out.to_string())
            .bind(project_id)
            .execute(&mut **tx)
            .await?;
        }
        EventKind::Unknown => {}
    }

    Ok(())
}

/// Add `amount` to the running total of `contributor` in `project_id`.
async fn add_contribution(
    tx: &mut Transaction<'_, Sqlite>,
    ev: &CampaignEvent,
    project_id: i64,
    contributor: &str,
    amount: i128,
) -> Result<()> {
    let existing: Option<(String,)> = sqlx::query_as(
        "SELECT amount FROM contributions WHERE project_id = ?1 AND contributor = ?2",
    )
    .bind(project_id)
    .bind(contributor)
    .fetch_optional(&mut **tx)
    .await?;
    let previous = parse_amount(existing.as_ref().map(|(a,)| a.as_str()))?;
    let total = previous
        .checked_add(amount)
        .ok_or_else(|| IndexerError::AmountOverflow {
            event: ev.event_id.clone(),
            project_id,
        })?;

    sqlx::query(
        r#"
        INSERT INTO contributions (project_id, contributor, amount)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (project_id, contributor) DO UPDATE SET amount = excluded.amount
        "#,
    )
    .bind(project_id)
    .bind(contributor)
    .bind(total.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Parse a decimal `i128` amount; a missing amount counts as zero.
fn parse_amount(raw: Option<&str>) -> Result<i128> {
    match raw {
        None => Ok(0),
        Some(s) => s
            .parse::<i128>()
            .map_err(|_| IndexerError::EventParse(format!("invalid amount {s:?}"))),
    }
}

// ─────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────

/// Fetch all events for a given project, ordered by ledger ascending.
pub async fn get_events_for_project(pool: &SqlitePool, project_id: i64) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT id, event_id, event_type, project_id, actor, amount, new_total,
               ledger, timestamp, contract_id, tx_hash, created_at
        FROM   events
        WHERE  project_id = ?1
        ORDER  BY ledger ASC, id ASC
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch all events, ordered by ledger ascending.
pub async fn get_all_events(pool: &SqlitePool) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT id, event_id, event_type, project_id, actor, amount, new_total,
               ledger, timestamp, contract_id, tx_hash, created_at
        FROM   events
        ORDER  BY ledger ASC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// All indexed campaigns in creation order.
pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<ProjectRecord>> {
    let rows = sqlx::query_as::<_, ProjectRecord>(
        r#"
        SELECT project_id, creator, title, description, image_link, goal, deadline,
               balance, paid_out, status, started_ledger
        FROM   projects
        ORDER  BY project_id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_project(pool: &SqlitePool, project_id: i64) -> Result<Option<ProjectRecord>> {
    let row = sqlx::query_as::<_, ProjectRecord>(
        r#"
        SELECT project_id, creator, title, description, image_link, goal, deadline,
               balance, paid_out, status, started_ledger
        FROM   projects
        WHERE  project_id = ?1
        "#,
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Per-contributor totals for a campaign, ordered by contributor address.
pub async fn get_contributions(
    pool: &SqlitePool,
    project_id: i64,
) -> Result<Vec<ContributionRecord>> {
    let rows = sqlx::query_as::<_, ContributionRecord>(
        r#"
        SELECT project_id, contributor, amount
        FROM   contributions
        WHERE  project_id = ?1
        ORDER  BY contributor ASC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────
