//! Long-running background task that polls the Soroban RPC and writes
//! decoded crowdfunding events to the database.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db;
use crate::errors::Result;
use crate::rpc::{self, EventPage};

pub struct IndexerState {
    pub pool: SqlitePool,
    pub config: Config,
    pub client: Client,
}

/// Where the next poll starts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Position {
    ledger: u32,
    cursor: Option<String>,
}

/// Run the indexer loop until `shutdown` is cancelled.
pub async fn run(state: Arc<IndexerState>, shutdown: CancellationToken) {
    info!("Indexer starting, contract: {}", state.config.contract_id);

    let mut position = resume_position(&state.pool, state.config.start_ledger).await;
    info!("Resuming from ledger {}", position.ledger);

    loop {
        match poll_once(&state.pool, &state.client, &state.config, &position).await {
            Ok(next) => position = next,
            Err(e) => error!("Indexer poll error: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Indexer stopping at ledger {}", position.ledger);
                return;
            }
            _ = tokio::time::sleep(Duration::from_secs(state.config.poll_interval_secs)) => {}
        }
    }
}

/// Load the persisted cursor; fall back to `start_ledger` on a fresh database.
async fn resume_position(pool: &SqlitePool, start_ledger: u32) -> Position {
    let last_ledger = db::get_last_ledger(pool).await.unwrap_or(0);
    let cursor = db::get_cursor_string(pool).await.unwrap_or(None);

    let ledger = match u32::try_from(last_ledger) {
        Ok(ledger) if ledger > 0 => ledger,
        Ok(_) => start_ledger,
        Err(_) => {
            warn!("Saved ledger {last_ledger} is out of range; using {start_ledger}");
            start_ledger
        }
    };

    Position { ledger, cursor }
}

/// Perform a single poll iteration.
async fn poll_once(
    pool: &SqlitePool,
    client: &Client,
    config: &Config,
    position: &Position,
) -> Result<Position> {
    let page = rpc::fetch_events(
        client,
        &config.rpc_url,
        &config.contract_id,
        position.ledger,
        position.cursor.as_deref(),
        config.events_per_page,
    )
    .await?;

    store_page(pool, &config.contract_id, page, position).await
}

/// Store a fetched page and persist where the next poll starts.
async fn store_page(
    pool: &SqlitePool,
    contract_id: &str,
    page: EventPage,
    position: &Position,
) -> Result<Position> {
    if !page.events.is_empty() {
        let decoded = rpc::decode_events(&page.events, contract_id);
        let inserted = db::insert_events(pool, &decoded).await?;
        info!(
            "Polled {} raw events → {} new records stored",
            page.events.len(),
            inserted
        );
    }

    let next = Position {
        ledger: page
            .latest_ledger
            .and_then(|l| u32::try_from(l).ok())
            .map(|l| l.max(position.ledger))
            .unwrap_or(position.ledger),
        cursor: page.cursor,
    };

    // Persist so restarts are deterministic.
    db::save_cursor(pool, i64::from(next.ledger), next.cursor.as_deref()).await?;

    Ok(next)
}
