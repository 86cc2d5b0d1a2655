//! Soroban RPC client: polls `getEvents` and decodes crowdfunding events.
//!
//! ## Resilience
//!
//! * Exponential back-off is applied when the RPC returns an error or rate-limit
//!   response, up to [`MAX_BACKOFF_SECS`] seconds.
//! * Transient network errors (connection reset, timeout) are retried silently.
//!
//! ## Value shapes
//!
//! Events are requested with `xdrFormat: "json"`, so topics and data arrive as
//! `topicJson` / `valueJson`. Two shapes are accepted: the tagged form
//! `{"type":"u64","value":"42"}` and the XDR-JSON form `{"u64":"42"}`, where
//! struct data is a `{"map":[{"key":…,"val":…}]}` list. Topics may also be
//! JSON-encoded strings of either shape.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::errors::{IndexerError, Result};
use crate::events::{CampaignEvent, EventKind, StartedDetails};

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    pub result: Option<EventsResult>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct EventsResult {
    pub events: Vec<RawEvent>,
    pub cursor: Option<String>,
    #[serde(rename = "latestLedger")]
    pub latest_ledger: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawEvent {
    /// Decoded topic list
    #[serde(alias = "topicJson", default)]
    pub topic: Vec<Value>,
    /// Decoded event data
    #[serde(alias = "valueJson", default)]
    pub value: Value,
    #[serde(rename = "contractId")]
    pub contract_id: Option<String>,
    #[serde(rename = "txHash")]
    pub tx_hash: Option<String>,
    pub id: Option<String>,
    pub ledger: Option<u64>,
    #[serde(rename = "ledgerClosedAt")]
    pub ledger_closed_at: Option<String>,
    #[serde(rename = "inSuccessfulContractCall")]
    pub in_successful_contract_call: Option<bool>,
    #[serde(rename = "pagingToken")]
    pub paging_token: Option<String>,
}

/// One page of `getEvents`.
#[derive(Debug)]
pub struct EventPage {
    pub events: Vec<RawEvent>,
    pub cursor: Option<String>,
    pub latest_ledger: Option<u64>,
}

// ─────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────

/// Fetch a page of events from the RPC.
///
/// * `start_ledger` : the ledger sequence to scan from (inclusive).
/// * `cursor`       : optional opaque pagination cursor from a previous response.
/// * `limit`        : maximum number of events to return.
pub async fn fetch_events(
    client: &Client,
    rpc_url: &str,
    contract_id: &str,
    start_ledger: u32,
    cursor: Option<&str>,
    limit: u32,
) -> Result<EventPage> {
    let mut backoff = INITIAL_BACKOFF_SECS;

    loop {
        let params = build_params(contract_id, start_ledger, cursor, limit);

        let response = client
            .post(rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "getEvents",
                "params": params,
            }))
            .send()
            .await;

        let resp = match response {
            Ok(resp) => resp,
            Err(e) => {
                warn!("RPC request failed (will retry in {backoff}s): {e}");
                backoff = sleep_backoff(backoff).await;
                continue;
            }
        };

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate-limited by RPC (will retry in {backoff}s)");
            backoff = sleep_backoff(backoff).await;
            continue;
        }

        let body: RpcResponse = resp.json().await?;

        if let Some(err) = body.error {
            // Invalid request / unknown method will not fix themselves.
            if err.code == -32600 || err.code == -32601 {
                return Err(IndexerError::EventParse(format!(
                    "RPC hard error {}: {}",
                    err.code, err.message
                )));
            }
            warn!(
                "RPC soft error (will retry in {backoff}s): {} {}",
                err.code, err.message
            );
            backoff = sleep_backoff(backoff).await;
            continue;
        }

        let result = body.result.ok_or_else(|| {
            IndexerError::EventParse("Empty result from getEvents".to_string())
        })?;

        debug!(
            "Fetched {} events (latest_ledger={:?})",
            result.events.len(),
            result.latest_ledger
        );

        return Ok(EventPage {
            events: result.events,
            cursor: result.cursor,
            latest_ledger: result.latest_ledger,
        });
    }
}

/// Sleep for `backoff` seconds and return the next, doubled delay.
async fn sleep_backoff(backoff: u64) -> u64 {
    tokio::time::sleep(Duration::from_secs(backoff)).await;
    (backoff * 2).min(MAX_BACKOFF_SECS)
}

fn build_params(contract_id: &str, start_ledger: u32, cursor: Option<&str>, limit: u32) -> Value {
    let mut params = json!({
        "filters": [
            {
                "type": "contract",
                "contractIds": [contract_id]
            }
        ],
        "pagination": {
            "limit": limit
        },
        "xdrFormat": "json"
    });

    if let Some(cur) = cursor {
        params["pagination"]["cursor"] = json!(cur);
    } else {
        params["startLedger"] = json!(start_ledger);
    }

    params
}

// ─────────────────────────────────────────────────────────
// Event decoding
// ─────────────────────────────────────────────────────────

/// Decode a list of raw RPC events into [`CampaignEvent`]s.
///
/// Events from failed contract calls are dropped.
pub fn decode_events(raw: &[RawEvent], contract_id: &str) -> Vec<CampaignEvent> {
    raw.iter()
        .filter(|e| e.in_successful_contract_call.unwrap_or(true))
        .filter_map(|e| decode_single(e, contract_id))
        .collect()
}

fn decode_single(raw: &RawEvent, contract_id: &str) -> Option<CampaignEvent> {
    let kind = EventKind::from_topic(&extract_symbol(raw.topic.first()?));

    let ledger = raw.ledger.and_then(|l| i64::try_from(l).ok()).unwrap_or(0);
    let timestamp = raw
        .ledger_closed_at
        .as_deref()
        .and_then(parse_iso_to_unix)
        .unwrap_or(0);

    let project_id = raw
        .topic
        .get(1)
        .and_then(extract_u64)
        .and_then(|id| i64::try_from(id).ok());

    let data = normalize(&raw.value);
    let mut event = CampaignEvent {
        event_id: raw
            .id
            .clone()
            .or_else(|| raw.paging_token.clone())
            .unwrap_or_else(|| {
                format!(
                    "{ledger}-{}-{}-{}",
                    raw.tx_hash.as_deref().unwrap_or("-"),
                    kind.as_str(),
                    project_id.unwrap_or(-1)
                )
            }),
        kind,
        project_id,
        actor: None,
        amount: None,
        new_total: None,
        started: None,
        ledger,
        timestamp,
        contract_id: raw
            .contract_id
            .clone()
            .unwrap_or_else(|| contract_id.to_string()),
        tx_hash: raw.tx_hash.clone(),
    };

    match kind {
        EventKind::ProjectStarted => {
            event.actor = extract_field(&data, &["creator"]);
            event.amount = extract_field(&data, &["goal"]);
            event.started = Some(StartedDetails {
                title: extract_field(&data, &["title"]).unwrap_or_default(),
                description: extract_field(&data, &["description"]).unwrap_or_default(),
                image_link: extract_field(&data, &["image_link"]).unwrap_or_default(),
                deadline: extract_field(&data, &["deadline"])
                    .and_then(|d| d.parse().ok())
                    .unwrap_or(0),
                goal: event.amount.clone().unwrap_or_else(|| "0".to_string()),
            });
        }
        EventKind::ReceivedFunding => {
            event.actor = extract_field(&data, &["contributor"]);
            event.amount = extract_field(&data, &["amount"]);
            event.new_total = extract_field(&data, &["new_total"]);
        }
        EventKind::CreatorPaid => {
            event.actor = extract_field(&data, &["creator"]);
            event.amount = extract_field(&data, &["amount"]);
        }
        EventKind::ProjectExpired | EventKind::Unknown => {}
    }

    Some(event)
}

/// Turn XDR-JSON struct data (`{"map":[{"key":{"symbol":k},"val":v}]}`) into a
/// flat object of scalars. Anything else is returned unchanged.
fn normalize(value: &Value) -> Value {
    let Some(entries) = value.get("map").and_then(Value::as_array) else {
        return value.clone();
    };

    let mut flat = Map::new();
    for entry in entries {
        let key = entry.get("key").map(scalar);
        let val = entry.get("val").map(scalar);
        if let (Some(Value::String(k)), Some(v)) = (key, val) {
            flat.insert(k, v);
        }
    }
    Value::Object(flat)
}

/// Unwrap a single-key XDR-JSON scalar such as `{"i128":"5"}` to its payload.
fn scalar(value: &Value) -> Value {
    match value {
        Value::Object(map) if map.len() == 1 => map.values().next().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn extract_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// A topic given as a JSON-encoded string is parsed into its JSON value.
fn topic_value(topic: &Value) -> Value {
    match topic {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| topic.clone()),
        other => other.clone(),
    }
}

/// Extract a Soroban Symbol from a topic.
/// The RPC may return `{"type":"symbol","value":"started"}`, `{"symbol":"started"}`
/// or just the raw string.
fn extract_symbol(topic: &Value) -> String {
    let v = topic_value(topic);
    match v.get("value").or_else(|| v.get("symbol")).unwrap_or(&v) {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract the project id from a topic that might be tagged JSON, XDR-JSON or a bare number.
fn extract_u64(topic: &Value) -> Option<u64> {
    let v = topic_value(topic);
    match v.get("value").or_else(|| v.get("u64")).unwrap_or(&v) {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Parse an ISO-8601 timestamp string into a Unix epoch (seconds).
fn parse_iso_to_unix(s: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp())
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
