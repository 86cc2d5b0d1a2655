//! Event types emitted by the crowdfunding contract, as seen by the indexer.
//!
//! These mirror the Soroban contract events defined in
//! `contracts/crowdfunding/src/events.rs`. Every event is published under the
//! topics `(symbol, project_id)`.

use serde::{Deserialize, Serialize};

/// All recognised event kinds from the crowdfunding contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new campaign was started (`started` topic).
    ProjectStarted,
    /// A contribution was received (`funded` topic).
    ReceivedFunding,
    /// The creator withdrew the raised balance (`paid` topic).
    CreatorPaid,
    /// A campaign was observed past its deadline (`expired` topic).
    ProjectExpired,
    /// An event from this contract that we don't recognise yet.
    Unknown,
}

impl EventKind {
    /// Parse the leading topic symbol string produced by Soroban into an [`EventKind`].
    pub fn from_topic(topic: &str) -> Self {
        match topic {
            "started" => Self::ProjectStarted,
            "funded" => Self::ReceivedFunding,
            "paid" => Self::CreatorPaid,
            "expired" => Self::ProjectExpired,
            _ => Self::Unknown,
        }
    }

    /// Short identifier stored in the `event_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectStarted => "project_started",
            Self::ReceivedFunding => "received_funding",
            Self::CreatorPaid => "creator_paid",
            Self::ProjectExpired => "project_expired",
            Self::Unknown => "unknown",
        }
    }
}

/// Campaign metadata carried only by `started` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedDetails {
    pub title: String,
    pub description: String,
    pub image_link: String,
    pub deadline: i64,
    pub goal: String,
}

/// A decoded contract event, ready to be stored in the database.
///
/// Amounts stay decimal strings: the contract uses `i128`, which SQLite
/// cannot hold natively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignEvent {
    /// Unique RPC event id; used to make ingestion idempotent.
    pub event_id: String,
    pub kind: EventKind,
    pub project_id: Option<i64>,
    /// Creator for `started` / `paid`, contributor for `funded`.
    pub actor: Option<String>,
    pub amount: Option<String>,
    /// Running total after a `funded` event.
    pub new_total: Option<String>,
    pub started: Option<StartedDetails>,
    pub ledger: i64,
    pub timestamp: i64,
    pub contract_id: String,
    pub tx_hash: Option<String>,
}

/// A raw event record as stored in / read from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    pub id: i64,
    pub event_id: String,
    pub event_type: String,
    pub project_id: Option<String>,
    pub actor: Option<String>,
    pub amount: Option<String>,
    pub new_total: Option<String>,
    pub ledger: i64,
    pub timestamp: i64,
    pub contract_id: String,
    pub tx_hash: Option<String>,
    pub created_at: i64,
}

/// Indexed view of one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectRecord {
    pub project_id: i64,
    pub creator: String,
    pub title: String,
    pub description: String,
    pub image_link: String,
    pub goal: String,
    pub deadline: i64,
    pub balance: String,
    pub paid_out: String,
    pub status: String,
    pub started_ledger: i64,
}

/// Cumulative amount one address has contributed to a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContributionRecord {
    pub project_id: i64,
    pub contributor: String,
    pub amount: String,
}
