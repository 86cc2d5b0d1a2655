//! # Types
//!
//! Shared data structures used across all modules of the crowdfunding contract.
//!
//! ## Design decisions
//!
//! ### Config / State split
//!
//! A project is internally stored as two separate ledger entries:
//!
//! - [`ProjectConfig`]: written once by `start_project`; never mutated.
//! - [`ProjectState`]: written on every contribution, expiry and payout.
//!
//! Per-contributor amounts are a third family of entries keyed by
//! `(project_id, contributor)`, so the state entry stays a fixed size no
//! matter how many people contribute.
//!
//! The public API exposes the reconstructed [`ProjectDetails`] snapshot.
//!
//! ### Status as a Finite-State Machine
//!
//! ```text
//! Fundraising ──► Expired ──► Successful
//!      └─────────────────────►┘
//! ```
//!
//! `Expired` is reached lazily through `check_expiry`. `Successful` is only
//! entered by a payout whose token transfer went through.

use soroban_sdk::{contracttype, Address, String};

/// Lifecycle status of a campaign.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProjectStatus {
    /// Accepting contributions.
    Fundraising,
    /// Deadline observed as passed; no more contributions.
    Expired,
    /// Raised balance paid out to the creator.
    Successful,
}

/// Immutable project configuration, written once at creation.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectConfig {
    pub id: u64,
    pub creator: Address,
    pub token: Address,
    pub title: String,
    pub description: String,
    pub image_link: String,
    pub goal: i128,
    pub deadline: u64,
}

/// Mutable project state, updated on contributions, expiry and payout.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectState {
    pub balance: i128,
    pub contributor_count: u32,
    pub status: ProjectStatus,
}

/// Read-only snapshot of a campaign returned by `get_project`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectDetails {
    /// Registry index (auto-incremented from 0).
    pub id: u64,
    /// Account entitled to the payout.
    pub creator: Address,
    /// Token contract the campaign accepts.
    pub token: Address,
    pub title: String,
    pub description: String,
    pub image_link: String,
    /// Target raise in the token's smallest unit.
    pub goal: i128,
    /// Ledger timestamp after which contributions stop.
    pub deadline: u64,
    /// Amount currently held in custody for this campaign.
    pub balance: i128,
    /// Number of distinct addresses that have contributed.
    pub contributor_count: u32,
    pub status: ProjectStatus,
}

impl ProjectDetails {
    pub(crate) fn from_parts(config: ProjectConfig, state: ProjectState) -> Self {
        ProjectDetails {
            id: config.id,
            creator: config.creator,
            token: config.token,
            title: config.title,
            description: config.description,
            image_link: config.image_link,
            goal: config.goal,
            deadline: config.deadline,
            balance: state.balance,
            contributor_count: state.contributor_count,
            status: state.status,
        }
    }
}
