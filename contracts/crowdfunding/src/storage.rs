//! # Storage
//!
//! Provides typed helpers over Soroban's two storage tiers used by the
//! crowdfunding contract:
//!
//! ## Instance storage (contract-lifetime TTL)
//!
//! | Key              | Type  | Description                                   |
//! |------------------|-------|-----------------------------------------------|
//! | `ProjectCount`   | `u64` | Registry length; IDs `0..count` in order      |
//!
//! Instance TTL is bumped by **7 days** whenever it falls below 1 day remaining.
//!
//! ## Persistent storage (per-entry TTL)
//!
//! | Key                          | Type            | Description                     |
//! |------------------------------|-----------------|---------------------------------|
//! | `ProjConfig(id)`             | `ProjectConfig` | Immutable campaign parameters   |
//! | `ProjState(id)`              | `ProjectState`  | Balance, contributor count, status |
//! | `Contribution(id, address)`  | `i128`          | Cumulative amount per contributor |
//!
//! Persistent TTL is bumped by **30 days** whenever it falls below 7 days remaining.

use soroban_sdk::{contracttype, Address, Env};

use crate::types::{ProjectConfig, ProjectState};
use crate::Error;

// ── TTL Constants ────────────────────────────────────────────────────

/// Approximate ledgers per day (~5 seconds per ledger).
const DAY_IN_LEDGERS: u32 = 17_280;

/// Instance storage: bump by 7 days when below 1 day remaining.
const INSTANCE_BUMP_AMOUNT: u32 = 7 * DAY_IN_LEDGERS;
const INSTANCE_LIFETIME_THRESHOLD: u32 = DAY_IN_LEDGERS;

/// Persistent storage: bump by 30 days when below 7 days remaining.
const PERSISTENT_BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
const PERSISTENT_LIFETIME_THRESHOLD: u32 = 7 * DAY_IN_LEDGERS;

// ── Storage Keys ─────────────────────────────────────────────────────

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    /// Number of projects ever started (Instance).
    ProjectCount,
    /// Immutable project configuration keyed by ID (Persistent).
    ProjConfig(u64),
    /// Mutable project state keyed by ID (Persistent).
    ProjState(u64),
    /// Cumulative contribution of an address to a project (Persistent).
    Contribution(u64, Address),
}

// ── Instance Storage Helpers ─────────────────────────────────────────

fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

/// Number of projects in the registry.
pub fn project_count(env: &Env) -> u64 {
    bump_instance(env);
    env.storage()
        .instance()
        .get(&DataKey::ProjectCount)
        .unwrap_or(0)
}

/// Reads, increments, and stores the project counter.
/// Returns the ID to use for the *current* project (pre-increment value).
pub fn get_and_increment_project_id(env: &Env) -> Result<u64, Error> {
    let current = project_count(env);
    let next = current.checked_add(1).ok_or(Error::Overflow)?;
    env.storage().instance().set(&DataKey::ProjectCount, &next);
    Ok(current)
}

// ── Persistent Storage Helpers ───────────────────────────────────────

fn bump_persistent(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
}

/// Save both the immutable config and initial mutable state for a new project.
pub fn save_project(env: &Env, config: &ProjectConfig, state: &ProjectState) {
    let config_key = DataKey::ProjConfig(config.id);
    let state_key = DataKey::ProjState(config.id);

    env.storage().persistent().set(&config_key, config);
    env.storage().persistent().set(&state_key, state);
    bump_persistent(env, &config_key);
    bump_persistent(env, &state_key);
}

/// Load only the immutable project configuration.
pub fn load_project_config(env: &Env, id: u64) -> Result<ProjectConfig, Error> {
    let key = DataKey::ProjConfig(id);
    let config: ProjectConfig = env
        .storage()
        .persistent()
        .get(&key)
        .ok_or(Error::ProjectNotFound)?;
    bump_persistent(env, &key);
    Ok(config)
}

/// Load only the mutable project state.
pub fn load_project_state(env: &Env, id: u64) -> Result<ProjectState, Error> {
    let key = DataKey::ProjState(id);
    let state: ProjectState = env
        .storage()
        .persistent()
        .get(&key)
        .ok_or(Error::ProjectNotFound)?;
    bump_persistent(env, &key);
    Ok(state)
}

/// Load config and state together.
pub fn load_project_pair(env: &Env, id: u64) -> Result<(ProjectConfig, ProjectState), Error> {
    let config = load_project_config(env, id)?;
    let state = load_project_state(env, id)?;
    Ok((config, state))
}

/// Save only the mutable project state.
pub fn save_project_state(env: &Env, id: u64, state: &ProjectState) {
    let key = DataKey::ProjState(id);
    env.storage().persistent().set(&key, state);
    bump_persistent(env, &key);
}

/// Cumulative amount `contributor` has put into project `id`; 0 if none.
pub fn get_contribution(env: &Env, id: u64, contributor: &Address) -> i128 {
    let key = DataKey::Contribution(id, contributor.clone());
    match env.storage().persistent().get::<_, i128>(&key) {
        Some(amount) => {
            bump_persistent(env, &key);
            amount
        }
        None => 0,
    }
}

pub fn set_contribution(env: &Env, id: u64, contributor: &Address, amount: i128) {
    let key = DataKey::Contribution(id, contributor.clone());
    env.storage().persistent().set(&key, &amount);
    bump_persistent(env, &key);
}

/// `true` if `contributor` already has a ledger entry for project `id`.
pub fn has_contribution(env: &Env, id: u64, contributor: &Address) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::Contribution(id, contributor.clone()))
}
