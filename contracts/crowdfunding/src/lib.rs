//! # Crowdfunding Contract
//!
//! A minimal crowdfunding ledger. A creator starts a campaign with a goal and
//! a deadline, contributors move tokens into the contract's custody, and the
//! creator withdraws the raised balance.
//!
//! | Phase        | Entry Point(s)                                   |
//! |--------------|--------------------------------------------------|
//! | Registry     | [`Crowdfunding::start_project`], `return_projects`, `project_count` |
//! | Funding      | [`Crowdfunding::contribute`]                     |
//! | Expiry       | [`Crowdfunding::check_expiry`]                   |
//! | Withdrawal   | [`Crowdfunding::payout`]                         |
//! | Queries      | `get_project`, `get_contribution`                |
//!
//! ## Architecture
//!
//! Every campaign lives inside this one contract: its handle is the `u64` ID
//! handed out by the registry counter, and its custody account is the
//! contract address, with the per-campaign share tracked in [`storage`].
//! Token movement goes through the SEP-41 token client of the campaign's
//! asset; time comes from the ledger timestamp.
//!
//! Expiry is lazy. Nothing runs on a timer: a campaign whose deadline has
//! passed stays `Fundraising` until someone calls `check_expiry` or
//! `contribute`.

#![no_std]

use soroban_sdk::{contract, contracterror, contractimpl, token, Address, Env, String, Vec};

pub mod events;
mod storage;
mod types;

#[cfg(test)]
mod test_events;
#[cfg(test)]
mod test_payout;

use storage::{get_and_increment_project_id, load_project_pair, save_project, save_project_state};
pub use types::{ProjectConfig, ProjectDetails, ProjectState, ProjectStatus};

/// Seconds in one campaign day.
pub const SECONDS_PER_DAY: u64 = 86_400;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    /// The campaign's status forbids the operation.
    InvalidState = 1,
    /// Only the creator may withdraw.
    NotAuthorized = 2,
    /// The token contract rejected the transfer.
    TransferFailed = 3,
    /// An amount, counter or deadline would exceed its range.
    Overflow = 4,
    ProjectNotFound = 5,
    /// Negative goal or contribution.
    InvalidAmount = 6,
}

#[contract]
pub struct Crowdfunding;

#[contractimpl]
impl Crowdfunding {
    // ─────────────────────────────────────────────────────────
    // Registry
    // ─────────────────────────────────────────────────────────

    /// Start a new campaign.
    ///
    /// - `creator` must authorize the call and is the only address allowed to
    ///   withdraw later.
    /// - `token` is the asset the campaign accepts.
    /// - `duration_in_days` is converted to an absolute deadline from the
    ///   current ledger timestamp.
    /// - `amount_to_raise` must be `>= 0`. A zero goal is accepted.
    ///
    /// Returns the stored campaign with its freshly assigned `id`.
    pub fn start_project(
        env: Env,
        creator: Address,
        token: Address,
        title: String,
        description: String,
        image_link: String,
        duration_in_days: u64,
        amount_to_raise: i128,
    ) -> Result<ProjectDetails, Error> {
        creator.require_auth();

        if amount_to_raise < 0 {
            return Err(Error::InvalidAmount);
        }

        let deadline = duration_in_days
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|secs| env.ledger().timestamp().checked_add(secs))
            .ok_or(Error::Overflow)?;

        let id = get_and_increment_project_id(&env)?;

        let config = ProjectConfig {
            id,
            creator,
            token,
            title,
            description,
            image_link,
            goal: amount_to_raise,
            deadline,
        };
        let state = ProjectState {
            balance: 0,
            contributor_count: 0,
            status: ProjectStatus::Fundraising,
        };
        save_project(&env, &config, &state);

        events::emit_project_started(
            &env,
            events::ProjectStarted {
                project_id: id,
                creator: config.creator.clone(),
                title: config.title.clone(),
                description: config.description.clone(),
                image_link: config.image_link.clone(),
                deadline,
                goal: amount_to_raise,
            },
        );

        Ok(ProjectDetails::from_parts(config, state))
    }

    /// Every campaign ID ever started, oldest first.
    pub fn return_projects(env: Env) -> Vec<u64> {
        let mut ids = Vec::new(&env);
        for id in 0..storage::project_count(&env) {
            ids.push_back(id);
        }
        ids
    }

    /// Number of campaigns ever started.
    pub fn project_count(env: Env) -> u64 {
        storage::project_count(&env)
    }

    // ─────────────────────────────────────────────────────────
    // Campaign
    // ─────────────────────────────────────────────────────────

    /// Contribute `amount` of the campaign's token.
    ///
    /// The contributor must have approved this contract as spender for at
    /// least `amount` beforehand; the funds are pulled with `transfer_from`.
    /// A zero amount is accepted and recorded without touching the token.
    ///
    /// Expiry is evaluated after the ledger is updated, so a contribution
    /// that arrives after the deadline but before anyone observed it is still
    /// accepted, and flips the campaign to `Expired`.
    ///
    /// Returns the campaign's new running total.
    pub fn contribute(
        env: Env,
        project_id: u64,
        contributor: Address,
        amount: i128,
    ) -> Result<i128, Error> {
        contributor.require_auth();

        if amount < 0 {
            return Err(Error::InvalidAmount);
        }

        let (config, mut state) = load_project_pair(&env, project_id)?;

        if state.status != ProjectStatus::Fundraising {
            return Err(Error::InvalidState);
        }

        // All arithmetic is settled before any funds move.
        let is_new = !storage::has_contribution(&env, project_id, &contributor);
        let contributed = storage::get_contribution(&env, project_id, &contributor)
            .checked_add(amount)
            .ok_or(Error::Overflow)?;
        let new_total = state.balance.checked_add(amount).ok_or(Error::Overflow)?;
        let contributor_count = if is_new {
            state
                .contributor_count
                .checked_add(1)
                .ok_or(Error::Overflow)?
        } else {
            state.contributor_count
        };

        if amount > 0 {
            let custody = env.current_contract_address();
            let token_client = token::Client::new(&env, &config.token);
            match token_client.try_transfer_from(&custody, &contributor, &custody, &amount) {
                Ok(Ok(())) => {}
                _ => return Err(Error::TransferFailed),
            }
        }

        storage::set_contribution(&env, project_id, &contributor, contributed);
        state.balance = new_total;
        state.contributor_count = contributor_count;

        events::emit_received_funding(&env, project_id, contributor, amount, new_total);

        refresh_expiry(&env, &config, &mut state);
        save_project_state(&env, project_id, &state);

        Ok(new_total)
    }

    /// Move a campaign to `Expired` if its deadline has passed.
    ///
    /// Anyone may call this. Returns the (possibly updated) status.
    pub fn check_expiry(env: Env, project_id: u64) -> Result<ProjectStatus, Error> {
        let (config, mut state) = load_project_pair(&env, project_id)?;
        if refresh_expiry(&env, &config, &mut state) {
            save_project_state(&env, project_id, &state);
        }
        Ok(state.status)
    }

    /// Pay the whole custodied balance out to the creator.
    ///
    /// - `caller` must authorize the call and be the campaign's creator.
    /// - The balance is zeroed and persisted before the token transfer; a
    ///   failed transfer restores it and leaves the status untouched.
    /// - On success the campaign becomes `Successful`. Calling again pays out
    ///   0 without a token call.
    ///
    /// Returns the amount paid out.
    pub fn payout(env: Env, project_id: u64, caller: Address) -> Result<i128, Error> {
        caller.require_auth();

        let (config, mut state) = load_project_pair(&env, project_id)?;
        if caller != config.creator {
            return Err(Error::NotAuthorized);
        }

        let total_raised = state.balance;
        state.balance = 0;
        save_project_state(&env, project_id, &state);

        let token_client = token::Client::new(&env, &config.token);
        let transferred = total_raised == 0
            || matches!(
                token_client.try_transfer(
                    &env.current_contract_address(),
                    &config.creator,
                    &total_raised
                ),
                Ok(Ok(()))
            );

        if !transferred {
            state.balance = total_raised;
            save_project_state(&env, project_id, &state);
            return Err(Error::TransferFailed);
        }

        state.status = ProjectStatus::Successful;
        save_project_state(&env, project_id, &state);

        events::emit_creator_paid(&env, project_id, config.creator, total_raised);

        Ok(total_raised)
    }

    // ─────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────

    /// Snapshot of a campaign. Does not refresh expiry.
    pub fn get_project(env: Env, project_id: u64) -> Result<ProjectDetails, Error> {
        let (config, state) = load_project_pair(&env, project_id)?;
        Ok(ProjectDetails::from_parts(config, state))
    }

    /// Cumulative amount `contributor` has put into the campaign.
    pub fn get_contribution(env: Env, project_id: u64, contributor: Address) -> i128 {
        storage::get_contribution(&env, project_id, &contributor)
    }
}

/// Flip `state` to `Expired` when the deadline has passed during fundraising.
/// Returns `true` if the status changed; the caller persists `state`.
fn refresh_expiry(env: &Env, config: &ProjectConfig, state: &mut ProjectState) -> bool {
    if state.status != ProjectStatus::Fundraising || env.ledger().timestamp() <= config.deadline {
        return false;
    }
    state.status = ProjectStatus::Expired;
    events::emit_project_expired(env, config.id, config.deadline);
    true
}
