extern crate std;

use soroban_sdk::{
    contract, contractimpl, contracttype,
    testutils::{Address as _, Ledger},
    token, Address, Env, String,
};

use crate::invariants::{assert_all_project_invariants, assert_valid_status_transition};
use crate::{Crowdfunding, CrowdfundingClient, Error, ProjectDetails, ProjectStatus};

// ─── Token stand-in whose transfers can be switched off ──

#[contracttype]
#[derive(Clone)]
enum FlakyKey {
    Failing,
    Balance(Address),
}

#[contract]
pub struct FlakyToken;

#[contractimpl]
impl FlakyToken {
    pub fn mint(env: Env, to: Address, amount: i128) {
        let balance = Self::balance(env.clone(), to.clone());
        env.storage()
            .instance()
            .set(&FlakyKey::Balance(to), &(balance + amount));
    }

    pub fn set_failing(env: Env, failing: bool) {
        env.storage().instance().set(&FlakyKey::Failing, &failing);
    }

    pub fn balance(env: Env, id: Address) -> i128 {
        env.storage()
            .instance()
            .get(&FlakyKey::Balance(id))
            .unwrap_or(0)
    }

    pub fn transfer(env: Env, from: Address, to: Address, amount: i128) {
        let failing: bool = env
            .storage()
            .instance()
            .get(&FlakyKey::Failing)
            .unwrap_or(false);
        if failing {
            panic!("transfers disabled");
        }
        let from_balance = Self::balance(env.clone(), from.clone());
        if from_balance < amount {
            panic!("insufficient balance");
        }
        env.storage()
            .instance()
            .set(&FlakyKey::Balance(from), &(from_balance - amount));
        Self::mint(env, to, amount);
    }

    pub fn transfer_from(env: Env, _spender: Address, from: Address, to: Address, amount: i128) {
        Self::transfer(env, from, to, amount);
    }
}

// ─── Helpers ─────────────────────────────────────────────

fn setup() -> (Env, CrowdfundingClient<'static>) {
    let env = Env::default();
    env.mock_all_auths();
    let contract_id = env.register(Crowdfunding, ());
    let client = CrowdfundingClient::new(&env, &contract_id);
    (env, client)
}

fn create_token<'a>(env: &Env) -> (token::Client<'a>, token::StellarAssetClient<'a>) {
    let sac = env.register_stellar_asset_contract_v2(Address::generate(env));
    (
        token::Client::new(env, &sac.address()),
        token::StellarAssetClient::new(env, &sac.address()),
    )
}

fn start(env: &Env, client: &CrowdfundingClient, creator: &Address, token: &Address) -> ProjectDetails {
    client.start_project(
        creator,
        token,
        &String::from_str(env, "Food Bank Van"),
        &String::from_str(env, "A refrigerated van for deliveries"),
        &String::from_str(env, "ipfs://van"),
        &5,
        &1_000_000,
    )
}

fn contribute(
    env: &Env,
    client: &CrowdfundingClient,
    token: &token::Client,
    sac: &token::StellarAssetClient,
    project_id: u64,
    contributor: &Address,
    amount: i128,
) {
    sac.mint(contributor, &amount);
    token.approve(contributor, &client.address, &amount, &(env.ledger().sequence() + 100));
    client.contribute(&project_id, contributor, &amount);
}

// ─── Tests ───────────────────────────────────────────────

#[test]
fn test_payout_transfers_balance_to_creator() {
    let (env, client) = setup();
    let creator = Address::generate(&env);
    let contributor = Address::generate(&env);
    let (token, sac) = create_token(&env);
    let project = start(&env, &client, &creator, &token.address);
    contribute(&env, &client, &token, &sac, project.id, &contributor, 2_000_000);

    let paid = client.payout(&project.id, &creator);

    assert_eq!(paid, 2_000_000);
    assert_eq!(token.balance(&creator), 2_000_000);
    assert_eq!(token.balance(&client.address), 0);

    let updated = client.get_project(&project.id);
    assert_eq!(updated.balance, 0);
    assert_eq!(updated.status, ProjectStatus::Successful);
    assert_valid_status_transition(&project.status, &updated.status);
    assert_all_project_invariants(&updated);

    // The contribution ledger is history and is never drawn down.
    assert_eq!(client.get_contribution(&project.id, &contributor), 2_000_000);
}

#[test]
fn test_payout_by_non_creator_rejected() {
    let (env, client) = setup();
    let creator = Address::generate(&env);
    let contributor = Address::generate(&env);
    let (token, sac) = create_token(&env);
    let project = start(&env, &client, &creator, &token.address);
    contribute(&env, &client, &token, &sac, project.id, &contributor, 2_000_000);
    let before = client.get_project(&project.id);

    let result = client.try_payout(&project.id, &contributor);

    assert_eq!(result, Err(Ok(Error::NotAuthorized)));
    assert_eq!(client.get_project(&project.id), before);
    assert_eq!(client.get_contribution(&project.id, &contributor), 2_000_000);
    assert_eq!(token.balance(&client.address), 2_000_000);
    assert_eq!(token.balance(&contributor), 0);
}

#[test]
fn test_double_payout_moves_nothing_the_second_time() {
    let (env, client) = setup();
    let creator = Address::generate(&env);
    let (token, sac) = create_token(&env);
    let project = start(&env, &client, &creator, &token.address);
    contribute(&env, &client, &token, &sac, project.id, &Address::generate(&env), 500);

    assert_eq!(client.payout(&project.id, &creator), 500);
    assert_eq!(client.payout(&project.id, &creator), 0);

    let updated = client.get_project(&project.id);
    assert_eq!(updated.balance, 0);
    assert_eq!(updated.status, ProjectStatus::Successful);
    assert_eq!(token.balance(&creator), 500);
}

#[test]
fn test_payout_never_touches_other_campaigns() {
    let (env, client) = setup();
    let creator = Address::generate(&env);
    let other_creator = Address::generate(&env);
    let (token, sac) = create_token(&env);
    let mine = start(&env, &client, &creator, &token.address);
    let theirs = start(&env, &client, &other_creator, &token.address);
    contribute(&env, &client, &token, &sac, mine.id, &Address::generate(&env), 300);
    contribute(&env, &client, &token, &sac, theirs.id, &Address::generate(&env), 900);

    assert_eq!(client.payout(&mine.id, &creator), 300);

    assert_eq!(token.balance(&creator), 300);
    assert_eq!(token.balance(&client.address), 900);
    assert_eq!(client.get_project(&theirs.id).balance, 900);
    assert_eq!(client.get_project(&theirs.id).status, ProjectStatus::Fundraising);
}

#[test]
fn test_payout_after_expiry() {
    let (env, client) = setup();
    let creator = Address::generate(&env);
    let (token, sac) = create_token(&env);
    let project = start(&env, &client, &creator, &token.address);
    contribute(&env, &client, &token, &sac, project.id, &Address::generate(&env), 1_200);

    env.ledger().set_timestamp(project.deadline + 1);
    assert_eq!(client.check_expiry(&project.id), ProjectStatus::Expired);

    assert_eq!(client.payout(&project.id, &creator), 1_200);
    let updated = client.get_project(&project.id);
    assert_eq!(updated.status, ProjectStatus::Successful);
    assert_valid_status_transition(&ProjectStatus::Expired, &updated.status);
    assert_eq!(token.balance(&creator), 1_200);
}

#[test]
fn test_payout_of_unknown_project() {
    let (env, client) = setup();
    let result = client.try_payout(&9, &Address::generate(&env));
    assert_eq!(result, Err(Ok(Error::ProjectNotFound)));
}

#[test]
fn test_failed_payout_restores_balance_and_keeps_status() {
    let (env, client) = setup();
    let creator = Address::generate(&env);
    let contributor = Address::generate(&env);
    let flaky_id = env.register(FlakyToken, ());
    let flaky = FlakyTokenClient::new(&env, &flaky_id);
    let project = start(&env, &client, &creator, &flaky_id);

    flaky.mint(&contributor, &800);
    client.contribute(&project.id, &contributor, &800);
    flaky.set_failing(&true);

    let result = client.try_payout(&project.id, &creator);

    assert_eq!(result, Err(Ok(Error::TransferFailed)));
    let updated = client.get_project(&project.id);
    assert_eq!(updated.balance, 800);
    assert_eq!(updated.status, ProjectStatus::Fundraising);
    assert_eq!(flaky.balance(&client.address), 800);
    assert_eq!(flaky.balance(&creator), 0);

    // Once the token recovers the payout goes through.
    flaky.set_failing(&false);
    assert_eq!(client.payout(&project.id, &creator), 800);
    assert_eq!(flaky.balance(&creator), 800);
    assert_eq!(client.get_project(&project.id).status, ProjectStatus::Successful);
}

#[test]
fn test_failed_contribution_transfer_leaves_ledger_untouched() {
    let (env, client) = setup();
    let contributor = Address::generate(&env);
    let flaky_id = env.register(FlakyToken, ());
    let flaky = FlakyTokenClient::new(&env, &flaky_id);
    let project = start(&env, &client, &Address::generate(&env), &flaky_id);

    flaky.mint(&contributor, &800);
    flaky.set_failing(&true);

    let result = client.try_contribute(&project.id, &contributor, &800);

    assert_eq!(result, Err(Ok(Error::TransferFailed)));
    assert_eq!(client.get_project(&project.id).balance, 0);
    assert_eq!(client.get_contribution(&project.id, &contributor), 0);
    assert_eq!(flaky.balance(&contributor), 800);
}

#[test]
fn test_contribution_overflowing_the_balance_is_rejected() {
    let (env, client) = setup();
    let whale = Address::generate(&env);
    let latecomer = Address::generate(&env);
    let flaky_id = env.register(FlakyToken, ());
    let flaky = FlakyTokenClient::new(&env, &flaky_id);
    let project = start(&env, &client, &Address::generate(&env), &flaky_id);

    flaky.mint(&whale, &i128::MAX);
    flaky.mint(&latecomer, &1);
    assert_eq!(client.contribute(&project.id, &whale, &i128::MAX), i128::MAX);

    let result = client.try_contribute(&project.id, &latecomer, &1);

    assert_eq!(result, Err(Ok(Error::Overflow)));
    let updated = client.get_project(&project.id);
    assert_eq!(updated.balance, i128::MAX);
    assert_eq!(updated.contributor_count, 1);
    assert_eq!(client.get_contribution(&project.id, &latecomer), 0);
    assert_eq!(flaky.balance(&latecomer), 1);
    assert_eq!(flaky.balance(&client.address), i128::MAX);
}

#[test]
fn test_contributor_total_overflow_is_rejected() {
    let (env, client) = setup();
    let whale = Address::generate(&env);
    let flaky_id = env.register(FlakyToken, ());
    let flaky = FlakyTokenClient::new(&env, &flaky_id);
    let project = start(&env, &client, &Address::generate(&env), &flaky_id);

    flaky.mint(&whale, &i128::MAX);
    client.contribute(&project.id, &whale, &i128::MAX);

    let result = client.try_contribute(&project.id, &whale, &1);

    assert_eq!(result, Err(Ok(Error::Overflow)));
    assert_eq!(client.get_contribution(&project.id, &whale), i128::MAX);
    assert_eq!(client.get_project(&project.id).balance, i128::MAX);
}
