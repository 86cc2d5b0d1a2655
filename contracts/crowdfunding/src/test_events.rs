extern crate std;

use soroban_sdk::{
    symbol_short,
    testutils::{Address as _, Events, Ledger},
    token, vec, Address, Env, IntoVal, String, Symbol, TryIntoVal, Val, Vec,
};

use crate::events::{CreatorPaid, ProjectExpired, ProjectStarted, ReceivedFunding};
use crate::{Crowdfunding, CrowdfundingClient, ProjectDetails};

fn setup() -> (Env, CrowdfundingClient<'static>) {
    let env = Env::default();
    env.mock_all_auths();
    let contract_id = env.register(Crowdfunding, ());
    let client = CrowdfundingClient::new(&env, &contract_id);
    (env, client)
}

fn create_token<'a>(env: &Env, admin: &Address) -> (token::Client<'a>, token::StellarAssetClient<'a>) {
    let sac = env.register_stellar_asset_contract_v2(admin.clone());
    (
        token::Client::new(env, &sac.address()),
        token::StellarAssetClient::new(env, &sac.address()),
    )
}

fn start(env: &Env, client: &CrowdfundingClient, creator: &Address, token: &Address) -> ProjectDetails {
    client.start_project(
        creator,
        token,
        &String::from_str(env, "Solar Roof"),
        &String::from_str(env, "Panels for the library"),
        &String::from_str(env, "https://example.org/roof.jpg"),
        &5,
        &1_000_000,
    )
}

/// Events published by the crowdfunding contract under `(topic, project_id)`.
fn contract_events(
    env: &Env,
    client: &CrowdfundingClient,
    topic: Symbol,
    project_id: u64,
) -> std::vec::Vec<Val> {
    let expected_topics: Vec<Val> = vec![env, topic.into_val(env), project_id.into_val(env)];
    env.events()
        .all()
        .iter()
        .filter(|e| e.0 == client.address && e.1 == expected_topics)
        .map(|e| e.2)
        .collect()
}

#[test]
fn test_project_started_event() {
    let (env, client) = setup();
    let creator = Address::generate(&env);
    let (token, _) = create_token(&env, &Address::generate(&env));

    let project = start(&env, &client, &creator, &token.address);

    let events = contract_events(&env, &client, symbol_short!("started"), project.id);
    assert_eq!(events.len(), 1);

    let event_data: ProjectStarted = events[0].try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        ProjectStarted {
            project_id: project.id,
            creator,
            title: String::from_str(&env, "Solar Roof"),
            description: String::from_str(&env, "Panels for the library"),
            image_link: String::from_str(&env, "https://example.org/roof.jpg"),
            deadline: project.deadline,
            goal: 1_000_000,
        }
    );
}

#[test]
fn test_received_funding_event_carries_running_total() {
    let (env, client) = setup();
    let contributor = Address::generate(&env);
    let (token, sac) = create_token(&env, &Address::generate(&env));
    let project = start(&env, &client, &Address::generate(&env), &token.address);

    sac.mint(&contributor, &2_000_000);
    token.approve(&contributor, &client.address, &2_000_000, &(env.ledger().sequence() + 100));
    client.contribute(&project.id, &contributor, &2_000_000);

    let events = contract_events(&env, &client, symbol_short!("funded"), project.id);
    assert_eq!(events.len(), 1);

    let event_data: ReceivedFunding = events[0].try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        ReceivedFunding {
            project_id: project.id,
            contributor,
            amount: 2_000_000,
            new_total: 2_000_000,
        }
    );
}

#[test]
fn test_failed_contribution_emits_nothing() {
    let (env, client) = setup();
    let contributor = Address::generate(&env);
    let (token, sac) = create_token(&env, &Address::generate(&env));
    let project = start(&env, &client, &Address::generate(&env), &token.address);

    sac.mint(&contributor, &500);
    assert!(client.try_contribute(&project.id, &contributor, &500).is_err());

    let events = contract_events(&env, &client, symbol_short!("funded"), project.id);
    assert!(events.is_empty());
}

#[test]
fn test_creator_paid_event() {
    let (env, client) = setup();
    let creator = Address::generate(&env);
    let contributor = Address::generate(&env);
    let (token, sac) = create_token(&env, &Address::generate(&env));
    let project = start(&env, &client, &creator, &token.address);

    sac.mint(&contributor, &750);
    token.approve(&contributor, &client.address, &750, &(env.ledger().sequence() + 100));
    client.contribute(&project.id, &contributor, &750);
    client.payout(&project.id, &creator);

    let events = contract_events(&env, &client, symbol_short!("paid"), project.id);
    assert_eq!(events.len(), 1);

    let event_data: CreatorPaid = events[0].try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        CreatorPaid {
            project_id: project.id,
            creator,
            amount: 750,
        }
    );
}

#[test]
fn test_project_expired_event() {
    let (env, client) = setup();
    let (token, _) = create_token(&env, &Address::generate(&env));
    let project = start(&env, &client, &Address::generate(&env), &token.address);

    env.ledger().set_timestamp(project.deadline + 1);
    client.check_expiry(&project.id);

    let events = contract_events(&env, &client, symbol_short!("expired"), project.id);
    assert_eq!(events.len(), 1);

    let event_data: ProjectExpired = events[0].try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        ProjectExpired {
            project_id: project.id,
            deadline: project.deadline,
        }
    );
}
