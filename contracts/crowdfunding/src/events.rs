use soroban_sdk::{contracttype, symbol_short, Address, Env, String};

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectStarted {
    pub project_id: u64,
    pub creator: Address,
    pub title: String,
    pub description: String,
    pub image_link: String,
    pub deadline: u64,
    pub goal: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReceivedFunding {
    pub project_id: u64,
    pub contributor: Address,
    pub amount: i128,
    pub new_total: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreatorPaid {
    pub project_id: u64,
    pub creator: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProjectExpired {
    pub project_id: u64,
    pub deadline: u64,
}

pub fn emit_project_started(env: &Env, data: ProjectStarted) {
    let topics = (symbol_short!("started"), data.project_id);
    env.events().publish(topics, data);
}

pub fn emit_received_funding(
    env: &Env,
    project_id: u64,
    contributor: Address,
    amount: i128,
    new_total: i128,
) {
    let topics = (symbol_short!("funded"), project_id);
    let data = ReceivedFunding {
        project_id,
        contributor,
        amount,
        new_total,
    };
    env.events().publish(topics, data);
}

pub fn emit_creator_paid(env: &Env, project_id: u64, creator: Address, amount: i128) {
    let topics = (symbol_short!("paid"), project_id);
    let data = CreatorPaid {
        project_id,
        creator,
        amount,
    };
    env.events().publish(topics, data);
}

pub fn emit_project_expired(env: &Env, project_id: u64, deadline: u64) {
    let topics = (symbol_short!("expired"), project_id);
    let data = ProjectExpired {
        project_id,
        deadline,
    };
    env.events().publish(topics, data);
}
