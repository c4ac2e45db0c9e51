//! Mid-replay source evolution.

use std::sync::Arc;

use serde_json::{json, Value};

use weft::contract::LoadError;
use weft::test_harness::{fixtures, sim_client, SimLedger, TOKEN_V1, TOKEN_V2};
use weft::{Address, Error, ReplayOptions, TxId};

fn transfer(target: &Address, qty: u64) -> Value {
    json!({ "function": "transfer", "target": target.as_str(), "qty": qty })
}

fn evolve(src: &str) -> Value {
    json!({ "function": "evolve", "value": src })
}

struct EvolvingToken {
    ledger: Arc<SimLedger>,
    owner: Address,
    contract: TxId,
    evolved_src: TxId,
}

fn setup(init_extra: Value) -> EvolvingToken {
    let ledger = Arc::new(SimLedger::new());
    let owner = fixtures::address("alice");
    let src = ledger.put_source(&owner, TOKEN_V1);
    let evolved_src = ledger.put_source(&owner, TOKEN_V2);

    let mut init = json!({
        "balances": { owner.as_str(): 100 },
        "owner": owner.as_str(),
    });
    if let Some(extra) = init_extra.as_object() {
        for (key, value) in extra {
            init[key] = value.clone();
        }
    }
    let contract = ledger.put_contract(&owner, &src, &init);
    EvolvingToken {
        ledger,
        owner,
        contract,
        evolved_src,
    }
}

#[test]
fn evolution_applies_to_subsequent_records_only() {
    let t = setup(json!({}));
    let bob = fixtures::address("bob");

    // Under the original source: plain credit.
    t.ledger
        .add_interaction(&t.contract, &t.owner, 2, &transfer(&bob, 40));
    // The record that introduces the new source still runs under the old
    // one.
    t.ledger
        .add_interaction(&t.contract, &t.owner, 3, &evolve(t.evolved_src.as_str()));
    // From the next record on, the evolved source (double credit) rules.
    t.ledger
        .add_interaction(&t.contract, &t.owner, 4, &transfer(&bob, 10));

    let client = sim_client(t.ledger.clone());
    let output = client
        .replay(
            &t.contract,
            ReplayOptions {
                height: None,
                with_validity: true,
            },
        )
        .unwrap();

    assert_eq!(output.state["balances"][t.owner.as_str()], json!(50));
    assert_eq!(output.state["balances"][bob.as_str()], json!(60));
    assert_eq!(output.validity.unwrap().outcomes(), vec![true, true, true]);
}

#[test]
fn evolution_respects_the_permission_flag() {
    let t = setup(json!({ "settings": { "canEvolve": false } }));
    let bob = fixtures::address("bob");

    t.ledger
        .add_interaction(&t.contract, &t.owner, 2, &transfer(&bob, 40));
    t.ledger
        .add_interaction(&t.contract, &t.owner, 3, &evolve(t.evolved_src.as_str()));
    t.ledger
        .add_interaction(&t.contract, &t.owner, 4, &transfer(&bob, 10));

    let client = sim_client(t.ledger.clone());
    let state = client.read_state(&t.contract, None).unwrap();

    // Still single-credit: the handler was never rebound.
    assert_eq!(state["balances"][bob.as_str()], json!(50));
}

#[test]
fn non_owner_evolution_is_rejected_by_the_contract() {
    let t = setup(json!({}));
    let bob = fixtures::address("bob");
    let mallory = fixtures::address("mallory");

    t.ledger
        .add_interaction(&t.contract, &t.owner, 2, &transfer(&bob, 40));
    t.ledger
        .add_interaction(&t.contract, &mallory, 3, &evolve(t.evolved_src.as_str()));
    t.ledger
        .add_interaction(&t.contract, &t.owner, 4, &transfer(&bob, 10));

    let client = sim_client(t.ledger.clone());
    let output = client
        .replay(
            &t.contract,
            ReplayOptions {
                height: None,
                with_validity: true,
            },
        )
        .unwrap();

    assert_eq!(output.validity.unwrap().outcomes(), vec![true, false, true]);
    assert_eq!(output.state["balances"][bob.as_str()], json!(50));
}

#[test]
fn malformed_evolve_targets_are_ignored() {
    let t = setup(json!({}));
    let bob = fixtures::address("bob");

    t.ledger
        .add_interaction(&t.contract, &t.owner, 2, &evolve("not-a-source-id"));
    t.ledger
        .add_interaction(&t.contract, &t.owner, 3, &transfer(&bob, 10));

    let client = sim_client(t.ledger.clone());
    let state = client.read_state(&t.contract, None).unwrap();

    // The malformed target is carried in state but never rebinds.
    assert_eq!(state["evolve"], json!("not-a-source-id"));
    assert_eq!(state["balances"][bob.as_str()], json!(10));
}

#[test]
fn evolving_to_an_unknown_source_is_fatal() {
    let t = setup(json!({}));
    let ghost = fixtures::tx_id(123);

    t.ledger
        .add_interaction(&t.contract, &t.owner, 2, &evolve(ghost.as_str()));

    let client = sim_client(t.ledger.clone());
    match client.read_state(&t.contract, None) {
        Err(Error::Load(LoadError::SourceNotFound { src, .. })) => assert_eq!(src, ghost),
        other => panic!("unexpected: {:?}", other),
    }
}
