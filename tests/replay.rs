//! End-to-end replay scenarios against the in-memory ledger.

use std::sync::Arc;

use serde_json::{json, Value};

use weft::contract::LoadError;
use weft::core::{protocol, ReplayState, SortKey, Tag};
use weft::test_harness::{
    fixtures, sim_client, sim_client_with, SimLedger, ALWAYS_REJECT, EMPTY_OUTCOME, TOKEN_V1,
};
use weft::{Address, Config, Error, ExecutionResult, ReplayOptions, TxId};

fn balances(entries: &[(&Address, u64)]) -> Value {
    let mut map = serde_json::Map::new();
    for (address, amount) in entries {
        map.insert(address.as_str().to_string(), json!(amount));
    }
    json!({ "balances": map })
}

fn transfer(target: &Address, qty: u64) -> Value {
    json!({ "function": "transfer", "target": target.as_str(), "qty": qty })
}

fn token_contract(ledger: &SimLedger, owner: &Address, funds: u64) -> TxId {
    let src = ledger.put_source(owner, TOKEN_V1);
    ledger.put_contract(owner, &src, &balances(&[(owner, funds)]))
}

fn canonical(value: &Value) -> Vec<u8> {
    ReplayState::new(value.clone()).canonical_bytes()
}

#[test]
fn transfer_scenario_yields_expected_state_and_validity() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let bob = fixtures::address("bob");
    let contract = token_contract(&ledger, &alice, 100);

    ledger.add_interaction(&contract, &alice, 2, &transfer(&bob, 40));
    ledger.add_interaction(&contract, &alice, 3, &transfer(&bob, 1000));

    let client = sim_client(ledger);
    let output = client
        .replay(
            &contract,
            ReplayOptions {
                height: None,
                with_validity: true,
            },
        )
        .unwrap();

    assert_eq!(output.state, balances(&[(&alice, 60), (&bob, 40)]));
    assert_eq!(output.validity.unwrap().outcomes(), vec![true, false]);
}

#[test]
fn malformed_inputs_are_skipped_without_state_effect() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let bob = fixtures::address("bob");
    let contract = token_contract(&ledger, &alice, 100);

    let valid = ledger.add_interaction(&contract, &alice, 2, &transfer(&bob, 10));

    // No Input tag at all.
    ledger.add_interaction_with_tags(
        &alice,
        3,
        vec![
            Tag::new(protocol::TAG_APP_NAME, protocol::APP_ACTION),
            Tag::new(protocol::TAG_CONTRACT, contract.as_str()),
        ],
    );
    // Duplicated Input tags.
    ledger.add_interaction_with_tags(
        &alice,
        4,
        vec![
            Tag::new(protocol::TAG_APP_NAME, protocol::APP_ACTION),
            Tag::new(protocol::TAG_CONTRACT, contract.as_str()),
            Tag::new(protocol::TAG_INPUT, "{}"),
            Tag::new(protocol::TAG_INPUT, "{}"),
        ],
    );
    // Unparsable Input payload.
    ledger.add_interaction_with_tags(
        &alice,
        5,
        vec![
            Tag::new(protocol::TAG_APP_NAME, protocol::APP_ACTION),
            Tag::new(protocol::TAG_CONTRACT, contract.as_str()),
            Tag::new(protocol::TAG_INPUT, "not json"),
        ],
    );

    let client = sim_client(ledger);
    let output = client
        .replay(
            &contract,
            ReplayOptions {
                height: None,
                with_validity: true,
            },
        )
        .unwrap();

    assert_eq!(output.state, balances(&[(&alice, 90), (&bob, 10)]));
    // Skipped records are absent from the validity map entirely.
    let validity = output.validity.unwrap();
    assert_eq!(validity.len(), 1);
    assert_eq!(validity.get(&valid), Some(true));
}

#[test]
fn rejected_interactions_roll_back_and_replay_continues() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let src = ledger.put_source(&alice, ALWAYS_REJECT);
    let init = json!({ "untouched": true });
    let contract = ledger.put_contract(&alice, &src, &init);

    ledger.add_interaction(&contract, &alice, 2, &json!({ "anything": 1 }));
    ledger.add_interaction(&contract, &alice, 3, &json!({ "anything": 2 }));

    let client = sim_client(ledger);
    let output = client
        .replay(
            &contract,
            ReplayOptions {
                height: None,
                with_validity: true,
            },
        )
        .unwrap();

    assert_eq!(output.state, init);
    assert_eq!(output.validity.unwrap().outcomes(), vec![false, false]);
}

#[test]
fn faulting_transitions_roll_back_too() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let src = ledger.put_source(&alice, EMPTY_OUTCOME);
    let init = json!({ "n": 0 });
    let contract = ledger.put_contract(&alice, &src, &init);

    ledger.add_interaction(&contract, &alice, 2, &json!({}));

    let client = sim_client(ledger);
    let output = client
        .replay(
            &contract,
            ReplayOptions {
                height: None,
                with_validity: true,
            },
        )
        .unwrap();

    assert_eq!(output.state, init);
    assert_eq!(output.validity.unwrap().outcomes(), vec![false]);
}

#[test]
fn records_fold_in_block_order_not_arrival_order() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let bob = fixtures::address("bob");
    let contract = token_contract(&ledger, &alice, 25);

    // Confirmed out of order: the height-5 record lands in the ledger
    // before the height-3 one.
    let late = ledger.add_interaction(&contract, &alice, 5, &transfer(&bob, 10));
    let early = ledger.add_interaction(&contract, &alice, 3, &transfer(&bob, 20));

    let client = sim_client(ledger);
    let output = client
        .replay(
            &contract,
            ReplayOptions {
                height: None,
                with_validity: true,
            },
        )
        .unwrap();

    // Height 3 spends 20 of 25; the height-5 transfer then lacks funds.
    assert_eq!(output.state, balances(&[(&alice, 5), (&bob, 20)]));
    let validity = output.validity.unwrap();
    let order: Vec<&TxId> = validity.iter().map(|(id, _)| id).collect();
    assert_eq!(order, vec![&early, &late]);
    assert_eq!(validity.outcomes(), vec![true, false]);
}

#[test]
fn same_block_ties_break_by_sort_key_hash() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let bob = fixtures::address("bob");
    let contract = token_contract(&ledger, &alice, 100);

    let first_inserted = ledger.add_interaction(&contract, &alice, 4, &transfer(&bob, 1));
    let second_inserted = ledger.add_interaction(&contract, &alice, 4, &transfer(&bob, 2));

    let block = fixtures::block_id(4);
    let mut expected = vec![first_inserted.clone(), second_inserted.clone()];
    expected.sort_by_key(|id| SortKey::of(4, &block, id));

    let replay_order = |ledger: Arc<SimLedger>| {
        let client = sim_client(ledger);
        let output = client
            .replay(
                &contract,
                ReplayOptions {
                    height: None,
                    with_validity: true,
                },
            )
            .unwrap();
        output
            .validity
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>()
    };

    let order = replay_order(ledger.clone());
    assert_eq!(order, expected);
    // Stable across repeated replays.
    assert_eq!(replay_order(ledger), expected);
}

#[test]
fn bundled_children_never_count() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let bob = fixtures::address("bob");
    let contract = token_contract(&ledger, &alice, 100);

    ledger.add_bundled_interaction(&contract, &alice, 2, &transfer(&bob, 40));

    let client = sim_client(ledger);
    let output = client
        .replay(
            &contract,
            ReplayOptions {
                height: None,
                with_validity: true,
            },
        )
        .unwrap();

    assert_eq!(output.state, balances(&[(&alice, 100)]));
    assert!(output.validity.unwrap().is_empty());
}

#[test]
fn duplicate_contract_tags_exclude_a_record() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let bob = fixtures::address("bob");
    let contract = token_contract(&ledger, &alice, 100);

    ledger.add_interaction_with_tags(
        &alice,
        2,
        vec![
            Tag::new(protocol::TAG_APP_NAME, protocol::APP_ACTION),
            Tag::new(protocol::TAG_CONTRACT, contract.as_str()),
            Tag::new(protocol::TAG_CONTRACT, contract.as_str()),
            Tag::new(
                protocol::TAG_INPUT,
                serde_json::to_string(&transfer(&bob, 40)).unwrap(),
            ),
        ],
    );

    let client = sim_client(ledger);
    let output = client
        .replay(
            &contract,
            ReplayOptions {
                height: None,
                with_validity: true,
            },
        )
        .unwrap();

    assert_eq!(output.state, balances(&[(&alice, 100)]));
    assert!(output.validity.unwrap().is_empty());
}

#[test]
fn repeated_replays_are_byte_identical() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let bob = fixtures::address("bob");
    let contract = token_contract(&ledger, &alice, 100);
    ledger.add_interaction(&contract, &alice, 2, &transfer(&bob, 40));
    ledger.add_interaction(&contract, &alice, 3, &transfer(&bob, 7));

    let client = sim_client(ledger.clone());
    let first = client.read_state(&contract, None).unwrap();
    // Second run is served from the snapshot cache.
    let second = client.read_state(&contract, None).unwrap();
    // A fresh client recomputes from genesis.
    let fresh = sim_client(ledger).read_state(&contract, None).unwrap();

    assert_eq!(canonical(&first), canonical(&second));
    assert_eq!(canonical(&first), canonical(&fresh));
}

#[test]
fn unknown_contract_fails_the_whole_replay() {
    let ledger = Arc::new(SimLedger::new());
    let client = sim_client(ledger);
    let ghost = fixtures::tx_id(200);

    match client.read_state(&ghost, None) {
        Err(Error::Load(LoadError::ContractNotFound { id })) => assert_eq!(id, ghost),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn pagination_is_drained_to_the_last_page() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let bob = fixtures::address("bob");
    let contract = token_contract(&ledger, &alice, 100);
    for height in 2..=4 {
        ledger.add_interaction(&contract, &alice, height, &transfer(&bob, 1));
    }

    let mut config = Config::default();
    config.gateway.page_size = 1;
    let client = sim_client_with(ledger.clone(), config);

    let state = client.read_state(&contract, None).unwrap();
    assert_eq!(state, balances(&[(&alice, 97), (&bob, 3)]));
    assert!(ledger.pages_served() >= 3);
}

#[test]
fn dry_run_observes_but_never_confirms() {
    let ledger = Arc::new(SimLedger::new());
    let alice = fixtures::address("alice");
    let bob = fixtures::address("bob");
    let contract = token_contract(&ledger, &alice, 100);
    ledger.add_interaction(&contract, &alice, 2, &transfer(&bob, 40));

    let client = sim_client(ledger);

    // A read-only function call surfaces its result.
    let balance = client
        .dry_run(
            &contract,
            json!({ "function": "balance" }),
            alice.clone(),
            Default::default(),
        )
        .unwrap();
    assert_eq!(balance.result().unwrap()["balance"], json!(60));

    // A would-be write shows its state without confirming anything.
    let attempt = client
        .dry_run(
            &contract,
            transfer(&bob, 10),
            alice.clone(),
            Default::default(),
        )
        .unwrap();
    match attempt {
        ExecutionResult::Ok { state, .. } => {
            assert_eq!(state, balances(&[(&alice, 50), (&bob, 50)]));
        }
        other => panic!("unexpected: {:?}", other),
    }

    // The ledger-derived state is untouched.
    let confirmed = client.read_state(&contract, None).unwrap();
    assert_eq!(confirmed, balances(&[(&alice, 60), (&bob, 40)]));
}
