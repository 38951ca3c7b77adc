//! Reference-lifecycle properties: deferred GC at patch boundaries,
//! add+remove cancellation inside a patch, and survival of instances still
//! reachable through a second parent.

mod common;

use common::*;
use replica::{ElementKind, Encoder, SyncEvent, Value};

#[test]
fn add_and_remove_within_one_patch_is_invisible() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let mut decoder = mirror(&fixture);
    let root = graph.root();

    let roster = graph.create_array(ElementKind::Ref(fixture.player)).unwrap();
    graph.set_field(root, ROSTER, Value::Ref(roster)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    // the ghost lives and dies between two flushes
    let ghost = make_player(&mut graph, &fixture, "ghost", 1);
    graph.array_push(roster, Value::Ref(ghost)).unwrap();
    graph.array_remove(roster, 0).unwrap();

    let patch = encoder.encode(&mut graph).unwrap();
    assert!(patch.is_empty());

    let events = decoder.decode(&patch).unwrap();
    assert!(events.is_empty());
    assert_eq!(decoder.graph().to_json()["roster"], serde_json::json!([]));

    // the host-side instance is reclaimed at the patch boundary
    assert!(!graph.contains(ghost));
}

#[test]
fn exclusively_owned_children_are_reclaimed_once_shared_ones_survive() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let mut decoder = mirror(&fixture);
    let root = graph.root();

    let roster = graph.create_array(ElementKind::Ref(fixture.player)).unwrap();
    graph.set_field(root, ROSTER, Value::Ref(roster)).unwrap();
    let alice = make_player(&mut graph, &fixture, "alice", 10);
    let bob = make_player(&mut graph, &fixture, "bob", 20);
    graph.array_push(roster, Value::Ref(alice)).unwrap();
    graph.array_push(roster, Value::Ref(bob)).unwrap();
    // alice is also reachable through a second parent edge
    graph.set_field(root, PLAYER1, Value::Ref(alice)).unwrap();

    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    let mirrored_roster = decoder
        .graph()
        .field(decoder.root(), ROSTER)
        .unwrap()
        .and_then(Value::as_instance)
        .unwrap();
    let mirrored_alice = decoder
        .graph()
        .array_get(mirrored_roster, 0)
        .unwrap()
        .and_then(Value::as_instance)
        .unwrap();
    let mirrored_bob = decoder
        .graph()
        .array_get(mirrored_roster, 1)
        .unwrap()
        .and_then(Value::as_instance)
        .unwrap();

    // swap in a brand-new roster: the old one and everything it
    // exclusively owned becomes unreachable
    let fresh_roster = graph.create_array(ElementKind::Ref(fixture.player)).unwrap();
    graph
        .set_field(root, ROSTER, Value::Ref(fresh_roster))
        .unwrap();

    let patch = encoder.encode(&mut graph).unwrap();
    let events = decoder.decode(&patch).unwrap();

    // bob reclaimed exactly once; alice survives through player1
    let bob_removals = events
        .iter()
        .filter(|event| matches!(event, SyncEvent::InstanceRemoved { instance } if *instance == mirrored_bob))
        .count();
    assert_eq!(bob_removals, 1);
    assert!(!events.iter().any(
        |event| matches!(event, SyncEvent::InstanceRemoved { instance } if *instance == mirrored_alice)
    ));

    assert!(graph.contains(alice));
    assert!(!graph.contains(bob));
    assert_in_sync(&graph, &decoder);
}

#[test]
fn detach_and_reattach_within_one_patch_survives() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let mut decoder = mirror(&fixture);
    let root = graph.root();

    let alice = make_player(&mut graph, &fixture, "alice", 30);
    graph.set_field(root, PLAYER1, Value::Ref(alice)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    // count touches zero mid-patch, then recovers before the boundary
    graph.unset_field(root, PLAYER1).unwrap();
    graph.set_field(root, PLAYER2, Value::Ref(alice)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    let events = decoder.decode(&patch).unwrap();

    assert!(graph.contains(alice));
    assert!(!events
        .iter()
        .any(|event| matches!(event, SyncEvent::InstanceRemoved { .. })));
    assert_in_sync(&graph, &decoder);
}
