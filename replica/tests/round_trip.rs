//! Round-trip and snapshot-equivalence properties: every interleaving of
//! mutations and flushes must leave the mirrored graph observably equal to
//! the source.

mod common;

use common::*;
use replica::{Encoder, Value};

#[test]
fn incremental_round_trip_matches_source_after_each_step() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let mut decoder = mirror(&fixture);
    let root = graph.root();

    // step 1: scalars
    graph.set_field(root, TURN, Value::U32(1)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    assert_in_sync(&graph, &decoder);

    // step 2: a nested instance
    let alice = make_player(&mut graph, &fixture, "alice", 100);
    graph.set_field(root, PLAYER1, Value::Ref(alice)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    assert_in_sync(&graph, &decoder);

    // step 3: mutate the nested instance only
    graph.set_field(alice, PLAYER_HP, Value::U8(90)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    assert_in_sync(&graph, &decoder);

    // step 4: containers
    let roster = graph
        .create_array(replica::ElementKind::Ref(fixture.player))
        .unwrap();
    graph.set_field(root, ROSTER, Value::Ref(roster)).unwrap();
    graph.array_push(roster, Value::Ref(alice)).unwrap();
    let bob = make_player(&mut graph, &fixture, "bob", 80);
    graph.array_push(roster, Value::Ref(bob)).unwrap();
    let scores = graph
        .create_map(replica::ElementKind::Primitive(replica::PrimitiveKind::U16))
        .unwrap();
    graph.set_field(root, SCORES, Value::Ref(scores)).unwrap();
    graph.map_insert(scores, "alice", Value::U16(3)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    assert_in_sync(&graph, &decoder);

    // step 5: removals
    graph.array_remove(roster, 0).unwrap();
    graph.map_insert(scores, "bob", Value::U16(1)).unwrap();
    graph.unset_field(root, PLAYER1).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    assert_in_sync(&graph, &decoder);
}

#[test]
fn snapshot_equals_incremental_history() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let mut incremental = mirror(&fixture);
    let root = graph.root();

    // history with an interleaved flush
    graph.set_field(root, TURN, Value::U32(7)).unwrap();
    let alice = make_player(&mut graph, &fixture, "alice", 42);
    graph.set_field(root, PLAYER1, Value::Ref(alice)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    incremental.decode(&patch).unwrap();

    graph.set_field(root, PLAYER2, Value::Ref(alice)).unwrap();
    graph.set_field(alice, PLAYER_HP, Value::U8(41)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    incremental.decode(&patch).unwrap();

    // a fresh observer catches up from one snapshot
    let mut fresh = mirror(&fixture);
    let snapshot = encoder.encode_all(&mut graph).unwrap();
    fresh.decode(&snapshot).unwrap();

    assert_in_sync(&graph, &incremental);
    assert_in_sync(&graph, &fresh);

    // the shared reference is one mirrored instance, not two copies
    let p1 = fresh.graph().field(fresh.root(), PLAYER1).unwrap().cloned();
    let p2 = fresh.graph().field(fresh.root(), PLAYER2).unwrap().cloned();
    assert_eq!(p1, p2);
    assert!(p1.unwrap().is_ref());
}

#[test]
fn snapshot_does_not_disturb_the_incremental_stream() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let mut observer = mirror(&fixture);
    let root = graph.root();

    graph.set_field(root, TURN, Value::U32(1)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    observer.decode(&patch).unwrap();

    // pending change, then a snapshot for a late joiner
    graph.set_field(root, TURN, Value::U32(2)).unwrap();
    let snapshot = encoder.encode_all(&mut graph).unwrap();
    let mut late = mirror(&fixture);
    late.decode(&snapshot).unwrap();
    assert_in_sync(&graph, &late);

    // the pending change still reaches the existing observer
    let patch = encoder.encode(&mut graph).unwrap();
    assert!(!patch.is_empty());
    observer.decode(&patch).unwrap();
    assert_in_sync(&graph, &observer);
}

#[test]
fn noop_scalar_write_produces_empty_patch() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let root = graph.root();

    graph.set_field(root, TURN, Value::U32(5)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    assert!(!patch.is_empty());

    graph.set_field(root, TURN, Value::U32(5)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    assert!(patch.is_empty());
}

#[test]
fn equal_contents_different_instance_still_encodes() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let mut decoder = mirror(&fixture);
    let root = graph.root();

    let first = make_player(&mut graph, &fixture, "twin", 50);
    graph.set_field(root, PLAYER1, Value::Ref(first)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    let mirrored_first = decoder
        .graph()
        .field(decoder.root(), PLAYER1)
        .unwrap()
        .and_then(Value::as_instance);

    // deep-equal contents, different identity: must still replicate
    let second = make_player(&mut graph, &fixture, "twin", 50);
    graph.set_field(root, PLAYER1, Value::Ref(second)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    assert!(!patch.is_empty());
    decoder.decode(&patch).unwrap();

    let mirrored_second = decoder
        .graph()
        .field(decoder.root(), PLAYER1)
        .unwrap()
        .and_then(Value::as_instance);
    assert_ne!(mirrored_first, mirrored_second);
    assert_in_sync(&graph, &decoder);
}

#[test]
fn empty_patch_decodes_to_nothing() {
    let fixture = fixture();
    let mut decoder = mirror(&fixture);
    let events = decoder.decode(&[]).unwrap();
    assert!(events.is_empty());
}

#[test]
fn polymorphic_field_carries_the_concrete_type() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let mut decoder = mirror(&fixture);
    let root = graph.root();

    // field declares Player; the value is an Npc
    let guide = graph.create_object(fixture.npc).unwrap();
    graph
        .set_field(guide, PLAYER_NAME, Value::from("guide"))
        .unwrap();
    graph
        .set_field(guide, NPC_DIALOGUE, Value::from("welcome"))
        .unwrap();
    graph.set_field(root, PLAYER1, Value::Ref(guide)).unwrap();

    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    let mirrored = decoder
        .graph()
        .field(decoder.root(), PLAYER1)
        .unwrap()
        .and_then(Value::as_instance)
        .unwrap();
    assert_eq!(decoder.graph().instance_kind(mirrored), Some(fixture.npc));
    assert_in_sync(&graph, &decoder);
}
