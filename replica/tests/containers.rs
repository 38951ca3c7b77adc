//! Tracked-container behavior: removals shift logical positions without
//! re-encoding unaffected entries, reorders travel as index remaps, and
//! maps/sets replicate their entry lifecycles.

mod common;

use common::*;
use replica::{ElementKind, Encoder, PrimitiveKind, SyncEvent, Value};

fn numbers_fixture() -> (common::Fixture, replica::Graph, Encoder, replica::Decoder, replica::InstanceId) {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let encoder = Encoder::new();
    let decoder = mirror(&fixture);
    let root = graph.root();
    let numbers = graph
        .create_array(ElementKind::Primitive(PrimitiveKind::U16))
        .unwrap();
    graph.set_field(root, NUMBERS, Value::Ref(numbers)).unwrap();
    (fixture, graph, encoder, decoder, numbers)
}

#[test]
fn removal_shifts_indices_without_rewrites() {
    let (fixture, mut graph, mut encoder, mut decoder, numbers) = numbers_fixture();

    for n in [10u16, 20, 30, 40, 50] {
        graph.array_push(numbers, Value::U16(n)).unwrap();
    }
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    // remove index 0, then write through the shifted index: the write must
    // land on the element that was originally at index 2
    graph.array_remove(numbers, 0).unwrap();
    graph.array_set(numbers, 1, Value::U16(35)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    assert_eq!(graph.array_get(numbers, 1).unwrap(), Some(&Value::U16(35)));
    assert_in_sync(&graph, &decoder);

    // a fresh snapshot joiner agrees byte-for-byte on the JSON projection
    let mut fresh = mirror(&fixture);
    let snapshot = encoder.encode_all(&mut graph).unwrap();
    fresh.decode(&snapshot).unwrap();
    assert_eq!(
        serde_json::to_string(&decoder.graph().to_json()).unwrap(),
        serde_json::to_string(&fresh.graph().to_json()).unwrap(),
    );
}

#[test]
fn insert_at_position_replicates() {
    let (_fixture, mut graph, mut encoder, mut decoder, numbers) = numbers_fixture();

    for n in [1u16, 3, 4] {
        graph.array_push(numbers, Value::U16(n)).unwrap();
    }
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    graph.array_insert(numbers, 1, Value::U16(2)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    assert_eq!(graph.array_get(numbers, 1).unwrap(), Some(&Value::U16(2)));
    assert_in_sync(&graph, &decoder);
}

#[test]
fn sort_travels_as_index_remaps() {
    let (_fixture, mut graph, mut encoder, mut decoder, numbers) = numbers_fixture();

    for n in [40u16, 10, 30, 20] {
        graph.array_push(numbers, Value::U16(n)).unwrap();
    }
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    graph
        .array_sort_by(numbers, |a, b| match (a, b) {
            (Value::U16(x), Value::U16(y)) => x.cmp(y),
            _ => std::cmp::Ordering::Equal,
        })
        .unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    let events = decoder.decode(&patch).unwrap();

    // only remaps: no entry was re-encoded or re-added
    assert!(events
        .iter()
        .all(|event| matches!(event, SyncEvent::EntryMoved { .. })));
    assert_in_sync(&graph, &decoder);
}

#[test]
fn swap_and_explicit_move_replicate() {
    let (_fixture, mut graph, mut encoder, mut decoder, numbers) = numbers_fixture();

    for n in [1u16, 2, 3, 4] {
        graph.array_push(numbers, Value::U16(n)).unwrap();
    }
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    graph.array_swap(numbers, 0, 3).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    assert_in_sync(&graph, &decoder);

    graph.array_move(numbers, 2, 0).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    assert_in_sync(&graph, &decoder);
}

#[test]
fn clear_drops_every_entry_at_once() {
    let (_fixture, mut graph, mut encoder, mut decoder, numbers) = numbers_fixture();

    for n in [7u16, 8, 9] {
        graph.array_push(numbers, Value::U16(n)).unwrap();
    }
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();

    graph.array_clear(numbers).unwrap();
    graph.array_push(numbers, Value::U16(99)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    let events = decoder.decode(&patch).unwrap();

    assert!(events
        .iter()
        .any(|event| matches!(event, SyncEvent::Cleared { .. })));
    assert_eq!(graph.array_len(numbers).unwrap(), 1);
    assert_in_sync(&graph, &decoder);
}

#[test]
fn map_entry_lifecycle_replicates() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let mut decoder = mirror(&fixture);
    let root = graph.root();

    let scores = graph
        .create_map(ElementKind::Primitive(PrimitiveKind::U16))
        .unwrap();
    graph.set_field(root, SCORES, Value::Ref(scores)).unwrap();
    graph.map_insert(scores, "alice", Value::U16(1)).unwrap();
    graph.map_insert(scores, "bob", Value::U16(2)).unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    assert_in_sync(&graph, &decoder);

    // in-place update: the key does not travel again
    graph.map_insert(scores, "alice", Value::U16(5)).unwrap();
    graph.map_remove(scores, "bob").unwrap();
    let patch = encoder.encode(&mut graph).unwrap();
    let events = decoder.decode(&patch).unwrap();

    assert!(events.iter().any(|event| matches!(
        event,
        SyncEvent::EntryChanged { key: Some(key), .. } if key == "alice"
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        SyncEvent::EntryRemoved { key: Some(key), .. } if key == "bob"
    )));
    assert_in_sync(&graph, &decoder);
}

#[test]
fn set_entries_are_unique_and_replicate() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let mut decoder = mirror(&fixture);
    let root = graph.root();

    let tags = graph
        .create_set(ElementKind::Primitive(PrimitiveKind::Str))
        .unwrap();
    graph.set_field(root, TAGS, Value::Ref(tags)).unwrap();
    assert!(graph.set_insert(tags, Value::from("ranked")).unwrap());
    assert!(graph.set_insert(tags, Value::from("private")).unwrap());
    // duplicate insert: no entry, no operation
    assert!(!graph.set_insert(tags, Value::from("ranked")).unwrap());

    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    assert_eq!(graph.set_len(tags).unwrap(), 2);
    assert_in_sync(&graph, &decoder);

    assert!(graph.set_remove(tags, &Value::from("ranked")).unwrap());
    let patch = encoder.encode(&mut graph).unwrap();
    decoder.decode(&patch).unwrap();
    assert_in_sync(&graph, &decoder);
}
