//! Per-observer filtering: view-restricted fields only reach observers
//! whose view admits the subject, and encoding one observer's buffer never
//! affects another's.

mod common;

use common::*;
use replica::{Encoder, Value, View};

#[test]
fn restricted_field_is_withheld_without_membership() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let root = graph.root();

    graph.set_field(root, TURN, Value::U32(1)).unwrap();
    graph.set_field(root, SECRET, Value::U32(42)).unwrap();
    encoder.encode(&mut graph).unwrap();

    let outsider_view = View::new();
    let bytes = encoder.encode_for_view(&graph, &outsider_view).unwrap();

    let mut outsider = mirror(&fixture);
    outsider.decode(&bytes).unwrap();
    let json = outsider.graph().to_json();
    assert_eq!(json["turn"], serde_json::json!(1));
    assert!(json.get("secret").is_none());
}

#[test]
fn explicit_membership_admits_restricted_fields() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let root = graph.root();

    graph.set_field(root, SECRET, Value::U32(42)).unwrap();
    encoder.encode(&mut graph).unwrap();

    let mut insider_view = View::new();
    insider_view.add(root);
    let bytes = encoder.encode_for_view(&graph, &insider_view).unwrap();

    let mut insider = mirror(&fixture);
    insider.decode(&bytes).unwrap();
    assert_eq!(insider.graph().to_json()["secret"], serde_json::json!(42));
}

#[test]
fn restricted_reference_gates_the_whole_subtree() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let root = graph.root();

    let informant = make_player(&mut graph, &fixture, "informant", 66);
    graph.set_field(root, INTEL, Value::Ref(informant)).unwrap();
    graph.set_field(root, TURN, Value::U32(9)).unwrap();
    encoder.encode(&mut graph).unwrap();

    // without membership: neither the reference nor the subtree leaks
    let outsider_bytes = encoder.encode_for_view(&graph, &View::new()).unwrap();
    let mut outsider = mirror(&fixture);
    outsider.decode(&outsider_bytes).unwrap();
    let json = outsider.graph().to_json();
    assert!(json.get("intel").is_none());
    assert_eq!(json["turn"], serde_json::json!(9));

    // with the referenced instance in the view: full subtree arrives
    let mut spy_view = View::new();
    spy_view.add(informant);
    let spy_bytes = encoder.encode_for_view(&graph, &spy_view).unwrap();
    let mut spy = mirror(&fixture);
    spy.decode(&spy_bytes).unwrap();
    assert_eq!(
        spy.graph().to_json()["intel"]["name"],
        serde_json::json!("informant")
    );
}

#[test]
fn predicate_admits_restricted_operations() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let root = graph.root();

    let informant = make_player(&mut graph, &fixture, "informant", 1);
    graph.set_field(root, INTEL, Value::Ref(informant)).unwrap();
    encoder.encode(&mut graph).unwrap();

    let player_kind = fixture.player;
    let view = View::new()
        .with_predicate(move |graph, subject| graph.instance_kind(subject) == Some(player_kind));
    let bytes = encoder.encode_for_view(&graph, &view).unwrap();

    let mut observer = mirror(&fixture);
    observer.decode(&bytes).unwrap();
    assert_eq!(
        observer.graph().to_json()["intel"]["name"],
        serde_json::json!("informant")
    );
}

#[test]
fn encoding_for_one_observer_does_not_affect_another() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let root = graph.root();

    graph.set_field(root, TURN, Value::U32(3)).unwrap();
    graph.set_field(root, SECRET, Value::U32(7)).unwrap();
    encoder.encode(&mut graph).unwrap();

    let mut insider_view = View::new();
    insider_view.add(root);
    let outsider_view = View::new();

    let outsider_before = encoder.encode_for_view(&graph, &outsider_view).unwrap();
    let insider_bytes = encoder.encode_for_view(&graph, &insider_view).unwrap();
    let outsider_after = encoder.encode_for_view(&graph, &outsider_view).unwrap();

    // byte-identical regardless of what was encoded in between
    assert_eq!(outsider_before, outsider_after);
    assert_ne!(outsider_before, insider_bytes);
}

#[test]
fn view_snapshot_filters_like_the_incremental_pass() {
    let fixture = fixture();
    let mut graph = host(&fixture);
    let mut encoder = Encoder::new();
    let root = graph.root();

    graph.set_field(root, TURN, Value::U32(4)).unwrap();
    graph.set_field(root, SECRET, Value::U32(11)).unwrap();
    encoder.encode(&mut graph).unwrap();

    // a late joiner without membership gets the same censored shape
    let bytes = encoder
        .encode_all_for_view(&mut graph, &View::new())
        .unwrap();
    let mut late = mirror(&fixture);
    late.decode(&bytes).unwrap();
    let json = late.graph().to_json();
    assert_eq!(json["turn"], serde_json::json!(4));
    assert!(json.get("secret").is_none());
}
