#![allow(dead_code)]

use replica::{
    Decoder, ElementKind, FieldKind, Graph, InstanceId, PrimitiveKind, SchemaBuilder, SchemaKind,
    SchemaKinds, Value,
};

/// A game-shaped schema exercising every field kind: scalars, references
/// (with inheritance), containers of both, and view-restricted fields.
pub struct Fixture {
    pub kinds: SchemaKinds,
    pub player: SchemaKind,
    pub npc: SchemaKind,
    pub state: SchemaKind,
}

// State fields
pub const TURN: u8 = 0;
pub const PLAYER1: u8 = 1;
pub const PLAYER2: u8 = 2;
pub const ROSTER: u8 = 3;
pub const SCORES: u8 = 4;
pub const TAGS: u8 = 5;
pub const NUMBERS: u8 = 6;
pub const SECRET: u8 = 7;
pub const INTEL: u8 = 8;

// Player fields
pub const PLAYER_NAME: u8 = 0;
pub const PLAYER_HP: u8 = 1;
pub const NPC_DIALOGUE: u8 = 2;

pub fn fixture() -> Fixture {
    let mut kinds = SchemaKinds::new();
    let player = kinds
        .register(
            SchemaBuilder::new("Player")
                .field("name", FieldKind::Primitive(PrimitiveKind::Str))
                .field("hp", FieldKind::Primitive(PrimitiveKind::U8)),
        )
        .unwrap();
    let npc = kinds
        .register(
            SchemaBuilder::new("Npc")
                .extends(player)
                .field("dialogue", FieldKind::Primitive(PrimitiveKind::Str)),
        )
        .unwrap();
    let state = kinds
        .register(
            SchemaBuilder::new("State")
                .field("turn", FieldKind::Primitive(PrimitiveKind::U32))
                .field("player1", FieldKind::Ref(player))
                .field("player2", FieldKind::Ref(player))
                .field("roster", FieldKind::Array(ElementKind::Ref(player)))
                .field(
                    "scores",
                    FieldKind::Map(ElementKind::Primitive(PrimitiveKind::U16)),
                )
                .field(
                    "tags",
                    FieldKind::Set(ElementKind::Primitive(PrimitiveKind::Str)),
                )
                .field(
                    "numbers",
                    FieldKind::Array(ElementKind::Primitive(PrimitiveKind::U16)),
                )
                .view_field("secret", FieldKind::Primitive(PrimitiveKind::U32))
                .view_field("intel", FieldKind::Ref(player)),
        )
        .unwrap();

    Fixture {
        kinds,
        player,
        npc,
        state,
    }
}

pub fn host(fixture: &Fixture) -> Graph {
    Graph::new(fixture.kinds.clone(), fixture.state).unwrap()
}

pub fn mirror(fixture: &Fixture) -> Decoder {
    Decoder::new(fixture.kinds.clone(), fixture.state).unwrap()
}

pub fn make_player(graph: &mut Graph, fixture: &Fixture, name: &str, hp: u8) -> InstanceId {
    let player = graph.create_object(fixture.player).unwrap();
    graph
        .set_field(player, PLAYER_NAME, Value::from(name))
        .unwrap();
    graph.set_field(player, PLAYER_HP, Value::U8(hp)).unwrap();
    player
}

/// Host graph and mirror agree on observable state.
pub fn assert_in_sync(graph: &Graph, decoder: &Decoder) {
    assert_eq!(
        serde_json::to_string(&graph.to_json()).unwrap(),
        serde_json::to_string(&decoder.graph().to_json()).unwrap(),
    );
}
