//! JSON projection of a graph, for state-equivalence checks and debugging.
//! Objects project as maps keyed by field name (inheritance chain
//! flattened), arrays and sets as arrays in logical order, maps as objects.
//! Shared references project structurally; a true cycle is broken with a
//! `{"$ref": id}` marker instead of recursing forever.

use std::collections::HashSet;

use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::graph::instance::Instance;
use crate::graph::{Graph, InstanceId};
use crate::value::Value;

impl Graph {
    pub fn to_json(&self) -> JsonValue {
        let mut in_progress = HashSet::new();
        project(self, self.root(), &mut in_progress)
    }
}

fn project(graph: &Graph, id: InstanceId, in_progress: &mut HashSet<InstanceId>) -> JsonValue {
    if !in_progress.insert(id) {
        let marker = graph
            .tracker()
            .ref_id(id)
            .map(|ref_id| ref_id.to_u64())
            .unwrap_or(u64::MAX);
        let mut object = JsonMap::new();
        object.insert("$ref".to_string(), JsonValue::from(marker));
        return JsonValue::Object(object);
    }

    let projected = match graph.instance(id) {
        Some(Instance::Object(object)) => {
            let mut out = JsonMap::new();
            let count = graph.schemas().field_count(object.kind());
            for index in 0..count {
                let index = index as u8;
                let Some(field) = graph.schemas().field(object.kind(), index) else {
                    continue;
                };
                if let Some(value) = object.field(index) {
                    out.insert(field.name.clone(), project_value(graph, value, in_progress));
                }
            }
            JsonValue::Object(out)
        }
        Some(Instance::Array(array)) => JsonValue::Array(
            array
                .entries()
                .iter()
                .map(|(_, value)| project_value(graph, value, in_progress))
                .collect(),
        ),
        Some(Instance::Set(set)) => JsonValue::Array(
            set.entries()
                .iter()
                .map(|(_, value)| project_value(graph, value, in_progress))
                .collect(),
        ),
        Some(Instance::Map(map)) => {
            let mut out = JsonMap::new();
            for (_, key, value) in map.entries() {
                out.insert(key.clone(), project_value(graph, value, in_progress));
            }
            JsonValue::Object(out)
        }
        None => JsonValue::Null,
    };

    in_progress.remove(&id);
    projected
}

fn project_value(
    graph: &Graph,
    value: &Value,
    in_progress: &mut HashSet<InstanceId>,
) -> JsonValue {
    match value {
        Value::Bool(v) => JsonValue::Bool(*v),
        Value::U8(v) => JsonValue::from(*v),
        Value::U16(v) => JsonValue::from(*v),
        Value::U32(v) => JsonValue::from(*v),
        Value::U64(v) => JsonValue::from(*v),
        Value::I8(v) => JsonValue::from(*v),
        Value::I16(v) => JsonValue::from(*v),
        Value::I32(v) => JsonValue::from(*v),
        Value::I64(v) => JsonValue::from(*v),
        Value::F32(v) => Number::from_f64(*v as f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::F64(v) => Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Str(v) => JsonValue::String(v.clone()),
        Value::Ref(child) => project(graph, *child, in_progress),
    }
}
