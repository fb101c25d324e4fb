//! Second encoding stage: reduce a `Node` tree to plain JSON.
//!
//! Type tags are unwrapped wherever they appear (including the `hubChange`
//! wrapper around ran change sets). Unset struct fields and unset map
//! values disappear; structs with a flattened field reach us as maps, so
//! both must agree. Only an unset sequence element becomes `null`, since
//! positions matter there. Scalars pass
//! through untouched, so integers stay bare numbers and date/time values
//! stay the single string their `Serialize` impl produced.

use serde_json::{Map, Value};

use super::tree::Node;

/// Normalize `node`. Returns `None` when the whole value is unset.
pub(crate) fn normalize(node: Node) -> Option<Value> {
    match node {
        Node::Absent => None,
        Node::Null => Some(Value::Null),
        Node::Bool(b) => Some(Value::Bool(b)),
        Node::Number(n) => Some(Value::Number(n)),
        Node::String(s) => Some(Value::String(s)),
        Node::Seq(items) => Some(Value::Array(
            items.into_iter().map(normalize_or_null).collect(),
        )),
        Node::Map(entries) => Some(Value::Object(
            entries
                .into_iter()
                .filter_map(|(key, node)| normalize(node).map(|value| (key, value)))
                .collect(),
        )),
        Node::Struct(fields) => {
            let mut object = Map::with_capacity(fields.len());
            for (key, node) in fields {
                if let Some(value) = normalize(node) {
                    object.insert(key.to_owned(), value);
                }
            }
            Some(Value::Object(object))
        }
        Node::Tagged(_, inner) => normalize(*inner),
    }
}

fn normalize_or_null(node: Node) -> Value {
    normalize(node).unwrap_or(Value::Null)
}
