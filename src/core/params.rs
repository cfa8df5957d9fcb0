//! Flattened URL form of query objects
//!
//! Nested objects and arrays become bracketed keys:
//!
//! ```text
//! {"age": {"$gte": 15}, "$sort": {"age": -1}, "$select": ["age"]}
//!   => age[$gte]=15 & $sort[age]=-1 & $select[0]=age
//! ```
//!
//! Leaf values are written as JSON scalars. A string is written raw unless it
//! would itself read back as JSON (`"15"`, `"true"`), in which case it is
//! quoted, so `unflatten(flatten(v)) == v` for every object. Empty arrays and
//! objects are written as `[]` and `{}`.

use serde_json::{Map, Value};

/// Flatten a query object into `(key, value)` pairs
///
/// Non-object inputs produce no pairs.
pub fn flatten(value: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if let Value::Object(object) = value {
        for (key, child) in object {
            flatten_into(key.clone(), child, &mut out);
        }
    }
    out
}

fn flatten_into(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(object) if object.is_empty() => out.push((prefix, "{}".to_string())),
        Value::Array(items) if items.is_empty() => out.push((prefix, "[]".to_string())),
        Value::Object(object) => {
            for (key, child) in object {
                flatten_into(format!("{}[{}]", prefix, key), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(format!("{}[{}]", prefix, index), child, out);
            }
        }
        Value::String(s) => out.push((prefix, encode_string(s))),
        scalar => out.push((prefix, scalar.to_string())),
    }
}

fn encode_string(s: &str) -> String {
    if serde_json::from_str::<Value>(s).is_ok() {
        Value::String(s.to_string()).to_string()
    } else {
        s.to_string()
    }
}

fn decode_leaf(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Split `a[b][c]` into `["a", "b", "c"]`; malformed keys stay whole
fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    if open == 0 || !key.ends_with(']') {
        return vec![key.to_string()];
    }

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return vec![key.to_string()];
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return vec![key.to_string()];
    }
    segments
}

enum Node {
    Leaf(Value),
    Branch(Vec<(String, Node)>),
}

fn insert(children: &mut Vec<(String, Node)>, path: &[String], value: Value) {
    let Some((head, tail)) = path.split_first() else {
        return;
    };
    // `a[]=x` appends
    let key = if head.is_empty() {
        children.len().to_string()
    } else {
        head.clone()
    };

    let position = children.iter().position(|(k, _)| *k == key);

    if tail.is_empty() {
        match position {
            Some(i) => children[i].1 = Node::Leaf(value),
            None => children.push((key, Node::Leaf(value))),
        }
        return;
    }

    let index = match position {
        Some(i) => {
            if matches!(children[i].1, Node::Leaf(_)) {
                children[i].1 = Node::Branch(Vec::new());
            }
            i
        }
        None => {
            children.push((key, Node::Branch(Vec::new())));
            children.len() - 1
        }
    };

    if let Node::Branch(grandchildren) = &mut children[index].1 {
        insert(grandchildren, tail, value);
    }
}

fn into_value(node: Node) -> Value {
    match node {
        Node::Leaf(value) => value,
        Node::Branch(children) => {
            let indices: Option<Vec<usize>> =
                children.iter().map(|(k, _)| k.parse::<usize>().ok()).collect();
            match indices {
                Some(indices) if !children.is_empty() => {
                    let mut items: Vec<(usize, Node)> = indices
                        .into_iter()
                        .zip(children.into_iter().map(|(_, node)| node))
                        .collect();
                    items.sort_by_key(|(index, _)| *index);
                    Value::Array(items.into_iter().map(|(_, node)| into_value(node)).collect())
                }
                _ => Value::Object(
                    children
                        .into_iter()
                        .map(|(key, node)| (key, into_value(node)))
                        .collect::<Map<String, Value>>(),
                ),
            }
        }
    }
}

/// Rebuild a query object from flattened `(key, value)` pairs
///
/// Later duplicates win. Always returns an object.
pub fn unflatten<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Value
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut root = Vec::new();
    for (key, value) in pairs {
        let path = split_key(key.as_ref());
        insert(&mut root, &path, decode_leaf(value.as_ref()));
    }

    let object: Map<String, Value> = root
        .into_iter()
        .map(|(key, node)| (key, into_value(node)))
        .collect();
    Value::Object(object)
}
