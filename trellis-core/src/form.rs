//! Query string and url-encoded form parsing

use serde_json::{Map, Value};

/// String-keyed map of request input values.
///
/// Scalars are stored as JSON strings, `key[]` lists as JSON arrays, and
/// decoded JSON bodies keep whatever shape the client sent.
pub type InputMap = Map<String, Value>;

/// Parse a query string (without the leading `?`) into an input map.
///
/// Values are percent-decoded and `+` becomes a space. A repeated plain key
/// keeps its last value; keys ending in `[]` accumulate into an array under
/// the bare name.
pub fn parse_query_string(query: &str) -> InputMap {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(query.trim_start_matches('?')).unwrap_or_default();
    collect_pairs(pairs)
}

/// Parse an `application/x-www-form-urlencoded` body into an input map.
pub fn parse_form_map(body: &[u8]) -> InputMap {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).unwrap_or_default();
    collect_pairs(pairs)
}

fn collect_pairs(pairs: Vec<(String, String)>) -> InputMap {
    let mut map = InputMap::new();

    for (key, value) in pairs {
        if let Some(name) = key.strip_suffix("[]") {
            if name.is_empty() {
                continue;
            }
            let slot = map
                .entry(name.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match slot {
                Value::Array(items) => items.push(Value::String(value)),
                other => *other = Value::Array(vec![Value::String(value)]),
            }
        } else if !key.is_empty() {
            map.insert(key, Value::String(value));
        }
    }

    map
}
