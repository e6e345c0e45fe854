//! Dot-path helpers used when binding keys address nested payloads.

use serde_json::{Map, Value};

/// Builds `{a: {b: {c: value}}}` from `"a.b.c"`.
///
/// Empty segments are skipped while descending; the final segment only
/// receives the value when it is non-empty, so `"a."` yields `{a: {}}`.
pub fn create_nested_object(path: &str, value: Value) -> Map<String, Value> {
    let mut root = Map::new();
    if !path.contains('.') {
        root.insert(path.to_string(), value);
        return root;
    }

    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return root,
    };

    let mut innermost = Map::new();
    if !last.is_empty() {
        innermost.insert(last.to_string(), value);
    }

    parents
        .iter()
        .rev()
        .filter(|segment| !segment.is_empty())
        .fold(innermost, |inner, segment| {
            let mut outer = Map::new();
            outer.insert(segment.to_string(), Value::Object(inner));
            outer
        })
}

/// Reads the value at a dot path; `None` when any segment is missing or a
/// non-object is reached before the path ends.
pub fn get_nested_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if !path.contains('.') {
        return value.as_object().and_then(|map| map.get(path));
    }

    path.split('.').try_fold(value, |current, segment| {
        current.as_object().and_then(|map| map.get(segment))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_nested_objects() {
        assert_eq!(
            Value::Object(create_nested_object("a.b.c", json!(1))),
            json!({"a": {"b": {"c": 1}}})
        );
        assert_eq!(
            Value::Object(create_nested_object("key", json!("v"))),
            json!({"key": "v"})
        );
    }

    #[test]
    fn skips_empty_segments() {
        assert_eq!(
            Value::Object(create_nested_object("a..b", json!(true))),
            json!({"a": {"b": true}})
        );
        assert_eq!(
            Value::Object(create_nested_object("a.", json!(true))),
            json!({"a": {}})
        );
    }

    #[test]
    fn nested_values_round_trip() {
        for path in ["flat", "a.b", "deep.er.path"] {
            let built = Value::Object(create_nested_object(path, json!(42)));
            assert_eq!(get_nested_value(&built, path), Some(&json!(42)));
        }
    }

    #[test]
    fn missing_paths_yield_none() {
        let data = json!({"some": {"nested": 3}});
        assert_eq!(get_nested_value(&data, "some.other"), None);
        assert_eq!(get_nested_value(&data, "some.nested.deeper"), None);
        assert_eq!(get_nested_value(&json!(5), "flat"), None);
    }
}
