//! Tokenizer and generic get/set/remove over dotted/bracketed paths.

use serde_json::{Map, Value};

/// One step of a document path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Key(String),
    Index(usize),
}

/// Split `a.b[3].c` into `[Key("a"), Key("b"), Index(3), Key("c")]`.
///
/// A purely numeric dotted segment (`a.3.c`) is treated as an index too,
/// matching the bracket-rewrite the admin tool performs before splitting.
pub fn tokenize_path(path: &str) -> Vec<PathToken> {
    let mut tokens = Vec::new();
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        let mut rest = segment;
        // leading name part, if any
        if let Some(bracket) = rest.find('[') {
            let name = &rest[..bracket];
            if !name.is_empty() {
                tokens.push(parse_plain_segment(name));
            }
            rest = &rest[bracket..];
            // one or more [n] suffixes
            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(close) = stripped.find(']') else { break };
                if let Ok(idx) = stripped[..close].parse::<usize>() {
                    tokens.push(PathToken::Index(idx));
                }
                rest = &stripped[close + 1..];
            }
        } else {
            tokens.push(parse_plain_segment(rest));
        }
    }
    tokens
}

fn parse_plain_segment(segment: &str) -> PathToken {
    match segment.parse::<usize>() {
        Ok(idx) => PathToken::Index(idx),
        Err(_) => PathToken::Key(segment.to_string()),
    }
}

/// Walk `doc` along `path`, returning `None` on any missing segment.
pub fn get_value_at_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for token in tokenize_path(path) {
        current = match (&token, current) {
            (PathToken::Key(key), Value::Object(map)) => map.get(key)?,
            (PathToken::Index(idx), Value::Array(arr)) => arr.get(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Assign `value` at `path`, creating intermediate containers as needed.
///
/// Missing or non-object intermediate segments are always created as plain
/// objects, never as arrays: publishing must not invent sparse arrays for
/// slots the document never had.
pub fn set_value_at_path(doc: &mut Value, path: &str, value: Value) {
    let mut tokens = tokenize_path(path);
    let Some(last) = tokens.pop() else { return };

    let mut current = doc;
    for token in tokens {
        current = match token {
            PathToken::Key(key) => {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                let map = current.as_object_mut().unwrap();
                map.entry(key).or_insert(Value::Object(Map::new()))
            }
            PathToken::Index(idx) => match current {
                Value::Array(arr) => {
                    if idx >= arr.len() {
                        arr.resize(idx + 1, Value::Object(Map::new()));
                    }
                    if !arr[idx].is_object() && !arr[idx].is_array() {
                        arr[idx] = Value::Object(Map::new());
                    }
                    &mut arr[idx]
                }
                other => {
                    // Non-array parent addressed by index: fall back to an
                    // object keyed by the stringified index.
                    if !other.is_object() {
                        *other = Value::Object(Map::new());
                    }
                    let map = other.as_object_mut().unwrap();
                    map.entry(idx.to_string()).or_insert(Value::Object(Map::new()))
                }
            },
        };
    }

    match (last, current) {
        (PathToken::Key(key), Value::Object(map)) => {
            map.insert(key, value);
        }
        (PathToken::Key(key), other) => {
            let mut map = Map::new();
            map.insert(key, value);
            *other = Value::Object(map);
        }
        (PathToken::Index(idx), Value::Array(arr)) => {
            if idx >= arr.len() {
                arr.resize(idx + 1, Value::Null);
            }
            arr[idx] = value;
        }
        (PathToken::Index(idx), other) => {
            let mut map = Map::new();
            map.insert(idx.to_string(), value);
            *other = Value::Object(map);
        }
    }
}

/// Null out the array slot addressed by `path`.
///
/// The slot becomes a tombstone instead of being spliced: array indices
/// double as row identity (`original_json_index`) for every other code
/// path, so removal must not shift later slots. Missing parents and
/// non-array targets are a no-op.
pub fn remove_bloc_from_json(doc: &mut Value, path: &str) {
    let mut tokens = tokenize_path(path);
    let Some(last) = tokens.pop() else { return };

    let mut current = doc;
    for token in tokens {
        current = match (&token, current) {
            (PathToken::Key(key), Value::Object(map)) => match map.get_mut(key) {
                Some(next) => next,
                None => return,
            },
            (PathToken::Index(idx), Value::Array(arr)) => match arr.get_mut(*idx) {
                Some(next) => next,
                None => return,
            },
            _ => return,
        };
    }

    if let (PathToken::Index(idx), Value::Array(arr)) = (last, current) {
        if idx < arr.len() {
            arr[idx] = Value::Null;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tokenize_mixed_path() {
        assert_eq!(
            tokenize_path("pages.services[2].title"),
            vec![
                PathToken::Key("pages".into()),
                PathToken::Key("services".into()),
                PathToken::Index(2),
                PathToken::Key("title".into()),
            ]
        );
    }

    #[test]
    fn tokenize_numeric_dotted_segment_is_index() {
        assert_eq!(
            tokenize_path("blocs.items.3"),
            vec![
                PathToken::Key("blocs".into()),
                PathToken::Key("items".into()),
                PathToken::Index(3),
            ]
        );
    }

    #[test]
    fn get_walks_objects_and_arrays() {
        let doc = json!({"a": {"items": [{"t": "x"}, {"t": "y"}]}});
        assert_eq!(get_value_at_path(&doc, "a.items[1].t"), Some(&json!("y")));
        assert_eq!(get_value_at_path(&doc, "a.items[5].t"), None);
        assert_eq!(get_value_at_path(&doc, "a.missing"), None);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = json!({});
        set_value_at_path(&mut doc, "a.b.c", json!(1));
        assert_eq!(doc, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn set_overwrites_scalar_intermediates() {
        let mut doc = json!({"a": "scalar"});
        set_value_at_path(&mut doc, "a.b", json!(2));
        assert_eq!(doc, json!({"a": {"b": 2}}));
    }

    #[test]
    fn set_extends_existing_arrays() {
        let mut doc = json!({"a": {"items": [{"order": 1}]}});
        set_value_at_path(&mut doc, "a.items[2].order", json!(3));
        assert_eq!(
            doc,
            json!({"a": {"items": [{"order": 1}, {}, {"order": 3}]}})
        );
    }

    #[test]
    fn set_is_idempotent() {
        let mut once = json!({"a": {"items": [{"t": "x"}]}});
        set_value_at_path(&mut once, "a.items[0].t", json!("z"));
        let mut twice = once.clone();
        set_value_at_path(&mut twice, "a.items[0].t", json!("z"));
        assert_eq!(once, twice);
    }

    #[test]
    fn remove_nulls_array_slot_without_splicing() {
        let mut doc = json!({"a": {"items": [{"t": "x"}, {"t": "y"}, {"t": "z"}]}});
        remove_bloc_from_json(&mut doc, "a.items[1]");
        assert_eq!(
            doc,
            json!({"a": {"items": [{"t": "x"}, null, {"t": "z"}]}})
        );
    }

    #[test]
    fn remove_with_missing_parent_is_noop() {
        let mut doc = json!({"a": {}});
        let before = doc.clone();
        remove_bloc_from_json(&mut doc, "a.items[1]");
        remove_bloc_from_json(&mut doc, "b.c[0]");
        assert_eq!(doc, before);
    }
}
