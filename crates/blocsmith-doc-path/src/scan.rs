//! Structural reachability scans used by the orphan-file check.

use serde_json::Value;

/// Returns `true` when `value` appears as a string leaf anywhere in `obj`
/// (objects, arrays and scalar leaves are all searched).
pub fn includes_value(obj: &Value, value: &str) -> bool {
    match obj {
        Value::String(s) => s == value,
        Value::Array(arr) => arr.iter().any(|item| includes_value(item, value)),
        Value::Object(map) => map.values().any(|item| includes_value(item, value)),
        _ => false,
    }
}

/// Collect every subtree keyed `scope_name`, at any depth.
///
/// Assets may be shared across multiple document locations keyed by the
/// same folder name, so the expected location alone is not enough.
pub fn find_scopes_by_name<'a>(obj: &'a Value, scope_name: &str) -> Vec<&'a Value> {
    let mut scopes = Vec::new();
    collect_scopes(obj, scope_name, &mut scopes);
    scopes
}

fn collect_scopes<'a>(current: &'a Value, scope_name: &str, out: &mut Vec<&'a Value>) {
    match current {
        Value::Object(map) => {
            if let Some(scope) = map.get(scope_name) {
                out.push(scope);
            }
            for val in map.values() {
                collect_scopes(val, scope_name, out);
            }
        }
        Value::Array(arr) => {
            for item in arr {
                collect_scopes(item, scope_name, out);
            }
        }
        _ => {}
    }
}

/// Decide whether the asset at `full_path` (`"<scope>/.../<filename>"`) is
/// still referenced under any same-named scope subtree of `doc`.
///
/// Falls back to a document-wide [`includes_value`] when the path has no
/// scope segment. Returns on the first match.
pub fn includes_value_in_scope(doc: &Value, full_path: &str) -> bool {
    let parts: Vec<&str> = full_path.split('/').collect();
    if parts.len() < 2 {
        return includes_value(doc, full_path);
    }

    let scope_name = parts[0];
    let intermediate = &parts[1..parts.len() - 1];
    let file_name = parts[parts.len() - 1];

    for scope in find_scopes_by_name(doc, scope_name) {
        if intermediate.is_empty() {
            if includes_value(scope, file_name) {
                return true;
            }
        } else if let Some(sub_scope) = navigate(scope, intermediate) {
            if includes_value(sub_scope, file_name) {
                return true;
            }
        }
    }
    false
}

fn navigate<'a>(obj: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    let mut current = obj;
    for part in parts {
        current = current.as_object()?.get(*part)?;
    }
    Some(current)
}
