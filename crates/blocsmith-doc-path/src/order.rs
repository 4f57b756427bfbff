//! Last-pass `order` normalization before publish.

use serde_json::Value;

/// Recursively find every `items` array in `doc` and re-assign contiguous
/// `order` values 1..N to its objects that carry a numeric `order`.
///
/// Deletions and out-of-band edits leave gaps or duplicates behind; this
/// runs once per publish, after all patches, so those never reach the
/// published document. The sort is stable: ties keep their original
/// relative position.
pub fn clean_order_data(doc: &Value) -> Value {
    let mut clean = doc.clone();
    traverse(&mut clean);
    clean
}

fn traverse(value: &mut Value) {
    match value {
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                traverse(item);
            }
        }
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "items" {
                    if let Value::Array(items) = val {
                        realign_items(items);
                    }
                }
                traverse(val);
            }
        }
        _ => {}
    }
}

fn realign_items(items: &mut [Value]) {
    let mut ordered: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.get("order").map(Value::is_number).unwrap_or(false))
        .map(|(idx, _)| idx)
        .collect();

    if ordered.is_empty() {
        return;
    }

    ordered.sort_by(|a, b| {
        let order_of = |idx: usize| items[idx]["order"].as_f64().unwrap_or(0.0);
        order_of(*a)
            .partial_cmp(&order_of(*b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for (rank, idx) in ordered.into_iter().enumerate() {
        items[idx]["order"] = Value::from(rank as u64 + 1);
    }
}
