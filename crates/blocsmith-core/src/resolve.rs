//! Schema-driven resolution between editable keys and document paths.
//!
//! Every resolver here fails soft with `None`: schema and content are
//! allowed to drift, and a missing rule means "skip, not an error".

use serde_json::Value;

use blocsmith_doc_path::get_value_at_path;

use crate::key::EditableKey;
use crate::schema::{AssetRule, Schema, TextRule};
use crate::value::DataType;

/// The rule applicable to one field, text or asset flavoured.
#[derive(Debug, Clone, Copy)]
pub enum FieldRule<'a> {
    Text(&'a TextRule),
    Asset(&'a AssetRule),
}

impl<'a> FieldRule<'a> {
    pub fn folder(&self) -> Option<&'a str> {
        match self {
            FieldRule::Text(_) => None,
            FieldRule::Asset(rule) => rule.folder.as_deref(),
        }
    }
}

/// Full document path for a bloc field.
///
/// When `original_json_index` is given it replaces the in-memory index:
/// publish must target the array slot of the last-published document, not
/// the current in-memory order. Returns `None` when the schema has no such
/// bloc or field.
pub fn resolve_field_json_path(
    schema: &Schema,
    editable_key: &str,
    data_type: DataType,
    original_json_index: Option<usize>,
) -> Option<String> {
    let mut parsed = EditableKey::parse(editable_key).ok()?;
    if let Some(original) = original_json_index {
        parsed.index = original;
    }
    let rule = schema.bloc_rules.get(&parsed.bloc_key)?;

    let prop_name = match data_type {
        DataType::Text | DataType::Boolean => {
            rule.text_fields.get(&parsed.field_key).map(|r| r.key.as_str())
        }
        DataType::Image | DataType::Video => {
            rule.image_fields.get(&parsed.field_key).map(|r| r.name.as_str())
        }
    }?;

    Some(format!("{}.items[{}].{}", rule.json_key, parsed.index, prop_name))
}

/// Document path for a bloc instance: `<anchor>.items[<index>]`.
pub fn resolve_bloc_json_path(schema: &Schema, bloc_key: &str, index: usize) -> Option<String> {
    let rule = schema.bloc_rules.get(bloc_key)?;
    Some(format!("{}.items[{index}]", rule.json_key))
}

/// The rule governing one field, bloc-scoped or standalone.
pub fn rule_for_field<'a>(
    schema: &'a Schema,
    editable_key: &str,
    data_type: DataType,
    part_of_bloc: bool,
) -> Option<FieldRule<'a>> {
    let parts: Vec<&str> = editable_key.split('.').collect();
    let bloc_key = parts[0];
    let item_key = if part_of_bloc { *parts.get(1)? } else { parts[0] };

    match data_type {
        DataType::Text | DataType::Boolean => {
            if part_of_bloc {
                let rule = schema.bloc_rules.get(bloc_key)?;
                rule.text_fields.get(item_key).map(FieldRule::Text)
            } else {
                schema.text_rules.get(item_key).map(FieldRule::Text)
            }
        }
        DataType::Image => {
            if part_of_bloc {
                let rule = schema.bloc_rules.get(bloc_key)?;
                rule.image_fields.get(item_key).map(FieldRule::Asset)
            } else {
                schema.image_rules.get(item_key).map(FieldRule::Asset)
            }
        }
        DataType::Video => {
            if part_of_bloc {
                let rule = schema.bloc_rules.get(bloc_key)?;
                rule.image_fields.get(item_key).map(FieldRule::Asset)
            } else {
                schema.video_rules.get(item_key).map(FieldRule::Asset)
            }
        }
    }
}

/// The repeatable section under `json_key`: `<anchor>.items`, or a bare
/// array when a legacy section holds its rows directly.
pub fn resolve_bloc_items<'a>(doc: &'a Value, json_key: &str) -> Option<&'a Vec<Value>> {
    let anchor = get_value_at_path(doc, json_key)?;
    if let Some(items) = anchor.get("items").and_then(Value::as_array) {
        return Some(items);
    }
    anchor.as_array()
}

/// Storage path of an asset file within its public folder.
///
/// The folder is normalized the way uploads expect: no leading slash, no
/// `img/` prefix, no trailing slash.
pub fn build_asset_path(folder: Option<&str>, file_name: &str) -> String {
    let cleaned = folder
        .unwrap_or_default()
        .trim_start_matches('/')
        .trim_start_matches("img/")
        .trim_start_matches("img")
        .trim_end_matches('/');
    if cleaned.is_empty() {
        file_name.to_string()
    } else {
        format!("{cleaned}/{file_name}")
    }
}

/// Strip a cache-busting query suffix from a file path.
pub fn clean_file_name(file_path: &str) -> &str {
    file_path.split('?').next().unwrap_or(file_path)
}

pub fn infer_mime_type(file_name: &str) -> Option<&'static str> {
    if file_name.ends_with(".png") {
        Some("image/png")
    } else if file_name.ends_with(".jpg") || file_name.ends_with(".jpeg") {
        Some("image/jpeg")
    } else if file_name.ends_with(".ico") {
        Some("image/x-icon")
    } else if file_name.ends_with(".svg") {
        Some("image/svg+xml")
    } else if file_name.ends_with(".webp") {
        Some("image/webp")
    } else {
        None
    }
}
