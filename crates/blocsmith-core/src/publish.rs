//! Publish orchestrator: reconcile view-models into a new document plus
//! file transfer lists.
//!
//! Steps run in a fixed order because each one reads what the previous one
//! wrote: bloc removal must precede the orphan check, duplicable arrays
//! must be fully rebuilt before their bulk orphan check, and order
//! realignment runs once over the final document.

use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Value};
use tracing::{debug, warn};

use blocsmith_doc_path::{
    clean_order_data, get_value_at_path, includes_value_in_scope, remove_bloc_from_json,
    set_value_at_path,
};

use crate::diff::{ModifiedBlocVm, ModifiedContent, ModifiedFieldVm};
use crate::picker::PickerValue;
use crate::resolve::{
    build_asset_path, clean_file_name, infer_mime_type, resolve_bloc_json_path,
    resolve_field_json_path, rule_for_field, FieldRule,
};
use crate::schema::Schema;
use crate::value::{DataType, EditableValue, FileData};

/// One file staged for upload under its storage path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub target_name: String,
    pub file: FileData,
}

/// Everything the transport layer needs for one publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishPayload {
    pub document: Value,
    pub files_to_upload: Vec<FileUpload>,
    pub files_to_delete: Vec<String>,
}

/// Assemble the publish payload from the last-published document and the
/// diff view-models.
pub fn generate_publish_content(
    schema: &Schema,
    last_published: &Value,
    content: &ModifiedContent,
    content_version: Option<&str>,
) -> PublishPayload {
    let mut document = last_published.clone();
    let mut uploads: Vec<FileUpload> = Vec::new();
    let mut deletions: IndexSet<String> = IndexSet::new();

    if let Some(version) = content_version {
        set_value_at_path(&mut document, "contentVersion", json!(version));
    }

    let bloc_fields = process_blocs(schema, &content.blocs, &mut document, &mut deletions);
    process_pickers(&content.pickers, &mut document);

    let mut all_fields: Vec<ModifiedFieldVm> = Vec::new();
    all_fields.extend(content.text_fields.iter().cloned());
    all_fields.extend(content.media_fields.iter().cloned());
    all_fields.extend(bloc_fields);

    let (duplicable_groups, simple_fields) = categorize_fields(schema, all_fields);

    process_duplicable_groups(
        schema,
        duplicable_groups,
        &mut document,
        &mut uploads,
        &mut deletions,
    );
    process_simple_fields(schema, &simple_fields, &mut document, &mut uploads, &mut deletions);

    PublishPayload {
        document: clean_order_data(&document),
        files_to_upload: uploads,
        files_to_delete: deletions.into_iter().collect(),
    }
}

fn push_upload(uploads: &mut Vec<FileUpload>, upload: FileUpload) {
    if uploads.iter().any(|u| u.target_name == upload.target_name) {
        return;
    }
    uploads.push(upload);
}

// ── Step 1: blocs ────────────────────────────────────────────────────

/// Apply bloc-level changes and return the field VMs extracted from bloc
/// VMs, stamped with their bloc's last-published array slot.
fn process_blocs(
    schema: &Schema,
    blocs: &[ModifiedBlocVm],
    document: &mut Value,
    deletions: &mut IndexSet<String>,
) -> Vec<ModifiedFieldVm> {
    let mut extracted: Vec<ModifiedFieldVm> = Vec::new();

    for bloc in blocs {
        let Some(bloc_path) = resolve_bloc_json_path(schema, &bloc.bloc_key, bloc.original_json_index)
        else {
            continue;
        };
        debug!(bloc = %bloc.bloc_key, path = %bloc_path, "processing bloc");

        if bloc.is_deleted {
            delete_bloc(schema, bloc, document, deletions, &bloc_path);
            // the removal covered the whole slot; patching its fields
            // back in would resurrect the null hole
            continue;
        }

        if !bloc.modified_fields.is_empty() {
            for field in bloc.modified_fields.values() {
                let mut field = field.clone();
                field.original_json_index = Some(bloc.original_json_index);
                extracted.push(field);
            }
            if bloc.is_new {
                set_value_at_path(document, &format!("{bloc_path}.order"), json!(bloc.order));
            }
        }

        if bloc.is_reordered {
            set_value_at_path(document, &format!("{bloc_path}.order"), json!(bloc.order));
        }
    }

    extracted
}

/// Remove a deleted bloc from the document. Asset filenames held by its
/// fields are snapshotted before removal and checked for reachability
/// after, so a file shared with another location survives.
fn delete_bloc(
    schema: &Schema,
    bloc: &ModifiedBlocVm,
    document: &mut Value,
    deletions: &mut IndexSet<String>,
    bloc_path: &str,
) {
    let Some(rule) = schema.bloc_rules.get(&bloc.bloc_key) else {
        return;
    };

    let mut assets_to_check: Vec<String> = Vec::new();
    for field_key in &bloc.deleted_fields {
        let Ok(parsed) = crate::key::EditableKey::parse(field_key) else {
            continue;
        };
        let Some(asset_rule) = rule.image_fields.get(&parsed.field_key) else {
            continue;
        };
        let Some(path) = resolve_field_json_path(
            schema,
            field_key,
            DataType::Image,
            Some(bloc.original_json_index),
        ) else {
            continue;
        };
        if let Some(name) = get_value_at_path(document, &path).and_then(Value::as_str) {
            if !name.is_empty() {
                assets_to_check.push(build_asset_path(asset_rule.folder.as_deref(), name));
            }
        }
    }

    remove_bloc_from_json(document, bloc_path);

    for asset_path in assets_to_check {
        if !includes_value_in_scope(document, &asset_path) {
            debug!(asset = %asset_path, "asset orphaned by bloc deletion");
            deletions.insert(clean_file_name(&asset_path).to_string());
        }
    }
}

// ── Step 2: pickers ──────────────────────────────────────────────────

/// Picker components are written as strings, matching the string-typed
/// values the published document already carries.
fn process_pickers(pickers: &[crate::picker::PickerState], document: &mut Value) {
    for picker in pickers {
        if picker.rule.json_key.is_empty() {
            warn!(picker = %picker.picker_key, "picker rule has no document anchor");
            continue;
        }
        let value: &PickerValue = picker.to_publish.as_ref().unwrap_or(&picker.current);
        debug!(picker = %picker.picker_key, "patching picker");

        let anchor = &picker.rule.json_key;
        set_value_at_path(
            document,
            &format!("{anchor}.enabled"),
            json!(value.enabled.to_string()),
        );
        set_value_at_path(
            document,
            &format!("{anchor}.sourceBlocKey"),
            json!(value.source_bloc_key),
        );
        set_value_at_path(
            document,
            &format!("{anchor}.blocIndex"),
            json!(value.bloc_index.to_string()),
        );
    }
}

// ── Step 3: partitioning ─────────────────────────────────────────────

/// Split field VMs into duplicable groups, keyed by the resolved base
/// array path, and plain simple fields.
fn categorize_fields(
    schema: &Schema,
    fields: Vec<ModifiedFieldVm>,
) -> (IndexMap<String, Vec<ModifiedFieldVm>>, Vec<ModifiedFieldVm>) {
    let mut groups: IndexMap<String, Vec<ModifiedFieldVm>> = IndexMap::new();
    let mut simple: Vec<ModifiedFieldVm> = Vec::new();

    for field in fields {
        if field.field_index.is_some() {
            let Some(path) = resolve_field_json_path(
                schema,
                &field.key,
                field.data_type,
                field.original_json_index,
            ) else {
                continue;
            };
            groups.entry(path).or_default().push(field);
        } else {
            simple.push(field);
        }
    }

    (groups, simple)
}

// ── Step 4: duplicable groups ────────────────────────────────────────

fn process_duplicable_groups(
    schema: &Schema,
    groups: IndexMap<String, Vec<ModifiedFieldVm>>,
    document: &mut Value,
    uploads: &mut Vec<FileUpload>,
    deletions: &mut IndexSet<String>,
) {
    let mut assets_to_check: IndexSet<String> = IndexSet::new();

    for (path, group) in groups {
        let first = &group[0];
        let Some(rule) = rule_for_field(schema, &first.key, first.data_type, first.part_of_bloc)
        else {
            continue;
        };
        debug!(path = %path, fields = group.len(), "rebuilding duplicable group");

        let current: Vec<Value> = get_value_at_path(document, &path)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let rebuilt = rebuild_group_array(&group, &current, rule, uploads, &mut assets_to_check);
        set_value_at_path(document, &path, Value::Array(rebuilt));
    }

    // Bulk check after every group is in place: a file referenced by two
    // groups is never prematurely deleted.
    for asset_path in assets_to_check {
        if !includes_value_in_scope(document, &asset_path) {
            debug!(asset = %asset_path, "duplicable asset orphaned");
            deletions.insert(clean_file_name(&asset_path).to_string());
        }
    }
}

/// Overlay every changed index onto the existing array, then re-sort by
/// each entry's order (falling back to its array position) and strip the
/// order carrier, leaving a plain value array. Deleted slots become
/// `null` holes.
fn rebuild_group_array(
    group: &[ModifiedFieldVm],
    current: &[Value],
    rule: FieldRule<'_>,
    uploads: &mut Vec<FileUpload>,
    assets_to_check: &mut IndexSet<String>,
) -> Vec<Value> {
    let mut new_array: Vec<Value> = current.to_vec();

    for field in group {
        let Some(slot) = field.field_index else {
            continue;
        };
        if new_array.len() <= slot {
            new_array.resize(slot + 1, Value::Null);
        }

        if matches!(field.data_type, DataType::Image | DataType::Video) {
            if let Some(old_name) = current.get(slot).and_then(Value::as_str) {
                if !old_name.is_empty() {
                    assets_to_check.insert(build_asset_path(rule.folder(), old_name));
                }
            }
        }

        if field.is_deleted {
            new_array[slot] = Value::Null;
            continue;
        }

        match &field.value {
            EditableValue::Image(entry) | EditableValue::Video(entry) => {
                if let Some(file) = &entry.file {
                    new_array[slot] = json!(file.name);
                    push_upload(
                        uploads,
                        FileUpload {
                            target_name: build_asset_path(rule.folder(), &file.name),
                            file: file.clone(),
                        },
                    );
                }
            }
            EditableValue::Text(text) => new_array[slot] = json!(text),
            EditableValue::Boolean(flag) => new_array[slot] = json!(flag),
        }
    }

    let mut carriers: Vec<(i64, Value)> = new_array
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            let order = group
                .iter()
                .find(|f| f.field_index == Some(idx))
                .and_then(|f| f.order)
                .unwrap_or(idx as i64 + 1);
            (order, value)
        })
        .collect();
    carriers.sort_by_key(|(order, _)| *order);
    carriers.into_iter().map(|(_, value)| value).collect()
}

// ── Step 5: simple fields ────────────────────────────────────────────

fn process_simple_fields(
    schema: &Schema,
    fields: &[ModifiedFieldVm],
    document: &mut Value,
    uploads: &mut Vec<FileUpload>,
    deletions: &mut IndexSet<String>,
) {
    for field in fields {
        // Non-duplicable tombstones carry no target slot to clear; the
        // document keeps its value until the owning bloc goes away.
        if field.is_deleted {
            continue;
        }

        // Generated icons bypass rule lookup and path resolution; their
        // dotted keys never appear in the schema.
        if field.key.starts_with("icon_") {
            if let Some(entry) = field.value.as_asset() {
                stage_icon_file(&field.key, entry.file.as_ref(), uploads);
            }
            continue;
        }

        let Some(rule) = rule_for_field(schema, &field.key, field.data_type, field.part_of_bloc)
        else {
            continue;
        };
        debug!(key = %field.key, "patching simple field");

        match (&field.value, rule) {
            (EditableValue::Text(text), FieldRule::Text(text_rule)) => {
                apply_scalar_value(schema, field, &text_rule.key, json!(text), document);
            }
            (EditableValue::Boolean(flag), FieldRule::Text(text_rule)) => {
                apply_scalar_value(schema, field, &text_rule.key, json!(flag), document);
            }
            (EditableValue::Image(entry) | EditableValue::Video(entry), FieldRule::Asset(rule)) => {
                patch_asset_field(schema, field, entry, rule, document, uploads, deletions);
            }
            _ => {}
        }
    }
}

/// Standalone scalars patch at the rule's own document path; bloc scalars
/// resolve through the bloc anchor and the last-published slot.
fn apply_scalar_value(
    schema: &Schema,
    field: &ModifiedFieldVm,
    rule_key: &str,
    value: Value,
    document: &mut Value,
) {
    let path = if field.part_of_bloc {
        let Some(path) = resolve_field_json_path(
            schema,
            &field.key,
            DataType::Text,
            field.original_json_index,
        ) else {
            return;
        };
        path
    } else {
        rule_key.to_string()
    };
    set_value_at_path(document, &path, value);
}

fn patch_asset_field(
    schema: &Schema,
    field: &ModifiedFieldVm,
    entry: &crate::value::AssetEntry,
    rule: &crate::schema::AssetRule,
    document: &mut Value,
    uploads: &mut Vec<FileUpload>,
    deletions: &mut IndexSet<String>,
) {
    let Some(file) = &entry.file else {
        return;
    };

    let old_path = build_asset_path(rule.folder.as_deref(), entry.remote_url.as_deref().unwrap_or(""));
    let old_name = old_path.rsplit('/').next().unwrap_or("").to_string();

    // Bloc assets store the new filename in the document; standalone
    // assets keep their canonical rule name and only the bytes change.
    let new_name = if field.part_of_bloc {
        let Some(path) = resolve_field_json_path(
            schema,
            &field.key,
            DataType::Image,
            field.original_json_index,
        ) else {
            return;
        };
        set_value_at_path(document, &path, json!(file.name));
        file.name.clone()
    } else {
        rule.name.clone()
    };

    push_upload(
        uploads,
        FileUpload {
            target_name: build_asset_path(rule.folder.as_deref(), &new_name),
            file: file.clone(),
        },
    );

    // Old filename is checked after the new one is in place, so a rename
    // back and forth never deletes a live file.
    if !old_name.is_empty() && old_name != new_name {
        let old_asset_path = build_asset_path(rule.folder.as_deref(), &old_name);
        if !includes_value_in_scope(document, &old_asset_path) {
            debug!(asset = %old_asset_path, "replaced asset orphaned");
            deletions.insert(clean_file_name(&old_asset_path).to_string());
        }
    }
}

/// Generated icons have no document-path home: the raw bytes are staged
/// under a fixed `icons/<name>` target derived from the key.
fn stage_icon_file(key: &str, file: Option<&FileData>, uploads: &mut Vec<FileUpload>) {
    let Some(file) = file else {
        return;
    };
    let file_name = key.trim_start_matches("icon_");
    let mime = file
        .mime
        .clone()
        .or_else(|| infer_mime_type(file_name).map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    push_upload(
        uploads,
        FileUpload {
            target_name: format!("icons/{file_name}"),
            file: FileData::new(file_name, Some(mime), file.bytes.clone()),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::picker::PickerState;
    use crate::schema::PickerRule;
    use crate::value::AssetEntry;

    fn schema() -> Schema {
        serde_json::from_value(json!({
            "text_rules": {"CONTACT_MAIL": {"key": "contact.mail"}},
            "image_rules": {"HERO": {"name": "hero.jpg", "folder": "home"}},
            "bloc_rules": {
                "SERVICES_BLOC": {
                    "bloc_title": "Services",
                    "json_key": "services",
                    "text_fields": {
                        "TITLE": {"key": "title"},
                        "DESC": {"key": "desc", "is_duplicable": true}
                    },
                    "image_fields": {"PHOTO": {"name": "photo", "folder": "services"}}
                }
            },
            "picker_rules": {"HOME_ANNOUNCEMENT": {"json_key": "home.announcement"}}
        }))
        .unwrap()
    }

    fn text_vm(key: &str, value: &str) -> ModifiedFieldVm {
        ModifiedFieldVm {
            key: key.to_string(),
            value: EditableValue::Text(value.to_string()),
            data_type: DataType::Text,
            label: key.to_string(),
            part_of_bloc: false,
            bloc_key: None,
            index: None,
            original_json_index: None,
            order: None,
            field_index: None,
            is_new: false,
            is_deleted: false,
            reordered: false,
        }
    }

    #[test]
    fn simple_text_field_patches_rule_path() {
        let doc = json!({"contact": {"mail": "old@x.fr"}});
        let content = ModifiedContent {
            text_fields: vec![text_vm("CONTACT_MAIL", "new@x.fr")],
            ..ModifiedContent::default()
        };
        let payload = generate_publish_content(&schema(), &doc, &content, Some("v2"));

        assert_eq!(payload.document["contact"]["mail"], json!("new@x.fr"));
        assert_eq!(payload.document["contentVersion"], json!("v2"));
        assert!(payload.files_to_upload.is_empty());
        assert!(payload.files_to_delete.is_empty());
    }

    #[test]
    fn picker_components_are_written_as_strings() {
        let doc = json!({"home": {}});
        let mut picker = PickerState::new(
            "HOME_ANNOUNCEMENT",
            PickerRule {
                json_key: "home.announcement".into(),
                ..PickerRule::default()
            },
            PickerValue::default(),
        );
        picker.to_publish = Some(PickerValue {
            enabled: true,
            source_bloc_key: "ANNONCE_BLOC".into(),
            bloc_index: 2,
        });
        let content = ModifiedContent {
            pickers: vec![picker],
            ..ModifiedContent::default()
        };
        let payload = generate_publish_content(&schema(), &doc, &content, None);

        let announcement = &payload.document["home"]["announcement"];
        assert_eq!(announcement["enabled"], json!("true"));
        assert_eq!(announcement["sourceBlocKey"], json!("ANNONCE_BLOC"));
        assert_eq!(announcement["blocIndex"], json!("2"));
    }

    #[test]
    fn deleted_bloc_keeps_shared_asset() {
        // photo "a.jpg" also referenced by the second item: no deletion.
        let doc = json!({"services": {"items": [
            {"order": 1, "title": "one", "photo": "a.jpg"},
            {"order": 2, "title": "two", "photo": "a.jpg"}
        ]}});
        let bloc = ModifiedBlocVm {
            bloc_key: "SERVICES_BLOC".into(),
            bloc_title: "Item".into(),
            index: 0,
            original_json_index: 0,
            modified_fields: IndexMap::new(),
            deleted_fields: vec!["SERVICES_BLOC.PHOTO.0".into()],
            is_new: false,
            is_deleted: true,
            is_reordered: false,
            order: 1,
        };
        let content = ModifiedContent {
            blocs: vec![bloc],
            ..ModifiedContent::default()
        };
        let payload = generate_publish_content(&schema(), &doc, &content, None);

        assert!(payload.files_to_delete.is_empty());
        // removal left a null hole, realignment kept the survivor at order 1
        let items = payload.document["services"]["items"].as_array().unwrap();
        assert!(items[0].is_null());
        assert_eq!(items[1]["order"], json!(1));
    }

    #[test]
    fn deleted_bloc_orphans_unshared_asset() {
        let doc = json!({"services": {"items": [
            {"order": 1, "title": "one", "photo": "only.jpg"}
        ]}});
        let bloc = ModifiedBlocVm {
            bloc_key: "SERVICES_BLOC".into(),
            bloc_title: "Item".into(),
            index: 0,
            original_json_index: 0,
            modified_fields: IndexMap::new(),
            deleted_fields: vec![
                "SERVICES_BLOC.PHOTO.0".into(),
                "SERVICES_BLOC.TITLE.0".into(),
            ],
            is_new: false,
            is_deleted: true,
            is_reordered: false,
            order: 1,
        };
        let content = ModifiedContent {
            blocs: vec![bloc],
            ..ModifiedContent::default()
        };
        let payload = generate_publish_content(&schema(), &doc, &content, None);

        assert_eq!(payload.files_to_delete, vec!["services/only.jpg"]);
    }

    #[test]
    fn duplicable_group_rebuilds_ordered_array() {
        let doc = json!({"services": {"items": [{"order": 1, "desc": ["a", "b"]}]}});
        let mut edit = text_vm("SERVICES_BLOC.DESC.0.1", "b2");
        edit.part_of_bloc = true;
        edit.bloc_key = Some("SERVICES_BLOC".into());
        edit.field_index = Some(1);
        edit.order = Some(1);
        let mut added = text_vm("SERVICES_BLOC.DESC.0.2", "c");
        added.part_of_bloc = true;
        added.bloc_key = Some("SERVICES_BLOC".into());
        added.field_index = Some(2);
        added.order = Some(2);
        added.is_new = true;

        let bloc = ModifiedBlocVm {
            bloc_key: "SERVICES_BLOC".into(),
            bloc_title: "Item".into(),
            index: 0,
            original_json_index: 0,
            modified_fields: IndexMap::from([
                ("SERVICES_BLOC.DESC.0.1".to_string(), edit),
                ("SERVICES_BLOC.DESC.0.2".to_string(), added),
            ]),
            deleted_fields: Vec::new(),
            is_new: false,
            is_deleted: false,
            is_reordered: false,
            order: 1,
        };
        let content = ModifiedContent {
            blocs: vec![bloc],
            ..ModifiedContent::default()
        };
        let payload = generate_publish_content(&schema(), &doc, &content, None);

        // "b2" took order 1, "c" order 2, untouched "a" fell back to its
        // array position (order 1, stable after "b2").
        assert_eq!(
            payload.document["services"]["items"][0]["desc"],
            json!(["a", "b2", "c"])
        );
    }

    #[test]
    fn replaced_standalone_image_keeps_canonical_name() {
        let doc = json!({"hero": "hero.jpg"});
        let mut vm = text_vm("HERO", "");
        vm.data_type = DataType::Image;
        vm.value = EditableValue::Image(AssetEntry {
            file: Some(FileData::new("fresh.png", Some("image/png".into()), vec![1, 2])),
            preview_url: None,
            remote_url: Some("hero.jpg".into()),
        });
        let content = ModifiedContent {
            media_fields: vec![vm],
            ..ModifiedContent::default()
        };
        let payload = generate_publish_content(&schema(), &doc, &content, None);

        // upload targets the rule's fixed name; no old-name deletion since
        // the canonical name did not change
        assert_eq!(payload.files_to_upload.len(), 1);
        assert_eq!(payload.files_to_upload[0].target_name, "home/hero.jpg");
        assert!(payload.files_to_delete.is_empty());
    }

    #[test]
    fn icon_fields_stage_bytes_under_fixed_target() {
        let doc = json!({});
        let mut vm = text_vm("icon_favicon-32x32.png", "");
        vm.data_type = DataType::Image;
        vm.value = EditableValue::Image(AssetEntry {
            file: Some(FileData::new("generated.png", None, vec![9])),
            preview_url: None,
            remote_url: None,
        });
        let content = ModifiedContent {
            media_fields: vec![vm],
            ..ModifiedContent::default()
        };
        let payload = generate_publish_content(&schema(), &doc, &content, None);

        assert_eq!(payload.files_to_upload.len(), 1);
        let upload = &payload.files_to_upload[0];
        assert_eq!(upload.target_name, "icons/favicon-32x32.png");
        assert_eq!(upload.file.name, "favicon-32x32.png");
        assert_eq!(upload.file.mime.as_deref(), Some("image/png"));
    }

    #[test]
    fn uploads_are_deduplicated_by_target_name() {
        let mut uploads = Vec::new();
        let file = FileData::new("a.jpg", None, vec![1]);
        push_upload(&mut uploads, FileUpload { target_name: "x/a.jpg".into(), file: file.clone() });
        push_upload(&mut uploads, FileUpload { target_name: "x/a.jpg".into(), file });
        assert_eq!(uploads.len(), 1);
    }
}
