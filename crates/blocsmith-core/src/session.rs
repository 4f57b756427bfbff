//! Composition root: owns the three stores, the schema and the
//! last-published document, and exposes every editing operation.
//!
//! Mutating operations end with a field-store `flush()`, so several
//! related mutations inside one call deliver a single notification round
//! carrying the final state.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use blocsmith_doc_path::get_value_at_path;

use crate::bloc::{BlocGroup, BlocInstance};
use crate::diff::{build_modified_content, ModifiedContent};
use crate::error::SessionError;
use crate::field::{EditableField, FieldOptions};
use crate::key::EditableKey;
use crate::picker::{PickerState, PickerValue};
use crate::publish::{generate_publish_content, PublishPayload};
use crate::resolve::{build_asset_path, resolve_bloc_items};
use crate::rollback::rollback_all;
use crate::schema::Schema;
use crate::store::{BlocOrderUpdate, BlocStore, FieldStore, PickerStore};
use crate::value::{AssetEntry, DataType, EditableValue};

/// One entry of a field reorder batch.
#[derive(Debug, Clone)]
pub struct FieldOrderUpdate {
    pub key: String,
    pub bloc_key: String,
    pub index: usize,
    pub order: i64,
}

pub struct EditSession {
    schema: Schema,
    document: Value,
    fields: FieldStore,
    blocs: BlocStore,
    pickers: PickerStore,
}

impl EditSession {
    /// Initialize every store from the schema and the last-published
    /// document.
    pub fn new(schema: Schema, document: Value) -> Self {
        let mut session = Self {
            schema,
            document,
            fields: FieldStore::new(),
            blocs: BlocStore::new(),
            pickers: PickerStore::new(),
        };
        session.init_standalone_fields();
        session.init_blocs();
        session.init_pickers();
        session.fields.flush();
        session
    }

    // ── Store access ─────────────────────────────────────────────────

    pub fn fields(&self) -> &FieldStore {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldStore {
        &mut self.fields
    }

    pub fn blocs(&self) -> &BlocStore {
        &self.blocs
    }

    pub fn blocs_mut(&mut self) -> &mut BlocStore {
        &mut self.blocs
    }

    pub fn pickers(&self) -> &PickerStore {
        &self.pickers
    }

    pub fn pickers_mut(&mut self) -> &mut PickerStore {
        &mut self.pickers
    }

    /// The last-published document this session was initialized from (or
    /// last collapsed to).
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    // ── Initialization ───────────────────────────────────────────────

    fn init_standalone_fields(&mut self) {
        for (key, rule) in &self.schema.text_rules {
            match get_value_at_path(&self.document, &rule.key).and_then(Value::as_str) {
                Some(text) => {
                    let field = EditableField::new(
                        key,
                        EditableValue::Text(text.to_string()),
                        FieldOptions {
                            label: rule.label.clone(),
                            associated_route: rule.route.clone(),
                            ..FieldOptions::default()
                        },
                        None,
                    );
                    self.fields.set(key.clone(), field);
                }
                None => warn!(key = %key, path = %rule.key, "text field missing from document"),
            }
        }

        let asset_sets = [
            (&self.schema.image_rules, DataType::Image),
            (&self.schema.video_rules, DataType::Video),
        ];
        let mut staged: Vec<(String, EditableField)> = Vec::new();
        for (rules, data_type) in asset_sets {
            for (key, rule) in rules {
                if rule.name.is_empty() {
                    continue;
                }
                let entry = AssetEntry::remote(
                    rule.name.clone(),
                    build_asset_path(rule.folder.as_deref(), &rule.name),
                );
                let value = match data_type {
                    DataType::Video => EditableValue::Video(entry),
                    _ => EditableValue::Image(entry),
                };
                staged.push((
                    key.clone(),
                    EditableField::new(
                        key,
                        value,
                        FieldOptions {
                            label: rule.label.clone(),
                            associated_route: rule.route.clone(),
                            ..FieldOptions::default()
                        },
                        None,
                    ),
                ));
            }
        }
        for (key, field) in staged {
            self.fields.set(key, field);
        }
    }

    fn init_blocs(&mut self) {
        let bloc_rules = self.schema.bloc_rules.clone();
        for (bloc_key, rule) in bloc_rules {
            let Some(items) = resolve_bloc_items(&self.document, &rule.json_key) else {
                continue;
            };
            let items = items.clone();
            let mut group = BlocGroup::new(bloc_key.clone(), rule.clone());

            // Instances are presented sorted by their `order`, while the
            // original array slot stays recorded for publish targeting.
            let mut enriched: Vec<(usize, Value)> = items.into_iter().enumerate().collect();
            enriched.sort_by_key(|(_, item)| {
                item.get("order").and_then(Value::as_i64).unwrap_or(0)
            });

            for (index, (original_json_index, item)) in enriched.into_iter().enumerate() {
                let mut field_keys: Vec<String> = Vec::new();
                let mut field_orders: IndexMap<String, i64> = IndexMap::new();

                for (field_key, text_rule) in &rule.text_fields {
                    let value = item.get(&text_rule.key);
                    if text_rule.is_duplicable {
                        let Some(entries) = value.and_then(Value::as_array) else {
                            continue;
                        };
                        for (field_index, entry) in entries.iter().enumerate() {
                            let composite =
                                EditableKey::build(&bloc_key, field_key, index, Some(field_index));
                            let order = field_index as i64 + 1;
                            field_keys.push(composite.clone());
                            field_orders.insert(composite.clone(), order);
                            self.fields.set(
                                composite.clone(),
                                EditableField::new(
                                    &composite,
                                    EditableValue::Text(
                                        entry.as_str().unwrap_or_default().to_string(),
                                    ),
                                    FieldOptions {
                                        label: text_rule.label.clone(),
                                        part_of_bloc: true,
                                        bloc_key: Some(bloc_key.clone()),
                                        associated_route: text_rule.route.clone(),
                                        field_index: Some(field_index),
                                        ..FieldOptions::default()
                                    },
                                    Some(order),
                                ),
                            );
                        }
                    } else if let Some(text) = value.and_then(Value::as_str) {
                        if text.trim().is_empty() {
                            continue;
                        }
                        let composite = EditableKey::build(&bloc_key, field_key, index, None);
                        field_keys.push(composite.clone());
                        self.fields.set(
                            composite.clone(),
                            EditableField::new(
                                &composite,
                                EditableValue::Text(text.to_string()),
                                FieldOptions {
                                    label: text_rule.label.clone(),
                                    part_of_bloc: true,
                                    bloc_key: Some(bloc_key.clone()),
                                    associated_route: text_rule.route.clone(),
                                    ..FieldOptions::default()
                                },
                                None,
                            ),
                        );
                    }
                }

                for (field_key, asset_rule) in &rule.image_fields {
                    let value = item.get(&asset_rule.name);
                    if asset_rule.is_duplicable {
                        let Some(entries) = value.and_then(Value::as_array) else {
                            continue;
                        };
                        for (field_index, entry) in entries.iter().enumerate() {
                            let Some(name) = entry.as_str() else {
                                continue;
                            };
                            let composite =
                                EditableKey::build(&bloc_key, field_key, index, Some(field_index));
                            let order = field_index as i64 + 1;
                            field_keys.push(composite.clone());
                            field_orders.insert(composite.clone(), order);
                            self.fields.set(
                                composite.clone(),
                                EditableField::new(
                                    &composite,
                                    EditableValue::Image(AssetEntry::remote(
                                        name,
                                        build_asset_path(asset_rule.folder.as_deref(), name),
                                    )),
                                    FieldOptions {
                                        label: asset_rule.label.clone(),
                                        part_of_bloc: true,
                                        bloc_key: Some(bloc_key.clone()),
                                        associated_route: asset_rule.route.clone(),
                                        field_index: Some(field_index),
                                        ..FieldOptions::default()
                                    },
                                    Some(order),
                                ),
                            );
                        }
                    } else {
                        let composite = EditableKey::build(&bloc_key, field_key, index, None);
                        let entry = match value.and_then(Value::as_str) {
                            Some(name) => AssetEntry::remote(
                                name,
                                build_asset_path(asset_rule.folder.as_deref(), name),
                            ),
                            None => AssetEntry::empty(),
                        };
                        field_keys.push(composite.clone());
                        self.fields.set(
                            composite.clone(),
                            EditableField::new(
                                &composite,
                                EditableValue::Image(entry),
                                FieldOptions {
                                    label: asset_rule.label.clone(),
                                    part_of_bloc: true,
                                    bloc_key: Some(bloc_key.clone()),
                                    associated_route: asset_rule.route.clone(),
                                    ..FieldOptions::default()
                                },
                                None,
                            ),
                        );
                    }
                }

                let order = item.get("order").and_then(Value::as_i64);
                group.instances.insert(
                    index,
                    BlocInstance::new(
                        bloc_key.clone(),
                        index,
                        original_json_index,
                        field_keys,
                        order,
                        false,
                        field_orders,
                    ),
                );
            }

            self.blocs.set_group(group);
        }
    }

    fn init_pickers(&mut self) {
        let picker_rules = self.schema.picker_rules.clone();
        for (picker_key, rule) in picker_rules {
            let initial = get_value_at_path(&self.document, &rule.json_key)
                .and_then(PickerValue::from_document)
                .unwrap_or_default();
            self.pickers
                .set(picker_key.clone(), PickerState::new(picker_key, rule, initial));
        }
    }

    // ── Field operations ─────────────────────────────────────────────

    /// Apply an operator edit. A valid value updates both `current` and
    /// `to_publish`; an invalid one only updates `current` and flags the
    /// field, never contaminating the publish payload.
    pub fn set_editable_value(
        &mut self,
        key: &str,
        value: EditableValue,
        is_valid: bool,
    ) -> Result<(), SessionError> {
        if self.fields.get(key).is_none() {
            return Err(SessionError::UnknownField(key.to_string()));
        }

        // Resetting the favicon discards the icon set generated from it.
        if key.to_uppercase().contains("FAVICON") {
            if let Some(entry) = value.as_asset() {
                if entry.file.is_none() {
                    let icon_keys = self.fields.keys_matching(|k| k.starts_with("icon_"));
                    if !icon_keys.is_empty() {
                        debug!(count = icon_keys.len(), "favicon reset drops generated icons");
                        self.fields.delete(&icon_keys);
                    }
                }
            }
        }

        self.fields.update(key, |prev| {
            let mut next = prev.clone();
            next.current.value = value.clone();
            next.in_error = !is_valid;
            if is_valid {
                let mut pending = next.to_publish.clone().unwrap_or_default();
                pending.value = Some(value.clone());
                next.to_publish = Some(pending);
            }
            next
        });
        self.fields.flush();
        Ok(())
    }

    /// Create a fresh field, typically for a new bloc instance or a
    /// generated icon. Without an explicit value the type's empty default
    /// is used.
    pub fn create_field(
        &mut self,
        key: &str,
        data_type: DataType,
        options: FieldOptions,
        value: Option<EditableValue>,
        order: Option<i64>,
    ) -> Result<(), SessionError> {
        let value = match value {
            Some(value) => value,
            None => default_value(data_type)?,
        };
        debug!(key = %key, "field created");
        self.fields
            .set(key.to_string(), EditableField::new(key, value, options, order));
        self.fields.flush();
        Ok(())
    }

    /// Delete a field: session-created fields vanish, published ones are
    /// tombstoned until the next publish. Bloc-owned keys are detached
    /// from their instance either way.
    pub fn delete_field(&mut self, key: &str) -> Result<(), SessionError> {
        let Some(field) = self.fields.get(key) else {
            return Err(SessionError::UnknownField(key.to_string()));
        };

        if field.is_new {
            self.fields.delete(&[key.to_string()]);
        } else {
            self.fields.update(key, |prev| {
                let mut next = prev.clone();
                next.is_deleted = true;
                next
            });
        }

        if let Ok(parsed) = EditableKey::parse(key) {
            self.blocs.detach_field_key(&parsed.bloc_key, parsed.index, key);
        }
        self.fields.flush();
        Ok(())
    }

    /// Add one more instance of a duplicable sub-field next to
    /// `target_key`, at the next free field index. Returns the new key.
    pub fn add_duplicable_field(
        &mut self,
        target_key: &str,
        order: i64,
    ) -> Result<String, SessionError> {
        let parsed = EditableKey::parse(target_key)?;
        let Some(target) = self.fields.get(target_key).cloned() else {
            return Err(SessionError::UnknownField(target_key.to_string()));
        };

        let siblings = self.fields.keys_matching(|key| {
            EditableKey::parse(key).is_ok_and(|other| {
                other.bloc_key == parsed.bloc_key
                    && other.field_key == parsed.field_key
                    && other.index == parsed.index
            })
        });
        let next_index = siblings
            .iter()
            .filter_map(|key| EditableKey::parse(key).ok().and_then(|k| k.field_index))
            .max()
            .map_or(0, |max| max + 1);

        let new_key =
            EditableKey::build(&parsed.bloc_key, &parsed.field_key, parsed.index, Some(next_index));
        debug!(key = %new_key, "duplicable field added");

        self.blocs
            .attach_field_key(&parsed.bloc_key, parsed.index, &new_key, Some(order));

        let options = FieldOptions {
            label: Some(target.label.clone()),
            part_of_bloc: true,
            bloc_key: Some(parsed.bloc_key.clone()),
            associated_route: target.associated_route.clone(),
            field_index: Some(next_index),
            is_generated: false,
            is_new: true,
            // a blank text entry is not yet publishable; an image slot is
            in_error: target.data_type != DataType::Image,
        };
        self.create_field(&new_key, target.data_type, options, None, Some(order))?;
        Ok(new_key)
    }

    /// Apply a field reorder batch and mirror the orders onto the owning
    /// bloc instances.
    pub fn update_field_orders(&mut self, updates: &[FieldOrderUpdate]) {
        let mut by_instance: IndexMap<(String, usize), Vec<(String, i64)>> = IndexMap::new();

        for update in updates {
            self.fields.update(&update.key, |prev| {
                let mut next = prev.clone();
                next.current.order = Some(update.order);
                let mut pending = next.to_publish.clone().unwrap_or_default();
                pending.order = Some(update.order);
                next.to_publish = Some(pending);
                next
            });
            by_instance
                .entry((update.bloc_key.clone(), update.index))
                .or_default()
                .push((update.key.clone(), update.order));
        }

        for ((bloc_key, index), orders) in by_instance {
            self.blocs.update_field_orders(&bloc_key, index, &orders);
        }
        self.fields.flush();
    }

    // ── Bloc operations ──────────────────────────────────────────────

    pub fn add_bloc_instance(
        &mut self,
        bloc_key: &str,
        index: usize,
        field_keys: Vec<String>,
        order: i64,
    ) -> Result<(), SessionError> {
        if self.blocs.group(bloc_key).is_none() {
            return Err(SessionError::UnknownBlocGroup(bloc_key.to_string()));
        }
        debug!(bloc_key, index, order, "bloc instance added");
        self.blocs.set_instance(
            bloc_key,
            BlocInstance::new(bloc_key, index, index, field_keys, Some(order), true, IndexMap::new()),
        );
        Ok(())
    }

    /// Delete a bloc instance: session-created instances vanish, published
    /// ones are tombstoned. The instance's fields follow the same rule.
    pub fn delete_bloc(
        &mut self,
        bloc_key: &str,
        index: usize,
        item_keys: &[String],
    ) -> Result<(), SessionError> {
        let Some(instance) = self.blocs.instance(bloc_key, index) else {
            return Err(SessionError::UnknownBlocInstance {
                bloc_key: bloc_key.to_string(),
                index,
            });
        };

        if instance.is_new {
            self.blocs.delete_instance(bloc_key, index);
        } else {
            self.blocs.mark_instance_deleted(bloc_key, index);
        }

        for item_key in item_keys {
            let full_key = EditableKey::build(bloc_key, item_key, index, None);
            let Some(field) = self.fields.get(&full_key) else {
                continue;
            };
            if field.is_new {
                self.fields.delete(&[full_key]);
            } else {
                self.fields.update(&full_key, |prev| {
                    let mut next = prev.clone();
                    next.is_deleted = true;
                    next
                });
            }
        }
        self.fields.flush();
        Ok(())
    }

    pub fn update_bloc_orders(&mut self, updates: &[BlocOrderUpdate]) {
        self.blocs.update_bloc_orders(updates);
    }

    /// Recompute an instance's error flag from its fields' flags.
    pub fn sync_bloc_error(&mut self, bloc_key: &str, index: usize) {
        let any_in_error = self
            .fields
            .all()
            .iter()
            .any(|(key, field)| {
                field.in_error
                    && EditableKey::parse(key)
                        .is_ok_and(|k| k.bloc_key == bloc_key && k.index == index)
            });
        self.blocs.set_instance_error(bloc_key, index, any_in_error);
    }

    // ── Picker operations ────────────────────────────────────────────

    pub fn set_picker_value(&mut self, key: &str, value: PickerValue) -> Result<(), SessionError> {
        if self.pickers.get(key).is_none() {
            return Err(SessionError::UnknownPicker(key.to_string()));
        }
        self.pickers.update(key, |prev| {
            let mut next = prev.clone();
            next.current = value.clone();
            next.to_publish = Some(value.clone());
            next
        });
        Ok(())
    }

    // ── Snapshot queries ─────────────────────────────────────────────

    /// Standalone fields whose key starts with `prefix`, for the static
    /// settings pages.
    pub fn standalone_fields_with_prefix(&self, prefix: &str) -> IndexMap<String, EditableField> {
        self.fields
            .all()
            .iter()
            .filter(|(key, field)| key.starts_with(prefix) && !field.part_of_bloc)
            .map(|(key, field)| (key.clone(), field.clone()))
            .collect()
    }

    /// Fields of one route, with fields of deleted bloc instances
    /// filtered out.
    pub fn fields_for_route(&self, route: &str) -> IndexMap<String, EditableField> {
        self.fields
            .fields_for_route(route)
            .into_iter()
            .filter(|(key, field)| {
                if !field.part_of_bloc {
                    return true;
                }
                let Some(bloc_key) = field.bloc_key.as_deref() else {
                    return false;
                };
                let Ok(parsed) = EditableKey::parse(key) else {
                    return false;
                };
                self.blocs
                    .instance(bloc_key, parsed.index)
                    .is_some_and(|instance| !instance.is_deleted)
            })
            .collect()
    }

    pub fn title_fields_for_blocs(&self, allowed: &[String]) -> IndexMap<String, EditableField> {
        self.fields.title_fields_for_blocs(allowed)
    }

    // ── Publish & rollback ───────────────────────────────────────────

    pub fn modified_content(&self) -> ModifiedContent {
        build_modified_content(&self.fields, &self.blocs, &self.pickers, &self.schema)
    }

    pub fn has_unpublished_changes(&self) -> bool {
        self.modified_content().has_changes()
    }

    /// Assemble the full publish payload from the current diff.
    pub fn generate_publish_content(&self, content_version: Option<&str>) -> PublishPayload {
        let content = self.modified_content();
        generate_publish_content(&self.schema, &self.document, &content, content_version)
    }

    /// Collapse the stores after a successful publish: pending state
    /// becomes the new `initial`, tombstones are dropped, and the session
    /// now tracks `published_document` as its baseline.
    pub fn apply_publish_success(&mut self, published_document: Value) {
        self.document = published_document;

        let keys: Vec<String> = self.fields.all().keys().cloned().collect();
        let mut to_drop: Vec<String> = Vec::new();
        for key in keys {
            let Some(field) = self.fields.get(&key) else {
                continue;
            };
            if field.is_deleted {
                to_drop.push(key);
                continue;
            }
            self.fields.update(&key, |prev| {
                let mut next = prev.clone();
                let mut settled = next.current.clone();
                if let Some(pending) = &next.to_publish {
                    if let Some(value) = &pending.value {
                        settled.value = value.clone();
                    }
                    if pending.order.is_some() {
                        settled.order = pending.order;
                    }
                }
                next.initial = settled.clone();
                next.current = settled;
                next.to_publish = None;
                next.is_new = false;
                next.is_deleted = false;
                next
            });
        }
        if !to_drop.is_empty() {
            self.fields.delete(&to_drop);
        }

        let instances: Vec<(String, usize, bool)> = self
            .blocs
            .groups()
            .values()
            .flat_map(|group| {
                group
                    .instances
                    .values()
                    .map(|i| (i.bloc_key.clone(), i.index, i.is_deleted))
            })
            .collect();
        for (bloc_key, index, is_deleted) in instances {
            if is_deleted {
                self.blocs.delete_instance(&bloc_key, index);
                continue;
            }
            self.blocs.update_instance(&bloc_key, index, |prev| {
                let mut next = prev.clone();
                let mut settled = next.current;
                if let Some(pending) = next.to_publish {
                    if pending.order.is_some() {
                        settled.order = pending.order;
                    }
                }
                next.initial = settled;
                next.current = settled;
                next.to_publish = None;
                next.is_new = false;
                next
            });
        }

        let picker_keys: Vec<String> = self.pickers.all().keys().cloned().collect();
        for key in picker_keys {
            self.pickers.update(&key, |prev| {
                let mut next = prev.clone();
                next.initial = next.current.clone();
                next.to_publish = None;
                next
            });
        }

        self.fields.flush();
    }

    /// Discard every unpublished edit across all three stores.
    pub fn rollback_to_initial(&mut self) {
        debug!("rollback to initial");
        rollback_all(&mut self.fields, &mut self.blocs, &mut self.pickers);
        self.fields.flush();
    }
}

fn default_value(data_type: DataType) -> Result<EditableValue, SessionError> {
    match data_type {
        DataType::Text => Ok(EditableValue::Text(String::new())),
        DataType::Image => Ok(EditableValue::Image(AssetEntry::empty())),
        DataType::Video => Ok(EditableValue::Video(AssetEntry::empty())),
        DataType::Boolean => Err(SessionError::NoDefaultValue(DataType::Boolean)),
    }
}
