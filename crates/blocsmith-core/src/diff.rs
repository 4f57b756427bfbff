//! Pure projection of store state into publish-ready view-models.
//!
//! Re-callable without side effects: the builder reads the stores and the
//! schema and mutates nothing, so listeners can simply rebuild on every
//! notification.

use indexmap::IndexMap;
use tracing::debug;

use crate::bloc::BlocInstance;
use crate::field::EditableField;
use crate::key::EditableKey;
use crate::picker::PickerState;
use crate::schema::Schema;
use crate::store::{BlocStore, FieldStore, PickerStore};
use crate::value::{DataType, EditableValue};

/// One modified/created/deleted field, flattened for transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedFieldVm {
    pub key: String,
    pub value: EditableValue,
    pub data_type: DataType,
    pub label: String,
    pub part_of_bloc: bool,
    pub bloc_key: Option<String>,
    pub index: Option<usize>,
    pub original_json_index: Option<usize>,
    pub order: Option<i64>,
    pub field_index: Option<usize>,
    pub is_new: bool,
    pub is_deleted: bool,
    pub reordered: bool,
}

/// One bloc instance with everything the publish pass needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedBlocVm {
    pub bloc_key: String,
    pub bloc_title: String,
    pub index: usize,
    pub original_json_index: usize,
    pub modified_fields: IndexMap<String, ModifiedFieldVm>,
    /// Field-key snapshot of a deleted instance, kept for file cleanup.
    pub deleted_fields: Vec<String>,
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_reordered: bool,
    pub order: i64,
}

/// Full diff of the session, ready for the publish orchestrator.
#[derive(Debug, Default, Clone)]
pub struct ModifiedContent {
    pub text_fields: Vec<ModifiedFieldVm>,
    pub media_fields: Vec<ModifiedFieldVm>,
    pub blocs: Vec<ModifiedBlocVm>,
    pub pickers: Vec<PickerState>,
}

impl ModifiedContent {
    /// The "has unpublished changes" boolean for navigation guards.
    pub fn has_changes(&self) -> bool {
        !self.text_fields.is_empty()
            || !self.media_fields.is_empty()
            || !self.blocs.is_empty()
            || !self.pickers.is_empty()
    }
}

fn bloc_title(schema: &Schema, bloc_key: &str) -> String {
    schema
        .bloc_rules
        .get(bloc_key)
        .map(|rule| rule.item_label.clone())
        .unwrap_or_else(|| bloc_key.to_string())
}

fn vm_from_instance(schema: &Schema, instance: &BlocInstance) -> ModifiedBlocVm {
    ModifiedBlocVm {
        bloc_key: instance.bloc_key.clone(),
        bloc_title: bloc_title(schema, &instance.bloc_key),
        index: instance.index,
        original_json_index: instance.original_json_index,
        modified_fields: IndexMap::new(),
        deleted_fields: Vec::new(),
        is_new: false,
        is_deleted: false,
        is_reordered: false,
        order: instance.publish_order(),
    }
}

/// Classify store contents into the flat text/media lists plus bloc and
/// picker view-models.
pub fn build_modified_content(
    fields: &FieldStore,
    blocs: &BlocStore,
    pickers: &PickerStore,
    schema: &Schema,
) -> ModifiedContent {
    let mut content = ModifiedContent {
        pickers: pickers.modified_pickers(),
        ..ModifiedContent::default()
    };

    let buckets = fields.clean_modified_fields();
    let bloc_split = blocs.modified_blocs();
    debug!(
        modified = buckets.modified.len(),
        deleted = buckets.deleted.len(),
        created = buckets.created.len(),
        blocs_created = bloc_split.created.len(),
        blocs_deleted = bloc_split.deleted.len(),
        "building modified content"
    );

    // 1. Created instances become VMs directly.
    for instance in &bloc_split.created {
        let mut vm = vm_from_instance(schema, instance);
        vm.is_new = true;
        content.blocs.push(vm);
    }

    // 2. Deleted instances snapshot their field keys for cleanup.
    for instance in &bloc_split.deleted {
        let mut vm = vm_from_instance(schema, instance);
        vm.is_deleted = true;
        vm.deleted_fields = instance.field_keys.clone();
        content.blocs.push(vm);
    }

    // 3. Reordered-but-otherwise-untouched instances.
    for instance in &bloc_split.modified {
        if instance.in_error {
            continue;
        }
        let mut vm = vm_from_instance(schema, instance);
        vm.is_reordered = instance.is_reordered();
        content.blocs.push(vm);
    }

    // 4-6. Fields: modified, then deleted, then created.
    for (key, field) in &buckets.modified {
        let mut vm = base_field_vm(key, field);
        vm.reordered = field.is_reordered();
        route_field_vm(&mut content, schema, blocs, key, field, vm);
    }
    for (key, field) in &buckets.deleted {
        let mut vm = base_field_vm(key, field);
        vm.is_deleted = true;
        vm.order = field.initial.order;
        route_field_vm(&mut content, schema, blocs, key, field, vm);
    }
    for (key, field) in &buckets.created {
        let mut vm = base_field_vm(key, field);
        vm.is_new = true;
        route_field_vm(&mut content, schema, blocs, key, field, vm);
    }

    content
}

fn base_field_vm(key: &str, field: &EditableField) -> ModifiedFieldVm {
    ModifiedFieldVm {
        key: key.to_string(),
        value: field.publish_value().clone(),
        data_type: field.data_type,
        label: field.label.clone(),
        part_of_bloc: field.part_of_bloc,
        bloc_key: None,
        index: None,
        original_json_index: None,
        order: field.publish_order(),
        field_index: field.field_index,
        is_new: false,
        is_deleted: false,
        reordered: false,
    }
}

/// Push a field VM into the flat lists, or attach it to (creating if
/// necessary) the VM of its owning bloc instance. Fields of an in-error
/// instance are silently dropped: an invalid bloc must not partially
/// publish.
fn route_field_vm(
    content: &mut ModifiedContent,
    schema: &Schema,
    blocs: &BlocStore,
    key: &str,
    field: &EditableField,
    mut vm: ModifiedFieldVm,
) {
    let bloc_key = field.bloc_key.as_deref().filter(|_| field.part_of_bloc);
    let Some(bloc_key) = bloc_key else {
        match field.data_type {
            DataType::Text | DataType::Boolean => content.text_fields.push(vm),
            DataType::Image | DataType::Video => content.media_fields.push(vm),
        }
        return;
    };

    let Ok(parsed) = EditableKey::parse(key) else {
        return;
    };
    let Some(instance) = blocs.instance(bloc_key, parsed.index) else {
        return;
    };
    if instance.in_error {
        debug!(key, bloc_key, "dropping field of in-error bloc instance");
        return;
    }

    vm.bloc_key = Some(bloc_key.to_string());
    vm.index = Some(parsed.index);

    if let Some(existing) = content
        .blocs
        .iter_mut()
        .find(|b| b.bloc_key == bloc_key && b.index == parsed.index)
    {
        existing.modified_fields.insert(key.to_string(), vm);
        return;
    }

    let mut bloc_vm = vm_from_instance(schema, instance);
    bloc_vm.is_new = instance.is_new;
    bloc_vm.is_deleted = instance.is_deleted;
    bloc_vm.is_reordered = instance.is_reordered();
    bloc_vm.modified_fields.insert(key.to_string(), vm);
    content.blocs.push(bloc_vm);
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap as Map;
    use serde_json::json;

    use crate::bloc::BlocGroup;
    use crate::field::{FieldOptions, PendingFieldState};

    fn schema() -> Schema {
        serde_json::from_value(json!({
            "text_rules": {"CONTACT_MAIL": {"key": "contact.mail"}},
            "bloc_rules": {
                "SERVICES_BLOC": {
                    "bloc_title": "Services",
                    "item_label": "Service",
                    "json_key": "pages.services.blocs",
                    "text_fields": {"TITLE": {"key": "title"}}
                }
            }
        }))
        .unwrap()
    }

    fn stores_with_instance(in_error: bool) -> (FieldStore, BlocStore, PickerStore) {
        let mut blocs = BlocStore::new();
        blocs.set_group(BlocGroup::new(
            "SERVICES_BLOC",
            schema().bloc_rules["SERVICES_BLOC"].clone(),
        ));
        blocs.set_instance(
            "SERVICES_BLOC",
            BlocInstance::new("SERVICES_BLOC", 0, 0, vec![], Some(1), false, Map::new()),
        );
        if in_error {
            blocs.set_instance_error("SERVICES_BLOC", 0, true);
        }
        (FieldStore::new(), blocs, PickerStore::new())
    }

    fn modified_text_field(bloc: bool) -> EditableField {
        let mut field = EditableField::new(
            "SERVICES_BLOC.TITLE.0",
            EditableValue::Text("old".into()),
            FieldOptions {
                part_of_bloc: bloc,
                bloc_key: bloc.then(|| "SERVICES_BLOC".to_string()),
                ..FieldOptions::default()
            },
            None,
        );
        field.to_publish = Some(PendingFieldState {
            order: None,
            value: Some(EditableValue::Text("new".into())),
        });
        field
    }

    #[test]
    fn modified_field_lands_in_exactly_one_bucket() {
        let (mut fields, blocs, pickers) = stores_with_instance(false);
        fields.set("CONTACT_MAIL", {
            let mut f = modified_text_field(false);
            f.bloc_key = None;
            f
        });

        let content = build_modified_content(&fields, &blocs, &pickers, &schema());
        assert_eq!(content.text_fields.len(), 1);
        assert!(content.media_fields.is_empty());
        assert!(content.blocs.is_empty());
        assert!(content.has_changes());
    }

    #[test]
    fn bloc_field_attaches_to_instance_vm() {
        let (mut fields, blocs, pickers) = stores_with_instance(false);
        fields.set("SERVICES_BLOC.TITLE.0", modified_text_field(true));

        let content = build_modified_content(&fields, &blocs, &pickers, &schema());
        assert!(content.text_fields.is_empty());
        assert_eq!(content.blocs.len(), 1);
        let bloc = &content.blocs[0];
        assert_eq!(bloc.bloc_title, "Service");
        assert!(bloc.modified_fields.contains_key("SERVICES_BLOC.TITLE.0"));
    }

    #[test]
    fn fields_of_in_error_instance_are_dropped() {
        let (mut fields, blocs, pickers) = stores_with_instance(true);
        fields.set("SERVICES_BLOC.TITLE.0", modified_text_field(true));

        let content = build_modified_content(&fields, &blocs, &pickers, &schema());
        assert!(!content.has_changes());
    }

    #[test]
    fn deleted_instance_snapshots_field_keys() {
        let (fields, mut blocs, pickers) = stores_with_instance(false);
        blocs.update_instance("SERVICES_BLOC", 0, |prev| {
            let mut next = prev.clone();
            next.field_keys = vec!["SERVICES_BLOC.TITLE.0".into()];
            next.is_deleted = true;
            next
        });

        let content = build_modified_content(&fields, &blocs, &pickers, &schema());
        assert_eq!(content.blocs.len(), 1);
        assert!(content.blocs[0].is_deleted);
        assert_eq!(content.blocs[0].deleted_fields, ["SERVICES_BLOC.TITLE.0"]);
    }

    #[test]
    fn reorder_only_instance_flags_is_reordered() {
        let (fields, mut blocs, pickers) = stores_with_instance(false);
        blocs.update_bloc_orders(&[crate::store::BlocOrderUpdate {
            bloc_key: "SERVICES_BLOC".into(),
            index: 0,
            order: 7,
        }]);

        let content = build_modified_content(&fields, &blocs, &pickers, &schema());
        assert_eq!(content.blocs.len(), 1);
        assert!(content.blocs[0].is_reordered);
        assert_eq!(content.blocs[0].order, 7);
    }
}
