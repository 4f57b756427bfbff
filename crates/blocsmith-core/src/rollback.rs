//! Discard every unpublished edit and return the stores to their
//! last-published state.
//!
//! Deletions are staged and applied after the full pass: instances still
//! reference fields that have not been visited yet, and removing entries
//! mid-iteration would invalidate the snapshots being walked.

use tracing::debug;

use crate::key::EditableKey;
use crate::store::{BlocStore, FieldStore, PickerStore};

pub(crate) fn rollback_all(fields: &mut FieldStore, blocs: &mut BlocStore, pickers: &mut PickerStore) {
    // 1. Bloc instances: new ones vanish, the rest reset to initial.
    let instances: Vec<(String, usize, bool)> = blocs
        .groups()
        .values()
        .flat_map(|group| {
            group
                .instances
                .values()
                .map(|i| (i.bloc_key.clone(), i.index, i.is_new))
        })
        .collect();

    for (bloc_key, index, is_new) in instances {
        if is_new {
            debug!(bloc_key = %bloc_key, index, "rollback removes new bloc instance");
            blocs.delete_instance(&bloc_key, index);
            continue;
        }
        blocs.update_instance(&bloc_key, index, |prev| {
            let mut next = prev.clone();
            next.current = next.initial;
            next.to_publish = None;
            next.is_deleted = false;
            next.in_error = false;
            next
        });
    }

    // 2. Fields, with bloc bookkeeping restored alongside.
    let to_rollback = fields.fields_to_rollback();
    let mut staged_deletions: Vec<String> = Vec::new();

    for (key, field) in &to_rollback {
        if field.is_new && !field.part_of_bloc {
            staged_deletions.push(key.clone());
            continue;
        }

        if field.part_of_bloc {
            if let Ok(parsed) = EditableKey::parse(key) {
                if field.is_new {
                    blocs.detach_field_key(&parsed.bloc_key, parsed.index, key);
                    staged_deletions.push(key.clone());
                    continue;
                }
                if field.is_deleted {
                    blocs.attach_field_key(&parsed.bloc_key, parsed.index, key, field.initial.order);
                }
                let pending_order = field.to_publish.as_ref().and_then(|p| p.order);
                if pending_order.is_some() && pending_order != field.initial.order {
                    if let Some(order) = field.initial.order {
                        blocs.update_field_orders(
                            &parsed.bloc_key,
                            parsed.index,
                            &[(key.clone(), order)],
                        );
                    }
                }
            }
        }

        fields.update(key, |prev| {
            let mut next = prev.clone();
            next.current = next.initial.clone();
            next.to_publish = None;
            next.is_deleted = false;
            next.in_error = false;
            next
        });
    }

    // 3. Staged deletions, applied only now.
    if !staged_deletions.is_empty() {
        debug!(count = staged_deletions.len(), "rollback removes session-created fields");
        fields.delete(&staged_deletions);
    }

    // 4. Pickers.
    let picker_keys: Vec<String> = pickers.all().keys().cloned().collect();
    for key in picker_keys {
        pickers.update(&key, |prev| {
            let mut next = prev.clone();
            next.current = next.initial.clone();
            next.to_publish = None;
            next
        });
    }
}
