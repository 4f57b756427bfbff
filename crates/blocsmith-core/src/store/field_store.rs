//! Authoritative store for editable fields, with coalesced notifications.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::field::EditableField;
use crate::key::EditableKey;
use crate::store::subscribers::{SubscriberId, SubscriberSet};

/// Publish-bucket split of the store contents.
#[derive(Debug, Default)]
pub struct FieldBuckets {
    pub modified: IndexMap<String, EditableField>,
    pub deleted: IndexMap<String, EditableField>,
    pub created: IndexMap<String, EditableField>,
}

/// Field store. Every mutation adds the key to a pending set; [`flush`]
/// delivers each pending key's subscribers exactly once, then global
/// subscribers once, so N synchronous mutations in one batch produce one
/// notification round carrying the final state.
///
/// [`flush`]: FieldStore::flush
#[derive(Default)]
pub struct FieldStore {
    fields: IndexMap<String, EditableField>,
    subscribers: SubscriberSet,
    pending: IndexSet<String>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&EditableField> {
        self.fields.get(key)
    }

    pub fn all(&self) -> &IndexMap<String, EditableField> {
        &self.fields
    }

    pub fn set(&mut self, key: impl Into<String>, field: EditableField) {
        let key = key.into();
        debug!(key = %key, "field set");
        self.fields.insert(key.clone(), field);
        self.pending.insert(key);
    }

    /// Functional update; no notification when the updater returns an
    /// unchanged record.
    pub fn update(&mut self, key: &str, updater: impl FnOnce(&EditableField) -> EditableField) {
        let Some(prev) = self.fields.get(key) else {
            return;
        };
        let next = updater(prev);
        if next == *prev {
            return;
        }
        debug!(key = %key, "field updated");
        self.fields.insert(key.to_string(), next);
        self.pending.insert(key.to_string());
    }

    /// Remove fields outright. Returns whether anything was removed.
    pub fn delete(&mut self, keys: &[String]) -> bool {
        let mut changed = false;
        for key in keys {
            if self.fields.shift_remove(key).is_some() {
                debug!(key = %key, "field deleted from store");
                self.pending.insert(key.clone());
                changed = true;
            }
        }
        changed
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe<I, S>(&mut self, keys: I, callback: Rc<dyn Fn()>) -> SubscriberId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribers.subscribe(keys, callback)
    }

    pub fn subscribe_all(&mut self, callback: Rc<dyn Fn()>) -> SubscriberId {
        self.subscribers.subscribe_all(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.unsubscribe(id);
    }

    pub fn has_pending_notifications(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain the pending set: fire every subscriber registered for any
    /// pending key exactly once, then every global subscriber once.
    pub fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);

        let mut fired: IndexSet<SubscriberId> = IndexSet::new();
        for key in &pending {
            for (id, callback) in self.subscribers.callbacks_for(key) {
                if fired.insert(id) {
                    callback();
                }
            }
        }
        for (_, callback) in self.subscribers.global_callbacks() {
            callback();
        }
    }

    // ── Read-side queries ────────────────────────────────────────────

    pub fn keys_matching(&self, mut filter: impl FnMut(&str) -> bool) -> Vec<String> {
        self.fields
            .keys()
            .filter(|key| filter(key))
            .cloned()
            .collect()
    }

    pub fn fields_for_route(&self, route: &str) -> IndexMap<String, EditableField> {
        self.fields
            .iter()
            .filter(|(_, field)| field.associated_route.as_deref() == Some(route))
            .map(|(key, field)| (key.clone(), field.clone()))
            .collect()
    }

    /// Non-deleted duplicate-instances of the field addressed by
    /// `current_field_key` (same bloc, same field, same instance).
    /// In-error fields are kept; only tombstones are excluded.
    pub fn clean_duplicable_instances(&self, current_field_key: &str) -> Vec<String> {
        let Ok(parsed) = EditableKey::parse(current_field_key) else {
            return Vec::new();
        };
        self.keys_matching(|key| {
            let Ok(other) = EditableKey::parse(key) else {
                return false;
            };
            if other.bloc_key != parsed.bloc_key
                || other.field_key != parsed.field_key
                || other.index != parsed.index
            {
                return false;
            }
            !self.get(key).is_some_and(|field| field.is_deleted)
        })
    }

    /// Split store contents into publish buckets, excluding in-error
    /// fields from `modified` and `created`.
    pub fn clean_modified_fields(&self) -> FieldBuckets {
        let mut buckets = FieldBuckets::default();
        for (key, field) in &self.fields {
            if field.is_deleted {
                buckets.deleted.insert(key.clone(), field.clone());
                continue;
            }
            if field.is_new && !field.in_error {
                buckets.created.insert(key.clone(), field.clone());
                continue;
            }
            if field.has_pending_diff() && !field.in_error {
                buckets.modified.insert(key.clone(), field.clone());
            }
        }
        buckets
    }

    /// Everything requiring rollback: created, deleted, holding a pending
    /// diff, or with a live value drifted from last-published. The last
    /// case catches invalid edits that touched `current` without ever
    /// reaching `to_publish`.
    pub fn fields_to_rollback(&self) -> IndexMap<String, EditableField> {
        self.fields
            .iter()
            .filter(|(_, field)| {
                field.is_deleted
                    || field.is_new
                    || field.has_pending_diff()
                    || field.current != field.initial
            })
            .map(|(key, field)| (key.clone(), field.clone()))
            .collect()
    }

    /// Title fields under any of the allowed bloc keys, used by picker
    /// selectors to mirror live title edits.
    pub fn title_fields_for_blocs(
        &self,
        allowed_bloc_keys: &[String],
    ) -> IndexMap<String, EditableField> {
        self.fields
            .iter()
            .filter(|(key, _)| {
                allowed_bloc_keys.iter().any(|bloc| key.starts_with(bloc.as_str()))
                    && key.contains("_TITLE")
            })
            .map(|(key, field)| (key.clone(), field.clone()))
            .collect()
    }
}
