//! Authoritative store for bloc groups and their instances.
//!
//! Notifications are synchronous: bloc mutations are rare and the
//! error-aggregation path reads back immediately after writing.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::bloc::{BlocGroup, BlocInstance, BlocProps};
use crate::store::subscribers::{SubscriberId, SubscriberSet};

/// One entry of a bloc reorder batch.
#[derive(Debug, Clone)]
pub struct BlocOrderUpdate {
    pub bloc_key: String,
    pub index: usize,
    pub order: i64,
}

/// Created/deleted/modified split of all instances.
#[derive(Debug, Default)]
pub struct BlocModifications {
    pub created: Vec<BlocInstance>,
    pub deleted: Vec<BlocInstance>,
    pub modified: Vec<BlocInstance>,
}

#[derive(Default)]
pub struct BlocStore {
    groups: IndexMap<String, BlocGroup>,
    subscribers: SubscriberSet,
}

impl BlocStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Groups ───────────────────────────────────────────────────────

    pub fn set_group(&mut self, group: BlocGroup) {
        let key = group.bloc_key.clone();
        self.groups.insert(key.clone(), group);
        self.subscribers.notify_key(&key);
    }

    pub fn group(&self, bloc_key: &str) -> Option<&BlocGroup> {
        self.groups.get(bloc_key)
    }

    pub fn groups(&self) -> &IndexMap<String, BlocGroup> {
        &self.groups
    }

    pub fn instance(&self, bloc_key: &str, index: usize) -> Option<&BlocInstance> {
        self.groups.get(bloc_key)?.instances.get(&index)
    }

    // ── Instances ────────────────────────────────────────────────────

    pub fn set_instance(&mut self, bloc_key: &str, instance: BlocInstance) {
        let Some(group) = self.groups.get_mut(bloc_key) else {
            warn!(bloc_key, "set_instance on unknown bloc group");
            return;
        };
        debug!(bloc_key, index = instance.index, "bloc instance set");
        group.instances.insert(instance.index, instance);
        self.subscribers.notify_key(bloc_key);
    }

    /// Remove an instance outright (new instances never reach the
    /// published document).
    pub fn delete_instance(&mut self, bloc_key: &str, index: usize) {
        let Some(group) = self.groups.get_mut(bloc_key) else {
            return;
        };
        if group.instances.remove(&index).is_some() {
            debug!(bloc_key, index, "bloc instance removed");
            self.subscribers.notify_key(bloc_key);
        }
    }

    pub fn update_instance(
        &mut self,
        bloc_key: &str,
        index: usize,
        updater: impl FnOnce(&BlocInstance) -> BlocInstance,
    ) {
        let Some(group) = self.groups.get_mut(bloc_key) else {
            return;
        };
        let Some(instance) = group.instances.get(&index) else {
            return;
        };
        let next = updater(instance);
        group.instances.insert(index, next);
        self.subscribers.notify_key(bloc_key);
    }

    /// Tombstone a previously-published instance for deletion at publish;
    /// its field keys stay snapshotted for file cleanup.
    pub fn mark_instance_deleted(&mut self, bloc_key: &str, index: usize) {
        self.update_instance(bloc_key, index, |prev| {
            let mut next = prev.clone();
            next.is_deleted = true;
            next
        });
    }

    pub fn set_instance_error(&mut self, bloc_key: &str, index: usize, in_error: bool) {
        let Some(group) = self.groups.get_mut(bloc_key) else {
            return;
        };
        let Some(instance) = group.instances.get_mut(&index) else {
            return;
        };
        if instance.in_error != in_error {
            instance.in_error = in_error;
            self.subscribers.notify_key(bloc_key);
        }
    }

    /// Apply a reorder batch, grouped per bloc key so each group notifies
    /// once rather than once per moved instance.
    pub fn update_bloc_orders(&mut self, updates: &[BlocOrderUpdate]) {
        let mut by_bloc: IndexMap<&str, Vec<&BlocOrderUpdate>> = IndexMap::new();
        for update in updates {
            by_bloc.entry(update.bloc_key.as_str()).or_default().push(update);
        }

        for (bloc_key, group_updates) in by_bloc {
            let Some(group) = self.groups.get_mut(bloc_key) else {
                continue;
            };
            for update in group_updates {
                if let Some(instance) = group.instances.get_mut(&update.index) {
                    let mut pending = instance.to_publish.unwrap_or_default();
                    pending.order = Some(update.order);
                    instance.to_publish = Some(pending);
                    instance.current.order = Some(update.order);
                }
            }
            self.subscribers.notify_key(bloc_key);
        }
    }

    // ── Field-key bookkeeping ────────────────────────────────────────

    pub fn detach_field_key(&mut self, bloc_key: &str, index: usize, field_key: &str) {
        let Some(group) = self.groups.get_mut(bloc_key) else {
            return;
        };
        let Some(instance) = group.instances.get_mut(&index) else {
            return;
        };
        let before = instance.field_keys.len();
        instance.field_keys.retain(|key| key != field_key);
        if instance.field_keys.len() != before {
            self.subscribers.notify_key(bloc_key);
        }
    }

    pub fn attach_field_key(
        &mut self,
        bloc_key: &str,
        index: usize,
        field_key: &str,
        order: Option<i64>,
    ) {
        let Some(group) = self.groups.get_mut(bloc_key) else {
            return;
        };
        let Some(instance) = group.instances.get_mut(&index) else {
            return;
        };
        if instance.field_keys.iter().any(|key| key == field_key) {
            return;
        }
        instance.field_keys.push(field_key.to_string());
        if let Some(order) = order {
            instance.field_orders.insert(field_key.to_string(), order);
        }
        self.subscribers.notify_key(bloc_key);
    }

    pub fn update_field_orders(
        &mut self,
        bloc_key: &str,
        index: usize,
        updates: &[(String, i64)],
    ) {
        let Some(group) = self.groups.get_mut(bloc_key) else {
            return;
        };
        let Some(instance) = group.instances.get_mut(&index) else {
            return;
        };
        for (field_key, order) in updates {
            instance.field_orders.insert(field_key.clone(), *order);
        }
        self.subscribers.notify_key(bloc_key);
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

    // ── Read-side queries ────────────────────────────────────────────

    /// Split every instance into created/deleted/modified.
    pub fn modified_blocs(&self) -> BlocModifications {
        let mut result = BlocModifications::default();
        for group in self.groups.values() {
            for instance in group.instances.values() {
                if instance.is_deleted {
                    result.deleted.push(instance.clone());
                } else if instance.is_new && !instance.in_error {
                    result.created.push(instance.clone());
                } else if instance.has_pending_diff() {
                    result.modified.push(instance.clone());
                }
            }
        }
        result
    }
}
