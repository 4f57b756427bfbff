//! Authoritative store for bloc picker states. Synchronous notifications,
//! same as the bloc store.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::picker::PickerState;
use crate::store::subscribers::{SubscriberId, SubscriberSet};

#[derive(Default)]
pub struct PickerStore {
    pickers: IndexMap<String, PickerState>,
    subscribers: SubscriberSet,
}

impl PickerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, picker_key: &str) -> Option<&PickerState> {
        self.pickers.get(picker_key)
    }

    pub fn all(&self) -> &IndexMap<String, PickerState> {
        &self.pickers
    }

    pub fn set(&mut self, picker_key: impl Into<String>, state: PickerState) {
        let key = picker_key.into();
        debug!(picker = %key, "picker set");
        self.pickers.insert(key.clone(), state);
        self.subscribers.notify_key(&key);
    }

    /// Functional update; no-op when the picker does not exist.
    pub fn update(&mut self, picker_key: &str, updater: impl FnOnce(&PickerState) -> PickerState) {
        let Some(prev) = self.pickers.get(picker_key) else {
            return;
        };
        let next = updater(prev);
        self.pickers.insert(picker_key.to_string(), next);
        self.subscribers.notify_key(picker_key);
    }

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

    /// Pickers whose pending state differs from last-published.
    pub fn modified_pickers(&self) -> Vec<PickerState> {
        self.pickers
            .values()
            .filter(|picker| picker.has_pending_diff())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::picker::PickerValue;
    use crate::schema::PickerRule;

    #[test]
    fn update_notifies_synchronously() {
        let mut store = PickerStore::new();
        store.set(
            "HOME_ANNOUNCEMENT",
            PickerState::new("HOME_ANNOUNCEMENT", PickerRule::default(), PickerValue::default()),
        );

        let count = Rc::new(Cell::new(0));
        let inner = Rc::clone(&count);
        store.subscribe(["HOME_ANNOUNCEMENT"], Rc::new(move || inner.set(inner.get() + 1)));

        store.update("HOME_ANNOUNCEMENT", |prev| {
            let mut next = prev.clone();
            next.current.enabled = true;
            next
        });
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn modified_pickers_need_a_real_diff() {
        let mut store = PickerStore::new();
        store.set(
            "P",
            PickerState::new("P", PickerRule::default(), PickerValue::default()),
        );
        assert!(store.modified_pickers().is_empty());

        store.update("P", |prev| {
            let mut next = prev.clone();
            next.to_publish = Some(PickerValue {
                enabled: true,
                source_bloc_key: "ANNONCE_BLOC".into(),
                bloc_index: 1,
            });
            next
        });
        assert_eq!(store.modified_pickers().len(), 1);
    }
}
