//! Keyed and global change subscribers.

use std::collections::HashMap;
use std::rc::Rc;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Callback = Rc<dyn Fn()>;

/// Registry of per-key and global callbacks.
///
/// Delivery order within one key follows registration order. Callbacks are
/// cloned out before invocation so a callback may subscribe or unsubscribe
/// without invalidating the iteration.
#[derive(Default)]
pub struct SubscriberSet {
    by_key: HashMap<String, Vec<(SubscriberId, Callback)>>,
    global: Vec<(SubscriberId, Callback)>,
    next_id: u64,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register `callback` for every key in `keys`.
    pub fn subscribe<I, S>(&mut self, keys: I, callback: Rc<dyn Fn()>) -> SubscriberId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = self.alloc_id();
        for key in keys {
            self.by_key
                .entry(key.into())
                .or_default()
                .push((id, Rc::clone(&callback)));
        }
        id
    }

    /// Register `callback` for every change, regardless of key.
    pub fn subscribe_all(&mut self, callback: Rc<dyn Fn()>) -> SubscriberId {
        let id = self.alloc_id();
        self.global.push((id, callback));
        id
    }

    /// Drop every registration held by `id`.
    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.by_key.retain(|_, subs| {
            subs.retain(|(sub_id, _)| *sub_id != id);
            !subs.is_empty()
        });
        self.global.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Callbacks registered for `key`, in registration order.
    pub fn callbacks_for(&self, key: &str) -> Vec<(SubscriberId, Callback)> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }

    pub fn global_callbacks(&self) -> Vec<(SubscriberId, Callback)> {
        self.global.clone()
    }

    /// Fire `key` subscribers then global subscribers, synchronously.
    pub fn notify_key(&self, key: &str) {
        for (_, callback) in self.callbacks_for(key) {
            callback();
        }
        for (_, callback) in self.global_callbacks() {
            callback();
        }
    }
}
