//! Repeatable bloc instances and their groups.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::schema::BlocRule;

/// Mutable bloc-level properties. Currently only the display order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlocProps {
    pub order: Option<i64>,
}

/// One occurrence of a repeatable content block.
///
/// `index` is the in-memory slot; `original_json_index` is the slot in the
/// last-published `items` array, which publish-time path resolution must
/// target regardless of in-memory reordering.
#[derive(Debug, Clone, PartialEq)]
pub struct BlocInstance {
    pub bloc_key: String,
    pub index: usize,
    pub original_json_index: usize,
    /// Flat, ordered field identities of this instance, duplicable
    /// sub-fields included.
    pub field_keys: Vec<String>,
    /// Display order per duplicable sub-field key.
    pub field_orders: IndexMap<String, i64>,

    pub initial: BlocProps,
    pub current: BlocProps,
    pub to_publish: Option<BlocProps>,

    pub is_new: bool,
    pub is_deleted: bool,
    pub in_error: bool,
}

impl BlocInstance {
    pub fn new(
        bloc_key: impl Into<String>,
        index: usize,
        original_json_index: usize,
        field_keys: Vec<String>,
        order: Option<i64>,
        is_new: bool,
        field_orders: IndexMap<String, i64>,
    ) -> Self {
        let props = BlocProps { order };
        Self {
            bloc_key: bloc_key.into(),
            index,
            original_json_index,
            field_keys,
            field_orders,
            initial: props,
            current: props,
            to_publish: is_new.then_some(props),
            is_new,
            is_deleted: false,
            in_error: false,
        }
    }

    pub fn has_pending_diff(&self) -> bool {
        match self.to_publish {
            Some(pending) => pending.order.is_some() && pending.order != self.initial.order,
            None => false,
        }
    }

    /// Order for the publish payload: pending, else last-published, else 0.
    pub fn publish_order(&self) -> i64 {
        self.to_publish
            .and_then(|p| p.order)
            .or(self.initial.order)
            .unwrap_or(0)
    }

    pub fn is_reordered(&self) -> bool {
        self.to_publish
            .is_some_and(|pending| pending.order != self.initial.order)
    }
}

/// A named collection of instances plus the immutable rule governing them.
#[derive(Debug, Clone, PartialEq)]
pub struct BlocGroup {
    pub bloc_key: String,
    pub rule: BlocRule,
    /// Instances keyed by in-memory index; ordered iteration keeps
    /// notifications and diffs deterministic.
    pub instances: BTreeMap<usize, BlocInstance>,
}

impl BlocGroup {
    pub fn new(bloc_key: impl Into<String>, rule: BlocRule) -> Self {
        Self {
            bloc_key: bloc_key.into(),
            rule,
            instances: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_instance_pending_only_when_new() {
        let existing = BlocInstance::new("B", 0, 0, vec![], Some(1), false, IndexMap::new());
        assert!(existing.to_publish.is_none());
        assert!(!existing.has_pending_diff());

        let created = BlocInstance::new("B", 1, 1, vec![], Some(2), true, IndexMap::new());
        assert_eq!(created.to_publish, Some(BlocProps { order: Some(2) }));
    }

    #[test]
    fn publish_order_falls_back_through_states() {
        let mut instance = BlocInstance::new("B", 0, 0, vec![], Some(4), false, IndexMap::new());
        assert_eq!(instance.publish_order(), 4);
        instance.to_publish = Some(BlocProps { order: Some(9) });
        assert_eq!(instance.publish_order(), 9);
        assert!(instance.is_reordered());

        let bare = BlocInstance::new("B", 0, 0, vec![], None, false, IndexMap::new());
        assert_eq!(bare.publish_order(), 0);
    }
}
