//! Dual-state record for one editable field.

use crate::value::{DataType, EditableValue};

/// Value plus display order, the mutable part of a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    pub order: Option<i64>,
    pub value: EditableValue,
}

/// Partial overlay applied on top of `initial` at publish time. A key is
/// `Some` only once the corresponding property has been (validly) edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingFieldState {
    pub order: Option<i64>,
    pub value: Option<EditableValue>,
}

/// Fixed configuration of a field, decided at creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOptions {
    pub label: Option<String>,
    pub part_of_bloc: bool,
    pub bloc_key: Option<String>,
    pub associated_route: Option<String>,
    pub field_index: Option<usize>,
    /// Derived assets (generated icons) publish even without an operator
    /// edit, so they start with `to_publish` populated.
    pub is_generated: bool,
    pub is_new: bool,
    pub in_error: bool,
}

/// One editable leaf with its three coexisting states.
///
/// `initial` is the last-published snapshot, only touched by
/// publish-completion or rollback. `current` always mirrors the UI.
/// `to_publish` holds only sanitized valid edits; an invalid edit updates
/// `current` for display but never contaminates the publish payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EditableField {
    pub data_type: DataType,
    pub label: String,
    pub part_of_bloc: bool,
    pub bloc_key: Option<String>,
    pub associated_route: Option<String>,
    pub field_index: Option<usize>,
    pub is_generated: bool,

    pub initial: FieldState,
    pub current: FieldState,
    pub to_publish: Option<PendingFieldState>,

    pub is_new: bool,
    pub is_deleted: bool,
    pub in_error: bool,
}

impl EditableField {
    pub fn new(key: &str, value: EditableValue, options: FieldOptions, order: Option<i64>) -> Self {
        let state = FieldState {
            order,
            value: value.clone(),
        };
        Self {
            data_type: value.data_type(),
            label: options.label.unwrap_or_else(|| key.to_string()),
            part_of_bloc: options.part_of_bloc,
            bloc_key: options.bloc_key,
            associated_route: options.associated_route,
            field_index: options.field_index,
            is_generated: options.is_generated,
            initial: state.clone(),
            current: state,
            to_publish: options.is_generated.then(|| PendingFieldState {
                order,
                value: Some(value),
            }),
            is_new: options.is_new,
            is_deleted: false,
            in_error: options.in_error,
        }
    }

    /// Whether any pending key differs from its `initial` counterpart.
    pub fn has_pending_diff(&self) -> bool {
        let Some(pending) = &self.to_publish else {
            return false;
        };
        let value_diff = pending
            .value
            .as_ref()
            .is_some_and(|v| *v != self.initial.value);
        let order_diff = pending.order.is_some() && pending.order != self.initial.order;
        value_diff || order_diff
    }

    /// Value to transmit: the sanitized pending value when present,
    /// otherwise the live one.
    pub fn publish_value(&self) -> &EditableValue {
        self.to_publish
            .as_ref()
            .and_then(|p| p.value.as_ref())
            .unwrap_or(&self.current.value)
    }

    /// Target order: pending first, then last-published.
    pub fn publish_order(&self) -> Option<i64> {
        self.to_publish
            .as_ref()
            .and_then(|p| p.order)
            .or(self.initial.order)
    }

    /// Whether only the display order moved.
    pub fn is_reordered(&self) -> bool {
        match &self.to_publish {
            Some(pending) => pending.order.is_some() && pending.order != self.initial.order,
            None => false,
        }
    }

    /// Whether the live value matches the field's declared type and is
    /// displayable for it (assets need a preview or remote name).
    pub fn has_displayable_value(&self) -> bool {
        self.current.value.data_type() == self.data_type && self.current.value.is_displayable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AssetEntry;

    fn text_field(value: &str) -> EditableField {
        EditableField::new(
            "CONTACT_MAIL",
            EditableValue::Text(value.into()),
            FieldOptions::default(),
            None,
        )
    }

    #[test]
    fn new_field_has_no_pending_state() {
        let field = text_field("hello");
        assert_eq!(field.initial, field.current);
        assert!(field.to_publish.is_none());
        assert!(!field.has_pending_diff());
    }

    #[test]
    fn generated_field_starts_publishable() {
        let field = EditableField::new(
            "icon_favicon-32.png",
            EditableValue::Image(AssetEntry::empty()),
            FieldOptions {
                is_generated: true,
                ..FieldOptions::default()
            },
            None,
        );
        assert!(field.to_publish.is_some());
    }

    #[test]
    fn pending_diff_tracks_value_and_order() {
        let mut field = text_field("hello");
        field.to_publish = Some(PendingFieldState {
            order: None,
            value: Some(EditableValue::Text("hello".into())),
        });
        assert!(!field.has_pending_diff());

        field.to_publish.as_mut().unwrap().value = Some(EditableValue::Text("changed".into()));
        assert!(field.has_pending_diff());

        field.to_publish = Some(PendingFieldState {
            order: Some(3),
            value: None,
        });
        assert!(field.has_pending_diff());
        assert!(field.is_reordered());
    }

    #[test]
    fn displayable_value_requires_matching_type() {
        let mut field = text_field("hello");
        assert!(field.has_displayable_value());

        field.current.value = EditableValue::Image(AssetEntry::empty());
        assert!(!field.has_displayable_value());

        let mut image = EditableField::new(
            "HERO",
            EditableValue::Image(AssetEntry::empty()),
            FieldOptions::default(),
            None,
        );
        assert!(!image.has_displayable_value());
        image.current.value = EditableValue::Image(AssetEntry::remote("a.jpg", "home/a.jpg"));
        assert!(image.has_displayable_value());
    }

    #[test]
    fn publish_value_prefers_pending() {
        let mut field = text_field("initial");
        field.current.value = EditableValue::Text("live".into());
        assert_eq!(field.publish_value().as_text(), Some("live"));

        field.to_publish = Some(PendingFieldState {
            order: None,
            value: Some(EditableValue::Text("sanitized".into())),
        });
        assert_eq!(field.publish_value().as_text(), Some("sanitized"));
    }
}
