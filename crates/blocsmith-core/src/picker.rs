//! Bloc picker state: a singleton selector referencing one bloc instance.

use serde_json::Value;

use crate::schema::PickerRule;

/// The selector value itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PickerValue {
    pub enabled: bool,
    pub source_bloc_key: String,
    pub bloc_index: i64,
}

impl PickerValue {
    /// Lenient read from the published document, where picker components
    /// are stored as strings.
    pub fn from_document(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let enabled = match map.get("enabled") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        };
        let source_bloc_key = map
            .get("sourceBlocKey")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let bloc_index = match map.get("blocIndex") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        };
        Some(Self {
            enabled,
            source_bloc_key,
            bloc_index,
        })
    }
}

/// Dual-state record for one picker.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerState {
    pub picker_key: String,
    pub rule: PickerRule,
    pub initial: PickerValue,
    pub current: PickerValue,
    pub to_publish: Option<PickerValue>,
    pub associated_route: Option<String>,
}

impl PickerState {
    pub fn new(picker_key: impl Into<String>, rule: PickerRule, initial: PickerValue) -> Self {
        let associated_route = rule.route.clone();
        Self {
            picker_key: picker_key.into(),
            rule,
            initial: initial.clone(),
            current: initial,
            to_publish: None,
            associated_route,
        }
    }

    /// Whether any pending component differs from the last-published one.
    pub fn has_pending_diff(&self) -> bool {
        self.to_publish
            .as_ref()
            .is_some_and(|pending| *pending != self.initial)
    }
}
