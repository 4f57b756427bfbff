//! Static schema input: per-field, per-bloc and per-picker rules.
//!
//! The schema is read-only for this crate. Rule structs deserialize from
//! the admin tool's static configuration with the same defaults the rule
//! factories applied; fields this core never consults (validation bounds,
//! display hints) are carried through untouched so the UI layer can read
//! them off the same value.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextType {
    #[default]
    Text,
    Email,
    Url,
    Number,
    Phone,
}

/// Rule for one text field: where it lives in the document and how it may
/// be edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextRule {
    /// Document property path (standalone fields) or property name (bloc
    /// fields).
    pub key: String,
    pub label: Option<String>,
    pub min_length: usize,
    pub max_length: usize,
    pub line_breakable: bool,
    pub text_type: TextType,
    pub is_duplicable: bool,
    pub route: Option<String>,
    pub rank: i64,
}

impl Default for TextRule {
    fn default() -> Self {
        Self {
            key: String::new(),
            label: None,
            min_length: 0,
            max_length: 800,
            line_breakable: false,
            text_type: TextType::Text,
            is_duplicable: false,
            route: None,
            rank: 0,
        }
    }
}

/// Rule for one image or video field. Both share a shape: a target file
/// name, a public folder and dimension bounds the validator enforces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetRule {
    /// Target file name (standalone fields) or document property name
    /// (bloc fields).
    pub name: String,
    pub label: Option<String>,
    pub folder: Option<String>,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub is_duplicable: bool,
    /// Generated icon set derives from this asset (favicon case).
    pub auto_generate_icons: bool,
    pub route: Option<String>,
    pub rank: i64,
}

impl Default for AssetRule {
    fn default() -> Self {
        Self {
            name: String::new(),
            label: None,
            folder: None,
            min_width: 100,
            min_height: 50,
            max_width: 8200,
            max_height: 8500,
            is_duplicable: false,
            auto_generate_icons: false,
            route: None,
            rank: 0,
        }
    }
}

/// Rule governing a repeatable bloc group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlocRule {
    pub bloc_title: String,
    pub item_label: String,
    /// Document anchor; instances live under `<json_key>.items`.
    pub json_key: String,
    pub min_item: usize,
    pub max_item: usize,
    pub text_fields: IndexMap<String, TextRule>,
    pub image_fields: IndexMap<String, AssetRule>,
    pub rank: i64,
}

impl Default for BlocRule {
    fn default() -> Self {
        Self {
            bloc_title: String::new(),
            item_label: "Item".to_string(),
            json_key: String::new(),
            min_item: 1,
            max_item: 10,
            text_fields: IndexMap::new(),
            image_fields: IndexMap::new(),
            rank: 100,
        }
    }
}

/// Rule for a bloc picker: a singleton selector referencing one bloc
/// instance from elsewhere in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerRule {
    pub title: String,
    pub json_key: String,
    pub allowed_source_blocs: Vec<String>,
    pub can_be_draft: bool,
    pub route: Option<String>,
    pub rank: i64,
}

impl Default for PickerRule {
    fn default() -> Self {
        Self {
            title: String::new(),
            json_key: String::new(),
            allowed_source_blocs: Vec::new(),
            can_be_draft: false,
            route: None,
            rank: 0,
        }
    }
}

/// The complete read-only schema handed to [`crate::EditSession`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    pub text_rules: IndexMap<String, TextRule>,
    pub image_rules: IndexMap<String, AssetRule>,
    pub video_rules: IndexMap<String, AssetRule>,
    pub bloc_rules: IndexMap<String, BlocRule>,
    pub picker_rules: IndexMap<String, PickerRule>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rules_deserialize_with_defaults() {
        let schema: Schema = serde_json::from_value(json!({
            "text_rules": {
                "CONTACT_MAIL": {"key": "contact.mail", "text_type": "email"}
            },
            "bloc_rules": {
                "SERVICES_BLOC": {
                    "bloc_title": "Services",
                    "json_key": "pages.services.blocs",
                    "text_fields": {"TITLE": {"key": "title"}}
                }
            }
        }))
        .unwrap();

        let text = &schema.text_rules["CONTACT_MAIL"];
        assert_eq!(text.text_type, TextType::Email);
        assert_eq!(text.max_length, 800);

        let bloc = &schema.bloc_rules["SERVICES_BLOC"];
        assert_eq!(bloc.item_label, "Item");
        assert_eq!(bloc.max_item, 10);
        assert_eq!(bloc.text_fields["TITLE"].key, "title");
    }
}
