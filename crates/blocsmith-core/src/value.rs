//! Tagged union for editable leaf values.
//!
//! The admin document mixes plain strings, booleans and asset descriptors;
//! consumers match on [`EditableValue`] exhaustively instead of sniffing an
//! adjacent type discriminator.

use serde::{Deserialize, Serialize};

/// Discriminant of an editable value, as carried by the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Image,
    Boolean,
    Video,
}

/// In-memory stand-in for a file picked by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileData {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileData {
    pub fn new(name: impl Into<String>, mime: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime,
            bytes,
        }
    }
}

/// Image or video descriptor: an optional freshly-picked file plus the
/// preview and remote names the document already knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetEntry {
    pub file: Option<FileData>,
    pub preview_url: Option<String>,
    pub remote_url: Option<String>,
}

impl AssetEntry {
    pub fn remote(name: impl Into<String>, preview_url: impl Into<String>) -> Self {
        Self {
            file: None,
            preview_url: Some(preview_url.into()),
            remote_url: Some(name.into()),
        }
    }

    /// A descriptor with neither file nor urls, used for brand-new fields.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One editable leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum EditableValue {
    Text(String),
    Boolean(bool),
    Image(AssetEntry),
    Video(AssetEntry),
}

impl EditableValue {
    pub fn data_type(&self) -> DataType {
        match self {
            EditableValue::Text(_) => DataType::Text,
            EditableValue::Boolean(_) => DataType::Boolean,
            EditableValue::Image(_) => DataType::Image,
            EditableValue::Video(_) => DataType::Video,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            EditableValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_asset(&self) -> Option<&AssetEntry> {
        match self {
            EditableValue::Image(entry) | EditableValue::Video(entry) => Some(entry),
            _ => None,
        }
    }

    /// Whether the value is displayable for its own type: a string for
    /// text, a preview or remote name for assets, a bool for booleans.
    pub fn is_displayable(&self) -> bool {
        match self {
            EditableValue::Text(_) | EditableValue::Boolean(_) => true,
            EditableValue::Image(entry) | EditableValue::Video(entry) => {
                entry.preview_url.is_some() || entry.remote_url.is_some()
            }
        }
    }
}
