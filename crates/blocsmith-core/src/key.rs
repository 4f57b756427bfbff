//! Composite editable-key vocabulary.
//!
//! A field identity is `blocKey.fieldKey.index` with an optional fourth
//! `fieldIndex` segment for duplicable sub-fields. `index` addresses the
//! bloc instance by in-memory position; the last-published array slot is
//! tracked separately as `original_json_index` on the instance.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("expected 3 or 4 dot-separated segments, got {0}")]
    SegmentCount(usize),
    #[error("non-integer bloc index segment: {0:?}")]
    InvalidIndex(String),
    #[error("non-integer field index segment: {0:?}")]
    InvalidFieldIndex(String),
}

/// Parsed form of an editable key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditableKey {
    pub bloc_key: String,
    pub field_key: String,
    pub index: usize,
    pub field_index: Option<usize>,
}

impl EditableKey {
    pub fn new(
        bloc_key: impl Into<String>,
        field_key: impl Into<String>,
        index: usize,
        field_index: Option<usize>,
    ) -> Self {
        Self {
            bloc_key: bloc_key.into(),
            field_key: field_key.into(),
            index,
            field_index,
        }
    }

    /// Parse a composite key. Malformed keys (wrong segment count,
    /// non-integer index) are rejected.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(KeyError::SegmentCount(parts.len()));
        }

        let index = parts[2]
            .parse::<usize>()
            .map_err(|_| KeyError::InvalidIndex(parts[2].to_string()))?;

        let field_index = match parts.get(3) {
            Some(segment) => Some(
                segment
                    .parse::<usize>()
                    .map_err(|_| KeyError::InvalidFieldIndex(segment.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            bloc_key: parts[0].to_string(),
            field_key: parts[1].to_string(),
            index,
            field_index,
        })
    }

    /// Canonical string form, the inverse of [`EditableKey::parse`].
    pub fn full_key(&self) -> String {
        self.to_string()
    }

    /// Build a composite key string directly from its components.
    pub fn build(
        bloc_key: &str,
        field_key: &str,
        index: usize,
        field_index: Option<usize>,
    ) -> String {
        match field_index {
            Some(fi) => format!("{bloc_key}.{field_key}.{index}.{fi}"),
            None => format!("{bloc_key}.{field_key}.{index}"),
        }
    }
}

impl fmt::Display for EditableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field_index {
            Some(fi) => write!(f, "{}.{}.{}.{}", self.bloc_key, self.field_key, self.index, fi),
            None => write!(f, "{}.{}.{}", self.bloc_key, self.field_key, self.index),
        }
    }
}
