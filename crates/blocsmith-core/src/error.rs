//! Hard-failure taxonomy.
//!
//! Expected data-shape mismatches (schema misses, absent paths) fail soft
//! with `Option`/no-op throughout the crate. These errors cover the cases
//! where continuing would corrupt the document or a broken invariant must
//! stop the caller.

use thiserror::Error;

use crate::key::KeyError;
use crate::value::DataType;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown editable field: {0}")]
    UnknownField(String),
    #[error("unknown bloc group: {0}")]
    UnknownBlocGroup(String),
    #[error("unknown bloc instance: {bloc_key}[{index}]")]
    UnknownBlocInstance { bloc_key: String, index: usize },
    #[error("unknown bloc picker: {0}")]
    UnknownPicker(String),
    #[error("no default value for data type {0:?}")]
    NoDefaultValue(DataType),
    #[error(transparent)]
    Key(#[from] KeyError),
}
