//! Editable-state stores and publish reconciliation for structured content
//! documents.
//!
//! The crate tracks three coexisting views of every editable value (last
//! published `initial`, live `current`, sanitized `to_publish`), classifies
//! edits into created/modified/deleted view-models, and reconciles them into
//! a minimal schema-consistent publish payload. The presentation layer,
//! transport and asset validation live outside this crate; it only consumes
//! a [`schema::Schema`] plus the last-published JSON document, and produces
//! change notifications and a [`publish::PublishPayload`].

pub mod key;
pub mod value;
pub mod schema;
pub mod field;
pub mod bloc;
pub mod picker;
pub mod error;
pub mod store;
pub mod resolve;
pub mod diff;
pub mod publish;
pub mod session;
mod rollback;

pub use diff::{ModifiedBlocVm, ModifiedContent, ModifiedFieldVm};
pub use error::SessionError;
pub use key::{EditableKey, KeyError};
pub use publish::{FileUpload, PublishPayload};
pub use session::{EditSession, FieldOrderUpdate};
pub use value::{AssetEntry, DataType, EditableValue, FileData};
