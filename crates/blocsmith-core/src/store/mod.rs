//! The three authoritative state stores.
//!
//! All state is mutated only through the store APIs so that every
//! notification corresponds to an actual state transition. Field
//! notifications are coalesced into an explicit pending set drained by
//! [`FieldStore::flush`]; bloc and picker notifications are synchronous
//! because their mutations are rare and error-aggregation callers need
//! immediate consistency.

mod subscribers;
pub use subscribers::{SubscriberId, SubscriberSet};

mod field_store;
pub use field_store::{FieldBuckets, FieldStore};

mod bloc_store;
pub use bloc_store::{BlocModifications, BlocOrderUpdate, BlocStore};

mod picker_store;
pub use picker_store::PickerStore;
