//! Path utilities for nested JSON content documents.
//!
//! Paths use the admin tool's dotted/bracketed form (`pages.services.items[2].title`)
//! rather than RFC 6901 pointers. All accessors fail soft: a missing segment
//! yields `None` or a no-op, never a panic, because partially migrated
//! documents are expected input.

mod path;
pub use path::{
    get_value_at_path, remove_bloc_from_json, set_value_at_path, tokenize_path, PathToken,
};

mod order;
pub use order::clean_order_data;

mod scan;
pub use scan::{find_scopes_by_name, includes_value, includes_value_in_scope};
