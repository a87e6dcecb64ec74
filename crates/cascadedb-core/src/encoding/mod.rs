//! Serialization and key encoding utilities.

pub mod sortable;

pub use sortable::{encode_sortable, encode_sortable_desc};
