//! `CascadeDB` Core
//!
//! This crate provides the fundamental value types and encodings shared by
//! the `CascadeDB` execution pipeline and storage layers.
//!
//! # Overview
//!
//! - **Values**: the [`Value`] enum carried in every register of an item
//!   batch, with a total ordering used by sort comparators
//! - **Sortable encoding**: an order-preserving byte encoding of values,
//!   used to build keys for the external sort spill store
//! - **Errors**: [`CoreError`] for encoding and type failures
//!
//! # Example
//!
//! ```
//! use cascadedb_core::Value;
//! use std::cmp::Ordering;
//!
//! let a = Value::Int(1);
//! let b = Value::Float(2.5);
//!
//! // Ints and floats compare numerically against each other
//! assert_eq!(a.compare(&b), Ordering::Less);
//!
//! // Null sorts before everything
//! assert_eq!(Value::Null.compare(&a), Ordering::Less);
//! ```
//!
//! # Modules
//!
//! - [`types`] - The [`Value`] type and its ordering
//! - [`encoding`] - Order-preserving byte encodings
//! - [`error`] - Error types ([`CoreError`])

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod encoding;
pub mod error;
pub mod types;

pub use error::CoreError;
pub use types::Value;
