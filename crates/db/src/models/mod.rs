//! Row structs for the notification tables.
//!
//! Each submodule contains a `FromRow` struct matching the table's columns
//! and a `TryFrom` conversion into the domain type. Enum columns are TEXT, so
//! conversion fails with [`CoreError::Validation`](mfgops_core::error::CoreError)
//! on an unknown value rather than panicking.

pub mod notification;
pub mod preference;
pub mod template;
