//! Position storage for the double calendar monitor.
//!
//! This crate provides:
//! - A flat JSON document store
//! - A PostgreSQL table store (one JSONB record per ticker)
//! - The versioned record schema with migration of the legacy layout

pub mod error;
pub mod json_store;
pub mod postgres_store;
pub mod schema;

pub use error::StoreError;
pub use json_store::JsonFileStore;
pub use postgres_store::PgPositionStore;
pub use schema::{decode_record, encode_record, CURRENT_SCHEMA_VERSION};
