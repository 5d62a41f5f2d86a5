//! Detection log persistence.
//!
//! This crate provides:
//! - The [`DetectionLogStore`] trait the API persists verdicts through
//! - An in-process store
//! - A JSON file store that survives restarts

pub mod error;
pub mod file_store;
pub mod memory;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use file_store::JsonFileLogStore;
pub use memory::InMemoryLogStore;
pub use store::DetectionLogStore;
