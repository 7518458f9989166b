#![forbid(unsafe_code)]

pub mod memory;
pub mod repository;
pub mod seed;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use repository::{DocPath, Document, DocumentStore, Storage, StorageError};
