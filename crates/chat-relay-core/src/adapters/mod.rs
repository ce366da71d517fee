//! # Infrastructure Adapters
//!
//! Infrastructure implementations of the message store interface.

pub mod filesystem_store;
pub mod memory_store;

pub use filesystem_store::FilesystemMessageStore;
pub use memory_store::InMemoryMessageStore;
