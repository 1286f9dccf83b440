//! DORM Store
//!
//! The document storage abstraction and its in-memory implementation.
//!
//! Responsibilities:
//! - Define the Store trait the persistence layer drives
//! - Evaluate filters against stored documents
//! - Provide MemoryStore, a collection-keyed in-memory backend
//!
//! # Module Structure
//!
//! - `store` - Store trait and StoreError
//! - `filter` - Filter conditions and document matching
//! - `memory` - MemoryStore with sequential id allocation

mod filter;
mod memory;
mod store;

pub use filter::Filter;
pub use memory::MemoryStore;
pub use store::{Store, StoreError};
