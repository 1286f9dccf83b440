//! DORM Core Types
//!
//! This crate provides the foundational types used throughout the DORM system:
//! - Identity types (RecordId)
//! - Value types (the store-native Value enum)
//! - Document representation and storage-path helpers
//! - Index specifications handed to the store driver

mod document;
mod id;
mod index;
mod value;

pub use document::*;
pub use id::*;
pub use index::*;
pub use value::*;
