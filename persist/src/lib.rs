//! DORM Persist
//!
//! The persistence session: records in, documents out, and back.
//!
//! Responsibilities:
//! - Drive inserts, delta saves, and reloads against a store
//! - Scope polymorphic queries by discriminator and hydrate exact types
//! - Resolve lazy references and cache the fetched instances
//! - Enforce delete rules through the cascading delete engine
//!
//! # Module Structure
//!
//! - `error` - PersistError taxonomy
//! - `session` - Session over a registry and a store
//! - `resolve` - two-state reference resolution
//! - `delete` - scan/apply/commit cascading deletes

mod delete;
mod error;
mod resolve;
mod session;

pub use delete::DeleteOutcome;
pub use error::PersistError;
pub use session::Session;
