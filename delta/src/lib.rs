//! DORM Delta
//!
//! Turns a dirty record into the minimal store update.
//!
//! Responsibilities:
//! - Resolve recorded storage paths through the instance
//! - Split the update into set and unset halves
//! - Serialize set values to their store-native representation

mod computer;

pub use computer::{compute_delta, Delta, DeltaError};
