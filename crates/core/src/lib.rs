//! Domain types and pure rules for the Pixeltrace index coordinator.
//!
//! Nothing in this crate performs I/O. The store, provider and HTTP
//! layers build on these types so the lifecycle rules live in one place.

pub mod auth;
pub mod callback;
pub mod error;
pub mod job;
pub mod lifecycle;
pub mod submission;
pub mod types;
