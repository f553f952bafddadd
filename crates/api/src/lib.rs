//! Pixeltrace coordinator: HTTP surface over the job store and the
//! compute provider.

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod state;
