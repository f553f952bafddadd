//! Request handlers.
//!
//! Handlers delegate to the engine components in [`AppState`] and map
//! errors via [`AppError`].
//!
//! [`AppState`]: crate::state::AppState
//! [`AppError`]: crate::error::AppError

pub mod callback;
pub mod jobs;
