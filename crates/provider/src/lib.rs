//! Clients for the external compute provider that runs indexing jobs.
//!
//! The coordinator only needs one operation from a provider: hand over a
//! job together with the address to call back. [`ComputeProvider`] is
//! that seam; [`HttpProvider`] talks to a remote serverless endpoint and
//! [`ProcessProvider`] launches the job runner on the local machine.

use async_trait::async_trait;

pub mod error;
pub mod http;
pub mod process;
pub mod request;

pub use error::ProviderError;
pub use http::HttpProvider;
pub use process::ProcessProvider;
pub use request::DispatchRequest;

/// An external system that runs indexing jobs out of process.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Hand a job to the provider. Called exactly once per submission.
    ///
    /// The returned JSON is the provider's opaque acknowledgement and is
    /// stored as the job's `dispatchInfo`.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<serde_json::Value, ProviderError>;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;
}
