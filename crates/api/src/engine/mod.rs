//! Job lifecycle engine: submission, state changes and status reads.

pub mod coordinator;
pub mod dispatcher;
pub mod status;

pub use coordinator::JobCoordinator;
pub use dispatcher::JobDispatcher;
pub use status::StatusQuery;
