// Application layer - the lending operations exposed to any client (CLI, tests, ...)

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
