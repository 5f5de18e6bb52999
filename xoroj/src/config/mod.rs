//! Client configuration: schema and loading pipeline.

pub mod loader;
pub mod schema;

pub use loader::{ConfigLoader, LoadResult, LoadWarning};
pub use schema::{ApiConfig, ClientConfig, ControllerConfig};
