//! service-core: shared infrastructure for back-office services.

pub mod error;
pub mod middleware;

pub use axum;
pub use serde;
pub use serde_json;
pub use tracing;
pub use validator;
