//! Quorum API crate - axum HTTP server and route handlers.
//!
//! Exposes question answering, document upload, source management and the
//! call webhook over REST.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
