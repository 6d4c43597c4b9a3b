//! Inbound HTTP surface: report submission, CORS preflight, health checks.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
