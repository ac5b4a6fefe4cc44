//! # jobq dashboard
//!
//! Read-only HTTP view of the queue: state counts, job listings, the dead
//! letter queue and aggregate metrics.

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::api_router;
pub use server::{DashboardConfig, DashboardServer};
pub use state::AppState;
