//! # Sentra API
//!
//! HTTP gateway for the Sentra compliance backend: fraud model management,
//! batch scanning over the worker queue, MCDA decision analysis, multi-agent
//! consensus, conversation mediation, and protocol translation.

pub mod consensus;
pub mod decisions;
pub mod error;
pub mod jobs;
pub mod mediation;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod translate;

pub use error::{ApiError, ApiResult};
pub use routes::api_router;
pub use server::{init_tracing, SentraServer, ServerConfig};
pub use state::AppState;
