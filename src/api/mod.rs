//! HTTP API for promptbox.
//!
//! ## Endpoints
//!
//! - `POST /api/project` - Start (or regenerate) the project from a prompt
//! - `POST /api/project/follow-up` - Submit a follow-up prompt
//! - `GET /api/project/steps` - Ordered build-step sequence
//! - `PATCH /api/project/steps/{index}` - Apply a step status transition
//! - `GET /api/project/tree` - Current project file tree
//! - `GET /api/project/file?path=` - File content lookup by path
//! - `GET /api/project/preview` - Preview address, once the run process is ready
//! - `GET /api/health` - Health check

mod routes;
pub mod types;

pub use routes::{serve, AppState};
