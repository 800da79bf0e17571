//! HTTP server for a Holm database.
//!
//! Exposes one replica's document set over a small JSON API:
//!
//! - `GET  /api/documents` — list all live documents
//! - `POST /api/documents` — store a JSON document
//! - `GET  /api/documents/:cid` — fetch a payload by content id
//! - `GET  /v1/health`, `GET /v1/info` — liveness and replica stats
//!
//! The server owns a [`holm_db::Database`] and shuts it down cleanly on
//! Ctrl-C or SIGTERM.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::HolmServer;
