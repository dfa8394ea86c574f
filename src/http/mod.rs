//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout, panic capture)
//!     → admin router (breaker states, retry stats, resets)
//!     → JSON envelope back to the client
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
