//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → admin server stops accepting → drains → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
