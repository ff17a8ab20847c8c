//! Remote-shell server daemon library.
//!
//! The connection-admission and session-dispatch engine: listening
//! endpoints, bounded pre-authentication admission, process-per-connection
//! session isolation, and the unauthenticated control channel, tied
//! together by a single-tasked dispatch loop.

pub mod admission;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod session;

pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use lifecycle::TerminationFlag;
