//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     daemonize.rs (optional background re-spawn, before any runtime)
//!     → signals.rs (handlers installed, TerminationFlag handed out)
//!     → pidfile.rs (pid written)
//!     → dispatch loop runs
//!
//! Shutdown:
//!     SIGTERM/SIGINT → TerminationFlag raised (nothing else in handler
//!     context) → loop observes flag → pid-file removed → exit 0
//!
//! Fault:
//!     panic → diagnostic printed → abort, no cleanup
//! ```
//!
//! # Design Decisions
//! - Termination is cooperative; the loop is never interrupted mid-step
//! - The pid-file survives crashes by design: only graceful shutdown
//!   removes it

pub mod daemonize;
pub mod pidfile;
pub mod signals;

pub use pidfile::PidFile;
pub use signals::TerminationFlag;
