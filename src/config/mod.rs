//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated)
//!     → owned by the dispatch loop
//!
//! Runtime mutation:
//!     exactly one sanctioned append (ServerConfig::append_listener),
//!     performed by the control channel when it provisions a listener
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - No hot reload: the listen list is append-only while the daemon runs

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ListenEntry;
pub use schema::ServerConfig;
