//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the control index refers to an existing listen entry
//! - Validate value ranges (ports, backlog, listener count)
//! - Detect conflicting daemon modes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::net::listener::MAX_LISTEN_ADDR;

/// A single semantic configuration error.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no listen entries configured")]
    NoListeners,

    #[error("{configured} listen entries configured, maximum is {max}")]
    TooManyListeners { configured: usize, max: usize },

    #[error("listen entry {index} has port 0")]
    ZeroPort { index: usize },

    #[error("control_index {index} out of range ({listeners} listen entries)")]
    ControlIndexOutOfRange { index: usize, listeners: usize },

    #[error("daemon.background and daemon.inetd are mutually exclusive")]
    BackgroundInetdConflict,

    #[error("net.backlog must be positive, got {backlog}")]
    NonPositiveBacklog { backlog: i32 },
}

/// Validate a configuration, collecting every semantic error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listeners.is_empty() {
        errors.push(ValidationError::NoListeners);
    }

    if config.listeners.len() > MAX_LISTEN_ADDR {
        errors.push(ValidationError::TooManyListeners {
            configured: config.listeners.len(),
            max: MAX_LISTEN_ADDR,
        });
    }

    for (index, entry) in config.listeners.iter().enumerate() {
        if entry.port == 0 {
            errors.push(ValidationError::ZeroPort { index });
        }
    }

    if let Some(index) = config.control_index {
        if index >= config.listeners.len() {
            errors.push(ValidationError::ControlIndexOutOfRange {
                index,
                listeners: config.listeners.len(),
            });
        }
    }

    if config.daemon.background && config.daemon.inetd {
        errors.push(ValidationError::BackgroundInetdConflict);
    }

    if config.net.backlog <= 0 {
        errors.push(ValidationError::NonPositiveBacklog {
            backlog: config.net.backlog,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
