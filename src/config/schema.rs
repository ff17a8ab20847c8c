//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Address used when no listen address is configured and for
/// trigger-provisioned listeners.
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Port used when no listen entry is configured.
pub const DEFAULT_PORT: u16 = 22;

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Ordered list of listen endpoints.
    pub listeners: Vec<ListenEntry>,

    /// Index into `listeners` of the entry served as a datagram (control)
    /// endpoint instead of a stream listener.
    pub control_index: Option<usize>,

    /// Daemonization, pid-file and service-program settings.
    pub daemon: DaemonConfig,

    /// Session-core handoff settings.
    pub session: SessionConfig,

    /// Control-channel policy.
    pub control: ControlConfig,

    /// Socket tuning.
    pub net: NetConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// Append a listen entry provisioned at runtime by the control channel.
    ///
    /// This is the single sanctioned mutation of the listen list after
    /// startup; the new port is bookkept identically to statically
    /// configured ones.
    pub fn append_listener(&mut self, address: &str, port: u16) {
        self.listeners.push(ListenEntry {
            address: address.to_string(),
            port,
        });
    }
}

/// One listen endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenEntry {
    /// Address or hostname to bind (a hostname may resolve to several
    /// sockets).
    pub address: String,

    /// Port to bind.
    pub port: u16,
}

/// Daemonization and service-program settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Detach into the background at startup.
    pub background: bool,

    /// Run as a service program: the connection is already on fd 0, no
    /// listeners or admission. Incompatible with `background`.
    pub inetd: bool,

    /// Pid-file path, written at startup and removed on graceful shutdown.
    pub pid_file: PathBuf,

    /// Log destination for the backgrounded process (null device if unset).
    pub log_file: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            background: false,
            inetd: false,
            pid_file: PathBuf::from("/var/run/rshd.pid"),
            log_file: None,
        }
    }
}

/// Session-core handoff settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Program executed per accepted connection. Receives the connection on
    /// fd 0 and the notification pipe on fd 1; must never return control.
    pub handler: PathBuf,

    /// Extra arguments passed to the handler.
    pub args: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handler: PathBuf::from("/usr/libexec/rshd-session"),
            args: Vec::new(),
        }
    }
}

/// Control-channel (trigger datagram) policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Permit the command-execution action of valid trigger records.
    ///
    /// Off by default: unauthenticated remote command execution requires an
    /// explicit deployment decision.
    pub allow_remote_exec: bool,

    /// Local address new trigger-provisioned listeners bind to.
    pub provision_address: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            allow_remote_exec: false,
            provision_address: DEFAULT_ADDRESS.to_string(),
        }
    }
}

/// Socket tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetConfig {
    /// Enable TCP fast-open on stream listeners.
    pub tcp_fast_open: bool,

    /// Listen backlog for stream listeners.
    pub backlog: i32,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            tcp_fast_open: true,
            backlog: 20,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
