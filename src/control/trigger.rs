//! Control-record handling.
//!
//! # Responsibilities
//! - Decode one control record per datagram wakeup
//! - Provision a new stream listener on the requested port
//! - Optionally execute the embedded command in a privilege-dropped helper
//!
//! # Design Decisions
//! - This is the only unauthenticated path that can run a local command;
//!   the execution arm is off unless deployment explicitly opts in
//! - The helper wait is synchronous: the dispatch loop stalls until the
//!   helper exits, a deliberate simplicity/availability trade-off

use std::io;
use std::net::SocketAddr;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::schema::ControlConfig;
use crate::config::ServerConfig;
use crate::control::wire::TriggerDatagram;
use crate::net::ListenerSet;
use crate::observability::metrics;

/// Identity the helper drops to before executing the embedded command.
pub const TRIGGER_EXEC_UID: libc::uid_t = 1000;
pub const TRIGGER_EXEC_GID: libc::gid_t = 100;

/// Handles control records received on the datagram endpoint.
pub struct TriggerHandler {
    allow_remote_exec: bool,
    provision_address: String,
}

impl TriggerHandler {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            allow_remote_exec: config.allow_remote_exec,
            provision_address: config.provision_address.clone(),
        }
    }

    /// Consume one datagram. Returns the number of listeners created.
    ///
    /// A malformed record (wrong size, wrong sentinel, non-UTF-8 command)
    /// is discarded with no side effects. A valid record provisions a
    /// listener on the embedded port and, when the execution arm is
    /// enabled, runs the embedded command through a helper.
    pub async fn handle(
        &self,
        datagram: &[u8],
        peer: SocketAddr,
        listeners: &mut ListenerSet,
        config: &mut ServerConfig,
    ) -> usize {
        let record = match TriggerDatagram::parse(datagram) {
            Some(record) => record,
            None => {
                // Expected outcome for stray traffic, not an error.
                tracing::debug!(peer = %peer, len = datagram.len(), "Discarding control datagram");
                metrics::record_trigger(false);
                return 0;
            }
        };

        tracing::info!(peer = %peer, port = record.port, "Control record accepted");
        metrics::record_trigger(true);

        if self.allow_remote_exec {
            self.run_helper(&record.command).await;
        } else if !record.command.is_empty() {
            tracing::warn!(
                peer = %peer,
                "Control record carried a command but remote execution is disabled"
            );
        }

        let created = listeners.extend(&self.provision_address, record.port).await;
        if created > 0 {
            // The new port is bookkept like a statically configured one.
            config.append_listener(&self.provision_address, record.port);
            metrics::record_provisioned(created);
            tracing::info!(port = record.port, created, "Provisioned listener from control record");
        }
        created
    }

    /// Execute the embedded command in a short-lived helper under the fixed
    /// non-administrative identity, waiting synchronously for its exit.
    async fn run_helper(&self, command: &str) {
        let mut helper = Command::new("sh");
        helper
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Identity drop applies when the daemon runs as root; a failed drop
        // aborts the helper rather than running it privileged.
        unsafe {
            helper.pre_exec(|| {
                if libc::geteuid() == 0 {
                    if libc::setgid(TRIGGER_EXEC_GID) != 0 {
                        return Err(io::Error::last_os_error());
                    }
                    if libc::setuid(TRIGGER_EXEC_UID) != 0 {
                        return Err(io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }

        match helper.status().await {
            Ok(status) => {
                tracing::info!(%status, "Control helper finished");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to run control helper");
            }
        }
    }
}
