//! Session process launcher.
//!
//! # Responsibilities
//! - Start one isolated OS process per admitted connection
//! - Hand the connection to the session core as fd 0
//! - Wire the notification pipe whose closure frees the admission slot
//! - Collect session exit statuses without blocking the dispatch loop
//!
//! # Design Decisions
//! - The session core is an external program; the daemon never speaks the
//!   shell protocol itself
//! - Listening sockets are close-on-exec, so children never inherit them
//! - The child detaches into its own session (`setsid`) before exec

use std::io;
use std::net::SocketAddr;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::process::Stdio;

use rand::RngCore;
use tokio::net::TcpStream;
use tokio::process::{ChildStdout, Command};
use uuid::Uuid;

use crate::config::schema::SessionConfig;

/// Error type for session launches.
#[derive(Debug)]
pub enum LaunchError {
    /// Could not prepare the accepted connection for handoff.
    Handoff(io::Error),
    /// Could not spawn the session process.
    Spawn(io::Error),
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchError::Handoff(e) => write!(f, "Failed to prepare connection: {}", e),
            LaunchError::Spawn(e) => write!(f, "Failed to spawn session: {}", e),
        }
    }
}

impl std::error::Error for LaunchError {}

/// Launches the configured session-core program per admitted connection.
pub struct SessionLauncher {
    handler: PathBuf,
    args: Vec<String>,
}

impl SessionLauncher {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            handler: config.handler.clone(),
            args: config.args.clone(),
        }
    }

    /// Start the session process for one accepted connection.
    ///
    /// The connection becomes the child's fd 0 (restored to blocking mode);
    /// the child's piped stdout is the notification channel. The session
    /// core must close that pipe exactly once, at authentication success
    /// or definitive abandonment (process exit counts), and the returned
    /// read end is what the dispatch loop watches for it.
    ///
    /// Fresh entropy is mixed in for the child: a random session id and a
    /// random seed, both passed through the environment.
    ///
    /// A failed spawn leaves the parent unaffected; the connection is
    /// closed when the error is returned.
    pub fn launch(&self, stream: TcpStream, peer: SocketAddr) -> Result<ChildStdout, LaunchError> {
        let session_id = Uuid::new_v4();

        let stream = stream.into_std().map_err(LaunchError::Handoff)?;
        stream.set_nonblocking(false).map_err(LaunchError::Handoff)?;

        let mut command = Command::new(&self.handler);
        command
            .args(&self.args)
            .stdin(Stdio::from(OwnedFd::from(stream)))
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .env("RSHD_SESSION_ID", session_id.to_string())
            .env("RSHD_SESSION_SEED", fresh_seed())
            .env("RSHD_PEER_ADDR", peer.to_string());

        // The session must not stay in the daemon's session/process group.
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(LaunchError::Spawn)?;
        let notify = child
            .stdout
            .take()
            .expect("stdout was configured as piped");

        tracing::info!(
            session = %session_id,
            peer = %peer,
            pid = child.id().unwrap_or(0),
            "Session started"
        );

        // Exit statuses are collected off the dispatch path; slot release is
        // driven by the notification pipe, not by process exit.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    tracing::debug!(session = %session_id, %status, "Session exited");
                }
                Err(e) => {
                    tracing::warn!(session = %session_id, error = %e, "Failed to collect session exit");
                }
            }
        });

        Ok(notify)
    }
}

/// Service-program mode: the connection is already on fd 0, inherited from
/// the super-server, so this process becomes the session outright. There is
/// no admission slot and no notification pipe to wire.
///
/// Only returns on exec failure.
pub fn exec_service_program(config: &SessionConfig) -> io::Error {
    use std::os::unix::process::CommandExt;

    // The super-server may have already called setsid() after forking, so
    // a failure here is ignored.
    unsafe {
        libc::setsid();
    }

    let mut command = std::process::Command::new(&config.handler);
    command
        .args(&config.args)
        .env("RSHD_SESSION_ID", Uuid::new_v4().to_string())
        .env("RSHD_SESSION_SEED", fresh_seed());
    command.exec()
}

/// 32 bytes from the OS entropy source, hex-encoded for the environment.
fn fresh_seed() -> String {
    let mut seed = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    seed.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn sh_launcher(script: &str) -> SessionLauncher {
        SessionLauncher {
            handler: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    async fn connected_pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, peer) = listener.accept().await.unwrap();
        (client, server, peer)
    }

    #[tokio::test]
    async fn notification_pipe_closes_when_handler_exits() {
        let (_client, server, peer) = connected_pair().await;
        let launcher = sh_launcher("exit 0");

        let mut notify = launcher.launch(server, peer).unwrap();
        let mut sink = [0u8; 8];
        let n = tokio::time::timeout(std::time::Duration::from_secs(5), notify.read(&mut sink))
            .await
            .expect("handler should exit promptly")
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn handler_reads_the_connection_on_fd0() {
        use tokio::io::AsyncWriteExt;

        let (mut client, server, peer) = connected_pair().await;
        // Echo the first line from the connection back to the notification
        // pipe, then exit (closing the pipe).
        let launcher = sh_launcher("read line; printf '%s' \"$line\"");

        let mut notify = launcher.launch(server, peer).unwrap();
        client.write_all(b"hello\n").await.unwrap();

        let mut echoed = Vec::new();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            notify.read_to_end(&mut echoed),
        )
        .await
        .expect("handler should exit promptly")
        .unwrap();
        assert_eq!(echoed, b"hello");
    }

    #[tokio::test]
    async fn failed_spawn_reports_and_leaves_parent_intact() {
        let (_client, server, peer) = connected_pair().await;
        let launcher = SessionLauncher {
            handler: PathBuf::from("/nonexistent/rshd-session"),
            args: Vec::new(),
        };

        match launcher.launch(server, peer) {
            Err(LaunchError::Spawn(_)) => {}
            other => panic!("expected spawn failure, got {:?}", other.map(|_| ())),
        }
    }
}
