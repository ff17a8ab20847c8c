//! Shared utilities for integration testing.

use std::net::SocketAddr;

use rshd::config::{ListenEntry, ServerConfig};
use rshd::lifecycle::TerminationFlag;
use rshd::{net, Dispatcher};

/// Reserve an ephemeral port by binding and immediately dropping a
/// listener.
#[allow(dead_code)]
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Config with one local stream listener on an ephemeral port and a stub
/// session handler that holds its slot until the client sends a line (or
/// closes the connection).
#[allow(dead_code)]
pub fn holding_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listeners.push(ListenEntry {
        address: "127.0.0.1".to_string(),
        port: 0,
    });
    config.session.handler = "/bin/sh".into();
    config.session.args = vec!["-c".to_string(), "read _line".to_string()];
    config
}

/// Bind the configured endpoints and run a dispatcher in the background.
///
/// Returns the bound stream addresses, the bound control addresses, the
/// termination flag, and the dispatcher task handle.
#[allow(dead_code)]
pub async fn start_dispatcher(
    config: ServerConfig,
) -> (
    Vec<SocketAddr>,
    Vec<SocketAddr>,
    TerminationFlag,
    tokio::task::JoinHandle<()>,
) {
    let (listeners, control) = net::bind_all(&config).await.unwrap();
    let stream_addrs = listeners.local_addrs();
    let control_addrs = control.iter().filter_map(|s| s.local_addr().ok()).collect();

    let term = TerminationFlag::new();
    let dispatcher = Dispatcher::new(config, listeners, control, term.clone(), None);
    let handle = tokio::spawn(dispatcher.run());

    (stream_addrs, control_addrs, term, handle)
}
