//! Listening-endpoint management.
//!
//! # Responsibilities
//! - Bind the configured stream and datagram endpoints at startup
//! - Enforce the fixed listener capacity
//! - Grow the stream set at runtime (control-channel provisioning)
//! - Graceful handling of per-entry bind errors
//!
//! # Design Decisions
//! - Per-entry bind failure is logged and skipped; startup fails only when
//!   zero stream listeners result
//! - The set never shrinks while the dispatch loop runs

use std::net::SocketAddr;
use tokio::net::{TcpListener, UdpSocket};

use crate::config::ServerConfig;
use crate::net::socket;

/// Maximum number of bound endpoints of either kind.
pub const MAX_LISTEN_ADDR: usize = 20;

/// Error type for listener setup.
///
/// Individual bind failures are logged and skipped, so the only hard error
/// is ending up with nothing to listen on.
#[derive(Debug)]
pub enum ListenerError {
    /// No stream listener could be bound at startup.
    NoListeners,
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::NoListeners => write!(f, "No listening ports available"),
        }
    }
}

impl std::error::Error for ListenerError {}

/// The bounded, append-only set of stream listeners.
///
/// Built once at startup, grown only by the control channel, never shrunk
/// while the dispatch loop runs.
pub struct ListenerSet {
    streams: Vec<TcpListener>,
    backlog: i32,
    fast_open: bool,
}

impl ListenerSet {
    fn with_options(backlog: i32, fast_open: bool) -> Self {
        Self {
            streams: Vec::with_capacity(MAX_LISTEN_ADDR),
            backlog,
            fast_open,
        }
    }

    /// Number of bound stream listeners.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Iterate the bound stream listeners.
    pub fn iter(&self) -> impl Iterator<Item = &TcpListener> {
        self.streams.iter()
    }

    /// Local addresses of every bound stream listener, in set order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.streams.iter().filter_map(|l| l.local_addr().ok()).collect()
    }

    /// Resolve `address:port` and bind a stream listener per resolved
    /// address, within remaining capacity.
    ///
    /// Returns the number of listeners created; 0 on resolution failure,
    /// bind failure, or exhausted capacity; all logged, none fatal.
    pub async fn extend(&mut self, address: &str, port: u16) -> usize {
        let resolved = match tokio::net::lookup_host((address, port)).await {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::warn!(address, port, error = %e, "Failed to resolve listen address");
                return 0;
            }
        };

        let mut created = 0;
        for addr in resolved {
            if self.streams.len() >= MAX_LISTEN_ADDR {
                tracing::warn!(
                    address,
                    port,
                    max = MAX_LISTEN_ADDR,
                    "Listener capacity exhausted, not binding"
                );
                break;
            }
            match socket::bind_stream(addr, self.backlog, self.fast_open) {
                Ok(listener) => {
                    tracing::info!(address = %addr, "Listener bound");
                    self.streams.push(listener);
                    created += 1;
                }
                Err(e) => {
                    tracing::warn!(address = %addr, error = %e, "Failed listening");
                }
            }
        }
        created
    }
}

/// Bind every configured endpoint: stream listeners for ordinary entries,
/// datagram sockets for the entry at the control index.
///
/// Fatal only when zero stream listeners result.
pub async fn bind_all(
    config: &ServerConfig,
) -> Result<(ListenerSet, Vec<UdpSocket>), ListenerError> {
    let mut set = ListenerSet::with_options(config.net.backlog, config.net.tcp_fast_open);
    let mut datagrams: Vec<UdpSocket> = Vec::new();

    for (index, entry) in config.listeners.iter().enumerate() {
        if config.control_index == Some(index) {
            bind_datagram_entry(&entry.address, entry.port, &mut datagrams).await;
        } else {
            set.extend(&entry.address, entry.port).await;
        }
    }

    if set.is_empty() {
        return Err(ListenerError::NoListeners);
    }
    Ok((set, datagrams))
}

async fn bind_datagram_entry(address: &str, port: u16, datagrams: &mut Vec<UdpSocket>) {
    let resolved = match tokio::net::lookup_host((address, port)).await {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::warn!(address, port, error = %e, "Failed to resolve control address");
            return;
        }
    };

    for addr in resolved {
        if datagrams.len() >= MAX_LISTEN_ADDR {
            tracing::warn!(address, port, max = MAX_LISTEN_ADDR, "Control socket capacity exhausted");
            break;
        }
        match socket::bind_datagram(addr) {
            Ok(sock) => {
                tracing::info!(address = %addr, "Control socket bound");
                datagrams.push(sock);
            }
            Err(e) => {
                tracing::warn!(address = %addr, error = %e, "Failed opening control socket");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenEntry;

    #[tokio::test]
    async fn extend_clamps_at_capacity() {
        let mut set = ListenerSet::with_options(4, false);
        for _ in 0..MAX_LISTEN_ADDR {
            assert_eq!(set.extend("127.0.0.1", 0).await, 1);
        }
        assert_eq!(set.len(), MAX_LISTEN_ADDR);
        assert_eq!(set.extend("127.0.0.1", 0).await, 0);
        assert_eq!(set.len(), MAX_LISTEN_ADDR);
    }

    #[tokio::test]
    async fn bind_all_requires_one_stream_listener() {
        // The only entry is the control (datagram) endpoint.
        let mut config = ServerConfig::default();
        config.listeners.push(ListenEntry {
            address: "127.0.0.1".to_string(),
            port: 0,
        });
        config.control_index = Some(0);

        match bind_all(&config).await {
            Err(ListenerError::NoListeners) => {}
            other => panic!("expected NoListeners, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn bind_all_survives_one_bad_entry() {
        let mut config = ServerConfig::default();
        // Unresolvable hostname: logged and skipped.
        config.listeners.push(ListenEntry {
            address: "host.invalid.".to_string(),
            port: 2222,
        });
        config.listeners.push(ListenEntry {
            address: "127.0.0.1".to_string(),
            port: 0,
        });

        let (set, datagrams) = bind_all(&config).await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(datagrams.is_empty());
    }
}
