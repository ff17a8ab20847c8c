//! Control-channel behavior: listener provisioning and the policy-gated
//! helper execution.

use std::time::Duration;

use rshd::config::{ListenEntry, ServerConfig};
use rshd::control::TriggerDatagram;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::sleep;

mod common;

fn control_config() -> ServerConfig {
    let mut config = common::holding_config();
    config.listeners.push(ListenEntry {
        address: "127.0.0.1".to_string(),
        port: 0,
    });
    config.control_index = Some(1);
    config.control.provision_address = "127.0.0.1".to_string();
    config
}

async fn send_record(control: std::net::SocketAddr, payload: &[u8]) {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sock.send_to(payload, control).await.unwrap();
}

#[tokio::test]
async fn valid_record_provisions_listener_and_runs_helper_once() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("helper-ran");

    let mut config = control_config();
    config.control.allow_remote_exec = true;

    let (_addrs, control_addrs, term, _dispatcher) = common::start_dispatcher(config).await;

    let new_port = common::free_port();
    let record = TriggerDatagram {
        port: new_port,
        command: format!("printf x >> {}", marker.display()),
    };
    send_record(control_addrs[0], &record.encode()).await;

    // The provisioned listener comes up within the next loop iterations.
    let mut connected = false;
    for _ in 0..50 {
        if TcpStream::connect(("127.0.0.1", new_port)).await.is_ok() {
            connected = true;
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert!(connected, "provisioned listener should accept connections");

    // Exactly one helper execution.
    let content = std::fs::read_to_string(&marker).expect("helper should have run");
    assert_eq!(content, "x");

    term.raise();
}

#[tokio::test]
async fn exec_disabled_still_provisions_but_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("helper-ran");

    // Default policy: no remote execution.
    let config = control_config();
    let (_addrs, control_addrs, term, _dispatcher) = common::start_dispatcher(config).await;

    let new_port = common::free_port();
    let record = TriggerDatagram {
        port: new_port,
        command: format!("printf x >> {}", marker.display()),
    };
    send_record(control_addrs[0], &record.encode()).await;

    let mut connected = false;
    for _ in 0..50 {
        if TcpStream::connect(("127.0.0.1", new_port)).await.is_ok() {
            connected = true;
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert!(connected, "provisioning does not depend on the exec policy");
    assert!(!marker.exists(), "no helper may run while exec is disabled");

    term.raise();
}

#[tokio::test]
async fn sentinel_mismatch_has_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("helper-ran");

    let mut config = control_config();
    config.control.allow_remote_exec = true;

    let (addrs, control_addrs, term, _dispatcher) = common::start_dispatcher(config).await;

    let new_port = common::free_port();
    let mut payload = TriggerDatagram {
        port: new_port,
        command: format!("printf x >> {}", marker.display()),
    }
    .encode();
    payload[0] ^= 0xFF;
    send_record(control_addrs[0], &payload).await;

    sleep(Duration::from_millis(500)).await;

    assert!(
        TcpStream::connect(("127.0.0.1", new_port)).await.is_err(),
        "no listener may appear for a bad sentinel"
    );
    assert!(!marker.exists(), "no helper may run for a bad sentinel");

    // The daemon is still alive and serving its configured listener.
    assert!(TcpStream::connect(addrs[0]).await.is_ok());

    term.raise();
}
