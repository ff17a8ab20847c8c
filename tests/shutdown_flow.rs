//! Graceful-termination behavior: pid-file lifecycle and dispatch stop.

use std::time::Duration;

use rshd::lifecycle::{PidFile, TerminationFlag};
use rshd::{net, Dispatcher};
use tokio::net::TcpStream;
use tokio::time::timeout;

mod common;

#[tokio::test]
async fn termination_removes_pidfile_and_stops_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let pid_path = dir.path().join("rshd.pid");

    let config = common::holding_config();
    let (listeners, control) = net::bind_all(&config).await.unwrap();
    let addr = listeners.local_addrs()[0];

    let term = TerminationFlag::new();
    let pid_file = PidFile::create(&pid_path).unwrap();
    let dispatcher = Dispatcher::new(config, listeners, control, term.clone(), Some(pid_file));
    let dispatcher = tokio::spawn(dispatcher.run());

    let content = std::fs::read_to_string(&pid_path).unwrap();
    assert_eq!(content.trim().parse::<u32>().unwrap(), std::process::id());

    // The loop is parked in its readiness wait; raising the flag must end
    // it within the iteration.
    term.raise();
    timeout(Duration::from_secs(5), dispatcher)
        .await
        .expect("dispatcher should stop promptly")
        .unwrap();

    assert!(!pid_path.exists(), "graceful shutdown removes the pid-file");

    // No further dispatch: the listener went down with the loop.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn flag_raised_before_run_exits_immediately() {
    let config = common::holding_config();
    let (listeners, control) = net::bind_all(&config).await.unwrap();

    let term = TerminationFlag::new();
    term.raise();

    let dispatcher = Dispatcher::new(config, listeners, control, term, None);
    timeout(Duration::from_secs(5), dispatcher.run())
        .await
        .expect("run should observe the flag without waiting for traffic");
}
