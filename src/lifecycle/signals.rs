//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGPIPE)
//! - Translate termination signals into the cooperative `TerminationFlag`
//! - Install the fatal-fault hook
//!
//! # Design Decisions
//! - Signal context does nothing beyond raising the flag and waking the
//!   loop; the loop observes the flag once per iteration, so no in-flight
//!   dispatch step is interrupted mid-operation
//! - SIGPIPE is swallowed: a vanished peer surfaces as a write error, not
//!   a dead daemon
//! - Child reaping is delegated to the runtime's process driver; exit
//!   statuses are collected by the launcher's wait tasks
//! - A panic is a fault: process state is no longer trustworthy, so the
//!   hook prints a diagnostic and aborts without cleanup

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;

/// Error type for signal installation.
#[derive(Debug)]
pub enum SignalError {
    /// Failed to register a handler.
    Register(std::io::Error),
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalError::Register(e) => write!(f, "Failed to register signal handler: {}", e),
        }
    }
}

impl std::error::Error for SignalError {}

/// Process-wide cooperative termination flag.
///
/// Raised asynchronously from signal context (or by tests); observed by
/// the dispatch loop at its readiness point and once per iteration.
#[derive(Clone)]
pub struct TerminationFlag {
    inner: Arc<FlagInner>,
}

struct FlagInner {
    raised: AtomicBool,
    notify: Notify,
}

impl TerminationFlag {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FlagInner {
                raised: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Raise the flag and wake any waiter. This is all that ever happens
    /// in signal context.
    pub fn raise(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Wait until the flag is raised. Returns immediately if it already is.
    pub async fn raised(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register interest before the flag check: `notify_waiters` only
            // wakes already-registered waiters, so checking first would leave
            // a window where a raise is missed.
            notified.as_mut().enable();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for TerminationFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Install process-wide signal handling. Failure here is process-fatal:
/// a daemon that cannot be told to stop must not start.
pub fn install() -> Result<TerminationFlag, SignalError> {
    let flag = TerminationFlag::new();

    let mut terminate = signal(SignalKind::terminate()).map_err(SignalError::Register)?;
    let mut interrupt = signal(SignalKind::interrupt()).map_err(SignalError::Register)?;
    let mut pipe = signal(SignalKind::pipe()).map_err(SignalError::Register)?;

    let term_flag = flag.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = terminate.recv() => {}
            _ = interrupt.recv() => {}
        }
        term_flag.raise();
    });

    // Drain SIGPIPE so it never takes the default disposition.
    tokio::spawn(async move { while pipe.recv().await.is_some() {} });

    install_fault_hook();

    Ok(flag)
}

/// Treat any panic as a fatal fault: print the diagnostic and terminate
/// immediately, skipping destructors and pid-file cleanup.
fn install_fault_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_hook(info);
        eprintln!("rshd: fatal fault, aborting without cleanup");
        std::process::abort();
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn raised_flag_wakes_waiter() {
        let flag = TerminationFlag::new();
        let waiter = flag.clone();
        let handle = tokio::spawn(async move { waiter.raised().await });

        tokio::task::yield_now().await;
        assert!(!flag.is_raised());
        flag.raise();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn raised_returns_immediately_when_already_set() {
        let flag = TerminationFlag::new();
        flag.raise();
        tokio::time::timeout(Duration::from_millis(100), flag.raised())
            .await
            .expect("no wait when already raised");
    }
}
