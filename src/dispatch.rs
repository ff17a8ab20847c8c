//! Dispatch loop.
//!
//! # Responsibilities
//! - Multiplex readiness across stream listeners, control sockets, and
//!   occupied slots' notification pipes
//! - Free slots whose notification pipe closed, ahead of new accepts
//! - Route control datagrams to the trigger handler
//! - Route accepted connections through admission into the launcher
//! - Exit cleanly (pid-file removed) once the termination flag is raised
//!
//! # Design Decisions
//! - One task, one loop: all per-iteration work is synchronous and bounded
//!   by small fixed capacities; the only suspension point is the readiness
//!   wait, which has no timeout
//! - Readiness is polled in a fixed priority order (termination, pipe
//!   closures, datagrams, accepts) so a slot freed in an iteration is
//!   reusable before the accept that needs it
//! - Accept failures are transient by assumption: logged, never escalated

use std::io;
use std::net::SocketAddr;

use futures_util::future::select_all;
use tokio::net::{TcpStream, UdpSocket};

use crate::admission::PreAuthSlots;
use crate::config::ServerConfig;
use crate::control::wire::TRIGGER_WIRE_LEN;
use crate::control::TriggerHandler;
use crate::lifecycle::pidfile::PidFile;
use crate::lifecycle::signals::TerminationFlag;
use crate::net::ListenerSet;
use crate::observability::metrics;
use crate::session::SessionLauncher;

/// One byte beyond a record, so oversized datagrams are detectable after
/// truncation.
const RECV_BUF_LEN: usize = TRIGGER_WIRE_LEN + 1;

/// What a readiness wakeup delivered.
enum Event {
    /// Termination flag observed.
    Terminated,
    /// An occupied slot's notification pipe closed.
    SlotClosed(usize),
    /// One record (or receive error) on a control socket.
    Datagram {
        sock: usize,
        result: io::Result<(usize, SocketAddr)>,
        buf: [u8; RECV_BUF_LEN],
    },
    /// One pending connection (or accept error) on a stream listener.
    Incoming {
        listener: usize,
        result: io::Result<(TcpStream, SocketAddr)>,
    },
}

/// The daemon's single-tasked accept-and-dispatch engine.
pub struct Dispatcher {
    config: ServerConfig,
    listeners: ListenerSet,
    control: Vec<UdpSocket>,
    slots: PreAuthSlots,
    launcher: SessionLauncher,
    trigger: TriggerHandler,
    term: TerminationFlag,
    pid_file: Option<PidFile>,
}

impl Dispatcher {
    pub fn new(
        config: ServerConfig,
        listeners: ListenerSet,
        control: Vec<UdpSocket>,
        term: TerminationFlag,
        pid_file: Option<PidFile>,
    ) -> Self {
        let launcher = SessionLauncher::new(&config.session);
        let trigger = TriggerHandler::new(&config.control);
        Self {
            config,
            listeners,
            control,
            slots: PreAuthSlots::new(),
            launcher,
            trigger,
            term,
            pid_file,
        }
    }

    /// Run until the termination flag is raised, then clean up and return.
    pub async fn run(mut self) {
        tracing::info!(
            listeners = self.listeners.len(),
            control_sockets = self.control.len(),
            "Dispatch loop running"
        );

        loop {
            match self.next_event().await {
                Event::Terminated => break,
                Event::SlotClosed(index) => self.slots.release(index),
                Event::Datagram { sock, result, buf } => {
                    self.handle_datagram(sock, result, buf).await;
                }
                Event::Incoming { listener, result } => {
                    self.handle_incoming(listener, result);
                }
            }

            // A signal that arrived while an event was being handled must
            // not wait for further peer activity.
            if self.term.is_raised() {
                break;
            }
        }

        self.shutdown();
    }

    /// Block until something is ready.
    ///
    /// Biased order implements the loop's priorities: termination first,
    /// then pipe closures (so freed slots are immediately reusable), then
    /// datagrams, then accepts.
    async fn next_event(&mut self) -> Event {
        let Self {
            listeners,
            control,
            slots,
            term,
            ..
        } = self;

        tokio::select! {
            biased;
            _ = term.raised() => Event::Terminated,
            index = slots.next_closed() => Event::SlotClosed(index),
            (sock, result, buf) = Self::recv_datagram(control) => Event::Datagram { sock, result, buf },
            (listener, result) = Self::accept_any(listeners) => Event::Incoming { listener, result },
        }
    }

    /// Receive one datagram from whichever control socket fires first.
    /// Pends forever when no control socket is configured.
    async fn recv_datagram(
        control: &[UdpSocket],
    ) -> (usize, io::Result<(usize, SocketAddr)>, [u8; RECV_BUF_LEN]) {
        if control.is_empty() {
            return std::future::pending().await;
        }

        let recvs: Vec<_> = control
            .iter()
            .enumerate()
            .map(|(sock, socket)| {
                Box::pin(async move {
                    let mut buf = [0u8; RECV_BUF_LEN];
                    let result = socket.recv_from(&mut buf).await;
                    (sock, result, buf)
                })
            })
            .collect();

        let (ready, _, _) = select_all(recvs).await;
        ready
    }

    /// Accept from whichever stream listener fires first. The set is never
    /// empty: startup fails without at least one stream listener.
    async fn accept_any(
        listeners: &ListenerSet,
    ) -> (usize, io::Result<(TcpStream, SocketAddr)>) {
        let accepts: Vec<_> = listeners
            .iter()
            .enumerate()
            .map(|(listener, l)| Box::pin(async move { (listener, l.accept().await) }))
            .collect();

        let (ready, _, _) = select_all(accepts).await;
        ready
    }

    async fn handle_datagram(
        &mut self,
        sock: usize,
        result: io::Result<(usize, SocketAddr)>,
        buf: [u8; RECV_BUF_LEN],
    ) {
        let (len, peer) = match result {
            Ok(received) => received,
            Err(e) => {
                tracing::warn!(sock, error = %e, "Control socket receive failed");
                return;
            }
        };

        self.trigger
            .handle(&buf[..len], peer, &mut self.listeners, &mut self.config)
            .await;
    }

    fn handle_incoming(&mut self, listener: usize, result: io::Result<(TcpStream, SocketAddr)>) {
        let (stream, peer) = match result {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(listener, error = %e, "Accept failed");
                metrics::record_accept_error();
                return;
            }
        };

        let index = match self.slots.try_admit(peer.ip()) {
            Some(index) => index,
            None => {
                // Expected under load or abuse; dropping the stream closes
                // the connection immediately.
                tracing::debug!(
                    peer = %peer,
                    occupied = self.slots.occupied(),
                    "Admission refused"
                );
                metrics::record_rejected("admission_cap");
                return;
            }
        };

        match self.launcher.launch(stream, peer) {
            Ok(notify) => {
                self.slots.occupy(index, notify, peer.ip());
                metrics::record_admitted();
            }
            Err(e) => {
                // The reserved index was never occupied; it stays free.
                tracing::warn!(peer = %peer, error = %e, "Session launch failed");
                metrics::record_spawn_error();
            }
        }
    }

    /// Graceful shutdown: the only path that removes the pid-file.
    fn shutdown(self) {
        tracing::info!(occupied = self.slots.occupied(), "Terminated by signal");
        if let Some(pid_file) = self.pid_file {
            pid_file.remove();
        }
    }
}
