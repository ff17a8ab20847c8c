//! Pre-authentication slot registry.
//!
//! # Responsibilities
//! - Track every accepted-but-not-yet-authenticated connection
//! - Enforce the global and per-address admission caps
//! - Surface notification-pipe closure so slots return to the pool
//!
//! # Design Decisions
//! - Fixed-size array with linear scan: capacities are tiny constants, so
//!   admission cost and memory footprint stay predictable
//! - Slots are exclusively owned and mutated by the parent process; session
//!   children only ever hold the write end of their notification pipe

use std::net::IpAddr;

use futures_util::future::select_all;
use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;

/// Maximum concurrent pre-authentication connections, across all peers.
pub const MAX_UNAUTH_CLIENTS: usize = 30;

/// Maximum concurrent pre-authentication connections per peer address.
pub const MAX_UNAUTH_PER_IP: usize = 5;

/// Bookkeeping for one not-yet-authenticated connection.
struct PreAuthSlot {
    /// Read end of the session child's notification pipe. EOF here is the
    /// sole signal that the slot may be reused.
    notify: ChildStdout,
    /// Peer address, for the per-address cap.
    peer: IpAddr,
}

/// The bounded registry of pre-authentication slots.
pub struct PreAuthSlots {
    slots: [Option<PreAuthSlot>; MAX_UNAUTH_CLIENTS],
}

impl PreAuthSlots {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Scan for admission: one pass computing total occupancy, occupancy
    /// matching `peer`, and the first free index.
    ///
    /// Returns the free index when both caps allow admission; the caller
    /// completes the reservation with [`occupy`](Self::occupy) once the
    /// session process is running. `None` is a rejection, not an error.
    pub fn try_admit(&self, peer: IpAddr) -> Option<usize> {
        let mut total = 0;
        let mut matching = 0;
        let mut free = None;

        for (index, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(occupied) => {
                    total += 1;
                    if occupied.peer == peer {
                        matching += 1;
                    }
                }
                None => {
                    if free.is_none() {
                        free = Some(index);
                    }
                }
            }
        }

        if total >= MAX_UNAUTH_CLIENTS || matching >= MAX_UNAUTH_PER_IP {
            return None;
        }
        free
    }

    /// Complete an admission: store the notification pipe and peer address
    /// in the index returned by [`try_admit`](Self::try_admit).
    pub fn occupy(&mut self, index: usize, notify: ChildStdout, peer: IpAddr) {
        debug_assert!(self.slots[index].is_none(), "occupying a live slot");
        self.slots[index] = Some(PreAuthSlot { notify, peer });
        tracing::debug!(slot = index, peer = %peer, occupied = self.occupied(), "Pre-auth slot occupied");
    }

    /// Mark the slot free and discard the stored address.
    pub fn release(&mut self, index: usize) {
        if let Some(slot) = self.slots[index].take() {
            tracing::debug!(slot = index, peer = %slot.peer, "Pre-auth slot released");
        }
    }

    /// Wait until some occupied slot's notification pipe closes and return
    /// its index. Pends forever while no slot is occupied.
    ///
    /// Stray bytes on a pipe are drained; closure is the signal. The
    /// returned future is cancel-safe: a partially drained pipe is simply
    /// watched again on the next call.
    pub async fn next_closed(&mut self) -> usize {
        let watches: Vec<_> = self
            .slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_mut().map(|occupied| {
                    Box::pin(async move {
                        let mut sink = [0u8; 64];
                        loop {
                            match occupied.notify.read(&mut sink).await {
                                Ok(0) | Err(_) => return index,
                                Ok(_) => {}
                            }
                        }
                    })
                })
            })
            .collect();

        if watches.is_empty() {
            return std::future::pending().await;
        }
        let (index, _, _) = select_all(watches).await;
        index
    }
}

impl Default for PreAuthSlots {
    fn default() -> Self {
        Self::new()
    }
}
