//! Session isolation subsystem.
//!
//! Each accepted connection runs in its own OS process with its own address
//! space: a crash or hang inside one session cannot corrupt the daemon or
//! other sessions. The only channel back to the daemon is the one-way
//! notification pipe wired at launch.

pub mod launcher;

pub use launcher::{LaunchError, SessionLauncher};
