//! Control-channel subsystem.
//!
//! A secondary, unauthenticated datagram endpoint carrying fixed-size
//! records that request dynamic listener provisioning and, where deployment
//! policy allows, command execution. Records are sentinel-gated only:
//! treat everything arriving here as hostile.

pub mod trigger;
pub mod wire;

pub use trigger::TriggerHandler;
pub use wire::{TriggerDatagram, TRIGGER_MAGIC, TRIGGER_WIRE_LEN};
