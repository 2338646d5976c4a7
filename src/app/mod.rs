//! Application layer: the external surface of the supervisor core.
//!
//! All interaction with hardware and storage happens through the **port
//! traits** defined in [`ports`], keeping the core testable without a
//! Raspberry Pi attached.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
