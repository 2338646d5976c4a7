//! Incubator environmental supervisor library.
//!
//! Exposes the supervisor core and its adapters for the `incubatord`
//! daemon and for integration testing.  Hardware is reached only through
//! the port traits in [`app::ports`]; the [`adapters::sim`] board stands in
//! for the Raspberry Pi on hosts without GPIO.

#![deny(unused_must_use)]

pub mod actuators;
pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod gate;
pub mod interlock;
pub mod pins;
pub mod safety;
pub mod scheduler;
pub mod sensors;
pub mod state;
pub mod supervisor;
