//! Esurl beacon firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod beacon;
pub mod config;
pub mod events;
pub mod scheduler;

pub mod error;
pub mod pins;

// The hardware-facing modules compile on every target; the actual
// implementations are guarded by cfg attributes inside.
pub mod adapters;
pub mod drivers;
pub mod sensors;

pub use error::{AttError, Error, RadioError, RecordError, Result, StorageError};
