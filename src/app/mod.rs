//! Application core: pure beacon logic, zero I/O.
//!
//! This module wires the configuration store and the refresh scheduler into
//! one service that reacts to attribute requests, link notifications and
//! timer expiries.  All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable without
//! a radio.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
