//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the rules of the firmware-update receiver: the
//! update session state machine and the service that feeds it decoded
//! messages. All interaction with flash, the SoC and the log stream
//! happens through **port traits** defined in [`ports`], keeping this
//! layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod session;
