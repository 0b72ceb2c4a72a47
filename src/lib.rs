//! bleota firmware library.
//!
//! Exposes the pure-logic modules for integration testing, fuzzing and
//! host-side tooling. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod protocol;
