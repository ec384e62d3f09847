//! Logging infrastructure for lodge-ops services.
//!
//! Structured, leveled log emission built on the `tracing` ecosystem.
//! Every structured field set passes through the secret redactor before
//! it reaches the subscriber; logging calls never propagate failures to
//! their callers.

pub mod logging;
