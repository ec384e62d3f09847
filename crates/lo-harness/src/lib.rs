//! Harness — operational machinery shared across the lodge-ops workspace.
//!
//! This crate provides the cross-cutting infrastructure that sits between
//! the command routing layer and external integrations:
//! - SSRF guarding for user-supplied outbound targets
//! - A shared minimum-interval gate for the workflow API
//! - Bounded retry for transient outbound failures
//! - The capacity-bounded, in-process trace store
//! - Fingerprinted, time-windowed alert deduplication

pub mod alerts;
pub mod rate_limiter;
pub mod retry;
pub mod trace_store;
pub mod url_guard;
