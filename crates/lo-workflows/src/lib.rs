//! Outbound CI/CD integration for lodge-ops.
//!
//! Speaks the GitHub Actions REST API behind the [`client::WorkflowApi`]
//! trait: triggering workflow runs, locating them by correlation id, and
//! polling for their conclusion. Every call passes the shared rate gate
//! and a bounded retry policy. Also hosts the guarded outbound health
//! checker used by deploy commands.

pub mod client;
pub mod dispatch;
pub mod health;
pub mod types;
