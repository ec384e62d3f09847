//! Bridge layer connecting lodge-ops to its inbound and outbound surfaces.
//!
//! This crate owns the whole command path: the signed-interaction HTTP
//! endpoint, the per-invocation routing state machine, the static command
//! table and its handlers, the chat REST client used for follow-ups and
//! alerts, and the introspectable agent catalog.
//!
//! Key modules:
//! - [`verify`] — Ed25519 verification of inbound interaction payloads
//! - [`router`] — received → verified → authorized → executing state machine
//! - [`commands`] — static command table, authorization rules
//! - [`handlers`] — per-command execution, fast and long-running
//! - [`chat`] — outbound chat platform client
//! - [`server`] — axum router + serve loop

pub mod agents;
pub mod chat;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod router;
pub mod server;
pub mod state;
pub mod verify;
