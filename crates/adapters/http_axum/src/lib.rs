//! # guildwarden-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **read-only JSON diagnostics API**:
//!   - `GET /health` — liveness probe
//!   - `GET /api/task-logs?task=&limit=` — most recent task log entries
//!   - `GET /api/tasks` — scheduled tasks ordered by due time
//! - Map application results and [`WardenError`]s into HTTP responses
//!
//! Administration (rules, links, counting channels) goes through the chat
//! command layer, never through HTTP.
//!
//! ## Dependency rule
//! Depends on `guildwarden-app` (for port traits and services) and
//! `guildwarden-domain` (for the serialized domain types). Never leaks axum
//! types into the domain.
//!
//! [`WardenError`]: guildwarden_domain::error::WardenError

pub mod api;
pub mod error;
pub mod router;
pub mod state;

pub use router::build;
pub use state::AppState;
