//! # guildwarden-app
//!
//! Application layer — engines, use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RuleRepository` / `DeferralRepository` — autorole, conditional and
//!     restriction rules plus pending deferred grants
//!   - `CountingRepository` — per-channel counting state with versioned saves
//!   - `MirrorRepository` — mirror links and source→copy message mapping
//!   - `TaskRepository` / `TaskLogStore` — scheduled tasks and their run log
//!   - `MembershipApi` / `MessagingApi` — the chat platform
//! - Provide the **engines** reacting to inbound events:
//!   - `RuleEngine` — autorole cascades, conditional gating, deferrals
//!   - `CountingEngine` — counting channel state machine
//!   - `MirrorEngine` — copy, edit and delete mirrored messages
//!   - `Scheduler` — due-task dispatch with a bounded worker pool
//! - Provide the `Executor` that every side effect goes through (rate limit,
//!   timeout, retry of transient failures)
//! - Provide **in-process infrastructure** (event bus, event router, keyed
//!   locks) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `guildwarden-domain` only (plus `tokio` for sync and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod counting_engine;
pub mod event_bus;
pub mod event_router;
pub mod executor;
pub mod keyed;
pub mod mirror_engine;
pub mod ports;
pub mod rule_engine;
pub mod scheduler;
pub mod services;

#[cfg(test)]
mod testing;
