//! # guildwarden-domain
//!
//! Pure domain model for the guildwarden community automation core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Members** and inbound **Events** (role changes, message activity)
//! - Define **Automations** (autorole rules, conditional roles, channel
//!   restrictions, deferred grants)
//! - Define **Mirror links** and mirrored message rendering
//! - Define the **Counting** state machine and its expression evaluator
//! - Define **Scheduled tasks**, recurrence and **task log** entries
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod counting;
pub mod event;
pub mod member;
pub mod mirror;
pub mod task;
pub mod task_log;
