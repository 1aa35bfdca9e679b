//! # guildwarden-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `guildwarden-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `guildwarden-app` (for port traits) and `guildwarden-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;
pub mod counting_repo;
pub mod deferral_repo;
pub mod error;
pub mod mirror_repo;
pub mod pool;
pub mod rule_repo;
pub mod task_log_store;
pub mod task_repo;

pub use counting_repo::SqliteCountingRepository;
pub use deferral_repo::SqliteDeferralRepository;
pub use error::StorageError;
pub use mirror_repo::SqliteMirrorRepository;
pub use pool::{Config, Database};
pub use rule_repo::SqliteRuleRepository;
pub use task_log_store::SqliteTaskLogStore;
pub use task_repo::SqliteTaskRepository;
