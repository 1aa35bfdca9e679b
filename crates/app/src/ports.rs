//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod counting_repo;
pub mod event_bus;
pub mod mirror_repo;
pub mod platform;
pub mod rule_repo;
pub mod task_repo;

pub use counting_repo::CountingRepository;
pub use event_bus::EventPublisher;
pub use mirror_repo::MirrorRepository;
pub use platform::{MembershipApi, MessagingApi};
pub use rule_repo::{DeferralRepository, RuleRepository};
pub use task_repo::{TaskLogStore, TaskRepository};
