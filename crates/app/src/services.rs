//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod diagnostics_service;
pub mod mirror_link_service;
pub mod rule_service;

pub use diagnostics_service::DiagnosticsService;
pub use mirror_link_service::MirrorLinkService;
pub use rule_service::RuleService;
