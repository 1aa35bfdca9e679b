//! Event bus port — publish/subscribe for inbound platform events.

use std::future::Future;

use guildwarden_domain::error::WardenError;
use guildwarden_domain::event::InboundEvent;

/// Publishes inbound events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: InboundEvent) -> impl Future<Output = Result<(), WardenError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: InboundEvent) -> impl Future<Output = Result<(), WardenError>> + Send {
        (**self).publish(event)
    }
}
