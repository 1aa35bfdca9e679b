//! Platform events fanned out to the router over a tokio broadcast channel.
//!
//! The channel keeps the last `capacity` events. A receiver that falls
//! further behind loses the oldest ones and is told how many on its next
//! `recv`; see [`EventRouter::missed_events`](crate::event_router::EventRouter::missed_events).

use std::future::Future;

use tokio::sync::broadcast;

use guildwarden_domain::error::WardenError;
use guildwarden_domain::event::InboundEvent;

use crate::ports::EventPublisher;

pub struct InProcessEventBus {
    sender: broadcast::Sender<InboundEvent>,
    capacity: usize,
}

impl InProcessEventBus {
    /// `capacity` is how many unread events a slow receiver may lag before
    /// it starts missing them. Zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// A receiver for everything published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: InboundEvent) -> impl Future<Output = Result<(), WardenError>> + Send {
        // No router yet (startup, tests): the event has nowhere to go.
        if self.sender.send(event).is_err() {
            tracing::trace!("event published without a subscriber");
        }
        async { Ok(()) }
    }
}
