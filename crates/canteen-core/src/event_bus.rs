//! Event bus for session-level order events.
//!
//! A thin wrapper over a tokio broadcast channel. Publishing never blocks
//! and never fails: with no subscribers an event is simply dropped, which
//! is the right behavior for optional collaborators like the status-history
//! recorder or notification delivery.

use canteen_types::OrderEvent;
use tokio::sync::broadcast;

/// Broadcast bus carrying [`OrderEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
	/// Creates a bus retaining up to `capacity` undelivered events per
	/// subscriber; slow subscribers that fall further behind see a lag
	/// error, not blocked publishers.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event to current subscribers.
	pub fn publish(&self, event: OrderEvent) {
		// An error here only means nobody is listening
		let _ = self.sender.send(event);
	}

	/// Subscribes to events published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
		self.sender.subscribe()
	}

	/// The raw sender, for services that publish directly.
	pub fn sender(&self) -> broadcast::Sender<OrderEvent> {
		self.sender.clone()
	}
}
