use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Receiver half returned by [`EventTarget::subscribe`].
pub type EventReceiver<E> = broadcast::Receiver<E>;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Identifier of one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Publish/subscribe fan-out for one event producer.
///
/// Callback listeners run synchronously on the dispatching task, in
/// registration order. Async consumers use [`EventTarget::subscribe`]
/// and receive the same events through a bounded broadcast channel.
pub struct EventTarget<E> {
	listeners: Mutex<Vec<(ListenerId, Listener<E>)>>,
	next_id: AtomicU64,
	channel: broadcast::Sender<E>,
}

impl<E> std::fmt::Debug for EventTarget<E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventTarget")
			.field("listeners", &self.listeners.lock().len())
			.field("subscribers", &self.channel.receiver_count())
			.finish()
	}
}

impl<E> EventTarget<E>
where
	E: Clone + Send + 'static,
{
	/// Creates a target whose async subscribers buffer up to `capacity` events.
	pub fn new(capacity: usize) -> Self {
		let (channel, _) = broadcast::channel(capacity.max(1));
		Self {
			listeners: Mutex::new(Vec::new()),
			next_id: AtomicU64::new(0),
			channel,
		}
	}

	/// Registers a callback listener.
	pub fn add_listener(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.listeners.lock().push((id, Arc::new(listener)));
		id
	}

	/// Removes a callback listener. Returns false if it was not registered.
	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.lock();
		let before = listeners.len();
		listeners.retain(|(existing, _)| *existing != id);
		listeners.len() != before
	}

	/// Subscribes an async receiver.
	pub fn subscribe(&self) -> EventReceiver<E> {
		self.channel.subscribe()
	}

	/// Number of callback listeners plus live async subscribers.
	pub fn listener_count(&self) -> usize {
		self.listeners.lock().len() + self.channel.receiver_count()
	}

	/// Delivers `event` to every listener and subscriber.
	///
	/// The listener list is snapshotted first, so listeners may add or
	/// remove listeners (or dispatch) without deadlocking.
	pub fn dispatch(&self, event: E) {
		let listeners: Vec<Listener<E>> = self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
		for listener in &listeners {
			listener(&event);
		}
		let _ = self.channel.send(event);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicUsize;

	use super::*;

	#[test]
	fn listeners_run_in_registration_order() {
		let target = EventTarget::<u32>::new(4);
		let seen = Arc::new(Mutex::new(Vec::new()));
		for tag in ["a", "b"] {
			let seen = Arc::clone(&seen);
			target.add_listener(move |n| seen.lock().push(format!("{tag}{n}")));
		}
		target.dispatch(1);
		target.dispatch(2);
		assert_eq!(*seen.lock(), vec!["a1", "b1", "a2", "b2"]);
	}

	#[test]
	fn removed_listener_stops_receiving() {
		let target = EventTarget::<()>::new(4);
		let hits = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&hits);
		let id = target.add_listener(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});
		target.dispatch(());
		assert!(target.remove_listener(id));
		assert!(!target.remove_listener(id));
		target.dispatch(());
		assert_eq!(hits.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn subscribers_receive_dispatched_events() {
		let target = EventTarget::<&'static str>::new(4);
		let mut rx = target.subscribe();
		assert_eq!(target.listener_count(), 1);
		target.dispatch("message");
		assert_eq!(rx.recv().await.ok(), Some("message"));
	}
}
