//! Single-ticket lease queues.
//!
//! A [`HandleQueue`] holds at most one [`HandleTicket`]. Whoever dequeues the
//! ticket has exclusive use of the pipeline the queue guards until the ticket
//! is put back. Waiters are served strictly in arrival order, and a waiter
//! that is dropped while queued never swallows a ticket.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

struct QueueState<T> {
	items: VecDeque<T>,
	waiters: VecDeque<oneshot::Sender<T>>,
}

/// Unbounded FIFO queue with FIFO-fair async dequeue.
pub struct AsyncQueue<T> {
	state: Mutex<QueueState<T>>,
}

impl<T> Default for AsyncQueue<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> AsyncQueue<T> {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(QueueState {
				items: VecDeque::new(),
				waiters: VecDeque::new(),
			}),
		}
	}

	/// Hands `item` to the longest-waiting live receiver, or stores it.
	pub fn enqueue(&self, item: T) {
		let mut state = self.state.lock();
		let mut item = item;
		while let Some(waiter) = state.waiters.pop_front() {
			match waiter.send(item) {
				Ok(()) => return,
				Err(returned) => item = returned,
			}
		}
		state.items.push_back(item);
	}

	pub fn try_dequeue(&self) -> Option<T> {
		self.state.lock().items.pop_front()
	}

	/// Waits for the next item.
	///
	/// Cancel-safe: if the returned future is dropped after an item was
	/// handed to it, the item goes back through [`Self::enqueue`].
	pub async fn dequeue(&self) -> T {
		loop {
			let rx = {
				let mut state = self.state.lock();
				if let Some(item) = state.items.pop_front() {
					return item;
				}
				let (tx, rx) = oneshot::channel();
				state.waiters.push_back(tx);
				rx
			};

			let mut waiter = Waiter {
				queue: self,
				rx,
				settled: false,
			};
			let received = (&mut waiter.rx).await;
			waiter.settled = true;
			if let Ok(item) = received {
				return item;
			}
		}
	}

	/// Racy snapshot; only meaningful as a hint.
	pub fn is_empty(&self) -> bool {
		self.state.lock().items.is_empty()
	}

	pub fn len(&self) -> usize {
		self.state.lock().items.len()
	}
}

struct Waiter<'a, T> {
	queue: &'a AsyncQueue<T>,
	rx: oneshot::Receiver<T>,
	settled: bool,
}

impl<T> Drop for Waiter<'_, T> {
	fn drop(&mut self) {
		if self.settled {
			return;
		}
		self.rx.close();
		if let Ok(item) = self.rx.try_recv() {
			self.queue.enqueue(item);
		}
	}
}

/// Proof of exclusive use of one pipeline.
///
/// Not `Clone`; a ticket is returned to its queue exactly once.
#[derive(Debug)]
#[must_use = "a dropped ticket starves every later waiter on its queue"]
pub struct HandleTicket {
	_private: (),
}

/// Queue holding zero or one [`HandleTicket`].
pub struct HandleQueue {
	name: &'static str,
	tickets: AsyncQueue<HandleTicket>,
}

impl HandleQueue {
	/// Creates a queue pre-loaded with its single ticket.
	pub fn new(name: &'static str) -> Self {
		let tickets = AsyncQueue::new();
		tickets.enqueue(HandleTicket { _private: () });
		Self { name, tickets }
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub async fn acquire(&self) -> HandleTicket {
		self.tickets.dequeue().await
	}

	pub fn try_acquire(&self) -> Option<HandleTicket> {
		self.tickets.try_dequeue()
	}

	pub fn release(&self, ticket: HandleTicket) {
		self.tickets.enqueue(ticket);
	}

	/// True while the ticket is leased out.
	pub fn is_leased(&self) -> bool {
		self.tickets.is_empty()
	}
}

/// A ticket bound to the queue it came from; dropping it releases the ticket.
pub struct Lease {
	queue: Arc<HandleQueue>,
	ticket: Option<HandleTicket>,
}

impl Lease {
	pub async fn acquire(queue: Arc<HandleQueue>) -> Self {
		let ticket = queue.acquire().await;
		tracing::trace!(queue = queue.name(), "handle leased");
		Self { queue, ticket: Some(ticket) }
	}

	pub fn try_acquire(queue: Arc<HandleQueue>) -> Option<Self> {
		let ticket = queue.try_acquire()?;
		Some(Self { queue, ticket: Some(ticket) })
	}

	pub fn queue(&self) -> &Arc<HandleQueue> {
		&self.queue
	}
}

impl Drop for Lease {
	fn drop(&mut self) {
		if let Some(ticket) = self.ticket.take() {
			tracing::trace!(queue = self.queue.name(), "handle released");
			self.queue.release(ticket);
		}
	}
}
