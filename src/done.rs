//! Broadcast-once terminal cell
//!
//! Holds the value that ended something (a connection error, a stop request). The
//! first `set` wins and the value is immutable afterwards; every waiter registered
//! before or after receives a clone of it.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

struct DoneState<E> {
	value: Option<E>,
	waiters: Vec<oneshot::Sender<E>>,
}

pub struct Done<E> {
	inner: Arc<Mutex<DoneState<E>>>,
}

impl<E> Clone for Done<E> {
	fn clone(&self) -> Self {
		Done { inner: Arc::clone(&self.inner) }
	}
}

impl<E: Clone> Default for Done<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E: Clone> Done<E> {
	pub fn new() -> Self {
		Done { inner: Arc::new(Mutex::new(DoneState { value: None, waiters: Vec::new() })) }
	}

	fn lock(&self) -> MutexGuard<'_, DoneState<E>> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Store `value` and wake every waiter. Returns false if a value was already set.
	pub fn set(&self, value: E) -> bool {
		let mut state = self.lock();
		if state.value.is_some() {
			return false;
		}
		for tx in state.waiters.drain(..) {
			let _ = tx.send(value.clone());
		}
		state.value = Some(value);
		true
	}

	pub fn get(&self) -> Option<E> {
		self.lock().value.clone()
	}

	/// Resolve with the value once it is set
	pub async fn wait(&self) -> E {
		let rx = {
			let mut state = self.lock();
			if let Some(value) = &state.value {
				return value.clone();
			}
			state.waiters.retain(|tx| !tx.is_closed());
			let (tx, rx) = oneshot::channel();
			state.waiters.push(tx);
			rx
		};
		match rx.await {
			Ok(value) => value,
			// every handle is gone, nothing can set it anymore
			Err(_) => std::future::pending().await,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[test]
	fn test_first_set_wins() {
		let done = Done::new();
		assert!(done.get().is_none());
		assert!(done.set("first".to_string()));
		assert!(!done.set("second".to_string()));
		assert_eq!(done.get().as_deref(), Some("first"));
	}

	#[tokio::test]
	async fn test_waiters_before_and_after() {
		let done: Done<u32> = Done::new();
		let early = {
			let done = done.clone();
			tokio::spawn(async move { done.wait().await })
		};
		tokio::time::sleep(Duration::from_millis(10)).await;
		done.set(7);
		assert_eq!(early.await.unwrap(), 7);
		assert_eq!(done.wait().await, 7);
	}

	#[tokio::test]
	async fn test_dropped_waiters_are_pruned() {
		let done: Done<u32> = Done::new();
		for _ in 0..100 {
			let _ = tokio::time::timeout(Duration::from_millis(1), done.wait()).await;
		}
		assert!(done.lock().waiters.len() <= 1);
	}
}

// vim: ts=4
