//! Pending Request Table
//!
//! In-flight fetches keyed by [`CacheKey`], each with the waiters that joined
//! it in arrival order. Owned by the serial worker; no internal locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cache::CacheKey;
use crate::domain::Delivery;
use crate::error::FetchError;

/// Outcome handed to a waiter
pub type FetchResult<I> = Result<Arc<I>, FetchError>;

/// Result callback; may run more than once for force-remote requests
pub type ResultCallback<I> = Arc<dyn Fn(FetchResult<I>) + Send + Sync + 'static>;

/// A caller waiting on a result, with the context its callback runs on
pub struct Waiter<I> {
    callback: ResultCallback<I>,
    delivery: Arc<dyn Delivery>,
}

impl<I: Send + Sync + 'static> Waiter<I> {
    pub fn new(callback: ResultCallback<I>, delivery: Arc<dyn Delivery>) -> Self {
        Self { callback, delivery }
    }

    /// Hand `result` to the callback on the waiter's delivery context
    pub fn notify(&self, result: FetchResult<I>) {
        let callback = Arc::clone(&self.callback);
        self.delivery.deliver(Box::new(move || callback(result)));
    }
}

impl<I> fmt::Debug for Waiter<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter").finish_non_exhaustive()
    }
}

/// Whether a waiter started a new fetch or joined one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// First waiter for the key; the caller must issue the fetch
    Started,
    /// Appended to an in-flight fetch
    Joined,
}

/// Key to waiters for every in-flight fetch
pub struct PendingTable<I> {
    entries: HashMap<CacheKey, Vec<Waiter<I>>>,
}

impl<I> Default for PendingTable<I> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<I> PendingTable<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a waiter, creating the entry if the key is not in flight
    pub fn enqueue(&mut self, key: &CacheKey, waiter: Waiter<I>) -> Enqueued {
        match self.entries.get_mut(key) {
            Some(waiters) => {
                waiters.push(waiter);
                Enqueued::Joined
            }
            None => {
                self.entries.insert(key.clone(), vec![waiter]);
                Enqueued::Started
            }
        }
    }

    /// Remove the entry, returning its waiters in join order
    pub fn drain(&mut self, key: &CacheKey) -> Vec<Waiter<I>> {
        self.entries.remove(key).unwrap_or_default()
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of in-flight keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
