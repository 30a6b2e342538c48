//! Queue-backed pool implementation.
//!
//! Idle entries sit in a bounded lock-free queue. The queue and the factory
//! are detached together on close, so a snapshot taken under the read lock
//! is either fully live or fully gone.

use std::sync::{Arc, RwLock};

use crossbeam_queue::ArrayQueue;

use crate::error::PoolError;
use crate::handle::Recyclable;
use crate::pool::{Factory, Pool};

struct Shared<T> {
    idle: Arc<ArrayQueue<T>>,
    factory: Arc<dyn Factory<T>>,
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            idle: self.idle.clone(),
            factory: self.factory.clone(),
        }
    }
}

/// Pool of [`Recyclable`] entries with a hard ceiling on idle entries.
pub struct ChannelPool<T: Recyclable> {
    shared: RwLock<Option<Shared<T>>>,
}

impl<T: Recyclable> ChannelPool<T> {
    /// Create a pool holding up to `max_capacity` idle entries, pre-filled
    /// with `initial_capacity` entries from `factory`.
    ///
    /// Pre-filled entries are created unbound (empty address) and are
    /// rebound when handed out.
    pub fn new<F>(initial_capacity: usize, max_capacity: usize, factory: F) -> Result<Self, PoolError>
    where
        F: Factory<T> + 'static,
    {
        if max_capacity == 0 || initial_capacity > max_capacity {
            return Err(PoolError::InvalidCapacity {
                initial: initial_capacity,
                max: max_capacity,
            });
        }

        let idle = ArrayQueue::new(max_capacity);
        for _ in 0..initial_capacity {
            match factory.create("") {
                Ok(entry) => {
                    // Cannot overflow: initial_capacity <= max_capacity.
                    let _ = idle.push(entry);
                }
                Err(e) => {
                    while let Some(entry) = idle.pop() {
                        entry.close();
                    }
                    return Err(PoolError::Fill(e));
                }
            }
        }

        tracing::debug!(initial_capacity, max_capacity, "Pool created");

        Ok(Self {
            shared: RwLock::new(Some(Shared {
                idle: Arc::new(idle),
                factory: Arc::new(factory),
            })),
        })
    }

    fn snapshot(&self) -> Option<Shared<T>> {
        self.shared
            .read()
            .expect("pool lock poisoned")
            .as_ref()
            .cloned()
    }

    /// Maximum number of idle entries.
    pub fn capacity(&self) -> usize {
        self.snapshot().map(|s| s.idle.capacity()).unwrap_or(0)
    }
}

impl<T: Recyclable> Pool<T> for ChannelPool<T> {
    fn get(&self, addr: &str) -> Result<T, PoolError> {
        let shared = self.snapshot().ok_or(PoolError::Closed)?;

        if let Some(mut entry) = shared.idle.pop() {
            entry.rebind(addr);
            return Ok(entry);
        }

        shared.factory.create(addr).map_err(PoolError::Factory)
    }

    fn put(&self, entry: T) {
        // The read guard spans the push so `close` cannot drain in between.
        let rejected = {
            let guard = self.shared.read().expect("pool lock poisoned");
            match guard.as_ref() {
                Some(shared) => shared.idle.push(entry).err(),
                None => Some(entry),
            }
        };

        if let Some(entry) = rejected {
            tracing::trace!("Pool full or closed, discarding entry");
            entry.close();
        }
    }

    fn close(&self) {
        let detached = self.shared.write().expect("pool lock poisoned").take();
        let Some(shared) = detached else {
            return;
        };

        let mut closed = 0usize;
        while let Some(entry) = shared.idle.pop() {
            entry.close();
            closed += 1;
        }
        tracing::debug!(closed, "Pool closed");
    }

    fn len(&self) -> usize {
        self.snapshot().map(|s| s.idle.len()).unwrap_or(0)
    }
}

impl<T: Recyclable> Drop for ChannelPool<T> {
    fn drop(&mut self) {
        self.close();
    }
}
