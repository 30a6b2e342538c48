//! Bounded pool of reusable proxy handles.
//!
//! # Data Flow
//! ```text
//! get(addr)
//!     → idle entry available? pop it, rebind to addr
//!     → otherwise Factory::create(addr) (never blocks)
//! put(entry)
//!     → pool closed? close entry
//!     → idle buffer full? close entry
//!     → otherwise park it for reuse
//! ```
//!
//! # Design Decisions
//! - Capacity bounds idle entries only, not entries in use
//! - Get/Put never wait on pool pressure; they create or discard instead
//! - The pool knows entries only through [`Recyclable`](crate::handle::Recyclable)

pub mod channel;

pub use channel::ChannelPool;

use crate::error::{FactoryError, PoolError};

/// Manufactures pool entries bound to an address.
pub trait Factory<T>: Send + Sync {
    fn create(&self, addr: &str) -> Result<T, FactoryError>;
}

impl<T, E, F> Factory<T> for F
where
    F: Fn(&str) -> Result<T, E> + Send + Sync,
    E: Into<FactoryError>,
{
    fn create(&self, addr: &str) -> Result<T, FactoryError> {
        self(addr).map_err(Into::into)
    }
}

/// A pool of reusable handles.
pub trait Pool<T>: Send + Sync {
    /// Take an entry bound to `addr`, creating one if none is idle.
    fn get(&self, addr: &str) -> Result<T, PoolError>;

    /// Hand an entry back. Excess entries are closed rather than kept.
    fn put(&self, entry: T);

    /// Close the pool and every idle entry. Later `get` calls fail.
    fn close(&self);

    /// Number of idle entries right now.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
