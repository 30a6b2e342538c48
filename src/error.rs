//! Construction-time error taxonomy.
//!
//! Dispatch failures never surface here: engines translate them into HTTP
//! responses. Everything in this module is returned synchronously while an
//! engine, pool or gateway is being built.

use thiserror::Error;

/// Boxed error produced by a pool [`Factory`](crate::pool::Factory).
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building a proxy engine or the gateway.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Neither a single target nor a balancer target list was configured.
    #[error("no upstream address configured")]
    NoTargets,

    /// TLS credential material could not be loaded.
    #[error("TLS credentials: {0}")]
    Tls(String),

    /// A WebSocket engine was built without a target URL.
    #[error("websocket target is not configured")]
    MissingTarget,

    /// The WebSocket target URL did not parse.
    #[error("invalid websocket target '{url}': {source}")]
    InvalidTarget {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The WebSocket target uses something other than `ws`/`wss`.
    #[error("unsupported websocket scheme '{0}', expected ws or wss")]
    UnsupportedScheme(String),

    /// A pooled route could not create its pool.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Errors raised by a [`ChannelPool`](crate::pool::ChannelPool).
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been closed; no entries are handed out any more.
    #[error("pool is closed")]
    Closed,

    /// Capacity settings violate `0 <= initial <= max` with `max > 0`.
    #[error("invalid capacity settings: initial={initial}, max={max}")]
    InvalidCapacity { initial: usize, max: usize },

    /// The factory failed while pre-filling the pool.
    #[error("factory is not able to fill the pool: {0}")]
    Fill(#[source] FactoryError),

    /// The factory failed while creating an entry on demand.
    #[error("factory failed to create an entry: {0}")]
    Factory(#[source] FactoryError),
}
