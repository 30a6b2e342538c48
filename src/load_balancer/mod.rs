//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Balancer targets (address → weight)
//!     → target.rs (WeightedTarget, immutable after construction)
//!     → weighted.rs (smooth weighted round robin state)
//!     → select() → index into the engine's upstream client set
//! ```
//!
//! # Design Decisions
//! - The scheduler only sees weights; engines own the clients
//! - One lock per scheduler, held only for the O(N) selection loop
//! - Deterministic: the same weights always yield the same sequence

pub mod target;
pub mod weighted;

pub use target::WeightedTarget;
pub use weighted::{gcd, n_gcd, SmoothWeighted};

/// Picks the index of the next upstream to use.
pub trait Balancer: Send + Sync + std::fmt::Debug {
    /// Returns an index in `0..len` where `len` is the configured target count.
    fn select(&self) -> usize;
}
