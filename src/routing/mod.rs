//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: matched Route (carrying its engine) or None
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → build one engine per route
//!     → sort by priority, then prefix length
//!     → freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Highest priority wins; ties go to the longest path prefix

pub mod matcher;
pub mod router;

pub use router::{Route, Router};
