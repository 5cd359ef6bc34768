//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (on discovery / reload):
//!     relative file path (users/#id/posts.toml)
//!     → pattern.rs (segments → end-anchored matcher + slug names)
//!     → stored inside an Endpoint in the registry
//!
//! Incoming Request (method, path):
//!     → dispatch.rs (first-match scan over one registry snapshot)
//!     → slug extraction (captures zipped with slug names)
//!     → method resolution (exact → DEFAULT → 405)
//!     → Return: Dispatch or RouteError
//! ```
//!
//! # Design Decisions
//! - Patterns are anchored at the end only; overlapping routes are allowed
//! - First registered wins; registry order is the tie breaker
//! - Dispatch never mutates the registry

pub mod dispatch;
pub mod pattern;

pub use dispatch::{dispatch, Dispatch};
pub use pattern::{PatternError, RoutePattern};
