//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Control API (POST/DELETE)
//!     → table.rs (normalize prefix, upsert/remove entry)
//!
//! Incoming Request (path)
//!     → matcher.rs (normalize, enumerate segment-boundary candidates)
//!     → table.rs (exact lookup, longest candidate first)
//!     → Return: Resolved { prefix, target } or no match (default target)
//! ```
//!
//! # Design Decisions
//! - Routes live in memory only; a restart starts from an empty table
//! - Matching is by whole path segments: `/user` never matches `/username`
//! - Most specific prefix wins, independent of insertion order
//! - Entries are replaced as a unit, readers never see a partial entry

pub mod matcher;
pub mod table;
pub mod target;

pub use table::{Activity, Resolved, RouteEntry, RouteError, RouteTable};
pub use target::{Target, TargetError};
