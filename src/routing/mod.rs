//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → table.rs (first-segment lookup in the active snapshot)
//!     → Return: RouteMatch or no match
//!
//! Route Reload (background):
//!     reloader.rs timer tick / nudge
//!     → table.rs compares source mtime
//!     → parse new snapshot outside any lock
//!     → atomic snapshot swap
//! ```
//!
//! # Design Decisions
//! - Exact first-segment matching, no wildcards or longest-prefix search
//! - Deterministic: same input and snapshot always match the same route
//! - Stale-but-valid routes beat no routes: failed reloads are ignored

pub mod reloader;
pub mod table;

pub use reloader::RouteReloader;
pub use table::{ReloadOutcome, RouteError, RouteMatch, RouteSnapshot, RouteSource, RouteTable};
