//! # KMIndex Versioning
//!
//! Detects content changes in knowledge modules across scrape cycles.
//!
//! ## Flow
//! ```text
//! scrape batch ──► checksum(title, body, steps, documents)
//!                     │
//!        no record ───┼──► added         (record written, change logged)
//!        same digest ─┼──► nothing
//!        new digest ──┴──► updated       (_prev copy, record rewritten)
//!                          └─ major? ──► review flag + major_update entry
//! ```

pub mod changelog;
pub mod checksum;
pub mod record;
pub mod store;
pub mod tracker;

pub use changelog::ChangeLog;
pub use checksum::checksum;
pub use record::{ChangeLogEntry, ChangeType, ModuleContent, VersionRecord};
pub use store::VersionStore;
pub use tracker::{is_major_change, ChangeReport, VersionTracker, MAJOR_CHANGE_RATIO};
