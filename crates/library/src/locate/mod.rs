//! Asset discovery.
//!
//! A [`Snapshot`] lists and classifies every file under a root exactly once;
//! planning and census work from that listing instead of re-reading the
//! filesystem. [`repair_archives`] is the only operation here with a side
//! effect.

mod classify;
pub mod error;
mod repair;
mod snapshot;

pub use classify::{AssetClass, AssetRole, classify, classify_name, split_identifier};
pub use repair::repair_archives;
pub use snapshot::{Asset, Snapshot};
