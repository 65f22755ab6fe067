//! Applying plans.
//!
//! Extraction, copies and renames run one item at a time and tolerate
//! individual failures. Composition runs concurrently behind the
//! [`Compositor`] trait, with separate pools for images and videos.

mod composite;
pub mod error;
mod media;
mod transfer;

pub use composite::{Compositor, Outcome, PoolLimits, composite_all};
pub use media::MediaCompositor;
pub use transfer::{Extraction, copy_files, extract_archives, rename_files};
