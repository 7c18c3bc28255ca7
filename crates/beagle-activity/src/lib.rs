//! Directory of peripherals that are visible right now.
//!
//! The directory attaches to an event broker: `found` upserts a record and
//! `lost` removes it. Readers get counts and stable, key-ordered pages of
//! record copies while producers keep mutating.
//!
//! ```text
//!  found ─┐                       ┌─▶ quantity()
//!         ├──▶ RwLock<BTreeMap> ──┤
//!  lost  ─┘                       └─▶ records(take, skip)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;

pub use directory::{ActivityDirectory, Record};
