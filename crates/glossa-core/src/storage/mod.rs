//! # Storage
//!
//! Embedded, read-mostly storage next to the snapshot.

mod names;

pub use names::{NameArchive, NameEntry, NameLookup, merge_name_entries, resolve_locales};
