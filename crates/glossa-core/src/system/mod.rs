//! # System Module
//!
//! Summary metrics of a loaded database.

mod metrics;

pub use metrics::StoreMetrics;
