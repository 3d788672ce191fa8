//! # glossa
//!
//! Command-line front end for `glossa-core`: builds the merged snapshot from a
//! TOML manifest and answers identifier lookups against it.

pub mod cli;
pub mod config;
