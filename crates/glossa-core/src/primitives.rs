//! # Fixed Primitives
//!
//! Hardcoded constants for the glossa core.
//!
//! These are compiled into the binary and immutable at runtime: identifier
//! layout, snapshot framing, traversal bounds and importer input limits.

/// Zero-padding width of counter-allocated languoid ids (`lang:000001`).
pub const LANGUOID_ID_WIDTH: usize = 6;

/// Zero-padding width of counter-allocated script and region ids (`script:0001`).
pub const CODED_ID_WIDTH: usize = 4;

/// Magic bytes for the glossa binary snapshot header.
///
/// - File Header = Magic Bytes ("GLSA") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"GLSA";

/// Current binary snapshot framing version.
///
/// Increment this when making breaking changes to the binary framing.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the binary header: magic bytes plus the version byte.
pub const HEADER_LEN: usize = 5;

/// Maximum decompressed snapshot payload (1 GiB).
///
/// Payloads claiming more than this are rejected before decoding.
pub const MAX_SNAPSHOT_SIZE: u64 = 1 << 30;

/// Maximum traversal depth for graph walks.
///
/// - `family_tree` and `descendants` stop here even without a depth argument.
/// - Keeps traversal bounded on malformed (cyclic) parent chains.
pub const MAX_TRAVERSAL_DEPTH: usize = 100;

/// Source name whose `is_historical` value wins for geographic regions.
pub const REGION_HISTORICAL_SOURCE: &str = "pycountry";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for identifier values and codes in importer records.
pub const MAX_IDENTIFIER_LENGTH: usize = 256;

/// Maximum length for free-text field values in importer records (64KB).
pub const MAX_VALUE_LENGTH: usize = 65536;

/// Maximum number of records in a single source document.
///
/// Documents larger than this are rejected before any resolver write.
pub const MAX_RECORDS_PER_SOURCE: usize = 1_000_000;
