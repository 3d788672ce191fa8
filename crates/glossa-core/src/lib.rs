//! # glossa-core
//!
//! Canonical-identity graph store for linguistic metadata: languoids,
//! writing systems and geographic regions.
//!
//! Independent sources describe the same real-world entity under different
//! identifier schemes (ISO 639-1/2/3/5, BCP-47, Glottocode, Wikidata). This
//! crate gives each entity one stable canonical id, merges what the sources
//! say about it, and answers identifier and graph queries over the result.
//!
//! ## Layers
//!
//! - `resolver`: external identifiers -> canonical ids, with fusion
//! - `entity_set` + `ingestor`: per-source import surface
//! - `merge`: priority-based field merge with a conflict audit log
//! - `graph` + `traversal` + `query`: typed, indexed store and walks
//! - `formats`: snapshot codec (`json`, `json.gz`, `msgpack.gz`)
//! - `database`: the identifier-facing read API
//!
//! ## Architectural Constraints
//!
//! - Single writer at build time: only `merge` and the snapshot decoder
//!   fill a `Store`, which is read-only to every other caller
//! - Deterministic: ordered maps throughout, so identical inputs give
//!   identical snapshots
//! - No async, no network dependencies

// =============================================================================
// MODULES
// =============================================================================

pub mod database;
pub mod entity_set;
pub mod formats;
pub mod graph;
pub mod ingestor;
pub mod merge;
pub mod pipeline;
pub mod primitives;
pub mod query;
pub mod resolver;
pub mod storage;
pub mod system;
pub mod traversal;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CanonicalId, Entity, EntityKind, FieldValue, GeographicRegion, GlossaError, IdType, Languoid,
    LanguoidLevel, MetaValue, Metadata, Relation, RelationType, Relations, Script,
};

// =============================================================================
// RE-EXPORTS: Build Side
// =============================================================================

pub use entity_set::{DataSource, EntitySet};
pub use ingestor::{RecordImporter, SourceDocument};
pub use merge::{MergeConflict, MergeEngine, MergeOutcome, MergeStrategy, merge, write_conflicts};
pub use pipeline::{BuildOutput, BuildPipeline, Importer};
pub use resolver::{EntityIdentity, EntityResolver};
pub use validation::{DataValidator, ValidationReport};

// =============================================================================
// RE-EXPORTS: Read Side
// =============================================================================

pub use database::{Database, Resolution};
pub use graph::{EntityContainer, Store};
pub use query::Query;
pub use storage::{NameArchive, NameEntry, NameLookup};

// =============================================================================
// RE-EXPORTS: Formats and System
// =============================================================================

pub use formats::{SnapshotFormat, canonical_bytes, load, save};
#[cfg(feature = "crypto-hash")]
pub use formats::{snapshot_digest, verify_digest};
pub use system::StoreMetrics;
