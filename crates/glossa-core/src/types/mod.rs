//! # Core Type Definitions
//!
//! This module contains the value types shared by every layer of glossa:
//! - Identifier schemes and canonical identifiers (`IdType`, `CanonicalId`, `EntityKind`)
//! - Directed, typed edges (`RelationType`, `Relation`, `Relations`)
//! - Entity kinds and their declared field tables (see [`entity`])
//! - Error types (`GlossaError`)
//!
//! ## Determinism Guarantees
//!
//! All keyed collections in this module are `BTreeMap`s and every key type
//! implements `Ord`, so iteration order (and therefore serialized output) is
//! independent of insertion timing.

mod entity;

pub use entity::{
    DeprecatedCode, EndangermentStatus, Entity, FieldSpec, FieldStrategy, FieldType, FieldValue,
    GeographicRegion, LanguageScope, LanguageStatus, Languoid, LanguoidLevel, Script,
    WikipediaInfo,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIER SCHEMES
// =============================================================================

/// External identifier schemes a languoid can be known by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IdType {
    #[serde(rename = "bcp_47")]
    Bcp47,
    #[serde(rename = "iso_639_3")]
    Iso639_3,
    /// ISO 639-2/T. Always identical to ISO 639-3, never stored.
    #[serde(rename = "iso_639_2t")]
    Iso639_2T,
    #[serde(rename = "iso_639_2b")]
    Iso639_2B,
    #[serde(rename = "iso_639_1")]
    Iso639_1,
    #[serde(rename = "iso_639_5")]
    Iso639_5,
    #[serde(rename = "glottocode")]
    Glottocode,
    #[serde(rename = "wikidata_id")]
    WikidataId,
    /// Wikipedia edition code (`nl`, `zh-yue`, `simple`).
    #[serde(rename = "wikipedia")]
    Wikipedia,
}

impl IdType {
    /// Every scheme, in declaration order.
    pub const ALL: [IdType; 9] = [
        IdType::Bcp47,
        IdType::Iso639_3,
        IdType::Iso639_2T,
        IdType::Iso639_2B,
        IdType::Iso639_1,
        IdType::Iso639_5,
        IdType::Glottocode,
        IdType::WikidataId,
        IdType::Wikipedia,
    ];

    /// Lookup order used by `Database::guess`.
    ///
    /// ISO 639-2/T is left out: it redirects to ISO 639-3, which is tried earlier.
    pub const GUESS_ORDER: [IdType; 8] = [
        IdType::Bcp47,
        IdType::Iso639_3,
        IdType::Iso639_2B,
        IdType::Iso639_1,
        IdType::Iso639_5,
        IdType::Glottocode,
        IdType::WikidataId,
        IdType::Wikipedia,
    ];

    /// Stable wire name, also used in flattened `"idtype:value"` keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            IdType::Bcp47 => "bcp_47",
            IdType::Iso639_3 => "iso_639_3",
            IdType::Iso639_2T => "iso_639_2t",
            IdType::Iso639_2B => "iso_639_2b",
            IdType::Iso639_1 => "iso_639_1",
            IdType::Iso639_5 => "iso_639_5",
            IdType::Glottocode => "glottocode",
            IdType::WikidataId => "wikidata_id",
            IdType::Wikipedia => "wikipedia",
        }
    }

    /// The scheme a value of this type is stored and indexed under.
    ///
    /// ISO 639-2/T collapses onto ISO 639-3; every other scheme maps to itself.
    #[must_use]
    pub const fn normalized(self) -> Self {
        match self {
            IdType::Iso639_2T => IdType::Iso639_3,
            other => other,
        }
    }

    /// Build a flattened `"idtype:value"` key.
    #[must_use]
    pub fn key(self, value: &str) -> String {
        format!("{}:{}", self.as_str(), value)
    }

    /// Split a flattened `"idtype:value"` key. The value may itself contain `:`.
    pub fn split_key(key: &str) -> Option<(IdType, &str)> {
        let (scheme, value) = key.split_once(':')?;
        let id_type = scheme.parse().ok()?;
        Some((id_type, value))
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdType {
    type Err = GlossaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GlossaError::InvalidRecord(format!("Unknown identifier type: {}", s)))
    }
}

// =============================================================================
// ENTITY KINDS & CANONICAL IDS
// =============================================================================

/// The three kinds of entity stored in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Languoid,
    Script,
    #[serde(rename = "GeographicRegion")]
    Region,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Languoid, EntityKind::Script, EntityKind::Region];

    /// Namespace prefix of canonical ids of this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            EntityKind::Languoid => "lang",
            EntityKind::Script => "script",
            EntityKind::Region => "region",
        }
    }

    /// Type tag written into snapshots.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            EntityKind::Languoid => "Languoid",
            EntityKind::Script => "Script",
            EntityKind::Region => "GeographicRegion",
        }
    }

    /// Zero-padding width of counter-allocated ids.
    #[must_use]
    pub const fn id_width(self) -> usize {
        match self {
            EntityKind::Languoid => crate::primitives::LANGUOID_ID_WIDTH,
            EntityKind::Script | EntityKind::Region => crate::primitives::CODED_ID_WIDTH,
        }
    }

    /// Parse a namespace prefix (`lang`, `script`, `region`).
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        EntityKind::ALL.into_iter().find(|k| k.prefix() == prefix)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EntityKind {
    type Err = GlossaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.tag().eq_ignore_ascii_case(s) || k.prefix() == s)
            .ok_or_else(|| GlossaError::InvalidRecord(format!("Unknown entity kind: {}", s)))
    }
}

/// Stable, namespaced identifier of one real-world entity: `<kind>:<opaque>`.
///
/// Canonical ids are assigned by the resolver and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    /// Wrap an existing id string (e.g. read back from a snapshot).
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A counter-allocated id, e.g. `lang:000042`.
    #[must_use]
    pub fn numbered(kind: EntityKind, n: u64) -> Self {
        Self(format!("{}:{:0width$}", kind.prefix(), n, width = kind.id_width()))
    }

    /// A code-keyed id, e.g. `script:latn` or `region:nl-nh`.
    #[must_use]
    pub fn coded(kind: EntityKind, code: &str) -> Self {
        Self(format!("{}:{}", kind.prefix(), code.trim().to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The entity kind encoded in the namespace prefix.
    #[must_use]
    pub fn kind(&self) -> Option<EntityKind> {
        let (prefix, _) = self.0.split_once(':')?;
        EntityKind::from_prefix(prefix)
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for CanonicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// RELATIONS
// =============================================================================

/// Kinds of directed edge between entities.
///
/// Producers usually write edges in reciprocal pairs (see [`RelationType::reverse`]),
/// but each endpoint stores its own list; the store never assumes symmetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationType {
    #[serde(rename = "parent")]
    ParentLanguoid,
    #[serde(rename = "child")]
    ChildLanguoid,
    #[serde(rename = "spoken_in")]
    SpokenInRegion,
    #[serde(rename = "languoids_in")]
    LanguoidsInRegion,
    #[serde(rename = "uses_script")]
    UsesScript,
    #[serde(rename = "used_by")]
    UsedByLanguoid,
    #[serde(rename = "macrolanguage_of")]
    MacrolanguageOf,
    #[serde(rename = "individual_language_of")]
    IndividualLanguageOf,
    #[serde(rename = "is_part_of")]
    IsPartOf,
    #[serde(rename = "has_child_region")]
    HasChildRegion,
}

impl RelationType {
    pub const ALL: [RelationType; 10] = [
        RelationType::ParentLanguoid,
        RelationType::ChildLanguoid,
        RelationType::SpokenInRegion,
        RelationType::LanguoidsInRegion,
        RelationType::UsesScript,
        RelationType::UsedByLanguoid,
        RelationType::MacrolanguageOf,
        RelationType::IndividualLanguageOf,
        RelationType::IsPartOf,
        RelationType::HasChildRegion,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RelationType::ParentLanguoid => "parent",
            RelationType::ChildLanguoid => "child",
            RelationType::SpokenInRegion => "spoken_in",
            RelationType::LanguoidsInRegion => "languoids_in",
            RelationType::UsesScript => "uses_script",
            RelationType::UsedByLanguoid => "used_by",
            RelationType::MacrolanguageOf => "macrolanguage_of",
            RelationType::IndividualLanguageOf => "individual_language_of",
            RelationType::IsPartOf => "is_part_of",
            RelationType::HasChildRegion => "has_child_region",
        }
    }

    /// The edge type a producer writes on the other endpoint.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            RelationType::ParentLanguoid => RelationType::ChildLanguoid,
            RelationType::ChildLanguoid => RelationType::ParentLanguoid,
            RelationType::SpokenInRegion => RelationType::LanguoidsInRegion,
            RelationType::LanguoidsInRegion => RelationType::SpokenInRegion,
            RelationType::UsesScript => RelationType::UsedByLanguoid,
            RelationType::UsedByLanguoid => RelationType::UsesScript,
            RelationType::MacrolanguageOf => RelationType::IndividualLanguageOf,
            RelationType::IndividualLanguageOf => RelationType::MacrolanguageOf,
            RelationType::IsPartOf => RelationType::HasChildRegion,
            RelationType::HasChildRegion => RelationType::IsPartOf,
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = GlossaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GlossaError::InvalidRecord(format!("Unknown relation type: {}", s)))
    }
}

/// A scalar attached to an edge (`is_canonical`, `is_official`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Flag(bool),
    Integer(i64),
    Text(String),
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Flag(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Integer(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(v.to_string())
    }
}

/// Edge metadata, ordered by key.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A directed, typed, metadata-bearing edge. The source is the entity holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub relation_type: RelationType,
    pub target_id: CanonicalId,
    pub metadata: Metadata,
}

impl Relation {
    #[must_use]
    pub fn new(relation_type: RelationType, target_id: CanonicalId) -> Self {
        Self {
            relation_type,
            target_id,
            metadata: Metadata::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Read a boolean metadata flag; absent or non-boolean reads as `false`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.metadata.get(key), Some(MetaValue::Flag(true)))
    }
}

/// The outgoing edges of one entity, grouped by type in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RelationsRecord", into = "RelationsRecord")]
pub struct Relations {
    by_type: BTreeMap<RelationType, Vec<Relation>>,
}

impl Relations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an edge. Duplicates are kept; callers that need uniqueness use `insert_unique`.
    pub fn add(&mut self, relation: Relation) {
        self.by_type
            .entry(relation.relation_type)
            .or_default()
            .push(relation);
    }

    /// Append an edge unless one with the same type and target exists.
    ///
    /// Returns `false` (and keeps the existing metadata) on a duplicate.
    pub fn insert_unique(&mut self, relation: Relation) -> bool {
        if self.contains(relation.relation_type, &relation.target_id) {
            return false;
        }
        self.add(relation);
        true
    }

    /// Edges of one type, in insertion order.
    #[must_use]
    pub fn get(&self, relation_type: RelationType) -> &[Relation] {
        self.by_type
            .get(&relation_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Edge with the given type and target, if present.
    #[must_use]
    pub fn find(&self, relation_type: RelationType, target: &CanonicalId) -> Option<&Relation> {
        self.get(relation_type)
            .iter()
            .find(|r| &r.target_id == target)
    }

    #[must_use]
    pub fn contains(&self, relation_type: RelationType, target: &CanonicalId) -> bool {
        self.find(relation_type, target).is_some()
    }

    /// All edges, grouped by type in `RelationType` order.
    pub fn iter(&self) -> impl Iterator<Item = &Relation> {
        self.by_type.values().flatten()
    }

    /// Total number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.values().all(Vec::is_empty)
    }
}

/// Snapshot form of [`Relations`]: `{relation_type: [{target_id, metadata}]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RelationsRecord(BTreeMap<RelationType, Vec<EdgeRecord>>);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EdgeRecord {
    target_id: CanonicalId,
    #[serde(default)]
    metadata: Metadata,
}

impl From<RelationsRecord> for Relations {
    fn from(record: RelationsRecord) -> Self {
        let mut relations = Relations::new();
        for (relation_type, edges) in record.0 {
            for edge in edges {
                relations.add(Relation {
                    relation_type,
                    target_id: edge.target_id,
                    metadata: edge.metadata,
                });
            }
        }
        relations
    }
}

impl From<Relations> for RelationsRecord {
    fn from(relations: Relations) -> Self {
        RelationsRecord(
            relations
                .by_type
                .into_iter()
                .filter(|(_, edges)| !edges.is_empty())
                .map(|(relation_type, edges)| {
                    let edges = edges
                        .into_iter()
                        .map(|r| EdgeRecord {
                            target_id: r.target_id,
                            metadata: r.metadata,
                        })
                        .collect();
                    (relation_type, edges)
                })
                .collect(),
        )
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in glossa.
///
/// The resolver and the store never produce these for missing data: absence
/// is `None` or an empty collection there. Only the identifier-facing API,
/// the codecs and the import surface turn problems into errors.
#[derive(Debug, Error)]
pub enum GlossaError {
    /// No entity matched the identifier.
    #[error("No entity found for code '{code}' ({id_type})")]
    NotFound { code: String, id_type: IdType },

    /// The code matched no identifier type at all.
    #[error("No entity found for code '{code}' under any identifier type")]
    Unrecognized { code: String },

    /// The code resolved to nothing, or the entity has no `to` identifier.
    #[error("Cannot convert '{code}' from {from} to {to}")]
    ConversionFailed { code: String, from: IdType, to: IdType },

    /// The identifier was retired and has no single replacement.
    #[error("Code '{code}' ({id_type}) is deprecated ({reason}) and has no single replacement")]
    DeprecatedNoReplacement {
        code: String,
        id_type: IdType,
        reason: String,
    },

    /// A canonical id that does not exist in the store.
    #[error("Unknown entity: {0}")]
    UnknownEntity(CanonicalId),

    /// An importer record could not be accepted.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// The embedded name archive failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Build configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GlossaError {
    /// Whether this error means "nothing matched" (including retired codes).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GlossaError::NotFound { .. }
                | GlossaError::Unrecognized { .. }
                | GlossaError::ConversionFailed { .. }
                | GlossaError::DeprecatedNoReplacement { .. }
                | GlossaError::UnknownEntity(_)
        )
    }
}

impl From<std::io::Error> for GlossaError {
    fn from(e: std::io::Error) -> Self {
        GlossaError::Io(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_639_2t_normalizes_to_iso_639_3() {
        assert_eq!(IdType::Iso639_2T.normalized(), IdType::Iso639_3);
        assert_eq!(IdType::Bcp47.normalized(), IdType::Bcp47);
    }

    #[test]
    fn flattened_keys_split_on_first_colon() {
        let key = IdType::WikidataId.key("Q7411");
        assert_eq!(key, "wikidata_id:Q7411");
        assert_eq!(IdType::split_key(&key), Some((IdType::WikidataId, "Q7411")));
        assert_eq!(
            IdType::split_key("bcp_47:x:y"),
            Some((IdType::Bcp47, "x:y"))
        );
        assert_eq!(IdType::split_key("nonsense:nl"), None);
    }

    #[test]
    fn canonical_id_formats() {
        assert_eq!(CanonicalId::numbered(EntityKind::Languoid, 42).as_str(), "lang:000042");
        assert_eq!(CanonicalId::numbered(EntityKind::Script, 7).as_str(), "script:0007");
        assert_eq!(CanonicalId::coded(EntityKind::Region, "NL").as_str(), "region:nl");
        assert_eq!(
            CanonicalId::new("region:nl-nh").kind(),
            Some(EntityKind::Region)
        );
        assert_eq!(CanonicalId::new("nonsense").kind(), None);
    }

    #[test]
    fn relation_types_pair_up() {
        for t in RelationType::ALL {
            assert_eq!(t.reverse().reverse(), t);
            assert_eq!(t.as_str().parse::<RelationType>().ok(), Some(t));
        }
    }

    #[test]
    fn insert_unique_keeps_first_metadata() {
        let mut relations = Relations::new();
        let target = CanonicalId::new("script:latn");
        let mut first = Metadata::new();
        first.insert("is_canonical".into(), MetaValue::Flag(true));

        assert!(relations.insert_unique(
            Relation::new(RelationType::UsesScript, target.clone()).with_metadata(first)
        ));
        assert!(!relations.insert_unique(Relation::new(RelationType::UsesScript, target.clone())));

        assert_eq!(relations.len(), 1);
        assert!(relations.get(RelationType::UsesScript)[0].flag("is_canonical"));
    }

    #[test]
    fn relations_serialize_without_type_field() {
        let mut relations = Relations::new();
        relations.add(Relation::new(RelationType::ParentLanguoid, CanonicalId::new("lang:000001")));

        let json = serde_json::to_string(&relations).expect("serialize");
        assert_eq!(json, r#"{"parent":[{"target_id":"lang:000001","metadata":{}}]}"#);

        let back: Relations = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, relations);
    }

    #[test]
    fn missing_metadata_defaults_to_empty() {
        let back: Relations =
            serde_json::from_str(r#"{"child":[{"target_id":"lang:000002"}]}"#).expect("parse");
        assert!(back.get(RelationType::ChildLanguoid)[0].metadata.is_empty());
    }

    #[test]
    fn lookup_errors_name_their_identifier_types() {
        let missing = GlossaError::NotFound {
            code: "zzz".to_string(),
            id_type: IdType::Iso639_3,
        };
        assert_eq!(missing.to_string(), "No entity found for code 'zzz' (iso_639_3)");

        let conversion = GlossaError::ConversionFailed {
            code: "nld".to_string(),
            from: IdType::Iso639_3,
            to: IdType::Glottocode,
        };
        assert_eq!(
            conversion.to_string(),
            "Cannot convert 'nld' from iso_639_3 to glottocode"
        );
        assert!(conversion.is_not_found());
        assert!(!GlossaError::Config(String::new()).is_not_found());
    }
}
