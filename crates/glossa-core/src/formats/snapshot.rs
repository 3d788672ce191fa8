//! Snapshot schema, encoding and file I/O.
//!
//! A snapshot captures the store and the resolver as one unit:
//!
//! ```text
//! { version, format, metadata { entity_count, entity_types },
//!   entities { <id>: { kind, <fields>, relations { <type>: [{target_id, metadata}] } } },
//!   resolver { id_to_canonical { "<idtype>:<value>": <id> },
//!              identities { <id>: { identifiers { <idtype>: <value> } } },
//!              next_id, deprecated_codes { "<idtype>:<value>": reason }, fused_ids } }
//! ```
//!
//! Unknown fields anywhere in the payload are ignored on load.

use super::SnapshotFormat;
use super::persistence::{payload_from_bytes, payload_to_bytes};
use crate::graph::Store;
use crate::primitives::MAX_SNAPSHOT_SIZE;
use crate::resolver::{EntityIdentity, EntityResolver};
use crate::types::{CanonicalId, Entity, EntityKind, GlossaError, IdType};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

// =============================================================================
// SCHEMA
// =============================================================================

/// Counts written alongside the entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub entity_count: usize,
    /// Entity count per kind tag.
    #[serde(default)]
    pub entity_types: BTreeMap<String, usize>,
}

/// Owned identifiers of one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    #[serde(default)]
    pub identifiers: BTreeMap<IdType, String>,
}

/// Id counters: one per kind, or a single languoid counter in older snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextId {
    PerKind(BTreeMap<EntityKind, u64>),
    Legacy(u64),
}

impl Default for NextId {
    fn default() -> Self {
        NextId::PerKind(BTreeMap::new())
    }
}

/// Flattened resolver state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverRecord {
    #[serde(default)]
    pub id_to_canonical: BTreeMap<String, CanonicalId>,
    #[serde(default)]
    pub identities: BTreeMap<CanonicalId, IdentityRecord>,
    #[serde(default)]
    pub next_id: NextId,
    #[serde(default)]
    pub deprecated_codes: BTreeMap<String, String>,
    /// Fusion redirects, loser -> survivor.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fused_ids: BTreeMap<CanonicalId, CanonicalId>,
}

impl From<&EntityResolver> for ResolverRecord {
    fn from(resolver: &EntityResolver) -> Self {
        Self {
            id_to_canonical: resolver
                .id_to_canonical
                .iter()
                .map(|((t, v), id)| (t.key(v), id.clone()))
                .collect(),
            identities: resolver
                .identities
                .iter()
                .map(|(id, identity)| {
                    (
                        id.clone(),
                        IdentityRecord {
                            identifiers: identity.identifiers().clone(),
                        },
                    )
                })
                .collect(),
            next_id: NextId::PerKind(resolver.next_id.clone()),
            deprecated_codes: resolver
                .deprecated
                .iter()
                .map(|((t, v), reason)| (t.key(v), reason.clone()))
                .collect(),
            fused_ids: resolver.fused_into.clone(),
        }
    }
}

impl TryFrom<ResolverRecord> for EntityResolver {
    type Error = GlossaError;

    fn try_from(record: ResolverRecord) -> Result<Self, Self::Error> {
        let mut resolver = EntityResolver::new();
        for (key, id) in record.id_to_canonical {
            let (id_type, value) = split_key(&key)?;
            resolver
                .id_to_canonical
                .insert((id_type.normalized(), value.to_string()), id);
        }
        for (id, identity) in record.identities {
            let identifiers = identity
                .identifiers
                .into_iter()
                .map(|(t, v)| (t.normalized(), v))
                .collect();
            resolver
                .identities
                .insert(id.clone(), EntityIdentity::from_parts(id, identifiers));
        }
        resolver.next_id = match record.next_id {
            NextId::PerKind(counters) => counters,
            NextId::Legacy(n) => BTreeMap::from([(EntityKind::Languoid, n)]),
        };
        for (key, reason) in record.deprecated_codes {
            let (id_type, value) = split_key(&key)?;
            resolver
                .deprecated
                .insert((id_type.normalized(), value.to_string()), reason);
        }
        resolver.fused_into = record.fused_ids;
        Ok(resolver)
    }
}

fn split_key(key: &str) -> Result<(IdType, &str), GlossaError> {
    IdType::split_key(key)
        .ok_or_else(|| GlossaError::Deserialization(format!("Malformed identifier key: {}", key)))
}

/// The whole persisted graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub format: SnapshotFormat,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
    pub entities: BTreeMap<CanonicalId, Entity>,
    pub resolver: ResolverRecord,
}

impl Snapshot {
    /// Capture a store and its resolver.
    #[must_use]
    pub fn capture(store: &Store, resolver: &EntityResolver, format: SnapshotFormat) -> Self {
        let entity_types = EntityKind::ALL
            .into_iter()
            .map(|kind| (kind.tag().to_string(), store.count_of_type(kind)))
            .filter(|(_, count)| *count > 0)
            .collect();
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format,
            metadata: SnapshotMetadata {
                entity_count: store.len(),
                entity_types,
            },
            entities: store.iter().map(|e| (e.id().clone(), e.clone())).collect(),
            resolver: ResolverRecord::from(resolver),
        }
    }

    /// Rebuild the store and resolver.
    ///
    /// Each entity must sit under its own id.
    pub fn into_parts(self) -> Result<(Store, EntityResolver), GlossaError> {
        if self.metadata.entity_count != 0 && self.metadata.entity_count != self.entities.len() {
            warn!(
                declared = self.metadata.entity_count,
                found = self.entities.len(),
                "Snapshot entity count does not match metadata"
            );
        }
        let mut store = Store::new();
        for (key, entity) in self.entities {
            if &key != entity.id() {
                return Err(GlossaError::Deserialization(format!(
                    "Entity stored under {} has id {}",
                    key,
                    entity.id()
                )));
            }
            store.add(entity);
        }
        let resolver = EntityResolver::try_from(self.resolver)?;
        Ok((store, resolver))
    }

    /// Encode in this snapshot's format.
    pub fn encode(&self) -> Result<Vec<u8>, GlossaError> {
        match self.format {
            SnapshotFormat::Json => serde_json::to_vec_pretty(self)
                .map_err(|e| GlossaError::Serialization(e.to_string())),
            SnapshotFormat::JsonGz => {
                let json =
                    serde_json::to_vec(self).map_err(|e| GlossaError::Serialization(e.to_string()))?;
                gzip(&json)
            }
            SnapshotFormat::MsgpackGz => gzip(&payload_to_bytes(self)?),
        }
    }

    /// Decode bytes written in `format`.
    pub fn decode(bytes: &[u8], format: SnapshotFormat) -> Result<Self, GlossaError> {
        match format {
            SnapshotFormat::Json => {
                check_size(bytes.len() as u64)?;
                serde_json::from_slice(bytes).map_err(|e| GlossaError::Deserialization(e.to_string()))
            }
            SnapshotFormat::JsonGz => {
                let json = gunzip(bytes)?;
                serde_json::from_slice(&json).map_err(|e| GlossaError::Deserialization(e.to_string()))
            }
            SnapshotFormat::MsgpackGz => payload_from_bytes(&gunzip(bytes)?),
        }
    }
}

// =============================================================================
// COMPRESSION
// =============================================================================

fn gzip(bytes: &[u8]) -> Result<Vec<u8>, GlossaError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Decompress at most `MAX_SNAPSHOT_SIZE` bytes.
fn gunzip(bytes: &[u8]) -> Result<Vec<u8>, GlossaError> {
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .take(MAX_SNAPSHOT_SIZE + 1)
        .read_to_end(&mut out)
        .map_err(|e| GlossaError::Deserialization(format!("Corrupt gzip stream: {}", e)))?;
    check_size(out.len() as u64)?;
    Ok(out)
}

fn check_size(len: u64) -> Result<(), GlossaError> {
    if len > MAX_SNAPSHOT_SIZE {
        return Err(GlossaError::Deserialization(format!(
            "Snapshot payload exceeds maximum allowed {} bytes",
            MAX_SNAPSHOT_SIZE
        )));
    }
    Ok(())
}

// =============================================================================
// FILE I/O
// =============================================================================

/// Write a snapshot. `format` defaults to the one implied by the path suffix.
pub fn save(
    store: &Store,
    resolver: &EntityResolver,
    path: &Path,
    format: Option<SnapshotFormat>,
) -> Result<(), GlossaError> {
    let format = format.unwrap_or_else(|| SnapshotFormat::from_path(path));
    let bytes = Snapshot::capture(store, resolver, format).encode()?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, &bytes)?;

    info!(
        path = %path.display(),
        format = %format,
        entities = store.len(),
        bytes = bytes.len(),
        "Snapshot saved"
    );
    Ok(())
}

/// Read a snapshot. `format` defaults to the one implied by the path suffix.
pub fn load(
    path: &Path,
    format: Option<SnapshotFormat>,
) -> Result<(Store, EntityResolver), GlossaError> {
    let format = format.unwrap_or_else(|| SnapshotFormat::from_path(path));
    check_size(fs::metadata(path)?.len())?;
    let bytes = fs::read(path)?;
    let (store, resolver) = Snapshot::decode(&bytes, format)?.into_parts()?;

    info!(
        path = %path.display(),
        format = %format,
        entities = store.len(),
        "Snapshot loaded"
    );
    Ok((store, resolver))
}

/// Compact JSON encoding used for digests.
///
/// Every map is ordered, so identical graphs give identical bytes.
pub fn canonical_bytes(store: &Store, resolver: &EntityResolver) -> Result<Vec<u8>, GlossaError> {
    serde_json::to_vec(&Snapshot::capture(store, resolver, SnapshotFormat::Json))
        .map_err(|e| GlossaError::Serialization(e.to_string()))
}

// =============================================================================
// DIGEST
// =============================================================================

/// BLAKE3 digest of `canonical_bytes`, as 64 hex characters.
///
/// Two builds with the same digest hold the same graph and identities.
#[cfg(feature = "crypto-hash")]
pub fn snapshot_digest(store: &Store, resolver: &EntityResolver) -> Result<String, GlossaError> {
    let bytes = canonical_bytes(store, resolver)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Compare a store and resolver against a digest from `snapshot_digest`.
#[cfg(feature = "crypto-hash")]
pub fn verify_digest(
    store: &Store,
    resolver: &EntityResolver,
    expected: &str,
) -> Result<bool, GlossaError> {
    Ok(snapshot_digest(store, resolver)?.eq_ignore_ascii_case(expected))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_set::{DataSource, EntitySet};
    use crate::graph::EntityContainer;
    use crate::merge::merge;
    use crate::types::{
        DeprecatedCode, LanguoidLevel, Metadata, RelationType, WikipediaInfo,
    };

    fn sample() -> (Store, EntityResolver) {
        let mut resolver = EntityResolver::new();
        let mut set = EntitySet::new();
        let nld = {
            let lang = set
                .languoid_mut(
                    &mut resolver,
                    &[(IdType::Iso639_3, "nld"), (IdType::Bcp47, "nl")],
                )
                .expect("nld");
            lang.name = Some("Dutch".into());
            lang.speaker_count = Some(24_000_000);
            lang.latitude = Some(52.5);
            lang.level = Some(LanguoidLevel::Language);
            lang.wikipedia = Some(WikipediaInfo {
                code: Some("nl".into()),
                article_count: Some(2_100_000),
                ..WikipediaInfo::default()
            });
            lang.deprecated_codes = Some(vec![DeprecatedCode {
                code: "dut".into(),
                code_type: IdType::Iso639_2B,
                reason: Some("C".into()),
                name: None,
                effective: None,
                remedy: None,
            }]);
            lang.id.clone()
        };
        let latn = {
            let script = set.script_mut("Latn").expect("latn");
            script.name = Some("Latin".into());
            script.id.clone()
        };
        let nl = {
            let region = set.region_mut("NL").expect("nl");
            region.country_code = Some("NL".into());
            region.is_historical = Some(false);
            region.id.clone()
        };
        let mut meta = Metadata::new();
        meta.insert("is_canonical".into(), true.into());
        set.add_bidirectional_relation(&nld, RelationType::UsesScript, &latn, meta)
            .expect("script");
        let mut meta = Metadata::new();
        meta.insert("speakers".into(), 17_000_000i64.into());
        meta.insert("note".into(), "official".into());
        set.add_bidirectional_relation(&nld, RelationType::SpokenInRegion, &nl, meta)
            .expect("region");

        resolver.register_deprecated(IdType::Iso639_3, "mol", "M");
        resolver.register_deprecated(IdType::Iso639_3, "sgl", "N");
        resolver.register_alias(IdType::Iso639_2B, "dut", nld);

        let outcome = merge(&[(DataSource::new("test", 10), set)], &resolver);
        (outcome.store, resolver)
    }

    #[test]
    fn roundtrip_every_format() {
        let (store, resolver) = sample();
        let dir = tempfile::tempdir().expect("tempdir");

        for (name, format) in [
            ("glossa.json", SnapshotFormat::Json),
            ("glossa.json.gz", SnapshotFormat::JsonGz),
            ("glossa.msgpack.gz", SnapshotFormat::MsgpackGz),
        ] {
            let path = dir.path().join(name);
            save(&store, &resolver, &path, None).expect("save");
            let (loaded_store, loaded_resolver) = load(&path, None).expect("load");
            assert_eq!(loaded_store, store, "{format}");
            assert_eq!(loaded_resolver, resolver, "{format}");
            assert!(loaded_resolver.is_deprecated(IdType::Iso639_3, "mol"));
            assert_eq!(
                loaded_resolver.resolve(IdType::Iso639_2B, "dut"),
                resolver.resolve(IdType::Iso639_3, "nld")
            );
        }
    }

    #[test]
    fn save_creates_parent_directories() {
        let (store, resolver) = sample();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("out.json.gz");
        save(&store, &resolver, &path, None).expect("save");
        assert!(path.exists());
    }

    #[test]
    fn explicit_format_overrides_suffix() {
        let (store, resolver) = sample();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("glossa.db");
        save(&store, &resolver, &path, Some(SnapshotFormat::MsgpackGz)).expect("save");
        assert!(load(&path, None).is_err());
        let (loaded, _) = load(&path, Some(SnapshotFormat::MsgpackGz)).expect("load");
        assert_eq!(loaded.len(), store.len());
    }

    #[test]
    fn unknown_fields_and_legacy_counter_are_accepted() {
        let json = r#"{
            "version": "0.1.0",
            "format": "json",
            "generator": "older build",
            "entities": {
                "lang:000001": {
                    "kind": "Languoid",
                    "id": "lang:000001",
                    "iso_639_3": "nld",
                    "population_2020": 1234,
                    "relations": {}
                }
            },
            "resolver": {
                "id_to_canonical": {"iso_639_3:nld": "lang:000001"},
                "identities": {"lang:000001": {"identifiers": {"iso_639_3": "nld"}}},
                "next_id": 2,
                "deprecated_codes": {}
            }
        }"#;
        let snapshot = Snapshot::decode(json.as_bytes(), SnapshotFormat::Json).expect("decode");
        let (store, mut resolver) = snapshot.into_parts().expect("parts");

        let id = CanonicalId::new("lang:000001");
        assert!(store.contains(&id));
        assert_eq!(resolver.resolve(IdType::Iso639_3, "nld"), Some(&id));
        assert_eq!(resolver.next_id(EntityKind::Languoid), 2);
        let fresh = resolver.find_or_create_canonical_id(&[(IdType::Iso639_3, "deu")]);
        assert_eq!(fresh.as_str(), "lang:000002");
    }

    #[test]
    fn mismatched_entity_key_is_rejected() {
        let json = r#"{
            "entities": {"lang:000001": {"kind": "Languoid", "id": "lang:000002"}},
            "resolver": {}
        }"#;
        let snapshot = Snapshot::decode(json.as_bytes(), SnapshotFormat::Json).expect("decode");
        assert!(snapshot.into_parts().is_err());
    }

    #[test]
    fn malformed_resolver_key_is_rejected() {
        let json = r#"{
            "entities": {},
            "resolver": {"id_to_canonical": {"klingon:tlh": "lang:000001"}}
        }"#;
        let snapshot = Snapshot::decode(json.as_bytes(), SnapshotFormat::Json).expect("decode");
        assert!(snapshot.into_parts().is_err());
    }

    #[test]
    fn corrupt_gzip_is_an_error() {
        assert!(Snapshot::decode(b"not gzip at all", SnapshotFormat::JsonGz).is_err());
        assert!(Snapshot::decode(b"not gzip at all", SnapshotFormat::MsgpackGz).is_err());
    }

    #[test]
    fn canonical_bytes_are_stable() {
        let (store, resolver) = sample();
        let first = canonical_bytes(&store, &resolver).expect("bytes");
        let (again_store, again_resolver) = sample();
        let second = canonical_bytes(&again_store, &again_resolver).expect("bytes");
        assert_eq!(first, second);
    }

    #[test]
    fn metadata_counts_kinds() {
        let (store, resolver) = sample();
        let snapshot = Snapshot::capture(&store, &resolver, SnapshotFormat::Json);
        assert_eq!(snapshot.metadata.entity_count, 3);
        assert_eq!(snapshot.metadata.entity_types.get("GeographicRegion"), Some(&1));
    }

    #[cfg(feature = "crypto-hash")]
    #[test]
    fn digest_tracks_content() {
        let (store, resolver) = sample();
        let digest = snapshot_digest(&store, &resolver).expect("digest");
        assert_eq!(digest.len(), 64);
        assert!(verify_digest(&store, &resolver, &digest.to_uppercase()).expect("verify"));
        assert!(!verify_digest(&Store::new(), &resolver, &digest).expect("verify"));
    }
}
