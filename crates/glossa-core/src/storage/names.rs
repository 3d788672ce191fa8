//! # Name Archive
//!
//! A redb-backed keyed blob store of multilingual languoid names.
//!
//! One row per languoid: `canonical id -> postcard(Vec<NameEntry>)`. The
//! archive is written once at build time and opened read-only by queries,
//! so rows are decoded lazily, one languoid at a time.

use crate::resolver::EntityResolver;
use crate::types::{CanonicalId, GlossaError, IdType};
use redb::{Database, ReadableDatabase, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Table for names: canonical id -> postcard-encoded entries
const NAMES: TableDefinition<&str, &[u8]> = TableDefinition::new("names");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// One name of a languoid in one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    pub name: String,
    /// Canonical id of the locale language, when its BCP-47 code resolved.
    pub locale_id: Option<CanonicalId>,
    pub bcp_47_code: Option<String>,
    pub is_canonical: bool,
}

impl NameEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, bcp_47_code: Option<&str>, is_canonical: bool) -> Self {
        Self {
            name: name.into(),
            locale_id: None,
            bcp_47_code: bcp_47_code.map(str::to_string),
            is_canonical,
        }
    }

    /// Whether this entry is in `locale`, given as a canonical id or a BCP-47 code.
    #[must_use]
    pub fn is_in(&self, locale: &str) -> bool {
        self.locale_id.as_ref().is_some_and(|id| id.as_str() == locale)
            || self.bcp_47_code.as_deref() == Some(locale)
    }
}

/// Read access to per-languoid names.
pub trait NameLookup {
    /// Names of one languoid, or `None` if the archive has no row for it.
    fn names(&self, id: &CanonicalId) -> Result<Option<Vec<NameEntry>>, GlossaError>;
}

impl NameLookup for BTreeMap<CanonicalId, Vec<NameEntry>> {
    fn names(&self, id: &CanonicalId) -> Result<Option<Vec<NameEntry>>, GlossaError> {
        Ok(self.get(id).cloned())
    }
}

fn storage_err(e: impl std::fmt::Display) -> GlossaError {
    GlossaError::Storage(e.to_string())
}

/// The on-disk name archive.
pub struct NameArchive {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for NameArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameArchive")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl NameArchive {
    /// Create an archive for writing, or open an existing one.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, GlossaError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(storage_err)?;

        let write_txn = db.begin_write().map_err(storage_err)?;
        let _ = write_txn.open_table(NAMES).map_err(storage_err)?;
        let _ = write_txn.open_table(METADATA).map_err(storage_err)?;
        write_txn.commit().map_err(storage_err)?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing archive. Fails if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GlossaError> {
        let path = path.as_ref();
        let db = Database::open(path).map_err(storage_err)?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every languoid's names in one transaction. Existing rows are replaced.
    ///
    /// Returns the number of rows written.
    pub fn write_all(
        &self,
        names: &BTreeMap<CanonicalId, Vec<NameEntry>>,
    ) -> Result<usize, GlossaError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(NAMES).map_err(storage_err)?;
            for (id, entries) in names {
                let bytes = postcard::to_allocvec(entries)
                    .map_err(|e| GlossaError::Serialization(e.to_string()))?;
                table
                    .insert(id.as_str(), bytes.as_slice())
                    .map_err(storage_err)?;
            }
            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
            meta.insert("languoid_count", table.len().map_err(storage_err)?)
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        info!(path = %self.path.display(), languoids = names.len(), "Name archive written");
        Ok(names.len())
    }

    /// Number of languoids with names.
    pub fn len(&self) -> Result<u64, GlossaError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(NAMES).map_err(storage_err)?;
        table.len().map_err(storage_err)
    }

    pub fn is_empty(&self) -> Result<bool, GlossaError> {
        Ok(self.len()? == 0)
    }
}

impl NameLookup for NameArchive {
    fn names(&self, id: &CanonicalId) -> Result<Option<Vec<NameEntry>>, GlossaError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(NAMES).map_err(storage_err)?;
        let Some(row) = table.get(id.as_str()).map_err(storage_err)? else {
            return Ok(None);
        };
        let entries = postcard::from_bytes(row.value())
            .map_err(|e| GlossaError::Deserialization(e.to_string()))?;
        Ok(Some(entries))
    }
}

// =============================================================================
// BUILD-SIDE HELPERS
// =============================================================================

/// Combine name lists from several sources per languoid.
///
/// Entries are de-duplicated by `(bcp_47_code, name)` in first-seen order;
/// a canonical entry replaces a non-canonical duplicate in place.
#[must_use]
pub fn merge_name_entries(
    sources: impl IntoIterator<Item = BTreeMap<CanonicalId, Vec<NameEntry>>>,
) -> BTreeMap<CanonicalId, Vec<NameEntry>> {
    let mut merged: BTreeMap<CanonicalId, Vec<NameEntry>> = BTreeMap::new();
    for source in sources {
        for (id, entries) in source {
            let list = merged.entry(id).or_default();
            for entry in entries {
                match list
                    .iter_mut()
                    .find(|e| e.bcp_47_code == entry.bcp_47_code && e.name == entry.name)
                {
                    Some(existing) => {
                        if entry.is_canonical && !existing.is_canonical {
                            *existing = entry;
                        }
                    }
                    None => list.push(entry),
                }
            }
        }
    }
    merged
}

/// Fill `locale_id` of every entry from its BCP-47 code.
///
/// Codes the resolver does not know leave `locale_id` empty.
pub fn resolve_locales(
    names: &mut BTreeMap<CanonicalId, Vec<NameEntry>>,
    resolver: &EntityResolver,
) {
    for entry in names.values_mut().flatten() {
        if let Some(code) = entry.bcp_47_code.as_deref() {
            entry.locale_id = resolver.resolve(IdType::Bcp47, code).cloned();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dutch() -> CanonicalId {
        CanonicalId::new("lang:000001")
    }

    #[test]
    fn write_then_read() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("names.redb");

        let mut names = BTreeMap::new();
        names.insert(
            dutch(),
            vec![
                NameEntry::new("Dutch", Some("en"), true),
                NameEntry::new("néerlandais", Some("fr"), true),
            ],
        );
        {
            let archive = NameArchive::create(&path).expect("create");
            assert_eq!(archive.write_all(&names).expect("write"), 1);
        }

        let archive = NameArchive::open(&path).expect("open");
        assert_eq!(archive.len().expect("len"), 1);
        let entries = archive.names(&dutch()).expect("read").expect("row");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "néerlandais");
        assert!(archive.names(&CanonicalId::new("lang:999999")).expect("read").is_none());
    }

    #[test]
    fn open_missing_archive_fails() {
        let temp = tempdir().expect("temp dir");
        assert!(NameArchive::open(temp.path().join("absent.redb")).is_err());
    }

    #[test]
    fn merge_prefers_canonical_duplicates() {
        let mut first = BTreeMap::new();
        first.insert(
            dutch(),
            vec![
                NameEntry::new("Dutch", Some("en"), false),
                NameEntry::new("Flemish", Some("en"), false),
            ],
        );
        let mut second = BTreeMap::new();
        second.insert(
            dutch(),
            vec![
                NameEntry::new("Dutch", Some("en"), true),
                NameEntry::new("Holländisch", Some("de"), false),
            ],
        );

        let merged = merge_name_entries([first, second]);
        let entries = &merged[&dutch()];
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Dutch", "Flemish", "Holländisch"]);
        assert!(entries[0].is_canonical);
    }

    #[test]
    fn locales_resolve_through_bcp_47() {
        let mut resolver = EntityResolver::new();
        let french = resolver.find_or_create_canonical_id(&[(IdType::Bcp47, "fr")]);

        let mut names = BTreeMap::new();
        names.insert(
            dutch(),
            vec![
                NameEntry::new("néerlandais", Some("fr"), true),
                NameEntry::new("nederlands", Some("xx-unknown"), false),
                NameEntry::new("Dutch", None, false),
            ],
        );
        resolve_locales(&mut names, &resolver);

        let entries = &names[&dutch()];
        assert_eq!(entries[0].locale_id.as_ref(), Some(&french));
        assert!(entries[0].is_in("fr"));
        assert!(entries[0].is_in(french.as_str()));
        assert!(entries[1].locale_id.is_none());
        assert!(entries[2].locale_id.is_none());
    }
}
