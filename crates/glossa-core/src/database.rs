//! # Database
//!
//! The read-only, identifier-facing API over a loaded snapshot.
//!
//! This is the only layer that turns absence into errors: `get` returns
//! `NotFound` and `guess` returns `Unrecognized`, or either returns
//! `DeprecatedNoReplacement` with the retirement reason
//! when the code was retired without a successor. A deprecated code that
//! still resolves succeeds and logs a warning.
//!
//! A `Database` owns its store and resolver and hands out shared
//! references only, so it can be shared across threads once loaded.

use crate::formats::{self, SnapshotFormat};
use crate::graph::{EntityContainer, Store};
use crate::query::Query;
use crate::resolver::EntityResolver;
use crate::storage::{NameArchive, NameEntry, NameLookup};
use crate::types::{
    CanonicalId, Entity, GeographicRegion, GlossaError, IdType, Languoid, LanguoidLevel, Script,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// File name of the name archive looked up next to a snapshot.
pub const DEFAULT_NAMES_FILE: &str = "names.redb";

/// Outcome of resolving one code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub canonical_id: CanonicalId,
    /// Retirement reason when the code is deprecated but still resolves.
    pub deprecated: Option<String>,
}

/// Loaded store + resolver, with optional multilingual names.
pub struct Database {
    store: Store,
    resolver: EntityResolver,
    names: Option<Box<dyn NameLookup + Send + Sync>>,
    /// Lowercased name and endonym -> languoid ids.
    name_index: BTreeMap<String, Vec<CanonicalId>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("entities", &self.store.len())
            .field("names", &self.names.is_some())
            .finish_non_exhaustive()
    }
}

impl Database {
    #[must_use]
    pub fn new(store: Store, resolver: EntityResolver) -> Self {
        let name_index = build_name_index(&store);
        Self {
            store,
            resolver,
            names: None,
            name_index,
        }
    }

    /// Load a snapshot, inferring its format from the suffix.
    ///
    /// A `names.redb` archive next to the snapshot is opened when present.
    pub fn load(path: &Path) -> Result<Self, GlossaError> {
        Self::load_with(path, None, None)
    }

    /// Load a snapshot with an explicit format and/or name archive.
    pub fn load_with(
        path: &Path,
        format: Option<SnapshotFormat>,
        names: Option<&Path>,
    ) -> Result<Self, GlossaError> {
        let (store, resolver) = formats::load(path, format)?;
        let db = Self::new(store, resolver);

        let default_names = path
            .parent()
            .map(|dir| dir.join(DEFAULT_NAMES_FILE))
            .filter(|p| p.exists());
        let names_path = names.map(Path::to_path_buf).or(default_names);

        match names_path {
            Some(p) => {
                debug!(path = %p.display(), "Opening name archive");
                Ok(db.with_names(NameArchive::open(&p)?))
            }
            None => Ok(db),
        }
    }

    /// Attach a name lookup.
    #[must_use]
    pub fn with_names(mut self, names: impl NameLookup + Send + Sync + 'static) -> Self {
        self.names = Some(Box::new(names));
        self
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    #[must_use]
    pub fn has_names(&self) -> bool {
        self.names.is_some()
    }

    // =========================================================================
    // IDENTIFIER API
    // =========================================================================

    /// Resolve a code, reporting whether it is deprecated.
    pub fn resolve_code(&self, code: &str, id_type: IdType) -> Result<Resolution, GlossaError> {
        match self.resolver.resolve(id_type, code) {
            Some(canonical_id) => Ok(Resolution {
                canonical_id: canonical_id.clone(),
                deprecated: self
                    .resolver
                    .deprecation_reason(id_type, code)
                    .map(str::to_string),
            }),
            None => Err(self.missing(code, id_type)),
        }
    }

    /// Get a languoid by identifier.
    pub fn get(&self, code: &str, id_type: IdType) -> Result<&Languoid, GlossaError> {
        let resolution = self.resolve_code(code, id_type)?;
        let languoid = self
            .store
            .get_languoid(&resolution.canonical_id)
            .ok_or_else(|| GlossaError::NotFound {
                code: code.to_string(),
                id_type,
            })?;
        if let Some(reason) = &resolution.deprecated {
            warn!(
                code = %code,
                id_type = %id_type,
                reason = %reason,
                resolved_to = %languoid.id,
                name = languoid.name.as_deref().unwrap_or(""),
                "Deprecated code resolved to replacement"
            );
        }
        Ok(languoid)
    }

    /// Try every identifier type in `IdType::GUESS_ORDER`.
    ///
    /// A retirement error from any attempt is returned over a plain miss.
    pub fn guess(&self, code: &str) -> Result<&Languoid, GlossaError> {
        let mut deprecated = None;
        for id_type in IdType::GUESS_ORDER {
            match self.get(code, id_type) {
                Ok(languoid) => return Ok(languoid),
                Err(e @ GlossaError::DeprecatedNoReplacement { .. }) => {
                    deprecated.get_or_insert(e);
                }
                Err(_) => {}
            }
        }
        Err(deprecated.unwrap_or_else(|| GlossaError::Unrecognized {
            code: code.to_string(),
        }))
    }

    /// Convert a code between identifier schemes. `None` on any failure.
    #[must_use]
    pub fn convert(&self, code: &str, from: IdType, to: IdType) -> Option<String> {
        let id = self.resolver.resolve(from, code)?;
        self.store
            .get_languoid(id)?
            .identifier(to)
            .map(str::to_string)
    }

    /// Whether a code is retired, for one type or (with `None`) any type.
    #[must_use]
    pub fn is_deprecated(&self, code: &str, id_type: Option<IdType>) -> bool {
        match id_type {
            Some(t) => self.resolver.is_deprecated(t, code),
            None => IdType::ALL
                .into_iter()
                .any(|t| self.resolver.is_deprecated(t, code)),
        }
    }

    fn missing(&self, code: &str, id_type: IdType) -> GlossaError {
        match self.resolver.deprecation_reason(id_type, code) {
            Some(reason) => GlossaError::DeprecatedNoReplacement {
                code: code.to_string(),
                id_type,
                reason: reason.to_string(),
            },
            None => GlossaError::NotFound {
                code: code.to_string(),
                id_type,
            },
        }
    }

    // =========================================================================
    // SCRIPTS AND REGIONS
    // =========================================================================

    /// Get a script by ISO 15924 code (`Latn`).
    pub fn get_script(&self, code: &str) -> Result<&Script, GlossaError> {
        let id = EntityResolver::script_id(code);
        self.store
            .get_script(&id)
            .ok_or_else(|| GlossaError::UnknownEntity(id.clone()))
    }

    /// Get a region by ISO 3166 code (`NL`, `NL-NH`).
    pub fn get_region(&self, code: &str) -> Result<&GeographicRegion, GlossaError> {
        let id = EntityResolver::region_id(code);
        self.store
            .get_region(&id)
            .ok_or_else(|| GlossaError::UnknownEntity(id.clone()))
    }

    // =========================================================================
    // SEARCH
    // =========================================================================

    /// Case-insensitive substring search over languoid names and endonyms.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Languoid> {
        let needle = query.to_lowercase();
        let mut seen: BTreeSet<&CanonicalId> = BTreeSet::new();
        let mut results = Vec::new();
        for (name, ids) in &self.name_index {
            if !name.contains(&needle) {
                continue;
            }
            for id in ids {
                if results.len() >= limit {
                    return results;
                }
                if seen.insert(id) {
                    if let Some(languoid) = self.store.get_languoid(id) {
                        results.push(languoid);
                    }
                }
            }
        }
        results
    }

    /// Search scripts by name or full name.
    #[must_use]
    pub fn search_scripts(&self, query: &str, limit: usize) -> Vec<&Script> {
        let needle = query.to_lowercase();
        self.store
            .all_scripts()
            .into_iter()
            .filter(|s| {
                contains_lower(s.name.as_deref(), &needle)
                    || contains_lower(s.full_name.as_deref(), &needle)
            })
            .take(limit)
            .collect()
    }

    /// Search regions by name or country code.
    #[must_use]
    pub fn search_regions(&self, query: &str, limit: usize) -> Vec<&GeographicRegion> {
        let needle = query.to_lowercase();
        self.store
            .all_regions()
            .into_iter()
            .filter(|r| {
                contains_lower(r.name.as_deref(), &needle)
                    || contains_lower(r.country_code.as_deref(), &needle)
            })
            .take(limit)
            .collect()
    }

    // =========================================================================
    // COLLECTIONS
    // =========================================================================

    #[must_use]
    pub fn all_languoids(&self) -> Vec<&Languoid> {
        self.store.all_languoids()
    }

    #[must_use]
    pub fn all_languages(&self) -> Vec<&Languoid> {
        self.languoids_at(LanguoidLevel::Language)
    }

    #[must_use]
    pub fn all_families(&self) -> Vec<&Languoid> {
        self.languoids_at(LanguoidLevel::Family)
    }

    #[must_use]
    pub fn all_dialects(&self) -> Vec<&Languoid> {
        self.languoids_at(LanguoidLevel::Dialect)
    }

    #[must_use]
    pub fn all_scripts(&self) -> Vec<&Script> {
        self.store.all_scripts()
    }

    #[must_use]
    pub fn all_regions(&self) -> Vec<&GeographicRegion> {
        self.store.all_regions()
    }

    /// Current top-level countries: no subdivisions, no historical countries.
    #[must_use]
    pub fn all_countries(&self) -> Vec<&GeographicRegion> {
        self.store
            .all_regions()
            .into_iter()
            .filter(|r| r.is_country())
            .collect()
    }

    #[must_use]
    pub fn query(&self, query: &Query) -> Vec<&Entity> {
        self.store.query(query)
    }

    /// Get any entity by canonical id.
    #[must_use]
    pub fn entity(&self, id: &CanonicalId) -> Option<&Entity> {
        self.store.get(id)
    }

    fn languoids_at(&self, level: LanguoidLevel) -> Vec<&Languoid> {
        self.store
            .all_languoids()
            .into_iter()
            .filter(|l| l.level == Some(level))
            .collect()
    }

    // =========================================================================
    // NAMES
    // =========================================================================

    /// Names of a languoid in every locale.
    ///
    /// `Ok(None)` when no name archive is attached or the code does not resolve.
    pub fn get_names(&self, code: &str, id_type: IdType) -> Result<Option<Vec<NameEntry>>, GlossaError> {
        let Some(names) = &self.names else {
            return Ok(None);
        };
        match self.resolver.resolve(id_type, code) {
            Some(id) => names.names(id),
            None => Ok(None),
        }
    }

    /// Name of `languoid` in `locale` (a BCP-47 code or a canonical id).
    ///
    /// A canonical entry wins over other entries in the same locale.
    pub fn name_in(&self, languoid: &Languoid, locale: &str) -> Result<Option<String>, GlossaError> {
        let Some(names) = &self.names else {
            return Ok(None);
        };
        let Some(entries) = names.names(&languoid.id)? else {
            return Ok(None);
        };
        let mut matching = entries.into_iter().filter(|e| e.is_in(locale));
        let Some(first) = matching.next() else {
            return Ok(None);
        };
        if first.is_canonical {
            return Ok(Some(first.name));
        }
        Ok(Some(
            matching
                .find(|e| e.is_canonical)
                .map_or(first.name, |e| e.name),
        ))
    }
}

fn contains_lower(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

fn build_name_index(store: &Store) -> BTreeMap<String, Vec<CanonicalId>> {
    let mut index: BTreeMap<String, Vec<CanonicalId>> = BTreeMap::new();
    for languoid in store.all_languoids() {
        for name in [languoid.name.as_deref(), languoid.endonym.as_deref()]
            .into_iter()
            .flatten()
        {
            index
                .entry(name.to_lowercase())
                .or_default()
                .push(languoid.id.clone());
        }
    }
    index
}

// =============================================================================
// TESTS
// =============================================================================
