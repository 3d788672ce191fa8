//! # Entity Resolver
//!
//! Maps heterogeneous external identifiers to stable canonical ids.
//!
//! The resolver is the single writer of identity during a build. Importers
//! never format canonical ids themselves: languoids go through
//! [`EntityResolver::find_or_create_canonical_id`], scripts and regions
//! through the code-keyed helpers [`EntityResolver::script_id`] and
//! [`EntityResolver::region_id`].
//!
//! ## Identity fusion
//!
//! Independent sources register without knowledge of each other. When one
//! identifier set matches more than one existing canonical id, those
//! entities are fused into the lexicographically smallest id. Fusions are
//! remembered so that entity sets built before the fusion can still be
//! redirected onto the survivor at merge time.
//!
//! ISO 639-2/T is never stored: every read and write normalizes it to
//! ISO 639-3 first.

use crate::primitives::MAX_TRAVERSAL_DEPTH;
use crate::types::{CanonicalId, EntityKind, IdType};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// All identifiers known for one canonical entity.
///
/// At most one value per identifier type: the first registered value sticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdentity {
    pub canonical_id: CanonicalId,
    identifiers: BTreeMap<IdType, String>,
}

impl EntityIdentity {
    #[must_use]
    pub fn new(canonical_id: CanonicalId) -> Self {
        Self {
            canonical_id,
            identifiers: BTreeMap::new(),
        }
    }

    /// Rebuild an identity from stored identifiers (snapshot load).
    pub(crate) fn from_parts(canonical_id: CanonicalId, identifiers: BTreeMap<IdType, String>) -> Self {
        Self {
            canonical_id,
            identifiers,
        }
    }

    /// Attach an identifier unless one of this type is already present.
    ///
    /// A different value for an occupied type is rejected and logged.
    /// Returns `true` if the identifier was attached.
    pub fn add_identifier(&mut self, id_type: IdType, value: &str) -> bool {
        let id_type = id_type.normalized();
        match self.identifiers.get(&id_type) {
            Some(existing) => {
                if existing != value {
                    warn!(
                        canonical_id = %self.canonical_id,
                        id_type = %id_type,
                        kept = %existing,
                        rejected = %value,
                        "Conflicting identifier rejected"
                    );
                }
                false
            }
            None => {
                self.identifiers.insert(id_type, value.to_string());
                true
            }
        }
    }

    #[must_use]
    pub fn identifier(&self, id_type: IdType) -> Option<&str> {
        self.identifiers
            .get(&id_type.normalized())
            .map(String::as_str)
    }

    #[must_use]
    pub fn has_identifier(&self, id_type: IdType, value: &str) -> bool {
        self.identifier(id_type) == Some(value)
    }

    #[must_use]
    pub fn identifiers(&self) -> &BTreeMap<IdType, String> {
        &self.identifiers
    }
}

/// Summary numbers about the resolver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub total_entities: usize,
    pub total_identifier_mappings: usize,
    pub max_identifiers_per_entity: usize,
    pub min_identifiers_per_entity: usize,
}

/// Resolves external identifiers to canonical entity ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityResolver {
    pub(crate) id_to_canonical: BTreeMap<(IdType, String), CanonicalId>,
    pub(crate) identities: BTreeMap<CanonicalId, EntityIdentity>,
    pub(crate) next_id: BTreeMap<EntityKind, u64>,
    pub(crate) deprecated: BTreeMap<(IdType, String), String>,
    pub(crate) fused_into: BTreeMap<CanonicalId, CanonicalId>,
}

impl EntityResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Resolve an identifier to its canonical id. Never fails; absence is `None`.
    #[must_use]
    pub fn resolve(&self, id_type: IdType, value: &str) -> Option<&CanonicalId> {
        self.id_to_canonical
            .get(&(id_type.normalized(), value.to_string()))
    }

    /// The full identity behind an identifier.
    #[must_use]
    pub fn find(&self, id_type: IdType, value: &str) -> Option<&EntityIdentity> {
        self.resolve(id_type, value)
            .and_then(|id| self.identity(id))
    }

    #[must_use]
    pub fn identity(&self, canonical_id: &CanonicalId) -> Option<&EntityIdentity> {
        self.identities.get(canonical_id)
    }

    #[must_use]
    pub fn identifiers(&self, canonical_id: &CanonicalId) -> Option<&BTreeMap<IdType, String>> {
        self.identity(canonical_id).map(EntityIdentity::identifiers)
    }

    /// All identities, ordered by canonical id.
    pub fn identities(&self) -> impl Iterator<Item = &EntityIdentity> {
        self.identities.values()
    }

    /// Every index entry, including aliases.
    pub fn mappings(&self) -> impl Iterator<Item = (IdType, &str, &CanonicalId)> {
        self.id_to_canonical
            .iter()
            .map(|((t, v), id)| (*t, v.as_str(), id))
    }

    /// Follow fusion redirects to the surviving canonical id.
    ///
    /// Ids that were never fused are returned unchanged.
    #[must_use]
    pub fn canonical<'a>(&'a self, canonical_id: &'a CanonicalId) -> &'a CanonicalId {
        let mut current = canonical_id;
        for _ in 0..MAX_TRAVERSAL_DEPTH {
            match self.fused_into.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// `(loser, survivor)` pairs of every fusion performed.
    pub fn fusions(&self) -> impl Iterator<Item = (&CanonicalId, &CanonicalId)> {
        self.fused_into.iter()
    }

    /// Next counter value for a kind (counters start at 1).
    #[must_use]
    pub fn next_id(&self, kind: EntityKind) -> u64 {
        self.next_id.get(&kind).copied().unwrap_or(1)
    }

    // =========================================================================
    // CODE-KEYED IDS
    // =========================================================================

    /// Canonical id of a script from its ISO 15924 code (`Latn` -> `script:latn`).
    #[must_use]
    pub fn script_id(code: &str) -> CanonicalId {
        CanonicalId::coded(EntityKind::Script, code)
    }

    /// Canonical id of a region from its ISO 3166 code (`NL` -> `region:nl`).
    #[must_use]
    pub fn region_id(code: &str) -> CanonicalId {
        CanonicalId::coded(EntityKind::Region, code)
    }

    // =========================================================================
    // IDENTITY REGISTRATION
    // =========================================================================

    /// Languoid shorthand for [`Self::find_or_create_canonical_id_for`].
    pub fn find_or_create_canonical_id(&mut self, identifiers: &[(IdType, &str)]) -> CanonicalId {
        self.find_or_create_canonical_id_for(EntityKind::Languoid, identifiers)
    }

    /// Find the entity any of `identifiers` belongs to, or create it.
    ///
    /// - No match: a fresh id is allocated from the per-kind counter.
    /// - One match: missing identifier types are attached; present ones are kept.
    /// - Several matches: the matched entities are fused into the smallest id.
    pub fn find_or_create_canonical_id_for(
        &mut self,
        kind: EntityKind,
        identifiers: &[(IdType, &str)],
    ) -> CanonicalId {
        let mut supplied: BTreeMap<IdType, &str> = BTreeMap::new();
        for (id_type, value) in identifiers {
            supplied.entry(id_type.normalized()).or_insert(*value);
        }

        let candidates: BTreeSet<CanonicalId> = supplied
            .iter()
            .filter_map(|(t, v)| self.resolve(*t, v).cloned())
            .collect();

        let mut candidates = candidates.into_iter();
        match (candidates.next(), candidates.next()) {
            (None, _) => {
                let canonical_id = self.allocate(kind);
                let mut identity = EntityIdentity::new(canonical_id.clone());
                for (id_type, value) in &supplied {
                    identity.add_identifier(*id_type, value);
                }
                self.register_identity(identity);
                debug!(canonical_id = %canonical_id, "Created entity");
                canonical_id
            }
            (Some(canonical_id), None) => {
                self.attach_all(&canonical_id, &supplied);
                canonical_id
            }
            (Some(first), Some(second)) => {
                let mut matched = vec![first, second];
                matched.extend(candidates);
                self.fuse(matched, &supplied)
            }
        }
    }

    /// Point an identifier at an existing entity without touching its owned identifiers.
    ///
    /// Used for deprecated-code redirects and compound or legacy codes.
    pub fn register_alias(&mut self, id_type: IdType, value: &str, canonical_id: CanonicalId) {
        self.id_to_canonical
            .insert((id_type.normalized(), value.to_string()), canonical_id);
    }

    /// Mark a code as retired. It may or may not also have an alias.
    pub fn register_deprecated(&mut self, id_type: IdType, value: &str, reason: &str) {
        self.deprecated
            .insert((id_type.normalized(), value.to_string()), reason.to_string());
    }

    #[must_use]
    pub fn is_deprecated(&self, id_type: IdType, value: &str) -> bool {
        self.deprecation_reason(id_type, value).is_some()
    }

    #[must_use]
    pub fn deprecation_reason(&self, id_type: IdType, value: &str) -> Option<&str> {
        self.deprecated
            .get(&(id_type.normalized(), value.to_string()))
            .map(String::as_str)
    }

    /// Every retired code with its reason.
    pub fn deprecated_codes(&self) -> impl Iterator<Item = (IdType, &str, &str)> {
        self.deprecated
            .iter()
            .map(|((t, v), reason)| (*t, v.as_str(), reason.as_str()))
    }

    #[must_use]
    pub fn stats(&self) -> ResolverStats {
        let counts = self.identities.values().map(|i| i.identifiers.len());
        ResolverStats {
            total_entities: self.identities.len(),
            total_identifier_mappings: self.id_to_canonical.len(),
            max_identifiers_per_entity: counts.clone().max().unwrap_or(0),
            min_identifiers_per_entity: counts.min().unwrap_or(0),
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn allocate(&mut self, kind: EntityKind) -> CanonicalId {
        let counter = self.next_id.entry(kind).or_insert(1);
        let mut candidate = CanonicalId::numbered(kind, *counter);
        *counter += 1;
        // Skip ids a snapshot or alias may already occupy.
        while self.identities.contains_key(&candidate) || self.fused_into.contains_key(&candidate) {
            candidate = CanonicalId::numbered(kind, *counter);
            *counter += 1;
        }
        candidate
    }

    fn register_identity(&mut self, identity: EntityIdentity) {
        for (id_type, value) in &identity.identifiers {
            let key = (*id_type, value.clone());
            if let Some(existing) = self.id_to_canonical.get(&key) {
                if existing != &identity.canonical_id {
                    warn!(
                        id_type = %id_type,
                        value = %value,
                        existing = %existing,
                        new = %identity.canonical_id,
                        "Identifier collision"
                    );
                }
            }
            self.id_to_canonical
                .insert(key, identity.canonical_id.clone());
        }
        self.identities
            .insert(identity.canonical_id.clone(), identity);
    }

    fn attach_all(&mut self, canonical_id: &CanonicalId, supplied: &BTreeMap<IdType, &str>) {
        let Some(identity) = self.identities.get_mut(canonical_id) else {
            // Resolved through an alias to an id with no identity of its own.
            let mut identity = EntityIdentity::new(canonical_id.clone());
            for (id_type, value) in supplied {
                identity.add_identifier(*id_type, value);
            }
            self.register_identity(identity);
            return;
        };

        let mut attached = Vec::new();
        for (id_type, value) in supplied {
            if !identity.identifiers.contains_key(id_type) && identity.add_identifier(*id_type, value) {
                attached.push((*id_type, value.to_string()));
            }
        }
        for key in attached {
            self.id_to_canonical.insert(key, canonical_id.clone());
        }
        debug!(canonical_id = %canonical_id, "Updated entity");
    }

    fn fuse(&mut self, matched: Vec<CanonicalId>, supplied: &BTreeMap<IdType, &str>) -> CanonicalId {
        // `matched` comes from a BTreeSet, so the first entry is the smallest.
        let survivor = matched[0].clone();
        warn!(
            survivor = %survivor,
            fused = ?matched,
            identifiers = ?supplied,
            "Identity fusion: independently registered entities are the same"
        );

        let mut survivor_identity = self
            .identities
            .remove(&survivor)
            .unwrap_or_else(|| EntityIdentity::new(survivor.clone()));

        for loser in matched.iter().skip(1) {
            if let Some(identity) = self.identities.remove(loser) {
                for (id_type, value) in identity.identifiers {
                    if !survivor_identity.identifiers.contains_key(&id_type) {
                        survivor_identity.add_identifier(id_type, &value);
                    }
                    self.id_to_canonical
                        .insert((id_type, value), survivor.clone());
                }
            }
            self.fused_into.insert(loser.clone(), survivor.clone());
        }

        let losers: BTreeSet<&CanonicalId> = matched.iter().skip(1).collect();
        for target in self.id_to_canonical.values_mut() {
            if losers.contains(&*target) {
                *target = survivor.clone();
            }
        }
        for target in self.fused_into.values_mut() {
            if losers.contains(&*target) {
                *target = survivor.clone();
            }
        }

        for (id_type, value) in supplied {
            if !survivor_identity.identifiers.contains_key(id_type)
                && survivor_identity.add_identifier(*id_type, value)
            {
                self.id_to_canonical
                    .insert((*id_type, value.to_string()), survivor.clone());
            }
        }

        self.identities.insert(survivor.clone(), survivor_identity);
        survivor
    }
}

// =============================================================================
// TESTS
// =============================================================================
