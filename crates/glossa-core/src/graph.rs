//! # Graph Store
//!
//! The typed, indexed entity store behind every query and traversal.
//!
//! All data structures use `BTreeMap` for deterministic ordering.
//! Absence is a value here: `get` and the traversal helpers return
//! `Option` or empty collections and never fail.

use crate::query::Query;
use crate::types::{CanonicalId, Entity, EntityKind, GeographicRegion, Languoid, RelationType, Script};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// ENTITYCONTAINER TRAIT
// =============================================================================

/// Anything that stores entities by canonical id.
///
/// Implemented by the per-source `EntitySet` during import and by the final
/// `Store`, so helpers that only need lookup work in either phase.
pub trait EntityContainer {
    /// Get an entity by canonical id.
    fn get(&self, id: &CanonicalId) -> Option<&Entity>;

    /// Whether an entity with this id exists.
    fn contains(&self, id: &CanonicalId) -> bool {
        self.get(id).is_some()
    }
}

// =============================================================================
// STORE
// =============================================================================

/// The final merged graph.
///
/// Holds every entity exactly once, a kind index for `all_of_type`, and a
/// subdivision index keyed on `parent_country_code`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    /// Entity storage: CanonicalId -> Entity
    entities: BTreeMap<CanonicalId, Entity>,

    /// Kind index: EntityKind -> ids of that kind
    kind_index: BTreeMap<EntityKind, BTreeSet<CanonicalId>>,

    /// Subdivision index: country code -> regions whose `parent_country_code` is it
    subdivision_index: BTreeMap<String, BTreeSet<CanonicalId>>,
}

impl Store {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, replacing any entity with the same id.
    ///
    /// Returns the replaced entity, if any. Only the merge engine and the
    /// snapshot decoder fill a store; outside the crate it is read-only.
    ///
    /// ```compile_fail
    /// use glossa_core::{CanonicalId, Entity, Languoid, Store};
    ///
    /// let mut store = Store::new();
    /// store.add(Entity::Languoid(Languoid::new(CanonicalId::new("lang:000001"))));
    /// ```
    pub(crate) fn add(&mut self, entity: Entity) -> Option<Entity> {
        let id = entity.id().clone();
        self.kind_index
            .entry(entity.kind())
            .or_default()
            .insert(id.clone());
        self.index_subdivision(&entity);

        let replaced = self.entities.insert(id, entity);
        if replaced.is_some() {
            self.rebuild_indexes();
        }
        replaced
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities in canonical-id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All entities of one kind, in canonical-id order.
    #[must_use]
    pub fn all_of_type(&self, kind: EntityKind) -> Vec<&Entity> {
        self.kind_index
            .get(&kind)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entities.get(id))
            .collect()
    }

    /// Number of entities of one kind.
    #[must_use]
    pub fn count_of_type(&self, kind: EntityKind) -> usize {
        self.kind_index.get(&kind).map_or(0, BTreeSet::len)
    }

    #[must_use]
    pub fn all_languoids(&self) -> Vec<&Languoid> {
        self.all_of_type(EntityKind::Languoid)
            .into_iter()
            .filter_map(Entity::as_languoid)
            .collect()
    }

    #[must_use]
    pub fn all_scripts(&self) -> Vec<&Script> {
        self.all_of_type(EntityKind::Script)
            .into_iter()
            .filter_map(Entity::as_script)
            .collect()
    }

    #[must_use]
    pub fn all_regions(&self) -> Vec<&GeographicRegion> {
        self.all_of_type(EntityKind::Region)
            .into_iter()
            .filter_map(Entity::as_region)
            .collect()
    }

    #[must_use]
    pub fn get_languoid(&self, id: &CanonicalId) -> Option<&Languoid> {
        self.entities.get(id).and_then(Entity::as_languoid)
    }

    #[must_use]
    pub fn get_script(&self, id: &CanonicalId) -> Option<&Script> {
        self.entities.get(id).and_then(Entity::as_script)
    }

    #[must_use]
    pub fn get_region(&self, id: &CanonicalId) -> Option<&GeographicRegion> {
        self.entities.get(id).and_then(Entity::as_region)
    }

    /// Run a structured query. Results are in canonical-id order.
    #[must_use]
    pub fn query(&self, query: &Query) -> Vec<&Entity> {
        match query.kind {
            Some(kind) => self
                .all_of_type(kind)
                .into_iter()
                .filter(|e| query.accepts(e))
                .collect(),
            None => self.iter().filter(|e| query.accepts(e)).collect(),
        }
    }

    /// Total number of stored edges across all entities.
    #[must_use]
    pub fn relation_count(&self) -> usize {
        self.entities.values().map(|e| e.relations().len()).sum()
    }

    /// Entities that `relations` of one type point at, skipping missing targets.
    #[must_use]
    pub fn related(&self, entity: &Entity, relation_type: RelationType) -> Vec<&Entity> {
        entity
            .relations()
            .get(relation_type)
            .iter()
            .filter_map(|r| self.entities.get(&r.target_id))
            .collect()
    }

    /// Ids of regions whose `parent_country_code` equals `country_code`.
    pub(crate) fn subdivision_ids(&self, country_code: &str) -> impl Iterator<Item = &CanonicalId> {
        self.subdivision_index.get(country_code).into_iter().flatten()
    }

    // =========================================================================
    // INDEX MAINTENANCE
    // =========================================================================

    fn index_subdivision(&mut self, entity: &Entity) {
        let Entity::GeographicRegion(region) = entity else {
            return;
        };
        if let Some(parent) = &region.parent_country_code {
            self.subdivision_index
                .entry(parent.clone())
                .or_default()
                .insert(region.id.clone());
        }
    }

    fn rebuild_indexes(&mut self) {
        self.kind_index.clear();
        self.subdivision_index.clear();
        let entities = std::mem::take(&mut self.entities);
        for entity in entities.values() {
            self.kind_index
                .entry(entity.kind())
                .or_default()
                .insert(entity.id().clone());
            self.index_subdivision(entity);
        }
        self.entities = entities;
    }
}

impl EntityContainer for Store {
    fn get(&self, id: &CanonicalId) -> Option<&Entity> {
        self.entities.get(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Relation;

    fn region(code: &str) -> GeographicRegion {
        let mut r = GeographicRegion::new(CanonicalId::coded(EntityKind::Region, code));
        r.country_code = Some(code.to_uppercase());
        r
    }

    #[test]
    fn add_and_get() {
        let mut store = Store::new();
        let id = CanonicalId::new("lang:000001");
        assert!(store.add(Entity::Languoid(Languoid::new(id.clone()))).is_none());

        assert!(store.contains(&id));
        assert!(store.get_languoid(&id).is_some());
        assert!(store.get_script(&id).is_none());
        assert!(store.get(&CanonicalId::new("lang:999999")).is_none());
    }

    #[test]
    fn kind_index_is_maintained() {
        let mut store = Store::new();
        store.add(Entity::Languoid(Languoid::new(CanonicalId::new("lang:000002"))));
        store.add(Entity::Languoid(Languoid::new(CanonicalId::new("lang:000001"))));
        store.add(Entity::Script(Script::new(CanonicalId::new("script:latn"))));

        let langs: Vec<_> = store
            .all_of_type(EntityKind::Languoid)
            .into_iter()
            .map(|e| e.id().as_str())
            .collect();
        assert_eq!(langs, vec!["lang:000001", "lang:000002"]);
        assert_eq!(store.count_of_type(EntityKind::Script), 1);
        assert_eq!(store.count_of_type(EntityKind::Region), 0);
    }

    fn subdivision(code: &str, parent: &str) -> GeographicRegion {
        let mut r = GeographicRegion::new(CanonicalId::coded(EntityKind::Region, code));
        r.parent_country_code = Some(parent.to_string());
        r
    }

    #[test]
    fn subdivision_index_follows_parent_country_code() {
        let mut store = Store::new();
        let mut nh = subdivision("nl-nh", "NL");
        // Containment edges do not feed the index.
        nh.relations
            .add(Relation::new(RelationType::IsPartOf, CanonicalId::new("region:be")));
        let mut nl = region("nl");
        nl.relations
            .add(Relation::new(RelationType::HasChildRegion, CanonicalId::new("region:nl-fr")));

        store.add(Entity::GeographicRegion(nh));
        store.add(Entity::GeographicRegion(subdivision("nl-ut", "NL")));
        store.add(Entity::GeographicRegion(nl));

        let nl_subs: Vec<_> = store.subdivision_ids("NL").map(CanonicalId::as_str).collect();
        assert_eq!(nl_subs, vec!["region:nl-nh", "region:nl-ut"]);
        assert_eq!(store.subdivision_ids("BE").count(), 0);
    }

    #[test]
    fn replacing_an_entity_rebuilds_indexes() {
        let mut store = Store::new();
        store.add(Entity::GeographicRegion(subdivision("nl-nh", "NL")));

        let replaced = store.add(Entity::GeographicRegion(region("nl-nh")));
        assert!(replaced.is_some());
        assert_eq!(store.subdivision_ids("NL").count(), 0);
        assert_eq!(store.len(), 1);
    }
}
