//! # Entity Set
//!
//! Source-local container of partially populated entities.
//!
//! One `EntitySet` is produced per importer. It references the shared
//! resolver only for identity, never for storage; the merge engine later
//! combines all sets into the final `Store`.

use crate::graph::EntityContainer;
use crate::resolver::EntityResolver;
use crate::types::{
    CanonicalId, Entity, EntityKind, GeographicRegion, GlossaError, IdType, Languoid, Metadata,
    Relation, RelationType, Script,
};
use std::collections::BTreeMap;
use tracing::info;

/// A data source and its merge priority (numerically lower wins).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataSource {
    pub name: String,
    pub priority: u32,
}

impl DataSource {
    #[must_use]
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }
}

/// Counters kept while an importer fills its set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub entities_created: usize,
    pub entities_updated: usize,
    pub relations_added: usize,
}

/// Entities produced by one importer, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    entities: BTreeMap<CanonicalId, Entity>,
    order: Vec<CanonicalId>,
    stats: ImportStats,
}

impl EntitySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, replacing one with the same id in place.
    pub fn add(&mut self, entity: Entity) {
        let id = entity.id().clone();
        if self.entities.insert(id.clone(), entity).is_none() {
            self.order.push(id);
        }
    }

    pub fn get_mut(&mut self, id: &CanonicalId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn entities_of_type(&self, kind: EntityKind) -> Vec<&Entity> {
        self.iter().filter(|e| e.kind() == kind).collect()
    }

    #[must_use]
    pub fn stats(&self) -> ImportStats {
        self.stats
    }

    // =========================================================================
    // IMPORTER HELPERS
    // =========================================================================

    /// Get or create the languoid known by `identifiers`.
    ///
    /// Identity goes through `find_or_create_canonical_id`; every identifier
    /// the resolver knows for the entity is copied onto empty identifier fields.
    pub fn languoid_mut(
        &mut self,
        resolver: &mut EntityResolver,
        identifiers: &[(IdType, &str)],
    ) -> Result<&mut Languoid, GlossaError> {
        let id = resolver.find_or_create_canonical_id(identifiers);
        self.sync_languoid(resolver, id)
    }

    /// Stub for enrichment sources: resolve an identifier created by another
    /// importer and return a local languoid for it.
    ///
    /// Returns `None` when the identifier is unknown.
    pub fn resolve_languoid(
        &mut self,
        resolver: &EntityResolver,
        id_type: IdType,
        value: &str,
    ) -> Option<&mut Languoid> {
        let id = resolver.resolve(id_type, value)?.clone();
        self.sync_languoid(resolver, id).ok()
    }

    /// Get or create the script with this ISO 15924 code.
    pub fn script_mut(&mut self, code: &str) -> Result<&mut Script, GlossaError> {
        let id = EntityResolver::script_id(code);
        self.ensure(EntityKind::Script, &id);
        self.entities
            .get_mut(&id)
            .and_then(Entity::as_script_mut)
            .ok_or_else(|| wrong_kind(&id, EntityKind::Script))
    }

    /// Get or create the region with this ISO 3166 code.
    pub fn region_mut(&mut self, code: &str) -> Result<&mut GeographicRegion, GlossaError> {
        let id = EntityResolver::region_id(code);
        self.ensure(EntityKind::Region, &id);
        self.entities
            .get_mut(&id)
            .and_then(Entity::as_region_mut)
            .ok_or_else(|| wrong_kind(&id, EntityKind::Region))
    }

    /// Add `from -[forward]-> to` and `to -[forward.reverse()]-> from`,
    /// both carrying the same metadata.
    pub fn add_bidirectional_relation(
        &mut self,
        from: &CanonicalId,
        forward: RelationType,
        to: &CanonicalId,
        metadata: Metadata,
    ) -> Result<(), GlossaError> {
        if !self.entities.contains_key(to) {
            return Err(GlossaError::UnknownEntity(to.clone()));
        }
        let source = self
            .entities
            .get_mut(from)
            .ok_or_else(|| GlossaError::UnknownEntity(from.clone()))?;
        source
            .relations_mut()
            .add(Relation::new(forward, to.clone()).with_metadata(metadata.clone()));

        if let Some(target) = self.entities.get_mut(to) {
            target
                .relations_mut()
                .add(Relation::new(forward.reverse(), from.clone()).with_metadata(metadata));
        }
        self.stats.relations_added += 2;
        Ok(())
    }

    /// Log the import counters for a source.
    pub fn log_stats(&self, source: &DataSource) {
        info!(
            source = %source.name,
            created = self.stats.entities_created,
            updated = self.stats.entities_updated,
            relations = self.stats.relations_added,
            "Import finished"
        );
    }

    fn ensure(&mut self, kind: EntityKind, id: &CanonicalId) {
        if self.entities.contains_key(id) {
            self.stats.entities_updated += 1;
        } else {
            self.stats.entities_created += 1;
            self.add(Entity::empty(kind, id.clone()));
        }
    }

    fn sync_languoid(
        &mut self,
        resolver: &EntityResolver,
        id: CanonicalId,
    ) -> Result<&mut Languoid, GlossaError> {
        self.ensure(EntityKind::Languoid, &id);
        let languoid = self
            .entities
            .get_mut(&id)
            .and_then(Entity::as_languoid_mut)
            .ok_or_else(|| wrong_kind(&id, EntityKind::Languoid))?;
        if let Some(identifiers) = resolver.identifiers(&id) {
            for (id_type, value) in identifiers {
                languoid.fill_identifier(*id_type, value);
            }
        }
        Ok(languoid)
    }
}

fn wrong_kind(id: &CanonicalId, expected: EntityKind) -> GlossaError {
    GlossaError::InvalidRecord(format!("{} is not a {}", id, expected))
}

impl EntityContainer for EntitySet {
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

    #[test]
    fn languoid_mut_syncs_identifiers() {
        let mut resolver = EntityResolver::new();
        let mut set = EntitySet::new();

        let id = {
            let lang = set
                .languoid_mut(&mut resolver, &[(IdType::Iso639_3, "nld")])
                .expect("languoid");
            lang.name = Some("Dutch".into());
            lang.id.clone()
        };
        let lang = set
            .languoid_mut(
                &mut resolver,
                &[(IdType::Iso639_3, "nld"), (IdType::Bcp47, "nl")],
            )
            .expect("languoid");

        assert_eq!(lang.id, id);
        assert_eq!(lang.bcp_47.as_deref(), Some("nl"));
        assert_eq!(lang.name.as_deref(), Some("Dutch"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.stats().entities_created, 1);
        assert_eq!(set.stats().entities_updated, 1);
    }

    #[test]
    fn resolve_languoid_only_finds_known_codes() {
        let mut resolver = EntityResolver::new();
        resolver.find_or_create_canonical_id(&[(IdType::Iso639_3, "nld"), (IdType::Bcp47, "nl")]);

        let mut set = EntitySet::new();
        assert!(set.resolve_languoid(&resolver, IdType::Bcp47, "xx").is_none());
        let lang = set
            .resolve_languoid(&resolver, IdType::Bcp47, "nl")
            .expect("stub");
        assert_eq!(lang.iso_639_3.as_deref(), Some("nld"));
    }

    #[test]
    fn bidirectional_relation_writes_both_ends() {
        let mut resolver = EntityResolver::new();
        let mut set = EntitySet::new();
        let lang = set
            .languoid_mut(&mut resolver, &[(IdType::Bcp47, "nl")])
            .expect("languoid")
            .id
            .clone();
        let script = set.script_mut("Latn").expect("script").id.clone();

        let mut meta = Metadata::new();
        meta.insert("is_canonical".into(), true.into());
        set.add_bidirectional_relation(&lang, RelationType::UsesScript, &script, meta)
            .expect("relation");

        let from = set.get(&lang).expect("lang");
        assert!(from.relations().get(RelationType::UsesScript)[0].flag("is_canonical"));
        let to = set.get(&script).expect("script");
        assert_eq!(to.relations().get(RelationType::UsedByLanguoid)[0].target_id, lang);
    }

    #[test]
    fn relation_to_missing_entity_is_rejected() {
        let mut set = EntitySet::new();
        let nl = set.region_mut("NL").expect("region").id.clone();
        let missing = CanonicalId::new("region:zz");
        assert!(
            set.add_bidirectional_relation(&nl, RelationType::HasChildRegion, &missing, Metadata::new())
                .is_err()
        );
        assert!(set.get(&nl).expect("nl").relations().is_empty());
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let mut set = EntitySet::new();
        set.script_mut("Latn").expect("latn");
        set.region_mut("NL").expect("nl");
        set.script_mut("Arab").expect("arab");
        let ids: Vec<_> = set.iter().map(|e| e.id().as_str()).collect();
        assert_eq!(ids, vec!["script:latn", "region:nl", "script:arab"]);
    }
}
