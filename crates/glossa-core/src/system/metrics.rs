//! # Store Metrics
//!
//! Counts describing a loaded database, for `info` output and logs.
//! Everything is integer-only.

use crate::database::Database;
use crate::graph::Store;
use crate::resolver::EntityResolver;
use crate::types::EntityKind;
use serde::Serialize;

/// Counts over a store and its resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreMetrics {
    pub total_entities: usize,
    pub languoids: usize,
    pub scripts: usize,
    pub regions: usize,
    /// Stored edges, counting both directions of reciprocal pairs.
    pub relation_count: usize,
    /// Identifier index entries, aliases included.
    pub identifier_mappings: usize,
    pub deprecated_codes: usize,
    /// Canonical ids that were fused into another.
    pub fused_identities: usize,
}

impl StoreMetrics {
    /// All zeros.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_database(db: &Database) -> Self {
        Self::from_parts(db.store(), db.resolver())
    }

    #[must_use]
    pub fn from_parts(store: &Store, resolver: &EntityResolver) -> Self {
        Self {
            total_entities: store.len(),
            languoids: store.count_of_type(EntityKind::Languoid),
            scripts: store.count_of_type(EntityKind::Script),
            regions: store.count_of_type(EntityKind::Region),
            relation_count: store.relation_count(),
            identifier_mappings: resolver.stats().total_identifier_mappings,
            deprecated_codes: resolver.deprecated_codes().count(),
            fused_identities: resolver.fusions().count(),
        }
    }

    /// Edges per entity as parts per thousand (integer only).
    #[must_use]
    pub fn relations_per_thousand(&self) -> u64 {
        if self.total_entities == 0 {
            return 0;
        }
        (self.relation_count as u64).saturating_mul(1000) / (self.total_entities as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CanonicalId, Entity, IdType, Languoid, Relation, RelationType, Script};

    #[test]
    fn empty_metrics() {
        let metrics = StoreMetrics::from_parts(&Store::new(), &EntityResolver::new());
        assert_eq!(metrics, StoreMetrics::empty());
        assert_eq!(metrics.relations_per_thousand(), 0);
    }

    #[test]
    fn counts_entities_relations_and_identity() {
        let mut resolver = EntityResolver::new();
        let a = resolver.find_or_create_canonical_id(&[(IdType::Iso639_3, "aaa")]);
        resolver.find_or_create_canonical_id(&[(IdType::Glottocode, "bbbb1234")]);
        resolver.find_or_create_canonical_id(&[
            (IdType::Iso639_3, "aaa"),
            (IdType::Glottocode, "bbbb1234"),
        ]);
        resolver.register_deprecated(IdType::Iso639_3, "zzz", "N");

        let latn = CanonicalId::new("script:latn");
        let mut lang = Languoid::new(a.clone());
        lang.relations
            .add(Relation::new(RelationType::UsesScript, latn.clone()));
        let mut script = Script::new(latn);
        script
            .relations
            .add(Relation::new(RelationType::UsedByLanguoid, a));

        let mut store = Store::new();
        store.add(Entity::Languoid(lang));
        store.add(Entity::Script(script));

        let metrics = StoreMetrics::from_parts(&store, &resolver);
        assert_eq!(metrics.total_entities, 2);
        assert_eq!(metrics.languoids, 1);
        assert_eq!(metrics.scripts, 1);
        assert_eq!(metrics.regions, 0);
        assert_eq!(metrics.relation_count, 2);
        assert_eq!(metrics.identifier_mappings, 2);
        assert_eq!(metrics.deprecated_codes, 1);
        assert_eq!(metrics.fused_identities, 1);
        assert_eq!(metrics.relations_per_thousand(), 1000);

        let db = Database::new(store, resolver);
        assert_eq!(StoreMetrics::from_database(&db), metrics);
    }
}
