//! # Validation
//!
//! Data-quality checks over a merged store. Findings are reported and
//! logged, never enforced: a build with findings still produces a snapshot.
//!
//! Ratios are per-mille integers so no float arithmetic is needed.

use crate::graph::{EntityContainer, Store};
use crate::resolver::EntityResolver;
use crate::types::{CanonicalId, IdType, Languoid, RelationType};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Languoids missing identifiers or names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingCriticalIds {
    /// Neither ISO 639-3 nor Glottocode.
    pub no_iso_or_glotto: Vec<CanonicalId>,
    pub no_name: Vec<CanonicalId>,
}

/// One identifier value held by more than one languoid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateIdentifier {
    pub value: String,
    pub entities: Vec<CanonicalId>,
}

/// A relation whose target is not in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenRelation {
    pub source_id: CanonicalId,
    pub relation_type: RelationType,
    pub target_id: CanonicalId,
    pub error: String,
}

/// A region whose `parent_country_code` disagrees with its IS_PART_OF relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionParentDrift {
    pub region_id: CanonicalId,
    pub parent_country_code: Option<String>,
    pub related_parent: Option<CanonicalId>,
}

/// Share of languoids carrying each kind of data, in per-mille.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Completeness {
    pub languoids: usize,
    pub has_name: u32,
    pub has_iso_639_3: u32,
    pub has_glottocode: u32,
    pub has_bcp_47: u32,
    pub has_speaker_count: u32,
    pub has_scripts: u32,
    pub has_regions: u32,
    pub has_parent: u32,
}

/// Everything `validate_all` found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub total_entities: usize,
    pub orphaned_entities: Vec<CanonicalId>,
    pub missing_critical_ids: MissingCriticalIds,
    pub duplicate_identifiers: BTreeMap<IdType, Vec<DuplicateIdentifier>>,
    pub broken_relations: Vec<BrokenRelation>,
    pub multiple_parents: Vec<CanonicalId>,
    pub region_parent_drift: Vec<RegionParentDrift>,
    pub completeness: Completeness,
}

impl ValidationReport {
    /// Whether any structural problem was found.
    ///
    /// Missing names and identifiers are expected in real data and do not count.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.duplicate_identifiers.is_empty()
            || !self.broken_relations.is_empty()
            || !self.multiple_parents.is_empty()
    }
}

/// Runs the data-quality checks.
pub struct DataValidator<'a> {
    store: &'a Store,
    resolver: &'a EntityResolver,
}

impl<'a> DataValidator<'a> {
    #[must_use]
    pub fn new(store: &'a Store, resolver: &'a EntityResolver) -> Self {
        Self { store, resolver }
    }

    /// Run every check and log a summary.
    #[must_use]
    pub fn validate_all(&self) -> ValidationReport {
        info!(entities = self.store.len(), "Running data validation");
        let report = ValidationReport {
            total_entities: self.store.len(),
            orphaned_entities: self.orphaned_entities(),
            missing_critical_ids: self.missing_critical_ids(),
            duplicate_identifiers: self.duplicate_identifiers(),
            broken_relations: self.broken_relations(),
            multiple_parents: self.multiple_parents(),
            region_parent_drift: self.region_parent_drift(),
            completeness: self.completeness(),
        };
        log_report(&report);
        report
    }

    /// Languoids with no identifiers in the resolver.
    #[must_use]
    pub fn orphaned_entities(&self) -> Vec<CanonicalId> {
        self.store
            .all_languoids()
            .into_iter()
            .filter(|l| {
                self.resolver
                    .identifiers(&l.id)
                    .is_none_or(BTreeMap::is_empty)
            })
            .map(|l| l.id.clone())
            .collect()
    }

    #[must_use]
    pub fn missing_critical_ids(&self) -> MissingCriticalIds {
        let mut missing = MissingCriticalIds::default();
        for languoid in self.store.all_languoids() {
            if !self.has_identifier(languoid, IdType::Iso639_3)
                && !self.has_identifier(languoid, IdType::Glottocode)
            {
                missing.no_iso_or_glotto.push(languoid.id.clone());
            }
            if languoid.name.as_deref().is_none_or(str::is_empty) {
                missing.no_name.push(languoid.id.clone());
            }
        }
        missing
    }

    /// Identifier values held by more than one languoid identity.
    #[must_use]
    pub fn duplicate_identifiers(&self) -> BTreeMap<IdType, Vec<DuplicateIdentifier>> {
        let mut holders: BTreeMap<(IdType, &str), Vec<CanonicalId>> = BTreeMap::new();
        for languoid in self.store.all_languoids() {
            let Some(identifiers) = self.resolver.identifiers(&languoid.id) else {
                continue;
            };
            for (id_type, value) in identifiers {
                holders
                    .entry((*id_type, value.as_str()))
                    .or_default()
                    .push(languoid.id.clone());
            }
        }

        let mut duplicates: BTreeMap<IdType, Vec<DuplicateIdentifier>> = BTreeMap::new();
        for ((id_type, value), entities) in holders {
            if entities.len() > 1 {
                duplicates
                    .entry(id_type)
                    .or_default()
                    .push(DuplicateIdentifier {
                        value: value.to_string(),
                        entities,
                    });
            }
        }
        duplicates
    }

    #[must_use]
    pub fn broken_relations(&self) -> Vec<BrokenRelation> {
        let mut broken = Vec::new();
        for entity in self.store.iter() {
            for rel in entity.relations().iter() {
                if !self.store.contains(&rel.target_id) {
                    broken.push(BrokenRelation {
                        source_id: entity.id().clone(),
                        relation_type: rel.relation_type,
                        target_id: rel.target_id.clone(),
                        error: "Target entity not found".to_string(),
                    });
                }
            }
        }
        broken
    }

    /// Languoids with more than one parent (tree violation).
    #[must_use]
    pub fn multiple_parents(&self) -> Vec<CanonicalId> {
        self.store
            .all_languoids()
            .into_iter()
            .filter(|l| l.relations.get(RelationType::ParentLanguoid).len() > 1)
            .map(|l| l.id.clone())
            .collect()
    }

    /// Regions whose scalar parent code and containment relation disagree.
    #[must_use]
    pub fn region_parent_drift(&self) -> Vec<RegionParentDrift> {
        self.store
            .all_regions()
            .into_iter()
            .filter_map(|region| {
                let declared = region
                    .parent_country_code
                    .as_deref()
                    .map(EntityResolver::region_id);
                let related = self.store.parent_region(region).map(|p| p.id.clone());
                (declared != related).then(|| RegionParentDrift {
                    region_id: region.id.clone(),
                    parent_country_code: region.parent_country_code.clone(),
                    related_parent: related,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn completeness(&self) -> Completeness {
        let languoids = self.store.all_languoids();
        let total = languoids.len();
        if total == 0 {
            return Completeness::default();
        }
        let share = |pred: &dyn Fn(&Languoid) -> bool| -> u32 {
            let count = languoids.iter().filter(|l| pred(l)).count();
            per_mille(count, total)
        };
        Completeness {
            languoids: total,
            has_name: share(&|l| l.name.is_some()),
            has_iso_639_3: share(&|l| self.has_identifier(l, IdType::Iso639_3)),
            has_glottocode: share(&|l| self.has_identifier(l, IdType::Glottocode)),
            has_bcp_47: share(&|l| self.has_identifier(l, IdType::Bcp47)),
            has_speaker_count: share(&|l| l.speaker_count.is_some()),
            has_scripts: share(&|l| !l.relations.get(RelationType::UsesScript).is_empty()),
            has_regions: share(&|l| !l.relations.get(RelationType::SpokenInRegion).is_empty()),
            has_parent: share(&|l| self.store.parent(l).is_some()),
        }
    }

    fn has_identifier(&self, languoid: &Languoid, id_type: IdType) -> bool {
        self.resolver
            .identity(&languoid.id)
            .and_then(|i| i.identifier(id_type))
            .is_some()
    }
}

fn per_mille(count: usize, total: usize) -> u32 {
    let ratio = (count as u64).saturating_mul(1000) / (total.max(1) as u64);
    u32::try_from(ratio).unwrap_or(1000)
}

fn log_report(report: &ValidationReport) {
    info!(total_entities = report.total_entities, "Validation results");

    if !report.orphaned_entities.is_empty() {
        warn!(count = report.orphaned_entities.len(), "Orphaned languoids without identifiers");
    }
    let missing = &report.missing_critical_ids;
    if !missing.no_iso_or_glotto.is_empty() {
        warn!(count = missing.no_iso_or_glotto.len(), "Languoids without ISO 639-3 or Glottocode");
    }
    if !missing.no_name.is_empty() {
        warn!(count = missing.no_name.len(), "Languoids without names");
    }
    for (id_type, dups) in &report.duplicate_identifiers {
        warn!(id_type = %id_type, count = dups.len(), "Duplicate identifiers");
    }
    if !report.broken_relations.is_empty() {
        warn!(count = report.broken_relations.len(), "Broken relations");
    }
    if !report.multiple_parents.is_empty() {
        warn!(count = report.multiple_parents.len(), "Languoids with more than one parent");
    }
    if !report.region_parent_drift.is_empty() {
        warn!(
            count = report.region_parent_drift.len(),
            "Region parent codes disagree with containment relations"
        );
    }

    let c = &report.completeness;
    info!(
        languoids = c.languoids,
        has_name = c.has_name,
        has_iso_639_3 = c.has_iso_639_3,
        has_glottocode = c.has_glottocode,
        has_bcp_47 = c.has_bcp_47,
        has_speaker_count = c.has_speaker_count,
        has_scripts = c.has_scripts,
        has_regions = c.has_regions,
        has_parent = c.has_parent,
        "Data completeness (per mille)"
    );
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entity, GeographicRegion, Relation};

    fn languoid(id: &str, name: Option<&str>) -> Languoid {
        let mut l = Languoid::new(CanonicalId::new(id));
        l.name = name.map(str::to_string);
        l
    }

    #[test]
    fn empty_store_is_clean() {
        let store = Store::new();
        let resolver = EntityResolver::new();
        let report = DataValidator::new(&store, &resolver).validate_all();
        assert_eq!(report, ValidationReport::default());
        assert!(!report.has_errors());
    }

    #[test]
    fn orphans_and_missing_ids() {
        let mut resolver = EntityResolver::new();
        let nld = resolver.find_or_create_canonical_id(&[(IdType::Iso639_3, "nld")]);
        let bcp_only = resolver.find_or_create_canonical_id(&[(IdType::Bcp47, "xx")]);

        let mut store = Store::new();
        store.add(Entity::Languoid(languoid(nld.as_str(), Some("Dutch"))));
        store.add(Entity::Languoid(languoid(bcp_only.as_str(), None)));
        store.add(Entity::Languoid(languoid("lang:000099", Some("Ghost"))));

        let validator = DataValidator::new(&store, &resolver);
        assert_eq!(validator.orphaned_entities(), vec![CanonicalId::new("lang:000099")]);

        let missing = validator.missing_critical_ids();
        assert_eq!(
            missing.no_iso_or_glotto,
            vec![bcp_only.clone(), CanonicalId::new("lang:000099")]
        );
        assert_eq!(missing.no_name, vec![bcp_only]);
    }

    #[test]
    fn broken_relations_and_multiple_parents() {
        let mut child = languoid("lang:000001", Some("Child"));
        child
            .relations
            .add(Relation::new(RelationType::ParentLanguoid, CanonicalId::new("lang:000002")));
        child
            .relations
            .add(Relation::new(RelationType::ParentLanguoid, CanonicalId::new("lang:000003")));

        let mut store = Store::new();
        store.add(Entity::Languoid(child));
        store.add(Entity::Languoid(languoid("lang:000002", Some("Parent"))));

        let resolver = EntityResolver::new();
        let report = DataValidator::new(&store, &resolver).validate_all();
        assert_eq!(report.broken_relations.len(), 1);
        assert_eq!(report.broken_relations[0].target_id.as_str(), "lang:000003");
        assert_eq!(report.multiple_parents, vec![CanonicalId::new("lang:000001")]);
        assert!(report.has_errors());
    }

    #[test]
    fn region_parent_drift_is_reported() {
        let nl = GeographicRegion::new(EntityResolver::region_id("NL"));
        let mut nh = GeographicRegion::new(EntityResolver::region_id("NL-NH"));
        nh.parent_country_code = Some("NL".into());
        nh.relations
            .add(Relation::new(RelationType::IsPartOf, nl.id.clone()));
        let mut ut = GeographicRegion::new(EntityResolver::region_id("NL-UT"));
        ut.parent_country_code = Some("NL".into());

        let mut store = Store::new();
        store.add(Entity::GeographicRegion(nl));
        store.add(Entity::GeographicRegion(nh));
        store.add(Entity::GeographicRegion(ut));

        let resolver = EntityResolver::new();
        let drift = DataValidator::new(&store, &resolver).region_parent_drift();
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].region_id.as_str(), "region:nl-ut");
        assert!(drift[0].related_parent.is_none());
    }

    #[test]
    fn completeness_is_per_mille() {
        let mut resolver = EntityResolver::new();
        let a = resolver.find_or_create_canonical_id(&[(IdType::Iso639_3, "aaa")]);
        let b = resolver.find_or_create_canonical_id(&[(IdType::Glottocode, "bbbb1234")]);
        let c = resolver.find_or_create_canonical_id(&[(IdType::Iso639_3, "ccc")]);

        let mut store = Store::new();
        store.add(Entity::Languoid(languoid(a.as_str(), Some("A"))));
        store.add(Entity::Languoid(languoid(b.as_str(), None)));
        store.add(Entity::Languoid(languoid(c.as_str(), None)));

        let completeness = DataValidator::new(&store, &resolver).completeness();
        assert_eq!(completeness.languoids, 3);
        assert_eq!(completeness.has_name, 333);
        assert_eq!(completeness.has_iso_639_3, 666);
        assert_eq!(completeness.has_glottocode, 333);
        assert_eq!(completeness.has_bcp_47, 0);
    }
}
