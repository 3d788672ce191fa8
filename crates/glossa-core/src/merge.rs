//! # Merge Engine
//!
//! Combines per-source entity sets into one `Store`.
//!
//! Pass 1 merges entity fields: for every canonical id seen in any source,
//! each declared field collects the non-empty values of every source that
//! has the entity. One value is adopted as-is; list fields are concatenated
//! and de-duplicated; scalar fields resolve by source priority and record a
//! `MergeConflict` when the values actually differ.
//!
//! Pass 2 applies relations: an edge is copied onto the merged entity only
//! if its target also exists in the merged graph. Dangling edges are counted
//! and dropped. Duplicate `(type, target)` edges collapse to the first one.
//!
//! The merge is a pure function of the sources, their order and the
//! resolver's fusion redirects.

use crate::entity_set::{DataSource, EntitySet};
use crate::graph::Store;
use crate::primitives::REGION_HISTORICAL_SOURCE;
use crate::resolver::EntityResolver;
use crate::types::{
    CanonicalId, DeprecatedCode, Entity, EntityKind, FieldSpec, FieldStrategy, FieldValue,
    GlossaError, Relation,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// How a scalar conflict was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// The value of the numerically lowest priority won.
    SourcePriority,
    /// A per-field override pinned the value of a named source.
    PreferredSource,
}

/// One source's value in a conflict record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictValue {
    pub value: FieldValue,
    pub source: String,
}

/// Audit record of a resolved disagreement between sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeConflict {
    pub entity_id: CanonicalId,
    pub field_name: String,
    /// Every contributed value, in priority order.
    pub values: Vec<ConflictValue>,
    pub resolved_to: FieldValue,
    pub strategy: MergeStrategy,
}

/// Result of a merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub store: Store,
    pub conflicts: Vec<MergeConflict>,
    pub relations_added: usize,
    pub relations_skipped: usize,
}

/// A field of one kind that always prefers a named source.
struct FieldOverride {
    kind: EntityKind,
    field: &'static str,
    source: &'static str,
}

const FIELD_OVERRIDES: &[FieldOverride] = &[FieldOverride {
    kind: EntityKind::Region,
    field: "is_historical",
    source: REGION_HISTORICAL_SOURCE,
}];

fn preferred_source(kind: EntityKind, field: &str) -> Option<&'static str> {
    FIELD_OVERRIDES
        .iter()
        .find(|o| o.kind == kind && o.field == field)
        .map(|o| o.source)
}

/// Merges entity sets against the resolver that built them.
pub struct MergeEngine<'r> {
    resolver: &'r EntityResolver,
}

impl<'r> MergeEngine<'r> {
    #[must_use]
    pub fn new(resolver: &'r EntityResolver) -> Self {
        Self { resolver }
    }

    /// Merge `sources`, given in import order. Priority comes from each `DataSource`.
    pub fn merge(&self, sources: &[(DataSource, EntitySet)]) -> MergeOutcome {
        // Per-source view keyed by surviving canonical id.
        let views: Vec<(&DataSource, BTreeMap<&CanonicalId, Vec<&Entity>>)> = sources
            .iter()
            .map(|(source, set)| {
                let mut view: BTreeMap<&CanonicalId, Vec<&Entity>> = BTreeMap::new();
                for entity in set.iter() {
                    view.entry(self.resolver.canonical(entity.id()))
                        .or_default()
                        .push(entity);
                }
                (source, view)
            })
            .collect();

        // The first source to produce an id fixes its kind.
        let mut kinds: BTreeMap<&CanonicalId, EntityKind> = BTreeMap::new();
        for (_, set) in sources {
            for entity in set.iter() {
                kinds
                    .entry(self.resolver.canonical(entity.id()))
                    .or_insert_with(|| entity.kind());
            }
        }

        // Pass 1: fields
        let mut merged: BTreeMap<CanonicalId, Entity> = BTreeMap::new();
        let mut conflicts = Vec::new();
        for (id, kind) in &kinds {
            let contributions: Vec<(&DataSource, &Entity)> = views
                .iter()
                .flat_map(|(source, view)| {
                    view.get(id)
                        .into_iter()
                        .flatten()
                        .filter(|e| e.kind() == *kind)
                        .map(move |e| (*source, *e))
                })
                .collect();

            let mut entity = Entity::empty(*kind, (*id).clone());
            for spec in kind.fields() {
                let (value, conflict) = merge_field(id, *kind, spec, &contributions);
                if let Some(value) = value {
                    entity.set_field(spec.name, value);
                }
                conflicts.extend(conflict);
            }
            merged.insert((*id).clone(), entity);
        }

        // Pass 2: relations
        let mut relations_added = 0usize;
        let mut relations_skipped = 0usize;
        for (_, set) in sources {
            for entity in set.iter() {
                let owner = self.resolver.canonical(entity.id());
                for rel in entity.relations().iter() {
                    let target = self.resolver.canonical(&rel.target_id);
                    if !merged.contains_key(target) {
                        relations_skipped += 1;
                        continue;
                    }
                    let Some(merged_owner) = merged.get_mut(owner) else {
                        continue;
                    };
                    let relations = merged_owner.relations_mut();
                    if let Some(existing) = relations.find(rel.relation_type, target) {
                        if existing.metadata != rel.metadata {
                            warn!(
                                entity_id = %owner,
                                relation = %rel.relation_type,
                                target = %target,
                                "Conflicting relation metadata, first occurrence kept"
                            );
                        }
                        continue;
                    }
                    relations.add(
                        Relation::new(rel.relation_type, target.clone())
                            .with_metadata(rel.metadata.clone()),
                    );
                    relations_added += 1;
                }
            }
        }

        info!(
            added = relations_added,
            skipped = relations_skipped,
            "Applied relations (skipped: target not in store)"
        );
        if conflicts.is_empty() {
            info!("No merge conflicts");
        } else {
            warn!(conflicts = conflicts.len(), "Merge conflicts resolved");
        }

        let mut store = Store::new();
        for entity in merged.into_values() {
            store.add(entity);
        }

        MergeOutcome {
            store,
            conflicts,
            relations_added,
            relations_skipped,
        }
    }
}

/// Merge `sources` against `resolver`. Shorthand for `MergeEngine::new(resolver).merge(sources)`.
pub fn merge(sources: &[(DataSource, EntitySet)], resolver: &EntityResolver) -> MergeOutcome {
    MergeEngine::new(resolver).merge(sources)
}

/// Write the conflict audit log as pretty JSON.
pub fn write_conflicts(conflicts: &[MergeConflict], path: &Path) -> Result<(), GlossaError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, conflicts)
        .map_err(|e| GlossaError::Serialization(e.to_string()))?;
    writer.flush()?;
    info!(path = %path.display(), conflicts = conflicts.len(), "Conflicts saved");
    Ok(())
}

// =============================================================================
// FIELD MERGE
// =============================================================================

fn merge_field(
    id: &CanonicalId,
    kind: EntityKind,
    spec: &FieldSpec,
    contributions: &[(&DataSource, &Entity)],
) -> (Option<FieldValue>, Option<MergeConflict>) {
    let mut values: Vec<(&DataSource, FieldValue)> = contributions
        .iter()
        .filter_map(|(source, entity)| entity.field(spec.name).map(|v| (*source, v)))
        .collect();

    if values.len() <= 1 {
        return (values.pop().map(|(_, v)| v), None);
    }

    if spec.strategy == FieldStrategy::List {
        if let Some(list) = merge_list_values(&values) {
            return (Some(list), None);
        }
    }

    // Stable: equal priorities keep import order.
    values.sort_by_key(|(source, _)| source.priority);
    let mut winner = values[0].1.clone();

    if spec.strategy == FieldStrategy::NoConflict {
        return (Some(winner), None);
    }

    let mut distinct: Vec<&FieldValue> = Vec::new();
    for (_, value) in &values {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    if distinct.len() == 1 {
        return (Some(winner), None);
    }

    let mut strategy = MergeStrategy::SourcePriority;
    if let Some(preferred) = preferred_source(kind, spec.name) {
        if let Some((_, value)) = values.iter().find(|(s, _)| s.name == preferred) {
            winner = value.clone();
            strategy = MergeStrategy::PreferredSource;
        }
    }

    let conflict = MergeConflict {
        entity_id: id.clone(),
        field_name: spec.name.to_string(),
        values: values
            .iter()
            .map(|(source, value)| ConflictValue {
                value: value.clone(),
                source: source.name.clone(),
            })
            .collect(),
        resolved_to: winner.clone(),
        strategy,
    };
    (Some(winner), Some(conflict))
}

/// Concatenate list values in source order, de-duplicated by equality.
fn merge_list_values(values: &[(&DataSource, FieldValue)]) -> Option<FieldValue> {
    let mut lists: Vec<Vec<DeprecatedCode>> = Vec::with_capacity(values.len());
    for (_, value) in values {
        match value {
            FieldValue::DeprecatedCodes(codes) => lists.push(codes.clone()),
            _ => return None,
        }
    }
    Some(FieldValue::DeprecatedCodes(concat_unique(lists)))
}

/// Order-preserving concatenation that keeps the first of equal elements.
///
/// Elements only need equality, not hashing.
fn concat_unique<T: PartialEq>(lists: impl IntoIterator<Item = Vec<T>>) -> Vec<T> {
    let mut merged: Vec<T> = Vec::new();
    for item in lists.into_iter().flatten() {
        if !merged.contains(&item) {
            merged.push(item);
        }
    }
    merged
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityContainer;
    use crate::types::{IdType, Metadata, RelationType};

    fn source(name: &str, priority: u32) -> DataSource {
        DataSource::new(name, priority)
    }

    fn named_languoid(
        resolver: &mut EntityResolver,
        code: &str,
        name: Option<&str>,
        endonym: Option<&str>,
    ) -> EntitySet {
        let mut set = EntitySet::new();
        let lang = set
            .languoid_mut(resolver, &[(IdType::Iso639_3, code)])
            .expect("languoid");
        lang.name = name.map(str::to_string);
        lang.endonym = endonym.map(str::to_string);
        set
    }

    #[test]
    fn scalar_conflict_resolves_by_priority() {
        let mut resolver = EntityResolver::new();
        let low = named_languoid(&mut resolver, "nld", None, Some("beta"));
        let high = named_languoid(&mut resolver, "nld", None, Some("alpha"));

        // Import order differs from priority order on purpose.
        let outcome = merge(&[(source("b", 20), low), (source("a", 10), high)], &resolver);

        let id = resolver.resolve(IdType::Iso639_3, "nld").expect("id");
        let lang = outcome.store.get_languoid(id).expect("merged");
        assert_eq!(lang.endonym.as_deref(), Some("alpha"));

        assert_eq!(outcome.conflicts.len(), 1);
        let conflict = &outcome.conflicts[0];
        assert_eq!(conflict.field_name, "endonym");
        assert_eq!(conflict.resolved_to, FieldValue::from("alpha"));
        assert_eq!(conflict.values.len(), 2);
        assert_eq!(conflict.values[0].source, "a");
        assert_eq!(conflict.strategy, MergeStrategy::SourcePriority);
    }

    #[test]
    fn single_value_and_agreement_are_not_conflicts() {
        let mut resolver = EntityResolver::new();
        let a = named_languoid(&mut resolver, "nld", None, Some("Nederlands"));
        let b = named_languoid(&mut resolver, "nld", None, Some("Nederlands"));
        let c = named_languoid(&mut resolver, "nld", None, None);

        let outcome = merge(
            &[(source("a", 10), a), (source("b", 20), b), (source("c", 30), c)],
            &resolver,
        );
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn name_disagreement_is_not_recorded() {
        let mut resolver = EntityResolver::new();
        let a = named_languoid(&mut resolver, "nld", Some("Dutch"), None);
        let b = named_languoid(&mut resolver, "nld", Some("Flemish"), None);

        let outcome = merge(&[(source("a", 10), a), (source("b", 20), b)], &resolver);
        let id = resolver.resolve(IdType::Iso639_3, "nld").expect("id");
        assert_eq!(
            outcome.store.get_languoid(id).and_then(|l| l.name.as_deref()),
            Some("Dutch")
        );
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn list_fields_concatenate_without_conflict() {
        let code = |c: &str| DeprecatedCode {
            code: c.to_string(),
            code_type: IdType::Iso639_3,
            reason: None,
            name: None,
            effective: None,
            remedy: None,
        };
        let mut resolver = EntityResolver::new();
        let mut a = EntitySet::new();
        a.languoid_mut(&mut resolver, &[(IdType::Iso639_3, "ron")])
            .expect("a")
            .deprecated_codes = Some(vec![code("a"), code("b")]);
        let mut b = EntitySet::new();
        b.languoid_mut(&mut resolver, &[(IdType::Iso639_3, "ron")])
            .expect("b")
            .deprecated_codes = Some(vec![code("b"), code("c")]);

        let outcome = merge(&[(source("a", 10), a), (source("b", 20), b)], &resolver);
        let id = resolver.resolve(IdType::Iso639_3, "ron").expect("id");
        let merged = outcome
            .store
            .get_languoid(id)
            .and_then(|l| l.deprecated_codes.clone())
            .expect("codes");
        let codes: Vec<_> = merged.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["a", "b", "c"]);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn region_historical_prefers_pycountry() {
        let resolver = EntityResolver::new();
        let mut meta = EntitySet::new();
        meta.region_mut("AN").expect("an").is_historical = Some(false);
        let mut pyc = EntitySet::new();
        pyc.region_mut("AN").expect("an").is_historical = Some(true);

        let outcome = merge(
            &[(source("linguameta", 20), meta), (source("pycountry", 50), pyc)],
            &resolver,
        );
        let region = outcome
            .store
            .get_region(&EntityResolver::region_id("AN"))
            .expect("region");
        assert_eq!(region.is_historical, Some(true));
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].strategy, MergeStrategy::PreferredSource);
    }

    #[test]
    fn dangling_relations_are_counted_and_dropped() {
        let mut resolver = EntityResolver::new();
        let mut set = EntitySet::new();
        let lang = set
            .languoid_mut(&mut resolver, &[(IdType::Iso639_3, "nld")])
            .expect("lang");
        lang.relations.add(Relation::new(
            RelationType::SpokenInRegion,
            CanonicalId::new("region:zz"),
        ));
        let id = lang.id.clone();

        let outcome = merge(&[(source("a", 10), set)], &resolver);
        assert_eq!(outcome.relations_skipped, 1);
        assert_eq!(outcome.relations_added, 0);
        assert!(outcome.store.get(&id).expect("lang").relations().is_empty());
    }

    #[test]
    fn duplicate_relations_keep_first_metadata() {
        let mut resolver = EntityResolver::new();
        let build = |resolver: &mut EntityResolver, canonical: bool| {
            let mut set = EntitySet::new();
            let lang = set
                .languoid_mut(resolver, &[(IdType::Iso639_3, "nld")])
                .expect("lang")
                .id
                .clone();
            let latn = set.script_mut("Latn").expect("latn").id.clone();
            let mut meta = Metadata::new();
            meta.insert("is_canonical".into(), canonical.into());
            set.add_bidirectional_relation(&lang, RelationType::UsesScript, &latn, meta)
                .expect("relation");
            set
        };
        let first = build(&mut resolver, true);
        let second = build(&mut resolver, false);

        let outcome = merge(&[(source("a", 10), first), (source("b", 20), second)], &resolver);
        assert_eq!(outcome.relations_added, 2);

        let id = resolver.resolve(IdType::Iso639_3, "nld").expect("id");
        let rels = outcome.store.get(id).expect("lang").relations();
        assert_eq!(rels.get(RelationType::UsesScript).len(), 1);
        assert!(rels.get(RelationType::UsesScript)[0].flag("is_canonical"));
    }

    #[test]
    fn entity_sets_built_before_fusion_land_on_survivor() {
        let mut resolver = EntityResolver::new();
        let a = named_languoid(&mut resolver, "nld", Some("Dutch"), None);
        let mut b = EntitySet::new();
        b.languoid_mut(&mut resolver, &[(IdType::Glottocode, "dutc1256")])
            .expect("b")
            .endonym = Some("Nederlands".into());
        // A third source links both identifiers.
        let mut c = EntitySet::new();
        c.languoid_mut(
            &mut resolver,
            &[(IdType::Iso639_3, "nld"), (IdType::Glottocode, "dutc1256")],
        )
        .expect("c");

        let outcome = merge(
            &[(source("a", 10), a), (source("b", 20), b), (source("c", 30), c)],
            &resolver,
        );
        assert_eq!(outcome.store.len(), 1);
        let lang = outcome.store.all_languoids()[0];
        assert_eq!(lang.name.as_deref(), Some("Dutch"));
        assert_eq!(lang.endonym.as_deref(), Some("Nederlands"));
    }

    #[test]
    fn merge_is_deterministic() {
        let build = || {
            let mut resolver = EntityResolver::new();
            let a = named_languoid(&mut resolver, "nld", Some("Dutch"), Some("x"));
            let b = named_languoid(&mut resolver, "nld", Some("Dutch"), Some("y"));
            let outcome = merge(&[(source("a", 10), a), (source("b", 20), b)], &resolver);
            (outcome.store, outcome.conflicts)
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn concat_unique_uses_equality() {
        let merged = concat_unique(vec![vec![1.5f64, 2.5], vec![2.5, 3.5]]);
        assert_eq!(merged, vec![1.5, 2.5, 3.5]);
    }
}
