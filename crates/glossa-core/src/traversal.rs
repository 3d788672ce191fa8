//! # Traversal
//!
//! Graph walks over relations of the merged store.
//!
//! Every walk is a pure function of the store. Missing targets are skipped,
//! and walks that can loop carry a visited set and stop after
//! `MAX_TRAVERSAL_DEPTH` hops, so malformed data yields a shorter result
//! instead of an endless one.

use crate::graph::{EntityContainer, Store};
use crate::primitives::MAX_TRAVERSAL_DEPTH;
use crate::types::{CanonicalId, Entity, GeographicRegion, Languoid, RelationType, Script};
use std::collections::{BTreeMap, BTreeSet};

impl Store {
    fn related_languoids(&self, entity: &Entity, relation_type: RelationType) -> Vec<&Languoid> {
        self.related(entity, relation_type)
            .into_iter()
            .filter_map(Entity::as_languoid)
            .collect()
    }

    fn related_scripts(&self, entity: &Entity, relation_type: RelationType) -> Vec<&Script> {
        self.related(entity, relation_type)
            .into_iter()
            .filter_map(Entity::as_script)
            .collect()
    }

    fn related_regions(&self, entity: &Entity, relation_type: RelationType) -> Vec<&GeographicRegion> {
        self.related(entity, relation_type)
            .into_iter()
            .filter_map(Entity::as_region)
            .collect()
    }

    /// Look up the stored entity behind a borrowed languoid.
    fn languoid_entity(&self, languoid: &Languoid) -> Option<&Entity> {
        self.get(&languoid.id)
    }

    fn script_entity(&self, script: &Script) -> Option<&Entity> {
        self.get(&script.id)
    }

    fn region_entity(&self, region: &GeographicRegion) -> Option<&Entity> {
        self.get(&region.id)
    }

    // =========================================================================
    // LANGUOID: FAMILY TREE
    // =========================================================================

    /// First PARENT_LANGUOID target that is a languoid.
    #[must_use]
    pub fn parent(&self, languoid: &Languoid) -> Option<&Languoid> {
        let entity = self.languoid_entity(languoid)?;
        self.related_languoids(entity, RelationType::ParentLanguoid)
            .into_iter()
            .next()
    }

    #[must_use]
    pub fn children(&self, languoid: &Languoid) -> Vec<&Languoid> {
        self.languoid_entity(languoid)
            .map(|e| self.related_languoids(e, RelationType::ChildLanguoid))
            .unwrap_or_default()
    }

    /// Other children of the same parent.
    #[must_use]
    pub fn siblings(&self, languoid: &Languoid) -> Vec<&Languoid> {
        let Some(parent) = self.parent(languoid) else {
            return Vec::new();
        };
        self.children(parent)
            .into_iter()
            .filter(|c| c.id != languoid.id)
            .collect()
    }

    /// Ancestors from the parent up to the root.
    #[must_use]
    pub fn family_tree(&self, languoid: &Languoid) -> Vec<&Languoid> {
        let mut ancestors = Vec::new();
        let mut visited: BTreeSet<&CanonicalId> = BTreeSet::new();
        visited.insert(&languoid.id);

        let mut current = self.parent(languoid);
        while let Some(node) = current {
            if !visited.insert(&node.id) || ancestors.len() >= MAX_TRAVERSAL_DEPTH {
                break;
            }
            ancestors.push(node);
            current = self.parent(node);
        }
        ancestors
    }

    /// Last element of the family tree.
    #[must_use]
    pub fn root_family(&self, languoid: &Languoid) -> Option<&Languoid> {
        self.family_tree(languoid).pop()
    }

    /// All descendants in depth-first pre-order.
    ///
    /// `max_depth` of `None` or `Some(0)` means unlimited; each node is
    /// visited at most once.
    #[must_use]
    pub fn descendants(&self, languoid: &Languoid, max_depth: Option<usize>) -> Vec<&Languoid> {
        let limit = match max_depth {
            Some(0) | None => MAX_TRAVERSAL_DEPTH,
            Some(depth) => depth.min(MAX_TRAVERSAL_DEPTH),
        };
        let mut result = Vec::new();
        let mut visited: BTreeSet<&CanonicalId> = BTreeSet::new();
        visited.insert(&languoid.id);

        // (node, depth of its children)
        let mut stack: Vec<(&Languoid, usize)> = Vec::new();
        for child in self.children(languoid).into_iter().rev() {
            stack.push((child, 1));
        }
        while let Some((node, depth)) = stack.pop() {
            if !visited.insert(&node.id) {
                continue;
            }
            result.push(node);
            if depth >= limit {
                continue;
            }
            for child in self.children(node).into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        result
    }

    // =========================================================================
    // LANGUOID: MACROLANGUAGES
    // =========================================================================

    #[must_use]
    pub fn macrolanguage(&self, languoid: &Languoid) -> Option<&Languoid> {
        let entity = self.languoid_entity(languoid)?;
        self.related_languoids(entity, RelationType::IndividualLanguageOf)
            .into_iter()
            .next()
    }

    #[must_use]
    pub fn individual_languages(&self, languoid: &Languoid) -> Vec<&Languoid> {
        self.languoid_entity(languoid)
            .map(|e| self.related_languoids(e, RelationType::MacrolanguageOf))
            .unwrap_or_default()
    }

    // =========================================================================
    // LANGUOID: SCRIPTS AND REGIONS
    // =========================================================================

    #[must_use]
    pub fn scripts(&self, languoid: &Languoid) -> Vec<&Script> {
        self.languoid_entity(languoid)
            .map(|e| self.related_scripts(e, RelationType::UsesScript))
            .unwrap_or_default()
    }

    /// ISO 15924 codes of the languoid's scripts, de-duplicated in order.
    #[must_use]
    pub fn script_codes(&self, languoid: &Languoid) -> Vec<&str> {
        let mut codes: Vec<&str> = Vec::new();
        for code in self
            .scripts(languoid)
            .into_iter()
            .filter_map(|s| s.iso_15924.as_deref())
        {
            if !codes.contains(&code) {
                codes.push(code);
            }
        }
        codes
    }

    /// Scripts flagged `is_canonical`; all scripts when none are flagged.
    #[must_use]
    pub fn canonical_scripts(&self, languoid: &Languoid) -> Vec<&Script> {
        let canonical: Vec<&Script> = languoid
            .relations
            .get(RelationType::UsesScript)
            .iter()
            .filter(|r| r.flag("is_canonical"))
            .filter_map(|r| self.get_script(&r.target_id))
            .collect();
        if canonical.is_empty() {
            self.scripts(languoid)
        } else {
            canonical
        }
    }

    #[must_use]
    pub fn regions(&self, languoid: &Languoid) -> Vec<&GeographicRegion> {
        self.languoid_entity(languoid)
            .map(|e| self.related_regions(e, RelationType::SpokenInRegion))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn country_codes(&self, languoid: &Languoid) -> Vec<&str> {
        self.regions(languoid)
            .into_iter()
            .filter_map(|r| r.country_code.as_deref())
            .collect()
    }

    /// Country codes of regions whose SPOKEN_IN_REGION edge is flagged `is_official`.
    #[must_use]
    pub fn official_in_countries(&self, languoid: &Languoid) -> Vec<&str> {
        languoid
            .relations
            .get(RelationType::SpokenInRegion)
            .iter()
            .filter(|r| r.flag("is_official"))
            .filter_map(|r| self.get_region(&r.target_id))
            .filter_map(|r| r.country_code.as_deref())
            .collect()
    }

    /// NLLB-style `lang_Script` codes, e.g. `nld_Latn`.
    #[must_use]
    pub fn nllb_codes(&self, languoid: &Languoid, use_bcp_47: bool) -> Vec<String> {
        let base = if use_bcp_47 {
            languoid.bcp_47.as_deref()
        } else {
            languoid.iso_639_3.as_deref().or(languoid.bcp_47.as_deref())
        };
        let Some(base) = base else {
            return Vec::new();
        };
        self.scripts(languoid)
            .into_iter()
            .filter_map(|s| s.iso_15924.as_deref())
            .map(|code| format!("{base}_{code}"))
            .collect()
    }

    /// Scripts of the languoid and all of its descendants, in id order.
    #[must_use]
    pub fn descendant_scripts(&self, languoid: &Languoid) -> Vec<&Script> {
        let mut scripts: BTreeMap<&CanonicalId, &Script> = BTreeMap::new();
        for script in self.scripts(languoid) {
            scripts.insert(&script.id, script);
        }
        for desc in self.descendants(languoid, None) {
            for script in self.scripts(desc) {
                scripts.insert(&script.id, script);
            }
        }
        scripts.into_values().collect()
    }

    /// Other languoids that share any script, in id order.
    #[must_use]
    pub fn languoids_with_same_script(&self, languoid: &Languoid) -> Vec<&Languoid> {
        let mut found: BTreeMap<&CanonicalId, &Languoid> = BTreeMap::new();
        for script in self.scripts(languoid) {
            for other in self.script_languoids(script) {
                found.insert(&other.id, other);
            }
        }
        found.remove(&languoid.id);
        found.into_values().collect()
    }

    /// Other languoids spoken in any of the same regions, in id order.
    #[must_use]
    pub fn languoids_in_same_region(&self, languoid: &Languoid) -> Vec<&Languoid> {
        let mut found: BTreeMap<&CanonicalId, &Languoid> = BTreeMap::new();
        for region in self.regions(languoid) {
            for other in self.region_languoids(region) {
                found.insert(&other.id, other);
            }
        }
        found.remove(&languoid.id);
        found.into_values().collect()
    }

    // =========================================================================
    // SCRIPT
    // =========================================================================

    /// Languoids using this script.
    #[must_use]
    pub fn script_languoids(&self, script: &Script) -> Vec<&Languoid> {
        self.script_entity(script)
            .map(|e| self.related_languoids(e, RelationType::UsedByLanguoid))
            .unwrap_or_default()
    }

    /// Languoids for which this script is flagged canonical.
    #[must_use]
    pub fn canonical_languoids(&self, script: &Script) -> Vec<&Languoid> {
        self.script_languoids(script)
            .into_iter()
            .filter(|l| Self::is_canonical_for(script, l))
            .collect()
    }

    /// Whether the USED_BY_LANGUOID edge to `languoid` carries `is_canonical`.
    #[must_use]
    pub fn is_canonical_for(script: &Script, languoid: &Languoid) -> bool {
        script
            .relations
            .find(RelationType::UsedByLanguoid, &languoid.id)
            .is_some_and(|r| r.flag("is_canonical"))
    }

    /// Number of USED_BY_LANGUOID edges, without resolving the targets.
    #[must_use]
    pub fn languoid_count(script: &Script) -> usize {
        script.relations.get(RelationType::UsedByLanguoid).len()
    }

    // =========================================================================
    // REGION
    // =========================================================================

    /// Languoids directly linked to this region.
    #[must_use]
    pub fn direct_languoids(&self, region: &GeographicRegion) -> Vec<&Languoid> {
        self.region_entity(region)
            .map(|e| self.related_languoids(e, RelationType::LanguoidsInRegion))
            .unwrap_or_default()
    }

    /// Languoids of this region, of its child regions (recursively) and
    /// directly of its subdivisions, in id order.
    ///
    /// Only HAS_CHILD_REGION edges recurse; a subdivision contributes its own
    /// direct languoids and nothing below it.
    #[must_use]
    pub fn region_languoids(&self, region: &GeographicRegion) -> Vec<&Languoid> {
        let mut found: BTreeMap<&CanonicalId, &Languoid> = BTreeMap::new();
        let mut visited: BTreeSet<&CanonicalId> = BTreeSet::new();
        let mut stack: Vec<(&GeographicRegion, usize)> = vec![(region, 0)];

        while let Some((current, depth)) = stack.pop() {
            if !visited.insert(&current.id) {
                continue;
            }
            let subdivisions = self.subdivisions(current);
            let own = std::iter::once(current).chain(subdivisions);
            for lang in own.flat_map(|r| self.direct_languoids(r)) {
                found.insert(&lang.id, lang);
            }
            if depth >= MAX_TRAVERSAL_DEPTH {
                continue;
            }
            for child in self.child_regions(current) {
                stack.push((child, depth + 1));
            }
        }
        found.into_values().collect()
    }

    /// HAS_CHILD_REGION targets.
    #[must_use]
    pub fn child_regions(&self, region: &GeographicRegion) -> Vec<&GeographicRegion> {
        self.region_entity(region)
            .map(|e| self.related_regions(e, RelationType::HasChildRegion))
            .unwrap_or_default()
    }

    /// First IS_PART_OF target.
    #[must_use]
    pub fn parent_region(&self, region: &GeographicRegion) -> Option<&GeographicRegion> {
        let entity = self.region_entity(region)?;
        self.related_regions(entity, RelationType::IsPartOf)
            .into_iter()
            .next()
    }

    /// Regions whose `parent_country_code` is this region's country code.
    ///
    /// Empty for regions without a country code.
    #[must_use]
    pub fn subdivisions(&self, region: &GeographicRegion) -> Vec<&GeographicRegion> {
        let Some(country_code) = &region.country_code else {
            return Vec::new();
        };
        self.subdivision_ids(country_code)
            .filter_map(|id| self.get_region(id))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
