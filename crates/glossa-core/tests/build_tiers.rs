//! # Build Tier Tests (T0-T4)
//!
//! End-to-end checks of the build and read path, bottom-up.
//!
//! ## Tiers
//! - T0: Identity Resolution
//! - T1: Merge
//! - T2: Store and Traversal
//! - T3: Snapshot Round-Trip
//! - T4: Identifier API

use glossa_core::entity_set::{DataSource, EntitySet};
use glossa_core::{
    Database, EntityContainer, EntityResolver, GlossaError, IdType, LanguoidLevel, Metadata,
    RelationType, SnapshotFormat, Store, merge,
};
use tempfile::tempdir;

/// Two sources describing Dutch, its family, its script and its country.
fn build() -> (Store, EntityResolver, usize) {
    let mut resolver = EntityResolver::new();

    let mut glottolog = EntitySet::new();
    let (germanic, dutch) = {
        let gem = glottolog
            .languoid_mut(&mut resolver, &[(IdType::Glottocode, "germ1287")])
            .expect("germanic");
        gem.name = Some("Germanic".into());
        gem.level = Some(LanguoidLevel::Family);
        let gem = gem.id.clone();

        let nld = glottolog
            .languoid_mut(
                &mut resolver,
                &[(IdType::Glottocode, "dutc1256"), (IdType::Iso639_3, "nld")],
            )
            .expect("dutch");
        nld.name = Some("Dutch".into());
        nld.level = Some(LanguoidLevel::Language);
        nld.endonym = Some("Nederlands".into());
        (gem, nld.id.clone())
    };
    glottolog
        .add_bidirectional_relation(&dutch, RelationType::ParentLanguoid, &germanic, Metadata::new())
        .expect("parent");

    let mut iana = EntitySet::new();
    {
        let nld = iana
            .languoid_mut(&mut resolver, &[(IdType::Iso639_3, "nld"), (IdType::Bcp47, "nl")])
            .expect("dutch");
        nld.name = Some("Dutch; Flemish".into());
        nld.endonym = Some("Vlaams".into());
    }
    let latn = {
        let s = iana.script_mut("Latn").expect("latn");
        s.name = Some("Latin".into());
        s.iso_15924 = Some("Latn".into());
        s.id.clone()
    };
    let nl = {
        let r = iana.region_mut("NL").expect("nl");
        r.name = Some("Netherlands".into());
        r.country_code = Some("NL".into());
        r.id.clone()
    };
    let mut canonical = Metadata::new();
    canonical.insert("is_canonical".into(), true.into());
    iana.add_bidirectional_relation(&dutch, RelationType::UsesScript, &latn, canonical)
        .expect("script");
    let mut official = Metadata::new();
    official.insert("is_official".into(), true.into());
    iana.add_bidirectional_relation(&dutch, RelationType::SpokenInRegion, &nl, official)
        .expect("region");

    resolver.register_deprecated(IdType::Iso639_3, "sgl", "N");

    let outcome = merge(
        &[
            (DataSource::new("glottolog", 10), glottolog),
            (DataSource::new("iana", 20), iana),
        ],
        &resolver,
    );
    (outcome.store, resolver, outcome.conflicts.len())
}

// =============================================================================
// TIER T0: IDENTITY RESOLUTION
// =============================================================================

mod t0_identity {
    use super::*;

    /// T0.1: Every identifier of an entity resolves to one canonical id.
    #[test]
    fn identifiers_share_one_canonical_id() {
        let (_, resolver, _) = build();
        let by_glotto = resolver.resolve(IdType::Glottocode, "dutc1256");
        assert!(by_glotto.is_some());
        assert_eq!(by_glotto, resolver.resolve(IdType::Iso639_3, "nld"));
        assert_eq!(by_glotto, resolver.resolve(IdType::Bcp47, "nl"));
        assert_eq!(by_glotto, resolver.resolve(IdType::Iso639_2T, "nld"));
    }

    /// T0.2: Independently registered sets fuse when linked.
    #[test]
    fn independent_registrations_fuse() {
        let mut resolver = EntityResolver::new();
        let a = resolver.find_or_create_canonical_id(&[(IdType::Iso639_3, "nld")]);
        let b = resolver.find_or_create_canonical_id(&[(IdType::Glottocode, "dutc1256")]);
        let fused = resolver.find_or_create_canonical_id(&[
            (IdType::Glottocode, "dutc1256"),
            (IdType::Iso639_3, "nld"),
        ]);
        assert_eq!(fused, a.clone().min(b.clone()));
        assert_eq!(resolver.canonical(&b), &fused);
        assert_eq!(resolver.stats().total_entities, 1);
    }
}

// =============================================================================
// TIER T1: MERGE
// =============================================================================

mod t1_merge {
    use super::*;

    /// T1.1: Higher-priority values win and real disagreements are audited.
    #[test]
    fn priority_wins_and_conflicts_are_logged() {
        let (store, resolver, conflicts) = build();
        let id = resolver.resolve(IdType::Bcp47, "nl").expect("nl");
        let dutch = store.get_languoid(id).expect("dutch");

        assert_eq!(dutch.name.as_deref(), Some("Dutch"));
        assert_eq!(dutch.endonym.as_deref(), Some("Nederlands"));
        assert_eq!(dutch.bcp_47.as_deref(), Some("nl"));
        // Endonym disagrees; name is exempt.
        assert_eq!(conflicts, 1);
    }

    /// T1.2: Relations from every source land on the merged entity.
    #[test]
    fn relations_from_all_sources_survive() {
        let (store, resolver, _) = build();
        let id = resolver.resolve(IdType::Bcp47, "nl").expect("nl");
        let relations = store.get(id).expect("dutch").relations();
        assert_eq!(relations.get(RelationType::ParentLanguoid).len(), 1);
        assert_eq!(relations.get(RelationType::UsesScript).len(), 1);
        assert_eq!(relations.get(RelationType::SpokenInRegion).len(), 1);
    }
}

// =============================================================================
// TIER T2: STORE AND TRAVERSAL
// =============================================================================

mod t2_traversal {
    use super::*;

    /// T2.1: Single-hop walks in both directions.
    #[test]
    fn single_hop() {
        let (store, resolver, _) = build();
        let id = resolver.resolve(IdType::Bcp47, "nl").expect("nl");
        let dutch = store.get_languoid(id).expect("dutch");

        let parent = store.parent(dutch).expect("parent");
        assert_eq!(parent.name.as_deref(), Some("Germanic"));
        assert_eq!(store.children(parent).len(), 1);
        assert_eq!(store.script_codes(dutch), vec!["Latn"]);
        assert_eq!(store.official_in_countries(dutch), vec!["NL"]);
    }

    /// T2.2: Multi-hop walks end at the root.
    #[test]
    fn multi_hop() {
        let (store, resolver, _) = build();
        let id = resolver.resolve(IdType::Bcp47, "nl").expect("nl");
        let dutch = store.get_languoid(id).expect("dutch");

        let tree = store.family_tree(dutch);
        assert_eq!(tree.len(), 1);
        assert_eq!(store.root_family(dutch).map(|l| l.id.clone()), Some(tree[0].id.clone()));
        assert_eq!(store.descendants(tree[0], None).len(), 1);
        assert_eq!(store.nllb_codes(dutch, false), vec!["nld_Latn".to_string()]);
    }
}

// =============================================================================
// TIER T3: SNAPSHOT ROUND-TRIP
// =============================================================================

mod t3_snapshot {
    use super::*;

    /// T3.1: Every format restores the same store and resolver.
    #[test]
    fn round_trip_every_format() {
        let (store, resolver, _) = build();
        let temp = tempdir().expect("temp dir");

        for format in SnapshotFormat::ALL {
            let path = temp.path().join(format!("glossa.{}", format.as_str()));
            glossa_core::save(&store, &resolver, &path, None).expect("save");
            let (loaded_store, loaded_resolver) = glossa_core::load(&path, None).expect("load");
            assert_eq!(loaded_store, store, "{}", format);
            assert_eq!(loaded_resolver, resolver, "{}", format);
        }
    }

    /// T3.2: Identical builds give identical canonical bytes.
    #[test]
    fn builds_are_reproducible() {
        let (a_store, a_resolver, _) = build();
        let (b_store, b_resolver, _) = build();
        assert_eq!(
            glossa_core::canonical_bytes(&a_store, &a_resolver).expect("a"),
            glossa_core::canonical_bytes(&b_store, &b_resolver).expect("b")
        );
    }
}

// =============================================================================
// TIER T4: IDENTIFIER API
// =============================================================================

mod t4_database {
    use super::*;

    /// T4.1: A saved snapshot answers identifier queries after load.
    #[test]
    fn load_then_query() {
        let (store, resolver, _) = build();
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("glossa.msgpack.gz");
        glossa_core::save(&store, &resolver, &path, None).expect("save");

        let db = Database::load(&path).expect("load");
        assert!(!db.has_names());
        assert_eq!(
            db.convert("dutc1256", IdType::Glottocode, IdType::Bcp47).as_deref(),
            Some("nl")
        );
        assert_eq!(db.guess("nl").expect("guess").name.as_deref(), Some("Dutch"));
        assert_eq!(db.search("neder", 5).len(), 1);
    }

    /// T4.2: Retired codes report their reason.
    #[test]
    fn retired_code_reason_survives_round_trip() {
        let (store, resolver, _) = build();
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("glossa.json");
        glossa_core::save(&store, &resolver, &path, None).expect("save");

        let db = Database::load(&path).expect("load");
        let err = db.get("sgl", IdType::Iso639_3).expect_err("retired");
        assert!(
            matches!(err, GlossaError::DeprecatedNoReplacement { ref reason, .. } if reason == "N"),
            "{:?}",
            err
        );
    }
}
