//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::BuildConfig;
use glossa_core::{
    DataValidator, Database, GlossaError, IdType, Languoid, LanguoidLevel, NameArchive,
    SnapshotFormat, StoreMetrics, ValidationReport, save, snapshot_digest, verify_digest,
    write_conflicts,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Database location and output mode shared by the read commands.
#[derive(Debug, Clone)]
pub struct Context {
    pub database: PathBuf,
    pub format: Option<SnapshotFormat>,
    pub names: Option<PathBuf>,
    pub json: bool,
}

impl Context {
    /// Load the snapshot and its name archive.
    pub fn load(&self) -> Result<Database, GlossaError> {
        if !self.database.is_file() {
            return Err(GlossaError::Io(format!(
                "Snapshot '{}' not found. Run `glossa build` first.",
                self.database.display()
            )));
        }
        Database::load_with(&self.database, self.format, self.names.as_deref())
    }
}

/// Validate file path for security.
///
/// Canonicalizes the path to resolve symlinks and "..", and ensures it names
/// an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, GlossaError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| GlossaError::Io(format!("Invalid file path '{}': {}", path.display(), e)))?;

    if !canonical.is_file() {
        return Err(GlossaError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Create the parent directory of an output file.
fn ensure_parent(path: &Path) -> Result<(), GlossaError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(std::fs::create_dir_all(dir)?),
        _ => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), GlossaError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| GlossaError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

/// Per-mille as a percentage with one decimal.
fn per_mille(value: u32) -> String {
    format!("{}.{}%", value / 10, value % 10)
}

fn level_name(level: Option<LanguoidLevel>) -> &'static str {
    match level {
        Some(LanguoidLevel::Language) => "language",
        Some(LanguoidLevel::Dialect) => "dialect",
        Some(LanguoidLevel::Family) => "family",
        None => "-",
    }
}

fn label(languoid: &Languoid) -> String {
    format!(
        "{} [{}]",
        languoid.name.as_deref().unwrap_or("(unnamed)"),
        languoid.id
    )
}

// =============================================================================
// BUILD COMMAND
// =============================================================================

#[derive(Debug, Serialize)]
struct BuildSummary<'a> {
    output: &'a Path,
    conflicts: usize,
    relations_added: usize,
    relations_skipped: usize,
    names_written: usize,
    validation_errors: bool,
    metrics: StoreMetrics,
}

/// Import every source in the manifest, merge, and write the outputs.
pub fn cmd_build(config_path: &Path, json: bool) -> Result<(), GlossaError> {
    let config = BuildConfig::from_path(&validate_file_path(config_path)?)?;
    for source in &config.sources {
        validate_file_path(&source.path)?;
    }
    info!(
        manifest = %config_path.display(),
        sources = config.sources.len(),
        "Starting build"
    );

    let output = config.pipeline().run()?;
    save(
        &output.store,
        &output.resolver,
        &config.output,
        config.snapshot_format()?,
    )?;

    if let Some(path) = &config.conflicts {
        ensure_parent(path)?;
        write_conflicts(&output.conflicts, path)?;
    }

    let mut names_written = 0;
    if let Some(path) = &config.names {
        ensure_parent(path)?;
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        names_written = NameArchive::create(path)?.write_all(&output.names)?;
    }

    let summary = BuildSummary {
        output: &config.output,
        conflicts: output.conflicts.len(),
        relations_added: output.relations_added,
        relations_skipped: output.relations_skipped,
        names_written,
        validation_errors: output.report.has_errors(),
        metrics: StoreMetrics::from_parts(&output.store, &output.resolver),
    };
    if summary.validation_errors {
        warn!("Build finished with validation findings; run `glossa validate` for details");
    }

    if json {
        return print_json(&summary);
    }

    println!("glossa Build");
    println!("============");
    println!("Output:     {}", summary.output.display());
    println!("Entities:   {}", summary.metrics.total_entities);
    println!("  Languoids: {}", summary.metrics.languoids);
    println!("  Scripts:   {}", summary.metrics.scripts);
    println!("  Regions:   {}", summary.metrics.regions);
    println!(
        "Relations:  {} added, {} skipped",
        summary.relations_added, summary.relations_skipped
    );
    println!("Conflicts:  {}", summary.conflicts);
    if config.names.is_some() {
        println!("Names:      {} languoids", summary.names_written);
    }

    Ok(())
}

// =============================================================================
// INFO COMMAND
// =============================================================================

/// Show snapshot counts.
pub fn cmd_info(ctx: &Context) -> Result<(), GlossaError> {
    let db = ctx.load()?;
    let metrics = StoreMetrics::from_database(&db);

    if ctx.json {
        let output = serde_json::json!({
            "database": ctx.database.to_string_lossy(),
            "names": db.has_names(),
            "total_entities": metrics.total_entities,
            "languoids": metrics.languoids,
            "scripts": metrics.scripts,
            "regions": metrics.regions,
            "relation_count": metrics.relation_count,
            "relations_per_thousand": metrics.relations_per_thousand(),
            "identifier_mappings": metrics.identifier_mappings,
            "deprecated_codes": metrics.deprecated_codes,
            "fused_identities": metrics.fused_identities
        });
        return print_json(&output);
    }

    println!("glossa Snapshot");
    println!("===============");
    println!("Database: {}", ctx.database.display());
    println!("Names:    {}", if db.has_names() { "attached" } else { "none" });
    println!();
    println!("Entities:            {}", metrics.total_entities);
    println!("  Languoids:         {}", metrics.languoids);
    println!("  Scripts:           {}", metrics.scripts);
    println!("  Regions:           {}", metrics.regions);
    println!("Relations:           {}", metrics.relation_count);
    println!(
        "Density:             {} per thousand",
        metrics.relations_per_thousand()
    );
    println!("Identifier mappings: {}", metrics.identifier_mappings);
    println!("Deprecated codes:    {}", metrics.deprecated_codes);
    println!("Fused identities:    {}", metrics.fused_identities);

    Ok(())
}

// =============================================================================
// LOOKUP COMMANDS
// =============================================================================

fn print_languoid(db: &Database, languoid: &Languoid, json: bool) -> Result<(), GlossaError> {
    if json {
        return print_json(languoid);
    }

    let store = db.store();
    println!("{}", label(languoid));
    println!("  Level:    {}", level_name(languoid.level));
    let codes = [
        (IdType::Bcp47, &languoid.bcp_47),
        (IdType::Iso639_1, &languoid.iso_639_1),
        (IdType::Iso639_2B, &languoid.iso_639_2b),
        (IdType::Iso639_3, &languoid.iso_639_3),
        (IdType::Iso639_5, &languoid.iso_639_5),
        (IdType::Glottocode, &languoid.glottocode),
        (IdType::WikidataId, &languoid.wikidata_id),
    ];
    for (id_type, value) in codes {
        if let Some(value) = value {
            println!("  {:<10}{}", format!("{}:", id_type), value);
        }
    }
    if let Some(endonym) = &languoid.endonym {
        println!("  Endonym:  {}", endonym);
    }
    if let Some(speakers) = languoid.speaker_count {
        println!("  Speakers: {}", speakers);
    }
    if let Some(parent) = store.parent(languoid) {
        println!("  Parent:   {}", label(parent));
    }
    let scripts = store.script_codes(languoid);
    if !scripts.is_empty() {
        println!("  Scripts:  {}", scripts.join(", "));
    }
    let countries = store.country_codes(languoid);
    if !countries.is_empty() {
        println!("  Regions:  {}", countries.join(", "));
    }
    Ok(())
}

/// Look up a languoid by code.
pub fn cmd_get(ctx: &Context, code: &str, id_type: IdType) -> Result<(), GlossaError> {
    let db = ctx.load()?;
    let resolution = db.resolve_code(code, id_type)?;
    if let (Some(reason), false) = (&resolution.deprecated, ctx.json) {
        println!("note: {} '{}' is deprecated ({})", id_type, code, reason);
    }
    let languoid = db.get(code, id_type)?;
    print_languoid(&db, languoid, ctx.json)
}

/// Look up a languoid, trying every identifier type.
pub fn cmd_guess(ctx: &Context, code: &str) -> Result<(), GlossaError> {
    let db = ctx.load()?;
    let languoid = db.guess(code)?;
    print_languoid(&db, languoid, ctx.json)
}

/// Translate a code between identifier schemes.
pub fn cmd_convert(ctx: &Context, code: &str, from: IdType, to: IdType) -> Result<(), GlossaError> {
    let db = ctx.load()?;
    let converted = db.convert(code, from, to);

    if ctx.json {
        let output = serde_json::json!({
            "code": code,
            "from": from,
            "to": to,
            "result": converted
        });
        return print_json(&output);
    }

    match converted {
        Some(value) => println!("{}", value),
        None => {
            return Err(GlossaError::ConversionFailed {
                code: code.to_string(),
                from,
                to,
            });
        }
    }
    Ok(())
}

/// Find languoids by name or endonym.
pub fn cmd_search(ctx: &Context, query: &str, limit: usize) -> Result<(), GlossaError> {
    let db = ctx.load()?;
    let hits = db.search(query, limit);

    if ctx.json {
        return print_json(&hits);
    }

    if hits.is_empty() {
        println!("No languoids match '{}'", query);
    }
    for languoid in hits {
        println!("{}  ({})", label(languoid), level_name(languoid.level));
    }
    Ok(())
}

/// Show ancestors and descendants of a languoid.
pub fn cmd_tree(ctx: &Context, code: &str, id_type: IdType, depth: usize) -> Result<(), GlossaError> {
    let db = ctx.load()?;
    let languoid = db.get(code, id_type)?;
    let store = db.store();
    let ancestors = store.family_tree(languoid);
    let descendants = store.descendants(languoid, Some(depth));

    if ctx.json {
        let output = serde_json::json!({
            "languoid": languoid.id,
            "ancestors": ancestors.iter().map(|l| &l.id).collect::<Vec<_>>(),
            "descendants": descendants.iter().map(|l| &l.id).collect::<Vec<_>>()
        });
        return print_json(&output);
    }

    for (indent, ancestor) in ancestors.iter().rev().enumerate() {
        println!("{}{}", "  ".repeat(indent), label(ancestor));
    }
    let base = ancestors.len();
    println!("{}* {}", "  ".repeat(base), label(languoid));
    for child in store.children(languoid) {
        println!("{}{}", "  ".repeat(base + 1), label(child));
    }
    if descendants.len() > store.children(languoid).len() {
        println!(
            "{}... {} descendants in total",
            "  ".repeat(base + 1),
            descendants.len()
        );
    }
    Ok(())
}

/// Show a languoid's names.
pub fn cmd_names(
    ctx: &Context,
    code: &str,
    id_type: IdType,
    locale: Option<&str>,
) -> Result<(), GlossaError> {
    let db = ctx.load()?;
    if !db.has_names() {
        return Err(GlossaError::Storage(
            "No name archive attached. Pass --names or build with `names` set.".to_string(),
        ));
    }

    if let Some(locale) = locale {
        let languoid = db.get(code, id_type)?;
        let name = db.name_in(languoid, locale)?;
        if ctx.json {
            return print_json(&serde_json::json!({ "locale": locale, "name": name }));
        }
        match name {
            Some(name) => println!("{}", name),
            None => println!("No name in '{}'", locale),
        }
        return Ok(());
    }

    let entries = db.get_names(code, id_type)?.unwrap_or_default();
    if ctx.json {
        return print_json(&entries);
    }
    for entry in entries {
        println!(
            "{:<12}{}{}",
            entry.bcp_47_code.as_deref().unwrap_or("-"),
            entry.name,
            if entry.is_canonical { "  (canonical)" } else { "" }
        );
    }
    Ok(())
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

fn print_report(report: &ValidationReport) {
    let c = &report.completeness;
    println!("glossa Validation");
    println!("=================");
    println!("Entities:               {}", report.total_entities);
    println!("Orphaned:               {}", report.orphaned_entities.len());
    println!(
        "No ISO 639-3/Glottocode: {}",
        report.missing_critical_ids.no_iso_or_glotto.len()
    );
    println!(
        "No name:                {}",
        report.missing_critical_ids.no_name.len()
    );
    let duplicates: usize = report.duplicate_identifiers.values().map(Vec::len).sum();
    println!("Duplicate identifiers:  {}", duplicates);
    println!("Broken relations:       {}", report.broken_relations.len());
    println!("Multiple parents:       {}", report.multiple_parents.len());
    println!("Region parent drift:    {}", report.region_parent_drift.len());
    println!();
    println!("Completeness ({} languoids):", c.languoids);
    for (field, value) in [
        ("name", c.has_name),
        ("iso_639_3", c.has_iso_639_3),
        ("glottocode", c.has_glottocode),
        ("bcp_47", c.has_bcp_47),
        ("speaker_count", c.has_speaker_count),
        ("scripts", c.has_scripts),
        ("regions", c.has_regions),
        ("parent", c.has_parent),
    ] {
        println!("  {:<15}{}", field, per_mille(value));
    }
    println!();
    println!(
        "Status: {}",
        if report.has_errors() { "structural problems found" } else { "ok" }
    );
}

/// Run the consistency checks.
pub fn cmd_validate(ctx: &Context) -> Result<(), GlossaError> {
    let db = ctx.load()?;
    let report = DataValidator::new(db.store(), db.resolver()).validate_all();

    if ctx.json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

// =============================================================================
// HASH COMMAND
// =============================================================================

/// Compute the BLAKE3 digest of the canonical snapshot.
pub fn cmd_hash(ctx: &Context, expect: Option<&str>) -> Result<(), GlossaError> {
    let db = ctx.load()?;
    let digest = snapshot_digest(db.store(), db.resolver())?;
    let matches = expect
        .map(|expected| verify_digest(db.store(), db.resolver(), expected))
        .transpose()?;

    if ctx.json {
        let output = serde_json::json!({
            "algorithm": "blake3",
            "hash": digest,
            "entities": db.store().len(),
            "matches": matches
        });
        print_json(&output)?;
    } else {
        println!("BLAKE3: {}", digest);
    }

    match (expect, matches) {
        (Some(expected), Some(false)) => Err(GlossaError::Config(format!(
            "digest mismatch: expected {}, got {}",
            expected, digest
        ))),
        _ => Ok(()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_mille_renders_one_decimal() {
        assert_eq!(per_mille(0), "0.0%");
        assert_eq!(per_mille(875), "87.5%");
        assert_eq!(per_mille(1000), "100.0%");
    }

    #[test]
    fn missing_snapshot_is_an_io_error() {
        let ctx = Context {
            database: PathBuf::from("/nonexistent/glossa.json"),
            format: None,
            names: None,
            json: false,
        };
        assert!(matches!(ctx.load(), Err(GlossaError::Io(_))));
    }
}
