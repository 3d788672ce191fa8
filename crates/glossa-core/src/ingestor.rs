//! # Record Importer
//!
//! Validation and ingestion of JSON source-record documents.
//!
//! - Validate every record before any resolver write
//! - Reject a malformed document as a whole
//! - Set declared fields only; no inference or enrichment
//!
//! ## Document shape
//!
//! ```json
//! {
//!   "records": [
//!     {
//!       "kind": "languoid",
//!       "identifiers": { "iso_639_3": "nld", "bcp_47": "nl" },
//!       "fields": { "name": "Dutch", "level": "language" },
//!       "relations": [
//!         { "type": "uses_script", "target": { "script": "Latn" },
//!           "metadata": { "is_canonical": true } }
//!       ],
//!       "names": [ { "name": "néerlandais", "bcp_47": "fr", "is_canonical": true } ]
//!     },
//!     { "kind": "script", "code": "Latn", "fields": { "name": "Latin" } }
//!   ],
//!   "deprecations": [
//!     { "id_type": "iso_639_3", "code": "mol", "reason": "M",
//!       "replacement": { "id_type": "iso_639_3", "value": "ron" } }
//!   ]
//! }
//! ```
//!
//! Relation targets are addressed the way importers address entities:
//! languoids by identifier, scripts and regions by code. A languoid target
//! that no source has registered yet is skipped with a warning.

use crate::entity_set::{DataSource, EntitySet};
use crate::pipeline::Importer;
use crate::primitives::{MAX_IDENTIFIER_LENGTH, MAX_RECORDS_PER_SOURCE, MAX_VALUE_LENGTH};
use crate::resolver::EntityResolver;
use crate::storage::NameEntry;
use crate::types::{
    CanonicalId, EntityKind, FieldValue, GlossaError, IdType, MetaValue, Metadata, RelationType,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

// =============================================================================
// WIRE TYPES
// =============================================================================

/// One source document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceDocument {
    #[serde(default)]
    pub records: Vec<SourceRecord>,
    #[serde(default)]
    pub deprecations: Vec<DeprecationRecord>,
}

/// One entity as a source describes it.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRecord {
    /// `languoid`, `script` or `region`.
    pub kind: String,
    /// Languoid identifiers.
    #[serde(default)]
    pub identifiers: BTreeMap<IdType, String>,
    /// ISO 15924 or ISO 3166 code for scripts and regions.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub relations: Vec<RecordRelation>,
    /// Languoid names in other locales.
    #[serde(default)]
    pub names: Vec<RecordName>,
}

/// An outgoing edge of a record. The reverse edge is added automatically.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordRelation {
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    pub target: RecordRef,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// How a record addresses another entity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RecordRef {
    Identifier { id_type: IdType, value: String },
    Script { script: String },
    Region { region: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordName {
    pub name: String,
    #[serde(default)]
    pub bcp_47: Option<String>,
    #[serde(default)]
    pub is_canonical: bool,
}

/// A retired code, optionally redirected to a languoid.
#[derive(Debug, Clone, Deserialize)]
pub struct DeprecationRecord {
    pub id_type: IdType,
    pub code: String,
    pub reason: String,
    #[serde(default)]
    pub replacement: Option<RecordRef>,
}

// =============================================================================
// VALIDATED FORM
// =============================================================================

struct PreparedRecord {
    kind: EntityKind,
    identifiers: Vec<(IdType, String)>,
    code: Option<String>,
    fields: Vec<(&'static str, FieldValue)>,
    relations: Vec<PreparedRelation>,
    names: Vec<NameEntry>,
}

struct PreparedRelation {
    relation_type: RelationType,
    target: RecordRef,
    metadata: Metadata,
}

fn invalid(index: usize, message: impl std::fmt::Display) -> GlossaError {
    GlossaError::InvalidRecord(format!("record {}: {}", index, message))
}

fn check_code(index: usize, what: &str, value: &str) -> Result<(), GlossaError> {
    if value.is_empty() {
        return Err(invalid(index, format!("empty {}", what)));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(invalid(index, format!("{} exceeds {} bytes", what, MAX_IDENTIFIER_LENGTH)));
    }
    Ok(())
}

fn check_ref(index: usize, target: &RecordRef) -> Result<(), GlossaError> {
    match target {
        RecordRef::Identifier { id_type, value } => check_code(index, id_type.as_str(), value),
        RecordRef::Script { script } => check_code(index, "script code", script),
        RecordRef::Region { region } => check_code(index, "region code", region),
    }
}

fn meta_value(index: usize, key: &str, value: &Value) -> Result<MetaValue, GlossaError> {
    match value {
        Value::Bool(b) => Ok(MetaValue::Flag(*b)),
        Value::String(s) if s.len() <= MAX_VALUE_LENGTH => Ok(MetaValue::Text(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(MetaValue::Integer)
            .ok_or_else(|| invalid(index, format!("metadata '{}' is not an integer", key))),
        _ => Err(invalid(index, format!("metadata '{}' must be a flag, integer or short text", key))),
    }
}

fn text_too_long(value: &FieldValue) -> bool {
    value.as_text().is_some_and(|s| s.len() > MAX_VALUE_LENGTH)
}

fn prepare(index: usize, record: &SourceRecord) -> Result<PreparedRecord, GlossaError> {
    let kind: EntityKind = record.kind.parse().map_err(|_| {
        invalid(index, format!("unknown kind '{}'", record.kind))
    })?;

    let mut identifiers = Vec::with_capacity(record.identifiers.len());
    let mut code = None;
    match kind {
        EntityKind::Languoid => {
            if record.identifiers.is_empty() {
                return Err(invalid(index, "languoid without identifiers"));
            }
            for (id_type, value) in &record.identifiers {
                check_code(index, id_type.as_str(), value)?;
                identifiers.push((*id_type, value.clone()));
            }
        }
        EntityKind::Script | EntityKind::Region => {
            let value = record
                .code
                .as_deref()
                .ok_or_else(|| invalid(index, format!("{} without code", kind)))?;
            check_code(index, "code", value)?;
            if !record.identifiers.is_empty() {
                return Err(invalid(index, format!("{} records are keyed by code only", kind)));
            }
            code = Some(value.to_string());
        }
    }

    let mut fields = Vec::with_capacity(record.fields.len());
    for (name, value) in &record.fields {
        if kind == EntityKind::Languoid
            && name
                .parse::<IdType>()
                .is_ok_and(|t| t != IdType::Wikipedia)
        {
            return Err(invalid(index, format!("identifier '{}' belongs in 'identifiers'", name)));
        }
        let spec = kind
            .field_spec(name)
            .ok_or_else(|| invalid(index, format!("unknown {} field '{}'", kind, name)))?;
        let parsed = spec
            .ty
            .parse_json(value)
            .ok_or_else(|| invalid(index, format!("field '{}' has the wrong type", name)))?;
        if text_too_long(&parsed) {
            return Err(invalid(index, format!("field '{}' exceeds {} bytes", name, MAX_VALUE_LENGTH)));
        }
        fields.push((spec.name, parsed));
    }

    let mut relations = Vec::with_capacity(record.relations.len());
    for rel in &record.relations {
        check_ref(index, &rel.target)?;
        let mut metadata = Metadata::new();
        for (key, value) in &rel.metadata {
            metadata.insert(key.clone(), meta_value(index, key, value)?);
        }
        relations.push(PreparedRelation {
            relation_type: rel.relation_type,
            target: rel.target.clone(),
            metadata,
        });
    }

    if !record.names.is_empty() && kind != EntityKind::Languoid {
        return Err(invalid(index, "only languoids carry names"));
    }
    let mut names = Vec::with_capacity(record.names.len());
    for n in &record.names {
        if n.name.is_empty() || n.name.len() > MAX_VALUE_LENGTH {
            return Err(invalid(index, "name is empty or too long"));
        }
        if let Some(locale) = &n.bcp_47 {
            check_code(index, "locale", locale)?;
        }
        names.push(NameEntry::new(n.name.clone(), n.bcp_47.as_deref(), n.is_canonical));
    }

    Ok(PreparedRecord {
        kind,
        identifiers,
        code,
        fields,
        relations,
        names,
    })
}

fn prepare_all(doc: &SourceDocument) -> Result<Vec<PreparedRecord>, GlossaError> {
    if doc.records.len() > MAX_RECORDS_PER_SOURCE {
        return Err(GlossaError::InvalidRecord(format!(
            "document has {} records, limit is {}",
            doc.records.len(),
            MAX_RECORDS_PER_SOURCE
        )));
    }
    for (i, dep) in doc.deprecations.iter().enumerate() {
        check_code(i, "deprecated code", &dep.code)?;
        if let Some(target) = &dep.replacement {
            check_ref(i, target)?;
        }
    }
    doc.records
        .iter()
        .enumerate()
        .map(|(i, r)| prepare(i, r))
        .collect()
}

// =============================================================================
// IMPORTER
// =============================================================================

/// Generic importer for source-record documents.
#[derive(Debug, Clone)]
pub struct RecordImporter {
    source: DataSource,
    names: BTreeMap<CanonicalId, Vec<NameEntry>>,
}

impl RecordImporter {
    #[must_use]
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            names: BTreeMap::new(),
        }
    }

    /// Check a document without touching any resolver.
    pub fn validate(doc: &SourceDocument) -> Result<(), GlossaError> {
        prepare_all(doc).map(|_| ())
    }

    /// Read and parse a document from disk.
    pub fn read_document(path: &Path) -> Result<SourceDocument, GlossaError> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            GlossaError::Deserialization(format!("{}: {}", path.display(), e))
        })
    }

    /// Ingest a parsed document.
    ///
    /// Nothing is written to `resolver` unless the whole document validates.
    pub fn import_document(
        &mut self,
        resolver: &mut EntityResolver,
        doc: &SourceDocument,
    ) -> Result<EntitySet, GlossaError> {
        let prepared = prepare_all(doc)?;
        let mut set = EntitySet::new();

        let mut ids = Vec::with_capacity(prepared.len());
        for record in &prepared {
            let id = self.ingest_record(&mut set, resolver, record)?;
            ids.push(id);
        }

        let mut skipped = 0usize;
        for (record, from) in prepared.iter().zip(&ids) {
            for rel in &record.relations {
                let Some(to) = target_id(&mut set, resolver, &rel.target) else {
                    warn!(
                        source = %self.source.name,
                        from = %from,
                        target = ?rel.target,
                        "Relation target not registered by any source"
                    );
                    skipped += 1;
                    continue;
                };
                set.add_bidirectional_relation(from, rel.relation_type, &to, rel.metadata.clone())?;
            }
        }

        for dep in &doc.deprecations {
            resolver.register_deprecated(dep.id_type, &dep.code, &dep.reason);
            let Some(target) = &dep.replacement else {
                continue;
            };
            match resolve_ref(resolver, target) {
                Some(id) => resolver.register_alias(dep.id_type, &dep.code, id),
                None => warn!(code = %dep.code, target = ?target, "Replacement for deprecated code not found"),
            }
        }

        if skipped > 0 {
            debug!(source = %self.source.name, skipped, "Relations skipped");
        }
        set.log_stats(&self.source);
        Ok(set)
    }

    fn ingest_record(
        &mut self,
        set: &mut EntitySet,
        resolver: &mut EntityResolver,
        record: &PreparedRecord,
    ) -> Result<CanonicalId, GlossaError> {
        let id = match (record.kind, record.code.as_deref()) {
            (EntityKind::Languoid, _) => {
                let identifiers: Vec<(IdType, &str)> = record
                    .identifiers
                    .iter()
                    .map(|(t, v)| (*t, v.as_str()))
                    .collect();
                let languoid = set.languoid_mut(resolver, &identifiers)?;
                for (name, value) in &record.fields {
                    languoid.set_field(name, value.clone());
                }
                languoid.id.clone()
            }
            (EntityKind::Script, Some(code)) => {
                let script = set.script_mut(code)?;
                if script.iso_15924.is_none() {
                    script.iso_15924 = Some(code.to_string());
                }
                for (name, value) in &record.fields {
                    script.set_field(name, value.clone());
                }
                script.id.clone()
            }
            (EntityKind::Region, Some(code)) => {
                let region = set.region_mut(code)?;
                for (name, value) in &record.fields {
                    region.set_field(name, value.clone());
                }
                region.id.clone()
            }
            (kind, None) => {
                return Err(GlossaError::InvalidRecord(format!("{} without code", kind)));
            }
        };

        if !record.names.is_empty() {
            self.names
                .entry(id.clone())
                .or_default()
                .extend(record.names.iter().cloned());
        }
        Ok(id)
    }
}

fn resolve_ref(resolver: &EntityResolver, target: &RecordRef) -> Option<CanonicalId> {
    match target {
        RecordRef::Identifier { id_type, value } => resolver.resolve(*id_type, value).cloned(),
        RecordRef::Script { script } => Some(EntityResolver::script_id(script)),
        RecordRef::Region { region } => Some(EntityResolver::region_id(region)),
    }
}

/// Make sure the target exists in `set` and return its id.
fn target_id(
    set: &mut EntitySet,
    resolver: &EntityResolver,
    target: &RecordRef,
) -> Option<CanonicalId> {
    match target {
        RecordRef::Identifier { id_type, value } => set
            .resolve_languoid(resolver, *id_type, value)
            .map(|l| l.id.clone()),
        RecordRef::Script { script } => set.script_mut(script).ok().map(|s| s.id.clone()),
        RecordRef::Region { region } => set.region_mut(region).ok().map(|r| r.id.clone()),
    }
}

impl Importer for RecordImporter {
    fn source(&self) -> DataSource {
        self.source.clone()
    }

    fn import(&mut self, resolver: &mut EntityResolver, path: &Path) -> Result<EntitySet, GlossaError> {
        let doc = Self::read_document(path)?;
        self.import_document(resolver, &doc)
    }

    fn take_names(&mut self) -> BTreeMap<CanonicalId, Vec<NameEntry>> {
        std::mem::take(&mut self.names)
    }
}

// =============================================================================
// TESTS
// =============================================================================
