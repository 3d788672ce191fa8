//! Entity kinds and their declared field tables.
//!
//! Each kind carries a `&'static [FieldSpec]` table naming every data field
//! and its merge strategy. The merge engine and the query filters address
//! fields only through these tables (`field` / `set_field`), never by
//! inspecting struct layout.

use super::{CanonicalId, EntityKind, IdType, Relations};
use serde::{Deserialize, Serialize};

// =============================================================================
// CLASSIFICATION ENUMS
// =============================================================================

/// Glottolog classification level of a languoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguoidLevel {
    Language,
    Dialect,
    Family,
}

impl LanguoidLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "language" => Some(Self::Language),
            "dialect" => Some(Self::Dialect),
            "family" => Some(Self::Family),
            _ => None,
        }
    }
}

/// ISO 639-3 scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageScope {
    #[serde(rename = "I")]
    Individual,
    #[serde(rename = "M")]
    Macrolanguage,
    #[serde(rename = "S")]
    Special,
}

impl LanguageScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "I" => Some(Self::Individual),
            "M" => Some(Self::Macrolanguage),
            "S" => Some(Self::Special),
            _ => None,
        }
    }
}

/// ISO 639-3 language type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageStatus {
    #[serde(rename = "L")]
    Living,
    #[serde(rename = "H")]
    Historical,
    #[serde(rename = "A")]
    Ancient,
    #[serde(rename = "C")]
    Constructed,
    #[serde(rename = "E")]
    Extinct,
    #[serde(rename = "S")]
    Special,
}

impl LanguageStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "L" => Some(Self::Living),
            "H" => Some(Self::Historical),
            "A" => Some(Self::Ancient),
            "C" => Some(Self::Constructed),
            "E" => Some(Self::Extinct),
            "S" => Some(Self::Special),
            _ => None,
        }
    }
}

/// UNESCO endangerment scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndangermentStatus {
    #[serde(rename = "Not endangered")]
    NotEndangered,
    #[serde(rename = "Vulnerable")]
    Vulnerable,
    #[serde(rename = "Definitely endangered")]
    DefinitelyEndangered,
    #[serde(rename = "Severely endangered")]
    SeverelyEndangered,
    #[serde(rename = "Critically endangered")]
    CriticallyEndangered,
    #[serde(rename = "Extinct")]
    Extinct,
}

impl EndangermentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Not endangered" => Some(Self::NotEndangered),
            "Vulnerable" => Some(Self::Vulnerable),
            "Definitely endangered" => Some(Self::DefinitelyEndangered),
            "Severely endangered" => Some(Self::SeverelyEndangered),
            "Critically endangered" => Some(Self::CriticallyEndangered),
            "Extinct" => Some(Self::Extinct),
            _ => None,
        }
    }
}

// =============================================================================
// NESTED VALUE OBJECTS
// =============================================================================

/// Wikipedia edition metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WikipediaInfo {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub article_count: Option<u64>,
    #[serde(default)]
    pub active_users: Option<u64>,
}

/// A retired identifier that formerly referred to a languoid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecatedCode {
    pub code: String,
    pub code_type: IdType,
    /// C=Change, M=Merge, D=Duplicate, S=Split, N=Non-existent
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Retirement date, `YYYY-MM-DD`.
    #[serde(default)]
    pub effective: Option<String>,
    #[serde(default)]
    pub remedy: Option<String>,
}

// =============================================================================
// FIELD TABLES
// =============================================================================

/// How the merge engine combines values of a field across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStrategy {
    /// Highest-priority value wins; disagreement is recorded as a conflict.
    Scalar,
    /// Values are concatenated and de-duplicated; never a conflict.
    List,
    /// Highest-priority value wins; disagreement is expected and not recorded.
    NoConflict,
}

/// Value type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Flag,
    Level,
    Scope,
    Status,
    Endangerment,
    Wikipedia,
    DeprecatedCodes,
}

impl FieldType {
    /// Convert a JSON value into a field value of this type.
    ///
    /// Returns `None` when the JSON shape does not fit.
    pub fn parse_json(self, value: &serde_json::Value) -> Option<FieldValue> {
        match self {
            FieldType::Text => value.as_str().map(|s| FieldValue::Text(s.to_string())),
            FieldType::Integer => value.as_u64().map(FieldValue::Integer),
            FieldType::Float => value.as_f64().map(FieldValue::Float),
            FieldType::Flag => value.as_bool().map(FieldValue::Flag),
            FieldType::Level => value
                .as_str()
                .and_then(LanguoidLevel::parse)
                .map(FieldValue::Level),
            FieldType::Scope => value
                .as_str()
                .and_then(LanguageScope::parse)
                .map(FieldValue::Scope),
            FieldType::Status => value
                .as_str()
                .and_then(LanguageStatus::parse)
                .map(FieldValue::Status),
            FieldType::Endangerment => value
                .as_str()
                .and_then(EndangermentStatus::parse)
                .map(FieldValue::Endangerment),
            FieldType::Wikipedia => serde_json::from_value(value.clone())
                .ok()
                .map(FieldValue::Wikipedia),
            FieldType::DeprecatedCodes => serde_json::from_value(value.clone())
                .ok()
                .map(FieldValue::DeprecatedCodes),
        }
    }
}

/// One declared data field of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub strategy: FieldStrategy,
}

const fn spec(name: &'static str, ty: FieldType, strategy: FieldStrategy) -> FieldSpec {
    FieldSpec { name, ty, strategy }
}

const LANGUOID_FIELDS: &[FieldSpec] = &[
    spec("bcp_47", FieldType::Text, FieldStrategy::Scalar),
    spec("iso_639_1", FieldType::Text, FieldStrategy::Scalar),
    spec("iso_639_2b", FieldType::Text, FieldStrategy::Scalar),
    spec("iso_639_3", FieldType::Text, FieldStrategy::Scalar),
    spec("iso_639_5", FieldType::Text, FieldStrategy::Scalar),
    spec("glottocode", FieldType::Text, FieldStrategy::Scalar),
    spec("wikidata_id", FieldType::Text, FieldStrategy::Scalar),
    spec("name", FieldType::Text, FieldStrategy::NoConflict),
    spec("endonym", FieldType::Text, FieldStrategy::Scalar),
    spec("speaker_count", FieldType::Integer, FieldStrategy::Scalar),
    spec("latitude", FieldType::Float, FieldStrategy::Scalar),
    spec("longitude", FieldType::Float, FieldStrategy::Scalar),
    spec("level", FieldType::Level, FieldStrategy::Scalar),
    spec("scope", FieldType::Scope, FieldStrategy::Scalar),
    spec("status", FieldType::Status, FieldStrategy::Scalar),
    spec("endangerment_status", FieldType::Endangerment, FieldStrategy::Scalar),
    spec("wikipedia", FieldType::Wikipedia, FieldStrategy::Scalar),
    spec("description", FieldType::Text, FieldStrategy::Scalar),
    spec("deprecated_codes", FieldType::DeprecatedCodes, FieldStrategy::List),
];

const SCRIPT_FIELDS: &[FieldSpec] = &[
    spec("iso_15924", FieldType::Text, FieldStrategy::Scalar),
    spec("name", FieldType::Text, FieldStrategy::NoConflict),
    spec("full_name", FieldType::Text, FieldStrategy::Scalar),
    spec("is_historical", FieldType::Flag, FieldStrategy::Scalar),
];

const REGION_FIELDS: &[FieldSpec] = &[
    spec("name", FieldType::Text, FieldStrategy::NoConflict),
    spec("country_code", FieldType::Text, FieldStrategy::Scalar),
    spec("official_name", FieldType::Text, FieldStrategy::Scalar),
    spec("subdivision_code", FieldType::Text, FieldStrategy::Scalar),
    spec("subdivision_type", FieldType::Text, FieldStrategy::Scalar),
    spec("parent_country_code", FieldType::Text, FieldStrategy::Scalar),
    spec("is_historical", FieldType::Flag, FieldStrategy::Scalar),
];

impl EntityKind {
    /// Declared data fields of this kind, in declaration order.
    #[must_use]
    pub const fn fields(self) -> &'static [FieldSpec] {
        match self {
            EntityKind::Languoid => LANGUOID_FIELDS,
            EntityKind::Script => SCRIPT_FIELDS,
            EntityKind::Region => REGION_FIELDS,
        }
    }

    /// Look up one declared field by name.
    pub fn field_spec(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }
}

/// A field value read from or written to an entity by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(u64),
    Float(f64),
    Flag(bool),
    Level(LanguoidLevel),
    Scope(LanguageScope),
    Status(LanguageStatus),
    Endangerment(EndangermentStatus),
    Wikipedia(WikipediaInfo),
    DeprecatedCodes(Vec<DeprecatedCode>),
}

impl FieldValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Flag(v)
    }
}

impl From<LanguoidLevel> for FieldValue {
    fn from(v: LanguoidLevel) -> Self {
        FieldValue::Level(v)
    }
}

impl From<LanguageScope> for FieldValue {
    fn from(v: LanguageScope) -> Self {
        FieldValue::Scope(v)
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A language-like entity: family, language, macrolanguage or dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Languoid {
    pub id: CanonicalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcp_47: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_639_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_639_2b: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_639_3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_639_5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glottocode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endonym: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LanguoidLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<LanguageScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LanguageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endangerment_status: Option<EndangermentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia: Option<WikipediaInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_codes: Option<Vec<DeprecatedCode>>,
    #[serde(default)]
    pub relations: Relations,
}

impl Languoid {
    #[must_use]
    pub fn new(id: CanonicalId) -> Self {
        Self {
            id,
            bcp_47: None,
            iso_639_1: None,
            iso_639_2b: None,
            iso_639_3: None,
            iso_639_5: None,
            glottocode: None,
            wikidata_id: None,
            name: None,
            endonym: None,
            speaker_count: None,
            latitude: None,
            longitude: None,
            level: None,
            scope: None,
            status: None,
            endangerment_status: None,
            wikipedia: None,
            description: None,
            deprecated_codes: None,
            relations: Relations::new(),
        }
    }

    /// ISO 639-2/T code; always identical to ISO 639-3.
    #[must_use]
    pub fn iso_639_2t(&self) -> Option<&str> {
        self.iso_639_3.as_deref()
    }

    #[must_use]
    pub fn is_language(&self) -> bool {
        self.level == Some(LanguoidLevel::Language)
    }

    #[must_use]
    pub fn is_dialect(&self) -> bool {
        self.level == Some(LanguoidLevel::Dialect)
    }

    #[must_use]
    pub fn is_family(&self) -> bool {
        self.level == Some(LanguoidLevel::Family)
    }

    #[must_use]
    pub fn is_macrolanguage(&self) -> bool {
        self.scope == Some(LanguageScope::Macrolanguage)
    }

    /// The value this languoid carries for an identifier scheme.
    #[must_use]
    pub fn identifier(&self, id_type: IdType) -> Option<&str> {
        match id_type {
            IdType::Bcp47 => self.bcp_47.as_deref(),
            IdType::Iso639_3 | IdType::Iso639_2T => self.iso_639_3.as_deref(),
            IdType::Iso639_2B => self.iso_639_2b.as_deref(),
            IdType::Iso639_1 => self.iso_639_1.as_deref(),
            IdType::Iso639_5 => self.iso_639_5.as_deref(),
            IdType::Glottocode => self.glottocode.as_deref(),
            IdType::WikidataId => self.wikidata_id.as_deref(),
            IdType::Wikipedia => self.wikipedia.as_ref().and_then(|w| w.code.as_deref()),
        }
    }

    /// Fill an identifier field if it is still empty. Existing values are kept.
    pub fn fill_identifier(&mut self, id_type: IdType, value: &str) {
        let slot = match id_type.normalized() {
            IdType::Bcp47 => &mut self.bcp_47,
            IdType::Iso639_3 | IdType::Iso639_2T => &mut self.iso_639_3,
            IdType::Iso639_2B => &mut self.iso_639_2b,
            IdType::Iso639_1 => &mut self.iso_639_1,
            IdType::Iso639_5 => &mut self.iso_639_5,
            IdType::Glottocode => &mut self.glottocode,
            IdType::WikidataId => &mut self.wikidata_id,
            IdType::Wikipedia => {
                let info = self.wikipedia.get_or_insert_with(WikipediaInfo::default);
                &mut info.code
            }
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }

    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "bcp_47" => self.bcp_47.clone().map(FieldValue::Text),
            "iso_639_1" => self.iso_639_1.clone().map(FieldValue::Text),
            "iso_639_2b" => self.iso_639_2b.clone().map(FieldValue::Text),
            "iso_639_3" => self.iso_639_3.clone().map(FieldValue::Text),
            "iso_639_5" => self.iso_639_5.clone().map(FieldValue::Text),
            "glottocode" => self.glottocode.clone().map(FieldValue::Text),
            "wikidata_id" => self.wikidata_id.clone().map(FieldValue::Text),
            "name" => self.name.clone().map(FieldValue::Text),
            "endonym" => self.endonym.clone().map(FieldValue::Text),
            "speaker_count" => self.speaker_count.map(FieldValue::Integer),
            "latitude" => self.latitude.map(FieldValue::Float),
            "longitude" => self.longitude.map(FieldValue::Float),
            "level" => self.level.map(FieldValue::Level),
            "scope" => self.scope.map(FieldValue::Scope),
            "status" => self.status.map(FieldValue::Status),
            "endangerment_status" => self.endangerment_status.map(FieldValue::Endangerment),
            "wikipedia" => self.wikipedia.clone().map(FieldValue::Wikipedia),
            "description" => self.description.clone().map(FieldValue::Text),
            "deprecated_codes" => self.deprecated_codes.clone().map(FieldValue::DeprecatedCodes),
            _ => None,
        }
    }

    pub fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
        match (name, value) {
            ("bcp_47", FieldValue::Text(v)) => self.bcp_47 = Some(v),
            ("iso_639_1", FieldValue::Text(v)) => self.iso_639_1 = Some(v),
            ("iso_639_2b", FieldValue::Text(v)) => self.iso_639_2b = Some(v),
            ("iso_639_3", FieldValue::Text(v)) => self.iso_639_3 = Some(v),
            ("iso_639_5", FieldValue::Text(v)) => self.iso_639_5 = Some(v),
            ("glottocode", FieldValue::Text(v)) => self.glottocode = Some(v),
            ("wikidata_id", FieldValue::Text(v)) => self.wikidata_id = Some(v),
            ("name", FieldValue::Text(v)) => self.name = Some(v),
            ("endonym", FieldValue::Text(v)) => self.endonym = Some(v),
            ("speaker_count", FieldValue::Integer(v)) => self.speaker_count = Some(v),
            ("latitude", FieldValue::Float(v)) => self.latitude = Some(v),
            ("longitude", FieldValue::Float(v)) => self.longitude = Some(v),
            ("level", FieldValue::Level(v)) => self.level = Some(v),
            ("scope", FieldValue::Scope(v)) => self.scope = Some(v),
            ("status", FieldValue::Status(v)) => self.status = Some(v),
            ("endangerment_status", FieldValue::Endangerment(v)) => {
                self.endangerment_status = Some(v);
            }
            ("wikipedia", FieldValue::Wikipedia(v)) => self.wikipedia = Some(v),
            ("description", FieldValue::Text(v)) => self.description = Some(v),
            ("deprecated_codes", FieldValue::DeprecatedCodes(v)) => {
                self.deprecated_codes = Some(v);
            }
            _ => return false,
        }
        true
    }
}

/// A writing system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub id: CanonicalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_15924: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_historical: Option<bool>,
    #[serde(default)]
    pub relations: Relations,
}

impl Script {
    #[must_use]
    pub fn new(id: CanonicalId) -> Self {
        Self {
            id,
            iso_15924: None,
            name: None,
            full_name: None,
            is_historical: None,
            relations: Relations::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "iso_15924" => self.iso_15924.clone().map(FieldValue::Text),
            "name" => self.name.clone().map(FieldValue::Text),
            "full_name" => self.full_name.clone().map(FieldValue::Text),
            "is_historical" => self.is_historical.map(FieldValue::Flag),
            _ => None,
        }
    }

    pub fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
        match (name, value) {
            ("iso_15924", FieldValue::Text(v)) => self.iso_15924 = Some(v),
            ("name", FieldValue::Text(v)) => self.name = Some(v),
            ("full_name", FieldValue::Text(v)) => self.full_name = Some(v),
            ("is_historical", FieldValue::Flag(v)) => self.is_historical = Some(v),
            _ => return false,
        }
        true
    }
}

/// A country, subdivision or historical country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographicRegion {
    pub id: CanonicalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// ISO 3166-1 alpha-2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_name: Option<String>,
    /// ISO 3166-2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivision_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivision_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_country_code: Option<String>,
    /// ISO 3166-3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_historical: Option<bool>,
    #[serde(default)]
    pub relations: Relations,
}

impl GeographicRegion {
    #[must_use]
    pub fn new(id: CanonicalId) -> Self {
        Self {
            id,
            name: None,
            country_code: None,
            official_name: None,
            subdivision_code: None,
            subdivision_type: None,
            parent_country_code: None,
            is_historical: None,
            relations: Relations::new(),
        }
    }

    /// A current, top-level country.
    #[must_use]
    pub fn is_country(&self) -> bool {
        self.country_code.is_some()
            && self.parent_country_code.is_none()
            && !self.is_historical.unwrap_or(false)
    }

    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => self.name.clone().map(FieldValue::Text),
            "country_code" => self.country_code.clone().map(FieldValue::Text),
            "official_name" => self.official_name.clone().map(FieldValue::Text),
            "subdivision_code" => self.subdivision_code.clone().map(FieldValue::Text),
            "subdivision_type" => self.subdivision_type.clone().map(FieldValue::Text),
            "parent_country_code" => self.parent_country_code.clone().map(FieldValue::Text),
            "is_historical" => self.is_historical.map(FieldValue::Flag),
            _ => None,
        }
    }

    pub fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
        match (name, value) {
            ("name", FieldValue::Text(v)) => self.name = Some(v),
            ("country_code", FieldValue::Text(v)) => self.country_code = Some(v),
            ("official_name", FieldValue::Text(v)) => self.official_name = Some(v),
            ("subdivision_code", FieldValue::Text(v)) => self.subdivision_code = Some(v),
            ("subdivision_type", FieldValue::Text(v)) => self.subdivision_type = Some(v),
            ("parent_country_code", FieldValue::Text(v)) => self.parent_country_code = Some(v),
            ("is_historical", FieldValue::Flag(v)) => self.is_historical = Some(v),
            _ => return false,
        }
        true
    }
}

/// Any entity in the graph, tagged by kind in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Entity {
    Languoid(Languoid),
    Script(Script),
    GeographicRegion(GeographicRegion),
}

impl Entity {
    /// An entity of `kind` with no data and no relations.
    #[must_use]
    pub fn empty(kind: EntityKind, id: CanonicalId) -> Self {
        match kind {
            EntityKind::Languoid => Entity::Languoid(Languoid::new(id)),
            EntityKind::Script => Entity::Script(Script::new(id)),
            EntityKind::Region => Entity::GeographicRegion(GeographicRegion::new(id)),
        }
    }

    #[must_use]
    pub fn id(&self) -> &CanonicalId {
        match self {
            Entity::Languoid(e) => &e.id,
            Entity::Script(e) => &e.id,
            Entity::GeographicRegion(e) => &e.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Languoid(_) => EntityKind::Languoid,
            Entity::Script(_) => EntityKind::Script,
            Entity::GeographicRegion(_) => EntityKind::Region,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Entity::Languoid(e) => e.name.as_deref(),
            Entity::Script(e) => e.name.as_deref(),
            Entity::GeographicRegion(e) => e.name.as_deref(),
        }
    }

    #[must_use]
    pub fn relations(&self) -> &Relations {
        match self {
            Entity::Languoid(e) => &e.relations,
            Entity::Script(e) => &e.relations,
            Entity::GeographicRegion(e) => &e.relations,
        }
    }

    pub fn relations_mut(&mut self) -> &mut Relations {
        match self {
            Entity::Languoid(e) => &mut e.relations,
            Entity::Script(e) => &mut e.relations,
            Entity::GeographicRegion(e) => &mut e.relations,
        }
    }

    /// Read a declared field by name. Unknown names and empty fields are `None`.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match self {
            Entity::Languoid(e) => e.field(name),
            Entity::Script(e) => e.field(name),
            Entity::GeographicRegion(e) => e.field(name),
        }
    }

    /// Write a declared field by name.
    ///
    /// Returns `false` when the name is not declared for this kind or the
    /// value has the wrong type; the entity is left unchanged.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
        match self {
            Entity::Languoid(e) => e.set_field(name, value),
            Entity::Script(e) => e.set_field(name, value),
            Entity::GeographicRegion(e) => e.set_field(name, value),
        }
    }

    #[must_use]
    pub fn as_languoid(&self) -> Option<&Languoid> {
        match self {
            Entity::Languoid(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_script(&self) -> Option<&Script> {
        match self {
            Entity::Script(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_region(&self) -> Option<&GeographicRegion> {
        match self {
            Entity::GeographicRegion(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_languoid_mut(&mut self) -> Option<&mut Languoid> {
        match self {
            Entity::Languoid(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_script_mut(&mut self) -> Option<&mut Script> {
        match self {
            Entity::Script(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_region_mut(&mut self) -> Option<&mut GeographicRegion> {
        match self {
            Entity::GeographicRegion(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Relation, RelationType};

    #[test]
    fn field_tables_match_accessors() {
        for kind in EntityKind::ALL {
            let entity = Entity::empty(kind, CanonicalId::new("x:1"));
            for spec in kind.fields() {
                assert!(entity.field(spec.name).is_none(), "{} starts empty", spec.name);
            }
        }
    }

    #[test]
    fn set_field_rejects_wrong_type() {
        let mut lang = Entity::empty(EntityKind::Languoid, CanonicalId::new("lang:000001"));
        assert!(!lang.set_field("speaker_count", FieldValue::from("many")));
        assert!(!lang.set_field("no_such_field", FieldValue::from("x")));
        assert!(lang.set_field("speaker_count", FieldValue::Integer(24_000_000)));
        assert_eq!(
            lang.field("speaker_count").and_then(|v| v.as_integer()),
            Some(24_000_000)
        );
    }

    #[test]
    fn fill_identifier_never_overwrites() {
        let mut lang = Languoid::new(CanonicalId::new("lang:000001"));
        lang.fill_identifier(IdType::Iso639_3, "nld");
        lang.fill_identifier(IdType::Iso639_3, "dut");
        lang.fill_identifier(IdType::Wikipedia, "nl");
        assert_eq!(lang.iso_639_3.as_deref(), Some("nld"));
        assert_eq!(lang.iso_639_2t(), Some("nld"));
        assert_eq!(lang.identifier(IdType::Wikipedia), Some("nl"));
    }

    #[test]
    fn entity_json_carries_kind_tag_and_ignores_unknown_fields() {
        let mut script = Script::new(CanonicalId::new("script:latn"));
        script.iso_15924 = Some("Latn".into());
        script
            .relations
            .add(Relation::new(RelationType::UsedByLanguoid, CanonicalId::new("lang:000001")));
        let entity = Entity::Script(script);

        let json = serde_json::to_value(&entity).expect("serialize");
        assert_eq!(json["kind"], "Script");

        let mut with_legacy = json.clone();
        with_legacy["retired_attribute"] = serde_json::json!(42);
        let back: Entity = serde_json::from_value(with_legacy).expect("deserialize");
        assert_eq!(back, entity);
    }

    #[test]
    fn parse_json_by_field_type() {
        let level = FieldType::Level.parse_json(&serde_json::json!("dialect"));
        assert_eq!(level, Some(FieldValue::Level(LanguoidLevel::Dialect)));
        assert_eq!(FieldType::Integer.parse_json(&serde_json::json!("12")), None);

        let codes = FieldType::DeprecatedCodes.parse_json(&serde_json::json!([
            {"code": "mol", "code_type": "iso_639_3", "reason": "M"}
        ]));
        assert!(matches!(
            codes,
            Some(FieldValue::DeprecatedCodes(ref list)) if list[0].code_type == IdType::Iso639_3
        ));
    }
}
