//! # Build Manifest
//!
//! TOML description of a build: which source documents to import, in which
//! order and with which merge priority, and where to write the results.
//!
//! ```toml
//! output = "data/glossa.json.gz"
//! format = "json.gz"
//! conflicts = "data/conflicts.json"
//! names = "data/names.redb"
//!
//! [[sources]]
//! name = "glottolog"
//! priority = 10
//! path = "sources/glottolog.json"
//! ```
//!
//! Relative paths are taken relative to the manifest's directory.

use glossa_core::{BuildPipeline, DataSource, GlossaError, RecordImporter, SnapshotFormat};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Maximum manifest size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// One `[[sources]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,
    /// Merge priority; numerically lower wins.
    pub priority: u32,
    /// Source document in the JSON record format.
    pub path: PathBuf,
}

/// A parsed build manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Snapshot to write.
    pub output: PathBuf,
    /// Snapshot format; inferred from `output` when absent.
    #[serde(default)]
    pub format: Option<String>,
    /// Conflict audit log to write.
    #[serde(default)]
    pub conflicts: Option<PathBuf>,
    /// Name archive to write.
    #[serde(default)]
    pub names: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl BuildConfig {
    /// Parse manifest text. Paths are left as written.
    pub fn parse(text: &str) -> Result<Self, GlossaError> {
        let config: BuildConfig =
            toml::from_str(text).map_err(|e| GlossaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a manifest, rebasing relative paths on its directory.
    pub fn from_path(path: &Path) -> Result<Self, GlossaError> {
        let size = std::fs::metadata(path)
            .map_err(|e| GlossaError::Io(format!("Cannot read manifest '{}': {}", path.display(), e)))?
            .len();
        if size > MAX_CONFIG_FILE_SIZE {
            return Err(GlossaError::Config(format!(
                "Manifest size {} bytes exceeds maximum allowed {} bytes",
                size, MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::parse(&text)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.rebased(base))
    }

    /// Reject manifests that cannot produce a build.
    pub fn validate(&self) -> Result<(), GlossaError> {
        if self.sources.is_empty() {
            return Err(GlossaError::Config(
                "manifest lists no [[sources]]".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(GlossaError::Config("source name must not be empty".to_string()));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(GlossaError::Config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }

        self.snapshot_format()?;
        Ok(())
    }

    /// The configured format, if any.
    pub fn snapshot_format(&self) -> Result<Option<SnapshotFormat>, GlossaError> {
        self.format
            .as_deref()
            .map(str::parse::<SnapshotFormat>)
            .transpose()
    }

    /// Make every relative path relative to `base`.
    #[must_use]
    pub fn rebased(mut self, base: &Path) -> Self {
        let rebase = |p: &Path| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.to_path_buf()
            }
        };
        self.output = rebase(&self.output);
        self.conflicts = self.conflicts.as_deref().map(rebase);
        self.names = self.names.as_deref().map(rebase);
        for source in &mut self.sources {
            source.path = rebase(&source.path);
        }
        self
    }

    /// A pipeline importing every source in manifest order.
    #[must_use]
    pub fn pipeline(&self) -> BuildPipeline {
        self.sources
            .iter()
            .fold(BuildPipeline::new(), |pipeline, source| {
                let importer = RecordImporter::new(DataSource::new(&source.name, source.priority));
                pipeline.source(importer, &source.path)
            })
    }
}

// =============================================================================
// TESTS
// =============================================================================
