//! # Build Pipeline
//!
//! Import -> merge -> validate, in declared source order.
//!
//! Importers run one at a time against a single shared resolver, so the
//! resolver is the only writer of identity during a build. Merge priorities
//! come from each importer's [`DataSource`].

use crate::database::Database;
use crate::entity_set::{DataSource, EntitySet};
use crate::graph::Store;
use crate::merge::{MergeConflict, merge};
use crate::resolver::EntityResolver;
use crate::storage::{NameEntry, merge_name_entries, resolve_locales};
use crate::types::{CanonicalId, GlossaError};
use crate::validation::{DataValidator, ValidationReport};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// A producer of one source's entity set.
pub trait Importer {
    /// Name and merge priority of the source.
    fn source(&self) -> DataSource;

    /// Read `path` and describe its entities, registering identity in `resolver`.
    fn import(&mut self, resolver: &mut EntityResolver, path: &Path) -> Result<EntitySet, GlossaError>;

    /// Multilingual names gathered by the last `import`.
    fn take_names(&mut self) -> BTreeMap<CanonicalId, Vec<NameEntry>> {
        BTreeMap::new()
    }
}

/// Everything a build produces.
#[derive(Debug)]
pub struct BuildOutput {
    pub store: Store,
    pub resolver: EntityResolver,
    pub conflicts: Vec<MergeConflict>,
    pub report: ValidationReport,
    /// Merged names keyed by surviving canonical id, locales resolved.
    pub names: BTreeMap<CanonicalId, Vec<NameEntry>>,
    pub relations_added: usize,
    pub relations_skipped: usize,
}

impl BuildOutput {
    /// Turn the build result into a queryable database (names not attached).
    #[must_use]
    pub fn into_database(self) -> Database {
        Database::new(self.store, self.resolver)
    }
}

/// Ordered list of sources to build from.
pub struct BuildPipeline {
    sources: Vec<(Box<dyn Importer>, PathBuf)>,
    resolver: EntityResolver,
}

impl std::fmt::Debug for BuildPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.sources.iter().map(|(i, _)| i.source().name).collect();
        f.debug_struct("BuildPipeline")
            .field("sources", &names)
            .finish_non_exhaustive()
    }
}

impl Default for BuildPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(EntityResolver::new())
    }

    /// Start from an existing resolver, keeping its canonical ids stable.
    #[must_use]
    pub fn with_resolver(resolver: EntityResolver) -> Self {
        Self {
            sources: Vec::new(),
            resolver,
        }
    }

    /// Append a source. Sources are imported in the order they are added.
    #[must_use]
    pub fn source(mut self, importer: impl Importer + 'static, path: impl Into<PathBuf>) -> Self {
        self.sources.push((Box::new(importer), path.into()));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Run every importer, merge, and validate.
    pub fn run(self) -> Result<BuildOutput, GlossaError> {
        let Self {
            sources,
            mut resolver,
        } = self;
        if sources.is_empty() {
            return Err(GlossaError::Config("no sources to build from".to_string()));
        }

        let mut sets = Vec::with_capacity(sources.len());
        let mut name_sources = Vec::new();
        for (mut importer, path) in sources {
            let source = importer.source();
            info!(source = %source.name, priority = source.priority, path = %path.display(), "Importing source");
            let set = importer.import(&mut resolver, &path)?;
            name_sources.push(importer.take_names());
            sets.push((source, set));
        }

        let outcome = merge(&sets, &resolver);

        // Name maps were keyed before later fusions; move them onto survivors.
        let redirected = name_sources.into_iter().map(|names| {
            let mut moved: BTreeMap<CanonicalId, Vec<NameEntry>> = BTreeMap::new();
            for (id, entries) in names {
                moved
                    .entry(resolver.canonical(&id).clone())
                    .or_default()
                    .extend(entries);
            }
            moved
        });
        let mut names = merge_name_entries(redirected.collect::<Vec<_>>());
        resolve_locales(&mut names, &resolver);

        let report = DataValidator::new(&outcome.store, &resolver).validate_all();

        info!(
            entities = outcome.store.len(),
            conflicts = outcome.conflicts.len(),
            languoids_with_names = names.len(),
            "Build finished"
        );

        Ok(BuildOutput {
            store: outcome.store,
            resolver,
            conflicts: outcome.conflicts,
            report,
            names,
            relations_added: outcome.relations_added,
            relations_skipped: outcome.relations_skipped,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
