//! # Query Module
//!
//! Structured predicate queries over the store.
//!
//! - Filters address declared fields by name and are ANDed
//! - An empty field never reaches a predicate: the entity is excluded
//! - Evaluation order is store order, so results are deterministic

use crate::types::{Entity, EntityKind, FieldValue};
use std::fmt;
use std::sync::Arc;

/// Predicate over one field value.
pub type Predicate = Arc<dyn Fn(&FieldValue) -> bool + Send + Sync>;

/// A filter on one named field.
#[derive(Clone)]
pub enum Filter {
    /// Field value must equal this value.
    Equals(FieldValue),
    /// Field value must satisfy this predicate.
    Matches(Predicate),
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Equals(v) => f.debug_tuple("Equals").field(v).finish(),
            Filter::Matches(_) => f.write_str("Matches(<predicate>)"),
        }
    }
}

impl Filter {
    fn accepts(&self, value: &FieldValue) -> bool {
        match self {
            Filter::Equals(expected) => value == expected,
            Filter::Matches(predicate) => predicate(value),
        }
    }
}

/// A structured query: an optional kind plus ANDed field filters.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Restrict to one entity kind; `None` scans every entity.
    pub kind: Option<EntityKind>,
    /// `(field name, filter)` pairs, all of which must hold.
    pub filters: Vec<(String, Filter)>,
}

impl Query {
    /// A query over every entity with no filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A query restricted to one kind.
    #[must_use]
    pub fn of(kind: EntityKind) -> Self {
        Self {
            kind: Some(kind),
            filters: Vec::new(),
        }
    }

    /// Require `field == value`.
    #[must_use]
    pub fn eq(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filters
            .push((field.to_string(), Filter::Equals(value.into())));
        self
    }

    /// Require `predicate(field)`; entities with an empty field are excluded.
    #[must_use]
    pub fn matches<F>(mut self, field: &str, predicate: F) -> Self
    where
        F: Fn(&FieldValue) -> bool + Send + Sync + 'static,
    {
        self.filters
            .push((field.to_string(), Filter::Matches(Arc::new(predicate))));
        self
    }

    /// Whether an entity satisfies the kind restriction and every filter.
    #[must_use]
    pub fn accepts(&self, entity: &Entity) -> bool {
        if let Some(kind) = self.kind {
            if entity.kind() != kind {
                return false;
            }
        }
        self.filters
            .iter()
            .all(|(name, filter)| match entity.field(name) {
                Some(value) => filter.accepts(&value),
                None => false,
            })
    }
}

// =============================================================================
// TESTS
// =============================================================================
