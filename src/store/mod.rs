//! Document store abstraction.
//!
//! The core treats its backend as a set of named collections holding JSON
//! documents. Every document carries a store-managed `version` that increments
//! on each write; `mutate_document_if` uses it to provide an atomic
//! read-modify-write so concurrent joins can never lose an update.
//!
//! Two backends are provided: [`MemoryStore`] and the `SeaORM`-backed
//! [`SeaOrmStore`].

pub mod database;
pub mod memory;

pub use database::SeaOrmStore;
pub use memory::MemoryStore;

use crate::errors::{Error, FieldError, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use std::{cmp::Ordering, sync::Arc};

/// A stored document: id, version and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Store-assigned identifier
    pub id: String,
    /// Monotonic write counter, starts at 1
    pub version: i64,
    /// Document body (always a JSON object)
    pub data: Value,
}

/// Comparison applied to one top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    field: String,
    condition: Condition,
}

/// Conjunction of field conditions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            condition,
        });
        self
    }

    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    #[must_use]
    pub fn one_of<V: Into<Value>>(self, field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.with(field, Condition::In(values))
    }

    /// Whether a document body satisfies every clause.
    #[must_use]
    pub fn matches(&self, data: &Value) -> bool {
        self.clauses.iter().all(|clause| {
            let Some(actual) = data.get(&clause.field) else {
                return matches!(clause.condition, Condition::Ne(_));
            };
            match &clause.condition {
                Condition::Eq(expected) => actual == expected,
                Condition::Ne(expected) => actual != expected,
                Condition::In(options) => options.contains(actual),
                Condition::Gt(bound) => compare_values(actual, bound) == Some(Ordering::Greater),
                Condition::Gte(bound) => matches!(
                    compare_values(actual, bound),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
                Condition::Lt(bound) => compare_values(actual, bound) == Some(Ordering::Less),
                Condition::Lte(bound) => matches!(
                    compare_values(actual, bound),
                    Some(Ordering::Less | Ordering::Equal)
                ),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Result ordering on one top-level field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Orders two JSON scalars of the same kind. Two RFC 3339 strings compare as
/// instants; fractional seconds and offsets make their text order unreliable.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Stable sort of documents by one field; documents missing the field go last.
pub fn sort_documents(documents: &mut [Document], order: &OrderBy) {
    documents.sort_by(|a, b| {
        let ordering = match (a.data.get(&order.field), b.data.get(&order.field)) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match order.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

/// Shallow merge: top-level patch fields replace the target's.
pub fn merge_patch(target: &mut Value, patch: Value) -> Result<()> {
    let (Value::Object(target), Value::Object(patch)) = (target, patch) else {
        return Err(Error::Validation {
            errors: vec![FieldError::new("patch", "documents and patches must be JSON objects")],
        });
    };
    for (key, value) in patch {
        target.insert(key, value);
    }
    Ok(())
}

/// The backend contract consumed by the controllers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents in `collection` matching `filter`, optionally ordered.
    async fn query_collection(
        &self,
        collection: &str,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>>;

    /// A single document by id.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Stores a new document and returns its generated id.
    async fn create_document(&self, collection: &str, data: Value) -> Result<String>;

    /// Unconditional shallow merge of `patch` into the document.
    async fn mutate_document(&self, collection: &str, id: &str, patch: Value) -> Result<()>;

    /// Shallow merge applied only if the stored version still equals
    /// `expected_version`. Returns `false` when another writer got there first.
    async fn mutate_document_if(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        patch: Value,
    ) -> Result<bool>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn query_collection(
        &self,
        collection: &str,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        (**self).query_collection(collection, filter, order).await
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        (**self).get_document(collection, id).await
    }

    async fn create_document(&self, collection: &str, data: Value) -> Result<String> {
        (**self).create_document(collection, data).await
    }

    async fn mutate_document(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        (**self).mutate_document(collection, id, patch).await
    }

    async fn mutate_document_if(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        patch: Value,
    ) -> Result<bool> {
        (**self)
            .mutate_document_if(collection, id, expected_version, patch)
            .await
    }
}
