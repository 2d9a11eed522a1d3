//! Atomic read-modify-write of typed records over a [`DocumentStore`].
//!
//! Every controller write goes through [`update_record`]: read the document
//! and its version, apply the change in memory, and write back only if the
//! version is unchanged. A lost race re-reads and re-applies, so checks such
//! as "group is not full" are always made against the state being replaced.

use crate::{
    errors::{Error, Result},
    models::{group::GroupBuy, group::GROUPS_COLLECTION, order::ORDERS_COLLECTION, order::Order},
    store::{Document, DocumentStore},
};
use serde_json::Value;
use std::future::Future;
use tracing::{debug, error, warn};

/// A typed document living in a fixed collection.
pub trait Record: Clone + PartialEq + Sized {
    const COLLECTION: &'static str;

    fn from_document(document: &Document) -> Result<Self>;

    fn to_document_data(&self) -> Result<Value>;
}

impl Record for GroupBuy {
    const COLLECTION: &'static str = GROUPS_COLLECTION;

    fn from_document(document: &Document) -> Result<Self> {
        Self::from_document(document)
    }

    fn to_document_data(&self) -> Result<Value> {
        Self::to_document_data(self)
    }
}

impl Record for Order {
    const COLLECTION: &'static str = ORDERS_COLLECTION;

    fn from_document(document: &Document) -> Result<Self> {
        let mut order: Self = serde_json::from_value(document.data.clone())?;
        order.id.clone_from(&document.id);
        Ok(order)
    }

    fn to_document_data(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Into::into)
    }
}

/// Result of a successful [`update_record`].
#[derive(Debug, Clone)]
pub struct Updated<T, R> {
    pub before: T,
    pub after: T,
    pub outcome: R,
    /// Whether anything was written
    pub written: bool,
}

/// Runs a store call, retrying once if it fails with a transient error.
pub async fn retry_transient<T, F, Fut>(operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match call().await {
        Err(e) if e.is_transient() => {
            warn!(operation, error = %e, "Transient store failure, retrying once");
            call()
                .await
                .inspect_err(|e| error!(operation, error = %e, "Store call failed after retry"))
        }
        other => other,
    }
}

/// Loads one record, `NotFound` if it does not exist.
pub async fn load_record<T, S>(store: &S, id: &str) -> Result<(T, i64)>
where
    T: Record,
    S: DocumentStore + ?Sized,
{
    let document = retry_transient("read", || store.get_document(T::COLLECTION, id))
        .await?
        .ok_or_else(|| Error::NotFound {
            collection: T::COLLECTION.to_string(),
            id: id.to_string(),
        })?;
    Ok((T::from_document(&document)?, document.version))
}

/// Applies `apply` to the stored record atomically.
///
/// `apply` may run more than once if other writers interfere; an error from
/// it aborts without writing. Unchanged records are not written.
///
/// # Errors
/// `NotFound`, any error returned by `apply`, store errors, or `Conflict`
/// once `max_attempts` version races have been lost.
pub async fn update_record<T, S, R, F>(
    store: &S,
    id: &str,
    max_attempts: u32,
    mut apply: F,
) -> Result<Updated<T, R>>
where
    T: Record,
    S: DocumentStore + ?Sized,
    F: FnMut(&mut T) -> Result<R>,
{
    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        let (before, version) = load_record::<T, S>(store, id).await?;
        let mut after = before.clone();
        let outcome = apply(&mut after)?;

        if after == before {
            return Ok(Updated {
                before,
                after,
                outcome,
                written: false,
            });
        }

        let data = after.to_document_data()?;
        let applied = retry_transient("conditional write", || {
            store.mutate_document_if(T::COLLECTION, id, version, data.clone())
        })
        .await?;

        if applied {
            return Ok(Updated {
                before,
                after,
                outcome,
                written: true,
            });
        }
        debug!(collection = T::COLLECTION, id, attempt, "Version conflict, re-reading");
    }

    warn!(collection = T::COLLECTION, id, attempts, "Giving up after repeated version conflicts");
    Err(Error::Conflict {
        collection: T::COLLECTION.to_string(),
        id: id.to_string(),
        attempts,
    })
}
