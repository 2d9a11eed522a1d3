//! `SeaORM`-backed document store.
//!
//! Collections share the `documents` table. Filtering and ordering on JSON
//! fields happen in Rust after the collection is loaded; the conditional write
//! is a single `UPDATE ... WHERE id = ? AND version = ?` so concurrent writers
//! cannot overwrite each other.

use super::{Document, DocumentStore, Filter, OrderBy, merge_patch, sort_documents};
use crate::{
    config::database::{create_connection, create_tables},
    entities::{Document as DocumentEntity, document},
    errors::{Error, Result},
};
use async_trait::async_trait;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde_json::Value;
use tracing::{debug, trace};

/// Document store over any `SeaORM` connection (`SQLite` by default).
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    /// Wraps an existing connection. Tables must already exist.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connects to `database_url` and creates the `documents` table if needed.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = create_connection(database_url).await?;
        create_tables(&db).await?;
        debug!("Document store ready");
        Ok(Self::new(db))
    }

    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn find_row(&self, collection: &str, id: &str) -> Result<Option<document::Model>> {
        DocumentEntity::find_by_id(id.to_string())
            .filter(document::Column::Collection.eq(collection))
            .one(&self.db)
            .await
            .map_err(Into::into)
    }
}

fn to_document(row: &document::Model) -> Result<Document> {
    Ok(Document {
        id: row.id.clone(),
        version: row.version,
        data: serde_json::from_str(&row.data)?,
    })
}

fn not_found(collection: &str, id: &str) -> Error {
    Error::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl DocumentStore for SeaOrmStore {
    async fn query_collection(
        &self,
        collection: &str,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        let rows = DocumentEntity::find()
            .filter(document::Column::Collection.eq(collection))
            .order_by_asc(document::Column::CreatedAt)
            .order_by_asc(document::Column::Id)
            .all(&self.db)
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            let doc = to_document(row)?;
            if filter.matches(&doc.data) {
                documents.push(doc);
            }
        }
        if let Some(order) = order {
            sort_documents(&mut documents, order);
        }
        trace!(collection, scanned = rows.len(), matched = documents.len(), "sql query");
        Ok(documents)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.find_row(collection, id)
            .await?
            .as_ref()
            .map(to_document)
            .transpose()
    }

    async fn create_document(&self, collection: &str, data: Value) -> Result<String> {
        let mut body = Value::Object(serde_json::Map::new());
        merge_patch(&mut body, data)?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now();
        let row = document::ActiveModel {
            id: Set(id.clone()),
            collection: Set(collection.to_string()),
            data: Set(serde_json::to_string(&body)?),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };
        row.insert(&self.db).await?;
        debug!(collection, %id, "Document created");
        Ok(id)
    }

    async fn mutate_document(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        // Use a transaction so the merge sees the row it overwrites
        let txn = self.db.begin().await?;

        let row = DocumentEntity::find_by_id(id.to_string())
            .filter(document::Column::Collection.eq(collection))
            .one(&txn)
            .await?
            .ok_or_else(|| not_found(collection, id))?;

        let mut data: Value = serde_json::from_str(&row.data)?;
        merge_patch(&mut data, patch)?;

        let version = row.version;
        let mut active: document::ActiveModel = row.into();
        active.data = Set(serde_json::to_string(&data)?);
        active.version = Set(version + 1);
        active.updated_at = Set(chrono::Utc::now());
        active.update(&txn).await?;

        txn.commit().await?;
        debug!(collection, id, version = version + 1, "Document mutated");
        Ok(())
    }

    async fn mutate_document_if(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        patch: Value,
    ) -> Result<bool> {
        let row = self
            .find_row(collection, id)
            .await?
            .ok_or_else(|| not_found(collection, id))?;

        if row.version != expected_version {
            trace!(collection, id, expected_version, actual = row.version, "sql version mismatch");
            return Ok(false);
        }

        let mut data: Value = serde_json::from_str(&row.data)?;
        merge_patch(&mut data, patch)?;

        // Atomic compare-and-swap: only succeeds if nobody wrote since our read
        let result = DocumentEntity::update_many()
            .col_expr(document::Column::Data, Expr::value(serde_json::to_string(&data)?))
            .col_expr(document::Column::Version, Expr::value(expected_version + 1))
            .col_expr(document::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(document::Column::Id.eq(id))
            .filter(document::Column::Collection.eq(collection))
            .filter(document::Column::Version.eq(expected_version))
            .exec(&self.db)
            .await?;

        let applied = result.rows_affected == 1;
        trace!(collection, id, expected_version, applied, "conditional write");
        Ok(applied)
    }
}
