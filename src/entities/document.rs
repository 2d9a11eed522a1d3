//! Document entity - Backing table for the `SeaORM` document store.
//!
//! Every collection shares this table. The JSON body is kept as text and the
//! `version` column drives the optimistic-concurrency check on writes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stored document row
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    /// Generated document id (UUID v4)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Logical collection name (e.g. `"groups"`, `"orders"`)
    pub collection: String,
    /// JSON body of the document
    #[sea_orm(column_type = "Text")]
    pub data: String,
    /// Write counter, incremented on every mutation
    pub version: i64,
    /// When the document was created
    pub created_at: DateTimeUtc,
    /// When the document was last written
    pub updated_at: DateTimeUtc,
}

/// Documents have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
