//! Entity module - Contains the SeaORM entity definitions for the database.
//! The document store keeps every collection in a single `documents` table.

pub mod document;

pub use document::{Column as DocumentColumn, Entity as Document, Model as DocumentModel};
