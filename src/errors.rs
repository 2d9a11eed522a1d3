//! Unified error type for the group-buy core.
//!
//! Variants fall into three families: user-correctable validation failures,
//! business-rule violations (never retried), and transient/environmental
//! failures coming from the document store (eligible for a single retry).

use crate::models::group::GroupStatus;
use crate::models::order::OrderStatus;
use serde::Serialize;
use thiserror::Error;

/// A single field-level validation failure, surfaced inline on forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Name of the offending field (document naming, e.g. `minParticipants`)
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed: {}", format_field_errors(.errors))]
    Validation { errors: Vec<FieldError> },

    #[error("Group {group_id} is full ({max_participants} participants)")]
    CapacityExceeded {
        group_id: String,
        max_participants: u32,
    },

    #[error("User {user_id} already joined group {group_id}")]
    DuplicateParticipant { group_id: String, user_id: String },

    #[error("Group {group_id} is {status} and no longer accepts participants")]
    GroupClosed {
        group_id: String,
        status: GroupStatus,
    },

    #[error("Group {group_id} is {status} and can no longer be modified")]
    ImmutableState {
        group_id: String,
        status: GroupStatus,
    },

    #[error("Document {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("User {user_id} is not a participant of group {group_id}")]
    ParticipantNotFound { group_id: String, user_id: String },

    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Concurrent updates to {collection}/{id} did not settle after {attempts} attempts")]
    Conflict {
        collection: String,
        id: String,
        attempts: u32,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Store failures worth one automatic retry before surfacing a generic notice.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::PermissionDenied { .. })
    }

    /// Business-rule violations shown to the user as a single message.
    #[must_use]
    pub const fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. }
                | Self::DuplicateParticipant { .. }
                | Self::GroupClosed { .. }
                | Self::ImmutableState { .. }
                | Self::InvalidTransition { .. }
        )
    }

    /// Field errors carried by a validation failure, empty for every other variant.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { errors } => errors,
            _ => &[],
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(value: sea_orm::DbErr) -> Self {
        match value {
            sea_orm::DbErr::ConnectionAcquire(e) => Self::Network {
                message: e.to_string(),
            },
            sea_orm::DbErr::Conn(e) => Self::Network {
                message: e.to_string(),
            },
            other => Self::Database {
                message: other.to_string(),
            },
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
