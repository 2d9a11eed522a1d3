//! Group-buy campaign model.
//!
//! A `GroupBuy` is persisted as a JSON document in the `groups` collection.
//! The participant count is derived from the participant sequence; the
//! `currentParticipants` field written to documents is a read-only mirror for
//! readers and is ignored when a document is loaded back.

use crate::{errors::Result, store::Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Collection holding group-buy documents.
pub const GROUPS_COLLECTION: &str = "groups";

/// Lifecycle status of a group-buy campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// Waiting for the first participant
    Pending,
    /// Accepting participants
    Active,
    /// Required participants reached
    Completed,
    /// Deadline passed without reaching the threshold
    Expired,
    /// Cancelled by the seller
    Cancelled,
}

impl GroupStatus {
    /// Open groups accept participants and edits.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !self.is_open()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state of a single participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantPayment {
    #[default]
    Pending,
    Paid,
}

/// A join event, owned by its parent group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Joining user
    pub user_id: String,
    /// Display name at join time
    pub name: String,
    /// When the user joined
    pub joined_at: DateTime<Utc>,
    /// Payment state
    #[serde(default)]
    pub payment_status: ParticipantPayment,
}

impl Participant {
    /// Creates a participant with a pending payment.
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, joined_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            joined_at,
            payment_status: ParticipantPayment::Pending,
        }
    }
}

/// Seller input for a new campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupBuyData {
    pub product_id: String,
    pub title: String,
    pub description: String,
    pub original_price: f64,
    pub group_price: f64,
    pub min_participants: u32,
    pub max_participants: u32,
    pub end_date: DateTime<Utc>,
}

/// Seller-editable fields, applied only while the group is open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_price: Option<f64>,
}

impl GroupPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.original_price.is_none()
            && self.group_price.is_none()
    }
}

/// A collective-purchase campaign for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBuy {
    /// Document id, carried outside the document body
    #[serde(skip)]
    pub id: String,
    pub product_id: String,
    pub seller_id: String,
    pub title: String,
    pub description: String,
    pub original_price: f64,
    pub group_price: f64,
    pub min_participants: u32,
    pub max_participants: u32,
    #[serde(default)]
    pub(crate) participants: Vec<Participant>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupBuy {
    /// Builds a fresh pending campaign. The id is assigned once the store accepts it.
    #[must_use]
    pub fn new(seller_id: impl Into<String>, data: CreateGroupBuyData, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            product_id: data.product_id,
            seller_id: seller_id.into(),
            title: data.title.trim().to_string(),
            description: data.description,
            original_price: data.original_price,
            group_price: data.group_price,
            min_participants: data.min_participants,
            max_participants: data.max_participants,
            participants: Vec::new(),
            start_date: now,
            end_date: data.end_date,
            status: GroupStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Participants in join order.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Derived participant count.
    #[must_use]
    pub fn current_participants(&self) -> u32 {
        u32::try_from(self.participants.len()).unwrap_or(u32::MAX)
    }

    /// Free slots before the group is full.
    #[must_use]
    pub fn remaining_slots(&self) -> u32 {
        self.max_participants
            .saturating_sub(self.current_participants())
    }

    #[must_use]
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    /// Discount granted by the group price, as a percentage of the original price.
    #[must_use]
    pub fn discount_percent(&self) -> f64 {
        if self.original_price <= 0.0 {
            return 0.0;
        }
        ((self.original_price - self.group_price) / self.original_price) * 100.0
    }

    /// Loads a group from its stored document.
    pub fn from_document(document: &Document) -> Result<Self> {
        let mut group: Self = serde_json::from_value(document.data.clone())?;
        group.id.clone_from(&document.id);
        Ok(group)
    }

    /// Serialises the group body, including the derived `currentParticipants` mirror.
    pub fn to_document_data(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "currentParticipants".to_string(),
                Value::from(self.current_participants()),
            );
        }
        Ok(value)
    }
}
