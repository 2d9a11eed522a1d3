//! Notification records and per-user delivery preferences.
//!
//! Only the data shape lives here; delivery belongs to an external collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OrderStatus,
    InventoryAlert,
    PaymentReceived,
    GroupComplete,
    NewMessage,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Which notification types a user wants, per type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(clippy::struct_excessive_bools)]
pub struct NotificationTypes {
    pub order_status: bool,
    pub inventory_alert: bool,
    pub payment_received: bool,
    pub group_complete: bool,
    pub new_message: bool,
    pub system: bool,
}

impl Default for NotificationTypes {
    fn default() -> Self {
        Self {
            order_status: true,
            inventory_alert: true,
            payment_received: true,
            group_complete: true,
            new_message: true,
            system: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub in_app: bool,
    #[serde(default)]
    pub types: NotificationTypes,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            push: false,
            in_app: true,
            types: NotificationTypes::default(),
        }
    }
}

impl NotificationPreferences {
    /// Whether notifications of this type should reach the user at all.
    #[must_use]
    pub const fn allows(&self, kind: NotificationType) -> bool {
        if !(self.email || self.push || self.in_app) {
            return false;
        }
        match kind {
            NotificationType::OrderStatus => self.types.order_status,
            NotificationType::InventoryAlert => self.types.inventory_alert,
            NotificationType::PaymentReceived => self.types.payment_received,
            NotificationType::GroupComplete => self.types.group_complete,
            NotificationType::NewMessage => self.types.new_message,
            NotificationType::System => self.types.system,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferences_filter_by_type() {
        let mut prefs = NotificationPreferences::default();
        assert!(prefs.allows(NotificationType::GroupComplete));

        prefs.types.group_complete = false;
        assert!(!prefs.allows(NotificationType::GroupComplete));
        assert!(prefs.allows(NotificationType::System));
    }

    #[test]
    fn test_all_channels_off_blocks_everything() {
        let prefs = NotificationPreferences {
            email: false,
            push: false,
            in_app: false,
            types: NotificationTypes::default(),
        };
        assert!(!prefs.allows(NotificationType::System));
    }

    #[test]
    fn test_type_field_name() {
        let json = serde_json::json!({
            "type": "group_complete",
            "title": "t",
            "message": "m",
            "createdAt": "2026-01-01T00:00:00Z"
        });
        let parsed: Result<Notification, _> = serde_json::from_value(json);
        assert!(matches!(parsed, Ok(n) if n.kind == NotificationType::GroupComplete && !n.read));
    }
}
