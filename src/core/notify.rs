//! Group notifications - fire-and-forget signals emitted after successful writes.
//!
//! Delivery is someone else's problem: the controller hands events to a
//! [`Notifier`] and moves on. [`BroadcastNotifier`] fans events out to
//! in-process subscribers over a tokio broadcast channel.

use crate::models::{
    group::{GroupBuy, GroupStatus},
    notification::{Notification, NotificationType},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

const CHANNEL_CAPACITY: usize = 100;

/// Something noteworthy happened to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GroupEvent {
    ParticipantJoined {
        group_id: String,
        user_id: String,
        current_participants: u32,
    },
    /// Only a few slots are left in an open group
    CapacityWarning {
        group_id: String,
        remaining_slots: u32,
    },
    GroupCompleted {
        group_id: String,
        seller_id: String,
        title: String,
        participants: u32,
    },
    GroupExpired {
        group_id: String,
        seller_id: String,
        title: String,
    },
    GroupCancelled {
        group_id: String,
        seller_id: String,
        title: String,
    },
}

impl GroupEvent {
    #[must_use]
    pub fn group_id(&self) -> &str {
        match self {
            Self::ParticipantJoined { group_id, .. }
            | Self::CapacityWarning { group_id, .. }
            | Self::GroupCompleted { group_id, .. }
            | Self::GroupExpired { group_id, .. }
            | Self::GroupCancelled { group_id, .. } => group_id,
        }
    }

    /// Notification record for the seller, in the shape the notification
    /// collaborator stores.
    #[must_use]
    pub fn to_notification(&self, now: DateTime<Utc>) -> Notification {
        let (kind, title, message) = match self {
            Self::ParticipantJoined {
                current_participants,
                ..
            } => (
                NotificationType::System,
                "New participant".to_string(),
                format!("A buyer joined your group ({current_participants} so far)"),
            ),
            Self::CapacityWarning {
                remaining_slots, ..
            } => (
                NotificationType::InventoryAlert,
                "Group almost full".to_string(),
                format!("Only {remaining_slots} slot(s) left"),
            ),
            Self::GroupCompleted {
                title,
                participants,
                ..
            } => (
                NotificationType::GroupComplete,
                "Group completed".to_string(),
                format!("\"{title}\" reached its goal with {participants} participants"),
            ),
            Self::GroupExpired { title, .. } => (
                NotificationType::System,
                "Group expired".to_string(),
                format!("\"{title}\" ended before reaching its goal"),
            ),
            Self::GroupCancelled { title, .. } => (
                NotificationType::System,
                "Group cancelled".to_string(),
                format!("\"{title}\" was cancelled"),
            ),
        };

        Notification {
            id: String::new(),
            kind,
            title,
            message,
            read: false,
            data: serde_json::to_value(self).ok(),
            created_at: now,
        }
    }
}

/// Events implied by a successful write that moved `before` to `after`.
#[must_use]
pub fn events_for_transition(
    before: &GroupBuy,
    after: &GroupBuy,
    capacity_warning_remaining: u32,
) -> Vec<GroupEvent> {
    let mut events = Vec::new();

    if let Some(joined) = after
        .participants()
        .last()
        .filter(|_| after.current_participants() > before.current_participants())
    {
        events.push(GroupEvent::ParticipantJoined {
            group_id: after.id.clone(),
            user_id: joined.user_id.clone(),
            current_participants: after.current_participants(),
        });
    }

    if before.status != after.status {
        match after.status {
            GroupStatus::Completed => events.push(GroupEvent::GroupCompleted {
                group_id: after.id.clone(),
                seller_id: after.seller_id.clone(),
                title: after.title.clone(),
                participants: after.current_participants(),
            }),
            GroupStatus::Expired => events.push(GroupEvent::GroupExpired {
                group_id: after.id.clone(),
                seller_id: after.seller_id.clone(),
                title: after.title.clone(),
            }),
            GroupStatus::Cancelled => events.push(GroupEvent::GroupCancelled {
                group_id: after.id.clone(),
                seller_id: after.seller_id.clone(),
                title: after.title.clone(),
            }),
            GroupStatus::Pending | GroupStatus::Active => {}
        }
    }

    let remaining = after.remaining_slots();
    if after.status.is_open()
        && remaining < before.remaining_slots()
        && remaining <= capacity_warning_remaining
    {
        events.push(GroupEvent::CapacityWarning {
            group_id: after.id.clone(),
            remaining_slots: remaining,
        });
    }

    events
}

/// Receiver of group events. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: GroupEvent);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, event: GroupEvent) {
        (**self).notify(event);
    }
}

/// Drops every event after logging it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, event: GroupEvent) {
        trace!(?event, "notification dropped");
    }
}

/// In-process fan-out over a tokio broadcast channel.
///
/// Subscribers that fall behind by more than the channel capacity lose the
/// oldest events; they should re-fetch the group instead.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<GroupEvent>,
}

impl BroadcastNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GroupEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: GroupEvent) {
        debug!(group_id = event.group_id(), ?event, "Publishing group event");
        // No receivers is fine
        if self.sender.send(event).is_err() {
            trace!("no notification subscribers");
        }
    }
}
