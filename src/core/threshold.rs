//! Threshold evaluator - the group status state machine.
//!
//! Pure and total: the same inputs always produce the same status, so the
//! controller can re-evaluate after a retried write without side effects.

use crate::models::group::{GroupBuy, GroupStatus};
use chrono::{DateTime, Utc};

/// The inputs the state machine looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdInput {
    pub status: GroupStatus,
    pub current_participants: u32,
    pub min_participants: u32,
    pub max_participants: u32,
    pub end_date: DateTime<Utc>,
}

impl From<&GroupBuy> for ThresholdInput {
    fn from(group: &GroupBuy) -> Self {
        Self {
            status: group.status,
            current_participants: group.current_participants(),
            min_participants: group.min_participants,
            max_participants: group.max_participants,
            end_date: group.end_date,
        }
    }
}

/// Next status for the given inputs, evaluated in precedence order:
///
/// 1. `cancelled` is final.
/// 2. An open group that reached `min_participants` completes, even past its
///    deadline.
/// 3. An open group past `end_date` expires.
/// 4. A pending group with at least one participant becomes active.
/// 5. Otherwise the status is unchanged.
#[must_use]
pub fn next_status(input: ThresholdInput, now: DateTime<Utc>) -> GroupStatus {
    let ThresholdInput {
        status,
        current_participants,
        min_participants,
        end_date,
        ..
    } = input;

    if status == GroupStatus::Cancelled {
        return GroupStatus::Cancelled;
    }
    if status.is_open() && current_participants >= min_participants {
        return GroupStatus::Completed;
    }
    if status.is_open() && now > end_date {
        return GroupStatus::Expired;
    }
    if status == GroupStatus::Pending && current_participants > 0 {
        return GroupStatus::Active;
    }
    status
}

/// [`next_status`] for a whole group.
#[must_use]
pub fn evaluate(group: &GroupBuy, now: DateTime<Utc>) -> GroupStatus {
    next_status(ThresholdInput::from(group), now)
}

/// Fraction of the threshold reached, clamped to `0..=100`.
#[must_use]
pub fn threshold_progress(group: &GroupBuy) -> f64 {
    if group.min_participants == 0 {
        return 100.0;
    }
    let progress =
        f64::from(group.current_participants()) / f64::from(group.min_participants) * 100.0;
    progress.clamp(0.0, 100.0)
}
