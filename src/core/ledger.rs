//! Participant ledger - who has joined a group, in join order.
//!
//! The participant count is always the length of the sequence; there is no
//! separate counter to drift out of sync. These functions only touch the
//! in-memory group; persisting the result is the controller's job.

use crate::{
    errors::{Error, Result},
    models::group::{GroupBuy, Participant, ParticipantPayment},
};

/// Appends `participant` to the group.
///
/// # Errors
/// - `CapacityExceeded` if the group already holds `max_participants`
/// - `DuplicateParticipant` if the user already joined
///
/// On error the group is left untouched.
pub fn join(group: &mut GroupBuy, participant: Participant) -> Result<()> {
    ensure_capacity(group)?;

    if group.has_participant(&participant.user_id) {
        return Err(Error::DuplicateParticipant {
            group_id: group.id.clone(),
            user_id: participant.user_id,
        });
    }

    group.participants.push(participant);
    Ok(())
}

/// `CapacityExceeded` once the group holds `max_participants`, whatever its status.
pub fn ensure_capacity(group: &GroupBuy) -> Result<()> {
    if group.current_participants() >= group.max_participants {
        return Err(Error::CapacityExceeded {
            group_id: group.id.clone(),
            max_participants: group.max_participants,
        });
    }
    Ok(())
}

/// Removes a participant, keeping the order of everyone else.
///
/// # Errors
/// `ParticipantNotFound` if the user is not in the group.
pub fn remove(group: &mut GroupBuy, user_id: &str) -> Result<Participant> {
    let position = group
        .participants
        .iter()
        .position(|p| p.user_id == user_id)
        .ok_or_else(|| Error::ParticipantNotFound {
            group_id: group.id.clone(),
            user_id: user_id.to_string(),
        })?;

    Ok(group.participants.remove(position))
}

/// Records a participant's payment.
///
/// # Errors
/// `ParticipantNotFound` if the user is not in the group.
pub fn mark_paid(group: &mut GroupBuy, user_id: &str) -> Result<()> {
    let group_id = group.id.clone();
    let participant = group
        .participants
        .iter_mut()
        .find(|p| p.user_id == user_id)
        .ok_or_else(|| Error::ParticipantNotFound {
            group_id,
            user_id: user_id.to_string(),
        })?;

    participant.payment_status = ParticipantPayment::Paid;
    Ok(())
}

/// Number of participants who have paid.
#[must_use]
pub fn paid_count(group: &GroupBuy) -> usize {
    group
        .participants()
        .iter()
        .filter(|p| p.payment_status == ParticipantPayment::Paid)
        .count()
}
