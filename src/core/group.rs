//! Group lifecycle controller - the only writer of group-buy records.
//!
//! Every mutation reads the current group, applies the participant ledger and
//! the threshold evaluator in memory, and persists participants, status and
//! `updatedAt` in one conditional write (see [`crate::core::record`]).
//! Successful writes emit notification events and resolve the group's orders
//! once the group reaches a terminal status.

use crate::{
    config::GroupSettings,
    core::{
        clock::{Clock, SystemClock},
        ledger,
        notify::{NoopNotifier, Notifier, events_for_transition},
        order,
        record::{Updated, load_record, retry_transient, update_record},
        threshold,
    },
    errors::{Error, FieldError, Result},
    models::group::{
        CreateGroupBuyData, GROUPS_COLLECTION, GroupBuy, GroupPatch, GroupStatus, Participant,
    },
    store::{DocumentStore, Filter, OrderBy},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Creates, joins and transitions group-buy campaigns.
///
/// All state the controller needs is passed in explicitly: the store, the
/// notification sink, the clock and the tuning settings.
pub struct GroupController<S, N = NoopNotifier> {
    store: S,
    notifier: N,
    clock: Arc<dyn Clock>,
    settings: GroupSettings,
}

impl<S, N> std::fmt::Debug for GroupController<S, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupController")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S: DocumentStore> GroupController<S> {
    /// Controller with no notification delivery and the system clock.
    pub fn new(store: S, settings: GroupSettings) -> Self {
        GroupController::with_notifier(store, NoopNotifier, settings)
    }
}

impl<S: DocumentStore, N: Notifier> GroupController<S, N> {
    pub fn with_notifier(store: S, notifier: N, settings: GroupSettings) -> Self {
        Self {
            store,
            notifier,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Validates and persists a new pending campaign for `seller_id`.
    ///
    /// # Errors
    /// `Validation` listing every invalid field, or a store error.
    pub async fn create_group(&self, seller_id: &str, data: CreateGroupBuyData) -> Result<GroupBuy> {
        let now = self.clock.now();
        validate_new_group(seller_id, &data, now).inspect_err(|e| {
            debug!(seller_id, error = %e, "Rejected new group");
        })?;

        let mut group = GroupBuy::new(seller_id, data, now);
        let body = group.to_document_data()?;
        group.id = retry_transient("create group", || {
            self.store.create_document(GROUPS_COLLECTION, body.clone())
        })
        .await?;

        info!(
            group_id = %group.id,
            seller_id,
            product_id = %group.product_id,
            min = group.min_participants,
            max = group.max_participants,
            "Group created"
        );
        Ok(group)
    }

    /// # Errors
    /// `NotFound` if the group does not exist.
    pub async fn get_group(&self, group_id: &str) -> Result<GroupBuy> {
        load_record::<GroupBuy, S>(&self.store, group_id)
            .await
            .map(|(group, _)| group)
    }

    /// A seller's groups, newest first.
    pub async fn list_groups_for_seller(&self, seller_id: &str) -> Result<Vec<GroupBuy>> {
        self.list(Filter::all().eq("sellerId", seller_id)).await
    }

    /// Groups running for a product, newest first.
    pub async fn list_groups_for_product(&self, product_id: &str) -> Result<Vec<GroupBuy>> {
        self.list(Filter::all().eq("productId", product_id)).await
    }

    async fn list(&self, filter: Filter) -> Result<Vec<GroupBuy>> {
        let order = OrderBy::desc("createdAt");
        let documents = retry_transient("list groups", || {
            self.store
                .query_collection(GROUPS_COLLECTION, &filter, Some(&order))
        })
        .await?;
        documents.iter().map(GroupBuy::from_document).collect()
    }

    /// Adds a buyer to an open group.
    ///
    /// # Errors
    /// - `NotFound` if the group does not exist
    /// - `CapacityExceeded` if the group is full, even once it has completed
    /// - `GroupClosed` if the group is completed, expired or cancelled
    /// - `DuplicateParticipant` if the user already joined
    pub async fn join_group(&self, group_id: &str, user_id: &str, name: &str) -> Result<GroupBuy> {
        if user_id.trim().is_empty() {
            return Err(Error::Validation {
                errors: vec![FieldError::new("userId", "cannot be empty")],
            });
        }

        self.mutate(group_id, "join", |group, now| {
            ledger::ensure_capacity(group)?;
            ensure_open(group)?;
            ledger::join(group, Participant::new(user_id, name.trim(), now))
        })
        .await
    }

    /// Removes a buyer from an open group.
    ///
    /// # Errors
    /// `NotFound`, `GroupClosed`, or `ParticipantNotFound`.
    pub async fn leave_group(&self, group_id: &str, user_id: &str) -> Result<GroupBuy> {
        self.mutate(group_id, "leave", |group, _| {
            ensure_open(group)?;
            ledger::remove(group, user_id).map(drop)
        })
        .await
    }

    /// Seller edits to title, description and prices.
    ///
    /// # Errors
    /// `ImmutableState` once the group is closed, `Validation` for bad values
    /// or a patch that sets nothing.
    pub async fn update_group(&self, group_id: &str, patch: GroupPatch) -> Result<GroupBuy> {
        self.mutate(group_id, "update", |group, _| {
            ensure_mutable(group)?;
            apply_patch(group, &patch)
        })
        .await
    }

    /// Cancels an open group. Cancellation is final.
    ///
    /// # Errors
    /// `ImmutableState` if the group is already closed.
    pub async fn cancel_group(&self, group_id: &str) -> Result<GroupBuy> {
        self.mutate(group_id, "cancel", |group, _| {
            ensure_mutable(group)?;
            group.status = GroupStatus::Cancelled;
            Ok(())
        })
        .await
    }

    /// Records a participant's payment.
    ///
    /// # Errors
    /// `ImmutableState` for expired or cancelled groups, `ParticipantNotFound`.
    pub async fn mark_participant_paid(&self, group_id: &str, user_id: &str) -> Result<GroupBuy> {
        self.mutate(group_id, "mark paid", |group, _| {
            if matches!(group.status, GroupStatus::Expired | GroupStatus::Cancelled) {
                return Err(Error::ImmutableState {
                    group_id: group.id.clone(),
                    status: group.status,
                });
            }
            ledger::mark_paid(group, user_id)
        })
        .await
    }

    /// Re-evaluates the group at the current time and persists a changed status.
    pub async fn refresh_status(&self, group_id: &str) -> Result<GroupBuy> {
        self.mutate(group_id, "refresh", |_, _| Ok(())).await
    }

    /// Refreshes every open group; returns those whose status changed.
    pub async fn expire_overdue_groups(&self) -> Result<Vec<GroupBuy>> {
        let filter = Filter::all().one_of(
            "status",
            [GroupStatus::Pending.as_str(), GroupStatus::Active.as_str()],
        );
        let open = self.list(filter).await?;
        let now = self.clock.now();

        let mut changed = Vec::new();
        for group in open.iter().filter(|g| threshold::evaluate(g, now) != g.status) {
            match self.refresh_status(&group.id).await {
                Ok(refreshed) if refreshed.status != group.status => changed.push(refreshed),
                Ok(_) => {}
                Err(e) => error!(group_id = %group.id, error = %e, "Failed to refresh group"),
            }
        }
        info!(checked = open.len(), changed = changed.len(), "Expiry sweep finished");
        Ok(changed)
    }

    /// Runs `apply`, re-evaluates the status and writes the result atomically.
    async fn mutate<F>(&self, group_id: &str, action: &'static str, mut apply: F) -> Result<GroupBuy>
    where
        F: FnMut(&mut GroupBuy, DateTime<Utc>) -> Result<()>,
    {
        let now = self.clock.now();
        let updated: Updated<GroupBuy, ()> = update_record(
            &self.store,
            group_id,
            self.settings.max_write_attempts,
            |group: &mut GroupBuy| {
                let snapshot = group.clone();
                apply(group, now)?;
                group.status = threshold::evaluate(group, now);
                if *group != snapshot {
                    group.updated_at = now.max(group.created_at);
                }
                Ok(())
            },
        )
        .await
        .inspect_err(|e| {
            if e.is_business_rule() || matches!(e, Error::Validation { .. }) {
                debug!(group_id, action, error = %e, "Group change rejected");
            } else {
                warn!(group_id, action, error = %e, "Group change failed");
            }
        })?;

        if updated.written {
            info!(
                group_id,
                action,
                status = %updated.after.status,
                participants = updated.after.current_participants(),
                "Group updated"
            );
            self.after_write(&updated.before, &updated.after, now).await;
        }
        Ok(updated.after)
    }

    /// Fire-and-forget side effects of a successful write.
    async fn after_write(&self, before: &GroupBuy, after: &GroupBuy, now: DateTime<Utc>) {
        for event in events_for_transition(before, after, self.settings.capacity_warning_remaining) {
            self.notifier.notify(event);
        }

        if before.status != after.status && after.status.is_terminal() {
            match order::resolve_group_orders(
                &self.store,
                &after.id,
                after.status,
                now,
                self.settings.max_write_attempts,
            )
            .await
            {
                Ok(count) => debug!(group_id = %after.id, count, "Resolved group orders"),
                Err(e) => error!(group_id = %after.id, error = %e, "Failed to resolve group orders"),
            }
        }
    }
}

fn ensure_open(group: &GroupBuy) -> Result<()> {
    if group.status.is_open() {
        Ok(())
    } else {
        Err(Error::GroupClosed {
            group_id: group.id.clone(),
            status: group.status,
        })
    }
}

fn ensure_mutable(group: &GroupBuy) -> Result<()> {
    if group.status.is_open() {
        Ok(())
    } else {
        Err(Error::ImmutableState {
            group_id: group.id.clone(),
            status: group.status,
        })
    }
}

fn check_price(errors: &mut Vec<FieldError>, field: &str, value: f64) {
    if !value.is_finite() || value <= 0.0 {
        errors.push(FieldError::new(field, "must be a positive amount"));
    }
}

/// Every rule a new campaign must satisfy; all violations are reported together.
pub fn validate_new_group(seller_id: &str, data: &CreateGroupBuyData, now: DateTime<Utc>) -> Result<()> {
    let mut errors = Vec::new();

    if seller_id.trim().is_empty() {
        errors.push(FieldError::new("sellerId", "cannot be empty"));
    }
    if data.product_id.trim().is_empty() {
        errors.push(FieldError::new("productId", "cannot be empty"));
    }
    if data.title.trim().is_empty() {
        errors.push(FieldError::new("title", "cannot be empty"));
    }
    check_price(&mut errors, "originalPrice", data.original_price);
    check_price(&mut errors, "groupPrice", data.group_price);
    if data.group_price >= data.original_price {
        errors.push(FieldError::new("groupPrice", "must be lower than originalPrice"));
    }
    if data.min_participants < 2 {
        errors.push(FieldError::new("minParticipants", "must be at least 2"));
    }
    if data.max_participants < data.min_participants {
        errors.push(FieldError::new(
            "maxParticipants",
            "must be greater than or equal to minParticipants",
        ));
    }
    if data.end_date <= now {
        errors.push(FieldError::new("endDate", "must be in the future"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { errors })
    }
}

fn apply_patch(group: &mut GroupBuy, patch: &GroupPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(Error::Validation {
            errors: vec![FieldError::new("patch", "no fields to update")],
        });
    }

    let mut errors = Vec::new();

    if let Some(title) = &patch.title
        && title.trim().is_empty()
    {
        errors.push(FieldError::new("title", "cannot be empty"));
    }
    let original_price = patch.original_price.unwrap_or(group.original_price);
    let group_price = patch.group_price.unwrap_or(group.group_price);
    if let Some(price) = patch.original_price {
        check_price(&mut errors, "originalPrice", price);
    }
    if let Some(price) = patch.group_price {
        check_price(&mut errors, "groupPrice", price);
    }
    if group_price >= original_price {
        errors.push(FieldError::new("groupPrice", "must be lower than originalPrice"));
    }
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    if let Some(title) = &patch.title {
        group.title = title.trim().to_string();
    }
    if let Some(description) = &patch.description {
        group.description.clone_from(description);
    }
    group.original_price = original_price;
    group.group_price = group_price;
    Ok(())
}
