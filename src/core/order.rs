//! Order operations: seller-side status updates and the order side effects of
//! group completion, expiry and cancellation.

use crate::{
    core::record::{Record, load_record, retry_transient, update_record},
    errors::{Error, FieldError, Result},
    models::{
        group::{GroupBuy, GroupStatus},
        order::{ORDERS_COLLECTION, Order, OrderItem, OrderStatus, OrderUpdate, PaymentMethod, PaymentStatus},
    },
    store::{DocumentStore, Filter, OrderBy},
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

pub async fn get_order<S: DocumentStore + ?Sized>(store: &S, order_id: &str) -> Result<Order> {
    load_record::<Order, S>(store, order_id)
        .await
        .map(|(order, _)| order)
}

async fn list_orders<S: DocumentStore + ?Sized>(store: &S, filter: Filter) -> Result<Vec<Order>> {
    let order_by = OrderBy::desc("createdAt");
    let documents = retry_transient("list orders", || {
        store.query_collection(ORDERS_COLLECTION, &filter, Some(&order_by))
    })
    .await?;
    documents.iter().map(<Order as Record>::from_document).collect()
}

/// Orders placed through a group, newest first.
pub async fn list_orders_for_group<S: DocumentStore + ?Sized>(
    store: &S,
    group_id: &str,
) -> Result<Vec<Order>> {
    list_orders(store, Filter::all().eq("groupId", group_id)).await
}

/// A seller's orders, newest first.
pub async fn list_orders_for_seller<S: DocumentStore + ?Sized>(
    store: &S,
    seller_id: &str,
) -> Result<Vec<Order>> {
    list_orders(store, Filter::all().eq("sellerId", seller_id)).await
}

/// Places a buyer's order for a group at the group price.
///
/// # Errors
/// `Validation` for a zero quantity, `GroupClosed` unless the group is open.
pub async fn place_group_order<S: DocumentStore + ?Sized>(
    store: &S,
    group: &GroupBuy,
    user_id: &str,
    quantity: u32,
    payment_method: PaymentMethod,
    now: DateTime<Utc>,
) -> Result<Order> {
    if quantity == 0 {
        return Err(Error::Validation {
            errors: vec![FieldError::new("quantity", "must be at least 1")],
        });
    }
    if !group.status.is_open() {
        return Err(Error::GroupClosed {
            group_id: group.id.clone(),
            status: group.status,
        });
    }

    let mut order = Order {
        id: String::new(),
        user_id: user_id.to_string(),
        seller_id: group.seller_id.clone(),
        group_id: Some(group.id.clone()),
        items: vec![OrderItem {
            product_id: group.product_id.clone(),
            name: group.title.clone(),
            price: group.group_price,
            quantity,
        }],
        status: OrderStatus::Pending,
        total: group.group_price * f64::from(quantity),
        payment_method,
        payment_status: PaymentStatus::Pending,
        tracking_number: None,
        notes: None,
        created_at: now,
        updated_at: now,
    };

    let body = serde_json::to_value(&order)?;
    order.id = retry_transient("create order", || {
        store.create_document(ORDERS_COLLECTION, body.clone())
    })
    .await?;
    info!(order_id = %order.id, group_id = %group.id, user_id, "Order placed");
    Ok(order)
}

fn apply_status(order: &mut Order, to: OrderStatus, now: DateTime<Utc>) -> Result<()> {
    if order.status == to {
        return Ok(());
    }
    if !order.status.can_transition_to(to) {
        return Err(Error::InvalidTransition {
            order_id: order.id.clone(),
            from: order.status,
            to,
        });
    }
    order.status = to;
    match to {
        OrderStatus::Paid => order.payment_status = PaymentStatus::Paid,
        OrderStatus::Refunded => order.payment_status = PaymentStatus::Refunded,
        _ => {}
    }
    order.updated_at = now;
    Ok(())
}

/// Applies a seller update: status transition, tracking number and notes.
///
/// # Errors
/// `NotFound`, `InvalidTransition`, or `Conflict` after repeated races.
pub async fn update_order<S: DocumentStore + ?Sized>(
    store: &S,
    order_id: &str,
    update: OrderUpdate,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<Order> {
    let updated = update_record::<Order, S, _, _>(store, order_id, max_attempts, |order| {
        if let Some(status) = update.status {
            apply_status(order, status, now)?;
        }
        if update.tracking_number.is_some() && order.tracking_number != update.tracking_number {
            order.tracking_number.clone_from(&update.tracking_number);
            order.updated_at = now;
        }
        if update.notes.is_some() && order.notes != update.notes {
            order.notes.clone_from(&update.notes);
            order.updated_at = now;
        }
        Ok(())
    })
    .await
    .inspect_err(|e| debug!(order_id, error = %e, "Order update rejected"))?;

    if updated.written {
        info!(order_id, status = %updated.after.status, "Order updated");
    }
    Ok(updated.after)
}

/// Moves the group's pending orders along with a terminal group status.
///
/// Completed confirms them; expired and cancelled cancel them. Orders already
/// past pending are left alone. Returns how many orders changed.
pub async fn resolve_group_orders<S: DocumentStore + ?Sized>(
    store: &S,
    group_id: &str,
    status: GroupStatus,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<usize> {
    let target = match status {
        GroupStatus::Completed => OrderStatus::Confirmed,
        GroupStatus::Expired | GroupStatus::Cancelled => OrderStatus::Cancelled,
        GroupStatus::Pending | GroupStatus::Active => return Ok(0),
    };

    let filter = Filter::all()
        .eq("groupId", group_id)
        .eq("status", OrderStatus::Pending.as_str());
    let pending = list_orders(store, filter).await?;

    let mut resolved = 0;
    for order in &pending {
        let updated = update_record::<Order, S, _, _>(store, &order.id, max_attempts, |order| {
            if order.status == OrderStatus::Pending {
                apply_status(order, target, now)?;
            }
            Ok(())
        })
        .await;
        match updated {
            Ok(updated) if updated.written => resolved += 1,
            Ok(_) => {}
            Err(e) => warn!(order_id = %order.id, group_id, error = %e, "Failed to resolve order"),
        }
    }
    info!(group_id, %target, resolved, "Group orders resolved");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::*;
    use chrono::Duration;

    async fn placed(store: &MemoryStore, user_id: &str) -> Order {
        let mut group = test_group(fixed_now(), 2, 5);
        group.id = "g1".to_string();
        place_group_order(store, &group, user_id, 2, PaymentMethod::Card, fixed_now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_place_group_order() -> Result<()> {
        let store = MemoryStore::new();
        let order = placed(&store, "u1").await;
        assert_eq!(order.total, 200.0);
        assert_eq!(order.group_id.as_deref(), Some("g1"));

        let loaded = get_order(&store, &order.id).await?;
        assert_eq!(loaded, order);
        Ok(())
    }

    #[tokio::test]
    async fn test_place_order_rejected_for_closed_group() {
        let store = MemoryStore::new();
        let mut group = test_group(fixed_now(), 2, 5);
        group.status = GroupStatus::Expired;
        let err = place_group_order(&store, &group, "u1", 1, PaymentMethod::Card, fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GroupClosed { .. }));

        let err = place_group_order(&store, &test_group(fixed_now(), 2, 5), "u1", 0, PaymentMethod::Card, fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_order_walks_the_chain() -> Result<()> {
        let store = MemoryStore::new();
        let order = placed(&store, "u1").await;
        let later = fixed_now() + Duration::hours(1);

        let confirm = OrderUpdate {
            status: Some(OrderStatus::Confirmed),
            ..OrderUpdate::default()
        };
        let order = update_order(&store, &order.id, confirm, later, 3).await?;
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.updated_at, later);

        let skip = OrderUpdate {
            status: Some(OrderStatus::Shipped),
            ..OrderUpdate::default()
        };
        let err = update_order(&store, &order.id, skip, later, 3).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: OrderStatus::Confirmed,
                to: OrderStatus::Shipped,
                ..
            }
        ));

        let paid = OrderUpdate {
            status: Some(OrderStatus::Paid),
            notes: Some("paid at pickup".to_string()),
            ..OrderUpdate::default()
        };
        let order = update_order(&store, &order.id, paid, later, 3).await?;
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.notes.as_deref(), Some("paid at pickup"));
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_completed_group_confirms_pending_orders() -> Result<()> {
        let store = MemoryStore::new();
        let first = placed(&store, "u1").await;
        let second = placed(&store, "u2").await;
        update_order(
            &store,
            &second.id,
            OrderUpdate {
                status: Some(OrderStatus::Cancelled),
                ..OrderUpdate::default()
            },
            fixed_now(),
            3,
        )
        .await?;

        let resolved = resolve_group_orders(&store, "g1", GroupStatus::Completed, fixed_now(), 3).await?;
        assert_eq!(resolved, 1);
        assert_eq!(get_order(&store, &first.id).await?.status, OrderStatus::Confirmed);
        assert_eq!(get_order(&store, &second.id).await?.status, OrderStatus::Cancelled);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_expired_group_cancels_orders() -> Result<()> {
        let store = MemoryStore::new();
        let order = placed(&store, "u1").await;

        assert_eq!(
            resolve_group_orders(&store, "g1", GroupStatus::Active, fixed_now(), 3).await?,
            0
        );
        let resolved = resolve_group_orders(&store, "g1", GroupStatus::Expired, fixed_now(), 3).await?;
        assert_eq!(resolved, 1);
        assert_eq!(get_order(&store, &order.id).await?.status, OrderStatus::Cancelled);

        let orders = list_orders_for_seller(&store, "seller-1").await?;
        assert_eq!(orders.len(), 1);
        Ok(())
    }
}
