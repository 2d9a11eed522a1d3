//! Shared test utilities for `GroupBuddy`.
//!
//! Fixture builders with sensible defaults, store setup for both backends, and
//! store doubles that simulate competing writers and flaky connections.

use crate::{
    config::GroupSettings,
    core::{clock::ManualClock, group::GroupController},
    errors::{Error, Result},
    models::{
        group::{CreateGroupBuyData, GROUPS_COLLECTION, GroupBuy},
        order::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus},
        product::{Inventory, Product, ProductStatus},
    },
    store::{Document, DocumentStore, Filter, MemoryStore, OrderBy, SeaOrmStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

/// 2025-03-01T12:00:00Z, the "now" of every fixture.
#[allow(clippy::unwrap_used)]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

/// Campaign input with sensible defaults.
///
/// # Defaults
/// * product: "product-1", title "Coffee beans"
/// * prices: 150.0 original, 100.0 group
/// * participants: min 2, max 5
/// * ends seven days after `now`
pub fn sample_group_data(now: DateTime<Utc>) -> CreateGroupBuyData {
    CreateGroupBuyData {
        product_id: "product-1".to_string(),
        title: "Coffee beans".to_string(),
        description: "Single-origin, 1kg".to_string(),
        original_price: 150.0,
        group_price: 100.0,
        min_participants: 2,
        max_participants: 5,
        end_date: now + Duration::days(7),
    }
}

/// A pending group owned by "seller-1", created at `now`, without an id.
pub fn test_group(now: DateTime<Utc>, min: u32, max: u32) -> GroupBuy {
    let mut data = sample_group_data(now);
    data.min_participants = min;
    data.max_participants = max;
    GroupBuy::new("seller-1", data, now)
}

/// Stores `group` as-is and returns its new id.
pub async fn insert_group<S: DocumentStore + ?Sized>(store: &S, group: &GroupBuy) -> Result<String> {
    store
        .create_document(GROUPS_COLLECTION, group.to_document_data()?)
        .await
}

/// Controller over a fresh in-memory store, driven by a manual clock at [`fixed_now`].
pub fn setup_controller() -> (GroupController<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let controller = GroupController::new(MemoryStore::new(), GroupSettings::default())
        .with_clock(Arc::clone(&clock) as Arc<dyn crate::core::clock::Clock>);
    (controller, clock)
}

/// Creates an in-memory `SQLite` store with all tables initialized.
pub async fn setup_sql_store() -> Result<SeaOrmStore> {
    SeaOrmStore::connect("sqlite::memory:").await
}

/// A single-item order for "product-1" from "seller-1".
///
/// Payment status follows the order status: paid once the order is paid,
/// refunded once refunded, pending before that.
pub fn test_order(
    id: &str,
    user_id: &str,
    total: f64,
    status: OrderStatus,
    created_at: DateTime<Utc>,
) -> Order {
    let payment_status = match status {
        OrderStatus::Paid | OrderStatus::Processing | OrderStatus::Shipped | OrderStatus::Delivered => {
            PaymentStatus::Paid
        }
        OrderStatus::Refunded => PaymentStatus::Refunded,
        OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Cancelled => PaymentStatus::Pending,
    };
    Order {
        id: id.to_string(),
        user_id: user_id.to_string(),
        seller_id: "seller-1".to_string(),
        group_id: None,
        items: vec![OrderItem {
            product_id: "product-1".to_string(),
            name: "Coffee beans".to_string(),
            price: total,
            quantity: 1,
        }],
        status,
        total,
        payment_method: PaymentMethod::Card,
        payment_status,
        tracking_number: None,
        notes: None,
        created_at,
        updated_at: created_at,
    }
}

/// A product whose stock is all available.
pub fn test_product(
    id: &str,
    category: &str,
    available: u32,
    current_participants: u32,
    required_participants: u32,
) -> Product {
    Product {
        id: id.to_string(),
        seller_id: "seller-1".to_string(),
        name: format!("Product {id}"),
        description: String::new(),
        price: 20.0,
        group_price: 15.0,
        required_participants,
        current_participants,
        category: category.to_string(),
        inventory: Inventory {
            total: available,
            available,
            reserved: 0,
        },
        status: ProductStatus::Active,
        created_at: fixed_now(),
        updated_at: fixed_now(),
    }
}

/// Store wrapper whose next `n` conditional writes lose a race: another
/// writer bumps the version just before each one lands.
pub struct ConflictingStore<S> {
    inner: S,
    remaining: AtomicU32,
}

impl<S> ConflictingStore<S> {
    pub const fn new(inner: S, conflicts: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(conflicts),
        }
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for ConflictingStore<S> {
    async fn query_collection(
        &self,
        collection: &str,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        self.inner.query_collection(collection, filter, order).await
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.inner.get_document(collection, id).await
    }

    async fn create_document(&self, collection: &str, data: Value) -> Result<String> {
        self.inner.create_document(collection, data).await
    }

    async fn mutate_document(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        self.inner.mutate_document(collection, id, patch).await
    }

    async fn mutate_document_if(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        patch: Value,
    ) -> Result<bool> {
        if take_one(&self.remaining) {
            self.inner.mutate_document(collection, id, json!({})).await?;
        }
        self.inner
            .mutate_document_if(collection, id, expected_version, patch)
            .await
    }
}

/// Store wrapper that fails the next `n` calls with a network error.
pub struct FlakyStore<S> {
    inner: S,
    failures: AtomicU32,
}

impl<S> FlakyStore<S> {
    pub const fn new(inner: S, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
        }
    }

    /// Makes the next `n` calls fail.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn trip(&self) -> Result<()> {
        if take_one(&self.failures) {
            Err(Error::Network {
                message: "connection reset".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for FlakyStore<S> {
    async fn query_collection(
        &self,
        collection: &str,
        filter: &Filter,
        order: Option<&OrderBy>,
    ) -> Result<Vec<Document>> {
        self.trip()?;
        self.inner.query_collection(collection, filter, order).await
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.trip()?;
        self.inner.get_document(collection, id).await
    }

    async fn create_document(&self, collection: &str, data: Value) -> Result<String> {
        self.trip()?;
        self.inner.create_document(collection, data).await
    }

    async fn mutate_document(&self, collection: &str, id: &str, patch: Value) -> Result<()> {
        self.trip()?;
        self.inner.mutate_document(collection, id, patch).await
    }

    async fn mutate_document_if(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        patch: Value,
    ) -> Result<bool> {
        self.trip()?;
        self.inner
            .mutate_document_if(collection, id, expected_version, patch)
            .await
    }
}
