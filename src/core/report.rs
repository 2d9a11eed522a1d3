//! Report generation business logic.
//!
//! Pure reducers over snapshots of orders, products and groups. Every function
//! is total: empty input yields a zeroed report, never an error. Maps are
//! `BTreeMap`s so serialized reports are stable.

use crate::models::{
    group::{GroupBuy, GroupStatus},
    order::{Order, OrderStatus, PaymentMethod, PaymentStatus},
    product::Product,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Products with fewer units available than this count as low stock.
pub const LOW_STOCK_THRESHOLD: u32 = 10;
/// Products with at least this many units available count as well stocked.
pub const HIGH_STOCK_THRESHOLD: u32 = 50;
/// Window for counting a customer as new.
pub const NEW_CUSTOMER_DAYS: i64 = 30;
/// Estimated share of revenue spent on costs.
pub const ESTIMATED_COST_RATIO: f64 = 0.7;
const TOP_CUSTOMERS: usize = 10;

/// Inclusive range on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportRange {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `days` days up to and including `now`.
    #[must_use]
    pub fn last_days(now: DateTime<Utc>, days: i64) -> Self {
        Self::new(now - Duration::days(days), now)
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub total_orders: usize,
    pub total_revenue: f64,
    pub average_order_value: f64,
    pub orders_by_status: BTreeMap<OrderStatus, usize>,
    /// Sum of order totals per local calendar day
    pub daily_revenue: BTreeMap<NaiveDate, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StockLevels {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReport {
    pub total_products: usize,
    pub total_stock: u64,
    pub stock_levels: StockLevels,
    /// Ids of products below [`LOW_STOCK_THRESHOLD`]
    pub low_stock: Vec<String>,
    pub out_of_stock: Vec<String>,
    pub category_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsReport {
    /// Groups that have at least one participant
    pub started_groups: usize,
    pub completed_groups: usize,
    /// Percentage of started groups that completed
    pub success_rate: f64,
    pub average_group_size: f64,
    /// Participants per category
    pub popular_categories: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBuysReport {
    pub total_groups: usize,
    pub groups_by_status: BTreeMap<GroupStatus, usize>,
    pub started_groups: usize,
    pub completed_groups: usize,
    pub success_rate: f64,
    pub average_group_size: f64,
    /// Mean `current / min` over open groups, as a percentage
    pub average_progress: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomersReport {
    pub total_customers: usize,
    pub new_customers: usize,
    pub repeat_customers: usize,
    /// Highest spenders first, at most ten
    pub top_customers: Vec<(String, f64)>,
    pub retention_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub revenue: f64,
    pub average_order_value: f64,
    pub revenue_by_payment_method: BTreeMap<PaymentMethod, f64>,
    pub refund_rate: f64,
    pub profit_margin: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Sales,
    Inventory,
    Customers,
    Groups,
    Financial,
}

/// Narrows the input of [`generate_report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    pub range: ReportRange,
    /// Only products in these categories, when set
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Only orders in these statuses, when set
    #[serde(default)]
    pub statuses: Option<Vec<OrderStatus>>,
}

impl ReportFilter {
    #[must_use]
    pub const fn new(range: ReportRange) -> Self {
        Self {
            range,
            categories: None,
            statuses: None,
        }
    }

    fn keeps_order(&self, order: &Order) -> bool {
        self.range.contains(order.created_at)
            && self
                .statuses
                .as_ref()
                .is_none_or(|statuses| statuses.contains(&order.status))
    }

    fn keeps_product(&self, product: &Product) -> bool {
        self.categories
            .as_ref()
            .is_none_or(|categories| categories.contains(&product.category))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Report {
    Sales(SalesReport),
    Inventory(InventoryReport),
    Customers(CustomersReport),
    Groups(GroupsReport),
    Financial(FinancialReport),
}

/// `part / whole` as a percentage, zero when `whole` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64) * 100.0
}

#[allow(clippy::cast_precision_loss)]
fn mean(sum: u64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum as f64 / count as f64 }
}

fn is_paid(order: &Order) -> bool {
    order.payment_status == PaymentStatus::Paid
}

/// Sum of `total` over paid orders.
#[must_use]
pub fn total_revenue(orders: &[Order]) -> f64 {
    orders.iter().filter(|o| is_paid(o)).map(|o| o.total).sum()
}

/// Revenue divided by the number of paid orders.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_order_value(orders: &[Order]) -> f64 {
    let paid = orders.iter().filter(|o| is_paid(o)).count();
    if paid == 0 {
        return 0.0;
    }
    total_revenue(orders) / paid as f64
}

#[must_use]
pub fn orders_by_status(orders: &[Order]) -> BTreeMap<OrderStatus, usize> {
    let mut counts = BTreeMap::new();
    for order in orders {
        *counts.entry(order.status).or_insert(0) += 1;
    }
    counts
}

/// Units sold per product id.
#[must_use]
pub fn top_selling_products(orders: &[Order]) -> BTreeMap<String, u64> {
    let mut sold = BTreeMap::new();
    for item in orders.iter().flat_map(|o| &o.items) {
        *sold.entry(item.product_id.clone()).or_insert(0) += u64::from(item.quantity);
    }
    sold
}

/// Percentage change from `previous` to `current`, zero when `previous` is zero.
#[must_use]
pub fn growth_rate(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    ((current - previous) / previous) * 100.0
}

/// Sales over the orders created within `range`. Daily revenue buckets by the
/// calendar date in `tz` and counts every order in range, paid or not.
#[must_use]
pub fn sales_report<Tz: TimeZone>(orders: &[Order], range: &ReportRange, tz: &Tz) -> SalesReport {
    let in_range: Vec<Order> = orders
        .iter()
        .filter(|o| range.contains(o.created_at))
        .cloned()
        .collect();

    let mut daily_revenue = BTreeMap::new();
    for order in &in_range {
        let day = order.created_at.with_timezone(tz).date_naive();
        *daily_revenue.entry(day).or_insert(0.0) += order.total;
    }

    SalesReport {
        total_orders: in_range.len(),
        total_revenue: total_revenue(&in_range),
        average_order_value: average_order_value(&in_range),
        orders_by_status: orders_by_status(&in_range),
        daily_revenue,
    }
}

#[must_use]
pub fn inventory_report(products: &[Product]) -> InventoryReport {
    let mut report = InventoryReport {
        total_products: products.len(),
        ..InventoryReport::default()
    };

    for product in products {
        let available = product.inventory.available;
        report.total_stock += u64::from(product.inventory.total);
        if available < LOW_STOCK_THRESHOLD {
            report.stock_levels.low += 1;
            report.low_stock.push(product.id.clone());
        } else if available < HIGH_STOCK_THRESHOLD {
            report.stock_levels.medium += 1;
        } else {
            report.stock_levels.high += 1;
        }
        if available == 0 {
            report.out_of_stock.push(product.id.clone());
        }
        *report
            .category_distribution
            .entry(product.category.clone())
            .or_insert(0) += 1;
    }
    report
}

/// Group success from the participant counters mirrored on products.
#[must_use]
pub fn groups_report(products: &[Product]) -> GroupsReport {
    let started: Vec<&Product> = products.iter().filter(|p| p.current_participants > 0).collect();
    let completed = started
        .iter()
        .filter(|p| p.current_participants >= p.required_participants)
        .count();
    let participants: u64 = started.iter().map(|p| u64::from(p.current_participants)).sum();

    let mut popular_categories = BTreeMap::new();
    for product in &started {
        *popular_categories.entry(product.category.clone()).or_insert(0) +=
            u64::from(product.current_participants);
    }

    GroupsReport {
        started_groups: started.len(),
        completed_groups: completed,
        success_rate: percentage(completed, started.len()),
        average_group_size: mean(participants, started.len()),
        popular_categories,
    }
}

/// Group success from real group statuses.
#[must_use]
pub fn group_buys_report(groups: &[GroupBuy]) -> GroupBuysReport {
    let mut groups_by_status = BTreeMap::new();
    for group in groups {
        *groups_by_status.entry(group.status).or_insert(0) += 1;
    }

    let started: Vec<&GroupBuy> = groups.iter().filter(|g| g.current_participants() > 0).collect();
    let completed = groups
        .iter()
        .filter(|g| g.status == GroupStatus::Completed)
        .count();
    let participants: u64 = started.iter().map(|g| u64::from(g.current_participants())).sum();

    let open: Vec<&GroupBuy> = groups.iter().filter(|g| g.status.is_open()).collect();
    #[allow(clippy::cast_precision_loss)]
    let average_progress = if open.is_empty() {
        0.0
    } else {
        open.iter()
            .map(|g| crate::core::threshold::threshold_progress(g))
            .sum::<f64>()
            / open.len() as f64
    };

    GroupBuysReport {
        total_groups: groups.len(),
        groups_by_status,
        started_groups: started.len(),
        completed_groups: completed,
        success_rate: percentage(completed, started.len()),
        average_group_size: mean(participants, started.len()),
        average_progress,
    }
}

/// Customer activity; "new" means ordered within the 30 days before `now`.
#[must_use]
pub fn customers_report(orders: &[Order], now: DateTime<Utc>) -> CustomersReport {
    let mut order_counts: HashMap<&str, usize> = HashMap::new();
    let mut spending: HashMap<&str, f64> = HashMap::new();
    for order in orders {
        *order_counts.entry(order.user_id.as_str()).or_insert(0) += 1;
        *spending.entry(order.user_id.as_str()).or_insert(0.0) += order.total;
    }

    let cutoff = now - Duration::days(NEW_CUSTOMER_DAYS);
    let new_customers: HashSet<&str> = orders
        .iter()
        .filter(|o| o.created_at >= cutoff)
        .map(|o| o.user_id.as_str())
        .collect();
    let repeat = order_counts.values().filter(|&&n| n > 1).count();

    let mut top_customers: Vec<(String, f64)> = spending
        .into_iter()
        .map(|(user, spent)| (user.to_string(), spent))
        .collect();
    top_customers.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_customers.truncate(TOP_CUSTOMERS);

    CustomersReport {
        total_customers: order_counts.len(),
        new_customers: new_customers.len(),
        repeat_customers: repeat,
        top_customers,
        retention_rate: percentage(repeat, order_counts.len()),
    }
}

/// Revenue breakdown; the margin assumes costs are a fixed share of revenue.
#[must_use]
pub fn financial_report(orders: &[Order]) -> FinancialReport {
    let revenue = total_revenue(orders);

    let mut revenue_by_payment_method = BTreeMap::new();
    for order in orders {
        *revenue_by_payment_method
            .entry(order.payment_method)
            .or_insert(0.0) += order.total;
    }

    let refunded = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Refunded)
        .count();
    let profit_margin = if revenue > 0.0 {
        ((revenue - revenue * ESTIMATED_COST_RATIO) / revenue) * 100.0
    } else {
        0.0
    };

    FinancialReport {
        revenue,
        average_order_value: average_order_value(orders),
        revenue_by_payment_method,
        refund_rate: percentage(refunded, orders.len()),
        profit_margin,
    }
}

/// Builds a report of `kind` over the orders and products kept by `filter`.
#[must_use]
pub fn generate_report<Tz: TimeZone>(
    kind: ReportKind,
    orders: &[Order],
    products: &[Product],
    filter: &ReportFilter,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Report {
    let orders: Vec<Order> = orders
        .iter()
        .filter(|o| filter.keeps_order(o))
        .cloned()
        .collect();
    let products: Vec<Product> = products
        .iter()
        .filter(|p| filter.keeps_product(p))
        .cloned()
        .collect();

    match kind {
        ReportKind::Sales => Report::Sales(sales_report(&orders, &filter.range, tz)),
        ReportKind::Inventory => Report::Inventory(inventory_report(&products)),
        ReportKind::Customers => Report::Customers(customers_report(&orders, now)),
        ReportKind::Groups => Report::Groups(groups_report(&products)),
        ReportKind::Financial => Report::Financial(financial_report(&orders)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp, clippy::panic)]
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ledger;
    use crate::models::group::Participant;
    use crate::test_utils::*;
    use chrono::FixedOffset;

    #[test]
    fn test_sales_report_empty() {
        let range = ReportRange::last_days(fixed_now(), 30);
        let report = sales_report(&[], &range, &Utc);
        assert_eq!(report, SalesReport::default());
        assert_eq!(report.total_orders, 0);
        assert_eq!(report.total_revenue, 0.0);
        assert_eq!(report.average_order_value, 0.0);
    }

    #[test]
    fn test_sales_report_counts_paid_revenue() {
        let now = fixed_now();
        let orders = vec![
            test_order("o1", "u1", 100.0, OrderStatus::Paid, now - Duration::days(1)),
            test_order("o2", "u2", 50.0, OrderStatus::Paid, now),
            test_order("o3", "u1", 30.0, OrderStatus::Pending, now),
            // Outside the range
            test_order("o4", "u3", 999.0, OrderStatus::Paid, now - Duration::days(40)),
        ];

        let report = sales_report(&orders, &ReportRange::last_days(now, 30), &Utc);
        assert_eq!(report.total_orders, 3);
        assert_eq!(report.total_revenue, 150.0);
        assert_eq!(report.average_order_value, 75.0);
        assert_eq!(report.orders_by_status[&OrderStatus::Paid], 2);
        assert_eq!(report.orders_by_status[&OrderStatus::Pending], 1);
        assert_eq!(report.daily_revenue[&now.date_naive()], 80.0);
    }

    #[test]
    fn test_sales_report_range_is_inclusive() {
        let now = fixed_now();
        let orders = vec![test_order("o1", "u1", 10.0, OrderStatus::Paid, now)];
        let report = sales_report(&orders, &ReportRange::new(now, now), &Utc);
        assert_eq!(report.total_orders, 1);
    }

    #[test]
    fn test_daily_revenue_uses_local_date() {
        // 2025-03-01T12:00Z is already 2025-03-02 in UTC+13
        let now = fixed_now();
        let tz = FixedOffset::east_opt(13 * 3600).unwrap();
        let orders = vec![test_order("o1", "u1", 10.0, OrderStatus::Paid, now)];

        let report = sales_report(&orders, &ReportRange::last_days(now, 1), &tz);
        let day = now.with_timezone(&tz).date_naive();
        assert_ne!(day, now.date_naive());
        assert_eq!(report.daily_revenue[&day], 10.0);
    }

    #[test]
    fn test_inventory_buckets() {
        let products = vec![
            test_product("p1", "coffee", 0, 0, 2),
            test_product("p2", "coffee", 9, 0, 2),
            test_product("p3", "tea", 10, 0, 2),
            test_product("p4", "tea", 49, 0, 2),
            test_product("p5", "tea", 50, 0, 2),
        ];

        let report = inventory_report(&products);
        assert_eq!(report.total_products, 5);
        assert_eq!(report.total_stock, 118);
        assert_eq!(
            report.stock_levels,
            StockLevels {
                low: 2,
                medium: 2,
                high: 1
            }
        );
        assert_eq!(report.low_stock, ["p1", "p2"]);
        assert_eq!(report.out_of_stock, ["p1"]);
        assert_eq!(report.category_distribution["tea"], 3);
        assert_eq!(inventory_report(&[]), InventoryReport::default());
    }

    #[test]
    fn test_groups_report_from_products() {
        let products = vec![
            test_product("p1", "coffee", 20, 0, 3),
            test_product("p2", "coffee", 20, 3, 3),
            test_product("p3", "tea", 20, 1, 4),
        ];

        let report = groups_report(&products);
        assert_eq!(report.started_groups, 2);
        assert_eq!(report.completed_groups, 1);
        assert_eq!(report.success_rate, 50.0);
        assert_eq!(report.average_group_size, 2.0);
        assert_eq!(report.popular_categories["coffee"], 3);
        assert_eq!(report.popular_categories["tea"], 1);
        assert_eq!(groups_report(&[]), GroupsReport::default());
    }

    #[test]
    fn test_group_buys_report_from_statuses() {
        let now = fixed_now();
        let mut completed = test_group(now, 2, 5);
        ledger::join(&mut completed, Participant::new("u1", "a", now)).unwrap();
        ledger::join(&mut completed, Participant::new("u2", "b", now)).unwrap();
        completed.status = GroupStatus::Completed;

        let mut active = test_group(now, 4, 5);
        ledger::join(&mut active, Participant::new("u3", "c", now)).unwrap();
        active.status = GroupStatus::Active;

        let pending = test_group(now, 2, 5);

        let report = group_buys_report(&[completed, active, pending]);
        assert_eq!(report.total_groups, 3);
        assert_eq!(report.started_groups, 2);
        assert_eq!(report.completed_groups, 1);
        assert_eq!(report.success_rate, 50.0);
        assert_eq!(report.average_group_size, 1.5);
        assert_eq!(report.groups_by_status[&GroupStatus::Pending], 1);
        // Open groups: 1/4 and 0/2
        assert_eq!(report.average_progress, 12.5);
    }

    #[test]
    fn test_customers_report() {
        let now = fixed_now();
        let orders = vec![
            test_order("o1", "u1", 100.0, OrderStatus::Paid, now - Duration::days(60)),
            test_order("o2", "u1", 20.0, OrderStatus::Paid, now - Duration::days(2)),
            test_order("o3", "u2", 300.0, OrderStatus::Paid, now - Duration::days(45)),
        ];

        let report = customers_report(&orders, now);
        assert_eq!(report.total_customers, 2);
        assert_eq!(report.new_customers, 1);
        assert_eq!(report.repeat_customers, 1);
        assert_eq!(report.retention_rate, 50.0);
        assert_eq!(report.top_customers[0], ("u2".to_string(), 300.0));
        assert_eq!(customers_report(&[], now), CustomersReport::default());
    }

    #[test]
    fn test_financial_report() {
        let now = fixed_now();
        let mut transfer = test_order("o2", "u2", 50.0, OrderStatus::Refunded, now);
        transfer.payment_method = PaymentMethod::BankTransfer;
        transfer.payment_status = PaymentStatus::Refunded;
        let orders = vec![test_order("o1", "u1", 100.0, OrderStatus::Paid, now), transfer];

        let report = financial_report(&orders);
        assert_eq!(report.revenue, 100.0);
        assert_eq!(report.average_order_value, 100.0);
        assert_eq!(report.refund_rate, 50.0);
        assert!((report.profit_margin - 30.0).abs() < 1e-9);
        assert_eq!(report.revenue_by_payment_method[&PaymentMethod::BankTransfer], 50.0);
        assert_eq!(financial_report(&[]), FinancialReport::default());
    }

    #[test]
    fn test_top_selling_and_growth() {
        let now = fixed_now();
        let orders = vec![
            test_order("o1", "u1", 10.0, OrderStatus::Paid, now),
            test_order("o2", "u2", 10.0, OrderStatus::Paid, now),
        ];
        assert_eq!(top_selling_products(&orders)["product-1"], 2);
        assert_eq!(growth_rate(150.0, 100.0), 50.0);
        assert_eq!(growth_rate(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_generate_report_applies_filter() {
        let now = fixed_now();
        let orders = vec![
            test_order("o1", "u1", 100.0, OrderStatus::Paid, now),
            test_order("o2", "u2", 40.0, OrderStatus::Cancelled, now),
        ];
        let products = vec![
            test_product("p1", "coffee", 5, 0, 2),
            test_product("p2", "tea", 5, 0, 2),
        ];
        let mut filter = ReportFilter::new(ReportRange::last_days(now, 7));
        filter.statuses = Some(vec![OrderStatus::Paid]);
        filter.categories = Some(vec!["tea".to_string()]);

        let Report::Sales(sales) = generate_report(ReportKind::Sales, &orders, &products, &filter, now, &Utc) else {
            panic!("expected a sales report");
        };
        assert_eq!(sales.total_orders, 1);

        let Report::Inventory(inventory) =
            generate_report(ReportKind::Inventory, &orders, &products, &filter, now, &Utc)
        else {
            panic!("expected an inventory report");
        };
        assert_eq!(inventory.total_products, 1);
    }
}
