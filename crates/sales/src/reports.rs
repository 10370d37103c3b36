//! Sales reporting as pure functions over placed orders.
//!
//! Callers load the orders of the relevant window; nothing here touches
//! storage. Revenue always means the `total` of orders whose payment status
//! is `paid`. Buckets are computed in UTC.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::Serialize;

use storefront_catalog::ProductId;
use storefront_core::Money;

use crate::{Order, OrderId, OrderStatus, PaymentStatus};

pub const UNCATEGORIZED: &str = "Uncategorized";

fn is_paid(order: &Order) -> bool {
    order.payment_status() == PaymentStatus::Paid
}

fn created(order: &Order) -> DateTime<Utc> {
    order.created_at().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Midnight (UTC) of the day `days - 1` days before `now`.
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let first = now.date_naive() - Duration::days(i64::from(days.max(1)) - 1);
    first.and_time(NaiveTime::MIN).and_utc()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenuePoint {
    /// `YYYY-MM-DD`, or `HH:00` for hourly series.
    pub date: String,
    pub revenue: Money,
    pub orders: u64,
}

/// Paid revenue per day for the last `days` days (today included), zero
/// filled. A one-day window is split into 24 hourly buckets instead.
pub fn revenue_series(orders: &[Order], days: u32, now: DateTime<Utc>) -> Vec<RevenuePoint> {
    let days = days.max(1);
    let start = window_start(now, days);
    let paid = orders.iter().filter(|o| is_paid(o) && created(o) >= start && created(o) <= now);

    if days == 1 {
        let mut buckets = vec![(Money::ZERO, 0u64); 24];
        for o in paid {
            let slot = &mut buckets[created(o).hour() as usize];
            slot.0 += o.total();
            slot.1 += 1;
        }
        return buckets
            .into_iter()
            .enumerate()
            .map(|(h, (revenue, orders))| RevenuePoint { date: format!("{h:02}:00"), revenue, orders })
            .collect();
    }

    let mut by_day: HashMap<NaiveDate, (Money, u64)> = HashMap::new();
    for o in paid {
        let slot = by_day.entry(created(o).date_naive()).or_default();
        slot.0 += o.total();
        slot.1 += 1;
    }

    let first = start.date_naive();
    (0..i64::from(days))
        .map(|i| {
            let day = first + Duration::days(i);
            let (revenue, orders) = by_day.get(&day).copied().unwrap_or_default();
            RevenuePoint { date: day.format("%Y-%m-%d").to_string(), revenue, orders }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRevenue {
    pub name: String,
    pub revenue: Money,
}

/// Paid line revenue grouped by the product's category name, highest first.
pub fn revenue_by_category<F>(orders: &[Order], mut category_of: F) -> Vec<CategoryRevenue>
where
    F: FnMut(ProductId) -> Option<String>,
{
    let mut totals: HashMap<String, Money> = HashMap::new();
    for line in orders.iter().filter(|o| is_paid(o)).flat_map(|o| o.lines()) {
        let name = category_of(line.product_id).unwrap_or_else(|| UNCATEGORIZED.to_string());
        *totals.entry(name).or_default() += line.line_total();
    }

    let mut out: Vec<_> = totals
        .into_iter()
        .filter(|(_, revenue)| revenue.is_positive())
        .map(|(name, revenue)| CategoryRevenue { name, revenue })
        .collect();
    out.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCustomer {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub total_spent: Money,
    pub order_count: u64,
}

/// Customers ranked by paid spend. Grouped by email, falling back to phone
/// for guests who left none.
pub fn top_customers(orders: &[Order], limit: usize) -> Vec<TopCustomer> {
    let mut by_key: HashMap<String, TopCustomer> = HashMap::new();
    for o in orders.iter().filter(|o| is_paid(o)) {
        let Some(c) = o.customer() else { continue };
        let key = match &c.email {
            Some(email) => email.to_lowercase(),
            None => format!("phone:{}", c.phone),
        };
        let entry = by_key.entry(key).or_insert_with(|| TopCustomer {
            customer_name: c.name.clone(),
            customer_email: c.email.clone(),
            total_spent: Money::ZERO,
            order_count: 0,
        });
        entry.total_spent += o.total();
        entry.order_count += 1;
    }

    let mut out: Vec<_> = by_key.into_values().collect();
    out.sort_by(|a, b| b.total_spent.cmp(&a.total_spent).then_with(|| a.customer_name.cmp(&b.customer_name)));
    out.truncate(limit);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub total_sold: i64,
    pub revenue: Money,
}

/// Best sellers by paid line revenue.
pub fn top_products(orders: &[Order], limit: usize) -> Vec<ProductSales> {
    let mut by_product: HashMap<ProductId, ProductSales> = HashMap::new();
    for line in orders.iter().filter(|o| is_paid(o)).flat_map(|o| o.lines()) {
        let entry = by_product.entry(line.product_id).or_insert_with(|| ProductSales {
            product_id: line.product_id,
            name: line.name.clone(),
            image: line.image.clone(),
            total_sold: 0,
            revenue: Money::ZERO,
        });
        entry.total_sold += line.quantity;
        entry.revenue += line.line_total();
    }

    let mut out: Vec<_> = by_product.into_values().collect();
    out.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    out.truncate(limit);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_revenue: Money,
    pub total_orders: u64,
    pub avg_order_value: Money,
    pub new_customers: u64,
}

impl ReportSummary {
    pub fn from_series(series: &[RevenuePoint], new_customers: u64) -> Self {
        let total_revenue: Money = series.iter().map(|p| p.revenue).sum();
        let total_orders: u64 = series.iter().map(|p| p.orders).sum();
        Self {
            total_revenue,
            total_orders,
            avg_order_value: average(total_revenue, total_orders),
            new_customers,
        }
    }
}

/// Mean rounded to the nearest minor unit; zero for no orders.
pub fn average(total: Money, count: u64) -> Money {
    if count == 0 {
        return Money::ZERO;
    }
    let count = i64::try_from(count).unwrap_or(i64::MAX);
    let half = count / 2;
    Money::from_minor((total.minor() + half) / count)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrder {
    pub id: OrderId,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Order> for RecentOrder {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id_typed(),
            order_number: o.order_number().map(|n| n.to_string()),
            customer_name: o.customer().map(|c| c.name.clone()),
            total: o.total(),
            status: o.status(),
            created_at: o.created_at(),
        }
    }
}

/// Counters shown on the back-office dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: Money,
    pub orders_today: u64,
    pub pending_orders: u64,
    pub active_products: u64,
    pub total_users: u64,
}

impl DashboardStats {
    /// Order-derived counters. `revenue_range` narrows the revenue total only.
    pub fn from_orders(
        orders: &[Order],
        revenue_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        now: DateTime<Utc>,
    ) -> Self {
        let today = window_start(now, 1);
        let in_range = |o: &Order| revenue_range.is_none_or(|(from, to)| created(o) >= from && created(o) <= to);

        Self {
            total_revenue: orders.iter().filter(|o| is_paid(o) && in_range(o)).map(Order::total).sum(),
            orders_today: orders.iter().filter(|o| created(o) >= today).count() as u64,
            pending_orders: orders.iter().filter(|o| o.status() == OrderStatus::Pending).count() as u64,
            active_products: 0,
            total_users: 0,
        }
    }
}

/// Newest `limit` orders.
pub fn recent_orders(orders: &[Order], limit: usize) -> Vec<RecentOrder> {
    let mut sorted: Vec<&Order> = orders.iter().collect();
    sorted.sort_by_key(|o| std::cmp::Reverse(created(o)));
    sorted.into_iter().take(limit).map(RecentOrder::from).collect()
}

/// A customer's own order history summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOrderStats {
    pub total_orders: u64,
    pub total_spent: Money,
    pub pending: u64,
    pub delivered: u64,
}

impl UserOrderStats {
    /// Spend counts every order that was not cancelled or refunded.
    pub fn of<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        orders.into_iter().fold(Self::default(), |mut acc, o| {
            acc.total_orders += 1;
            if !o.status().is_terminal() {
                acc.total_spent += o.total();
            }
            if o.status().is_open() {
                acc.pending += 1;
            }
            if o.status() == OrderStatus::Delivered {
                acc.delivered += 1;
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ChangePaymentStatus, ChangeStatus, CustomerInfo, OrderCommand, OrderLine, OrderNumber, OrderType, PlaceOrder,
    };
    use chrono::TimeZone;
    use storefront_core::{Aggregate, Currency, TenantId};

    struct Fixture {
        tenant: TenantId,
        burger: ProductId,
        lassi: ProductId,
    }

    impl Fixture {
        fn new() -> Self {
            Self { tenant: TenantId::new(), burger: ProductId::generate(), lassi: ProductId::generate() }
        }

        fn order(&self, at: DateTime<Utc>, email: Option<&str>, lines: &[(ProductId, i64, i64)], paid: bool) -> Order {
            let lines = lines
                .iter()
                .map(|(product_id, price, qty)| OrderLine {
                    product_id: *product_id,
                    variant_id: None,
                    name: if *product_id == self.burger { "Burger".into() } else { "Lassi".into() },
                    variant_name: None,
                    unit_price: Money::from_major(*price),
                    quantity: *qty,
                    image: None,
                })
                .collect();
            let cmd = PlaceOrder {
                tenant_id: self.tenant,
                order_id: crate::OrderId::generate(),
                order_number: OrderNumber::parse("DC1").unwrap(),
                user_id: None,
                lines,
                discount: Money::ZERO,
                shipping_cost: Money::ZERO,
                currency: Currency::BDT,
                customer: CustomerInfo {
                    name: email.unwrap_or("guest").to_string(),
                    phone: "01700000000".into(),
                    email: email.map(str::to_string),
                },
                shipping_address: None,
                order_type: OrderType::Takeaway,
                payment_method: None,
                payment_status: if paid { PaymentStatus::Paid } else { PaymentStatus::Pending },
                payment_intent_id: None,
                notes: None,
                coupon_code: None,
                occurred_at: at,
            };
            let mut order = Order::empty(cmd.order_id);
            order.execute(&OrderCommand::PlaceOrder(cmd)).unwrap();
            order
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 15, 30, 0).unwrap()
    }

    #[test]
    fn daily_series_is_zero_filled_and_paid_only() {
        let f = Fixture::new();
        let orders = vec![
            f.order(now() - Duration::days(2), Some("a@x.io"), &[(f.burger, 300, 1)], true),
            f.order(now() - Duration::days(2), Some("b@x.io"), &[(f.burger, 100, 1)], true),
            f.order(now(), Some("a@x.io"), &[(f.lassi, 80, 1)], false),
            f.order(now() - Duration::days(30), Some("a@x.io"), &[(f.lassi, 80, 1)], true),
        ];

        let series = revenue_series(&orders, 7, now());

        assert_eq!(series.len(), 7);
        assert_eq!(series[0].date, "2025-03-04");
        assert_eq!(series[6].date, "2025-03-10");
        assert_eq!(series[4].revenue, Money::from_major(400));
        assert_eq!(series[4].orders, 2);
        assert_eq!(series[6].revenue, Money::ZERO);

        let summary = ReportSummary::from_series(&series, 3);
        assert_eq!(summary.total_orders, 2);
        assert_eq!(summary.avg_order_value, Money::from_major(200));
    }

    #[test]
    fn one_day_window_is_hourly() {
        let f = Fixture::new();
        let orders = vec![f.order(now() - Duration::hours(1), None, &[(f.burger, 250, 2)], true)];

        let series = revenue_series(&orders, 1, now());

        assert_eq!(series.len(), 24);
        assert_eq!(series[0].date, "00:00");
        assert_eq!(series[14].revenue, Money::from_major(500));
    }

    #[test]
    fn category_revenue_falls_back_to_uncategorized() {
        let f = Fixture::new();
        let orders = vec![
            f.order(now(), None, &[(f.burger, 300, 2), (f.lassi, 80, 1)], true),
            f.order(now(), None, &[(f.lassi, 80, 10)], false),
        ];

        let burger = f.burger;
        let out = revenue_by_category(&orders, |id| (id == burger).then(|| "Mains".to_string()));

        assert_eq!(
            out,
            vec![
                CategoryRevenue { name: "Mains".into(), revenue: Money::from_major(600) },
                CategoryRevenue { name: UNCATEGORIZED.into(), revenue: Money::from_major(80) },
            ]
        );
    }

    #[test]
    fn top_customers_group_by_email() {
        let f = Fixture::new();
        let orders = vec![
            f.order(now(), Some("a@x.io"), &[(f.burger, 100, 1)], true),
            f.order(now(), Some("A@X.io"), &[(f.burger, 100, 1)], true),
            f.order(now(), Some("b@x.io"), &[(f.burger, 150, 1)], true),
        ];

        let top = top_customers(&orders, 10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].total_spent, Money::from_major(200));
        assert_eq!(top[0].order_count, 2);
        assert_eq!(top_customers(&orders, 1).len(), 1);
    }

    #[test]
    fn top_products_rank_by_revenue() {
        let f = Fixture::new();
        let orders = vec![
            f.order(now(), None, &[(f.burger, 300, 1), (f.lassi, 80, 5)], true),
            f.order(now(), None, &[(f.lassi, 80, 1)], true),
        ];

        let top = top_products(&orders, 5);
        assert_eq!(top[0].name, "Lassi");
        assert_eq!(top[0].total_sold, 6);
        assert_eq!(top[0].revenue, Money::from_major(480));
        assert_eq!(top[1].name, "Burger");
    }

    #[test]
    fn dashboard_counts_today_and_pending() {
        let f = Fixture::new();
        let orders = vec![
            f.order(now(), None, &[(f.burger, 300, 1)], false),
            f.order(now() - Duration::days(3), None, &[(f.burger, 200, 1)], true),
        ];

        let stats = DashboardStats::from_orders(&orders, None, now());
        assert_eq!(stats.total_revenue, Money::from_major(200));
        assert_eq!(stats.orders_today, 1);
        assert_eq!(stats.pending_orders, 1);

        let narrowed = DashboardStats::from_orders(&orders, Some((now() - Duration::days(1), now())), now());
        assert_eq!(narrowed.total_revenue, Money::ZERO);

        let recent = recent_orders(&orders, 5);
        assert_eq!(recent[0].total, Money::from_major(300));
    }

    #[test]
    fn user_stats_ignore_cancelled_spend() {
        let f = Fixture::new();
        let mut delivered = f.order(now(), None, &[(f.burger, 300, 1)], true);
        let mut cancelled = f.order(now(), None, &[(f.burger, 100, 1)], false);
        let open = f.order(now(), None, &[(f.lassi, 80, 1)], false);

        for (order, status) in [(&mut delivered, OrderStatus::Delivered), (&mut cancelled, OrderStatus::Cancelled)] {
            let cmd = OrderCommand::ChangeStatus(ChangeStatus {
                tenant_id: f.tenant,
                order_id: order.id_typed(),
                status,
                occurred_at: now(),
            });
            order.execute(&cmd).unwrap();
        }
        let refund = OrderCommand::ChangePaymentStatus(ChangePaymentStatus {
            tenant_id: f.tenant,
            order_id: cancelled.id_typed(),
            payment_status: PaymentStatus::Refunded,
            occurred_at: now(),
        });
        cancelled.execute(&refund).unwrap();

        let stats = UserOrderStats::of([&delivered, &cancelled, &open]);
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.total_spent, Money::from_major(380));
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn average_rounds_to_nearest_minor_unit() {
        assert_eq!(average(Money::from_minor(10), 3), Money::from_minor(3));
        assert_eq!(average(Money::from_minor(11), 2), Money::from_minor(6));
        assert_eq!(average(Money::from_major(5), 0), Money::ZERO);
    }
}
