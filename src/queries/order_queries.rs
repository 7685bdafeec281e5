use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::Query;
use crate::api::MarketplaceApi;
use crate::errors::ServiceError;
use crate::models::{
    Order, OrderAcceptanceState, OrderLineItem, OrderStatus, PaymentMethod, ReturnStatus,
};
use crate::services::returns::{refund_summary, RefundSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OrderSort {
    #[default]
    NewestFirst,
    OldestFirst,
    TotalDesc,
}

/// Local filter over a fetched order list. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub acceptance: Option<OrderAcceptanceState>,
    pub vendor_id: Option<String>,
    pub customer_id: Option<String>,
    /// Only orders with at least one item carrying a request.
    pub with_open_requests: bool,
    /// Case-insensitive match on order id, item names and city.
    pub search: Option<String>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        if self.status.is_some_and(|s| s != order.order_status) {
            return false;
        }
        if self.acceptance.is_some_and(|a| a != order.acceptance()) {
            return false;
        }
        if let Some(vendor) = &self.vendor_id {
            if !order.involves_vendor(vendor) {
                return false;
            }
        }
        if let Some(customer) = &self.customer_id {
            if !order.is_owned_by(customer) {
                return false;
            }
        }
        if self.with_open_requests
            && !order
                .order_items
                .iter()
                .any(|item| item.return_status().has_request() && !item.return_status().is_resolved())
        {
            return false;
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = order.id.to_lowercase().contains(&term)
                || order.shipping_address.city.to_lowercase().contains(&term)
                || order
                    .order_items
                    .iter()
                    .any(|item| item.name.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, orders: Vec<Order>, sort: OrderSort) -> Vec<Order> {
        let mut matched: Vec<Order> = orders.into_iter().filter(|o| self.matches(o)).collect();
        sort_orders(&mut matched, sort);
        matched
    }
}

pub fn sort_orders(orders: &mut [Order], sort: OrderSort) {
    match sort {
        // Orders without a timestamp keep their relative order at the end.
        OrderSort::NewestFirst => orders.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        OrderSort::OldestFirst => orders.sort_by(|a, b| match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }),
        OrderSort::TotalDesc => orders.sort_by(|a, b| b.total_price.cmp(&a.total_price)),
    }
}

/// One row of an order table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub badge: &'static str,
    pub item_count: u32,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub ship_to: String,
    pub open_requests: usize,
}

pub fn summarize(order: &Order) -> OrderSummary {
    OrderSummary {
        id: order.id.clone(),
        created_at: order.created_at,
        status: order.order_status,
        badge: order.acceptance().badge(),
        item_count: order.item_count(),
        total_price: order.total_price,
        payment_method: order.payment_method,
        ship_to: order.shipping_address.one_line(),
        open_requests: order
            .order_items
            .iter()
            .filter(|item| {
                let status = item.return_status();
                status.has_request() && !status.is_resolved()
            })
            .count(),
    }
}

/// The part of an order one vendor fulfils.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorOrderSlice {
    pub order_id: String,
    pub status: OrderStatus,
    pub badge: &'static str,
    pub items: Vec<OrderLineItem>,
    pub vendor_subtotal: Decimal,
    pub ship_to: String,
}

pub fn vendor_slice(order: &Order, vendor_id: &str) -> Option<VendorOrderSlice> {
    let items: Vec<OrderLineItem> = order
        .order_items
        .iter()
        .filter(|item| item.is_sold_by(vendor_id))
        .cloned()
        .collect();
    if items.is_empty() {
        return None;
    }
    Some(VendorOrderSlice {
        order_id: order.id.clone(),
        status: order.order_status,
        badge: order.acceptance().badge(),
        vendor_subtotal: items.iter().map(OrderLineItem::line_total).sum(),
        items,
        ship_to: order.shipping_address.one_line(),
    })
}

/// One item-level request, for the admin returns table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequestRow {
    pub order_id: String,
    pub item_id: String,
    pub name: String,
    pub status: ReturnStatus,
    pub reason: Option<String>,
    pub refund: Option<RefundSummary>,
}

pub fn return_requests(orders: &[Order]) -> Vec<ReturnRequestRow> {
    orders
        .iter()
        .flat_map(|order| {
            order
                .order_items
                .iter()
                .filter(|item| item.return_status().has_request())
                .map(move |item| ReturnRequestRow {
                    order_id: order.id.clone(),
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                    status: item.return_status(),
                    reason: item.return_exchange.as_ref().and_then(|rx| rx.reason.clone()),
                    refund: refund_summary(item),
                })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub accepted: usize,
    pub delivered: usize,
    pub open_requests: usize,
    /// Sum of `totalPrice` over accepted and delivered orders.
    pub accepted_revenue: Decimal,
}

pub fn order_stats(orders: &[Order]) -> OrderStats {
    orders.iter().fold(OrderStats::default(), |mut stats, order| {
        stats.total += 1;
        match order.acceptance() {
            OrderAcceptanceState::Pending => stats.pending += 1,
            OrderAcceptanceState::Accepted => stats.accepted += 1,
            OrderAcceptanceState::Delivered => stats.delivered += 1,
        }
        if order.is_paid {
            stats.accepted_revenue += order.total_price;
        }
        stats.open_requests += summarize(order).open_requests;
        stats
    })
}

fn log_inconsistencies(orders: &[Order]) {
    for issue in orders.iter().flat_map(Order::consistency_issues) {
        warn!(%issue, "inconsistent order from server");
    }
}

/// The signed-in customer's orders.
#[derive(Debug, Clone, Default)]
pub struct MyOrdersQuery {
    pub sort: OrderSort,
}

#[async_trait]
impl Query for MyOrdersQuery {
    type Result = Vec<Order>;

    #[instrument(skip(self, api))]
    async fn execute(&self, api: &dyn MarketplaceApi) -> Result<Self::Result, ServiceError> {
        debug!("Executing MyOrdersQuery");
        let mut orders = api.my_orders().await?;
        log_inconsistencies(&orders);
        sort_orders(&mut orders, self.sort);
        Ok(orders)
    }
}

/// Every order, admin view.
#[derive(Debug, Clone, Default)]
pub struct AllOrdersQuery {
    pub filter: OrderFilter,
    pub sort: OrderSort,
}

#[async_trait]
impl Query for AllOrdersQuery {
    type Result = Vec<Order>;

    #[instrument(skip(self, api))]
    async fn execute(&self, api: &dyn MarketplaceApi) -> Result<Self::Result, ServiceError> {
        debug!("Executing AllOrdersQuery");
        let orders = api.all_orders().await?;
        log_inconsistencies(&orders);
        Ok(self.filter.apply(orders, self.sort))
    }
}

/// Orders containing at least one of the vendor's items, sliced to them.
#[derive(Debug, Clone)]
pub struct VendorOrdersQuery {
    pub vendor_id: String,
    pub sort: OrderSort,
}

#[async_trait]
impl Query for VendorOrdersQuery {
    type Result = Vec<(Order, VendorOrderSlice)>;

    #[instrument(skip(self, api), fields(vendor_id = %self.vendor_id))]
    async fn execute(&self, api: &dyn MarketplaceApi) -> Result<Self::Result, ServiceError> {
        debug!("Executing VendorOrdersQuery");
        let filter = OrderFilter {
            vendor_id: Some(self.vendor_id.clone()),
            ..Default::default()
        };
        let orders = filter.apply(api.all_orders().await?, self.sort);
        Ok(orders
            .into_iter()
            .filter_map(|order| {
                let slice = vendor_slice(&order, &self.vendor_id)?;
                Some((order, slice))
            })
            .collect())
    }
}

/// Item-level requests across all orders.
#[derive(Debug, Clone, Default)]
pub struct ReturnRequestsQuery {
    pub only_open: bool,
}

#[async_trait]
impl Query for ReturnRequestsQuery {
    type Result = Vec<ReturnRequestRow>;

    #[instrument(skip(self, api))]
    async fn execute(&self, api: &dyn MarketplaceApi) -> Result<Self::Result, ServiceError> {
        debug!("Executing ReturnRequestsQuery");
        let orders = api.all_orders().await?;
        let mut rows = return_requests(&orders);
        if self.only_open {
            rows.retain(|row| !row.status.is_resolved());
        }
        Ok(rows)
    }
}
