//! Screen controllers.
//!
//! A view owns the list it displays and a [`RequestScope`] for the requests it
//! issues. After each of its own writes it refetches instead of patching the
//! list locally, so what it shows is always what the server returned.

pub mod admin_orders;
pub mod coupons;
pub mod customer_orders;
pub mod vendor_orders;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::api::MarketplaceApi;
use crate::errors::ServiceResult;
use crate::events::{Event, EventSender};
use crate::lifecycle::RequestScope;
use crate::models::Order;
use crate::services::fail;
use crate::services::order_status::is_valid_transition;

pub use admin_orders::AdminOrdersView;
pub use coupons::{AdminCouponsView, VendorOffersView};
pub use customer_orders::CustomerOrdersView;
pub use vendor_orders::VendorOrdersView;

/// Dependencies every view carries.
#[derive(Clone)]
pub struct ViewContext {
    pub api: Arc<dyn MarketplaceApi>,
    pub events: EventSender,
    pub scope: Arc<RequestScope>,
}

impl ViewContext {
    pub fn new(api: Arc<dyn MarketplaceApi>, events: EventSender) -> Self {
        Self {
            api,
            events,
            scope: Arc::new(RequestScope::new()),
        }
    }

    /// Reports a failed refetch without failing the write that preceded it.
    pub(crate) async fn refetch_failed(&self, err: &crate::errors::ServiceError) {
        fail(&self.events, "refresh", err).await;
    }
}

/// Emits `OrderStatusChanged` for every order whose label moved between two
/// fetches, and warns about moves outside the known graph.
pub(crate) async fn announce_status_changes(events: &EventSender, before: &[Order], after: &[Order]) {
    let previous: HashMap<&str, _> = before
        .iter()
        .map(|o| (o.id.as_str(), o.order_status))
        .collect();
    for order in after {
        let Some(&old_status) = previous.get(order.id.as_str()) else {
            continue;
        };
        if old_status == order.order_status {
            continue;
        }
        if !is_valid_transition(old_status, order.order_status) {
            warn!(
                order_id = %order.id,
                from = %old_status,
                to = %order.order_status,
                "unexpected order status transition"
            );
        }
        events
            .emit(Event::OrderStatusChanged {
                order_id: order.id.clone(),
                old_status,
                new_status: order.order_status,
            })
            .await;
    }
}

/// Replaces `slot` with the fresh copy of the same order, or clears it when
/// the order is gone.
pub(crate) fn refresh_detail(slot: &mut Option<Order>, orders: &[Order]) {
    if let Some(open) = slot.as_ref() {
        *slot = orders.iter().find(|o| o.id == open.id).cloned();
    }
}

pub(crate) fn find_order<'a>(orders: &'a [Order], order_id: &str) -> ServiceResult<&'a Order> {
    orders
        .iter()
        .find(|o| o.id == order_id)
        .ok_or_else(|| crate::errors::ServiceError::NotFound(format!("Order {order_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::drain;
    use crate::models::order::fixtures::order;
    use crate::models::OrderStatus;

    #[tokio::test]
    async fn status_moves_are_announced() {
        let (events, mut rx) = EventSender::channel(8);
        let before = vec![order("o1"), order("o2")];
        let mut moved = order("o1");
        moved.order_status = OrderStatus::Processing;
        let after = vec![moved, order("o2"), order("o3")];

        announce_status_changes(&events, &before, &after).await;

        assert_eq!(
            drain(&mut rx),
            vec![Event::OrderStatusChanged {
                order_id: "o1".into(),
                old_status: OrderStatus::Placed,
                new_status: OrderStatus::Processing,
            }]
        );
    }

    #[test]
    fn detail_follows_the_fresh_list() {
        let mut slot = Some(order("o1"));
        let mut fresh = order("o1");
        fresh.is_paid = true;
        refresh_detail(&mut slot, &[fresh]);
        assert!(slot.as_ref().is_some_and(|o| o.is_paid));

        refresh_detail(&mut slot, &[]);
        assert!(slot.is_none());
    }
}
