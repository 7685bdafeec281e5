use std::sync::Arc;

use tracing::instrument;

use super::{announce_status_changes, ViewContext};
use crate::errors::{ServiceError, ServiceResult};
use crate::lifecycle::RequestScope;
use crate::models::Order;
use crate::queries::{OrderSort, Query, VendorOrderSlice, VendorOrdersQuery};
use crate::services::order_status::{available_actions, Actor, OrderAction};
use crate::services::OrderService;

/// Vendor's incoming orders, each cut down to the vendor's own lines.
pub struct VendorOrdersView {
    ctx: ViewContext,
    service: OrderService,
    vendor_id: String,
    rows: Vec<(Order, VendorOrderSlice)>,
}

impl VendorOrdersView {
    pub fn new(ctx: ViewContext, service: OrderService, vendor_id: impl Into<String>) -> Self {
        Self {
            ctx,
            service,
            vendor_id: vendor_id.into(),
            rows: Vec::new(),
        }
    }

    pub fn scope(&self) -> Arc<RequestScope> {
        self.ctx.scope.clone()
    }

    fn actor(&self) -> Actor {
        Actor::Vendor {
            vendor_id: self.vendor_id.clone(),
        }
    }

    pub fn slices(&self) -> impl Iterator<Item = &VendorOrderSlice> {
        self.rows.iter().map(|(_, slice)| slice)
    }

    fn order(&self, order_id: &str) -> ServiceResult<&Order> {
        self.rows
            .iter()
            .map(|(order, _)| order)
            .find(|order| order.id == order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))
    }

    pub fn actions(&self, order_id: &str) -> ServiceResult<Vec<OrderAction>> {
        Ok(available_actions(self.order(order_id)?, &self.actor()))
    }

    #[instrument(skip(self), fields(vendor_id = %self.vendor_id))]
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        let query = VendorOrdersQuery {
            vendor_id: self.vendor_id.clone(),
            sort: OrderSort::NewestFirst,
        };
        let api = self.ctx.api.clone();
        let fresh = self.ctx.scope.run(query.execute(api.as_ref())).await?;

        let before: Vec<Order> = self.rows.iter().map(|(o, _)| o.clone()).collect();
        let after: Vec<Order> = fresh.iter().map(|(o, _)| o.clone()).collect();
        announce_status_changes(&self.ctx.events, &before, &after).await;

        self.rows = fresh;
        Ok(())
    }

    pub async fn deliver(&mut self, order_id: &str) -> ServiceResult<()> {
        let order = self.order(order_id)?.clone();
        let actor = self.actor();
        let service = self.service.clone();
        self.ctx
            .scope
            .run(service.deliver(&order, &actor))
            .await?;
        if let Err(err) = self.refresh().await {
            self.ctx.refetch_failed(&err).await;
        }
        Ok(())
    }
}

impl Drop for VendorOrdersView {
    fn drop(&mut self) {
        self.ctx.scope.cancel();
    }
}
