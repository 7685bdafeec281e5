use std::sync::Arc;

use tracing::instrument;

use super::{announce_status_changes, find_order, ViewContext};
use crate::errors::ServiceResult;
use crate::lifecycle::RequestScope;
use crate::models::Order;
use crate::queries::{
    order_stats, return_requests, summarize, AllOrdersQuery, OrderFilter, OrderSort, OrderStats,
    OrderSummary, Query, ReturnRequestRow,
};
use crate::services::order_status::{available_actions, Actor, OrderAction};
use crate::services::OrderService;

/// Admin order table: acceptance and delivery.
///
/// Writes go out on behalf of the session's actor, so a non-admin session is
/// refused locally before any request is sent.
pub struct AdminOrdersView {
    ctx: ViewContext,
    service: OrderService,
    actor: Actor,
    query: AllOrdersQuery,
    orders: Vec<Order>,
}

impl AdminOrdersView {
    pub fn new(ctx: ViewContext, service: OrderService, actor: Actor) -> Self {
        Self {
            ctx,
            service,
            actor,
            query: AllOrdersQuery::default(),
            orders: Vec::new(),
        }
    }

    pub fn scope(&self) -> Arc<RequestScope> {
        self.ctx.scope.clone()
    }

    /// Takes effect on the next refresh.
    pub fn set_filter(&mut self, filter: OrderFilter, sort: OrderSort) {
        self.query = AllOrdersQuery { filter, sort };
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn summaries(&self) -> Vec<OrderSummary> {
        self.orders.iter().map(summarize).collect()
    }

    pub fn stats(&self) -> OrderStats {
        order_stats(&self.orders)
    }

    pub fn return_requests(&self) -> Vec<ReturnRequestRow> {
        return_requests(&self.orders)
    }

    pub fn actions(&self, order_id: &str) -> ServiceResult<Vec<OrderAction>> {
        Ok(available_actions(
            find_order(&self.orders, order_id)?,
            &self.actor,
        ))
    }

    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        let api = self.ctx.api.clone();
        let fresh = self
            .ctx
            .scope
            .run(self.query.execute(api.as_ref()))
            .await?;
        announce_status_changes(&self.ctx.events, &self.orders, &fresh).await;
        self.orders = fresh;
        Ok(())
    }

    async fn refetch_after_write(&mut self) {
        if let Err(err) = self.refresh().await {
            self.ctx.refetch_failed(&err).await;
        }
    }

    pub async fn accept(&mut self, order_id: &str) -> ServiceResult<()> {
        let order = find_order(&self.orders, order_id)?.clone();
        let service = self.service.clone();
        self.ctx
            .scope
            .run(service.accept(&order, &self.actor))
            .await?;
        self.refetch_after_write().await;
        Ok(())
    }

    pub async fn deliver(&mut self, order_id: &str) -> ServiceResult<()> {
        let order = find_order(&self.orders, order_id)?.clone();
        let service = self.service.clone();
        self.ctx
            .scope
            .run(service.deliver(&order, &self.actor))
            .await?;
        self.refetch_after_write().await;
        Ok(())
    }
}

impl Drop for AdminOrdersView {
    fn drop(&mut self) {
        self.ctx.scope.cancel();
    }
}
