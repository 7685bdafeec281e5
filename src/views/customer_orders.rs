use std::sync::Arc;

use tracing::instrument;

use super::{announce_status_changes, find_order, refresh_detail, ViewContext};
use crate::errors::ServiceResult;
use crate::lifecycle::RequestScope;
use crate::models::Order;
use crate::queries::{summarize, MyOrdersQuery, OrderSummary, Query};
use crate::services::order_status::{available_actions, Actor, OrderAction};
use crate::services::orders::CancellationDraft;
use crate::services::returns::{refund_summary, RefundSummary, ReturnDraft};
use crate::services::{OrderService, Rejected, ReturnService};

/// "My orders" screen with its order detail panel.
pub struct CustomerOrdersView {
    ctx: ViewContext,
    actor: Actor,
    orders_service: OrderService,
    returns_service: ReturnService,
    orders: Vec<Order>,
    detail: Option<Order>,
}

impl CustomerOrdersView {
    pub fn new(ctx: ViewContext, orders_service: OrderService, actor: Actor) -> Self {
        let returns_service = ReturnService::new(ctx.api.clone(), ctx.events.clone());
        Self {
            ctx,
            actor,
            orders_service,
            returns_service,
            orders: Vec::new(),
            detail: None,
        }
    }

    pub fn scope(&self) -> Arc<RequestScope> {
        self.ctx.scope.clone()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn summaries(&self) -> Vec<OrderSummary> {
        self.orders.iter().map(summarize).collect()
    }

    pub fn detail(&self) -> Option<&Order> {
        self.detail.as_ref()
    }

    pub fn actions(&self, order_id: &str) -> ServiceResult<Vec<OrderAction>> {
        Ok(available_actions(
            find_order(&self.orders, order_id)?,
            &self.actor,
        ))
    }

    /// Refund lines of the open detail panel.
    pub fn refunds(&self) -> Vec<RefundSummary> {
        self.detail
            .iter()
            .flat_map(|order| order.order_items.iter().filter_map(refund_summary))
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        let query = MyOrdersQuery::default();
        let api = self.ctx.api.clone();
        let fresh = self.ctx.scope.run(query.execute(api.as_ref())).await?;
        announce_status_changes(&self.ctx.events, &self.orders, &fresh).await;
        refresh_detail(&mut self.detail, &fresh);
        self.orders = fresh;
        Ok(())
    }

    async fn refetch_after_write(&mut self) {
        if let Err(err) = self.refresh().await {
            self.ctx.refetch_failed(&err).await;
        }
    }

    pub fn open_detail(&mut self, order_id: &str) -> ServiceResult<&Order> {
        let order = find_order(&self.orders, order_id)?.clone();
        Ok(self.detail.insert(order))
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    pub async fn open_cancellation(&self, order_id: &str) -> ServiceResult<CancellationDraft> {
        let order = find_order(&self.orders, order_id)?;
        self.orders_service
            .open_cancellation(order, &self.actor)
            .await
    }

    pub async fn submit_cancellation(
        &mut self,
        draft: CancellationDraft,
    ) -> Result<(), Rejected<CancellationDraft>> {
        let service = self.orders_service.clone();
        self.ctx
            .scope
            .run(service.submit_cancellation(draft))
            .await?;
        self.refetch_after_write().await;
        Ok(())
    }

    pub async fn open_return(&self, order_id: &str, item_id: &str) -> ServiceResult<ReturnDraft> {
        let order = find_order(&self.orders, order_id)?;
        self.returns_service
            .open_return_modal(order, item_id, &self.actor)
            .await
    }

    /// Submits the return modal and refetches both the list and the open
    /// detail panel.
    pub async fn submit_return(
        &mut self,
        draft: ReturnDraft,
    ) -> Result<(), Rejected<ReturnDraft>> {
        let service = self.returns_service.clone();
        self.ctx
            .scope
            .run(service.submit_return_request(draft))
            .await?;
        self.refetch_after_write().await;
        Ok(())
    }

    pub async fn confirm_handover(&mut self, order_id: &str, item_id: &str) -> ServiceResult<()> {
        let order = find_order(&self.orders, order_id)?.clone();
        let service = self.returns_service.clone();
        self.ctx
            .scope
            .run(service.confirm_handover(&order, item_id, &self.actor))
            .await?;
        self.refetch_after_write().await;
        Ok(())
    }
}

impl Drop for CustomerOrdersView {
    fn drop(&mut self) {
        self.ctx.scope.cancel();
    }
}
