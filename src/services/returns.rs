use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument};

use super::order_status::{check_handover, return_gate, Actor};
use super::{fail, report, Rejected};
use crate::api::MarketplaceApi;
use crate::errors::{ServiceError, ServiceResult};
use crate::events::{Event, EventSender};
use crate::models::{
    Order, OrderLineItem, ReturnRequest, ReturnRequestType, ReturnStatus, ReturnStatusUpdate,
};

/// Open return/exchange modal for one line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnDraft {
    order_id: String,
    item_id: String,
    pub kind: Option<ReturnRequestType>,
    pub reason: String,
    pub comments: String,
}

impl ReturnDraft {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn with_kind(mut self, kind: ReturnRequestType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = comments.into();
        self
    }

    /// Request body, or the message the form shows instead.
    fn to_request(&self) -> ServiceResult<ReturnRequest> {
        let kind = self.kind.ok_or_else(|| {
            ServiceError::ValidationError("Please select a request type".to_string())
        })?;
        let reason = self.reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "Please provide a reason".to_string(),
            ));
        }
        let comments = self.comments.trim();
        let reason = if comments.is_empty() {
            reason.to_string()
        } else {
            format!("{reason} | {comments}")
        };
        Ok(ReturnRequest {
            item_id: self.item_id.clone(),
            kind,
            reason,
        })
    }
}

/// Refund details shown once an item is fully returned. Never computed here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundSummary {
    pub item_id: String,
    pub amount: Decimal,
    pub refunded_at: Option<DateTime<Utc>>,
}

pub fn refund_summary(item: &OrderLineItem) -> Option<RefundSummary> {
    let rx = item.return_exchange.as_ref()?;
    if rx.status != ReturnStatus::Returned {
        return None;
    }
    Some(RefundSummary {
        item_id: item.id.clone(),
        amount: rx.refund_amount?,
        refunded_at: rx.refunded_at,
    })
}

#[derive(Clone)]
pub struct ReturnService {
    api: Arc<dyn MarketplaceApi>,
    events: EventSender,
}

impl ReturnService {
    pub fn new(api: Arc<dyn MarketplaceApi>, events: EventSender) -> Self {
        Self { api, events }
    }

    /// Opens the modal for `item_id`, or refuses with a toast. Nothing is sent.
    #[instrument(skip(self, order, actor), fields(order_id = %order.id))]
    pub async fn open_return_modal(
        &self,
        order: &Order,
        item_id: &str,
        actor: &Actor,
    ) -> ServiceResult<ReturnDraft> {
        match return_gate(order, item_id, actor) {
            Ok(item) => {
                debug!(item_id = %item.id, "return modal opened");
                Ok(ReturnDraft {
                    order_id: order.id.clone(),
                    item_id: item.id.clone(),
                    kind: None,
                    reason: String::new(),
                    comments: String::new(),
                })
            }
            Err(err) => {
                fail(&self.events, "request_return", &err).await;
                Err(err)
            }
        }
    }

    /// Submits the modal. The draft is consumed; it comes back only when the
    /// form failed validation and nothing was sent.
    #[instrument(skip(self, draft), fields(order_id = %draft.order_id, item_id = %draft.item_id))]
    pub async fn submit_return_request(
        &self,
        draft: ReturnDraft,
    ) -> Result<(), Rejected<ReturnDraft>> {
        let request = match draft.to_request() {
            Ok(request) => request,
            Err(err) => {
                fail(&self.events, "request_return", &err).await;
                return Err(Rejected::kept(err, draft));
            }
        };

        let result = self.api.submit_return(&draft.order_id, &request).await;
        let label = match request.kind {
            ReturnRequestType::Return => "Return request submitted",
            ReturnRequestType::Exchange => "Exchange request submitted",
            ReturnRequestType::Cancel => "Cancellation request submitted",
        };
        report(&self.events, "request_return", result, label)
            .await
            .map_err(Rejected::sent)?;

        self.events
            .emit(Event::ReturnRequested {
                order_id: draft.order_id,
                item_id: request.item_id,
                kind: request.kind,
            })
            .await;
        Ok(())
    }

    /// Customer confirms the pickup handover.
    #[instrument(skip(self, order, actor), fields(order_id = %order.id))]
    pub async fn confirm_handover(
        &self,
        order: &Order,
        item_id: &str,
        actor: &Actor,
    ) -> ServiceResult<()> {
        let item = match check_handover(order, item_id, actor) {
            Ok(item) => item,
            Err(err) => {
                fail(&self.events, "confirm_handover", &err).await;
                return Err(err);
            }
        };

        let update = ReturnStatusUpdate {
            item_id: item.id.clone(),
            status: ReturnStatus::ReturnAcknowledged,
        };
        let result = self.api.update_return_status(&order.id, &update).await;
        report(
            &self.events,
            "confirm_handover",
            result,
            "Handover confirmed",
        )
        .await?;

        self.events
            .emit(Event::HandoverConfirmed {
                order_id: order.id.clone(),
                item_id: update.item_id,
            })
            .await;
        Ok(())
    }
}
