//! Order status state machine: who may do what to an order, and when.
//!
//! Every check here is local. A refused check means no request is sent.

use serde::{Deserialize, Serialize};

use crate::errors::{ServiceError, ServiceResult};
use crate::models::{Order, OrderLineItem, OrderStatus, ReturnStatus};

pub const REQUEST_ALREADY_ACTIVE: &str = "Request already active for this item";
pub const RETURNS_NOT_OPEN: &str = "Returns and exchanges open once the order is delivered";

/// Who a workflow call is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Actor {
    Customer { user_id: String },
    Vendor { vendor_id: String },
    Admin,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin)
    }
}

/// Controls a screen offers for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum OrderAction {
    Accept,
    Deliver,
    RequestCancellation,
    RequestReturn,
    ConfirmHandover,
}

/// Admin acceptance.
pub fn check_accept(order: &Order, actor: &Actor) -> ServiceResult<()> {
    if !actor.is_admin() {
        return Err(ServiceError::Forbidden(
            "Only admins can accept orders".to_string(),
        ));
    }
    if order.is_paid {
        return Err(ServiceError::InvalidOperation(format!(
            "Order {} is already accepted",
            order.id
        )));
    }
    Ok(())
}

/// Delivery by an admin or by a vendor fulfilling at least one line.
pub fn check_deliver(order: &Order, actor: &Actor) -> ServiceResult<()> {
    match actor {
        Actor::Admin => {}
        Actor::Vendor { vendor_id } if order.involves_vendor(vendor_id) => {}
        _ => {
            return Err(ServiceError::Forbidden(
                "Not authorized to deliver this order".to_string(),
            ))
        }
    }
    if !order.is_paid {
        return Err(ServiceError::InvalidOperation(
            "Order must be accepted before it can be delivered".to_string(),
        ));
    }
    if order.is_delivered {
        return Err(ServiceError::InvalidOperation(format!(
            "Order {} is already delivered",
            order.id
        )));
    }
    Ok(())
}

fn check_customer_owns(order: &Order, actor: &Actor) -> ServiceResult<()> {
    match actor {
        // Orders listed without an owner came from the caller's own listing.
        Actor::Customer { user_id } if order.user.is_none() || order.is_owned_by(user_id) => {
            Ok(())
        }
        _ => Err(ServiceError::Forbidden(
            "Only the customer who placed this order can do that".to_string(),
        )),
    }
}

/// Customer cancellation request.
pub fn check_cancellation(order: &Order, actor: &Actor) -> ServiceResult<()> {
    check_customer_owns(order, actor)?;
    if !order.order_status.allows_cancellation_request() || order.is_delivered {
        return Err(ServiceError::InvalidOperation(format!(
            "Orders that are {} can no longer be cancelled",
            order.order_status
        )));
    }
    if order
        .order_items
        .iter()
        .any(|item| item.return_status() == ReturnStatus::CancelRequested)
    {
        return Err(ServiceError::InvalidOperation(
            "Cancellation already requested for this order".to_string(),
        ));
    }
    Ok(())
}

/// Coarse order-level gate deciding whether return controls show at all.
pub fn returns_open(order: &Order) -> bool {
    order.is_delivered || order.order_status == OrderStatus::Returned
}

/// Two-level guard for opening a return/exchange request on one item.
///
/// The order must be past delivery, and the item must not carry any request
/// yet. The item check is the one that actually protects the backend.
pub fn return_gate<'a>(
    order: &'a Order,
    item_id: &str,
    actor: &Actor,
) -> ServiceResult<&'a OrderLineItem> {
    check_customer_owns(order, actor)?;
    if !returns_open(order) {
        return Err(ServiceError::InvalidOperation(RETURNS_NOT_OPEN.to_string()));
    }
    let item = order
        .item(item_id)
        .ok_or_else(|| ServiceError::NotFound(format!("Item {item_id} not found in order")))?;
    if item.return_status().has_request() {
        return Err(ServiceError::InvalidOperation(
            REQUEST_ALREADY_ACTIVE.to_string(),
        ));
    }
    Ok(item)
}

/// Customer confirms the item was handed to the pickup agent.
pub fn check_handover<'a>(
    order: &'a Order,
    item_id: &str,
    actor: &Actor,
) -> ServiceResult<&'a OrderLineItem> {
    check_customer_owns(order, actor)?;
    let item = order
        .item(item_id)
        .ok_or_else(|| ServiceError::NotFound(format!("Item {item_id} not found in order")))?;
    if !item.return_status().awaits_handover() {
        return Err(ServiceError::InvalidOperation(format!(
            "Item is not awaiting pickup (status: {})",
            item.return_status()
        )));
    }
    Ok(item)
}

/// Actions `actor` may take on `order` right now.
pub fn available_actions(order: &Order, actor: &Actor) -> Vec<OrderAction> {
    let mut actions = Vec::new();
    if check_accept(order, actor).is_ok() {
        actions.push(OrderAction::Accept);
    }
    if check_deliver(order, actor).is_ok() {
        actions.push(OrderAction::Deliver);
    }
    if check_cancellation(order, actor).is_ok() {
        actions.push(OrderAction::RequestCancellation);
    }
    if order
        .order_items
        .iter()
        .any(|item| return_gate(order, &item.id, actor).is_ok())
    {
        actions.push(OrderAction::RequestReturn);
    }
    if order
        .order_items
        .iter()
        .any(|item| check_handover(order, &item.id, actor).is_ok())
    {
        actions.push(OrderAction::ConfirmHandover);
    }
    actions
}

/// Whether the backend moving an order from `from` to `to` is a known step.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    match (from, to) {
        // From placed
        (Placed, Processing) => true,
        (Placed, Cancelled) => true,

        // From processing
        (Processing, Shipped) => true,
        (Processing, Delivered) => true,
        (Processing, Cancelled) => true,

        // From shipped
        (Shipped, OutForDelivery) => true,
        (Shipped, Delivered) => true,

        // From out for delivery
        (OutForDelivery, Delivered) => true,

        // From delivered
        (Delivered, Returned) => true,

        _ if from == to => true,

        _ => false,
    }
}

/// Same question for the per-item return sub-state.
pub fn is_valid_return_transition(from: ReturnStatus, to: ReturnStatus) -> bool {
    use ReturnStatus::*;
    match (from, to) {
        (None, CancelRequested | ReturnInitiated | ExchangeInitiated) => true,
        (CancelRequested, Approved | Rejected) => true,
        (ReturnInitiated | ExchangeInitiated, ReturnAcknowledged | Approved | Rejected) => true,
        (Approved, ReturnAcknowledged) => true,
        (ReturnAcknowledged, Returned) => true,
        _ if from == to => true,
        _ => false,
    }
}
