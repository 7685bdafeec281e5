use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use super::order_status::{check_accept, check_cancellation, check_deliver, Actor};
use super::{fail, report, Rejected};
use crate::api::{CancellationRequest, MarketplaceApi};
use crate::errors::{ServiceError, ServiceResult};
use crate::events::{Event, EventSender};
use crate::models::{
    NewOrder, NewOrderItem, Order, PaymentMethod, ShippingAddress, VendorOffer,
};
use crate::pricing::{coupon_discount, items_subtotal, round_money, PricingRules};
use crate::state::CartItem;

/// Open cancellation form for one order.
///
/// Owned by the caller and consumed by [`OrderService::submit_cancellation`],
/// so one form can be submitted at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationDraft {
    order_id: String,
    pub reason: String,
    pub description: String,
}

impl CancellationDraft {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Everything checkout collects before the order is created.
#[derive(Debug, Clone)]
pub struct Checkout<'a> {
    pub items: &'a [CartItem],
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub coupon: Option<&'a VendorOffer>,
    pub today: NaiveDate,
}

#[derive(Clone)]
pub struct OrderService {
    api: Arc<dyn MarketplaceApi>,
    events: EventSender,
    pricing: PricingRules,
}

impl OrderService {
    pub fn new(api: Arc<dyn MarketplaceApi>, events: EventSender, pricing: PricingRules) -> Self {
        Self {
            api,
            events,
            pricing,
        }
    }

    pub fn pricing(&self) -> PricingRules {
        self.pricing
    }

    /// Builds the `POST /api/orders` body: line snapshot, address snapshot,
    /// coupon discount off the items price, then tax and shipping.
    pub fn prepare_order(&self, checkout: Checkout<'_>) -> ServiceResult<NewOrder> {
        if checkout.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Your cart is empty".to_string(),
            ));
        }

        let subtotal = items_subtotal(checkout.items.iter().map(|i| (i.price, i.qty)));
        let discount = match checkout.coupon {
            Some(offer) => {
                let eligible = match offer.vendor_id() {
                    Some(vendor) => items_subtotal(
                        checkout
                            .items
                            .iter()
                            .filter(|i| i.vendor.as_ref().is_some_and(|v| v == vendor))
                            .map(|i| (i.price, i.qty)),
                    ),
                    None => subtotal,
                };
                let discount = coupon_discount(offer, eligible, checkout.today);
                if discount.is_zero() {
                    return Err(ServiceError::ValidationError(format!(
                        "Coupon {} does not apply to this order",
                        offer.code
                    )));
                }
                Some(discount)
            }
            None => None,
        };

        let items_price = round_money(subtotal - discount.unwrap_or(Decimal::ZERO));
        let totals = self.pricing.totals(items_price);

        Ok(NewOrder {
            order_items: checkout
                .items
                .iter()
                .map(|item| NewOrderItem {
                    product: item.product.clone(),
                    name: item.name.clone(),
                    image: item.image.clone(),
                    price: item.price,
                    qty: item.qty,
                    vendor: item.vendor.clone(),
                })
                .collect(),
            shipping_address: checkout.shipping_address,
            payment_method: checkout.payment_method,
            items_price: totals.items_price,
            tax_price: totals.tax_price,
            shipping_price: totals.shipping_price,
            total_price: totals.total_price,
            coupon_code: checkout.coupon.map(|c| c.code.clone()),
            discount,
        })
    }

    #[instrument(skip(self, order), fields(total = %order.total_price))]
    pub async fn place_order(&self, order: &NewOrder) -> ServiceResult<Order> {
        let result = self.api.create_order(order).await;
        let placed = report(&self.events, "place_order", result, "Order placed successfully").await?;
        info!(order_id = %placed.id, "order placed");
        self.events.emit(Event::OrderPlaced(placed.id.clone())).await;
        Ok(placed)
    }

    /// Admin acceptance (`isPaid` on the wire).
    #[instrument(skip(self, order, actor), fields(order_id = %order.id))]
    pub async fn accept(&self, order: &Order, actor: &Actor) -> ServiceResult<()> {
        if let Err(err) = check_accept(order, actor) {
            fail(&self.events, "accept_order", &err).await;
            return Err(err);
        }
        let result = self.api.accept_order(&order.id).await;
        report(&self.events, "accept_order", result, "Order accepted").await?;
        self.events.emit(Event::OrderAccepted(order.id.clone())).await;
        Ok(())
    }

    #[instrument(skip(self, order, actor), fields(order_id = %order.id))]
    pub async fn deliver(&self, order: &Order, actor: &Actor) -> ServiceResult<()> {
        if let Err(err) = check_deliver(order, actor) {
            fail(&self.events, "deliver_order", &err).await;
            return Err(err);
        }
        let result = self.api.deliver_order(&order.id).await;
        report(&self.events, "deliver_order", result, "Order marked as delivered").await?;
        self.events.emit(Event::OrderDelivered(order.id.clone())).await;
        Ok(())
    }

    /// Opens the cancellation form, or refuses with a toast.
    pub async fn open_cancellation(
        &self,
        order: &Order,
        actor: &Actor,
    ) -> ServiceResult<CancellationDraft> {
        if let Err(err) = check_cancellation(order, actor) {
            fail(&self.events, "request_cancellation", &err).await;
            return Err(err);
        }
        Ok(CancellationDraft {
            order_id: order.id.clone(),
            reason: String::new(),
            description: String::new(),
        })
    }

    #[instrument(skip(self, draft), fields(order_id = %draft.order_id))]
    pub async fn submit_cancellation(
        &self,
        draft: CancellationDraft,
    ) -> Result<(), Rejected<CancellationDraft>> {
        let reason = draft.reason.trim().to_string();
        if reason.is_empty() {
            let err = ServiceError::ValidationError(
                "Please provide a reason for cancellation".to_string(),
            );
            fail(&self.events, "request_cancellation", &err).await;
            return Err(Rejected::kept(err, draft));
        }

        let body = CancellationRequest::request(reason, draft.description.trim());
        let result = self.api.request_cancellation(&draft.order_id, &body).await;
        match report(
            &self.events,
            "request_cancellation",
            result,
            "Cancellation request submitted",
        )
        .await
        {
            Ok(()) => {
                self.events
                    .emit(Event::CancellationRequested(draft.order_id))
                    .await;
                Ok(())
            }
            Err(err) => {
                warn!(order_id = %draft.order_id, "cancellation request failed");
                Err(Rejected::sent(err))
            }
        }
    }
}
