use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::{EntityRef, ProductRef, UserRef};
use super::returns::{ReturnExchange, ReturnStatus};

/// Customer-facing lifecycle label carried in `orderStatus`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum OrderStatus {
    #[default]
    Placed,
    Processing,
    Shipped,
    #[serde(rename = "Out for Delivery")]
    #[strum(serialize = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Returned)
    }

    /// Statuses in which the customer may still ask for a cancellation.
    pub fn allows_cancellation_request(self) -> bool {
        matches!(self, Self::Placed | Self::Processing)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PaymentMethod {
    #[serde(alias = "Card", alias = "CARD")]
    Card,
    #[serde(alias = "UPI", alias = "Upi")]
    Upi,
    #[serde(alias = "COD", alias = "Cod")]
    Cod,
}

/// Address snapshot embedded in an order at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub pincode: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub country: String,
}

impl ShippingAddress {
    pub fn one_line(&self) -> String {
        [
            self.address.as_str(),
            self.city.as_str(),
            self.pincode.as_str(),
            self.country.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub product: ProductRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub price: Decimal,
    #[serde(alias = "qty")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_exchange: Option<ReturnExchange>,
}

impl OrderLineItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Return/exchange sub-state; an absent record reads as `none`.
    pub fn return_status(&self) -> ReturnStatus {
        self.return_exchange
            .as_ref()
            .map(|rx| rx.status)
            .unwrap_or_default()
    }

    pub fn is_sold_by(&self, vendor_id: &str) -> bool {
        self.vendor.as_ref().is_some_and(|v| v == vendor_id)
    }
}

/// Admin acceptance as seen by the rest of the crate.
///
/// The wire keeps `isPaid`/`paidAt` (and the `/pay` endpoint) even though the
/// flag means "an admin accepted this order", not "payment captured".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum OrderAcceptanceState {
    Pending,
    Accepted,
    Delivered,
}

impl OrderAcceptanceState {
    /// Text of the admin table status badge.
    pub fn badge(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Delivered => "Delivered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub order_items: Vec<OrderLineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub items_price: Decimal,
    #[serde(default)]
    pub tax_price: Decimal,
    #[serde(default)]
    pub shipping_price: Decimal,
    #[serde(default)]
    pub total_price: Decimal,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_delivered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order_status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn acceptance(&self) -> OrderAcceptanceState {
        if self.is_delivered {
            OrderAcceptanceState::Delivered
        } else if self.is_paid {
            OrderAcceptanceState::Accepted
        } else {
            OrderAcceptanceState::Pending
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.is_paid
    }

    pub fn accepted_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn item(&self, item_id: &str) -> Option<&OrderLineItem> {
        self.order_items.iter().find(|item| item.id == item_id)
    }

    pub fn item_count(&self) -> u32 {
        self.order_items.iter().map(|item| item.quantity).sum()
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u == user_id)
    }

    /// Whether any line item is fulfilled by `vendor_id`.
    pub fn involves_vendor(&self, vendor_id: &str) -> bool {
        self.order_items.iter().any(|item| item.is_sold_by(vendor_id))
    }

    /// Problems with the record as received; an empty list means consistent.
    pub fn consistency_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.is_delivered && !self.is_paid {
            issues.push(format!("order {} is delivered but not accepted", self.id));
        }
        let expected_total = self.items_price + self.tax_price + self.shipping_price;
        if expected_total != self.total_price {
            issues.push(format!(
                "order {} total {} does not match components {}",
                self.id, self.total_price, expected_total
            ));
        }
        issues
    }
}

/// Line of `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub product: ProductRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub price: Decimal,
    pub qty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<EntityRef>,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub order_items: Vec<NewOrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
}


#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::str::FromStr;

    fn wire_order() -> serde_json::Value {
        json!({
            "_id": "6601",
            "user": {"_id": "u1", "name": "Asha"},
            "orderItems": [{
                "_id": "li1",
                "product": {"_id": "p1", "name": "Kettle"},
                "name": "Kettle",
                "image": "/images/kettle.jpg",
                "price": 100,
                "qty": 1,
                "vendor": "v1",
                "returnExchange": {"status": "return_initiated", "reason": "Damaged | lid cracked"}
            }],
            "shippingAddress": {"address": "1 Lake View", "city": "Kochi", "pincode": "682001", "phone": "9000000000", "country": "India"},
            "paymentMethod": "upi",
            "itemsPrice": 100,
            "taxPrice": 8,
            "shippingPrice": 0,
            "totalPrice": 108,
            "isPaid": true,
            "paidAt": "2024-03-05T10:12:00.000Z",
            "isDelivered": false,
            "orderStatus": "Out for Delivery"
        })
    }

    #[test]
    fn decodes_wire_order_with_populated_refs() {
        let order: Order = serde_json::from_value(wire_order()).unwrap();
        assert_eq!(order.user.as_ref().map(|u| u.as_str()), Some("u1"));
        assert_eq!(order.order_items[0].product, "p1");
        assert_eq!(order.order_items[0].quantity, 1);
        assert_eq!(order.order_status, OrderStatus::OutForDelivery);
        assert_eq!(order.payment_method, PaymentMethod::Upi);
        assert_eq!(order.order_items[0].return_status(), ReturnStatus::ReturnInitiated);
        assert_eq!(order.acceptance(), OrderAcceptanceState::Accepted);
        assert!(order.consistency_issues().is_empty());
    }

    #[test]
    fn refetching_the_same_payload_yields_identical_orders() {
        let first: Order = serde_json::from_value(wire_order()).unwrap();
        let encoded = serde_json::to_string(&first).unwrap();
        let second: Order = serde_json::from_str(&encoded).unwrap();
        assert_eq!(first, second);
        assert_eq!(encoded, serde_json::to_string(&second).unwrap());
    }

    #[test]
    fn missing_status_defaults_to_placed() {
        let mut raw = wire_order();
        raw.as_object_mut().unwrap().remove("orderStatus");
        let order: Order = serde_json::from_value(raw).unwrap();
        assert_eq!(order.order_status, OrderStatus::Placed);
    }

    #[test]
    fn delivered_without_acceptance_is_reported() {
        let mut order = fixtures::order("o1");
        order.is_delivered = true;
        let issues = order.consistency_issues();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("not accepted"));
    }

    #[test]
    fn acceptance_badges() {
        let mut order = fixtures::order("o1");
        assert_eq!(order.acceptance().badge(), "Pending");
        order.is_paid = true;
        assert_eq!(order.acceptance().badge(), "Accepted");
        order.is_delivered = true;
        assert_eq!(order.acceptance().badge(), "Delivered");
    }

    #[test]
    fn status_labels_parse_and_display() {
        assert_eq!(OrderStatus::OutForDelivery.to_string(), "Out for Delivery");
        assert_eq!(
            OrderStatus::from_str("Out for Delivery").unwrap(),
            OrderStatus::OutForDelivery
        );
        assert!(OrderStatus::Placed.allows_cancellation_request());
        assert!(!OrderStatus::Shipped.allows_cancellation_request());
        assert_eq!(PaymentMethod::from_str("COD").unwrap(), PaymentMethod::Cod);
    }

    #[test]
    fn line_totals_and_vendor_tags() {
        let order = fixtures::order("o1");
        assert_eq!(order.order_items[0].line_total(), dec!(50));
        assert!(order.involves_vendor("vendor-b"));
        assert!(!order.involves_vendor("vendor-z"));
        assert_eq!(order.item_count(), 2);
        assert_eq!(
            order.shipping_address.one_line(),
            "12 MG Road, Pune, 411001, India"
        );
    }
}
