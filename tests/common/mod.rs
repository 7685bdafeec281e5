#![allow(dead_code)]

use std::sync::Arc;

use marketplace_orders::{
    api::{HttpApi, MarketplaceApi},
    events::{Event, EventSender},
    pricing::PricingRules,
    services::OrderService,
    views::ViewContext,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

/// API client pointed at a wiremock server, already holding a bearer token.
pub struct TestApi {
    pub server: MockServer,
    pub api: Arc<dyn MarketplaceApi>,
    pub events: EventSender,
    pub rx: mpsc::Receiver<Event>,
}

impl TestApi {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let api = HttpApi::new(&server.uri(), None).expect("mock server uri is valid");
        api.set_token(Some(TOKEN.to_string()));
        let (events, rx) = EventSender::channel(128);
        Self {
            server,
            api: Arc::new(api),
            events,
            rx,
        }
    }

    pub fn view_context(&self) -> ViewContext {
        ViewContext::new(self.api.clone(), self.events.clone())
    }

    pub fn order_service(&self) -> OrderService {
        OrderService::new(self.api.clone(), self.events.clone(), PricingRules::default())
    }

    /// JSON bodies the server saw for `path`, in arrival order. Bodiless
    /// requests (GET, DELETE) are skipped.
    pub async fn bodies_for(&self, path: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|req| req.url.path() == path && !req.body.is_empty())
            .map(|req| serde_json::from_slice(&req.body).unwrap_or(Value::Null))
            .collect()
    }
}

pub fn address_json() -> Value {
    json!({
        "address": "12 MG Road",
        "city": "Pune",
        "pincode": "411001",
        "phone": "9876543210",
        "country": "India"
    })
}

/// Unaccepted two-vendor order as the API returns it, with populated refs.
pub fn order_json(id: &str) -> Value {
    json!({
        "_id": id,
        "user": { "_id": "cust-1", "name": "Asha" },
        "orderItems": [
            {
                "_id": "i1",
                "product": { "_id": "p1", "name": "Brass lamp" },
                "name": "Brass lamp",
                "price": 50,
                "qty": 1,
                "vendor": "vendor-a"
            },
            {
                "_id": "i2",
                "product": "p2",
                "name": "Cotton rug",
                "price": 50,
                "qty": 1,
                "vendor": { "_id": "vendor-b" }
            }
        ],
        "shippingAddress": address_json(),
        "paymentMethod": "cod",
        "itemsPrice": 100,
        "taxPrice": 8,
        "shippingPrice": 0,
        "totalPrice": 108,
        "isPaid": false,
        "isDelivered": false,
        "orderStatus": "Placed",
        "createdAt": "2024-05-01T10:00:00Z"
    })
}

pub fn accepted_order_json(id: &str) -> Value {
    let mut order = order_json(id);
    order["isPaid"] = json!(true);
    order["paidAt"] = json!("2024-05-02T09:00:00Z");
    order["orderStatus"] = json!("Processing");
    order
}

pub fn delivered_order_json(id: &str) -> Value {
    let mut order = accepted_order_json(id);
    order["isDelivered"] = json!(true);
    order["deliveredAt"] = json!("2024-05-05T18:30:00Z");
    order["orderStatus"] = json!("Delivered");
    order
}

pub fn with_item_status(mut order: Value, item: usize, status: &str) -> Value {
    order["orderItems"][item]["returnExchange"] = json!({
        "status": status,
        "reason": "Damaged in transit"
    });
    order
}

pub fn offer_json(id: &str, status: &str, value: u32) -> Value {
    json!({
        "_id": id,
        "vendor": { "_id": "vendor-a", "name": "Lamp House" },
        "code": "MEGA90",
        "type": "PERCENTAGE",
        "value": value,
        "validFrom": "2024-01-01T00:00:00.000Z",
        "validUntil": "2024-12-31",
        "status": status
    })
}
