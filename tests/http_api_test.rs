//! Wire-level tests for the reqwest client against a wiremock server.
//!
//! Covers paths, bodies, bearer auth, reference normalization and the mapping
//! of error responses onto `ServiceError`.

mod common;

use assert_matches::assert_matches;
use common::{order_json, TestApi, TOKEN};
use http::StatusCode;
use marketplace_orders::{
    api::{CancellationRequest, CouponScope, HttpApi, MarketplaceApi},
    errors::{ServiceError, GENERIC_FAILURE_MESSAGE},
    models::{ReturnRequest, ReturnRequestType, ReturnStatus, ReturnStatusUpdate},
};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, ResponseTemplate,
};

#[tokio::test]
async fn order_list_sends_bearer_token_and_normalizes_refs() {
    let t = TestApi::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders/myorders"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([order_json("o1")])))
        .expect(1)
        .mount(&t.server)
        .await;

    let orders = t.api.my_orders().await.unwrap();

    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.order_items[0].product.as_str(), "p1");
    assert_eq!(order.order_items[1].product.as_str(), "p2");
    assert!(order.order_items[1].is_sold_by("vendor-b"));
    assert!(order.is_owned_by("cust-1"));
    assert_eq!(order.order_items[0].quantity, 1);
    assert_eq!(order.order_items[0].return_status(), ReturnStatus::None);
}

#[tokio::test]
async fn accept_puts_completed_status_to_pay_endpoint() {
    let t = TestApi::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/orders/o1/pay"))
        .and(body_json(json!({ "status": "COMPLETED" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json("o1")))
        .expect(1)
        .mount(&t.server)
        .await;

    t.api.accept_order("o1").await.unwrap();
}

#[tokio::test]
async fn cancellation_and_return_bodies_match_the_api() {
    let t = TestApi::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/orders/o1/cancel"))
        .and(body_json(json!({
            "action": "request",
            "reason": "Ordered by mistake",
            "description": ""
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&t.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/orders/o1/return"))
        .and(body_json(json!({
            "itemId": "i1",
            "type": "exchange",
            "reason": "Wrong size | Need XL"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&t.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/orders/o1/return-status"))
        .and(body_json(json!({
            "itemId": "i1",
            "status": "return_acknowledged"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&t.server)
        .await;

    t.api
        .request_cancellation("o1", &CancellationRequest::request("Ordered by mistake", ""))
        .await
        .unwrap();
    t.api
        .submit_return(
            "o1",
            &ReturnRequest {
                item_id: "i1".into(),
                kind: ReturnRequestType::Exchange,
                reason: "Wrong size | Need XL".into(),
            },
        )
        .await
        .unwrap();
    t.api
        .update_return_status(
            "o1",
            &ReturnStatusUpdate {
                item_id: "i1".into(),
                status: ReturnStatus::ReturnAcknowledged,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn server_message_becomes_the_error_text() {
    let t = TestApi::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/orders/o1/deliver"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Order not accepted yet" })),
        )
        .mount(&t.server)
        .await;

    let err = t.api.deliver_order("o1").await.unwrap_err();

    assert_matches!(
        &err,
        ServiceError::Http { status, .. } if *status == StatusCode::BAD_REQUEST
    );
    assert_eq!(err.toast_message(), "Order not accepted yet");
}

#[tokio::test]
async fn non_json_error_falls_back_to_generic_text() {
    let t = TestApi::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad gateway</html>"))
        .mount(&t.server)
        .await;

    let err = t.api.all_orders().await.unwrap_err();

    assert_eq!(err.status_code(), Some(StatusCode::BAD_GATEWAY));
    assert_eq!(err.toast_message(), GENERIC_FAILURE_MESSAGE);
}

#[tokio::test]
async fn unauthorized_maps_to_its_own_variant() {
    let t = TestApi::start().await;
    Mock::given(method("GET"))
        .and(path("/api/coupons/mine"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Not authorized, no token" })),
        )
        .mount(&t.server)
        .await;

    let err = t.api.list_coupons(CouponScope::Mine).await.unwrap_err();

    assert_matches!(err, ServiceError::Unauthorized(msg) if msg == "Not authorized, no token");
}

#[tokio::test]
async fn logged_out_client_sends_no_authorization_header() {
    let t = TestApi::start().await;
    t.api.set_token(None);
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&t.server)
        .await;

    t.api.list_products().await.unwrap();

    let requests = t.server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn slow_server_hits_the_configured_timeout() {
    let t = TestApi::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&t.server)
        .await;
    let api = HttpApi::new(&t.server.uri(), Some(Duration::from_millis(50))).unwrap();

    let err = api.all_orders().await.unwrap_err();

    assert_matches!(err, ServiceError::Network(_));
    assert_eq!(err.toast_message(), GENERIC_FAILURE_MESSAGE);
}

#[tokio::test]
async fn ids_with_separators_stay_inside_their_segment() {
    let t = TestApi::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/orders/o1%2Fdeliver%3Fx/pay"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&t.server)
        .await;

    t.api.accept_order("o1/deliver?x").await.unwrap();

    let requests = t.server.received_requests().await.unwrap_or_default();
    assert_eq!(requests[0].url.query(), None);
}
