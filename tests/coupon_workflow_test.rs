//! Coupon governance over HTTP: vendor creation with the hard ceiling, admin
//! review with the advisory flag, approve/reject and the vendor toggle.

mod common;

use chrono::NaiveDate;
use common::{offer_json, TestApi};
use marketplace_orders::{
    events::{drain, drain_toasts, Event},
    models::{CouponStatus, CouponType},
    services::{coupons::OfferDraft, Actor},
    views::{AdminCouponsView, VendorOffersView},
};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::{
    matchers::{body_json, method, path},
    Mock, ResponseTemplate,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn draft(code: &str, value: rust_decimal::Decimal) -> OfferDraft {
    OfferDraft {
        code: code.into(),
        kind: CouponType::Percentage,
        value,
        min_order: None,
        valid_from: date(2024, 10, 1),
        valid_until: date(2024, 11, 15),
        description: Some("  Festive sale ".into()),
    }
}

async fn mount_settings(t: &TestApi, max_discount: u32) {
    Mock::given(method("GET"))
        .and(path("/api/admin/settings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "maxDiscount": max_discount })),
        )
        .mount(&t.server)
        .await;
}

#[tokio::test]
async fn excessive_offer_is_flagged_and_still_approvable() {
    let mut t = TestApi::start().await;
    mount_settings(&t, 80).await;
    Mock::given(method("GET"))
        .and(path("/api/coupons"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([offer_json("c1", "PENDING", 90)])),
        )
        .up_to_n_times(1)
        .mount(&t.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/coupons"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([offer_json("c1", "ACTIVE", 90)])),
        )
        .mount(&t.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/coupons/c1/status"))
        .and(body_json(json!({ "status": "ACTIVE" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&t.server)
        .await;

    let mut view = AdminCouponsView::new(t.view_context(), Actor::Admin);
    view.refresh().await.unwrap();

    let row = &view.reviews()[0];
    assert!(row.excessive);
    assert!(row.can_approve);
    assert!(row.can_reject);
    assert_eq!(view.offers()[0].valid_from, date(2024, 1, 1));

    view.approve("c1").await.unwrap();

    assert_eq!(view.offers()[0].status, CouponStatus::Active);
    let events = drain(&mut t.rx);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::OfferStatusChanged { offer_id, status } if offer_id == "c1" && *status == CouponStatus::Active
    )));
}

#[tokio::test]
async fn rejection_needs_a_reason_before_any_request() {
    let mut t = TestApi::start().await;
    mount_settings(&t, 80).await;
    Mock::given(method("GET"))
        .and(path("/api/coupons"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([offer_json("c1", "PENDING", 90)])),
        )
        .mount(&t.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/coupons/c1/status"))
        .and(body_json(json!({
            "status": "REJECTED",
            "rejectionReason": "Discount too steep"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&t.server)
        .await;

    let mut view = AdminCouponsView::new(t.view_context(), Actor::Admin);
    view.refresh().await.unwrap();

    assert!(view.reject("c1", "  ").await.is_err());
    assert_eq!(
        drain_toasts(&mut t.rx)[0].message,
        "Please provide a rejection reason"
    );

    view.reject("c1", "Discount too steep").await.unwrap();
    assert_eq!(drain_toasts(&mut t.rx)[0].message, "Offer rejected");
}

#[tokio::test]
async fn vendor_creation_enforces_ceiling_and_uniqueness() {
    let mut t = TestApi::start().await;
    mount_settings(&t, 80).await;
    Mock::given(method("GET"))
        .and(path("/api/coupons/mine"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([offer_json("c1", "ACTIVE", 10)])),
        )
        .mount(&t.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/coupons"))
        .and(body_json(json!({
            "code": "DIWALI20",
            "type": "PERCENTAGE",
            "value": 20.0,
            "validFrom": "2024-10-01",
            "validUntil": "2024-11-15",
            "description": "Festive sale"
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({
                "_id": "c2",
                "vendor": "vendor-a",
                "code": "DIWALI20",
                "type": "PERCENTAGE",
                "value": 20,
                "validFrom": "2024-10-01",
                "validUntil": "2024-11-15",
                "status": "PENDING"
            })),
        )
        .expect(1)
        .mount(&t.server)
        .await;

    let mut view = VendorOffersView::new(t.view_context(), "vendor-a");
    view.refresh().await.unwrap();

    assert!(view.create(&draft("big90", dec!(90))).await.is_err());
    assert!(view.create(&draft("mega90", dec!(10))).await.is_err());
    let created = view.create(&draft(" diwali20 ", dec!(20))).await.unwrap();

    assert_eq!(created.status, CouponStatus::Pending);
    let toasts: Vec<String> = drain_toasts(&mut t.rx)
        .into_iter()
        .map(|toast| toast.message)
        .collect();
    assert_eq!(
        toasts,
        vec![
            "Discount cannot exceed 80%".to_string(),
            "You already have an offer with code MEGA90".to_string(),
            "Offer submitted for approval".to_string(),
        ]
    );
}

#[tokio::test]
async fn vendor_toggle_flips_active_and_inactive() {
    let t = TestApi::start().await;
    Mock::given(method("GET"))
        .and(path("/api/coupons/mine"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([offer_json("c1", "ACTIVE", 10)])),
        )
        .up_to_n_times(1)
        .mount(&t.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/coupons/mine"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([offer_json("c1", "INACTIVE", 10)])),
        )
        .mount(&t.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/coupons/c1/status"))
        .and(body_json(json!({ "status": "INACTIVE" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&t.server)
        .await;

    let mut view = VendorOffersView::new(t.view_context(), "vendor-a");
    view.refresh().await.unwrap();
    assert_eq!(view.toggle("c1").await.unwrap(), CouponStatus::Inactive);
    assert_eq!(view.offers()[0].status, CouponStatus::Inactive);
}

#[tokio::test]
async fn ceiling_update_is_sent_and_reread() {
    let mut t = TestApi::start().await;
    Mock::given(method("GET"))
        .and(path("/api/coupons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&t.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "maxDiscount": 50 })))
        .up_to_n_times(1)
        .mount(&t.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "maxDiscount": 70 })))
        .mount(&t.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/admin/settings"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&t.server)
        .await;

    let mut view = AdminCouponsView::new(t.view_context(), Actor::Admin);
    view.refresh().await.unwrap();
    assert!(view.set_max_discount(dec!(120)).await.is_err());
    view.set_max_discount(dec!(70)).await.unwrap();

    assert_eq!(view.settings().max_discount, dec!(70));
    let toasts = drain_toasts(&mut t.rx);
    assert_eq!(toasts.last().unwrap().message, "Max discount set to 70%");
    assert_eq!(
        t.bodies_for("/api/admin/settings").await.last().unwrap()["maxDiscount"].as_f64(),
        Some(70.0)
    );
}
