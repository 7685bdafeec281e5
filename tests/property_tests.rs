//! Property-based tests for checkout arithmetic, cart merging and the
//! per-item return guard.

mod common;

use chrono::NaiveDate;
use common::{delivered_order_json, with_item_status};
use marketplace_orders::{
    models::{CouponStatus, CouponType, EntityRef, Order, ReturnStatus, VendorOffer},
    pricing::{coupon_discount, round_money, PricingRules},
    services::{order_status::return_gate, Actor},
    state::{CartItem, CartState, LocalStore},
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn raw_amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000, 0u32..6).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn requested_status_strategy() -> impl Strategy<Value = ReturnStatus> {
    prop_oneof![
        Just(ReturnStatus::CancelRequested),
        Just(ReturnStatus::ReturnInitiated),
        Just(ReturnStatus::ExchangeInitiated),
        Just(ReturnStatus::ReturnAcknowledged),
        Just(ReturnStatus::Returned),
        Just(ReturnStatus::Rejected),
        Just(ReturnStatus::Approved),
    ]
}

fn offer(kind: CouponType, value: Decimal, min_order: Option<Decimal>) -> VendorOffer {
    VendorOffer {
        id: "c1".into(),
        vendor: Some(EntityRef::new("vendor-a")),
        code: "SAVE".into(),
        kind,
        value,
        min_order,
        valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        valid_until: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        status: CouponStatus::Active,
        rejection_reason: None,
        description: None,
    }
}

fn customer() -> Actor {
    Actor::Customer {
        user_id: "cust-1".into(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn total_is_sum_of_parts(items in money_strategy(), shipping in money_strategy()) {
        let rules = PricingRules { tax_rate: dec!(0.08), shipping_price: shipping };
        let totals = rules.totals(items);

        prop_assert_eq!(totals.tax_price, round_money(items * dec!(0.08)));
        prop_assert_eq!(
            totals.total_price,
            totals.items_price + totals.tax_price + totals.shipping_price
        );
    }

    #[test]
    fn rounded_money_has_at_most_two_places(amount in raw_amount_strategy()) {
        let rounded = round_money(amount);
        prop_assert!(rounded.scale() <= 2, "{} kept scale {}", rounded, rounded.scale());
        prop_assert!((rounded - amount).abs() <= dec!(0.005));
    }

    #[test]
    fn percentage_discount_never_exceeds_subtotal(
        subtotal in money_strategy(),
        value in 0u32..=100,
    ) {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let discount = coupon_discount(
            &offer(CouponType::Percentage, Decimal::from(value), None),
            subtotal,
            day,
        );

        prop_assert!(discount >= Decimal::ZERO);
        prop_assert!(discount <= subtotal);
    }

    #[test]
    fn flat_discount_never_exceeds_subtotal(
        subtotal in money_strategy(),
        value in money_strategy(),
    ) {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let discount = coupon_discount(&offer(CouponType::Flat, value, None), subtotal, day);

        prop_assert_eq!(discount, value.min(subtotal));
    }

    #[test]
    fn subtotal_below_minimum_gets_no_discount(
        subtotal in money_strategy(),
        gap in 1i64..100_000,
    ) {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let min_order = subtotal + Decimal::new(gap, 2);
        let discount = coupon_discount(
            &offer(CouponType::Flat, dec!(50), Some(min_order)),
            subtotal,
            day,
        );

        prop_assert_eq!(discount, Decimal::ZERO);
    }
}

proptest! {
    #[test]
    fn any_recorded_request_locks_the_item(status in requested_status_strategy()) {
        let order: Order =
            serde_json::from_value(with_item_status(delivered_order_json("o1"), 0, &status.to_string()))
                .unwrap();

        prop_assert!(return_gate(&order, "i1", &customer()).is_err());
        prop_assert!(return_gate(&order, "i2", &customer()).is_ok());
    }

    #[test]
    fn merged_cart_quantities_respect_stock(
        stock in 1u32..50,
        adds in prop::collection::vec(1u32..20, 1..8),
    ) {
        let mut cart = CartState::load(LocalStore::in_memory()).unwrap();
        for qty in &adds {
            cart.add(CartItem {
                product: EntityRef::new("p1"),
                name: "Brass lamp".into(),
                image: None,
                price: dec!(50),
                qty: *qty,
                vendor: Some(EntityRef::new("vendor-a")),
                count_in_stock: Some(stock),
            })
            .unwrap();
        }

        let requested: u32 = adds.iter().sum();
        prop_assert_eq!(cart.items().len(), 1);
        prop_assert_eq!(cart.items()[0].qty, requested.min(stock));
    }
}
