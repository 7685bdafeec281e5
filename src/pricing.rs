//! Checkout arithmetic: subtotal, tax, shipping, totals and coupon discounts.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{CouponStatus, CouponType, VendorOffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingRules {
    pub tax_rate: Decimal,
    pub shipping_price: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            tax_rate: dec!(0.08),
            shipping_price: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
}

/// Rounds to cents, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn items_subtotal<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, u32)>,
{
    round_money(
        lines
            .into_iter()
            .map(|(price, qty)| price * Decimal::from(qty))
            .sum(),
    )
}

impl PricingRules {
    /// `total = items + tax + shipping`, tax rounded to two places.
    pub fn totals(&self, items_price: Decimal) -> OrderTotals {
        let items_price = round_money(items_price);
        let tax_price = round_money(items_price * self.tax_rate);
        let shipping_price = round_money(self.shipping_price);
        OrderTotals {
            items_price,
            tax_price,
            shipping_price,
            total_price: items_price + tax_price + shipping_price,
        }
    }
}

/// Discount an offer grants on `subtotal` on `day`; zero when it does not apply.
pub fn coupon_discount(offer: &VendorOffer, subtotal: Decimal, day: NaiveDate) -> Decimal {
    if offer.status != CouponStatus::Active || !offer.is_valid_on(day) {
        return Decimal::ZERO;
    }
    if let Some(min_order) = offer.min_order {
        if subtotal < min_order {
            debug!(
                code = %offer.code,
                %subtotal,
                %min_order,
                "Subtotal below coupon minimum order"
            );
            return Decimal::ZERO;
        }
    }

    let discount = match offer.kind {
        CouponType::Percentage => round_money(subtotal * offer.value / Decimal::ONE_HUNDRED),
        CouponType::Flat => offer.value,
    };

    discount.max(Decimal::ZERO).min(subtotal)
}
