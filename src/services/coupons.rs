use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};
use validator::{Validate, ValidationError};

use super::order_status::Actor;
use super::{fail, report};
use crate::api::{CouponScope, CouponStatusUpdate, MarketplaceApi, NewOffer};
use crate::errors::{ServiceError, ServiceResult};
use crate::events::{Event, EventSender};
use crate::models::{AdminSettings, CouponStatus, CouponType, VendorOffer};
use crate::pricing::coupon_discount;

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9_-]{3,20}$").unwrap());

fn validate_positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("positive");
        err.message = Some("Discount value must be greater than zero".into());
        Err(err)
    }
}

/// Trims and uppercases a coupon code and checks its shape.
pub fn normalize_code(raw: &str) -> ServiceResult<String> {
    let code = raw.trim().to_uppercase();
    if CODE_RE.is_match(&code) {
        Ok(code)
    } else {
        Err(ServiceError::ValidationError(
            "Coupon code must be 3-20 characters: letters, digits, '-' or '_'".to_string(),
        ))
    }
}

/// Vendor's offer form.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct OfferDraft {
    pub code: String,
    pub kind: CouponType,
    #[validate(custom = "validate_positive_decimal")]
    pub value: Decimal,
    pub min_order: Option<Decimal>,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    #[validate(length(max = 200, message = "Description is too long"))]
    pub description: Option<String>,
}

/// Checks an offer before creation. The percentage ceiling is a hard limit
/// here, unlike at admin review.
pub fn validate_offer(
    draft: &OfferDraft,
    settings: &AdminSettings,
    existing: &[VendorOffer],
) -> ServiceResult<NewOffer> {
    draft.validate()?;
    let code = normalize_code(&draft.code)?;

    if draft.kind == CouponType::Percentage && draft.value > settings.max_discount {
        return Err(ServiceError::ValidationError(format!(
            "Discount cannot exceed {}%",
            settings.max_discount.normalize()
        )));
    }
    if draft.valid_until <= draft.valid_from {
        return Err(ServiceError::ValidationError(
            "Valid until must be after valid from".to_string(),
        ));
    }
    if let Some(min_order) = draft.min_order {
        if min_order < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Minimum order cannot be negative".to_string(),
            ));
        }
        if draft.kind == CouponType::Flat && min_order < draft.value {
            return Err(ServiceError::ValidationError(
                "Minimum order must be at least the flat discount".to_string(),
            ));
        }
    }
    if existing.iter().any(|offer| offer.code.eq_ignore_ascii_case(&code)) {
        return Err(ServiceError::ValidationError(format!(
            "You already have an offer with code {code}"
        )));
    }

    Ok(NewOffer {
        code,
        kind: draft.kind,
        value: draft.value,
        min_order: draft.min_order,
        valid_from: draft.valid_from,
        valid_until: draft.valid_until,
        description: draft
            .description
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
    })
}

/// Admin review row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferReview {
    pub offer_id: String,
    pub code: String,
    pub status: CouponStatus,
    /// Percentage above the current ceiling. Advisory only.
    pub excessive: bool,
    pub can_approve: bool,
    pub can_reject: bool,
}

pub fn review(offer: &VendorOffer, settings: &AdminSettings) -> OfferReview {
    OfferReview {
        offer_id: offer.id.clone(),
        code: offer.code.clone(),
        status: offer.status,
        excessive: offer.kind == CouponType::Percentage && offer.value > settings.max_discount,
        can_approve: can_approve(offer.status),
        can_reject: can_reject(offer.status),
    }
}

fn can_approve(status: CouponStatus) -> bool {
    matches!(status, CouponStatus::Pending | CouponStatus::Rejected)
}

fn can_reject(status: CouponStatus) -> bool {
    matches!(
        status,
        CouponStatus::Pending | CouponStatus::Active | CouponStatus::Inactive
    )
}

/// Status a vendor toggle moves an offer to.
pub fn toggled_status(status: CouponStatus) -> ServiceResult<CouponStatus> {
    match status {
        CouponStatus::Active => Ok(CouponStatus::Inactive),
        CouponStatus::Inactive => Ok(CouponStatus::Active),
        other => Err(ServiceError::InvalidOperation(format!(
            "{other} offers cannot be toggled"
        ))),
    }
}

/// An offer usable at checkout and what it is worth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicableCoupon {
    pub offer: VendorOffer,
    pub discount: Decimal,
}

/// Offers that grant a discount on the given per-vendor subtotals, best first.
pub fn applicable_coupons(
    offers: &[VendorOffer],
    vendor_subtotals: &BTreeMap<String, Decimal>,
    day: NaiveDate,
) -> Vec<ApplicableCoupon> {
    let cart_total: Decimal = vendor_subtotals.values().copied().sum();
    let mut applicable: Vec<ApplicableCoupon> = offers
        .iter()
        .filter_map(|offer| {
            let subtotal = match offer.vendor_id() {
                Some(vendor) => vendor_subtotals.get(vendor).copied()?,
                None => cart_total,
            };
            let discount = coupon_discount(offer, subtotal, day);
            (discount > Decimal::ZERO).then(|| ApplicableCoupon {
                offer: offer.clone(),
                discount,
            })
        })
        .collect();
    applicable.sort_by(|a, b| {
        b.discount
            .cmp(&a.discount)
            .then_with(|| a.offer.code.cmp(&b.offer.code))
    });
    applicable
}

#[derive(Clone)]
pub struct CouponService {
    api: Arc<dyn MarketplaceApi>,
    events: EventSender,
}

impl CouponService {
    pub fn new(api: Arc<dyn MarketplaceApi>, events: EventSender) -> Self {
        Self { api, events }
    }

    async fn refuse<T>(&self, action: &'static str, err: ServiceError) -> ServiceResult<T> {
        fail(&self.events, action, &err).await;
        Err(err)
    }

    /// Vendor creates an offer; it starts out PENDING.
    #[instrument(skip(self, draft), fields(code = %draft.code))]
    pub async fn create(&self, draft: &OfferDraft) -> ServiceResult<VendorOffer> {
        let settings = match self.api.admin_settings().await {
            Ok(settings) => settings,
            Err(err) => return self.refuse("create_offer", err).await,
        };
        let existing = match self.api.list_coupons(CouponScope::Mine).await {
            Ok(existing) => existing,
            Err(err) => return self.refuse("create_offer", err).await,
        };
        let body = match validate_offer(draft, &settings, &existing) {
            Ok(body) => body,
            Err(err) => return self.refuse("create_offer", err).await,
        };

        let result = self.api.create_coupon(&body).await;
        let created = report(
            &self.events,
            "create_offer",
            result,
            "Offer submitted for approval",
        )
        .await?;
        self.events
            .emit(Event::OfferSubmitted(created.id.clone()))
            .await;
        Ok(created)
    }

    async fn set_status(
        &self,
        action: &'static str,
        offer: &VendorOffer,
        update: CouponStatusUpdate,
        success: &str,
    ) -> ServiceResult<()> {
        let status = update.status;
        let result = self.api.update_coupon_status(&offer.id, &update).await;
        report(&self.events, action, result, success).await?;
        info!(offer_id = %offer.id, from = %offer.status, to = %status, "offer status changed");
        self.events
            .emit(Event::OfferStatusChanged {
                offer_id: offer.id.clone(),
                status,
            })
            .await;
        Ok(())
    }

    /// Vendor switches an approved offer on or off.
    #[instrument(skip(self, offer, actor), fields(offer_id = %offer.id))]
    pub async fn toggle(&self, offer: &VendorOffer, actor: &Actor) -> ServiceResult<CouponStatus> {
        let owns = match actor {
            Actor::Vendor { vendor_id } => offer.vendor_id() == Some(vendor_id.as_str()),
            _ => false,
        };
        if !owns {
            let err = ServiceError::Forbidden("Only the offer's vendor can toggle it".to_string());
            return self.refuse("toggle_offer", err).await;
        }
        let next = match toggled_status(offer.status) {
            Ok(next) => next,
            Err(err) => return self.refuse("toggle_offer", err).await,
        };
        let message = match next {
            CouponStatus::Active => "Offer activated",
            _ => "Offer deactivated",
        };
        self.set_status(
            "toggle_offer",
            offer,
            CouponStatusUpdate {
                status: next,
                rejection_reason: None,
            },
            message,
        )
        .await?;
        Ok(next)
    }

    /// Admin approval. Excessive offers are approvable; the flag is advisory.
    #[instrument(skip(self, offer, actor), fields(offer_id = %offer.id))]
    pub async fn approve(&self, offer: &VendorOffer, actor: &Actor) -> ServiceResult<()> {
        if !actor.is_admin() {
            let err = ServiceError::Forbidden("Only admins can approve offers".to_string());
            return self.refuse("approve_offer", err).await;
        }
        if !can_approve(offer.status) {
            let err = ServiceError::InvalidOperation(format!(
                "{} offers cannot be approved",
                offer.status
            ));
            return self.refuse("approve_offer", err).await;
        }
        self.set_status(
            "approve_offer",
            offer,
            CouponStatusUpdate {
                status: CouponStatus::Active,
                rejection_reason: None,
            },
            "Offer approved",
        )
        .await
    }

    /// Admin rejection; the reason is required and checked before sending.
    #[instrument(skip(self, offer, reason, actor), fields(offer_id = %offer.id))]
    pub async fn reject(
        &self,
        offer: &VendorOffer,
        reason: &str,
        actor: &Actor,
    ) -> ServiceResult<()> {
        if !actor.is_admin() {
            let err = ServiceError::Forbidden("Only admins can reject offers".to_string());
            return self.refuse("reject_offer", err).await;
        }
        let reason = reason.trim();
        if reason.is_empty() {
            let err = ServiceError::ValidationError(
                "Please provide a rejection reason".to_string(),
            );
            return self.refuse("reject_offer", err).await;
        }
        if !can_reject(offer.status) {
            let err = ServiceError::InvalidOperation(format!(
                "{} offers cannot be rejected",
                offer.status
            ));
            return self.refuse("reject_offer", err).await;
        }
        self.set_status(
            "reject_offer",
            offer,
            CouponStatusUpdate {
                status: CouponStatus::Rejected,
                rejection_reason: Some(reason.to_string()),
            },
            "Offer rejected",
        )
        .await
    }

    /// Admin sets the percentage ceiling, `0 < value <= 100`.
    #[instrument(skip(self, actor))]
    pub async fn set_max_discount(&self, value: Decimal, actor: &Actor) -> ServiceResult<()> {
        if !actor.is_admin() {
            let err = ServiceError::Forbidden("Only admins can change coupon policy".to_string());
            return self.refuse("set_max_discount", err).await;
        }
        if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            let err = ServiceError::ValidationError(
                "Max discount must be between 0 and 100".to_string(),
            );
            return self.refuse("set_max_discount", err).await;
        }
        let settings = AdminSettings {
            max_discount: value,
        };
        let result = self.api.update_admin_settings(&settings).await;
        report(
            &self.events,
            "set_max_discount",
            result,
            format!("Max discount set to {}%", value.normalize()),
        )
        .await?;
        self.events.emit(Event::DiscountCeilingChanged(value)).await;
        Ok(())
    }

    /// Live offers for checkout against the given vendor subtotals.
    pub async fn applicable_for(
        &self,
        vendor_subtotals: &BTreeMap<String, Decimal>,
        day: NaiveDate,
    ) -> ServiceResult<Vec<ApplicableCoupon>> {
        let offers = self.api.list_coupons(CouponScope::Active).await?;
        Ok(applicable_coupons(&offers, vendor_subtotals, day))
    }
}
