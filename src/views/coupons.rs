use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;

use super::ViewContext;
use crate::api::CouponScope;
use crate::errors::{ServiceError, ServiceResult};
use crate::lifecycle::RequestScope;
use crate::models::{AdminSettings, CouponStatus, VendorOffer};
use crate::services::coupons::{review, OfferDraft, OfferReview};
use crate::services::order_status::Actor;
use crate::services::CouponService;

fn find_offer<'a>(offers: &'a [VendorOffer], offer_id: &str) -> ServiceResult<&'a VendorOffer> {
    offers
        .iter()
        .find(|o| o.id == offer_id)
        .ok_or_else(|| ServiceError::NotFound(format!("Offer {offer_id} not found")))
}

/// Admin coupon governance screen.
pub struct AdminCouponsView {
    ctx: ViewContext,
    service: CouponService,
    actor: Actor,
    offers: Vec<VendorOffer>,
    settings: AdminSettings,
}

impl AdminCouponsView {
    pub fn new(ctx: ViewContext, actor: Actor) -> Self {
        let service = CouponService::new(ctx.api.clone(), ctx.events.clone());
        Self {
            ctx,
            service,
            actor,
            offers: Vec::new(),
            settings: AdminSettings::default(),
        }
    }

    pub fn scope(&self) -> Arc<RequestScope> {
        self.ctx.scope.clone()
    }

    pub fn settings(&self) -> AdminSettings {
        self.settings
    }

    pub fn offers(&self) -> &[VendorOffer] {
        &self.offers
    }

    /// Review rows, pending offers first.
    pub fn reviews(&self) -> Vec<OfferReview> {
        let mut rows: Vec<OfferReview> = self
            .offers
            .iter()
            .map(|offer| review(offer, &self.settings))
            .collect();
        rows.sort_by_key(|row| row.status != CouponStatus::Pending);
        rows
    }

    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        let api = self.ctx.api.clone();
        let (offers, settings) = self
            .ctx
            .scope
            .run(async {
                let offers = api.list_coupons(CouponScope::All).await?;
                let settings = api.admin_settings().await?;
                Ok::<_, ServiceError>((offers, settings))
            })
            .await?;
        self.offers = offers;
        self.settings = settings;
        Ok(())
    }

    async fn refetch_after_write(&mut self) {
        if let Err(err) = self.refresh().await {
            self.ctx.refetch_failed(&err).await;
        }
    }

    pub async fn approve(&mut self, offer_id: &str) -> ServiceResult<()> {
        let offer = find_offer(&self.offers, offer_id)?.clone();
        let service = self.service.clone();
        self.ctx
            .scope
            .run(service.approve(&offer, &self.actor))
            .await?;
        self.refetch_after_write().await;
        Ok(())
    }

    pub async fn reject(&mut self, offer_id: &str, reason: &str) -> ServiceResult<()> {
        let offer = find_offer(&self.offers, offer_id)?.clone();
        let service = self.service.clone();
        self.ctx
            .scope
            .run(service.reject(&offer, reason, &self.actor))
            .await?;
        self.refetch_after_write().await;
        Ok(())
    }

    pub async fn set_max_discount(&mut self, value: Decimal) -> ServiceResult<()> {
        let service = self.service.clone();
        self.ctx
            .scope
            .run(service.set_max_discount(value, &self.actor))
            .await?;
        self.refetch_after_write().await;
        Ok(())
    }
}

impl Drop for AdminCouponsView {
    fn drop(&mut self) {
        self.ctx.scope.cancel();
    }
}

/// Vendor's own offers.
pub struct VendorOffersView {
    ctx: ViewContext,
    service: CouponService,
    vendor_id: String,
    offers: Vec<VendorOffer>,
}

impl VendorOffersView {
    pub fn new(ctx: ViewContext, vendor_id: impl Into<String>) -> Self {
        let service = CouponService::new(ctx.api.clone(), ctx.events.clone());
        Self {
            ctx,
            service,
            vendor_id: vendor_id.into(),
            offers: Vec::new(),
        }
    }

    pub fn scope(&self) -> Arc<RequestScope> {
        self.ctx.scope.clone()
    }

    pub fn offers(&self) -> &[VendorOffer] {
        &self.offers
    }

    #[instrument(skip(self), fields(vendor_id = %self.vendor_id))]
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        let api = self.ctx.api.clone();
        self.offers = self
            .ctx
            .scope
            .run(api.list_coupons(CouponScope::Mine))
            .await?;
        Ok(())
    }

    async fn refetch_after_write(&mut self) {
        if let Err(err) = self.refresh().await {
            self.ctx.refetch_failed(&err).await;
        }
    }

    pub async fn create(&mut self, draft: &OfferDraft) -> ServiceResult<VendorOffer> {
        let service = self.service.clone();
        let created = self.ctx.scope.run(service.create(draft)).await?;
        self.refetch_after_write().await;
        Ok(created)
    }

    pub async fn toggle(&mut self, offer_id: &str) -> ServiceResult<CouponStatus> {
        let offer = find_offer(&self.offers, offer_id)?.clone();
        let actor = Actor::Vendor {
            vendor_id: self.vendor_id.clone(),
        };
        let service = self.service.clone();
        let status = self
            .ctx
            .scope
            .run(service.toggle(&offer, &actor))
            .await?;
        self.refetch_after_write().await;
        Ok(status)
    }
}

impl Drop for VendorOffersView {
    fn drop(&mut self) {
        self.ctx.scope.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockMarketplaceApi;
    use crate::events::{drain_toasts, Event, EventSender};
    use crate::models::{CouponType, EntityRef};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn offer(status: CouponStatus, value: Decimal) -> VendorOffer {
        VendorOffer {
            id: "c1".into(),
            vendor: Some(EntityRef::new("v1")),
            code: "MEGA90".into(),
            kind: CouponType::Percentage,
            value,
            min_order: None,
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            valid_until: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            status,
            rejection_reason: None,
            description: None,
        }
    }

    fn ctx(api: MockMarketplaceApi) -> (ViewContext, mpsc::Receiver<Event>) {
        let (events, rx) = EventSender::channel(64);
        (ViewContext::new(Arc::new(api), events), rx)
    }

    #[tokio::test]
    async fn excessive_offer_is_flagged_and_approval_activates_it() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut api = MockMarketplaceApi::new();
        api.expect_list_coupons().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![offer(CouponStatus::Pending, dec!(90))])
            } else {
                Ok(vec![offer(CouponStatus::Active, dec!(90))])
            }
        });
        api.expect_admin_settings().times(2).returning(|| {
            Ok(AdminSettings {
                max_discount: dec!(80),
            })
        });
        api.expect_update_coupon_status()
            .times(1)
            .returning(|_, _| Ok(()));
        let (ctx, mut rx) = ctx(api);
        let mut view = AdminCouponsView::new(ctx, Actor::Admin);

        view.refresh().await.unwrap();
        let row = &view.reviews()[0];
        assert!(row.excessive);
        assert!(row.can_approve);

        view.approve("c1").await.unwrap();
        assert_eq!(view.offers()[0].status, CouponStatus::Active);
        assert_eq!(drain_toasts(&mut rx)[0].message, "Offer approved");
    }

    #[tokio::test]
    async fn reject_without_reason_keeps_offer_pending() {
        let mut api = MockMarketplaceApi::new();
        api.expect_list_coupons()
            .times(1)
            .returning(|_| Ok(vec![offer(CouponStatus::Pending, dec!(90))]));
        api.expect_admin_settings()
            .times(1)
            .returning(|| Ok(AdminSettings::default()));
        let (ctx, _rx) = ctx(api);
        let mut view = AdminCouponsView::new(ctx, Actor::Admin);

        view.refresh().await.unwrap();
        assert!(view.reject("c1", "").await.is_err());
        assert_eq!(view.offers()[0].status, CouponStatus::Pending);
    }

    #[tokio::test]
    async fn vendor_session_cannot_approve() {
        let mut api = MockMarketplaceApi::new();
        api.expect_list_coupons()
            .times(1)
            .returning(|_| Ok(vec![offer(CouponStatus::Pending, dec!(20))]));
        api.expect_admin_settings()
            .times(1)
            .returning(|| Ok(AdminSettings::default()));
        let (ctx, _rx) = ctx(api);
        let vendor = Actor::Vendor {
            vendor_id: "v1".into(),
        };
        let mut view = AdminCouponsView::new(ctx, vendor);

        view.refresh().await.unwrap();
        assert!(matches!(
            view.approve("c1").await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            view.set_max_discount(dec!(50)).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert_eq!(view.offers()[0].status, CouponStatus::Pending);
    }

    #[tokio::test]
    async fn vendor_toggle_refetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut api = MockMarketplaceApi::new();
        api.expect_list_coupons().times(2).returning(move |_| {
            let status = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                CouponStatus::Active
            } else {
                CouponStatus::Inactive
            };
            Ok(vec![offer(status, dec!(10))])
        });
        api.expect_update_coupon_status()
            .times(1)
            .returning(|_, _| Ok(()));
        let (ctx, _rx) = ctx(api);
        let mut view = VendorOffersView::new(ctx, "v1");

        view.refresh().await.unwrap();
        assert_eq!(view.toggle("c1").await.unwrap(), CouponStatus::Inactive);
        assert_eq!(view.offers()[0].status, CouponStatus::Inactive);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
