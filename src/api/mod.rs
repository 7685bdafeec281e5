//! REST surface of the marketplace backend.
//!
//! [`MarketplaceApi`] is the seam every workflow talks through; [`HttpApi`] is
//! the reqwest implementation and tests substitute the generated
//! `MockMarketplaceApi`. Calls are one request each: no retry, caching or
//! batching happens here.

mod http;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use http::HttpApi;

use crate::errors::ServiceResult;
use crate::models::{
    AdminSettings, AuthUser, CouponStatus, CouponType, NewOrder, Order, Product, ReturnRequest,
    ReturnStatusUpdate, UserProfile, VendorOffer,
};
use crate::state::{Credentials, NewAddress, ProfileSync, SavedAddress};

/// Body of `PUT /api/orders/:id/pay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptOrderBody {
    pub status: String,
}

impl Default for AcceptOrderBody {
    fn default() -> Self {
        Self {
            status: "COMPLETED".to_string(),
        }
    }
}

/// Body of `PUT /api/orders/:id/cancel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRequest {
    pub action: String,
    pub reason: String,
    pub description: String,
}

impl CancellationRequest {
    pub fn request(reason: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            action: "request".to_string(),
            reason: reason.into(),
            description: description.into(),
        }
    }
}

/// Body of `POST /api/coupons`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOffer {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponType,
    pub value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order: Option<Decimal>,
    #[serde(with = "crate::models::coupon::flexible_date")]
    pub valid_from: chrono::NaiveDate,
    #[serde(with = "crate::models::coupon::flexible_date")]
    pub valid_until: chrono::NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `PUT /api/coupons/:id/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponStatusUpdate {
    pub status: CouponStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Which coupon listing to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CouponScope {
    /// Every offer, admin only.
    All,
    /// The calling vendor's offers.
    Mine,
    /// Offers currently usable at checkout.
    Active,
}

impl CouponScope {
    pub fn segments(self) -> &'static [&'static str] {
        match self {
            Self::All => &["api", "coupons"],
            Self::Mine => &["api", "coupons", "mine"],
            Self::Active => &["api", "coupons", "active"],
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Bearer token for subsequent calls; `None` logs out.
    fn set_token(&self, token: Option<String>);

    // Orders
    async fn my_orders(&self) -> ServiceResult<Vec<Order>>;
    async fn all_orders(&self) -> ServiceResult<Vec<Order>>;
    async fn create_order(&self, order: &NewOrder) -> ServiceResult<Order>;
    async fn accept_order(&self, order_id: &str) -> ServiceResult<()>;
    async fn deliver_order(&self, order_id: &str) -> ServiceResult<()>;
    async fn request_cancellation(
        &self,
        order_id: &str,
        request: &CancellationRequest,
    ) -> ServiceResult<()>;
    async fn submit_return(&self, order_id: &str, request: &ReturnRequest) -> ServiceResult<()>;
    async fn update_return_status(
        &self,
        order_id: &str,
        update: &ReturnStatusUpdate,
    ) -> ServiceResult<()>;

    // Catalog
    async fn list_products(&self) -> ServiceResult<Vec<Product>>;
    async fn get_product(&self, product_id: &str) -> ServiceResult<Product>;

    // Users
    async fn login(&self, credentials: &Credentials) -> ServiceResult<AuthUser>;
    async fn profile(&self) -> ServiceResult<UserProfile>;
    async fn sync_profile(&self, body: &ProfileSync) -> ServiceResult<()>;
    async fn list_addresses(&self) -> ServiceResult<Vec<SavedAddress>>;
    async fn add_address(&self, address: &NewAddress) -> ServiceResult<SavedAddress>;
    async fn delete_address(&self, address_id: &str) -> ServiceResult<()>;

    // Coupons
    async fn list_coupons(&self, scope: CouponScope) -> ServiceResult<Vec<VendorOffer>>;
    async fn create_coupon(&self, offer: &NewOffer) -> ServiceResult<VendorOffer>;
    async fn update_coupon_status(
        &self,
        coupon_id: &str,
        update: &CouponStatusUpdate,
    ) -> ServiceResult<()>;
    async fn admin_settings(&self) -> ServiceResult<AdminSettings>;
    async fn update_admin_settings(&self, settings: &AdminSettings) -> ServiceResult<()>;
}
