//! Marketplace Orders
//!
//! Client core for a multi-vendor marketplace: order placement and
//! acceptance, per-item returns and exchanges, and vendor coupon governance.
//! Talks to the marketplace REST API through [`api::MarketplaceApi`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod api;
pub mod config;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod queries;
pub mod services;
pub mod state;
pub mod views;

pub mod prelude {
    pub use crate::api::{HttpApi, MarketplaceApi};
    pub use crate::config::AppConfig;
    pub use crate::errors::{ServiceError, ServiceResult};
    pub use crate::events::{Event, EventSender, Toast, ToastLevel};
    pub use crate::lifecycle::RequestScope;
    pub use crate::models::*;
    pub use crate::pricing::PricingRules;
    pub use crate::services::{
        Actor, CouponService, OrderAction, OrderService, Rejected, ReturnService,
    };
    pub use crate::state::{ClientState, LocalStore};
    pub use crate::views::{
        AdminCouponsView, AdminOrdersView, CustomerOrdersView, VendorOffersView,
        VendorOrdersView, ViewContext,
    };
}
