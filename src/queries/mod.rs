//! Read-side queries: fetch from the API, then filter, sort and summarize
//! locally.

pub mod order_queries;

use async_trait::async_trait;

use crate::api::MarketplaceApi;
use crate::errors::ServiceError;

pub use order_queries::{
    order_stats, return_requests, summarize, vendor_slice, AllOrdersQuery, MyOrdersQuery,
    OrderFilter, OrderSort, OrderStats, OrderSummary, ReturnRequestRow, ReturnRequestsQuery,
    VendorOrderSlice, VendorOrdersQuery,
};

/// Trait representing a generic asynchronous query.
#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    /// Executes the query against the marketplace API.
    async fn execute(&self, api: &dyn MarketplaceApi) -> Result<Self::Result, ServiceError>;
}
