//! Workflow services: order lifecycle, returns and coupon governance.
//!
//! Each service wraps a [`MarketplaceApi`](crate::api::MarketplaceApi) and an
//! [`EventSender`]. Mutations are single awaited requests; outcomes are reported
//! as toasts and counted in [`crate::metrics`].

pub mod coupons;
pub mod order_status;
pub mod orders;
pub mod returns;

use std::fmt;

use tracing::{error, info};

use crate::errors::{ServiceError, ServiceResult};
use crate::events::{EventSender, Toast};
use crate::metrics;

pub use coupons::CouponService;
pub use order_status::{Actor, OrderAction};
pub use orders::OrderService;
pub use returns::ReturnService;

/// A draft refused before any request went out, handed back so the form can
/// stay open with what the user typed.
pub struct Rejected<D> {
    pub error: ServiceError,
    pub draft: Option<D>,
}

impl<D> Rejected<D> {
    fn sent(error: ServiceError) -> Self {
        Self { error, draft: None }
    }

    fn kept(error: ServiceError, draft: D) -> Self {
        Self {
            error,
            draft: Some(draft),
        }
    }
}

impl<D> fmt::Debug for Rejected<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("draft_kept", &self.draft.is_some())
            .finish()
    }
}

impl<D> From<ServiceError> for Rejected<D> {
    fn from(error: ServiceError) -> Self {
        Self::sent(error)
    }
}

impl<D> From<Rejected<D>> for ServiceError {
    fn from(rejected: Rejected<D>) -> Self {
        rejected.error
    }
}

/// Records the outcome of `action` and turns it into a toast.
pub(crate) async fn report<T>(
    events: &EventSender,
    action: &'static str,
    result: ServiceResult<T>,
    success: impl Into<String>,
) -> ServiceResult<T> {
    match result {
        Ok(value) => {
            metrics::record_success(action);
            info!(action, "workflow action succeeded");
            events.toast(Toast::success(success)).await;
            Ok(value)
        }
        Err(err) => {
            fail(events, action, &err).await;
            Err(err)
        }
    }
}

/// Failure half of [`report`]. Cancelled work belongs to a view that is gone,
/// so it is counted but not toasted.
pub(crate) async fn fail(events: &EventSender, action: &'static str, err: &ServiceError) {
    metrics::record_failure(action, err);
    if matches!(err, ServiceError::Cancelled) {
        return;
    }
    if err.is_client_side() {
        info!(action, reason = %err, "workflow action refused");
    } else {
        error!(action, error = %err, "workflow action failed");
    }
    events.toast(Toast::error(err.toast_message())).await;
}
