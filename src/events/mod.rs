use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::models::{CouponStatus, OrderStatus, ReturnRequestType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Transient user notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Toast {
    pub fn new(level: ToastLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Error, message)
    }
}

// Define the various events the workflows emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Toast(Toast),

    // Order events
    OrderPlaced(String),
    OrderAccepted(String),
    OrderDelivered(String),
    CancellationRequested(String),
    OrderStatusChanged {
        order_id: String,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },

    // Return events
    ReturnRequested {
        order_id: String,
        item_id: String,
        kind: ReturnRequestType,
    },
    HandoverConfirmed {
        order_id: String,
        item_id: String,
    },

    // Coupon events
    OfferSubmitted(String),
    OfferStatusChanged {
        offer_id: String,
        status: CouponStatus,
    },
    DiscountCeilingChanged(rust_decimal::Decimal),
}

impl Event {
    pub fn as_toast(&self) -> Option<&Toast> {
        match self {
            Event::Toast(toast) => Some(toast),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Channel pair with the given capacity.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Best-effort delivery: never waits for buffer space, so a receiver that
    /// is closed or not being drained cannot hold up a workflow. Dropped events
    /// are logged.
    pub async fn emit(&self, event: Event) {
        debug!(event = ?event, "emitting event");
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = ?event, "event channel full, event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("event receiver closed, event dropped");
            }
        }
    }

    pub async fn toast(&self, toast: Toast) {
        self.emit(Event::Toast(toast)).await;
    }
}

/// Drains whatever is currently buffered in `rx`.
pub fn drain(rx: &mut mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Toasts currently buffered in `rx`, other events discarded.
pub fn drain_toasts(rx: &mut mpsc::Receiver<Event>) -> Vec<Toast> {
    drain(rx)
        .into_iter()
        .filter_map(|event| match event {
            Event::Toast(toast) => Some(toast),
            _ => None,
        })
        .collect()
}
