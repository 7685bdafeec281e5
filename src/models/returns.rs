use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-line-item return/exchange/cancellation sub-state.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReturnStatus {
    #[default]
    None,
    CancelRequested,
    ReturnInitiated,
    ExchangeInitiated,
    ReturnAcknowledged,
    Returned,
    Rejected,
    Approved,
}

impl ReturnStatus {
    /// Any status other than `none` locks the item against new requests.
    pub fn has_request(self) -> bool {
        self != Self::None
    }

    /// Pickup has been initiated and the customer may confirm the handover.
    pub fn awaits_handover(self) -> bool {
        matches!(self, Self::ReturnInitiated | Self::ExchangeInitiated)
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Returned | Self::Rejected | Self::Approved)
    }

    /// Label for the item badge in order details.
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "",
            Self::CancelRequested => "Cancellation requested",
            Self::ReturnInitiated => "Return initiated",
            Self::ExchangeInitiated => "Exchange initiated",
            Self::ReturnAcknowledged => "Handed over",
            Self::Returned => "Returned",
            Self::Rejected => "Request rejected",
            Self::Approved => "Request approved",
        }
    }
}

/// `returnExchange` sub-record on an order line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnExchange {
    #[serde(default)]
    pub status: ReturnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<DateTime<Utc>>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReturnRequestType {
    Return,
    Exchange,
    Cancel,
}

/// Body of `POST /api/orders/:id/return`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub item_id: String,
    #[serde(rename = "type")]
    pub kind: ReturnRequestType,
    pub reason: String,
}

/// Body of `PUT /api/orders/:id/return-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnStatusUpdate {
    pub item_id: String,
    pub status: ReturnStatus,
}
