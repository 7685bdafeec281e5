use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::EntityRef;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum CouponType {
    Percentage,
    Flat,
}

#[derive(
    Debug,
    Clone,
    Copy,
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
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum CouponStatus {
    Pending,
    Active,
    Inactive,
    Rejected,
}

/// Vendor-authored discount code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorOffer {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<EntityRef>,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponType,
    pub value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order: Option<Decimal>,
    #[serde(with = "flexible_date")]
    pub valid_from: NaiveDate,
    #[serde(with = "flexible_date")]
    pub valid_until: NaiveDate,
    pub status: CouponStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VendorOffer {
    pub fn is_valid_on(&self, day: NaiveDate) -> bool {
        self.valid_from <= day && day <= self.valid_until
    }

    pub fn is_live_today(&self) -> bool {
        self.status == CouponStatus::Active && self.is_valid_on(Utc::now().date_naive())
    }

    pub fn vendor_id(&self) -> Option<&str> {
        self.vendor.as_ref().map(EntityRef::as_str)
    }
}

/// Global coupon policy set by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettings {
    /// Ceiling for percentage offers, in percent.
    pub max_discount: Decimal,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            max_discount: Decimal::from(50),
        }
    }
}

/// Dates arrive either as `YYYY-MM-DD` (form input) or as full RFC 3339
/// timestamps (stored documents); both are read as calendar dates.
pub(crate) mod flexible_date {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
    }

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        NaiveDate::parse_from_str(raw, FORMAT)
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_plain_and_timestamp_dates() {
        let offer: VendorOffer = serde_json::from_value(json!({
            "_id": "c1",
            "vendor": {"_id": "v1"},
            "code": "DIWALI20",
            "type": "PERCENTAGE",
            "value": 20,
            "validFrom": "2024-10-01",
            "validUntil": "2024-11-15T00:00:00.000Z",
            "status": "PENDING"
        }))
        .unwrap();

        assert_eq!(offer.kind, CouponType::Percentage);
        assert_eq!(offer.vendor_id(), Some("v1"));
        assert_eq!(offer.valid_until, NaiveDate::from_ymd_opt(2024, 11, 15).unwrap());
        assert!(offer.is_valid_on(NaiveDate::from_ymd_opt(2024, 10, 20).unwrap()));
        assert!(!offer.is_valid_on(NaiveDate::from_ymd_opt(2024, 11, 16).unwrap()));
    }

    #[test]
    fn dates_serialize_as_calendar_days() {
        let offer = VendorOffer {
            id: "c1".into(),
            vendor: None,
            code: "FLAT100".into(),
            kind: CouponType::Flat,
            value: Decimal::from(100),
            min_order: Some(Decimal::from(500)),
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            valid_until: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            status: CouponStatus::Active,
            rejection_reason: None,
            description: None,
        };
        let value = serde_json::to_value(&offer).unwrap();
        assert_eq!(value["validFrom"], "2024-01-01");
        assert_eq!(value["type"], "FLAT");
        assert_eq!(value["status"], "ACTIVE");
    }
}
