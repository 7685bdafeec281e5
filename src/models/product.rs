use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Reference to another API entity, always held as a resolved id.
///
/// The API returns references either as a bare id string or as a populated
/// object carrying `_id`; both forms collapse to the id here so no caller has to
/// care which one it got.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityRef(String);

pub type ProductRef = EntityRef;
pub type UserRef = EntityRef;

impl EntityRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for EntityRef {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for EntityRef {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl<'de> Deserialize<'de> for EntityRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Id(String),
            Populated {
                #[serde(rename = "_id", alias = "id")]
                id: String,
            },
        }

        let id = match Wire::deserialize(deserializer)? {
            Wire::Id(id) | Wire::Populated { id } => id,
        };
        if id.trim().is_empty() {
            return Err(serde::de::Error::custom("entity reference cannot be empty"));
        }
        Ok(Self(id))
    }
}

/// Catalog product as listed by `GET /api/products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub count_in_stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<EntityRef>,
    #[serde(default)]
    pub is_approved: bool,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.count_in_stock > 0
    }
}
