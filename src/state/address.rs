use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::{Validate, ValidationError};

use crate::api::MarketplaceApi;
use crate::errors::{ServiceError, ServiceResult};
use crate::models::ShippingAddress;

static PINCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-9][0-9]{5}$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[6-9][0-9]{9}$").unwrap());

fn validate_pincode(pincode: &str) -> Result<(), ValidationError> {
    if PINCODE_RE.is_match(pincode.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("pincode");
        err.message = Some("Pincode must be 6 digits".into());
        Err(err)
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("Phone number must be 10 digits".into());
        Err(err)
    }
}

/// Address held in the user's address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAddress {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub address: String,
    pub city: String,
    pub pincode: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl SavedAddress {
    /// Copy embedded into a new order; later edits to the book never reach it.
    pub fn snapshot(&self) -> ShippingAddress {
        ShippingAddress {
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            pincode: self.pincode.trim().to_string(),
            phone: self.phone.trim().to_string(),
            country: self.country.trim().to_string(),
        }
    }
}

/// Body of `POST /api/addresses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAddress {
    #[validate(length(min = 3, max = 200, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 2, max = 100, message = "City is required"))]
    pub city: String,
    #[validate(custom = "validate_pincode")]
    pub pincode: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(length(min = 2, max = 60, message = "Country is required"))]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Address book plus the checkout selection.
#[derive(Debug, Clone, Default)]
pub struct AddressBook {
    addresses: Vec<SavedAddress>,
    selected: Option<usize>,
}

impl AddressBook {
    pub fn new(addresses: Vec<SavedAddress>) -> Self {
        let selected = addresses
            .iter()
            .position(|a| a.is_default)
            .or(if addresses.is_empty() { None } else { Some(0) });
        Self {
            addresses,
            selected,
        }
    }

    pub fn addresses(&self) -> &[SavedAddress] {
        &self.addresses
    }

    #[instrument(skip(api))]
    pub async fn refresh(&mut self, api: &dyn MarketplaceApi) -> ServiceResult<()> {
        let previous = self.selected_address().and_then(|a| a.id.clone());
        *self = Self::new(api.list_addresses().await?);
        if let Some(id) = previous {
            // Keep the user's pick across refreshes when it still exists.
            let _ = self.select(&id);
        }
        Ok(())
    }

    #[instrument(skip(self, api, address), fields(city = %address.city))]
    pub async fn add(
        &mut self,
        api: &dyn MarketplaceApi,
        address: NewAddress,
    ) -> ServiceResult<SavedAddress> {
        address.validate()?;
        let saved = api.add_address(&address).await?;
        if saved.is_default {
            // At most one address is the default.
            self.addresses.iter_mut().for_each(|a| a.is_default = false);
        }
        self.addresses.push(saved.clone());
        if saved.is_default || self.selected.is_none() {
            self.selected = Some(self.addresses.len() - 1);
        }
        Ok(saved)
    }

    #[instrument(skip(self, api))]
    pub async fn delete(&mut self, api: &dyn MarketplaceApi, id: &str) -> ServiceResult<()> {
        api.delete_address(id).await?;
        let selected_id = self.selected_address().and_then(|a| a.id.clone());
        self.addresses.retain(|a| a.id.as_deref() != Some(id));
        self.selected = match selected_id {
            Some(sel) if sel != id => self
                .addresses
                .iter()
                .position(|a| a.id.as_deref() == Some(sel.as_str())),
            _ if self.addresses.is_empty() => None,
            _ => Some(0),
        };
        Ok(())
    }

    pub fn select(&mut self, id: &str) -> ServiceResult<()> {
        let index = self
            .addresses
            .iter()
            .position(|a| a.id.as_deref() == Some(id))
            .ok_or_else(|| ServiceError::NotFound(format!("Address {id} not found")))?;
        self.selected = Some(index);
        Ok(())
    }

    pub fn selected_address(&self) -> Option<&SavedAddress> {
        self.selected.and_then(|i| self.addresses.get(i))
    }

    /// Shipping snapshot of the current selection.
    pub fn selected_snapshot(&self) -> ServiceResult<ShippingAddress> {
        self.selected_address()
            .map(SavedAddress::snapshot)
            .ok_or_else(|| {
                ServiceError::ValidationError("Please select a shipping address".to_string())
            })
    }
}
