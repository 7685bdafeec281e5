use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::storage::LocalStore;
use crate::errors::ServiceResult;
use crate::models::{Product, ProductRef};

pub const WISHLIST_KEY: &str = "wishlistItems";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub product: ProductRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub price: Decimal,
}

impl From<&Product> for WishlistItem {
    fn from(product: &Product) -> Self {
        Self {
            product: ProductRef::new(product.id.clone()),
            name: product.name.clone(),
            image: product.image.clone(),
            price: product.price,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WishlistState {
    items: Vec<WishlistItem>,
    store: LocalStore,
}

impl WishlistState {
    pub fn load(store: LocalStore) -> ServiceResult<Self> {
        let items = store
            .get::<Vec<WishlistItem>>(WISHLIST_KEY)?
            .unwrap_or_default();
        Ok(Self { items, store })
    }

    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.items.iter().any(|item| item.product == product_id)
    }

    /// Adds the item, or removes it when already present. Returns whether the
    /// product is wishlisted afterwards.
    pub fn toggle(&mut self, item: WishlistItem) -> ServiceResult<bool> {
        let present = if self.contains(item.product.as_str()) {
            self.items.retain(|existing| existing.product != item.product);
            false
        } else {
            self.items.push(item);
            true
        };
        self.store.set(WISHLIST_KEY, &self.items)?;
        Ok(present)
    }

    pub fn replace(&mut self, items: Vec<WishlistItem>) -> ServiceResult<()> {
        self.items = items;
        self.store.set(WISHLIST_KEY, &self.items)
    }

    pub fn clear(&mut self) -> ServiceResult<()> {
        self.items.clear();
        self.store.remove(WISHLIST_KEY)
    }
}
