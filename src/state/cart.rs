use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::storage::LocalStore;
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{EntityRef, Product, ProductRef};
use crate::pricing::items_subtotal;

pub const CART_KEY: &str = "cartItems";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product: ProductRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub price: Decimal,
    pub qty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_in_stock: Option<u32>,
}

impl CartItem {
    pub fn from_product(product: &Product, qty: u32) -> Self {
        Self {
            product: ProductRef::new(product.id.clone()),
            name: product.name.clone(),
            image: product.image.clone(),
            price: product.price,
            qty,
            vendor: product.vendor.clone(),
            count_in_stock: Some(product.count_in_stock),
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.qty)
    }

    fn capped(&self, qty: u32) -> u32 {
        match self.count_in_stock {
            Some(stock) => qty.min(stock),
            None => qty,
        }
    }
}

/// Shopping cart, persisted under [`CART_KEY`] after every change.
#[derive(Debug, Clone)]
pub struct CartState {
    items: Vec<CartItem>,
    store: LocalStore,
}

impl CartState {
    pub fn load(store: LocalStore) -> ServiceResult<Self> {
        let items = store.get::<Vec<CartItem>>(CART_KEY)?.unwrap_or_default();
        Ok(Self { items, store })
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.qty).sum()
    }

    fn save(&self) -> ServiceResult<()> {
        self.store.set(CART_KEY, &self.items)
    }

    /// Adds `item`, merging quantities with an existing line for the same
    /// product. Quantities never exceed the known stock.
    #[instrument(skip(self, item), fields(product = %item.product, qty = item.qty))]
    pub fn add(&mut self, item: CartItem) -> ServiceResult<()> {
        if item.qty == 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }
        if item.count_in_stock == Some(0) {
            return Err(ServiceError::InvalidOperation(format!(
                "{} is out of stock",
                item.name
            )));
        }

        match self.items.iter_mut().find(|line| line.product == item.product) {
            Some(existing) => {
                existing.count_in_stock = item.count_in_stock.or(existing.count_in_stock);
                existing.price = item.price;
                existing.qty = existing.capped(existing.qty.saturating_add(item.qty));
            }
            None => {
                let qty = item.capped(item.qty);
                self.items.push(CartItem { qty, ..item });
            }
        }
        debug!(lines = self.items.len(), "cart updated");
        self.save()
    }

    /// Sets the quantity of a line; zero removes it.
    pub fn update_quantity(&mut self, product_id: &str, qty: u32) -> ServiceResult<()> {
        if qty == 0 {
            return self.remove(product_id);
        }
        let line = self
            .items
            .iter_mut()
            .find(|line| line.product == product_id)
            .ok_or_else(|| ServiceError::NotFound(format!("{product_id} is not in the cart")))?;
        line.qty = line.capped(qty);
        self.save()
    }

    pub fn remove(&mut self, product_id: &str) -> ServiceResult<()> {
        self.items.retain(|line| line.product != product_id);
        self.save()
    }

    pub fn clear(&mut self) -> ServiceResult<()> {
        self.items.clear();
        self.store.remove(CART_KEY)
    }

    /// Replaces the cart wholesale, e.g. with the copy held on the server profile.
    pub fn replace(&mut self, items: Vec<CartItem>) -> ServiceResult<()> {
        self.items = items;
        self.save()
    }

    pub fn subtotal(&self) -> Decimal {
        items_subtotal(self.items.iter().map(|line| (line.price, line.qty)))
    }

    /// Subtotal per vendor id; lines without a vendor tag are grouped under `""`.
    pub fn vendor_subtotals(&self) -> BTreeMap<String, Decimal> {
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for line in &self.items {
            let vendor = line
                .vendor
                .as_ref()
                .map(|v| v.as_str().to_string())
                .unwrap_or_default();
            *totals.entry(vendor).or_default() += line.line_total();
        }
        totals
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn cart_item(product: &str, vendor: &str, price: Decimal, qty: u32) -> CartItem {
        CartItem {
            product: ProductRef::new(product),
            name: format!("Product {product}"),
            image: None,
            price,
            qty,
            vendor: Some(EntityRef::new(vendor)),
            count_in_stock: Some(10),
        }
    }
}
