//! Client-side state containers.
//!
//! Everything here is scratch state owned by one user session: it lives in
//! memory, is mirrored to a [`LocalStore`] and, for cart and wishlist, synced
//! to the server-side profile once the user is authenticated.

pub mod address;
pub mod auth;
pub mod cart;
pub mod storage;
pub mod wishlist;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

pub use address::{AddressBook, NewAddress, SavedAddress};
pub use auth::{AuthState, Credentials, Session, SessionUser};
pub use cart::{CartItem, CartState};
pub use storage::LocalStore;
pub use wishlist::{WishlistItem, WishlistState};

use crate::api::MarketplaceApi;
use crate::errors::ServiceResult;

/// Body of `PUT /api/users/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSync {
    pub cart: Vec<CartItem>,
    pub wishlist: Vec<WishlistItem>,
}

#[derive(Debug, Clone)]
pub struct ClientState {
    pub auth: AuthState,
    pub cart: CartState,
    pub wishlist: WishlistState,
    pub addresses: AddressBook,
}

impl ClientState {
    pub fn load(store: LocalStore) -> ServiceResult<Self> {
        Ok(Self {
            auth: AuthState::load(store.clone())?,
            cart: CartState::load(store.clone())?,
            wishlist: WishlistState::load(store)?,
            addresses: AddressBook::default(),
        })
    }

    /// Pushes the local cart and wishlist to the profile. No-op when logged out.
    #[instrument(skip_all)]
    pub async fn sync_to_profile(&self, api: &dyn MarketplaceApi) -> ServiceResult<()> {
        if self.auth.session().is_none() {
            return Ok(());
        }
        api.sync_profile(&ProfileSync {
            cart: self.cart.items().to_vec(),
            wishlist: self.wishlist.items().to_vec(),
        })
        .await
    }

    /// After login: adopts the server copy unless the local cart already has
    /// lines, in which case the local cart wins and is pushed up.
    #[instrument(skip_all)]
    pub async fn hydrate_from_profile(&mut self, api: &dyn MarketplaceApi) -> ServiceResult<()> {
        let profile = api.profile().await?;
        let local_has_items = !self.cart.is_empty() || !self.wishlist.items().is_empty();
        if local_has_items {
            info!("keeping local cart and wishlist over profile copy");
            return self.sync_to_profile(api).await;
        }
        self.cart.replace(profile.cart)?;
        self.wishlist.replace(profile.wishlist)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::cart::fixtures::cart_item;
    use super::*;
    use crate::api::MockMarketplaceApi;
    use crate::models::{AuthUser, Role, UserProfile};
    use rust_decimal_macros::dec;

    fn logged_in(store: &LocalStore) {
        let session = Session::from(AuthUser {
            id: "u1".into(),
            name: "Ravi".into(),
            email: "ravi@example.com".into(),
            role: Role::Customer,
            token: "t".into(),
        });
        store.set(auth::SESSION_KEY, &session).unwrap();
    }

    #[tokio::test]
    async fn logged_out_sync_sends_nothing() {
        let api = MockMarketplaceApi::new();
        let state = ClientState::load(LocalStore::in_memory()).unwrap();
        state.sync_to_profile(&api).await.unwrap();
    }

    #[tokio::test]
    async fn empty_local_state_adopts_profile_copy() {
        let store = LocalStore::in_memory();
        logged_in(&store);
        let mut api = MockMarketplaceApi::new();
        api.expect_profile().times(1).returning(|| {
            Ok(UserProfile {
                id: "u1".into(),
                name: "Ravi".into(),
                email: "ravi@example.com".into(),
                role: Role::Customer,
                cart: vec![cart_item("p1", "v1", dec!(10), 2)],
                wishlist: vec![],
            })
        });

        let mut state = ClientState::load(store).unwrap();
        state.hydrate_from_profile(&api).await.unwrap();
        assert_eq!(state.cart.item_count(), 2);
    }

    #[tokio::test]
    async fn local_cart_is_pushed_over_profile() {
        let store = LocalStore::in_memory();
        logged_in(&store);
        let mut api = MockMarketplaceApi::new();
        api.expect_profile().times(1).returning(|| {
            Ok(UserProfile {
                id: "u1".into(),
                name: "Ravi".into(),
                email: "ravi@example.com".into(),
                role: Role::Customer,
                cart: vec![],
                wishlist: vec![],
            })
        });
        api.expect_sync_profile()
            .withf(|body: &ProfileSync| body.cart.len() == 1)
            .times(1)
            .returning(|_| Ok(()));

        let mut state = ClientState::load(store).unwrap();
        state.cart.add(cart_item("p9", "v1", dec!(5), 1)).unwrap();
        state.hydrate_from_profile(&api).await.unwrap();
    }
}
