//! Client state persisted to a real directory survives a reload.

mod common;

use common::TestApi;
use marketplace_orders::{
    models::EntityRef,
    services::Actor,
    state::{
        auth::SESSION_KEY, cart::CART_KEY, CartItem, ClientState, Credentials, LocalStore,
        WishlistItem,
    },
};
use rust_decimal_macros::dec;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

fn lamp(qty: u32) -> CartItem {
    CartItem {
        product: EntityRef::new("p1"),
        name: "Brass lamp".into(),
        image: None,
        price: dec!(50),
        qty,
        vendor: Some(EntityRef::new("vendor-a")),
        count_in_stock: Some(5),
    }
}

#[test]
fn cart_and_wishlist_survive_reload() {
    let dir = TempDir::new().unwrap();

    let mut state = ClientState::load(LocalStore::in_dir(dir.path())).unwrap();
    state.cart.add(lamp(2)).unwrap();
    state.cart.add(lamp(4)).unwrap();
    state
        .wishlist
        .toggle(WishlistItem {
            product: EntityRef::new("p2"),
            name: "Cotton rug".into(),
            image: None,
            price: dec!(50),
        })
        .unwrap();
    drop(state);

    let reloaded = ClientState::load(LocalStore::in_dir(dir.path())).unwrap();
    assert_eq!(reloaded.cart.items().len(), 1);
    assert_eq!(reloaded.cart.items()[0].qty, 5);
    assert_eq!(reloaded.cart.subtotal(), dec!(250));
    assert!(reloaded.wishlist.contains("p2"));
    assert!(reloaded.auth.session().is_none());
}

#[test]
fn clearing_the_cart_removes_its_file() {
    let dir = TempDir::new().unwrap();
    let mut state = ClientState::load(LocalStore::in_dir(dir.path())).unwrap();
    state.cart.add(lamp(1)).unwrap();
    let cart_file = dir.path().join(format!("{CART_KEY}.json"));
    assert!(cart_file.exists());

    state.cart.clear().unwrap();

    assert!(!cart_file.exists());
    let reloaded = ClientState::load(LocalStore::in_dir(dir.path())).unwrap();
    assert!(reloaded.cart.is_empty());
}

#[test]
fn corrupt_document_is_discarded() {
    let dir = TempDir::new().unwrap();
    let cart_file = dir.path().join(format!("{CART_KEY}.json"));
    fs::write(&cart_file, "{ not json").unwrap();

    let state = ClientState::load(LocalStore::in_dir(dir.path())).unwrap();

    assert!(state.cart.is_empty());
    assert!(!cart_file.exists());
}

#[tokio::test]
async fn session_is_restored_after_login_and_dropped_on_logout() {
    let t = TestApi::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "vendor-a",
            "name": "Lamp House",
            "email": "lamps@example.com",
            "role": "vendor",
            "token": "fresh-token"
        })))
        .expect(1)
        .mount(&t.server)
        .await;
    let dir = TempDir::new().unwrap();

    let mut state = ClientState::load(LocalStore::in_dir(dir.path())).unwrap();
    state
        .auth
        .login(
            t.api.as_ref(),
            Credentials {
                email: "lamps@example.com".into(),
                password: "secret".into(),
            },
        )
        .await
        .unwrap();
    drop(state);

    let mut reloaded = ClientState::load(LocalStore::in_dir(dir.path())).unwrap();
    let session = reloaded.auth.require().unwrap();
    assert_eq!(session.token, "fresh-token");
    assert_eq!(
        reloaded.auth.actor(),
        Some(Actor::Vendor {
            vendor_id: "vendor-a".into()
        })
    );

    reloaded.auth.logout(t.api.as_ref()).unwrap();
    assert!(!dir.path().join(format!("{SESSION_KEY}.json")).exists());
}

#[tokio::test]
async fn invalid_credentials_never_reach_the_server() {
    let t = TestApi::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&t.server)
        .await;

    let mut state = ClientState::load(LocalStore::in_memory()).unwrap();
    let err = state
        .auth
        .login(
            t.api.as_ref(),
            Credentials {
                email: "not-an-email".into(),
                password: "secret".into(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.toast_message(), "Please enter a valid email");
    assert!(state.auth.session().is_none());
}
