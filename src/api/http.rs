use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    AcceptOrderBody, CancellationRequest, CouponScope, CouponStatusUpdate, MarketplaceApi,
    NewOffer,
};
use crate::config::AppConfig;
use crate::errors::{ErrorResponse, ServiceError, ServiceResult};
use crate::models::{
    AdminSettings, AuthUser, NewOrder, Order, Product, ReturnRequest, ReturnStatusUpdate,
    UserProfile, VendorOffer,
};
use crate::state::{Credentials, NewAddress, ProfileSync, SavedAddress};

/// reqwest-backed [`MarketplaceApi`].
#[derive(Debug)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> ServiceResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServiceError::Config(format!("invalid api base url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::Config(format!(
                "api base url {base_url} cannot take a path"
            )));
        }

        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url,
            token: RwLock::new(None),
        })
    }

    pub fn from_config(config: &AppConfig) -> ServiceResult<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `segments` to the base path. Each segment is percent-encoded,
    /// so an id can never change the route.
    fn url(&self, segments: &[&str]) -> ServiceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::Config(format!("api base url {} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> ServiceResult<RequestBuilder> {
        let url = self.url(segments)?;
        let mut builder = self.client.request(method, url);
        let token = self
            .token
            .read()
            .map_err(|_| ServiceError::Storage("token lock poisoned".to_string()))?
            .clone();
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> ServiceResult<Response> {
        let response = builder.send().await?;
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_success() {
            return Ok(response);
        }

        // Error bodies are best effort; a non-JSON body still yields the status.
        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ErrorResponse>(&body).ok();
        warn!(status = status.as_u16(), body = %body, "request failed");
        Err(ServiceError::from_response(status, parsed))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &[&str]) -> ServiceResult<T> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_json<B, T>(&self, method: Method, path: &[&str], body: &B) -> ServiceResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(method, path)?.json(body)).await?;
        Ok(response.json::<T>().await?)
    }

    /// Mutation whose response body is ignored.
    async fn send_unit<B>(&self, method: Method, path: &[&str], body: Option<&B>) -> ServiceResult<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        let mut builder = self.request(method, path)?;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(builder).await?;
        Ok(())
    }
}

#[async_trait]
impl MarketplaceApi for HttpApi {
    fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    #[instrument(skip(self))]
    async fn my_orders(&self) -> ServiceResult<Vec<Order>> {
        let orders: Vec<Order> = self.get_json(&["api", "orders", "myorders"]).await?;
        debug!(count = orders.len(), "fetched customer orders");
        Ok(orders)
    }

    #[instrument(skip(self))]
    async fn all_orders(&self) -> ServiceResult<Vec<Order>> {
        let orders: Vec<Order> = self.get_json(&["api", "orders"]).await?;
        debug!(count = orders.len(), "fetched orders");
        Ok(orders)
    }

    #[instrument(skip(self, order), fields(items = order.order_items.len(), total = %order.total_price))]
    async fn create_order(&self, order: &NewOrder) -> ServiceResult<Order> {
        self.send_json(Method::POST, &["api", "orders"], order).await
    }

    #[instrument(skip(self))]
    async fn accept_order(&self, order_id: &str) -> ServiceResult<()> {
        self.send_unit(
            Method::PUT,
            &["api", "orders", order_id, "pay"],
            Some(&AcceptOrderBody::default()),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn deliver_order(&self, order_id: &str) -> ServiceResult<()> {
        self.send_unit::<()>(Method::PUT, &["api", "orders", order_id, "deliver"], None)
            .await
    }

    #[instrument(skip(self, request))]
    async fn request_cancellation(
        &self,
        order_id: &str,
        request: &CancellationRequest,
    ) -> ServiceResult<()> {
        self.send_unit(
            Method::PUT,
            &["api", "orders", order_id, "cancel"],
            Some(request),
        )
        .await
    }

    #[instrument(skip(self, request), fields(item_id = %request.item_id, kind = %request.kind))]
    async fn submit_return(&self, order_id: &str, request: &ReturnRequest) -> ServiceResult<()> {
        self.send_unit(
            Method::POST,
            &["api", "orders", order_id, "return"],
            Some(request),
        )
        .await
    }

    #[instrument(skip(self, update), fields(item_id = %update.item_id, status = %update.status))]
    async fn update_return_status(
        &self,
        order_id: &str,
        update: &ReturnStatusUpdate,
    ) -> ServiceResult<()> {
        self.send_unit(
            Method::PUT,
            &["api", "orders", order_id, "return-status"],
            Some(update),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        self.get_json(&["api", "products"]).await
    }

    #[instrument(skip(self))]
    async fn get_product(&self, product_id: &str) -> ServiceResult<Product> {
        self.get_json(&["api", "products", product_id]).await
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> ServiceResult<AuthUser> {
        self.send_json(Method::POST, &["api", "users", "login"], credentials)
            .await
    }

    #[instrument(skip(self))]
    async fn profile(&self) -> ServiceResult<UserProfile> {
        self.get_json(&["api", "users", "profile"]).await
    }

    #[instrument(skip(self, body), fields(cart = body.cart.len(), wishlist = body.wishlist.len()))]
    async fn sync_profile(&self, body: &ProfileSync) -> ServiceResult<()> {
        self.send_unit(Method::PUT, &["api", "users", "profile"], Some(body))
            .await
    }

    #[instrument(skip(self))]
    async fn list_addresses(&self) -> ServiceResult<Vec<SavedAddress>> {
        self.get_json(&["api", "addresses"]).await
    }

    #[instrument(skip(self, address))]
    async fn add_address(&self, address: &NewAddress) -> ServiceResult<SavedAddress> {
        self.send_json(Method::POST, &["api", "addresses"], address).await
    }

    #[instrument(skip(self))]
    async fn delete_address(&self, address_id: &str) -> ServiceResult<()> {
        self.send_unit::<()>(Method::DELETE, &["api", "addresses", address_id], None)
            .await
    }

    #[instrument(skip(self))]
    async fn list_coupons(&self, scope: CouponScope) -> ServiceResult<Vec<VendorOffer>> {
        self.get_json(scope.segments()).await
    }

    #[instrument(skip(self, offer), fields(code = %offer.code))]
    async fn create_coupon(&self, offer: &NewOffer) -> ServiceResult<VendorOffer> {
        self.send_json(Method::POST, &["api", "coupons"], offer).await
    }

    #[instrument(skip(self, update), fields(status = %update.status))]
    async fn update_coupon_status(
        &self,
        coupon_id: &str,
        update: &CouponStatusUpdate,
    ) -> ServiceResult<()> {
        self.send_unit(
            Method::PUT,
            &["api", "coupons", coupon_id, "status"],
            Some(update),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn admin_settings(&self) -> ServiceResult<AdminSettings> {
        self.get_json(&["api", "admin", "settings"]).await
    }

    #[instrument(skip(self))]
    async fn update_admin_settings(&self, settings: &AdminSettings) -> ServiceResult<()> {
        self.send_unit(Method::PUT, &["api", "admin", "settings"], Some(settings))
            .await
    }
}
