use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use super::storage::LocalStore;
use crate::api::MarketplaceApi;
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{AuthUser, Role};
use crate::services::order_status::Actor;

pub const SESSION_KEY: &str = "userInfo";

/// Body of `POST /api/users/login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub saved_at: DateTime<Utc>,
}

impl From<AuthUser> for Session {
    fn from(user: AuthUser) -> Self {
        Self {
            token: user.token,
            user: SessionUser {
                id: user.id,
                name: user.name,
                email: user.email,
                role: user.role,
            },
            saved_at: Utc::now(),
        }
    }
}

impl Session {
    /// Who the workflows act on behalf of.
    pub fn actor(&self) -> Actor {
        match self.user.role {
            Role::Admin => Actor::Admin,
            Role::Vendor => Actor::Vendor {
                vendor_id: self.user.id.clone(),
            },
            Role::Customer => Actor::Customer {
                user_id: self.user.id.clone(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthState {
    session: Option<Session>,
    store: LocalStore,
}

impl AuthState {
    pub fn load(store: LocalStore) -> ServiceResult<Self> {
        let session = store.get::<Session>(SESSION_KEY)?;
        Ok(Self { session, store })
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn actor(&self) -> Option<Actor> {
        self.session.as_ref().map(Session::actor)
    }

    /// Session or `Unauthorized` when nobody is logged in.
    pub fn require(&self) -> ServiceResult<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| ServiceError::Unauthorized("Please log in first".to_string()))
    }

    /// Hands a restored token to the API client.
    pub fn restore(&self, api: &dyn MarketplaceApi) {
        api.set_token(self.session.as_ref().map(|s| s.token.clone()));
    }

    #[instrument(skip(self, api, credentials), fields(email = %credentials.email))]
    pub async fn login(
        &mut self,
        api: &dyn MarketplaceApi,
        credentials: Credentials,
    ) -> ServiceResult<&Session> {
        credentials.validate()?;
        let user = api.login(&credentials).await?;
        let session = Session::from(user);
        api.set_token(Some(session.token.clone()));
        self.store.set(SESSION_KEY, &session)?;
        info!(user_id = %session.user.id, role = %session.user.role, "logged in");
        Ok(self.session.insert(session))
    }

    pub fn logout(&mut self, api: &dyn MarketplaceApi) -> ServiceResult<()> {
        api.set_token(None);
        self.session = None;
        self.store.remove(SESSION_KEY)
    }
}
