//! User and session client.
//!
//! The user endpoints answer `{success, data}` rather than `{code, message, data}`; the envelope
//! decoder handles both, so nothing here needs to care.

use crate::api::envelope::{self, Subject};
use crate::api::models::pagination::{Page, PageRequest};
use crate::api::models::users::{LoginRequest, RefreshRequest, Session, TokenPair, User, UserWrite};
use crate::crypto::ProtectedSecret;
use crate::errors::{Error, Result};
use crate::http::{ApiRequest, Transport};
use crate::types::UserId;
use std::sync::Arc;
use tracing::{info, instrument};

const RESOURCE: &str = "User";

#[derive(Clone)]
pub struct UserClient {
    transport: Arc<dyn Transport>,
}

impl UserClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `POST user/login`. The password must already be protected.
    #[instrument(skip(self, password), err)]
    pub async fn login(&self, account: &str, password: &ProtectedSecret) -> Result<Session> {
        if account.trim().is_empty() {
            return Err(Error::invalid_input("Account must not be empty"));
        }

        let request = ApiRequest::post("user/login").json(&LoginRequest { account, password })?;
        let response = self.transport.execute(&request).await?;
        let session = envelope::decode::<Session>(response, &Subject::new(RESOURCE, account))?.require_data("session")?;

        info!(account, privilege = ?session.privilege(), "Logged in");
        Ok(session)
    }

    /// `POST user/refresh-token`
    #[instrument(skip_all, err)]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair> {
        let request = ApiRequest::post("user/refresh-token").json(&RefreshRequest { refresh_token })?;
        let response = self.transport.execute(&request).await?;
        envelope::decode::<TokenPair>(response, &Subject::new("Session", "refresh"))?.require_data("token pair")
    }

    /// `POST user/addUser`
    #[instrument(skip(self, user), fields(account = %user.account), err)]
    pub async fn add_user(&self, user: &UserWrite) -> Result<()> {
        if user.account.trim().is_empty() {
            return Err(Error::Validation { field: "account" });
        }
        if user.password.is_none() {
            return Err(Error::Validation { field: "password" });
        }

        let request = ApiRequest::post("user/addUser").json(user)?;
        let response = self.transport.execute(&request).await?;
        envelope::decode::<serde_json::Value>(response, &Subject::new(RESOURCE, &user.account))?;
        Ok(())
    }

    /// `GET user/getUserInfo/{id}`
    #[instrument(skip(self), err)]
    pub async fn get_user(&self, id: UserId) -> Result<User> {
        let response = self.transport.execute(&ApiRequest::get(format!("user/getUserInfo/{id}"))).await?;
        envelope::decode::<User>(response, &Subject::new(RESOURCE, id))?
            .data
            .ok_or_else(|| Error::NotFound {
                resource: RESOURCE.to_string(),
                id: id.to_string(),
            })
    }

    /// `PUT user/updateUserInfo/{id}`. Leave `password` unset to keep the current one.
    #[instrument(skip(self, user), err)]
    pub async fn update_user(&self, id: UserId, user: &UserWrite) -> Result<()> {
        let request = ApiRequest::put(format!("user/updateUserInfo/{id}")).json(user)?;
        let response = self.transport.execute(&request).await?;
        envelope::decode::<serde_json::Value>(response, &Subject::new(RESOURCE, id))?;
        Ok(())
    }

    /// `DELETE user/deleteUser/{id}`
    #[instrument(skip(self), err)]
    pub async fn delete_user(&self, id: UserId) -> Result<()> {
        let response = self.transport.execute(&ApiRequest::delete(format!("user/deleteUser/{id}"))).await?;
        envelope::decode::<serde_json::Value>(response, &Subject::new(RESOURCE, id))?;
        Ok(())
    }

    /// `PATCH user/enable/{id}?enabled`
    #[instrument(skip(self), err)]
    pub async fn set_enabled(&self, id: UserId, enabled: bool) -> Result<()> {
        let request = ApiRequest::patch(format!("user/enable/{id}")).query("enabled", enabled);
        let response = self.transport.execute(&request).await?;
        envelope::decode::<serde_json::Value>(response, &Subject::new(RESOURCE, id))?;
        Ok(())
    }

    /// `GET user/list?page&pageSize`
    #[instrument(skip(self), err)]
    pub async fn list_users(&self, paging: PageRequest) -> Result<Page<User>> {
        let mut request = ApiRequest::get("user/list");
        for (key, value) in paging.query() {
            request = request.query(key, value);
        }

        let response = self.transport.execute(&request).await?;
        envelope::decode::<Page<User>>(response, &Subject::new(RESOURCE, "list"))?.require_data("user page")
    }
}
