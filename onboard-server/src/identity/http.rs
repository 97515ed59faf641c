//! reqwest adapter for the identity service
//!
//! - `POST {base}/api/accounts` registers an account
//! - `GET {base}/api/accounts/{username}?email=` checks existence

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use shared::ProvisioningFields;
use shared::error::ApiResponse;
use std::time::Duration;

use super::{IdentityClient, IdentityError, IdentityResult};

#[derive(Debug, Serialize)]
struct RegisterAccountRequest<'a> {
    username: &'a str,
    email: &'a str,
    role: &'a str,
    tenant_id: &'a str,
    organization_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisteredAccount {
    account_id: String,
}

pub struct HttpIdentityClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpIdentityClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> IdentityResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Unavailable(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

fn transport_error(e: reqwest::Error) -> IdentityError {
    if e.is_timeout() {
        IdentityError::Unavailable(format!("request timed out: {e}"))
    } else {
        IdentityError::Unavailable(format!("connection failed: {e}"))
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn register(&self, account: &ProvisioningFields) -> IdentityResult<String> {
        let resp = self
            .client
            .post(format!("{}/api/accounts", self.base_url))
            .json(&RegisterAccountRequest {
                username: &account.username,
                email: &account.email,
                role: &account.role,
                tenant_id: &account.tenant_id,
                organization_name: &account.organization_name,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status == StatusCode::CONFLICT {
            return Err(IdentityError::AlreadyExists(account.username.clone()));
        }
        if status.is_server_error() {
            let text = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Unavailable(format!("{status} - {text}")));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected(format!("{status} - {text}")));
        }

        let body: ApiResponse<RegisteredAccount> = resp
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("Invalid response: {e}")))?;
        if !body.is_success() {
            return Err(IdentityError::Rejected(body.message));
        }

        Ok(body
            .data
            .map(|data| data.account_id)
            .unwrap_or_else(|| account.username.clone()))
    }

    async fn account_exists(&self, username: &str, email: &str) -> IdentityResult<bool> {
        let resp = self
            .client
            .get(format!("{}/api/accounts/{}", self.base_url, username))
            .query(&[("email", email)])
            .send()
            .await
            .map_err(transport_error)?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => {
                let text = resp.text().await.unwrap_or_default();
                Err(IdentityError::Unavailable(format!("{status} - {text}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client =
            HttpIdentityClient::new("http://identity.local:3001/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://identity.local:3001");
    }

    #[test]
    fn test_register_body_shape() {
        let body = RegisterAccountRequest {
            username: "u1",
            email: "a@acme.com",
            role: "admin",
            tenant_id: "t1",
            organization_name: "Acme",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["username"], "u1");
        assert_eq!(json["tenant_id"], "t1");
        assert!(json.get("password").is_none());
    }
}
