//! HTTP Profile Store
//!
//! REST client for the application data API under `rest/v1/`: the
//! `user_profiles` and `user_permissions` tables. Row-level access control
//! is enforced server-side from the bearer token, which this client borrows
//! from the identity gateway.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::application::config::GatewayConfig;
use crate::domain::entity::profile::{Profile, ProfileChanges};
use crate::domain::gateway::ProfileStore;
use crate::domain::value_object::role::Role;
use crate::error::{AuthError, AuthResult};
use crate::infra::http_gateway::HttpIdentityGateway;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP-backed profile store
pub struct HttpProfileStore {
    http: reqwest::Client,
    config: GatewayConfig,
    gateway: Arc<HttpIdentityGateway>,
}

impl HttpProfileStore {
    pub fn new(config: GatewayConfig, gateway: Arc<HttpIdentityGateway>) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            gateway,
        })
    }

    fn table(&self, name: &str) -> AuthResult<Url> {
        self.config
            .base_url
            .join(&format!("rest/v1/{name}"))
            .map_err(|e| AuthError::Internal(format!("Invalid table endpoint {name}: {e}")))
    }

    /// Profile data is session-bound; without a bearer token there is
    /// nothing to fetch
    fn bearer(&self) -> AuthResult<String> {
        self.gateway.access_token().ok_or(AuthError::NoSessionFound)
    }

    async fn check(&self, response: reqwest::Response) -> AuthResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.as_u16() == 401 {
            return Err(AuthError::NoSessionFound);
        }
        if status.as_u16() >= 500 {
            return Err(AuthError::Network(format!(
                "Profile backend returned {status}"
            )));
        }
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::Internal(format!(
            "Profile backend returned {status}: {body}"
        )))
    }
}

impl ProfileStore for HttpProfileStore {
    async fn fetch_profile(&self, user_id: &str) -> AuthResult<Option<Profile>> {
        let url = self.table("user_profiles")?;
        let response = self
            .http
            .get(url)
            .query(&[("user_id", format!("eq.{user_id}")), ("select", "*".into())])
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        let rows = self.check(response).await?.json::<Vec<ProfileRow>>().await?;
        Ok(rows.into_iter().next().map(ProfileRow::into_profile))
    }

    async fn fetch_permissions(&self, user_id: &str) -> AuthResult<Vec<String>> {
        let url = self.table("user_permissions")?;
        let response = self
            .http
            .get(url)
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("select", "permission".into()),
            ])
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        let rows = self
            .check(response)
            .await?
            .json::<Vec<PermissionRow>>()
            .await?;
        Ok(rows.into_iter().map(|r| r.permission).collect())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        changes: &ProfileChanges,
    ) -> AuthResult<Profile> {
        let url = self.table("user_profiles")?;
        let response = self
            .http
            .patch(url)
            .query(&[("user_id", format!("eq.{user_id}"))])
            .header("apikey", &self.config.api_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer()?)
            .json(changes)
            .send()
            .await?;

        let rows = self.check(response).await?.json::<Vec<ProfileRow>>().await?;
        rows.into_iter()
            .next()
            .map(ProfileRow::into_profile)
            .ok_or(AuthError::ProfileNotFound)
    }

    async fn record_login(&self, user_id: &str) -> AuthResult<()> {
        let url = self.table("user_profiles")?;
        let response = self
            .http
            .patch(url)
            .query(&[("user_id", format!("eq.{user_id}"))])
            .header("apikey", &self.config.api_key)
            .bearer_auth(self.bearer()?)
            .json(&serde_json::json!({ "last_login_at": Utc::now() }))
            .send()
            .await?;

        self.check(response).await?;
        Ok(())
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(default)]
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    company: Option<String>,
    job_title: Option<String>,
    department: Option<String>,
    phone: Option<String>,
    country: Option<String>,
    #[serde(default)]
    role: Option<String>,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl ProfileRow {
    fn into_profile(self) -> Profile {
        Profile {
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            company: self.company,
            job_title: self.job_title,
            department: self.department,
            phone: self.phone,
            country: self.country,
            role: self.role.as_deref().map(Role::from_code).unwrap_or_default(),
            created_at: self.created_at,
            last_login_at: self.last_login_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PermissionRow {
    permission: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_row_mapping() {
        let row: ProfileRow = serde_json::from_value(serde_json::json!({
            "username": "ada",
            "first_name": "Ada",
            "last_name": null,
            "company": null,
            "job_title": null,
            "department": null,
            "phone": null,
            "country": "UK",
            "role": "admin",
            "created_at": "2026-01-01T00:00:00Z",
            "last_login_at": null
        }))
        .unwrap();

        let profile = row.into_profile();
        assert_eq!(profile.username, "ada");
        assert_eq!(profile.role, Role::Admin);
        assert!(profile.last_login_at.is_none());
    }

    #[test]
    fn test_profile_row_missing_role_defaults() {
        let row: ProfileRow = serde_json::from_value(serde_json::json!({
            "username": "bob",
            "first_name": null,
            "last_name": null,
            "company": null,
            "job_title": null,
            "department": null,
            "phone": null,
            "country": null,
            "created_at": "2026-01-01T00:00:00Z",
            "last_login_at": null
        }))
        .unwrap();

        assert_eq!(row.into_profile().role, Role::User);
    }
}
