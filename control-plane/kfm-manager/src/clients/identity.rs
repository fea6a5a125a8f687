use crate::config::KeycloakConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Identity provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Client {0} was not found after creation")]
    ClientMissing(String),

    #[error("Client {0} has no secret")]
    SecretMissing(String),
}

/// Realm parameters the brokers need to validate tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    pub auth_enabled: bool,
    pub token_endpoint_uri: String,
    pub jwks_endpoint_uri: String,
    pub valid_issuer_uri: String,
    pub user_name_claim: String,
    pub tls_trusted_certificate: Option<String>,
}

impl From<&KeycloakConfig> for IdentityConfig {
    fn from(c: &KeycloakConfig) -> Self {
        Self {
            auth_enabled: c.enable_auth_on_kafka,
            token_endpoint_uri: c.token_endpoint_uri(),
            jwks_endpoint_uri: c.jwks_endpoint_uri(),
            valid_issuer_uri: c.valid_issuer_uri(),
            user_name_claim: c.user_name_claim.clone(),
            tls_trusted_certificate: c.tls_trusted_certificate.clone(),
        }
    }
}

/// Registry of per-instance OAuth clients in the identity provider.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    fn config(&self) -> &IdentityConfig;

    /// Create (or find) a confidential client and return its secret.
    async fn create_client(
        &self,
        client_id: &str,
        organisation_id: &str,
    ) -> Result<String, IdentityError>;

    /// Remove the client. Deleting an absent client succeeds.
    async fn delete_client(&self, client_id: &str) -> Result<(), IdentityError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientRepresentation {
    id: String,
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewClient<'a> {
    client_id: &'a str,
    name: &'a str,
    enabled: bool,
    public_client: bool,
    service_accounts_enabled: bool,
    standard_flow_enabled: bool,
    attributes: NewClientAttributes<'a>,
}

#[derive(Debug, Serialize)]
struct NewClientAttributes<'a> {
    #[serde(rename = "rh-org-id")]
    org_id: &'a str,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Identity registry backed by the Keycloak admin REST API, authenticated
/// with the client-credentials grant.
pub struct KeycloakIdentityRegistry {
    http: reqwest::Client,
    keycloak: KeycloakConfig,
    config: IdentityConfig,
    token: Mutex<Option<CachedToken>>,
}

impl KeycloakIdentityRegistry {
    pub fn new(keycloak: KeycloakConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            config: IdentityConfig::from(&keycloak),
            keycloak,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, IdentityError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let resp = self
            .http
            .post(self.keycloak.token_endpoint_uri())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.keycloak.client_id.as_str()),
                ("client_secret", self.keycloak.client_secret.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = check(resp).await?.json().await?;

        // refresh slightly ahead of expiry
        let ttl = Duration::from_secs(token.expires_in.saturating_sub(30));
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(token.access_token)
    }

    fn clients_url(&self) -> String {
        format!("{}/clients", self.keycloak.admin_url())
    }

    async fn find_client(
        &self,
        token: &str,
        client_id: &str,
    ) -> Result<Option<ClientRepresentation>, IdentityError> {
        let resp = self
            .http
            .get(self.clients_url())
            .bearer_auth(token)
            .query(&[("clientId", client_id)])
            .send()
            .await?;
        let clients: Vec<ClientRepresentation> = check(resp).await?.json().await?;
        Ok(clients.into_iter().find(|c| c.client_id == client_id))
    }

    async fn client_secret(
        &self,
        token: &str,
        client: &ClientRepresentation,
    ) -> Result<String, IdentityError> {
        let resp = self
            .http
            .get(format!("{}/{}/client-secret", self.clients_url(), client.id))
            .bearer_auth(token)
            .send()
            .await?;
        let secret: ClientSecret = check(resp).await?.json().await?;
        secret
            .value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| IdentityError::SecretMissing(client.client_id.clone()))
    }
}

#[async_trait]
impl IdentityRegistry for KeycloakIdentityRegistry {
    fn config(&self) -> &IdentityConfig {
        &self.config
    }

    async fn create_client(
        &self,
        client_id: &str,
        organisation_id: &str,
    ) -> Result<String, IdentityError> {
        let token = self.access_token().await?;

        if let Some(existing) = self.find_client(&token, client_id).await? {
            debug!(client_id = %client_id, "sso client already exists");
            return self.client_secret(&token, &existing).await;
        }

        let body = NewClient {
            client_id,
            name: client_id,
            enabled: true,
            public_client: false,
            service_accounts_enabled: false,
            standard_flow_enabled: false,
            attributes: NewClientAttributes {
                org_id: organisation_id,
            },
        };
        let resp = self
            .http
            .post(self.clients_url())
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        // a concurrent creator winning the race is fine
        if resp.status() != StatusCode::CONFLICT {
            check(resp).await?;
        }

        let created = self
            .find_client(&token, client_id)
            .await?
            .ok_or_else(|| IdentityError::ClientMissing(client_id.to_string()))?;
        info!(client_id = %client_id, "created sso client");
        self.client_secret(&token, &created).await
    }

    async fn delete_client(&self, client_id: &str) -> Result<(), IdentityError> {
        let token = self.access_token().await?;
        let Some(client) = self.find_client(&token, client_id).await? else {
            debug!(client_id = %client_id, "sso client already absent");
            return Ok(());
        };
        let resp = self
            .http
            .delete(format!("{}/{}", self.clients_url(), client.id))
            .bearer_auth(&token)
            .send()
            .await?;
        if resp.status() != StatusCode::NOT_FOUND {
            check(resp).await?;
        }
        info!(client_id = %client_id, "deleted sso client");
        Ok(())
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(IdentityError::Status {
        status: status.as_u16(),
        body,
    })
}
