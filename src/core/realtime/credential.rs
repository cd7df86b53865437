//! Short-lived credential acquisition.
//!
//! The realtime service is never called with a long-lived key from this
//! process. A trusted backend mints an ephemeral token per session; the
//! controller asks for one with the persona and voice it is about to use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors returned by a credential provider.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The request could not be sent or the response not read
    #[error("Credential request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status
    #[error("Credential endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered without a usable token
    #[error("Credential response contained no token")]
    MissingToken,

    /// The response body was not the expected JSON
    #[error("Invalid credential response: {0}")]
    InvalidResponse(String),
}

/// An ephemeral session token. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EphemeralCredential {
    token: String,
    #[zeroize(skip)]
    expires_at: Option<u64>,
}

impl EphemeralCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: Option<u64>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Unix timestamp (seconds) after which the token is rejected, if known.
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }
}

impl std::fmt::Debug for EphemeralCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralCredential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of ephemeral credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Request a credential for a session with the given persona and voice.
    async fn fetch(
        &self,
        instructions: Option<&str>,
        voice: &str,
    ) -> Result<EphemeralCredential, CredentialError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<&'a str>,
    voice: &'a str,
}

#[derive(Deserialize)]
struct ClientSecret {
    value: Option<String>,
    expires_at: Option<u64>,
}

#[derive(Deserialize)]
struct CredentialResponse {
    value: Option<String>,
    client_secret: Option<ClientSecret>,
    token: Option<String>,
    expires_at: Option<u64>,
}

impl CredentialResponse {
    /// Token from `value`, `client_secret.value` or `token`, in that order.
    fn into_credential(self) -> Result<EphemeralCredential, CredentialError> {
        let (nested_token, nested_expiry) = match self.client_secret {
            Some(secret) => (secret.value, secret.expires_at),
            None => (None, None),
        };

        let token = [self.value, nested_token, self.token]
            .into_iter()
            .flatten()
            .find(|t| !t.trim().is_empty())
            .ok_or(CredentialError::MissingToken)?;

        Ok(EphemeralCredential::new(token).with_expiry(self.expires_at.or(nested_expiry)))
    }
}

/// Fetches credentials from an HTTP backend.
///
/// POSTs `{"systemPrompt": ..., "voice": ...}` as JSON, with an optional
/// bearer key for the backend itself.
pub struct HttpCredentialProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCredentialProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, api_key)
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn fetch(
        &self,
        instructions: Option<&str>,
        voice: &str,
    ) -> Result<EphemeralCredential, CredentialError> {
        debug!(endpoint = %self.endpoint, voice, "Requesting session credential");

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");

        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .json(&CredentialRequest {
                system_prompt: instructions,
                voice,
            })
            .send()
            .await
            .map_err(|e| CredentialError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::Request(e.to_string()))?;
        let parsed: CredentialResponse = serde_json::from_str(&body)
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;

        let credential = parsed.into_credential()?;
        info!(expires_at = ?credential.expires_at(), "Session credential issued");
        Ok(credential)
    }
}

impl Drop for HttpCredentialProvider {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.api_key {
            key.zeroize();
        }
    }
}
