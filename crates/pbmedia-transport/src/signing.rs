//! Upload authorization (signing) client.
//!
//! Before any bytes move, the pipeline asks the signing service for a signed
//! destination. Authorization failures are terminal for the item; they are
//! never retried automatically.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use pbmedia_core::{UploadAuthorization, UploadFileMeta};

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Upload authorization denied: {0}")]
    Denied(String),

    #[error("Signing service unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed signing response: {0}")]
    Malformed(String),
}

/// Issues upload authorizations for validated files.
#[async_trait]
pub trait SigningClient: Send + Sync {
    async fn authorize_upload(
        &self,
        meta: &UploadFileMeta,
    ) -> Result<UploadAuthorization, AuthorizationError>;
}

/// HTTP signing client: POSTs file metadata, receives a signed destination.
pub struct HttpSigningClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSigningClient {
    pub fn new(endpoint: String, api_key: Option<String>) -> Result<Self, AuthorizationError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AuthorizationError::Unavailable(format!("HTTP client init: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl SigningClient for HttpSigningClient {
    async fn authorize_upload(
        &self,
        meta: &UploadFileMeta,
    ) -> Result<UploadAuthorization, AuthorizationError> {
        let mut request = self.client.post(&self.endpoint).json(meta);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthorizationError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthorizationError::Denied(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(AuthorizationError::Unavailable(format!(
                "signing service returned {}",
                status
            )));
        }

        let authorization = response
            .json::<UploadAuthorization>()
            .await
            .map_err(|e| AuthorizationError::Malformed(e.to_string()))?;

        tracing::debug!(
            upload_id = %authorization.upload_id,
            file_name = %meta.file_name,
            expires_at = %authorization.expires_at,
            "Obtained upload authorization"
        );

        Ok(authorization)
    }
}

/// Signer that mints authorizations locally. Pairs with
/// [`LocalBackend`](crate::LocalBackend) for development and tests.
pub struct StaticSigner {
    destination_base: String,
    ttl: Duration,
}

impl StaticSigner {
    pub fn new(destination_base: String) -> Self {
        Self {
            destination_base,
            ttl: Duration::minutes(15),
        }
    }

    pub fn with_ttl(destination_base: String, ttl: Duration) -> Self {
        Self {
            destination_base,
            ttl,
        }
    }
}

#[async_trait]
impl SigningClient for StaticSigner {
    async fn authorize_upload(
        &self,
        meta: &UploadFileMeta,
    ) -> Result<UploadAuthorization, AuthorizationError> {
        let upload_id = Uuid::new_v4();
        Ok(UploadAuthorization {
            upload_id,
            destination_url: format!(
                "{}/{}-{}",
                self.destination_base.trim_end_matches('/'),
                upload_id,
                meta.file_name
            ),
            headers: vec![],
            expires_at: Utc::now() + self.ttl,
        })
    }
}
