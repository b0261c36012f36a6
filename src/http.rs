//! HTTP client for the validating locker proxy.
//!
//! The proxy exposes the key-value store as:
//!
//! ```text
//! GET  {api_url}/api/locker/{write|view}/{lockerId}  -> {"result": string | null}
//! POST {api_url}/api/locker/{write|view}/{lockerId}  <- {"data": string}
//!                                                    -> {"success": true}
//! ```
//!
//! Every transport error, timeout, non-2xx status, or unexpected body is
//! reported as [`LockerError::StorageUnavailable`].

use async_trait::async_trait;
use reqwest::Response;
use serde::{Deserialize, Serialize};

use crate::config::LockerConfig;
use crate::error::LockerError;
use crate::record::StoreKey;
use crate::store::KeyValueStore;

#[derive(Deserialize)]
struct GetResponse {
    result: Option<String>,
}

#[derive(Serialize)]
struct SetRequest<'a> {
    data: &'a str,
}

#[derive(Deserialize)]
struct SetResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// [`KeyValueStore`] backed by the locker proxy.
#[derive(Debug, Clone)]
pub struct HttpStore {
    http: reqwest::Client,
    api_url: String,
    max_value_len: usize,
}

impl HttpStore {
    /// Build a client from a validated configuration.
    pub fn new(config: &LockerConfig) -> Result<Self, LockerError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim().trim_end_matches('/').to_string(),
            max_value_len: config.max_value_len,
        })
    }

    /// Build a client from `SEEDLOCKER_*` environment variables.
    pub fn from_env() -> Result<Self, LockerError> {
        Self::new(&LockerConfig::from_env()?)
    }

    fn endpoint(&self, key: &StoreKey) -> String {
        format!("{}/api/locker/{}/{}", self.api_url, key.slot.prefix(), key.id)
    }

    /// Turn a non-2xx response into a storage error, keeping the proxy's
    /// message when it sent one.
    async fn check_status(response: Response) -> Result<Response, LockerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let reason = match response.json::<ErrorResponse>().await {
            Ok(body) => format!("{status}: {}", body.error),
            Err(_) => status.to_string(),
        };
        Err(LockerError::StorageUnavailable(reason))
    }
}

#[async_trait]
impl KeyValueStore for HttpStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<String>, LockerError> {
        tracing::debug!(slot = key.slot.prefix(), "fetching locker record");

        let response = self.http.get(self.endpoint(key)).send().await?;
        let body: GetResponse = Self::check_status(response).await?.json().await?;
        Ok(body.result)
    }

    async fn set(&self, key: &StoreKey, value: String) -> Result<(), LockerError> {
        if value.len() > self.max_value_len {
            return Err(LockerError::StorageUnavailable("data too large".into()));
        }
        tracing::debug!(slot = key.slot.prefix(), len = value.len(), "storing locker record");

        let response = self
            .http
            .post(self.endpoint(key))
            .json(&SetRequest { data: &value })
            .send()
            .await?;
        let body: SetResponse = Self::check_status(response).await?.json().await?;
        if !body.success {
            return Err(LockerError::StorageUnavailable(
                "store did not acknowledge write".into(),
            ));
        }
        Ok(())
    }
}
