//! REST client
//!
//! The underlying HTTP client is built on first use and reused afterwards.
//! Requests send `Accept: application/json`, `Version: 4` and, when
//! configured, basic auth.

use crate::error::InventoryError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Certificate, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// PEM CA bundle; system roots when absent
    pub cacert: Option<Vec<u8>>,
    /// Connect, keep-alive and idle timeout
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create configuration for a base URL
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            password: None,
            cacert: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// With basic auth credentials
    #[inline]
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// With CA bundle
    #[inline]
    #[must_use]
    pub fn with_cacert(mut self, pem: Vec<u8>) -> Self {
        self.cacert = Some(pem);
        self
    }

    /// With timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// JSON REST client
#[derive(Debug)]
pub struct RestClient {
    config: ClientConfig,
    client: OnceCell<reqwest::Client>,
}

impl RestClient {
    /// Create new client; no connection is made until first use
    #[inline]
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Base URL without trailing slash
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Build the HTTP client if not built yet
    ///
    /// # Errors
    /// - `InventoryError::Certificate` if the CA bundle does not parse
    /// - `InventoryError::Transport` if the client cannot be built
    pub async fn connect(&self) -> Result<&reqwest::Client, InventoryError> {
        self.client.get_or_try_init(|| async { self.build() }).await
    }

    fn build(&self) -> Result<reqwest::Client, InventoryError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(HeaderName::from_static("version"), HeaderValue::from_static("4"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(self.config.timeout)
            .tcp_keepalive(self.config.timeout)
            .pool_idle_timeout(self.config.timeout)
            .pool_max_idle_per_host(10);

        if let Some(pem) = &self.config.cacert {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| InventoryError::Certificate(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(builder.build()?)
    }

    /// List a collection
    ///
    /// # Errors
    /// Any status other than 200 is an error; see [`InventoryError`].
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, InventoryError> {
        let response = self.send(path, params).await?;
        match response.status() {
            StatusCode::OK => decode(path, response).await,
            status => Err(InventoryError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// Get a single resource
    ///
    /// # Errors
    /// - `InventoryError::NotFound` on 404
    /// - `InventoryError::NotReady` on 206
    /// - `InventoryError::Status` on any other non-200 status
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, InventoryError> {
        let response = self.send(path, params).await?;
        match response.status() {
            StatusCode::OK => decode(path, response).await,
            StatusCode::NOT_FOUND => Err(InventoryError::NotFound {
                path: path.to_string(),
            }),
            StatusCode::PARTIAL_CONTENT => Err(InventoryError::NotReady {
                path: path.to_string(),
            }),
            status => Err(InventoryError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn send(&self, path: &str, params: &[(&str, &str)]) -> Result<Response, InventoryError> {
        let client = self.connect().await?;
        let url = self.url(path)?;
        tracing::trace!(%url, "inventory request");

        let mut request = client.get(url).query(params);
        if let Some(user) = &self.config.user {
            request = request.basic_auth(user, self.config.password.as_ref());
        }
        Ok(request.send().await?)
    }

    fn url(&self, path: &str) -> Result<Url, InventoryError> {
        let raw = format!("{}/{}", self.base_url(), path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| InventoryError::InvalidUrl(format!("{raw}: {e}")))
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, InventoryError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|source| InventoryError::Decode {
        path: path.to_string(),
        source,
    })
}
