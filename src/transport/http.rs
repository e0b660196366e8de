//! HTTP transport implementation over reqwest.

use std::{sync::LazyLock, time::Duration};

use reqwest::{
    Client, Method,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    error::{Result, WechatpayError},
    transport::{CompletedResponse, PendingRequest, RequestBody, ResponseType, Transport, sealed},
};

/// Default HTTP client with connection pooling enabled.
///
/// Using a singleton avoids recreating the client per transport instance,
/// preserving connection pooling across all default transports.
static DEFAULT_HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .pool_max_idle_per_host(100)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("failed to create default HTTP client")
});

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Maximum idle connections per host.
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,
    /// Total request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_pool_max_idle() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: default_pool_max_idle(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// HTTP/1.1 and HTTP/2 transport using reqwest.
///
/// Carries already-signed requests; it never inspects or alters the
/// `Authorization` header.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl sealed::private::Sealed for HttpTransport {}

impl HttpTransport {
    /// Creates an HTTP transport backed by the shared pooled client.
    ///
    /// # Errors
    ///
    /// Infallible today; returns `Result` for parity with
    /// [`with_config`](Self::with_config).
    pub fn new() -> Result<Self> {
        Ok(Self { client: DEFAULT_HTTP_CLIENT.clone() })
    }

    /// Creates an HTTP transport with custom pooling and timeouts.
    ///
    /// # Errors
    ///
    /// Returns a [`Transport`](WechatpayError::Transport) error if client
    /// construction fails.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(WechatpayError::Transport)?;
        Ok(Self { client })
    }

    /// Wraps an externally configured reqwest client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn resolve_url(request: &PendingRequest) -> Result<Url> {
        Url::parse(&request.base_url)
            .map_err(|e| {
                WechatpayError::Configuration(format!(
                    "invalid base_url {:?}: {e}",
                    request.base_url
                ))
            })?
            .join(&request.url)
            .map_err(|e| {
                WechatpayError::Configuration(format!("invalid request url {:?}: {e}", request.url))
            })
    }

    fn build_headers(request: &PendingRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                WechatpayError::Configuration(format!("invalid header name {name:?}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                WechatpayError::Configuration(format!("invalid value for header {name}: {e}"))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: PendingRequest) -> Result<CompletedResponse> {
        let url = Self::resolve_url(&request)?;
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            WechatpayError::Configuration(format!("unsupported HTTP method: {}", request.method))
        })?;

        let mut headers = Self::build_headers(&request)?;
        let body = match &request.body {
            RequestBody::None => Vec::new(),
            RequestBody::Json(value) => serde_json::to_vec(value)?,
            RequestBody::Form { payload, content_type, .. } => {
                // The wire encoding wins over the signed-content headers.
                let value = HeaderValue::from_str(content_type).map_err(|e| {
                    WechatpayError::Configuration(format!("invalid multipart content type: {e}"))
                })?;
                headers.insert(reqwest::header::CONTENT_TYPE, value);
                payload.clone()
            }
        };

        let mut builder = self.client.request(method, url).headers(headers);
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_owned()))
            .collect();
        let body = response.bytes().await?.to_vec();

        let data = match request.response_type {
            ResponseType::Binary => None,
            ResponseType::Json if body.is_empty() => None,
            ResponseType::Json => serde_json::from_slice(&body).ok(),
        };

        debug!(status, body_len = body.len(), "request completed");

        Ok(CompletedResponse { status, headers, body, data, response_type: request.response_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(base_url: &str, url: &str) -> PendingRequest {
        PendingRequest {
            method: "GET".to_owned(),
            url: url.to_owned(),
            base_url: base_url.to_owned(),
            headers: Vec::new(),
            body: RequestBody::None,
            response_type: ResponseType::Json,
        }
    }

    #[test]
    fn transport_new_uses_shared_client() {
        let transport = HttpTransport::new();
        assert!(transport.is_ok());
    }

    #[test]
    fn transport_with_config() {
        let config =
            HttpConfig { pool_max_idle_per_host: 5, timeout_secs: 60, connect_timeout_secs: 5 };
        assert!(HttpTransport::with_config(&config).is_ok());
    }

    #[test]
    fn http_config_deserializes_with_defaults() {
        let config: HttpConfig = toml::from_str("").unwrap();
        assert_eq!(config.pool_max_idle_per_host, 100);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn resolve_url_joins_path_against_base() {
        let request = pending("https://api.mch.weixin.qq.com", "/v3/pay/transactions/native?x=1");
        let url = HttpTransport::resolve_url(&request).unwrap();
        assert_eq!(url.as_str(), "https://api.mch.weixin.qq.com/v3/pay/transactions/native?x=1");
    }

    #[test]
    fn resolve_url_rejects_garbage_base() {
        let request = pending("not a url", "/v3/certificates");
        let result = HttpTransport::resolve_url(&request);
        assert!(matches!(result, Err(WechatpayError::Configuration(_))));
    }

    #[test]
    fn build_headers_rejects_control_characters() {
        let mut request = pending("https://api.mch.weixin.qq.com", "/v3/certificates");
        request.headers.push(("X-Evil".to_owned(), "a\r\nb".to_owned()));
        let result = HttpTransport::build_headers(&request);
        assert!(matches!(result, Err(WechatpayError::Configuration(_))));
    }

    #[tokio::test]
    async fn execute_surfaces_invalid_base_url() {
        let transport = HttpTransport::new().unwrap();
        let request = pending("::not-a-url::", "/v3/certificates");
        let result = transport.execute(request).await;
        assert!(matches!(result, Err(WechatpayError::Configuration(_))));
    }
}
