//! The APIv3 client: configuration wiring, the sign → send → verify
//! pipeline, and the process-wide shared instance.

use std::sync::{Arc, OnceLock};

use tracing::instrument;
use url::form_urlencoded;

use crate::{
    auth::{RequestSigner, ResponseVerifier},
    config::ApiConfig,
    credential::{MerchantCredential, PlatformCertificateStore},
    error::Result,
    resource::{Node, Resource},
    transport::{
        CompletedResponse, HttpTransport, PendingRequest, RequestBody, RequestOptions, Transport,
    },
};

/// Shared state behind a client handle: transport, interceptors, base URL.
pub(crate) struct ClientInner<T: Transport> {
    transport: T,
    signer: RequestSigner,
    verifier: ResponseVerifier,
    base_url: String,
}

impl<T: Transport> ClientInner<T> {
    /// Runs one request through the full pipeline: build, sign, send,
    /// verify.
    #[instrument(skip(self, body, options), fields(method, path = %path))]
    pub(crate) async fn execute(
        &self,
        method: &str,
        path: String,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<CompletedResponse> {
        let url = append_query(path, &options.params);
        let request = PendingRequest {
            method: method.to_owned(),
            url,
            base_url: self.base_url.clone(),
            headers: options.headers,
            body,
            response_type: options.response_type,
        };

        let request = self.signer.sign(request)?;
        let response = self.transport.execute(request).await?;
        self.verifier.verify(response)
    }
}

/// Appends query parameters to a path so they are covered by the request
/// signature.
fn append_query(path: String, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return path;
    }
    let query: String = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    format!("{path}?{query}")
}

/// The APIv3 client.
///
/// Construction validates the whole configuration once: merchant id,
/// certificate serial, private key and the platform certificate map. A
/// constructed client signs every outbound request and verifies every
/// inbound response; cloning is cheap and shares all state.
///
/// # Examples
///
/// ```no_run
/// use wechatpay_apiv3::{ApiConfig, RequestOptions, Wechatpay};
///
/// # async fn example(config: ApiConfig) -> wechatpay_apiv3::Result<()> {
/// let wxpay = Wechatpay::new(&config)?;
///
/// let response = wxpay
///     .access("V3")
///     .access("Pay")
///     .access("Transactions")
///     .access("Id")
///     .access("{transaction_id}")
///     .with_entities([("transaction_id", "1217752501201407033233368018")])
///     .get(RequestOptions::default())
///     .await?;
///
/// println!("{:?}", response.data);
/// # Ok(())
/// # }
/// ```
pub struct Wechatpay<T: Transport = HttpTransport> {
    inner: Arc<ClientInner<T>>,
    root: Arc<Node>,
}

impl Wechatpay<HttpTransport> {
    /// Builds an unshared client over the default pooled HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns a [`Configuration`](crate::WechatpayError::Configuration)
    /// error if any credential field is missing or unparseable.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Self::with_transport(config, HttpTransport::new()?)
    }

    /// Returns the process-wide shared client, building it on first call.
    ///
    /// Construction is idempotent: after the first successful call, later
    /// calls return a handle to the same transport and credential pair and
    /// ignore their `config` argument. If two threads race the first
    /// initialization, one constructed client wins; construction has no
    /// side effects, so the loser is simply dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`Configuration`](crate::WechatpayError::Configuration)
    /// error if the first initialization fails; a failed initialization is
    /// not cached.
    pub fn shared(config: &ApiConfig) -> Result<Self> {
        static SHARED: OnceLock<Wechatpay<HttpTransport>> = OnceLock::new();

        if let Some(client) = SHARED.get() {
            return Ok(client.clone());
        }
        let built = Self::new(config)?;
        Ok(SHARED.get_or_init(|| built).clone())
    }
}

impl<T: Transport> Wechatpay<T> {
    /// Builds a client over a custom transport.
    ///
    /// # Errors
    ///
    /// Returns a [`Configuration`](crate::WechatpayError::Configuration)
    /// error if any credential field is missing or unparseable.
    pub fn with_transport(config: &ApiConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let credential = Arc::new(MerchantCredential::new(
            &config.mchid,
            &config.serial,
            &config.private_key,
        )?);
        let certificates = Arc::new(PlatformCertificateStore::from_pem_map(&config.certs)?);

        Ok(Self::assemble(config.base_url.clone(), credential, certificates, transport))
    }

    pub(crate) fn assemble(
        base_url: String,
        credential: Arc<MerchantCredential>,
        certificates: Arc<PlatformCertificateStore>,
        transport: T,
    ) -> Self {
        let inner = Arc::new(ClientInner {
            transport,
            signer: RequestSigner::new(credential),
            verifier: ResponseVerifier::new(certificates),
            base_url,
        });
        Self { inner, root: Node::root() }
    }

    /// Steps into the resource tree at `name`.
    ///
    /// Chain further [`access`](Resource::access) calls and finish with a
    /// verb call; the chain `access("V3") → access("Pay") →
    /// access("Transactions") → access("Native")` requests
    /// `/v3/pay/transactions/native`.
    #[must_use]
    pub fn access(&self, name: &str) -> Resource<T> {
        Resource::new(Arc::clone(&self.inner), self.root.child(name))
    }

    /// The base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }
}

impl<T: Transport> Clone for Wechatpay<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), root: Arc::clone(&self.root) }
    }
}

impl<T: Transport> std::fmt::Debug for Wechatpay<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wechatpay").field("base_url", &self.inner.base_url).finish()
    }
}
