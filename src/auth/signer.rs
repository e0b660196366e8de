//! APIv3 request signing.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use tracing::{debug, instrument};
use url::Url;

use crate::{
    auth::{formatter, rsa},
    credential::MerchantCredential,
    error::{Result, WechatpayError},
    transport::{PendingRequest, set_header},
};

/// Signs outbound requests with the merchant private key.
///
/// A pure transform: it performs no network I/O and touches nothing but
/// the clock and the nonce source. Credentials are validated when the
/// [`MerchantCredential`] is built, never per request, so a constructed
/// signer can always sign.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credential: Arc<MerchantCredential>,
}

impl RequestSigner {
    /// Creates a signer over a validated merchant credential.
    #[must_use]
    pub fn new(credential: Arc<MerchantCredential>) -> Self {
        Self { credential }
    }

    /// Produces a signed copy of an outbound request description.
    ///
    /// Uppercases the method, resolves the effective `path[?query]`
    /// against the base URL, signs the canonical request message, and
    /// merges `User-Agent`, `Content-Type`, `Accept` and `Authorization`
    /// on top of the existing headers. Everything else is returned
    /// unchanged. The result carries exactly one `Authorization` header.
    ///
    /// For a [`Form`](crate::transport::RequestBody::Form) body the signed
    /// content is the out-of-band `meta` description, not the multipart
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`WechatpayError::Configuration`] if the request URL cannot
    /// be resolved against the base URL, and [`WechatpayError::Crypto`] if
    /// signing itself fails.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub fn sign(&self, mut request: PendingRequest) -> Result<PendingRequest> {
        let method = request.method.to_ascii_uppercase();
        let payload = request.body.signed_payload()?;
        let nonce = formatter::nonce();
        let timestamp = formatter::timestamp()?;

        // `path?query` only: scheme, host and base-URL prefix never enter
        // the signed material.
        let resolved = Url::parse(&request.base_url)
            .map_err(|e| {
                WechatpayError::Configuration(format!(
                    "invalid base_url {:?}: {e}",
                    request.base_url
                ))
            })?
            .join(&request.url)
            .map_err(|e| {
                WechatpayError::Configuration(format!("invalid request url {:?}: {e}", request.url))
            })?;
        let mut path_and_query = resolved.path().to_owned();
        if let Some(query) = resolved.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        let message =
            formatter::request_message(&method, &path_and_query, timestamp, &nonce, &payload);
        let signature = rsa::sign(message.as_bytes(), self.credential.private_key())?;
        let signature = BASE64.encode(signature);

        debug!(%path_and_query, timestamp, "request signed");

        request.method = method;
        set_header(&mut request.headers, "User-Agent", formatter::USER_AGENT);
        set_header(&mut request.headers, "Content-Type", "application/json");
        set_header(&mut request.headers, "Accept", "application/json");
        set_header(
            &mut request.headers,
            "Authorization",
            formatter::authorization(
                self.credential.mchid(),
                &nonce,
                &signature,
                timestamp,
                self.credential.serial(),
            ),
        );

        Ok(request)
    }
}
