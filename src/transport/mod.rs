//! Transport boundary: request/response descriptions and the HTTP
//! transport abstraction.
//!
//! The core never performs network I/O itself. It hands a fully signed
//! [`PendingRequest`] to a [`Transport`] implementation and receives a
//! [`CompletedResponse`] back for verification. Connection pooling,
//! redirects and TLS all belong to the transport; canonicalization and
//! signatures belong to [`crate::auth`].

use serde_json::Value;

use crate::error::Result;

pub mod http;
pub(crate) mod sealed;

pub use http::{HttpConfig, HttpTransport};

/// An outbound request description, before or after signing.
///
/// Produced by the resource-path builder, augmented by the request signer,
/// and consumed by the transport.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// HTTP method. Uppercased by the signer.
    pub method: String,
    /// Path plus optional query string (e.g. `/v3/pay/transactions/native`).
    pub url: String,
    /// Base URL the path is resolved against.
    pub base_url: String,
    /// Request headers. Names are matched case-insensitively; each name
    /// occurs at most once.
    pub headers: Vec<(String, String)>,
    /// Request body variant.
    pub body: RequestBody,
    /// How the response payload should be treated.
    pub response_type: ResponseType,
}

/// Discriminated request-body variant.
///
/// Replaces runtime form-data probing with an explicit choice made by the
/// caller: a JSON body is signed as its serialization, while a multipart
/// body is signed through its out-of-band `meta` description only.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body. Contributes an empty string to the canonical message.
    #[default]
    None,
    /// JSON body, serialized once for both signing and the wire.
    Json(Value),
    /// Pre-encoded `multipart/form-data` body.
    ///
    /// The multipart encoding itself is the caller's concern; the core
    /// signs `meta` and ships `payload` unchanged with the given content
    /// type.
    Form {
        /// Out-of-band description of the uploaded media; this is the
        /// signed content.
        meta: Value,
        /// The already-encoded multipart payload.
        payload: Vec<u8>,
        /// Content type of the encoded payload, including the boundary.
        content_type: String,
    },
}

impl RequestBody {
    /// Serializes the body to the form covered by the request signature.
    ///
    /// # Errors
    ///
    /// Returns a [`Serialization`](crate::WechatpayError::Serialization)
    /// error if JSON encoding fails.
    pub(crate) fn signed_payload(&self) -> Result<String> {
        match self {
            Self::None => Ok(String::new()),
            Self::Json(value) => Ok(serde_json::to_string(value)?),
            Self::Form { meta, .. } => Ok(serde_json::to_string(meta)?),
        }
    }
}

/// Caller-supplied options for a terminal verb call.
///
/// Everything here is optional; `RequestOptions::default()` issues a plain
/// JSON request with no query string and no extra headers.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters appended to the path before signing, so the query
    /// string is covered by the signature.
    pub params: Vec<(String, String)>,
    /// Extra request headers. Preserved by the signer, except where the
    /// signed headers replace a same-name entry.
    pub headers: Vec<(String, String)>,
    /// How the response payload should be treated.
    pub response_type: ResponseType,
}

/// How a response payload is requested and treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// JSON payload; decoded and signature-verified.
    #[default]
    Json,
    /// Raw binary payload (e.g. bill downloads). Carries no signature
    /// headers by provider convention, so verification is bypassed.
    Binary,
}

/// A completed response description.
#[derive(Debug, Clone)]
pub struct CompletedResponse {
    /// HTTP status code. Never reinterpreted by the core.
    pub status: u16,
    /// Response headers as received.
    pub headers: Vec<(String, String)>,
    /// Raw payload bytes as received.
    pub body: Vec<u8>,
    /// Decoded JSON payload, when the response was requested as JSON and
    /// the payload parsed.
    pub data: Option<Value>,
    /// Response type the request was issued with.
    pub response_type: ResponseType,
}

/// Finds a header value by case-insensitive name.
#[must_use]
pub fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
}

/// Sets a header, replacing any existing value under the same
/// case-insensitive name.
///
/// This is what guarantees a signed request carries exactly one
/// `Authorization` header.
pub fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: impl Into<String>) {
    match headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value.into(),
        None => headers.push((name.to_owned(), value.into())),
    }
}

/// Transport protocol abstraction.
///
/// This trait is sealed: implementations live in this crate so every
/// transport correctly carries signed requests end to end. The reqwest
/// implementation is [`HttpTransport`].
pub trait Transport: sealed::private::Sealed + Send + Sync {
    /// Executes a signed request and returns the raw response description.
    ///
    /// # Errors
    ///
    /// Returns a [`Transport`](crate::WechatpayError::Transport) error if
    /// the HTTP exchange itself fails. HTTP error statuses are not
    /// errors at this layer.
    fn execute<'a>(
        &'a self,
        request: PendingRequest,
    ) -> impl Future<Output = Result<CompletedResponse>> + Send + 'a;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let headers = vec![("Wechatpay-Nonce".to_owned(), "abc".to_owned())];
        assert_eq!(header(&headers, "wechatpay-nonce"), Some("abc"));
        assert_eq!(header(&headers, "WECHATPAY-NONCE"), Some("abc"));
        assert_eq!(header(&headers, "Wechatpay-Serial"), None);
    }

    #[test]
    fn set_header_replaces_existing_value() {
        let mut headers = vec![("authorization".to_owned(), "stale".to_owned())];
        set_header(&mut headers, "Authorization", "fresh");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].1, "fresh");
    }

    #[test]
    fn set_header_appends_when_absent() {
        let mut headers = Vec::new();
        set_header(&mut headers, "Accept", "application/json");
        assert_eq!(headers, vec![("Accept".to_owned(), "application/json".to_owned())]);
    }

    #[test]
    fn signed_payload_none_is_empty() {
        assert_eq!(RequestBody::None.signed_payload().unwrap(), "");
    }

    #[test]
    fn signed_payload_json_is_serialization() {
        let body = RequestBody::Json(serde_json::json!({"amount": {"total": 1}}));
        assert_eq!(body.signed_payload().unwrap(), "{\"amount\":{\"total\":1}}");
    }

    #[test]
    fn signed_payload_form_covers_meta_not_payload() {
        let body = RequestBody::Form {
            meta: serde_json::json!({"filename": "logo.png", "sha256": "abc"}),
            payload: b"--boundary\r\nbinary-bytes\r\n--boundary--".to_vec(),
            content_type: "multipart/form-data; boundary=boundary".to_owned(),
        };
        let signed = body.signed_payload().unwrap();
        assert_eq!(signed, "{\"filename\":\"logo.png\",\"sha256\":\"abc\"}");
        assert!(!signed.contains("binary-bytes"));
    }

    #[test]
    fn response_type_defaults_to_json() {
        assert_eq!(ResponseType::default(), ResponseType::Json);
    }
}
