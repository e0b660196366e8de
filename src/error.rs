//! Error types for the WeChat Pay APIv3 client.
//!
//! All errors implement the standard [`std::error::Error`] trait via
//! [`thiserror::Error`]. The taxonomy separates configuration mistakes
//! (fatal, surfaced at construction) from the verification failures a
//! response can produce at runtime. None of these are retried inside the
//! crate; every unresolved verification step fails closed.

use thiserror::Error;

/// Result type alias for client operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, WechatpayError>;

/// Errors that can occur while signing requests or verifying responses.
///
/// # Error Recovery
///
/// - [`Configuration`](Self::Configuration): fix the credential input and
///   rebuild the client; never retried.
/// - [`Freshness`](Self::Freshness): confirm local clock synchronization
///   before retrying; do not retry automatically.
/// - [`UnknownCertificate`](Self::UnknownCertificate): download the current
///   platform certificates out of band, then rebuild the store.
/// - [`Verification`](Self::Verification) / [`Crypto`](Self::Crypto): an
///   authentication failure on the response; treat the payload as
///   untrusted.
/// - [`Transport`](Self::Transport): propagated unchanged from reqwest;
///   HTTP status codes are never reinterpreted here.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum WechatpayError {
    /// Missing or malformed credential fields at construction.
    ///
    /// Raised once, when the client (or a signer/verifier) is built from
    /// incomplete input: empty merchant id or serial, an unparseable
    /// private key PEM, or an empty certificate map.
    #[error("invalid API configuration: {0}")]
    Configuration(String),

    /// Response timestamp outside the allowed clock-skew window.
    ///
    /// The verifier accepts responses whose `Wechatpay-Timestamp` lies
    /// strictly within five minutes of the local clock, in either
    /// direction. Anything on or past the boundary is rejected before the
    /// signature is even checked.
    #[error(
        "response timestamp {response_timestamp} is outside the allowed window around local \
         timestamp {local_timestamp}; only ±300 seconds of skew are accepted"
    )]
    Freshness {
        /// Timestamp carried in the `Wechatpay-Timestamp` header.
        response_timestamp: i64,
        /// Local Unix timestamp at verification time.
        local_timestamp: i64,
    },

    /// The response references a certificate serial not present in the
    /// platform certificate store.
    ///
    /// Independent of whether the signature itself would have verified.
    /// Requires fetching updated platform certificates out of band.
    #[error("no platform certificate found for serial {0}")]
    UnknownCertificate(String),

    /// Cryptographic mismatch between the response signature and the
    /// canonical message, or a signature header missing entirely.
    ///
    /// The response must not be treated as authentic.
    #[error("response verification failed: {0}")]
    Verification(String),

    /// Structurally invalid cryptographic input.
    ///
    /// Distinct from a clean mismatch: the key, certificate, or signature
    /// material could not even be used (bad base64, wrong key type, PEM
    /// damage, system-time failure).
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    /// HTTP request failed.
    ///
    /// Wraps [`reqwest::Error`] unchanged. Connection, DNS, TLS and
    /// timeout failures all land here.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
