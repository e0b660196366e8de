//! APIv3 authentication: canonical formatting, RSA signing, and the
//! request-signer / response-verifier interceptor pair.
//!
//! The wire contract is fixed by the provider:
//!
//! - Outbound requests carry an `Authorization` header under the
//!   [`AUTH_SCHEME`] scheme with `mchid`, `nonce_str`, `signature`,
//!   `timestamp` and `serial_no` fields.
//! - Inbound responses carry their verification material in the four
//!   `Wechatpay-*` headers.
//! - Signatures are SHA-256 + RSASSA-PKCS1-v1_5 over newline-joined
//!   canonical messages (see [`formatter`]).

pub mod formatter;
pub mod rsa;

mod signer;
mod verifier;

pub use signer::RequestSigner;
pub use verifier::ResponseVerifier;

/// `Authorization` scheme token, reproduced exactly for interoperability.
pub const AUTH_SCHEME: &str = "WECHATPAY2-SHA256-RSA2048";

/// Response header carrying the signing timestamp.
pub const HEADER_TIMESTAMP: &str = "Wechatpay-Timestamp";

/// Response header carrying the signing nonce.
pub const HEADER_NONCE: &str = "Wechatpay-Nonce";

/// Response header naming the platform certificate serial.
pub const HEADER_SERIAL: &str = "Wechatpay-Serial";

/// Response header carrying the base64-encoded signature.
pub const HEADER_SIGNATURE: &str = "Wechatpay-Signature";

/// Maximum accepted clock skew between signer and verifier, in seconds.
///
/// Responses at or beyond this distance from the local clock are rejected
/// before any cryptographic work happens.
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;
