//! Canonical message construction for APIv3 signing and verification.
//!
//! Both signing and verification operate on newline-joined strings with a
//! trailing newline; the exact layouts are fixed by the provider wire
//! format and reproduced here verbatim:
//!
//! ```text
//! request:   METHOD \n path[?query] \n timestamp \n nonce \n body \n
//! response:  timestamp \n nonce \n body \n
//! ```
//!
//! Beyond the layouts this module is the single source of nonce and
//! timestamp values, so the signed material and the local comparison always
//! agree.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};

use crate::{
    auth::AUTH_SCHEME,
    error::{Result, WechatpayError},
};

/// Length of the alphanumeric nonce included in every signed message.
pub const NONCE_LENGTH: usize = 32;

/// Product token sent as the `User-Agent` of every signed request.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Generates a fresh 32-character alphanumeric nonce.
///
/// Drawn from the operating system's secure random source; safe to call
/// concurrently. Each request gets its own nonce as a replay-resistance
/// input to both formatting and signature computation.
#[must_use]
pub fn nonce() -> String {
    OsRng.sample_iter(&Alphanumeric).take(NONCE_LENGTH).map(char::from).collect()
}

/// Returns the current Unix time in seconds.
///
/// # Errors
///
/// Returns [`WechatpayError::Crypto`] if the system clock reads before the
/// Unix epoch.
pub fn timestamp() -> Result<i64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| WechatpayError::Crypto(format!("system time error: {e}")))?;
    i64::try_from(elapsed.as_secs())
        .map_err(|e| WechatpayError::Crypto(format!("system time out of range: {e}")))
}

/// Builds the canonical string signed for an outbound request.
///
/// `path_and_query` is the URL path plus query string, explicitly excluding
/// scheme, host and any base-URL prefix. `body` is the serialized wire
/// payload, or the empty string when there is none.
#[must_use]
pub fn request_message(
    method: &str,
    path_and_query: &str,
    timestamp: i64,
    nonce: &str,
    body: &str,
) -> String {
    format!("{method}\n{path_and_query}\n{timestamp}\n{nonce}\n{body}\n")
}

/// Builds the canonical bytes verified for an inbound response.
///
/// `body` is raw bytes rather than text: a no-content response contributes
/// its payload unmodified, without any re-serialization.
#[must_use]
pub fn response_message(timestamp: i64, nonce: &str, body: &[u8]) -> Vec<u8> {
    let mut message = format!("{timestamp}\n{nonce}\n").into_bytes();
    message.extend_from_slice(body);
    message.push(b'\n');
    message
}

/// Renders the `Authorization` header value for a signed request.
///
/// The scheme token and field names are fixed by the provider and must be
/// reproduced exactly for interoperability.
#[must_use]
pub fn authorization(
    mchid: &str,
    nonce: &str,
    signature: &str,
    timestamp: i64,
    serial: &str,
) -> String {
    format!(
        "{AUTH_SCHEME} mchid=\"{mchid}\",nonce_str=\"{nonce}\",signature=\"{signature}\",\
         timestamp=\"{timestamp}\",serial_no=\"{serial}\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_is_alphanumeric_and_fixed_length() {
        let value = nonce();
        assert_eq!(value.len(), NONCE_LENGTH);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn nonce_is_not_repeated() {
        assert_ne!(nonce(), nonce());
    }

    #[test]
    fn timestamp_is_positive() {
        let now = timestamp().unwrap();
        assert!(now > 1_500_000_000);
    }

    #[test]
    fn request_message_layout() {
        let message = request_message(
            "GET",
            "/v3/pay/transactions/native?mchid=1230000109",
            1_554_208_460,
            "593BEC0C930BF1AFEB40B4A08C8FB242",
            "",
        );
        assert_eq!(
            message,
            "GET\n/v3/pay/transactions/native?mchid=1230000109\n1554208460\n\
             593BEC0C930BF1AFEB40B4A08C8FB242\n\n"
        );
    }

    #[test]
    fn request_message_with_body() {
        let message =
            request_message("POST", "/v3/pay/transactions/native", 1, "n", "{\"amount\":1}");
        assert_eq!(message, "POST\n/v3/pay/transactions/native\n1\nn\n{\"amount\":1}\n");
    }

    #[test]
    fn response_message_layout() {
        let message = response_message(1_554_208_460, "nonce", b"{\"code\":\"OK\"}");
        assert_eq!(message, b"1554208460\nnonce\n{\"code\":\"OK\"}\n");
    }

    #[test]
    fn response_message_empty_body_keeps_trailing_newline() {
        let message = response_message(10, "n", b"");
        assert_eq!(message, b"10\nn\n\n");
    }

    #[test]
    fn authorization_header_format() {
        let header = authorization("1230000109", "A1B2", "c2ln", 1_554_208_460, "SERIAL01");
        assert_eq!(
            header,
            "WECHATPAY2-SHA256-RSA2048 mchid=\"1230000109\",nonce_str=\"A1B2\",\
             signature=\"c2ln\",timestamp=\"1554208460\",serial_no=\"SERIAL01\""
        );
    }

    #[test]
    fn user_agent_names_the_package() {
        assert!(USER_AGENT.starts_with("wechatpay-apiv3/"));
    }
}
