//! APIv3 response verification.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use tracing::{debug, instrument, warn};

use crate::{
    auth::{
        HEADER_NONCE, HEADER_SERIAL, HEADER_SIGNATURE, HEADER_TIMESTAMP, MAX_CLOCK_SKEW_SECS,
        formatter, rsa,
    },
    credential::PlatformCertificateStore,
    error::{Result, WechatpayError},
    transport::{CompletedResponse, ResponseType, header},
};

/// Verifies inbound responses against the platform certificate store.
///
/// A pure check: the response is returned unchanged when it is authentic
/// and every failure path is an error — a response never comes back
/// half-verified. HTTP status codes are not reinterpreted here; a signed
/// error response verifies like any other.
#[derive(Debug, Clone)]
pub struct ResponseVerifier {
    certificates: Arc<PlatformCertificateStore>,
}

impl ResponseVerifier {
    /// Creates a verifier over a platform certificate store.
    #[must_use]
    pub fn new(certificates: Arc<PlatformCertificateStore>) -> Self {
        Self { certificates }
    }

    /// Checks a completed response and returns it unchanged on success.
    ///
    /// Responses requested as raw binary bypass verification entirely:
    /// file downloads carry no signature headers by provider convention.
    /// For everything else the `Wechatpay-*` headers are extracted
    /// case-insensitively, the timestamp window is enforced before the
    /// signature is checked, and the canonical body is the raw payload for
    /// a 204 response or the JSON serialization of the decoded data
    /// otherwise.
    ///
    /// # Errors
    ///
    /// - [`WechatpayError::Verification`] for a missing header, an
    ///   unparseable timestamp, or a signature mismatch.
    /// - [`WechatpayError::Freshness`] when the timestamp is 300 seconds
    ///   or more away from the local clock.
    /// - [`WechatpayError::UnknownCertificate`] when the serial has no
    ///   certificate in the store, regardless of the signature's validity.
    /// - [`WechatpayError::Crypto`] for structurally invalid signature
    ///   material.
    #[instrument(skip(self, response), fields(status = response.status))]
    pub fn verify(&self, response: CompletedResponse) -> Result<CompletedResponse> {
        if response.response_type == ResponseType::Binary {
            debug!("binary response, verification bypassed");
            return Ok(response);
        }

        let timestamp = required_header(&response, HEADER_TIMESTAMP)?;
        let nonce = required_header(&response, HEADER_NONCE)?;
        let serial = required_header(&response, HEADER_SERIAL)?;
        let signature = required_header(&response, HEADER_SIGNATURE)?;

        let response_timestamp: i64 = timestamp.parse().map_err(|_| {
            WechatpayError::Verification(format!(
                "the {HEADER_TIMESTAMP} header {timestamp:?} is not a Unix timestamp"
            ))
        })?;
        let local_timestamp = formatter::timestamp()?;
        check_freshness(local_timestamp, response_timestamp)?;

        let certificate = self
            .certificates
            .get(serial)
            .ok_or_else(|| WechatpayError::UnknownCertificate(serial.to_owned()))?;

        let signature = BASE64
            .decode(signature)
            .map_err(|e| WechatpayError::Crypto(format!("signature is not valid base64: {e}")))?;

        // A 204 carries no content to re-serialize; the raw payload enters
        // the canonical message unmodified.
        let payload: Vec<u8> = if response.status == 204 {
            response.body.clone()
        } else {
            match &response.data {
                Some(data) => serde_json::to_vec(data)?,
                None => response.body.clone(),
            }
        };

        let message = formatter::response_message(response_timestamp, nonce, &payload);
        if !rsa::verify(&message, &signature, certificate)? {
            warn!(serial, response_timestamp, "response signature mismatch");
            return Err(WechatpayError::Verification(format!(
                "signature mismatch for timestamp={response_timestamp}, nonce={nonce}, \
                 serial={serial}"
            )));
        }

        debug!(serial, "response verified");
        Ok(response)
    }
}

/// Enforces the ±300 second freshness window, strictly.
///
/// A skew of exactly 300 seconds is rejected; 299 is the last accepted
/// value on either side.
pub(crate) fn check_freshness(local_timestamp: i64, response_timestamp: i64) -> Result<()> {
    if (local_timestamp - response_timestamp).abs() >= MAX_CLOCK_SKEW_SECS {
        return Err(WechatpayError::Freshness { response_timestamp, local_timestamp });
    }
    Ok(())
}

fn required_header<'a>(response: &'a CompletedResponse, name: &str) -> Result<&'a str> {
    header(&response.headers, name)
        .ok_or_else(|| WechatpayError::Verification(format!("missing {name} header")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn freshness_accepts_exact_match() {
        assert!(check_freshness(1000, 1000).is_ok());
    }

    #[test]
    fn freshness_boundary_future() {
        assert!(check_freshness(1000, 1299).is_ok());
        assert!(check_freshness(1000, 1300).is_err());
    }

    #[test]
    fn freshness_boundary_past() {
        assert!(check_freshness(1000, 701).is_ok());
        assert!(check_freshness(1000, 700).is_err());
    }

    #[test]
    fn verify_accepts_signed_json_response() {
        let verifier = test_support::verifier();
        let response = test_support::signed_response(200, br#"{"code":"SUCCESS"}"#);
        assert!(verifier.verify(response).is_ok());
    }

    #[test]
    fn verify_returns_response_unchanged() {
        let verifier = test_support::verifier();
        let response = test_support::signed_response(200, br#"{"code":"SUCCESS"}"#);
        let verified = verifier.verify(response).unwrap();
        assert_eq!(verified.status, 200);
        assert_eq!(verified.body, br#"{"code":"SUCCESS"}"#);
    }

    #[test]
    fn verify_accepts_signed_error_status() {
        // The core does not reinterpret HTTP status codes.
        let verifier = test_support::verifier();
        let response = test_support::signed_response(404, br#"{"code":"NOT_FOUND"}"#);
        assert!(verifier.verify(response).is_ok());
    }

    #[test]
    fn verify_accepts_204_with_raw_payload() {
        let verifier = test_support::verifier();
        let response = test_support::signed_response(204, b"");
        assert!(verifier.verify(response).is_ok());
    }

    #[test]
    fn verify_204_signs_raw_bytes_not_json() {
        // A non-JSON payload would break re-serialization; for 204 the raw
        // bytes must be used byte-for-byte.
        let verifier = test_support::verifier();
        let response = test_support::signed_response(204, b"opaque-bytes");
        assert!(verifier.verify(response).is_ok());
    }

    #[test]
    fn verify_bypasses_binary_responses() {
        let verifier = test_support::verifier();
        let response = CompletedResponse {
            status: 200,
            headers: Vec::new(),
            body: b"csv,bill,content".to_vec(),
            data: None,
            response_type: ResponseType::Binary,
        };
        assert!(verifier.verify(response).is_ok());
    }

    #[test]
    fn verify_rejects_missing_signature_header() {
        let verifier = test_support::verifier();
        let mut response = test_support::signed_response(200, br#"{"code":"SUCCESS"}"#);
        response.headers.retain(|(name, _)| !name.eq_ignore_ascii_case(HEADER_SIGNATURE));
        let result = verifier.verify(response);
        assert!(matches!(result, Err(WechatpayError::Verification(_))));
    }

    #[test]
    fn verify_rejects_unparseable_timestamp() {
        let verifier = test_support::verifier();
        let mut response = test_support::signed_response(200, br#"{"code":"SUCCESS"}"#);
        for (name, value) in &mut response.headers {
            if name.eq_ignore_ascii_case(HEADER_TIMESTAMP) {
                *value = "yesterday".to_owned();
            }
        }
        let result = verifier.verify(response);
        assert!(matches!(result, Err(WechatpayError::Verification(_))));
    }

    #[test]
    fn verify_rejects_stale_timestamp() {
        let verifier = test_support::verifier();
        let stale = formatter::timestamp().unwrap() - 301;
        let response = test_support::signed_response_at(200, br#"{"code":"SUCCESS"}"#, stale);
        let result = verifier.verify(response);
        assert!(matches!(result, Err(WechatpayError::Freshness { .. })));
    }

    #[test]
    fn verify_rejects_unknown_serial_before_signature_check() {
        let verifier = test_support::verifier();
        let mut response = test_support::signed_response(200, br#"{"code":"SUCCESS"}"#);
        for (name, value) in &mut response.headers {
            if name.eq_ignore_ascii_case(HEADER_SERIAL) {
                *value = "UNKNOWN-SERIAL".to_owned();
            }
        }
        // The signature itself is still valid; the lookup miss must win.
        let result = verifier.verify(response);
        assert!(matches!(result, Err(WechatpayError::UnknownCertificate(serial)) if serial == "UNKNOWN-SERIAL"));
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let verifier = test_support::verifier();
        let mut response = test_support::signed_response(200, br#"{"code":"SUCCESS"}"#);
        response.body = br#"{"code":"TAMPERED"}"#.to_vec();
        response.data = serde_json::from_slice(&response.body).ok();
        let result = verifier.verify(response);
        assert!(matches!(result, Err(WechatpayError::Verification(_))));
    }

    #[test]
    fn verify_rejects_garbage_base64_signature() {
        let verifier = test_support::verifier();
        let mut response = test_support::signed_response(200, br#"{"code":"SUCCESS"}"#);
        for (name, value) in &mut response.headers {
            if name.eq_ignore_ascii_case(HEADER_SIGNATURE) {
                *value = "!!not-base64!!".to_owned();
            }
        }
        let result = verifier.verify(response);
        assert!(matches!(result, Err(WechatpayError::Crypto(_))));
    }

    #[test]
    fn verify_reads_headers_case_insensitively() {
        let verifier = test_support::verifier();
        let mut response = test_support::signed_response(200, br#"{"code":"SUCCESS"}"#);
        for (name, _) in &mut response.headers {
            *name = name.to_lowercase();
        }
        assert!(verifier.verify(response).is_ok());
    }
}
