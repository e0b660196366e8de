//! RSA signing and verification over canonical messages.
//!
//! Thin capability surface on top of [`picky`]: SHA-256 digest with
//! RSASSA-PKCS1-v1_5 padding. The padding/digest pair is a
//! wire-compatibility requirement of the APIv3 protocol, not a free
//! choice, so no other scheme is exposed here.

use picky::{
    hash::HashAlgorithm,
    key::PrivateKey,
    signature::{SignatureAlgorithm, SignatureError},
    x509::Cert,
};

use crate::error::{Result, WechatpayError};

const SCHEME: SignatureAlgorithm = SignatureAlgorithm::RsaPkcs1v15(HashAlgorithm::SHA2_256);

/// Signs a canonical message with the merchant private key.
///
/// Returns the raw signature bytes; callers base64-encode them for the
/// wire.
///
/// # Errors
///
/// Returns [`WechatpayError::Crypto`] if the key cannot be used for
/// RSASSA-PKCS1-v1_5 signing.
pub fn sign(message: &[u8], private_key: &PrivateKey) -> Result<Vec<u8>> {
    SCHEME
        .sign(message, private_key)
        .map_err(|e| WechatpayError::Crypto(format!("RSA signing failed: {e}")))
}

/// Verifies a signature over a canonical message against a platform
/// certificate.
///
/// Returns `Ok(false)` on a clean cryptographic mismatch. Structurally
/// invalid input (wrong key type, damaged certificate material) is a
/// distinct failure, never a silent `false`.
///
/// # Errors
///
/// Returns [`WechatpayError::Crypto`] if the certificate or signature
/// input is structurally unusable.
pub fn verify(message: &[u8], signature: &[u8], certificate: &Cert) -> Result<bool> {
    match SCHEME.verify(certificate.public_key(), message, signature) {
        Ok(()) => Ok(true),
        Err(SignatureError::BadSignature) => Ok(false),
        Err(e) => Err(WechatpayError::Crypto(format!("signature verification failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn sign_then_verify_roundtrip() {
        let key = test_support::merchant_key();
        let cert = test_support::platform_cert();

        let signature = sign(b"GET\n/v3/certificates\n1\nnonce\n\n", key).unwrap();
        assert!(verify(b"GET\n/v3/certificates\n1\nnonce\n\n", &signature, cert).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let key = test_support::merchant_key();
        let cert = test_support::platform_cert();

        let signature = sign(b"1\nnonce\nbody\n", key).unwrap();
        assert!(!verify(b"1\nnonce\ntampered\n", &signature, cert).unwrap());
    }

    #[test]
    fn verify_rejects_signature_from_other_key() {
        let cert = test_support::platform_cert();
        let other = PrivateKey::generate_rsa(2048).unwrap();

        let signature = sign(b"1\nnonce\nbody\n", &other).unwrap();
        assert!(!verify(b"1\nnonce\nbody\n", &signature, cert).unwrap());
    }

    #[test]
    fn signatures_are_deterministic_for_pkcs1v15() {
        let key = test_support::merchant_key();

        // PKCS#1 v1.5 is deterministic, unlike PSS; two signatures over the
        // same message must be byte-identical.
        let first = sign(b"message", key).unwrap();
        let second = sign(b"message", key).unwrap();
        assert_eq!(first, second);
    }
}
