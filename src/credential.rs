//! Merchant credentials and the platform certificate store.
//!
//! Both types are immutable snapshots: all PEM parsing and field
//! validation happens once at construction, so the signer and verifier
//! never re-validate per request and can be shared freely across
//! concurrent in-flight calls.

use std::{collections::HashMap, fmt};

use picky::{key::PrivateKey, pem::parse_pem, x509::Cert};

use crate::error::{Result, WechatpayError};

/// The merchant's signing identity.
///
/// Owned exclusively by the signing subsystem for the lifetime of the
/// client; there is no mutation path once built.
pub struct MerchantCredential {
    mchid: String,
    serial: String,
    private_key: PrivateKey,
}

impl MerchantCredential {
    /// Builds a credential from a PEM-encoded merchant private key.
    ///
    /// # Errors
    ///
    /// Returns [`WechatpayError::Configuration`] if the merchant id or
    /// serial is empty, or the private key PEM cannot be parsed.
    pub fn new(
        mchid: impl Into<String>,
        serial: impl Into<String>,
        private_key_pem: &str,
    ) -> Result<Self> {
        let pem = parse_pem(private_key_pem).map_err(|e| {
            WechatpayError::Configuration(format!("merchant private key is not valid PEM: {e}"))
        })?;
        let private_key = PrivateKey::from_pem(&pem).map_err(|e| {
            WechatpayError::Configuration(format!("merchant private key is unusable: {e}"))
        })?;

        Self::from_key(mchid, serial, private_key)
    }

    /// Builds a credential from an already-parsed private key.
    ///
    /// # Errors
    ///
    /// Returns [`WechatpayError::Configuration`] if the merchant id or
    /// serial is empty.
    pub fn from_key(
        mchid: impl Into<String>,
        serial: impl Into<String>,
        private_key: PrivateKey,
    ) -> Result<Self> {
        let mchid = mchid.into();
        let serial = serial.into();

        if mchid.is_empty() {
            return Err(WechatpayError::Configuration(
                "the merchant id `mchid` is required, usually numerical".to_owned(),
            ));
        }
        if serial.is_empty() {
            return Err(WechatpayError::Configuration(
                "the merchant certificate serial number `serial` is required, usually hexadecimal"
                    .to_owned(),
            ));
        }

        Ok(Self { mchid, serial, private_key })
    }

    /// The merchant id, as sent in the `mchid` field of the
    /// `Authorization` header.
    #[must_use]
    pub fn mchid(&self) -> &str {
        &self.mchid
    }

    /// Serial number of the merchant certificate, as sent in the
    /// `serial_no` field.
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// The merchant signing key.
    #[must_use]
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

impl fmt::Debug for MerchantCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantCredential")
            .field("mchid", &self.mchid)
            .field("serial", &self.serial)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Immutable mapping from certificate serial to platform certificate.
///
/// Lookups are O(1); a serial absent from the store is a lookup failure,
/// never an empty-certificate match.
pub struct PlatformCertificateStore {
    certificates: HashMap<String, Cert>,
}

impl PlatformCertificateStore {
    /// Builds a store from PEM-encoded certificates keyed by serial.
    ///
    /// # Errors
    ///
    /// Returns [`WechatpayError::Configuration`] if the map is empty or
    /// any certificate fails to parse.
    pub fn from_pem_map(certs: &HashMap<String, String>) -> Result<Self> {
        let mut certificates = HashMap::with_capacity(certs.len());
        for (serial, pem_text) in certs {
            let pem = parse_pem(pem_text).map_err(|e| {
                WechatpayError::Configuration(format!(
                    "platform certificate for serial {serial} is not valid PEM: {e}"
                ))
            })?;
            let cert = Cert::from_pem(&pem).map_err(|e| {
                WechatpayError::Configuration(format!(
                    "platform certificate for serial {serial} is unusable: {e}"
                ))
            })?;
            certificates.insert(serial.clone(), cert);
        }

        Self::from_certs(certificates)
    }

    /// Builds a store from already-parsed certificates keyed by serial.
    ///
    /// # Errors
    ///
    /// Returns [`WechatpayError::Configuration`] if the map is empty.
    pub fn from_certs(certificates: HashMap<String, Cert>) -> Result<Self> {
        if certificates.is_empty() {
            return Err(WechatpayError::Configuration(
                "at least one platform certificate is required, as a {serial: PEM} pair"
                    .to_owned(),
            ));
        }
        Ok(Self { certificates })
    }

    /// Looks up the certificate for a serial carried in a response header.
    #[must_use]
    pub fn get(&self, serial: &str) -> Option<&Cert> {
        self.certificates.get(serial)
    }

    /// Number of certificates in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Whether the store is empty. Always `false` for a constructed store.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

impl fmt::Debug for PlatformCertificateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCertificateStore")
            .field("serials", &self.certificates.keys().collect::<Vec<_>>())
            .finish()
    }
}
