//! Shared test fixtures.
//!
//! RSA key generation is slow enough that every test sharing one
//! lazily-generated keypair matters; the same key backs the merchant
//! credential and the self-signed platform certificate.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use picky::{
    key::PrivateKey,
    x509::{Cert, certificate::CertificateBuilder, date::UtcDate, name::DirectoryName},
};

use crate::{
    auth::{
        HEADER_NONCE, HEADER_SERIAL, HEADER_SIGNATURE, HEADER_TIMESTAMP, RequestSigner,
        ResponseVerifier, formatter, rsa,
    },
    credential::{MerchantCredential, PlatformCertificateStore},
    transport::{CompletedResponse, ResponseType},
};

pub(crate) const MCHID: &str = "1230000109";
pub(crate) const MERCHANT_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A72";
pub(crate) const PLATFORM_SERIAL: &str = "7132D72A0F08C5A5C6D2BB2A3F1F2F1B";

static KEY: LazyLock<PrivateKey> =
    LazyLock::new(|| PrivateKey::generate_rsa(2048).expect("generate RSA test key"));

static CERT: LazyLock<Cert> = LazyLock::new(|| {
    CertificateBuilder::new()
        .validity(UtcDate::ymd(2024, 1, 1).unwrap(), UtcDate::ymd(2044, 1, 1).unwrap())
        .self_signed(DirectoryName::new_common_name("wechatpay test platform"), &KEY)
        .build()
        .expect("build self-signed test certificate")
});

pub(crate) fn merchant_key() -> &'static PrivateKey {
    &KEY
}

pub(crate) fn merchant_key_pem() -> String {
    KEY.to_pem().expect("encode test key as PEM").to_string()
}

pub(crate) fn platform_cert() -> &'static Cert {
    &CERT
}

pub(crate) fn platform_cert_pem() -> String {
    CERT.to_pem().expect("encode test certificate as PEM").to_string()
}

pub(crate) fn merchant_credential() -> MerchantCredential {
    MerchantCredential::from_key(MCHID, MERCHANT_SERIAL, (*KEY).clone())
        .expect("build test credential")
}

pub(crate) fn certificate_store() -> PlatformCertificateStore {
    certificate_store_with_serial(PLATFORM_SERIAL)
}

pub(crate) fn certificate_store_with_serial(serial: &str) -> PlatformCertificateStore {
    let mut certificates = HashMap::new();
    certificates.insert(serial.to_owned(), (*CERT).clone());
    PlatformCertificateStore::from_certs(certificates).expect("build test certificate store")
}

pub(crate) fn signer() -> RequestSigner {
    RequestSigner::new(Arc::new(merchant_credential()))
}

pub(crate) fn verifier() -> ResponseVerifier {
    ResponseVerifier::new(Arc::new(certificate_store()))
}

pub(crate) fn base64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// A platform-signed response dated now.
pub(crate) fn signed_response(status: u16, body: &[u8]) -> CompletedResponse {
    signed_response_at(status, body, formatter::timestamp().expect("local timestamp"))
}

/// A platform-signed response with an explicit signing timestamp.
pub(crate) fn signed_response_at(status: u16, body: &[u8], timestamp: i64) -> CompletedResponse {
    let nonce = formatter::nonce();
    let data: Option<serde_json::Value> =
        if status == 204 { None } else { serde_json::from_slice(body).ok() };
    let payload: Vec<u8> = if status == 204 {
        body.to_vec()
    } else {
        match &data {
            Some(value) => serde_json::to_vec(value).expect("serialize test payload"),
            None => body.to_vec(),
        }
    };

    let message = formatter::response_message(timestamp, &nonce, &payload);
    let signature = rsa::sign(&message, merchant_key()).expect("sign test response");

    CompletedResponse {
        status,
        headers: vec![
            (HEADER_TIMESTAMP.to_owned(), timestamp.to_string()),
            (HEADER_NONCE.to_owned(), nonce),
            (HEADER_SERIAL.to_owned(), PLATFORM_SERIAL.to_owned()),
            (HEADER_SIGNATURE.to_owned(), BASE64.encode(signature)),
        ],
        body: body.to_vec(),
        data,
        response_type: ResponseType::Json,
    }
}
