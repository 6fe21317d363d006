use openssl::hash::{hash, MessageDigest};
use openssl::pkey::PKey;
use openssl::sign::Signer;
use thiserror::Error;

/// HTTP verb the inSuite gateway expects for record creation.
pub const METHOD_POST: &str = "post";

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("OpenSSL error: {0}")]
    OpenSslError(#[from] openssl::error::ErrorStack),
}

/// Inputs that identify a single signed call to the gateway.
///
/// The context is built fresh for every request: the timestamp is part of the
/// derived key, so reusing a context across calls would replay a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext<'a> {
    pub route: &'a str,
    pub secret: &'a str,
    pub timestamp: i64,
    pub method: String,
}

impl<'a> SigningContext<'a> {
    pub fn new(route: &'a str, secret: &'a str, timestamp: i64, method: &str) -> Self {
        Self {
            route,
            secret,
            timestamp,
            method: method.to_ascii_lowercase(),
        }
    }

    pub fn post(route: &'a str, secret: &'a str, timestamp: i64) -> Self {
        Self::new(route, secret, timestamp, METHOD_POST)
    }

    /// `ts@{timestamp}|route@{route}|sec@{secret}|method@{method}`
    fn secret_string(&self) -> String {
        format!(
            "ts@{}|route@{}|sec@{}|method@{}",
            self.timestamp, self.route, self.secret, self.method
        )
    }

    /// SHA-512 of the secret string, used as the HMAC key.
    fn mac_key(&self) -> Result<Vec<u8>, SignerError> {
        let digest = hash(MessageDigest::sha512(), self.secret_string().as_bytes())?;
        Ok(digest.to_vec())
    }

    /// Computes the lowercase hex HMAC-SHA256 of `canonical_body`.
    ///
    /// `canonical_body` must be the exact string that goes on the wire as the
    /// `param` value; any re-serialization in between invalidates the result.
    pub fn sign(&self, canonical_body: &str) -> Result<String, SignerError> {
        let mac_key = self.mac_key()?;
        let key = PKey::hmac(&mac_key)?;

        let mut signer = Signer::new(MessageDigest::sha256(), &key)?;
        signer.update(canonical_body.as_bytes())?;
        let code = signer.sign_to_vec()?;

        Ok(code.iter().map(|b| format!("{:02x}", b)).collect())
    }
}

/// Free-function form of [`SigningContext::sign`].
pub fn sign(
    route: &str,
    secret: &str,
    timestamp: i64,
    canonical_body: &str,
    method: &str,
) -> Result<String, SignerError> {
    SigningContext::new(route, secret, timestamp, method).sign(canonical_body)
}
