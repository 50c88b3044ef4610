//! Key derivation, string-to-sign construction and request signing.
//!
//! Signing a request runs these steps:
//!
//! 1. Fill in the mandatory `host` and date headers and canonicalize the request.
//! 2. Build the string to sign from the algorithm id, timestamp, credential
//!    scope and canonical request hash.
//! 3. Derive the signing key from the secret and the credential scope through
//!    a chain of HMACs.
//! 4. HMAC the string to sign with the derived key.
//! 5. Emit the `Authorization` and date headers.
//!
//! The main entry point is [`Signer::sign_request`].

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;
use zeroize::Zeroizing;

use crate::canonical::SignableRequest;
use crate::config::SigningConfig;
use crate::credentials::{AccessKey, Credentials};
use crate::error::AuthError;
use crate::hash::HashAlgorithm;
use crate::header::build_auth_headers;

/// A derived signing key.
///
/// The bytes are zeroized on drop and never shown by `Debug`.
#[derive(Clone)]
pub struct SigningKey(Zeroizing<Vec<u8>>);

impl SigningKey {
    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The key as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_slice())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Build the algorithm id, e.g. `AWS4-HMAC-SHA256`.
#[must_use]
pub fn algorithm_id(algo_prefix: &str, algorithm: HashAlgorithm) -> String {
    format!("{algo_prefix}-HMAC-{}", algorithm.label())
}

/// Build the string to sign.
///
/// Format:
/// ```text
/// <algorithm id>\n
/// <YYYYMMDDTHHMMSSZ timestamp>\n
/// <credential scope>\n
/// <hex(hash(canonical_request))>
/// ```
///
/// # Examples
///
/// ```
/// use signet_auth::sigv4::build_string_to_sign;
///
/// let sts = build_string_to_sign(
///     "AWS4-HMAC-SHA256",
///     "20110909T233600Z",
///     "20110909/us-east-1/iam/aws4_request",
///     "3511de7e95d28ecd39e9513b642aee07e54f4941150d8df8bf94b328ef7e55e2",
/// );
/// assert!(sts.starts_with("AWS4-HMAC-SHA256\n20110909T233600Z\n"));
/// ```
#[must_use]
pub fn build_string_to_sign(
    algorithm_id: &str,
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{algorithm_id}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Derive the signing key through a chain of HMACs.
///
/// ```text
/// k0 = key_prefix + secret_key
/// k1 = HMAC(k0, short_date)
/// ki = HMAC(k(i-1), scope_parts[i-1])
/// ```
///
/// # Errors
///
/// Returns [`AuthError::InvalidArgument`] if the secret key is empty.
///
/// # Examples
///
/// ```
/// use signet_auth::credentials::Credentials;
/// use signet_auth::hash::HashAlgorithm;
/// use signet_auth::sigv4::derive_signing_key;
///
/// let credentials =
///     Credentials::new("20120215", "AKIDEXAMPLE", &["us-east-1", "iam", "aws4_request"]).unwrap();
/// let key = derive_signing_key(
///     HashAlgorithm::Sha256,
///     "AWS4",
///     "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
///     &credentials,
/// )
/// .unwrap();
/// assert_eq!(
///     key.to_hex(),
///     "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
/// );
/// ```
pub fn derive_signing_key(
    algorithm: HashAlgorithm,
    key_prefix: &str,
    secret_key: &str,
    credentials: &Credentials,
) -> Result<SigningKey, AuthError> {
    if secret_key.is_empty() {
        return Err(AuthError::InvalidArgument("secret key is empty".to_owned()));
    }

    let seed = Zeroizing::new(format!("{key_prefix}{secret_key}"));
    let mut key = Zeroizing::new(algorithm.hmac(seed.as_bytes(), credentials.short_date().as_bytes()));
    for part in credentials.scope_parts() {
        key = Zeroizing::new(algorithm.hmac(&key, part.as_bytes()));
    }

    Ok(SigningKey(key))
}

/// HMAC `string_to_sign` with the signing key and return the hex signature.
#[must_use]
pub fn compute_signature(
    algorithm: HashAlgorithm,
    signing_key: &SigningKey,
    string_to_sign: &str,
) -> String {
    algorithm.hmac_hex(signing_key.as_bytes(), string_to_sign.as_bytes())
}

/// Signs requests under one [`SigningConfig`].
///
/// A `Signer` holds configuration only; every call is independent.
#[derive(Debug, Clone, Default)]
pub struct Signer {
    config: SigningConfig,
}

impl Signer {
    /// Create a signer for the given configuration.
    #[must_use]
    pub fn new(config: SigningConfig) -> Self {
        Self { config }
    }

    /// The signer's configuration.
    #[must_use]
    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Sign `request` and return the headers to add to it.
    ///
    /// The returned map holds the `Authorization` header and the date header,
    /// keyed by the configured header names. `timestamp` is the full
    /// `YYYYMMDDTHHMMSSZ` timestamp; the credential date is taken from it.
    /// `host` and the date header are always signed. `host` is filled in when
    /// the request does not carry it; the date header is always set to
    /// `timestamp`, replacing any other value the request carries.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidArgument`] for an empty scope, a malformed
    /// timestamp or an invalid access key, and
    /// [`AuthError::MissingRequiredHeader`] if no host is known or a header
    /// marked for signing is absent.
    pub fn sign_request<S: AsRef<str>>(
        &self,
        access_key: &AccessKey,
        scope_parts: &[S],
        timestamp: &str,
        request: &SignableRequest,
    ) -> Result<BTreeMap<String, String>, AuthError> {
        crate::date::parse_timestamp(timestamp)?;
        let credentials = Credentials::new(timestamp, access_key.access_key_id(), scope_parts)?;

        let date_header = self.config.date_header_name.as_str();
        if request.header(date_header).is_some_and(|value| value != timestamp) {
            debug!(date_header, timestamp, "Replacing stale date header");
        }
        let prepared = request
            .clone()
            .replace_header(date_header, timestamp)
            .with_mandatory_headers(Some((date_header, timestamp)))?;
        let signature = self.signature(access_key.secret_key(), &credentials, timestamp, &prepared)?;

        let signed: Vec<&str> = prepared.signed_headers().iter().map(String::as_str).collect();
        Ok(build_auth_headers(
            &self.config,
            &credentials,
            &signed,
            &signature,
            timestamp,
        ))
    }

    /// Compute the signature of an already-prepared request.
    ///
    /// No headers are injected; the request is canonicalized exactly as given.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingRequiredHeader`] if a header marked for
    /// signing is absent and [`AuthError::InvalidArgument`] for an empty secret.
    pub fn signature(
        &self,
        secret_key: &str,
        credentials: &Credentials,
        timestamp: &str,
        request: &SignableRequest,
    ) -> Result<String, AuthError> {
        let algorithm = self.config.hash_algorithm;
        let canonical = request.canonicalize(algorithm)?;
        debug!(canonical_request = %canonical.text, "Built canonical request");

        sign_canonical_hash(&self.config, secret_key, credentials, timestamp, &canonical.hash)
    }
}

/// Sign a canonical request hash: build the string to sign, derive the key
/// and HMAC.
pub(crate) fn sign_canonical_hash(
    config: &SigningConfig,
    secret_key: &str,
    credentials: &Credentials,
    timestamp: &str,
    canonical_hash: &str,
) -> Result<String, AuthError> {
    let algorithm = config.hash_algorithm;
    let string_to_sign = build_string_to_sign(
        &config.algorithm_id(),
        timestamp,
        &credentials.scope(),
        canonical_hash,
    );
    debug!(string_to_sign, "Built string to sign");

    let signing_key = derive_signing_key(algorithm, &config.algo_prefix, secret_key, credentials)?;
    Ok(compute_signature(algorithm, &signing_key, &string_to_sign))
}
