//! Hash and HMAC primitives, selected by a closed [`HashAlgorithm`] enum.

use std::fmt;
use std::str::FromStr;

use digest::Digest;
use hmac::{Hmac, KeyInit, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// The hash function behind every digest and HMAC in a signing operation.
///
/// The label (`SHA256`, `SHA512`) is what appears in the algorithm id, e.g.
/// `AWS4-HMAC-SHA256`.
///
/// # Examples
///
/// ```
/// use signet_auth::hash::HashAlgorithm;
///
/// let algorithm: HashAlgorithm = "sha256".parse().unwrap();
/// assert_eq!(algorithm, HashAlgorithm::Sha256);
/// assert_eq!(algorithm.label(), "SHA256");
/// assert!("MD5".parse::<HashAlgorithm>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HashAlgorithm {
    /// SHA-256 (the default).
    #[default]
    Sha256,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// The label used in algorithm ids and `Authorization` headers.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Hash `data` and return the lowercase hex digest.
    ///
    /// ```
    /// use signet_auth::hash::HashAlgorithm;
    ///
    /// assert_eq!(
    ///     HashAlgorithm::Sha256.hash_hex(b""),
    ///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    /// );
    /// ```
    #[must_use]
    pub fn hash_hex(self, data: &[u8]) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }

    /// Compute the HMAC of `message` under `key` and return the raw bytes.
    #[must_use]
    pub fn hmac(self, key: &[u8], message: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => {
                let mut mac =
                    HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha512 => {
                let mut mac =
                    HmacSha512::new_from_slice(key).expect("HMAC can accept keys of any length");
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }

    /// Compute the HMAC of `message` under `key` and return it hex-encoded.
    #[must_use]
    pub fn hmac_hex(self, key: &[u8], message: &[u8]) -> String {
        hex::encode(self.hmac(key, message))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for HashAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("SHA256") {
            Ok(Self::Sha256)
        } else if s.eq_ignore_ascii_case("SHA512") {
            Ok(Self::Sha512)
        } else {
            Err(AuthError::UnsupportedAlgorithm(s.to_owned()))
        }
    }
}
