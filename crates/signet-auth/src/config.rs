//! Signing protocol configuration.
//!
//! Provides [`SigningConfig`], the set of protocol parameters shared by the
//! signer and the verifier: algorithm prefix, vendor key, hash algorithm,
//! header names and the accepted clock skew. Values can be loaded from
//! environment variables.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::date::DEFAULT_DATE_TOLERANCE_SECS;
use crate::hash::HashAlgorithm;
use crate::sigv4::algorithm_id;

/// Signing protocol configuration.
///
/// The default is the AWS flavour (`AWS4-HMAC-SHA256`, `X-Amz-*`).
///
/// # Examples
///
/// ```
/// use signet_auth::config::SigningConfig;
///
/// let config = SigningConfig::default();
/// assert_eq!(config.algorithm_id(), "AWS4-HMAC-SHA256");
/// assert_eq!(config.query_param("Signature"), "X-Amz-Signature");
///
/// let ems = SigningConfig::ems();
/// assert_eq!(ems.algorithm_id(), "EMS-HMAC-SHA256");
/// assert_eq!(ems.query_param("Credentials"), "X-EMS-Credentials");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct SigningConfig {
    /// Algorithm prefix (`AWS4`, `EMS`). Also prepended to the secret when
    /// deriving signing keys.
    #[builder(default = String::from("AWS4"))]
    pub algo_prefix: String,

    /// Vendor key used in query parameter names (`X-<vendor>-Date`).
    #[builder(default = String::from("Amz"))]
    pub vendor_key: String,

    /// Hash algorithm for digests and HMACs.
    #[builder(default)]
    pub hash_algorithm: HashAlgorithm,

    /// Name of the header carrying the signature.
    #[builder(default = String::from("Authorization"))]
    pub auth_header_name: String,

    /// Name of the header carrying the request timestamp.
    #[builder(default = String::from("X-Amz-Date"))]
    pub date_header_name: String,

    /// Maximum accepted distance, in seconds, between the server clock and
    /// the request's date header.
    #[builder(default = DEFAULT_DATE_TOLERANCE_SECS)]
    pub date_tolerance_secs: u64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self::aws()
    }
}

impl SigningConfig {
    /// The AWS flavour: `AWS4-HMAC-SHA256`, `X-Amz-Date`, `X-Amz-*` parameters.
    #[must_use]
    pub fn aws() -> Self {
        Self::for_vendor("AWS4", "Amz")
    }

    /// The EMS flavour: `EMS-HMAC-SHA256`, `X-EMS-Date`, `X-EMS-*` parameters.
    #[must_use]
    pub fn ems() -> Self {
        Self::for_vendor("EMS", "EMS")
    }

    /// A configuration for an arbitrary algorithm prefix and vendor key, with
    /// the date header named `X-<vendor>-Date`.
    #[must_use]
    pub fn for_vendor(algo_prefix: &str, vendor_key: &str) -> Self {
        Self {
            algo_prefix: algo_prefix.to_owned(),
            vendor_key: vendor_key.to_owned(),
            hash_algorithm: HashAlgorithm::default(),
            auth_header_name: String::from("Authorization"),
            date_header_name: format!("X-{vendor_key}-Date"),
            date_tolerance_secs: DEFAULT_DATE_TOLERANCE_SECS,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SIGNET_PRESET` | `aws` (`ems` selects the EMS flavour) |
    /// | `SIGNET_ALGO_PREFIX` | from preset |
    /// | `SIGNET_VENDOR_KEY` | from preset |
    /// | `SIGNET_HASH_ALGORITHM` | `SHA256` |
    /// | `SIGNET_AUTH_HEADER` | `Authorization` |
    /// | `SIGNET_DATE_HEADER` | `X-<vendor>-Date` |
    /// | `SIGNET_DATE_TOLERANCE_SECS` | `300` |
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = match std::env::var("SIGNET_PRESET") {
            Ok(v) if v.eq_ignore_ascii_case("ems") => Self::ems(),
            _ => Self::aws(),
        };

        if let Ok(v) = std::env::var("SIGNET_ALGO_PREFIX") {
            config.algo_prefix = v;
        }
        if let Ok(v) = std::env::var("SIGNET_VENDOR_KEY") {
            config.date_header_name = format!("X-{v}-Date");
            config.vendor_key = v;
        }
        if let Ok(v) = std::env::var("SIGNET_HASH_ALGORITHM") {
            if let Ok(algorithm) = v.parse() {
                config.hash_algorithm = algorithm;
            }
        }
        if let Ok(v) = std::env::var("SIGNET_AUTH_HEADER") {
            config.auth_header_name = v;
        }
        if let Ok(v) = std::env::var("SIGNET_DATE_HEADER") {
            config.date_header_name = v;
        }
        if let Ok(v) = std::env::var("SIGNET_DATE_TOLERANCE_SECS") {
            if let Ok(secs) = v.parse::<u64>() {
                config.date_tolerance_secs = secs;
            }
        }

        config
    }

    /// The algorithm id, e.g. `AWS4-HMAC-SHA256`.
    #[must_use]
    pub fn algorithm_id(&self) -> String {
        algorithm_id(&self.algo_prefix, self.hash_algorithm)
    }

    /// The presigned URL query parameter `X-<vendor>-<name>`.
    #[must_use]
    pub fn query_param(&self, name: &str) -> String {
        format!("X-{}-{name}", self.vendor_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = SigningConfig::default();
        assert_eq!(config.algo_prefix, "AWS4");
        assert_eq!(config.vendor_key, "Amz");
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(config.auth_header_name, "Authorization");
        assert_eq!(config.date_header_name, "X-Amz-Date");
        assert_eq!(config.date_tolerance_secs, 300);
    }

    #[test]
    fn test_should_create_ems_config() {
        let config = SigningConfig::ems();
        assert_eq!(config.algorithm_id(), "EMS-HMAC-SHA256");
        assert_eq!(config.date_header_name, "X-EMS-Date");
        assert_eq!(config.query_param("Expires"), "X-EMS-Expires");
    }

    #[test]
    fn test_should_load_from_env() {
        let config = SigningConfig::from_env();
        assert!(!config.algo_prefix.is_empty());
        assert!(!config.date_header_name.is_empty());
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = SigningConfig::builder()
            .algo_prefix("ACME".into())
            .vendor_key("Acme".into())
            .hash_algorithm(HashAlgorithm::Sha512)
            .date_header_name("X-Acme-Date".into())
            .date_tolerance_secs(60)
            .build();

        assert_eq!(config.algorithm_id(), "ACME-HMAC-SHA512");
        assert_eq!(config.auth_header_name, "Authorization");
        assert_eq!(config.query_param("Date"), "X-Acme-Date");
        assert_eq!(config.date_tolerance_secs, 60);
    }

    #[test]
    fn test_should_serialize_to_camel_case_json() {
        let config = SigningConfig::default();
        let json = serde_json::to_string(&config).expect("test serialization");
        assert!(json.contains("algoPrefix"));
        assert!(json.contains("dateToleranceSecs"));
        assert!(json.contains("\"SHA256\""));

        let decoded: SigningConfig = serde_json::from_str(&json).expect("test deserialization");
        assert_eq!(decoded, config);
    }
}
