//! SigV4-style HMAC request signing and verification for Signet.
//!
//! This crate signs HTTP requests with a date-scoped, HMAC-derived key and
//! verifies such signatures on the receiving side. The signature travels
//! either in an `Authorization` header or in the query string of a presigned
//! URL.
//!
//! # Overview
//!
//! Both sides build the same canonical request from the method, path, query,
//! signed headers and payload hash, hash it into a string to sign, and HMAC
//! that with a key derived from the secret and the credential scope. The
//! protocol parameters (algorithm prefix, vendor key, header names, clock
//! skew) come from a [`SigningConfig`]; AWS and EMS presets are provided.
//!
//! # Usage
//!
//! ```rust
//! use signet_auth::canonical::SignableRequest;
//! use signet_auth::config::SigningConfig;
//! use signet_auth::credentials::AccessKey;
//! use signet_auth::sigv4::Signer;
//!
//! let signer = Signer::new(SigningConfig::aws());
//! let access_key = AccessKey::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")?;
//! let request = SignableRequest::new("GET", "/")
//!     .with_query("Action=ListUsers&Version=2010-05-08")
//!     .with_host("iam.amazonaws.com");
//!
//! let headers = signer.sign_request(
//!     &access_key,
//!     &["us-east-1", "iam", "aws4_request"],
//!     "20110909T233600Z",
//!     &request,
//! )?;
//! assert!(headers["Authorization"].starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
//! assert_eq!(headers["X-Amz-Date"], "20110909T233600Z");
//! # Ok::<(), signet_auth::AuthError>(())
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Canonical request construction and header injection
//! - [`config`] - Protocol parameters and presets
//! - [`credentials`] - Credential scope, access keys and the provider trait
//! - [`date`] - Timestamp formats and the date-tolerance check
//! - [`error`] - Error types
//! - [`hash`] - Hash and HMAC primitives
//! - [`header`] - `Authorization` header building and parsing
//! - [`presigned`] - Presigned URL construction and verification
//! - [`sigv4`] - Key derivation and request signing
//! - [`verify`] - Header-signed request verification

pub mod canonical;
pub mod config;
pub mod credentials;
pub mod date;
pub mod error;
pub mod hash;
pub mod header;
pub mod presigned;
pub mod sigv4;
pub mod verify;

pub use canonical::SignableRequest;
pub use config::SigningConfig;
pub use credentials::{AccessKey, CredentialProvider, Credentials, StaticCredentialProvider};
pub use date::{DateValidator, validate_dates};
pub use error::AuthError;
pub use hash::HashAlgorithm;
pub use presigned::{PresignOptions, verify_presigned};
pub use sigv4::Signer;
pub use verify::{AuthResult, verify_request};
