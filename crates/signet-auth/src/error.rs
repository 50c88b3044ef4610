//! Error types for request signing and verification.
//!
//! All failures are represented by [`AuthError`]. Date-window checks are the
//! one exception: [`crate::date::DateValidator`] reports a plain `bool`, and
//! only the verifier turns a `false` into [`AuthError::DateValidationFailed`].

/// Errors that can occur while signing or verifying a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The requested hash/HMAC algorithm is not supported.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A header that must be part of the signature is not present.
    #[error("Missing required header: {0}")]
    MissingRequiredHeader(String),

    /// The `Authorization` header value does not match the expected layout.
    #[error("Malformed Authorization header")]
    MalformedAuthorizationHeader,

    /// A caller-supplied value is empty or out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The `Authorization` header is missing from the request.
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    /// The credential string is not `AKID/date/scope...`.
    #[error("Invalid credential format")]
    InvalidCredential,

    /// The access key ID was not found in the credential store.
    #[error("Access key not found: {0}")]
    AccessKeyNotFound(String),

    /// The request timestamp, date header and credential date disagree.
    #[error("Request date validation failed")]
    DateValidationFailed,

    /// The computed signature does not match the provided signature.
    #[error("Signature does not match")]
    SignatureDoesNotMatch,

    /// The presigned URL has expired.
    #[error("Request has expired")]
    RequestExpired,

    /// A required query parameter for presigned URL authentication is missing.
    #[error("Missing required query parameter: {0}")]
    MissingQueryParam(String),
}
