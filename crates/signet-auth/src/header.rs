//! Building and parsing the `Authorization` header.
//!
//! Format:
//! ```text
//! AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20110909/us-east-1/iam/aws4_request, \
//!   SignedHeaders=content-type;host;x-amz-date, \
//!   Signature=<hex-signature>
//! ```
//!
//! Parsing is strict: the three segments must appear in this order, separated
//! by exactly `", "`.

use std::collections::BTreeMap;

use crate::config::SigningConfig;
use crate::credentials::Credentials;
use crate::error::AuthError;
use crate::hash::HashAlgorithm;

const HMAC_SEPARATOR: &str = "-HMAC-";
const CREDENTIAL_PREFIX: &str = "Credential=";
const SIGNED_HEADERS_SEPARATOR: &str = ", SignedHeaders=";
const SIGNATURE_SEPARATOR: &str = ", Signature=";

/// The components of a parsed `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuthorization {
    /// The algorithm prefix, e.g. `AWS4` or `EMS`.
    pub algo_prefix: String,
    /// The hash algorithm named after `-HMAC-`.
    pub algorithm: HashAlgorithm,
    /// The `accessKeyId/scope` credential string, kept intact.
    pub credentials: String,
    /// The `;`-separated signed header names.
    pub signed_headers: String,
    /// The hex signature.
    pub signature: String,
}

impl ParsedAuthorization {
    /// The signed header names, in header order.
    #[must_use]
    pub fn signed_header_names(&self) -> Vec<&str> {
        self.signed_headers.split(';').collect()
    }

    /// Split the credential string into access key ID, date and scope.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredential`] if the credential is malformed.
    pub fn credential_scope(&self) -> Result<Credentials, AuthError> {
        Credentials::parse(&self.credentials)
    }
}

/// Build the `Authorization` header value.
///
/// # Examples
///
/// ```
/// use signet_auth::header::build_authorization;
///
/// let value = build_authorization(
///     "EMS-HMAC-SHA256",
///     "th3K3y/20110511/us-east-1/host/aws4_request",
///     "host",
///     "abc123",
/// );
/// assert_eq!(
///     value,
///     "EMS-HMAC-SHA256 Credential=th3K3y/20110511/us-east-1/host/aws4_request, \
///      SignedHeaders=host, Signature=abc123"
/// );
/// ```
#[must_use]
pub fn build_authorization(
    algorithm_id: &str,
    credential: &str,
    signed_headers: &str,
    signature: &str,
) -> String {
    format!(
        "{algorithm_id} {CREDENTIAL_PREFIX}{credential}{SIGNED_HEADERS_SEPARATOR}{signed_headers}{SIGNATURE_SEPARATOR}{signature}"
    )
}

/// Build the headers to merge into a signed request: the `Authorization`
/// header and the date header, keyed by their configured names.
#[must_use]
pub fn build_auth_headers(
    config: &SigningConfig,
    credentials: &Credentials,
    signed_headers: &[&str],
    signature: &str,
    timestamp: &str,
) -> BTreeMap<String, String> {
    let authorization = build_authorization(
        &config.algorithm_id(),
        &credentials.credential(),
        &crate::canonical::build_signed_headers_string(signed_headers),
        signature,
    );

    BTreeMap::from([
        (config.auth_header_name.clone(), authorization),
        (config.date_header_name.clone(), timestamp.to_owned()),
    ])
}

/// Parse an `Authorization` header value.
///
/// # Errors
///
/// Returns [`AuthError::MalformedAuthorizationHeader`] if the algorithm token,
/// any of the `Credential=`, `SignedHeaders=` and `Signature=` segments, or
/// the separators between them are missing or empty, and
/// [`AuthError::UnsupportedAlgorithm`] if the hash label is unknown.
///
/// # Examples
///
/// ```
/// use signet_auth::hash::HashAlgorithm;
/// use signet_auth::header::parse_authorization_header;
///
/// let parsed = parse_authorization_header(
///     "AWS4-HMAC-SHA256 Credential=AKID/20110909/us-east-1/iam/aws4_request, \
///      SignedHeaders=host;x-amz-date, Signature=0123abcd",
/// )
/// .unwrap();
/// assert_eq!(parsed.algorithm, HashAlgorithm::Sha256);
/// assert_eq!(parsed.credentials, "AKID/20110909/us-east-1/iam/aws4_request");
/// ```
pub fn parse_authorization_header(value: &str) -> Result<ParsedAuthorization, AuthError> {
    let (algorithm_id, rest) = value
        .split_once(' ')
        .ok_or(AuthError::MalformedAuthorizationHeader)?;

    let (algo_prefix, hash_label) = algorithm_id
        .split_once(HMAC_SEPARATOR)
        .ok_or(AuthError::MalformedAuthorizationHeader)?;
    if algo_prefix.is_empty() || hash_label.is_empty() {
        return Err(AuthError::MalformedAuthorizationHeader);
    }
    let algorithm: HashAlgorithm = hash_label.parse()?;

    let rest = rest
        .strip_prefix(CREDENTIAL_PREFIX)
        .ok_or(AuthError::MalformedAuthorizationHeader)?;
    let (credentials, rest) = rest
        .split_once(SIGNED_HEADERS_SEPARATOR)
        .ok_or(AuthError::MalformedAuthorizationHeader)?;
    let (signed_headers, signature) = rest
        .split_once(SIGNATURE_SEPARATOR)
        .ok_or(AuthError::MalformedAuthorizationHeader)?;

    let well_formed = is_token(credentials)
        && is_token(signed_headers)
        && !signature.is_empty()
        && signature.bytes().all(|b| b.is_ascii_hexdigit());
    if !well_formed {
        return Err(AuthError::MalformedAuthorizationHeader);
    }

    Ok(ParsedAuthorization {
        algo_prefix: algo_prefix.to_owned(),
        algorithm,
        credentials: credentials.to_owned(),
        signed_headers: signed_headers.to_owned(),
        signature: signature.to_owned(),
    })
}

/// A non-empty field with no whitespace or commas.
fn is_token(field: &str) -> bool {
    !field.is_empty() && !field.contains(|c: char| c == ',' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHORIZATION: &str = "AWS4-HMAC-SHA256 \
        Credential=AKIDEXAMPLE/20110909/us-east-1/iam/aws4_request, \
        SignedHeaders=content-type;host;x-amz-date, \
        Signature=ced6826de92d2bdeed8f846f0bf508e8559e98e4b0199114b84c54174deb456c";

    #[test]
    fn test_should_parse_authorization_header() {
        let parsed = parse_authorization_header(AUTHORIZATION).unwrap();
        assert_eq!(parsed.algo_prefix, "AWS4");
        assert_eq!(parsed.algorithm.to_string(), "SHA256");
        assert_eq!(
            parsed.credentials,
            "AKIDEXAMPLE/20110909/us-east-1/iam/aws4_request"
        );
        assert_eq!(parsed.signed_headers, "content-type;host;x-amz-date");
        assert_eq!(
            parsed.signature,
            "ced6826de92d2bdeed8f846f0bf508e8559e98e4b0199114b84c54174deb456c"
        );
        assert_eq!(
            parsed.signed_header_names(),
            ["content-type", "host", "x-amz-date"]
        );
    }

    #[test]
    fn test_should_round_trip_built_header() {
        let credentials =
            Credentials::new("20110909", "AKIDEXAMPLE", &["us-east-1", "iam", "aws4_request"])
                .unwrap();
        let headers = build_auth_headers(
            &SigningConfig::aws(),
            &credentials,
            &["x-amz-date", "host", "content-type"],
            "ced6826de92d2bdeed8f846f0bf508e8559e98e4b0199114b84c54174deb456c",
            "20110909T233600Z",
        );

        assert_eq!(headers["Authorization"], AUTHORIZATION);
        assert_eq!(headers["X-Amz-Date"], "20110909T233600Z");

        let parsed = parse_authorization_header(&headers["Authorization"]).unwrap();
        assert_eq!(parsed.credential_scope().unwrap(), credentials);
    }

    #[test]
    fn test_should_reject_missing_hmac_separator() {
        let header = AUTHORIZATION.replacen("-HMAC-", "-HMAC_", 1);
        assert!(matches!(
            parse_authorization_header(&header),
            Err(AuthError::MalformedAuthorizationHeader)
        ));
    }

    #[test]
    fn test_should_reject_unsupported_hash() {
        let header = AUTHORIZATION.replacen("SHA256", "MD5", 1);
        assert!(matches!(
            parse_authorization_header(&header),
            Err(AuthError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_should_reject_misspelled_literal_tokens() {
        for (from, to) in [
            ("Credential=", "Credentials="),
            ("SignedHeaders=", "Signed-Headers="),
            ("Signature=", "Sig="),
            (", SignedHeaders", ",SignedHeaders"),
        ] {
            let header = AUTHORIZATION.replacen(from, to, 1);
            assert!(
                matches!(
                    parse_authorization_header(&header),
                    Err(AuthError::MalformedAuthorizationHeader)
                ),
                "expected failure for {header}"
            );
        }
    }

    #[test]
    fn test_should_reject_empty_fields() {
        let header = "AWS4-HMAC-SHA256 Credential=, SignedHeaders=host, Signature=abc";
        assert!(matches!(
            parse_authorization_header(header),
            Err(AuthError::MalformedAuthorizationHeader)
        ));

        let header = "AWS4-HMAC-SHA256 Credential=AKID/20110909/iam, SignedHeaders=host, Signature=";
        assert!(matches!(
            parse_authorization_header(header),
            Err(AuthError::MalformedAuthorizationHeader)
        ));
    }

    #[test]
    fn test_should_reject_header_without_algorithm_token() {
        assert!(matches!(
            parse_authorization_header("Credential=AKID"),
            Err(AuthError::MalformedAuthorizationHeader)
        ));
    }
}
