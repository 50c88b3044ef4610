//! Server-side verification of header-signed requests.
//!
//! The verifier recomputes the signature from the received request and
//! compares it with the one in the `Authorization` header in constant time.
//! Presigned URLs are verified by [`crate::presigned::verify_presigned`].

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

use crate::canonical::{HOST_HEADER, build_canonical_request};
use crate::config::SigningConfig;
use crate::credentials::{CredentialProvider, Credentials};
use crate::date::{DateValidator, format_timestamp};
use crate::error::AuthError;
use crate::header::parse_authorization_header;
use crate::sigv4::sign_canonical_hash;

/// The outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// The access key ID that signed the request.
    pub access_key_id: String,
    /// The credential scope, e.g. `20110909/us-east-1/iam/aws4_request`.
    pub credential_scope: String,
    /// The signed header names.
    pub signed_headers: Vec<String>,
}

/// Verify a request signed with an `Authorization` header.
///
/// Checks run in order:
///
/// 1. The `Authorization` header is present and well formed, and its
///    algorithm matches `config`.
/// 2. `host` and the date header are among the signed headers.
/// 3. The date header is within `config.date_tolerance_secs` of `now` and
///    agrees with the credential date.
/// 4. The recomputed signature equals the provided one.
///
/// # Errors
///
/// Returns [`AuthError::MissingAuthHeader`],
/// [`AuthError::MalformedAuthorizationHeader`],
/// [`AuthError::UnsupportedAlgorithm`], [`AuthError::InvalidCredential`],
/// [`AuthError::MissingRequiredHeader`], [`AuthError::DateValidationFailed`],
/// [`AuthError::AccessKeyNotFound`] or [`AuthError::SignatureDoesNotMatch`].
pub fn verify_request(
    parts: &http::request::Parts,
    payload: &[u8],
    credential_provider: &dyn CredentialProvider,
    config: &SigningConfig,
    now: &DateTime<Utc>,
) -> Result<AuthResult, AuthError> {
    let auth_value = parts
        .headers
        .get(config.auth_header_name.as_str())
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedAuthorizationHeader)?;

    let parsed = parse_authorization_header(auth_value)?;
    if parsed.algo_prefix != config.algo_prefix || parsed.algorithm != config.hash_algorithm {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "{}-HMAC-{}",
            parsed.algo_prefix, parsed.algorithm
        )));
    }
    let credentials = parsed.credential_scope()?;
    let signed_headers = parsed.signed_header_names();

    debug!(
        access_key_id = %credentials.access_key_id(),
        scope = %credentials.scope(),
        signed_headers = %parsed.signed_headers,
        "Verifying request signature"
    );

    let date_header = config.date_header_name.to_ascii_lowercase();
    for required in [HOST_HEADER, date_header.as_str()] {
        if !signed_headers
            .iter()
            .any(|name| name.eq_ignore_ascii_case(required))
        {
            return Err(AuthError::MissingRequiredHeader(required.to_owned()));
        }
    }

    let timestamp = header_value(parts, &date_header)?;
    let validator = DateValidator::new(config.date_tolerance_secs);
    if !validator.validate_dates(&format_timestamp(now), timestamp, credentials.short_date()) {
        return Err(AuthError::DateValidationFailed);
    }

    let secret_key =
        Zeroizing::new(credential_provider.get_secret_key(credentials.access_key_id())?);

    let header_pairs = collect_signed_headers(parts, &signed_headers)?;
    let canonical_request = build_canonical_request(
        parts.method.as_str(),
        parts.uri.path(),
        parts.uri.query().unwrap_or(""),
        &header_pairs,
        &signed_headers,
        &config.hash_algorithm.hash_hex(payload),
    );
    debug!(canonical_request, "Built canonical request");

    let canonical_hash = config.hash_algorithm.hash_hex(canonical_request.as_bytes());
    let expected_signature =
        sign_canonical_hash(config, &secret_key, &credentials, timestamp, &canonical_hash)?;

    check_signature(&credentials, &expected_signature, &parsed.signature)?;

    Ok(AuthResult {
        access_key_id: credentials.access_key_id().to_owned(),
        credential_scope: credentials.scope(),
        signed_headers: signed_headers.iter().map(|name| (*name).to_owned()).collect(),
    })
}

/// Compare signatures in constant time.
pub(crate) fn check_signature(
    credentials: &Credentials,
    expected: &str,
    provided: &str,
) -> Result<(), AuthError> {
    if expected.as_bytes().ct_eq(provided.as_bytes()).into() {
        debug!(access_key_id = %credentials.access_key_id(), "Signature verification succeeded");
        Ok(())
    } else {
        debug!(
            access_key_id = %credentials.access_key_id(),
            expected = %expected,
            provided = %provided,
            "Signature mismatch"
        );
        Err(AuthError::SignatureDoesNotMatch)
    }
}

/// Collect header values for the signed headers from the request.
///
/// Repeated headers yield one pair per value; canonicalization joins them.
pub(crate) fn collect_signed_headers<'a>(
    parts: &'a http::request::Parts,
    signed_headers: &[&'a str],
) -> Result<Vec<(&'a str, &'a str)>, AuthError> {
    let mut result = Vec::with_capacity(signed_headers.len());

    for &name in signed_headers {
        let mut found = false;
        for value in parts.headers.get_all(name) {
            let value = value
                .to_str()
                .map_err(|_| AuthError::MissingRequiredHeader(name.to_owned()))?;
            result.push((name, value));
            found = true;
        }
        if !found {
            return Err(AuthError::MissingRequiredHeader(name.to_owned()));
        }
    }

    Ok(result)
}

fn header_value<'a>(parts: &'a http::request::Parts, name: &str) -> Result<&'a str, AuthError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AuthError::MissingRequiredHeader(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::canonical::SignableRequest;
    use crate::credentials::{AccessKey, StaticCredentialProvider};
    use crate::sigv4::Signer;

    const SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";
    const ACCESS_KEY_ID: &str = "AKIDEXAMPLE";
    const CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
    const PAYLOAD: &[u8] = b"Action=ListUsers&Version=2010-05-08";
    const AUTHORIZATION: &str = "AWS4-HMAC-SHA256 \
        Credential=AKIDEXAMPLE/20110909/us-east-1/iam/aws4_request, \
        SignedHeaders=content-type;host;x-amz-date, \
        Signature=ced6826de92d2bdeed8f846f0bf508e8559e98e4b0199114b84c54174deb456c";

    fn provider() -> StaticCredentialProvider {
        StaticCredentialProvider::new(vec![(ACCESS_KEY_ID.to_owned(), SECRET_KEY.to_owned())])
    }

    fn request_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2011, 9, 9, 23, 36, 0).unwrap()
    }

    fn vector_parts(authorization: &str) -> http::request::Parts {
        let (parts, ()) = http::Request::builder()
            .method("POST")
            .uri("https://iam.amazonaws.com/")
            .header("Content-Type", CONTENT_TYPE)
            .header("Host", "iam.amazonaws.com")
            .header("X-Amz-Date", "20110909T233600Z")
            .header("Authorization", authorization)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_should_verify_reference_request() {
        let parts = vector_parts(AUTHORIZATION);
        let result = verify_request(
            &parts,
            PAYLOAD,
            &provider(),
            &SigningConfig::aws(),
            &request_time(),
        )
        .unwrap();

        assert_eq!(result.access_key_id, ACCESS_KEY_ID);
        assert_eq!(result.credential_scope, "20110909/us-east-1/iam/aws4_request");
        assert_eq!(result.signed_headers, ["content-type", "host", "x-amz-date"]);
    }

    #[test]
    fn test_should_reject_tampered_payload() {
        let parts = vector_parts(AUTHORIZATION);
        let result = verify_request(
            &parts,
            b"Action=DeleteUser&Version=2010-05-08",
            &provider(),
            &SigningConfig::aws(),
            &request_time(),
        );
        assert!(matches!(result, Err(AuthError::SignatureDoesNotMatch)));
    }

    #[test]
    fn test_should_reject_request_outside_date_window() {
        let parts = vector_parts(AUTHORIZATION);
        let now = Utc.with_ymd_and_hms(2011, 9, 9, 23, 47, 0).unwrap();
        let result = verify_request(&parts, PAYLOAD, &provider(), &SigningConfig::aws(), &now);
        assert!(matches!(result, Err(AuthError::DateValidationFailed)));
    }

    #[test]
    fn test_should_reject_unknown_access_key() {
        let parts = vector_parts(AUTHORIZATION);
        let empty = StaticCredentialProvider::new(Vec::new());
        let result = verify_request(
            &parts,
            PAYLOAD,
            &empty,
            &SigningConfig::aws(),
            &request_time(),
        );
        assert!(matches!(result, Err(AuthError::AccessKeyNotFound(_))));
    }

    #[test]
    fn test_should_reject_missing_authorization_header() {
        let (parts, ()) = http::Request::builder()
            .uri("https://iam.amazonaws.com/")
            .body(())
            .unwrap()
            .into_parts();
        let result = verify_request(
            &parts,
            PAYLOAD,
            &provider(),
            &SigningConfig::aws(),
            &request_time(),
        );
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[test]
    fn test_should_reject_foreign_algorithm_prefix() {
        let parts = vector_parts(AUTHORIZATION);
        let result = verify_request(
            &parts,
            PAYLOAD,
            &provider(),
            &SigningConfig::ems(),
            &request_time(),
        );
        assert!(matches!(result, Err(AuthError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_should_require_date_header_to_be_signed() {
        let authorization =
            AUTHORIZATION.replacen("content-type;host;x-amz-date", "content-type;host", 1);
        let parts = vector_parts(&authorization);
        let result = verify_request(
            &parts,
            PAYLOAD,
            &provider(),
            &SigningConfig::aws(),
            &request_time(),
        );
        assert!(matches!(result, Err(AuthError::MissingRequiredHeader(name)) if name == "x-amz-date"));
    }

    #[test]
    fn test_should_verify_what_the_signer_produced() {
        let config = SigningConfig::ems();
        let signer = Signer::new(config.clone());
        let access_key = AccessKey::new("th3K3y", "very_secure").unwrap();
        let request = SignableRequest::new("PUT", "/buckets/a b")
            .with_query("versioning&x=1")
            .with_payload("{\"enabled\":true}")
            .with_header("Content-Type", "application/json")
            .with_signed_header("content-type")
            .with_host("api.example.com");

        let auth_headers = signer
            .sign_request(
                &access_key,
                &["eu-west-1", "storage", "ems_request"],
                "20110909T233600Z",
                &request,
            )
            .unwrap();

        let mut builder = http::Request::builder()
            .method("PUT")
            .uri("https://api.example.com/buckets/a%20b?versioning&x=1")
            .header("host", "api.example.com")
            .header("content-type", "application/json");
        for (name, value) in &auth_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();

        let provider =
            StaticCredentialProvider::new(vec![("th3K3y".to_owned(), "very_secure".to_owned())]);
        let result = verify_request(
            &parts,
            b"{\"enabled\":true}",
            &provider,
            &config,
            &request_time(),
        )
        .unwrap();

        assert_eq!(result.access_key_id, "th3K3y");
        assert_eq!(result.credential_scope, "20110909/eu-west-1/storage/ems_request");
        assert_eq!(result.signed_headers, ["content-type", "host", "x-ems-date"]);
    }
}
