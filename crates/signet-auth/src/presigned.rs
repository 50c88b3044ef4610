//! Presigned URLs.
//!
//! A presigned URL carries its authentication in query parameters instead of
//! headers. For a vendor key `EMS` the parameters are:
//!
//! - `X-EMS-Algorithm` - the algorithm id, e.g. `EMS-HMAC-SHA256`
//! - `X-EMS-Credentials` - `AKID/date/scope...`
//! - `X-EMS-Date` - ISO 8601 basic format timestamp (`YYYYMMDDTHHMMSSZ`)
//! - `X-EMS-Expires` - validity duration in seconds
//! - `X-EMS-SignedHeaders` - semicolon-separated signed header names
//! - `X-EMS-Signature` - the hex-encoded signature
//!
//! The payload of a presigned request is never known up front, so the payload
//! hash is the digest of the literal `UNSIGNED-PAYLOAD`.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;
use zeroize::Zeroizing;

use crate::canonical::{
    HOST_HEADER, SignableRequest, build_canonical_request, build_signed_headers_string,
    uri_encode,
};
use crate::config::SigningConfig;
use crate::credentials::{AccessKey, CredentialProvider, Credentials};
use crate::date::{format_short_date, format_timestamp, parse_timestamp};
use crate::error::AuthError;
use crate::sigv4::{Signer, sign_canonical_hash};
use crate::verify::{AuthResult, check_signature, collect_signed_headers};

/// The stand-in payload of every presigned request.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Names of the signing parameters, as in `X-<vendor>-<name>`.
const SIGNING_PARAMS: [&str; 6] = [
    "Algorithm",
    "Credentials",
    "Date",
    "Expires",
    "SignedHeaders",
    "Signature",
];

/// Extra headers to sign into a presigned URL.
///
/// `host` is always signed and need not be listed. Headers listed in
/// `signed_headers` must have a value in `headers`, and the client fetching
/// the URL must send them unchanged.
#[derive(Debug, Clone, Default)]
pub struct PresignOptions {
    /// Header `(name, value)` pairs the request will carry.
    pub headers: Vec<(String, String)>,
    /// Names of the headers to sign.
    pub signed_headers: Vec<String>,
}

impl Signer {
    /// Presign a `GET` URL valid for `expires_secs` seconds from `date_time`.
    ///
    /// Signing parameters already present in the URL are removed, the rest of
    /// its query string is kept verbatim, and the signing parameters are
    /// appended in alphabetical order, followed by the signature. Any
    /// fragment is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidArgument`] if the URL cannot be parsed or
    /// has no host, or the scope or access key is invalid, and
    /// [`AuthError::MissingRequiredHeader`] if a header listed in `options`
    /// has no value.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use signet_auth::config::SigningConfig;
    /// use signet_auth::credentials::AccessKey;
    /// use signet_auth::presigned::PresignOptions;
    /// use signet_auth::sigv4::Signer;
    ///
    /// let signer = Signer::new(SigningConfig::ems());
    /// let access_key = AccessKey::new("th3K3y", "very_secure").unwrap();
    /// let url = signer
    ///     .presign_url(
    ///         &access_key,
    ///         &["us-east-1", "host", "aws4_request"],
    ///         "http://example.com/something?foo=bar",
    ///         &Utc.with_ymd_and_hms(2011, 5, 11, 12, 0, 0).unwrap(),
    ///         3600,
    ///         &PresignOptions::default(),
    ///     )
    ///     .unwrap();
    /// assert!(url.starts_with("http://example.com/something?foo=bar&X-EMS-Algorithm="));
    /// ```
    pub fn presign_url<S: AsRef<str>>(
        &self,
        access_key: &AccessKey,
        scope_parts: &[S],
        url: &str,
        date_time: &DateTime<Utc>,
        expires_secs: u64,
        options: &PresignOptions,
    ) -> Result<String, AuthError> {
        let base = url.split_once('#').map_or(url, |(base, _)| base);
        let uri: http::Uri = base
            .parse()
            .map_err(|e| AuthError::InvalidArgument(format!("invalid URL {url}: {e}")))?;
        let authority = uri
            .authority()
            .ok_or_else(|| AuthError::InvalidArgument(format!("URL has no host: {url}")))?
            .as_str();
        let host = authority.rsplit('@').next().unwrap_or(authority);

        let timestamp = format_timestamp(date_time);
        let credentials = Credentials::new(
            &format_short_date(date_time),
            access_key.access_key_id(),
            scope_parts,
        )?;

        let mut request = SignableRequest::new("GET", uri.path())
            .with_payload(UNSIGNED_PAYLOAD)
            .with_host(host);
        for (name, value) in &options.headers {
            request = request.with_header(name, value);
        }
        let request = request
            .with_signed_headers(options.signed_headers.iter().map(String::as_str))
            .with_mandatory_headers(None)?;

        let signed: Vec<&str> = request.signed_headers().iter().map(String::as_str).collect();
        let config = self.config();
        let signing_params = [
            (config.query_param("Algorithm"), config.algorithm_id()),
            (config.query_param("Credentials"), credentials.credential()),
            (config.query_param("Date"), timestamp.clone()),
            (config.query_param("Expires"), expires_secs.to_string()),
            (
                config.query_param("SignedHeaders"),
                build_signed_headers_string(&signed),
            ),
        ];
        let signing_query = signing_params
            .iter()
            .map(|(name, value)| format!("{name}={}", uri_encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        let (target, existing) = base.split_once('?').unwrap_or((base, ""));
        let kept = without_params(existing, &SIGNING_PARAMS.map(|name| config.query_param(name)));
        let query = if kept.is_empty() {
            signing_query
        } else {
            format!("{kept}&{signing_query}")
        };
        let request = request.with_query(query.as_str());
        let signature =
            self.signature(access_key.secret_key(), &credentials, &timestamp, &request)?;

        debug!(
            access_key_id = %credentials.access_key_id(),
            expires_secs,
            "Presigned URL"
        );

        Ok(format!(
            "{target}?{query}&{}={signature}",
            config.query_param("Signature")
        ))
    }
}

/// Parsed components from presigned URL query parameters.
#[derive(Debug, Clone)]
pub struct ParsedPresignedParams {
    /// The algorithm id, e.g. `EMS-HMAC-SHA256`.
    pub algorithm: String,
    /// The access key ID, date and scope.
    pub credentials: Credentials,
    /// The ISO 8601 basic format timestamp.
    pub timestamp: String,
    /// The URL validity duration in seconds.
    pub expires: u64,
    /// The list of signed header names.
    pub signed_headers: Vec<String>,
    /// The hex-encoded signature.
    pub signature: String,
}

/// Parse presigned URL query parameters into their components.
///
/// # Errors
///
/// Returns [`AuthError::MissingQueryParam`] if any required parameter is
/// absent or the expiry is not an integer, [`AuthError::UnsupportedAlgorithm`]
/// if the algorithm is not the configured one, or
/// [`AuthError::InvalidCredential`] if the credential format is invalid.
pub fn parse_presigned_params(
    config: &SigningConfig,
    query: &str,
) -> Result<ParsedPresignedParams, AuthError> {
    let params: HashMap<String, String> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            Some((url_decode(key), url_decode(value)))
        })
        .collect();
    let required = |name: &str| -> Result<String, AuthError> {
        let name = config.query_param(name);
        params
            .get(&name)
            .cloned()
            .ok_or(AuthError::MissingQueryParam(name))
    };

    let algorithm = required("Algorithm")?;
    if algorithm != config.algorithm_id() {
        return Err(AuthError::UnsupportedAlgorithm(algorithm));
    }

    let credentials = Credentials::parse(&required("Credentials")?)?;
    let timestamp = required("Date")?;
    let expires = required("Expires")?.parse::<u64>().map_err(|_| {
        AuthError::MissingQueryParam(format!("{} (invalid integer)", config.query_param("Expires")))
    })?;
    let signed_headers = required("SignedHeaders")?
        .split(';')
        .map(ToOwned::to_owned)
        .collect();
    let signature = required("Signature")?;

    Ok(ParsedPresignedParams {
        algorithm,
        credentials,
        timestamp,
        expires,
        signed_headers,
        signature,
    })
}

/// Verify a presigned URL request.
///
/// Parses the signing parameters, rejects the URL if it expired before `now`
/// or was issued too far in the future, resolves the secret key, rebuilds
/// the canonical request without the signature parameter and compares
/// signatures in constant time.
///
/// # Errors
///
/// Returns an [`AuthError`] if:
/// - Required query parameters are missing or malformed
/// - The URL has expired or its date is beyond the accepted clock skew
/// - The access key is not found
/// - Required signed headers are missing
/// - The signature does not match
pub fn verify_presigned(
    parts: &http::request::Parts,
    credential_provider: &dyn CredentialProvider,
    config: &SigningConfig,
    now: &DateTime<Utc>,
) -> Result<AuthResult, AuthError> {
    let query = parts.uri.query().unwrap_or("");
    let parsed = parse_presigned_params(config, query)?;
    let credentials = &parsed.credentials;

    debug!(
        access_key_id = %credentials.access_key_id(),
        scope = %credentials.scope(),
        expires = parsed.expires,
        "Verifying presigned URL"
    );

    if !parsed
        .signed_headers
        .iter()
        .any(|name| name.eq_ignore_ascii_case(HOST_HEADER))
    {
        return Err(AuthError::MissingRequiredHeader(HOST_HEADER.to_owned()));
    }

    check_expiration(config, &parsed, now)?;

    let secret_key =
        Zeroizing::new(credential_provider.get_secret_key(credentials.access_key_id())?);

    let signed_header_refs: Vec<&str> = parsed.signed_headers.iter().map(String::as_str).collect();
    let header_pairs = collect_signed_headers(parts, &signed_header_refs)?;
    let canonical_request = build_canonical_request(
        parts.method.as_str(),
        parts.uri.path(),
        &without_params(query, &[config.query_param("Signature")]),
        &header_pairs,
        &signed_header_refs,
        &config.hash_algorithm.hash_hex(UNSIGNED_PAYLOAD.as_bytes()),
    );
    debug!(canonical_request, "Built presigned canonical request");

    let canonical_hash = config.hash_algorithm.hash_hex(canonical_request.as_bytes());
    let expected_signature = sign_canonical_hash(
        config,
        &secret_key,
        credentials,
        &parsed.timestamp,
        &canonical_hash,
    )?;

    check_signature(credentials, &expected_signature, &parsed.signature)?;

    Ok(AuthResult {
        access_key_id: credentials.access_key_id().to_owned(),
        credential_scope: credentials.scope(),
        signed_headers: parsed.signed_headers,
    })
}

/// Drop the parameters named in `names` from a raw query string, keeping the
/// others verbatim. Names are compared after percent-decoding.
fn without_params(query: &str, names: &[String]) -> String {
    query
        .split('&')
        .filter(|param| !param.is_empty())
        .filter(|param| {
            let name = param.split_once('=').map_or(*param, |(name, _)| name);
            !names.contains(&url_decode(name))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn check_expiration(
    config: &SigningConfig,
    parsed: &ParsedPresignedParams,
    now: &DateTime<Utc>,
) -> Result<(), AuthError> {
    let request_time = parse_timestamp(&parsed.timestamp).map_err(|_| {
        AuthError::MissingQueryParam(format!("{} (invalid format)", config.query_param("Date")))
    })?;

    if parsed.timestamp.get(..8) != Some(parsed.credentials.short_date()) {
        return Err(AuthError::DateValidationFailed);
    }

    let tolerance = i64::try_from(config.date_tolerance_secs)
        .ok()
        .and_then(TimeDelta::try_seconds);
    if tolerance.is_some_and(|tolerance| request_time.signed_duration_since(*now) > tolerance) {
        return Err(AuthError::DateValidationFailed);
    }

    let expiry_time = i64::try_from(parsed.expires)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|validity| request_time.checked_add_signed(validity))
        .ok_or(AuthError::RequestExpired)?;
    if *now > expiry_time {
        return Err(AuthError::RequestExpired);
    }

    Ok(())
}

fn url_decode(input: &str) -> String {
    percent_encoding::percent_decode_str(input)
        .decode_utf8_lossy()
        .into_owned()
}
