//! Canonical request construction.
//!
//! The canonical request is the exact byte string that gets hashed and signed:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Each component is normalized so that signer and verifier produce the same
//! bytes regardless of header casing, header order or query parameter order.

use std::collections::{BTreeMap, BTreeSet};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::error::AuthError;
use crate::hash::HashAlgorithm;

/// All characters except unreserved ones (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`)
/// are percent-encoded. Space becomes `%20`, never `+`.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The `host` header name, which is always signed.
pub const HOST_HEADER: &str = "host";

/// A logical HTTP request, as seen by the signer.
///
/// Header names are stored lower-cased, so lookups are case-insensitive and
/// the order in which headers were added never reaches the signature.
///
/// # Examples
///
/// ```
/// use signet_auth::canonical::SignableRequest;
///
/// let request = SignableRequest::new("POST", "/")
///     .with_payload("Action=ListUsers&Version=2010-05-08")
///     .with_header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
///     .with_signed_header("Content-Type");
///
/// assert_eq!(
///     request.header("content-type"),
///     Some("application/x-www-form-urlencoded; charset=utf-8")
/// );
/// assert!(request.signed_headers().contains("content-type"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignableRequest {
    method: String,
    path: String,
    query: String,
    payload: Vec<u8>,
    headers: BTreeMap<String, String>,
    signed_headers: BTreeSet<String>,
    host: Option<String>,
}

impl SignableRequest {
    /// Create a request with the given method and path and nothing else.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the raw query string (without the leading `?`).
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Set the request payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Add a header. A repeated name appends the value with a `,`.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
        self
    }

    /// Set a header, discarding any value it already had.
    #[must_use]
    pub fn replace_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_owned());
        self
    }

    /// Add several headers.
    #[must_use]
    pub fn with_headers<'a>(self, headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        headers
            .into_iter()
            .fold(self, |request, (name, value)| request.with_header(name, value))
    }

    /// Mark a header as part of the signature.
    #[must_use]
    pub fn with_signed_header(mut self, name: &str) -> Self {
        self.signed_headers.insert(name.to_ascii_lowercase());
        self
    }

    /// Mark several headers as part of the signature.
    #[must_use]
    pub fn with_signed_headers<'a>(self, names: impl IntoIterator<Item = &'a str>) -> Self {
        names
            .into_iter()
            .fold(self, |request, name| request.with_signed_header(name))
    }

    /// Set the target host, used to fill in `host` when no such header is set.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Look up a header value by name, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All headers, keyed by lower-cased name.
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// The lower-cased names of the headers covered by the signature.
    #[must_use]
    pub fn signed_headers(&self) -> &BTreeSet<String> {
        &self.signed_headers
    }

    /// Return a copy with the mandatory signed headers filled in.
    ///
    /// `host` is always signed; when the request has no `host` header it is
    /// taken from the target set by [`with_host`](Self::with_host). When
    /// `date` is given as `(header_name, timestamp)`, that header is signed
    /// too and filled in from the timestamp if absent. Existing header values
    /// are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingRequiredHeader`] if no host is known.
    pub fn with_mandatory_headers(&self, date: Option<(&str, &str)>) -> Result<Self, AuthError> {
        let mut request = self.clone();

        if !request.headers.contains_key(HOST_HEADER) {
            let host = request
                .host
                .clone()
                .ok_or_else(|| AuthError::MissingRequiredHeader(HOST_HEADER.to_owned()))?;
            request.headers.insert(HOST_HEADER.to_owned(), host);
        }
        request.signed_headers.insert(HOST_HEADER.to_owned());

        if let Some((name, timestamp)) = date {
            let name = name.to_ascii_lowercase();
            request
                .headers
                .entry(name.clone())
                .or_insert_with(|| timestamp.to_owned());
            request.signed_headers.insert(name);
        }

        Ok(request)
    }

    /// Canonicalize the request, hashing the payload with `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingRequiredHeader`] if a header marked for
    /// signing has no value.
    pub fn canonicalize(&self, algorithm: HashAlgorithm) -> Result<CanonicalRequest, AuthError> {
        let payload_hash = algorithm.hash_hex(&self.payload);
        self.canonicalize_with_payload_hash(algorithm, &payload_hash)
    }

    /// Canonicalize the request with a precomputed payload hash.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingRequiredHeader`] if a header marked for
    /// signing has no value.
    pub fn canonicalize_with_payload_hash(
        &self,
        algorithm: HashAlgorithm,
        payload_hash: &str,
    ) -> Result<CanonicalRequest, AuthError> {
        if let Some(missing) = self
            .signed_headers
            .iter()
            .find(|name| !self.headers.contains_key(*name))
        {
            return Err(AuthError::MissingRequiredHeader(missing.clone()));
        }

        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        let signed: Vec<&str> = self.signed_headers.iter().map(String::as_str).collect();

        let text = build_canonical_request(
            &self.method,
            &self.path,
            &self.query,
            &headers,
            &signed,
            payload_hash,
        );
        let hash = algorithm.hash_hex(text.as_bytes());

        Ok(CanonicalRequest { text, hash })
    }
}

/// A canonical request and its hex digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    /// The canonical request text.
    pub text: String,
    /// The hex digest of [`text`](Self::text), the "canonical hash".
    pub hash: String,
}

/// Build the full canonical request string from its components.
///
/// # Examples
///
/// ```
/// use signet_auth::canonical::build_canonical_request;
///
/// let canonical = build_canonical_request(
///     "GET",
///     "/test.txt",
///     "",
///     &[("host", "examplebucket.s3.amazonaws.com")],
///     &["host"],
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
/// );
/// assert!(canonical.starts_with("GET\n/test.txt\n"));
/// ```
#[must_use]
pub fn build_canonical_request(
    method: &str,
    uri: &str,
    query_string: &str,
    headers: &[(&str, &str)],
    signed_headers: &[&str],
    payload_hash: &str,
) -> String {
    let canonical_uri = build_canonical_uri(uri);
    let canonical_query = build_canonical_query_string(query_string);
    let canonical_headers = build_canonical_headers(headers, signed_headers);
    let signed_headers_str = build_signed_headers_string(signed_headers);

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers_str}\n{payload_hash}"
    )
}

/// Build the canonical URI by URI-encoding each path segment individually.
///
/// Forward slashes are preserved and an empty path becomes `/`. Segments are
/// decoded before encoding, so an already-encoded path comes out unchanged.
///
/// # Examples
///
/// ```
/// use signet_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri("/something"), "/something");
/// assert_eq!(build_canonical_uri(""), "/");
/// assert_eq!(build_canonical_uri("/a%20b"), "/a%20b");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(normalize_component)
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the canonical query string.
///
/// Each `name=value` pair is split on the first `=`, both sides are strictly
/// URI-encoded (after decoding any existing escapes), and pairs are sorted by
/// encoded name, then encoded value.
///
/// # Examples
///
/// ```
/// use signet_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(build_canonical_query_string("foo=bar&baz=barbaz"), "baz=barbaz&foo=bar");
/// assert_eq!(build_canonical_query_string("q=a b"), "q=a%20b");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| {
            let (name, value) = param.split_once('=').unwrap_or((param, ""));
            (normalize_component(name), normalize_component(value))
        })
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers block from the request headers.
///
/// Only headers listed in `signed_headers` are included. Header names are
/// lowercased, values are trimmed and runs of whitespace collapse to a single
/// space. Headers are sorted by name. Repeated headers are joined with `,`.
///
/// The result does not end in a newline; [`build_canonical_request`] adds the
/// separator.
///
/// # Examples
///
/// ```
/// use signet_auth::canonical::build_canonical_headers;
///
/// let result = build_canonical_headers(
///     &[("X-Amz-Date", "20110909T233600Z"), ("Host", "iam.amazonaws.com")],
///     &["host", "x-amz-date"],
/// );
/// assert_eq!(result, "host:iam.amazonaws.com\nx-amz-date:20110909T233600Z");
/// ```
#[must_use]
pub fn build_canonical_headers(headers: &[(&str, &str)], signed_headers: &[&str]) -> String {
    let mut header_map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let lower_name = name.to_ascii_lowercase();
        let trimmed_value = collapse_whitespace(value.trim());
        header_map
            .entry(lower_name)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&trimmed_value);
            })
            .or_insert(trimmed_value);
    }

    let sorted_signed = sorted_lowercase(signed_headers);

    sorted_signed
        .iter()
        .filter_map(|name| header_map.get(name).map(|value| format!("{name}:{value}")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the signed headers string: lowercase names, sorted, `;`-joined.
///
/// # Examples
///
/// ```
/// use signet_auth::canonical::build_signed_headers_string;
///
/// assert_eq!(
///     build_signed_headers_string(&["X-Amz-Date", "host", "Content-Type"]),
///     "content-type;host;x-amz-date"
/// );
/// ```
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    sorted_lowercase(signed_headers).join(";")
}

/// Strictly URI-encode a string: everything but unreserved characters.
#[must_use]
pub fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

/// Decode any existing escapes, then re-encode strictly.
fn normalize_component(component: &str) -> String {
    let decoded = percent_decode_str(component).decode_utf8_lossy();
    uri_encode(&decoded)
}

fn sorted_lowercase(names: &[&str]) -> Vec<String> {
    let set: BTreeSet<String> = names.iter().map(|name| name.to_ascii_lowercase()).collect();
    set.into_iter().collect()
}

/// Collapse consecutive whitespace characters in a string to a single space.
fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = "Action=ListUsers&Version=2010-05-08";
    const CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

    fn list_users_request() -> SignableRequest {
        SignableRequest::new("POST", "/")
            .with_payload(PAYLOAD)
            .with_headers([
                ("Content-Type", CONTENT_TYPE),
                ("Host", "iam.amazonaws.com"),
                ("X-Amz-Date", "20110909T233600Z"),
            ])
            .with_signed_headers(["Content-Type", "Host", "X-Amz-Date"])
    }

    #[test]
    fn test_should_generate_canonical_hash_for_list_users_request() {
        let canonical = list_users_request()
            .canonicalize(HashAlgorithm::Sha256)
            .unwrap();

        let expected = "POST\n\
                        /\n\
                        \n\
                        content-type:application/x-www-form-urlencoded; charset=utf-8\n\
                        host:iam.amazonaws.com\n\
                        x-amz-date:20110909T233600Z\n\
                        \n\
                        content-type;host;x-amz-date\n\
                        b6359072c78d70ebee1e81adcbab4f01bf2c23245fa365ef83fe8f1f955085e2";
        assert_eq!(canonical.text, expected);
        assert_eq!(
            canonical.hash,
            "3511de7e95d28ecd39e9513b642aee07e54f4941150d8df8bf94b328ef7e55e2"
        );
    }

    #[test]
    fn test_should_ignore_header_insertion_order_and_case() {
        let reordered = SignableRequest::new("POST", "/")
            .with_payload(PAYLOAD)
            .with_headers([
                ("x-amz-date", "20110909T233600Z"),
                ("HOST", "iam.amazonaws.com"),
                ("content-type", CONTENT_TYPE),
            ])
            .with_signed_headers(["x-amz-date", "content-type", "host"]);

        assert_eq!(
            reordered.canonicalize(HashAlgorithm::Sha256).unwrap(),
            list_users_request().canonicalize(HashAlgorithm::Sha256).unwrap()
        );
    }

    #[test]
    fn test_should_fail_when_signed_header_has_no_value() {
        let request = SignableRequest::new("GET", "/")
            .with_header("Host", "example.com")
            .with_signed_headers(["host", "x-missing"]);

        let result = request.canonicalize(HashAlgorithm::Sha256);
        assert!(matches!(result, Err(AuthError::MissingRequiredHeader(name)) if name == "x-missing"));
    }

    #[test]
    fn test_should_inject_host_and_date_headers() {
        let request = SignableRequest::new("POST", "/")
            .with_header("Content-Type", CONTENT_TYPE)
            .with_signed_header("Content-Type")
            .with_host("iam.amazonaws.com");

        let prepared = request
            .with_mandatory_headers(Some(("X-Amz-Date", "20110909T233600Z")))
            .unwrap();

        assert_eq!(prepared.header("host"), Some("iam.amazonaws.com"));
        assert_eq!(prepared.header("x-amz-date"), Some("20110909T233600Z"));
        let signed: Vec<&str> = prepared.signed_headers().iter().map(String::as_str).collect();
        assert_eq!(signed, ["content-type", "host", "x-amz-date"]);

        // The caller's request is left untouched.
        assert_eq!(request.header("host"), None);
        assert_eq!(request.signed_headers().len(), 1);
    }

    #[test]
    fn test_should_keep_existing_mandatory_header_values() {
        let request = SignableRequest::new("GET", "/")
            .with_header("Host", "api.example.com")
            .with_header("X-Amz-Date", "20110909T233600Z")
            .with_host("ignored.example.com");

        let prepared = request
            .with_mandatory_headers(Some(("x-amz-date", "20000101T000000Z")))
            .unwrap();

        assert_eq!(prepared.header("host"), Some("api.example.com"));
        assert_eq!(prepared.header("x-amz-date"), Some("20110909T233600Z"));
    }

    #[test]
    fn test_should_fail_injection_without_host() {
        let request = SignableRequest::new("GET", "/");
        let result = request.with_mandatory_headers(None);
        assert!(matches!(result, Err(AuthError::MissingRequiredHeader(name)) if name == "host"));
    }

    #[test]
    fn test_should_join_repeated_header_values() {
        let request = SignableRequest::new("GET", "/")
            .with_header("X-Multi", "a")
            .with_header("x-multi", "b");
        assert_eq!(request.header("X-MULTI"), Some("a,b"));
    }

    #[test]
    fn test_should_normalize_empty_path_to_slash() {
        assert_eq!(build_canonical_uri(""), "/");
        assert_eq!(build_canonical_uri("/"), "/");
    }

    #[test]
    fn test_should_encode_special_characters_in_path() {
        assert_eq!(build_canonical_uri("/hello world"), "/hello%20world");
        assert_eq!(build_canonical_uri("/hello%20world"), "/hello%20world");
    }

    #[test]
    fn test_should_sort_and_encode_query_parameters() {
        assert_eq!(build_canonical_query_string("b=2&a=1&c=3"), "a=1&b=2&c=3");
        assert_eq!(build_canonical_query_string("key=a+b c"), "key=a%2Bb%20c");
        assert_eq!(build_canonical_query_string("flag"), "flag=");
    }

    #[test]
    fn test_should_not_double_encode_query_values() {
        let query = "X-EMS-Credentials=th3K3y%2F20110511%2Fus-east-1%2Fhost%2Faws4_request";
        assert_eq!(build_canonical_query_string(query), query);
        assert_eq!(
            build_canonical_query_string("X-EMS-Credentials=th3K3y/20110511/us-east-1/host/aws4_request"),
            query
        );
    }

    #[test]
    fn test_should_sort_duplicate_query_keys_by_value() {
        let query = "events=b&events=a&prefix=p";
        assert_eq!(build_canonical_query_string(query), "events=a&events=b&prefix=p");
    }

    #[test]
    fn test_should_collapse_whitespace_in_header_values() {
        let headers = [("Host", "  example.com  "), ("X-Custom", "a   b \t c")];
        let result = build_canonical_headers(&headers, &["host", "x-custom"]);
        assert_eq!(result, "host:example.com\nx-custom:a b c");
    }

    #[test]
    fn test_should_build_canonical_request_matching_aws_example() {
        let headers = [
            ("host", "examplebucket.s3.amazonaws.com"),
            ("range", "bytes=0-9"),
            (
                "x-amz-content-sha256",
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            ),
            ("x-amz-date", "20130524T000000Z"),
        ];
        let signed_headers = ["host", "range", "x-amz-content-sha256", "x-amz-date"];

        let canonical = build_canonical_request(
            "GET",
            "/test.txt",
            "",
            &headers,
            &signed_headers,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        );

        assert_eq!(
            HashAlgorithm::Sha256.hash_hex(canonical.as_bytes()),
            "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972"
        );
    }
}
