//! Credential scopes, access keys and secret lookup.
//!
//! [`Credentials`] is the date-bound scope that both the signer and verifier
//! feed into key derivation. [`AccessKey`] pairs an access key ID with its
//! secret on the signing side. On the verifying side, [`CredentialProvider`]
//! resolves secrets by access key ID; [`StaticCredentialProvider`] is an
//! in-memory implementation for tests and development.

use std::collections::HashMap;
use std::fmt;

use zeroize::Zeroizing;

use crate::error::AuthError;

/// An access key ID, the date it is used on, and the ordered scope parts.
///
/// The scope string is `short_date/part0/part1/...`; the credential string
/// sent over the wire is `access_key_id/scope`.
///
/// # Examples
///
/// ```
/// use signet_auth::credentials::Credentials;
///
/// let credentials =
///     Credentials::new("20110909T233600Z", "AKIDEXAMPLE", &["us-east-1", "iam", "aws4_request"])
///         .unwrap();
/// assert_eq!(credentials.short_date(), "20110909");
/// assert_eq!(credentials.scope(), "20110909/us-east-1/iam/aws4_request");
/// assert_eq!(
///     credentials.credential(),
///     "AKIDEXAMPLE/20110909/us-east-1/iam/aws4_request"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    short_date: String,
    access_key_id: String,
    scope_parts: Vec<String>,
}

impl Credentials {
    /// Create credentials from a date, access key ID and scope parts.
    ///
    /// `date` may be a short date (`YYYYMMDD`) or anything starting with one,
    /// such as a full `YYYYMMDDTHHMMSSZ` timestamp; only the first eight
    /// characters are kept.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidArgument`] if the date does not start with
    /// eight digits, the access key ID is empty or contains `/`, or the scope
    /// is empty or has an empty part or a part containing `/`.
    pub fn new<S: AsRef<str>>(
        date: &str,
        access_key_id: &str,
        scope_parts: &[S],
    ) -> Result<Self, AuthError> {
        let short_date = date
            .get(..8)
            .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| AuthError::InvalidArgument(format!("invalid credential date: {date}")))?;

        if access_key_id.is_empty() || access_key_id.contains('/') {
            return Err(AuthError::InvalidArgument(
                "access key ID must be non-empty and must not contain '/'".to_owned(),
            ));
        }

        if scope_parts.is_empty() {
            return Err(AuthError::InvalidArgument(
                "credential scope must have at least one part".to_owned(),
            ));
        }

        let scope_parts: Vec<String> = scope_parts
            .iter()
            .map(|part| {
                let part = part.as_ref();
                if part.is_empty() || part.contains('/') {
                    Err(AuthError::InvalidArgument(format!(
                        "invalid credential scope part: {part:?}"
                    )))
                } else {
                    Ok(part.to_owned())
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            short_date: short_date.to_owned(),
            access_key_id: access_key_id.to_owned(),
            scope_parts,
        })
    }

    /// Parse a wire credential string `AKID/date/part0/part1/...`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredential`] if the string has fewer than
    /// three segments or any segment is invalid.
    pub fn parse(credential: &str) -> Result<Self, AuthError> {
        let mut segments = credential.split('/');
        let access_key_id = segments.next().ok_or(AuthError::InvalidCredential)?;
        let date = segments.next().ok_or(AuthError::InvalidCredential)?;
        let scope_parts: Vec<&str> = segments.collect();

        if date.len() != 8 {
            return Err(AuthError::InvalidCredential);
        }

        Self::new(date, access_key_id, &scope_parts).map_err(|_| AuthError::InvalidCredential)
    }

    /// The `YYYYMMDD` date the credentials are bound to.
    #[must_use]
    pub fn short_date(&self) -> &str {
        &self.short_date
    }

    /// The access key ID.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The scope parts that follow the date, in signing order.
    #[must_use]
    pub fn scope_parts(&self) -> &[String] {
        &self.scope_parts
    }

    /// The credential scope: `short_date/part0/part1/...`.
    #[must_use]
    pub fn scope(&self) -> String {
        let mut scope = self.short_date.clone();
        for part in &self.scope_parts {
            scope.push('/');
            scope.push_str(part);
        }
        scope
    }

    /// The wire credential: `access_key_id/scope`.
    #[must_use]
    pub fn credential(&self) -> String {
        format!("{}/{}", self.access_key_id, self.scope())
    }
}

/// An access key ID together with its secret.
///
/// The secret is zeroized on drop and never shown by `Debug`.
#[derive(Clone)]
pub struct AccessKey {
    access_key_id: String,
    secret_key: Zeroizing<String>,
}

impl AccessKey {
    /// Create an access key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidArgument`] if either value is empty.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let access_key_id = access_key_id.into();
        let secret_key = Zeroizing::new(secret_key.into());
        if access_key_id.is_empty() {
            return Err(AuthError::InvalidArgument("access key ID is empty".to_owned()));
        }
        if secret_key.is_empty() {
            return Err(AuthError::InvalidArgument("secret key is empty".to_owned()));
        }
        Ok(Self {
            access_key_id,
            secret_key,
        })
    }

    /// The access key ID.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret key.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Trait for looking up secret keys by access key ID.
///
/// Implementations may back this with a database, configuration file,
/// or any other credential store.
pub trait CredentialProvider: Send + Sync {
    /// Retrieve the secret key for the given access key ID.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccessKeyNotFound`] if the access key ID is not recognized.
    fn get_secret_key(&self, access_key_id: &str) -> Result<String, AuthError>;
}

/// A simple in-memory credential provider backed by a `HashMap`.
///
/// # Examples
///
/// ```
/// use signet_auth::credentials::{CredentialProvider, StaticCredentialProvider};
///
/// let provider = StaticCredentialProvider::new(vec![
///     ("th3K3y".to_owned(), "very_secure".to_owned()),
/// ]);
///
/// assert_eq!(provider.get_secret_key("th3K3y").unwrap(), "very_secure");
/// assert!(provider.get_secret_key("unknown").is_err());
/// ```
#[derive(Clone)]
pub struct StaticCredentialProvider {
    credentials: HashMap<String, Zeroizing<String>>,
}

impl StaticCredentialProvider {
    /// Create a provider from an iterable of (access_key_id, secret_key) pairs.
    pub fn new(credentials: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            credentials: credentials
                .into_iter()
                .map(|(id, secret)| (id, Zeroizing::new(secret)))
                .collect(),
        }
    }
}

impl fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentialProvider")
            .field("access_key_ids", &self.credentials.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get_secret_key(&self, access_key_id: &str) -> Result<String, AuthError> {
        self.credentials
            .get(access_key_id)
            .map(|secret| secret.as_str().to_owned())
            .ok_or_else(|| AuthError::AccessKeyNotFound(access_key_id.to_owned()))
    }
}
