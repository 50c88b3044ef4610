//! Timestamps and the date-tolerance check.
//!
//! Timestamps use the ISO 8601 basic format `YYYYMMDDTHHMMSSZ`; credential
//! dates use `YYYYMMDD`.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::error::AuthError;

/// Format of full timestamps, e.g. `20110909T233600Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Format of credential dates, e.g. `20110909`.
pub const SHORT_DATE_FORMAT: &str = "%Y%m%d";

/// Default maximum distance between request and header timestamps.
pub const DEFAULT_DATE_TOLERANCE_SECS: u64 = 300;

/// Parse a `YYYYMMDDTHHMMSSZ` timestamp.
///
/// # Errors
///
/// Returns [`AuthError::InvalidArgument`] if the timestamp does not match the format.
pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, AuthError> {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| AuthError::InvalidArgument(format!("invalid timestamp: {timestamp}")))
}

/// Format a date-time as `YYYYMMDDTHHMMSSZ`.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use signet_auth::date::format_timestamp;
///
/// let date_time = Utc.with_ymd_and_hms(2011, 5, 11, 12, 0, 0).unwrap();
/// assert_eq!(format_timestamp(&date_time), "20110511T120000Z");
/// ```
#[must_use]
pub fn format_timestamp(date_time: &DateTime<Utc>) -> String {
    date_time.format(TIMESTAMP_FORMAT).to_string()
}

/// Format a date-time as `YYYYMMDD`.
#[must_use]
pub fn format_short_date(date_time: &DateTime<Utc>) -> String {
    date_time.format(SHORT_DATE_FORMAT).to_string()
}

/// Checks that a request's timestamps and credential date agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValidator {
    tolerance_secs: u64,
}

impl Default for DateValidator {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_TOLERANCE_SECS)
    }
}

impl DateValidator {
    /// Create a validator accepting up to `tolerance_secs` of clock skew.
    #[must_use]
    pub fn new(tolerance_secs: u64) -> Self {
        Self { tolerance_secs }
    }

    /// The accepted clock skew in seconds.
    #[must_use]
    pub fn tolerance_secs(&self) -> u64 {
        self.tolerance_secs
    }

    /// Validate the three dates of a request.
    ///
    /// Returns `true` when both timestamps parse, the header timestamp is
    /// within the tolerance of the request timestamp (in either direction),
    /// and the credential date equals the date part of the header timestamp.
    /// Any mismatch yields `false`; the caller decides whether that is fatal.
    ///
    /// # Examples
    ///
    /// ```
    /// use signet_auth::date::DateValidator;
    ///
    /// let validator = DateValidator::default();
    /// assert!(validator.validate_dates("20110909T233600Z", "20110909T233200Z", "20110909"));
    /// assert!(!validator.validate_dates("20110909T233600Z", "20110909T232500Z", "20110909"));
    /// ```
    #[must_use]
    pub fn validate_dates(
        &self,
        request_timestamp: &str,
        header_timestamp: &str,
        credential_short_date: &str,
    ) -> bool {
        let (Ok(request_time), Ok(header_time)) = (
            parse_timestamp(request_timestamp),
            parse_timestamp(header_timestamp),
        ) else {
            debug!(request_timestamp, header_timestamp, "Unparseable timestamp");
            return false;
        };

        let skew = (request_time - header_time).num_seconds().unsigned_abs();
        if skew > self.tolerance_secs {
            debug!(
                skew,
                tolerance = self.tolerance_secs,
                "Request timestamp outside the accepted window"
            );
            return false;
        }

        if header_timestamp.get(..8) != Some(credential_short_date) {
            debug!(
                header_timestamp,
                credential_short_date, "Credential date does not match header date"
            );
            return false;
        }

        true
    }
}

/// Validate dates with the default tolerance.
///
/// See [`DateValidator::validate_dates`].
#[must_use]
pub fn validate_dates(
    request_timestamp: &str,
    header_timestamp: &str,
    credential_short_date: &str,
) -> bool {
    DateValidator::default().validate_dates(
        request_timestamp,
        header_timestamp,
        credential_short_date,
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_should_reject_dates_too_far_apart() {
        assert!(!validate_dates("20110909T233600Z", "20110909T232500Z", "20110909"));
    }

    #[test]
    fn test_should_accept_dates_within_tolerance() {
        assert!(validate_dates("20110909T233600Z", "20110909T233200Z", "20110909"));
    }

    #[test]
    fn test_should_accept_header_ahead_of_request() {
        assert!(validate_dates("20110909T233600Z", "20110909T234000Z", "20110909"));
    }

    #[test]
    fn test_should_honour_configured_tolerance() {
        let lenient = DateValidator::new(900);
        assert!(lenient.validate_dates("20110909T233600Z", "20110909T232500Z", "20110909"));

        let strict = DateValidator::new(60);
        assert!(!strict.validate_dates("20110909T233600Z", "20110909T233200Z", "20110909"));
    }

    #[test]
    fn test_should_accept_skew_exactly_at_tolerance() {
        let validator = DateValidator::new(240);
        assert!(validator.validate_dates("20110909T233600Z", "20110909T233200Z", "20110909"));
    }

    #[test]
    fn test_should_reject_mismatched_credential_date() {
        assert!(!validate_dates("20110909T233600Z", "20110909T233200Z", "20110908"));
    }

    #[test]
    fn test_should_reject_unparseable_timestamps() {
        assert!(!validate_dates("garbage", "20110909T233200Z", "20110909"));
        assert!(!validate_dates("20110909T233600Z", "2011-09-09T23:32:00Z", "20110909"));
    }

    #[test]
    fn test_should_round_trip_timestamp() {
        let date_time = Utc.with_ymd_and_hms(2011, 9, 9, 23, 36, 0).unwrap();
        let formatted = format_timestamp(&date_time);
        assert_eq!(formatted, "20110909T233600Z");
        assert_eq!(parse_timestamp(&formatted).unwrap(), date_time);
        assert_eq!(format_short_date(&date_time), "20110909");
    }
}
