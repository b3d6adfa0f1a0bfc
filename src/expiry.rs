//! Expiry date validation, sanitising and parsing.
//!
//! Dates are typed as `MM/YY`. A two-digit year is inflated with the
//! current century, so `30` read in 2026 is 2030. A card stays valid until
//! the last millisecond of its expiry month.
//!
//! # Example
//!
//! ```
//! use access_checkout::{expiry, CardConfiguration};
//! use chrono::{TimeZone, Utc};
//!
//! let config = CardConfiguration::default();
//! let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
//!
//! assert!(expiry::validate_expiry("10", "26", &config, &now).complete);
//! assert!(!expiry::validate_expiry("09", "26", &config, &now).complete);
//! assert!(expiry::validate_expiry("1", "", &config, &now).partial);
//!
//! assert_eq!(expiry::sanitise_expiry_date("1130"), "11/30");
//! assert_eq!(expiry::sanitise_expiry_date("2"), "02/");
//! ```

use crate::card::CardConfiguration;
use crate::rule::ValidationResult;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};
use std::fmt;

/// How far ahead an expiry date may lie before it is rejected.
///
/// Two-digit years are read in the current century, so with this horizon
/// `01/99` stays invalid only while "now" is before 2079. From 2079 on,
/// 2099 is within 20 years and the date validates. Pass `None` as the
/// horizon to [`validate_expiry_with_options`] to accept any future year.
pub const DEFAULT_MAX_YEARS_AHEAD: u32 = 20;

/// Separator between month and year.
pub const SEPARATOR: char = '/';

/// Validates an expiry month and two-digit year.
///
/// Uses [`DEFAULT_MAX_YEARS_AHEAD`]. See
/// [`validate_expiry_with_options`] for the rules.
#[inline]
pub fn validate_expiry<Tz: TimeZone>(
    month: &str,
    year: &str,
    config: &CardConfiguration,
    now: &DateTime<Tz>,
) -> ValidationResult {
    validate_expiry_with_options(month, year, config, now, Some(DEFAULT_MAX_YEARS_AHEAD))
}

/// Validates an expiry month and two-digit year.
///
/// # Arguments
///
/// * `month` - Month text: `""`, `"0"`, `"1"` or `"01"` to `"12"`.
/// * `year` - Two-digit year text.
/// * `config` - Supplies the month and year rules.
/// * `now` - The current time; its time zone decides when a month ends.
/// * `max_years_ahead` - Reject dates further out than this, if set.
///
/// # Returns
///
/// - Blank or single-digit `0`/`1` months are partial only.
/// - A month the rule rejects, or a year that is not two digits, is not
///   complete.
/// - A full date is complete when its month has not ended and it is not
///   too far ahead; otherwise it is neither partial nor complete.
pub fn validate_expiry_with_options<Tz: TimeZone>(
    month: &str,
    year: &str,
    config: &CardConfiguration,
    now: &DateTime<Tz>,
    max_years_ahead: Option<u32>,
) -> ValidationResult {
    let defaults = config.defaults();
    let month_result = if month.is_empty() {
        ValidationResult::new(true, false)
    } else {
        defaults.month.validate(month)
    };
    let year_result = if year.is_empty() {
        ValidationResult::new(true, false)
    } else {
        defaults.year.validate(year)
    };

    if !month_result.complete || !year_result.complete {
        return ValidationResult::new(month_result.partial && year_result.partial, false);
    }

    let (Ok(month), Ok(year)) = (month.parse::<u32>(), year.parse::<i32>()) else {
        return ValidationResult::INVALID;
    };

    let now = now.naive_local();
    let full_year = now.year() / 100 * 100 + year;

    let Some(end_of_month) = end_of_month(full_year, month) else {
        return ValidationResult::INVALID;
    };
    if end_of_month < now {
        return ValidationResult::INVALID;
    }

    if let Some(max) = max_years_ahead {
        if full_year > now.year() + max as i32 {
            return ValidationResult::INVALID;
        }
    }

    ValidationResult::new(true, true)
}

/// Validates a whole `MM/YY` field.
///
/// Text without a separator is treated as the month alone.
pub fn validate_expiry_date<Tz: TimeZone>(
    expiry_date: &str,
    config: &CardConfiguration,
    now: &DateTime<Tz>,
) -> ValidationResult {
    let (month, year) = split_expiry_date(expiry_date);
    validate_expiry(month, year, config, now)
}

/// Splits `MM/YY` into month and year text.
#[inline]
pub fn split_expiry_date(expiry_date: &str) -> (&str, &str) {
    expiry_date.split_once(SEPARATOR).unwrap_or((expiry_date, ""))
}

/// Whether the field should still accept input.
///
/// Returns `false` once both month and year are complete.
pub fn can_update(month: &str, year: &str, config: &CardConfiguration) -> bool {
    let defaults = config.defaults();
    !(defaults.month.validate(month).complete && defaults.year.validate(year).complete)
}

/// Last millisecond of `month` in `year`.
fn end_of_month(year: i32, month: u32) -> Option<chrono::NaiveDateTime> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.and_hms_opt(0, 0, 0)?;
    Some(first_of_next - Duration::milliseconds(1))
}

/// Rewrites typed text into `MM/YY` form.
///
/// - Separators and other non-digits are dropped and the separator is
///   re-inserted after the month.
/// - A leading digit from 2 to 9 is a whole month: `2` becomes `02/`.
/// - A two-digit month above 12 keeps only its first digit: `13` becomes
///   `01/3`.
/// - The result is cut to five characters.
/// - Blank text is returned unchanged.
///
/// # Example
///
/// ```
/// use access_checkout::expiry::sanitise_expiry_date;
///
/// assert_eq!(sanitise_expiry_date("1"), "1");
/// assert_eq!(sanitise_expiry_date("12"), "12/");
/// assert_eq!(sanitise_expiry_date("13"), "01/3");
/// assert_eq!(sanitise_expiry_date("a2/29"), "02/29");
/// assert_eq!(sanitise_expiry_date("2240"), "02/24");
/// ```
pub fn sanitise_expiry_date(text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }

    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    let bytes = digits.as_bytes();

    let (month, year) = match bytes {
        [] => return String::new(),
        [first] if *first >= b'2' => (format!("0{}", *first as char), ""),
        [only] => return (*only as char).to_string(),
        [first, second, ..] => {
            let value = (first - b'0') * 10 + (second - b'0');
            if value >= 13 {
                (format!("0{}", *first as char), &digits[1..])
            } else {
                (digits[..2].to_string(), &digits[2..])
            }
        }
    };

    let mut sanitised = format!("{month}{SEPARATOR}{year}");
    sanitised.truncate(5);
    sanitised
}

/// A card's expiry month and four-digit year, as sent in session requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpiryDate {
    month: u32,
    year: u32,
}

impl ExpiryDate {
    /// Creates an expiry date. Returns `None` if the month is not 1 to 12.
    pub fn new(month: u32, year: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { month, year })
    }

    /// Parses `MM/YY` or `MMYY`. The year is taken as 2000 + YY.
    ///
    /// # Errors
    ///
    /// Returns [`ExpiryError`] unless the text is four digits with an
    /// optional separator after the month.
    ///
    /// # Example
    ///
    /// ```
    /// use access_checkout::expiry::ExpiryDate;
    ///
    /// let date = ExpiryDate::parse("12/30").unwrap();
    /// assert_eq!((date.month(), date.year()), (12, 2030));
    /// assert_eq!(ExpiryDate::parse("0430").unwrap().month(), 4);
    /// assert!(ExpiryDate::parse("4/30").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, ExpiryError> {
        let trimmed = text.trim();
        let compact: String = trimmed.chars().filter(|&c| c != SEPARATOR).collect();

        let well_formed = compact.len() == 4
            && compact.bytes().all(|b| b.is_ascii_digit())
            && trimmed.find(SEPARATOR).map_or(true, |at| at == 2)
            && trimmed.matches(SEPARATOR).count() <= 1;
        if !well_formed {
            return Err(ExpiryError::InvalidFormat(text.to_string()));
        }

        let invalid = || ExpiryError::InvalidFormat(text.to_string());
        let month: u32 = compact[..2].parse().map_err(|_| invalid())?;
        let year: u32 = compact[2..].parse().map_err(|_| invalid())?;

        Self::new(month, 2000 + year).ok_or(ExpiryError::InvalidMonth(month))
    }

    /// Month, 1 to 12.
    #[inline]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Four-digit year.
    #[inline]
    pub const fn year(&self) -> u32 {
        self.year
    }
}

impl fmt::Display for ExpiryDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.year % 100)
    }
}

/// Errors from [`ExpiryDate::parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpiryError {
    /// Not `MM/YY` or `MMYY`.
    #[error("expecting expiry date in format MM/YY or MMYY but found {0}")]
    InvalidFormat(String),
    /// Month outside 1 to 12.
    #[error("invalid expiry month: {0}")]
    InvalidMonth(u32),
}
