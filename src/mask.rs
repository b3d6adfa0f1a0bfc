//! Masking of card data for logs and `Debug` output.
//!
//! Only the last four PAN digits may ever be shown. CVCs are never shown,
//! not even their length beyond what a fixed-width mask reveals.

const MASK: char = '*';
const VISIBLE_DIGITS: usize = 4;

/// Masks a PAN, keeping its last four digits.
///
/// Non-digits are dropped first. PANs of four digits or fewer are masked
/// entirely.
///
/// # Example
///
/// ```
/// use access_checkout::mask::mask_pan;
///
/// assert_eq!(mask_pan("4111 1111 1111 1111"), "************1111");
/// assert_eq!(mask_pan("4111"), "****");
/// assert_eq!(mask_pan(""), "");
/// ```
pub fn mask_pan(pan: &str) -> String {
    let digits: Vec<char> = pan.chars().filter(char::is_ascii_digit).collect();
    let len = digits.len();

    if len <= VISIBLE_DIGITS {
        return MASK.to_string().repeat(len);
    }

    let mut masked = String::with_capacity(len);
    masked.extend(std::iter::repeat(MASK).take(len - VISIBLE_DIGITS));
    masked.extend(&digits[len - VISIBLE_DIGITS..]);
    masked
}

/// Masks a secret of any kind with a fixed-width mask.
#[inline]
pub fn mask_secret(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

/// Last four digits of a PAN, or an empty string if it has fewer.
#[inline]
pub fn last_four(pan: &str) -> String {
    let digits: Vec<char> = pan.chars().filter(char::is_ascii_digit).collect();
    if digits.len() >= VISIBLE_DIGITS {
        digits[digits.len() - VISIBLE_DIGITS..].iter().collect()
    } else {
        String::new()
    }
}
