//! Luhn (mod 10) checksum used by the PAN validator.
//!
//! Every second digit counted from the right is doubled, doubled values
//! above 9 are folded by subtracting 9, and the total must be a multiple
//! of 10. Only complete PANs are checked; a partial PAN never needs to
//! pass Luhn to stay `partial`.

/// Doubled digit with the fold applied, indexed by the digit.
const DOUBLE_TABLE: [u8; 10] = [0, 2, 4, 6, 8, 1, 3, 5, 7, 9];

/// Checks a PAN given as text.
///
/// Returns `false` for empty text and for text containing anything other
/// than ASCII digits. Callers strip formatting spaces first.
///
/// # Example
///
/// ```
/// use access_checkout::luhn::is_luhn_valid;
///
/// assert!(is_luhn_valid("4111111111111111"));
/// assert!(!is_luhn_valid("4111111111111112"));
/// assert!(!is_luhn_valid(""));
/// assert!(!is_luhn_valid("4111 1111"));
/// ```
pub fn is_luhn_valid(pan: &str) -> bool {
    match to_digits(pan) {
        Some(digits) => validate(&digits),
        None => false,
    }
}

/// Converts an all-digit string into digit values.
///
/// Returns `None` if the text is empty or holds a non-digit character.
pub fn to_digits(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() {
        return None;
    }

    text.bytes()
        .map(|b| if b.is_ascii_digit() { Some(b - b'0') } else { None })
        .collect()
}

/// Validates a digit sequence using the Luhn algorithm.
///
/// # Arguments
///
/// * `digits` - Digit values (0-9), most significant first.
///
/// # Returns
///
/// `true` if the checksum is a multiple of 10. An empty slice is never valid.
///
/// # Example
///
/// ```
/// use access_checkout::luhn::validate;
///
/// let digits = [4, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1];
/// assert!(validate(&digits));
///
/// let invalid = [4, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2];
/// assert!(!validate(&invalid));
/// ```
#[inline]
pub fn validate(digits: &[u8]) -> bool {
    if digits.is_empty() {
        return false;
    }

    compute_checksum(digits) % 10 == 0
}

/// Computes the Luhn sum (before the modulo) for a digit sequence.
#[inline]
pub fn compute_checksum(digits: &[u8]) -> u32 {
    digits
        .iter()
        .rev()
        .enumerate()
        .map(|(position, &digit)| {
            if position % 2 == 1 {
                DOUBLE_TABLE[digit as usize] as u32
            } else {
                digit as u32
            }
        })
        .sum()
}

/// Computes the check digit that makes `digits` followed by it Luhn-valid.
///
/// Used to build valid PANs for a given prefix in tests and benches.
///
/// # Example
///
/// ```
/// use access_checkout::luhn::generate_check_digit;
///
/// let partial = [4, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1];
/// assert_eq!(generate_check_digit(&partial), 1);
/// ```
#[inline]
pub fn generate_check_digit(digits: &[u8]) -> u8 {
    // Every existing digit moves one place left once the check digit is
    // appended, so the doubling parity flips.
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(position, &digit)| {
            if position % 2 == 0 {
                DOUBLE_TABLE[digit as usize] as u32
            } else {
                digit as u32
            }
        })
        .sum();

    ((10 - (sum % 10)) % 10) as u8
}
