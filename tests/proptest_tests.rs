//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for all inputs,
//! helping discover edge cases that manual tests might miss.

use access_checkout::expiry::{sanitise_expiry_date, validate_expiry, validate_expiry_date};
use access_checkout::format::{format_pan, strip_formatting, SEPARATOR};
use access_checkout::{
    detect, luhn, mask, validate_cvc, validate_pan, CardConfiguration,
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

// =============================================================================
// STRATEGIES
// =============================================================================

/// Generates a random digit string of a given length.
fn digit_string(len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(prop::char::range('0', '9'), len)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Generates a random digit string of a length within range.
fn digit_string_range(range: std::ops::RangeInclusive<usize>) -> impl Strategy<Value = String> {
    range.prop_flat_map(digit_string)
}

/// Brand name, a prefix only that brand claims, and a valid length.
fn brand_prefix() -> impl Strategy<Value = (&'static str, &'static str, usize)> {
    prop_oneof![
        Just(("visa", "41", 16)),
        Just(("visa", "42", 13)),
        Just(("mastercard", "51", 16)),
        Just(("mastercard", "55", 16)),
        Just(("mastercard", "2221", 16)),
        Just(("amex", "34", 15)),
        Just(("amex", "37", 15)),
        Just(("jcb", "3528", 16)),
        Just(("jcb", "3589", 19)),
        Just(("discover", "6011", 16)),
        Just(("discover", "65", 19)),
        Just(("diners", "36", 14)),
        Just(("diners", "300", 16)),
        Just(("maestro", "6759", 16)),
        Just(("maestro", "493698", 12)),
    ]
}

/// A Luhn-valid PAN with the given prefix and length.
fn pan_for(prefix: &str, length: usize, filler: &str) -> String {
    let mut body: String = prefix.to_string();
    body.push_str(&filler[..length - prefix.len() - 1]);

    let digits: Vec<u8> = body.bytes().map(|b| b - b'0').collect();
    body.push(char::from(b'0' + luhn::generate_check_digit(&digits)));
    body
}

/// Reference Luhn check written out step by step.
fn reference_luhn(pan: &str) -> bool {
    if pan.is_empty() || !pan.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let mut sum = 0;
    for (i, b) in pan.bytes().rev().enumerate() {
        let mut d = u32::from(b - b'0');
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

// =============================================================================
// LUHN ALGORITHM PROPERTIES
// =============================================================================

proptest! {
    /// Property: the Luhn check agrees with a plain reference implementation.
    #[test]
    fn luhn_matches_reference(pan in digit_string_range(1..=19)) {
        prop_assert_eq!(luhn::is_luhn_valid(&pan), reference_luhn(&pan));
    }

    /// Property: appending the generated check digit always passes.
    #[test]
    fn check_digit_makes_valid(digits in proptest::collection::vec(0u8..10, 1..19)) {
        let check = luhn::generate_check_digit(&digits);
        prop_assert!(check <= 9);

        let mut full = digits;
        full.push(check);
        prop_assert!(luhn::validate(&full));
    }

    /// Property: changing one digit always breaks the checksum.
    #[test]
    fn single_digit_change_detected(
        pan in digit_string(16),
        position in 0usize..16,
        delta in 1u8..10,
    ) {
        let mut digits: Vec<u8> = pan.bytes().map(|b| b - b'0').collect();
        let check = luhn::generate_check_digit(&digits[..15]);
        digits[15] = check;
        prop_assert!(luhn::validate(&digits));

        digits[position] = (digits[position] + delta) % 10;
        prop_assert!(!luhn::validate(&digits));
    }

    /// Property: anything with a non-digit fails.
    #[test]
    fn non_digits_fail_luhn(pan in "[0-9]{0,8}[a-zA-Z -][0-9]{0,8}") {
        prop_assert!(!luhn::is_luhn_valid(&pan));
    }
}

// =============================================================================
// BRAND DETECTION AND PAN PROPERTIES
// =============================================================================

proptest! {
    /// Property: a Luhn-valid PAN of a brand's prefix and length is complete
    /// and detected as that brand.
    #[test]
    fn brand_pans_are_complete(
        (brand, prefix, length) in brand_prefix(),
        filler in digit_string(19),
    ) {
        let config = CardConfiguration::built_in();
        let pan = pan_for(prefix, length, &filler);

        let (result, detected) = validate_pan(&pan, &config);
        prop_assert!(result.complete, "{} should be complete", pan);
        prop_assert!(result.partial);
        prop_assert_eq!(detected.map(|b| b.name()), Some(brand));
    }

    /// Property: every prefix of a complete PAN is still partial.
    #[test]
    fn prefixes_stay_partial(
        (_brand, prefix, length) in brand_prefix(),
        filler in digit_string(19),
        cut in 0usize..19,
    ) {
        let config = CardConfiguration::built_in();
        let pan = pan_for(prefix, length, &filler);
        let partial = &pan[..cut.min(pan.len())];

        prop_assert!(validate_pan(partial, &config).0.partial);
    }

    /// Property: numbers starting with 4 are Visa unless they carry the
    /// Maestro 493698 range.
    #[test]
    fn four_is_visa(rest in digit_string_range(0..=18)) {
        let config = CardConfiguration::built_in();
        let pan = format!("4{rest}");
        let brand = detect::find_brand(&pan, config.brands()).map(|b| b.name());

        if pan.starts_with("493698") {
            prop_assert_eq!(brand, Some("maestro"));
        } else {
            prop_assert_eq!(brand, Some("visa"));
        }
    }

    /// Property: more than 19 digits is never partial.
    #[test]
    fn too_long_is_not_partial(pan in digit_string_range(20..=30)) {
        let config = CardConfiguration::built_in();
        let (result, _) = validate_pan(&pan, &config);
        prop_assert!(!result.partial);
        prop_assert!(!result.complete);
    }

    /// Property: complete always implies partial, for any input.
    #[test]
    fn complete_implies_partial(pan in "[0-9 ]{0,25}") {
        let config = CardConfiguration::built_in();
        let (result, _) = validate_pan(&pan, &config);
        prop_assert!(!result.complete || result.partial);
    }
}

// =============================================================================
// CVC PROPERTIES
// =============================================================================

proptest! {
    /// Property: Amex takes four digits, every other brand three.
    #[test]
    fn cvc_length_follows_brand(
        (brand, prefix, length) in brand_prefix(),
        filler in digit_string(19),
        cvc in digit_string_range(0..=5),
    ) {
        let config = CardConfiguration::built_in();
        let pan = pan_for(prefix, length, &filler);
        let expected = if brand == "amex" { 4 } else { 3 };

        let (result, _) = validate_cvc(&cvc, Some(&pan), &config);
        prop_assert_eq!(result.complete, cvc.len() == expected);
        prop_assert_eq!(result.partial, cvc.len() <= expected);
    }
}

// =============================================================================
// EXPIRY DATE PROPERTIES
// =============================================================================

proptest! {
    /// Property: the sanitiser never produces more than MM/YY and only
    /// digits and the separator.
    #[test]
    fn sanitised_expiry_shape(text in "[0-9/ a-z]{1,12}") {
        prop_assume!(!text.trim().is_empty());
        let sanitised = sanitise_expiry_date(&text);

        prop_assert!(sanitised.len() <= 5, "{:?} -> {:?}", text, sanitised);
        prop_assert!(sanitised.chars().all(|c| c.is_ascii_digit() || c == '/'));
        prop_assert!(sanitised.matches('/').count() <= 1);
    }

    /// Property: sanitising twice changes nothing.
    #[test]
    fn sanitise_is_idempotent(text in "[0-9/ ]{1,8}") {
        prop_assume!(!text.trim().is_empty());
        let once = sanitise_expiry_date(&text);
        prop_assert_eq!(sanitise_expiry_date(&once), once.clone());
    }

    /// Property: a sanitised month never exceeds 12.
    #[test]
    fn sanitised_month_in_range(digits in digit_string_range(2..=6)) {
        let sanitised = sanitise_expiry_date(&digits);
        let month: u32 = sanitised[..2].parse().unwrap();
        prop_assert!(month <= 12, "{} -> {}", digits, sanitised);
        prop_assert_eq!(&sanitised[2..3], "/");
    }

    /// Property: year 99 is too far ahead for any month.
    #[test]
    fn far_future_never_complete(month in 1u32..=12) {
        let config = CardConfiguration::built_in();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let result = validate_expiry(&format!("{month:02}"), "99", &config, &now);
        prop_assert!(!result.complete);
    }

    /// Property: every month from now up to the end of the horizon is valid.
    #[test]
    fn upcoming_months_are_complete(offset in 0u32..(12 * 19)) {
        let config = CardConfiguration::built_in();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let months = 9 + offset;
        let date = format!("{:02}/{:02}", months % 12 + 1, (26 + months / 12) % 100);

        prop_assert!(validate_expiry_date(&date, &config, &now).complete, "{}", date);
    }
}

// =============================================================================
// FORMATTING AND MASKING PROPERTIES
// =============================================================================

proptest! {
    /// Property: formatting only inserts separators.
    #[test]
    fn format_preserves_digits(pan in digit_string_range(0..=19)) {
        let config = CardConfiguration::built_in();
        let brand = detect::find_brand(&pan, config.brands());
        let formatted = format_pan(&pan, brand);

        prop_assert_eq!(strip_formatting(&formatted), pan);
        prop_assert!(!formatted.starts_with(SEPARATOR));
        prop_assert!(!formatted.ends_with(SEPARATOR));
    }

    /// Property: masking keeps the length and the last four digits.
    #[test]
    fn mask_keeps_last_four(pan in digit_string_range(5..=19)) {
        let masked = mask::mask_pan(&pan);
        prop_assert_eq!(masked.len(), pan.len());
        prop_assert!(masked.ends_with(&pan[pan.len() - 4..]));
        prop_assert!(masked[..pan.len() - 4].chars().all(|c| c == '*'));
    }
}
