//! Fuzz target for Luhn algorithm.
//!
//! Tests that luhn functions never panic and maintain invariants.

#![no_main]

use libfuzzer_sys::fuzz_target;
use access_checkout::luhn;

fuzz_target!(|data: &[u8]| {
    // Clamp values to valid digit range
    let digits: Vec<u8> = data.iter().map(|&b| b % 10).collect();

    if digits.is_empty() {
        return;
    }

    let valid = luhn::validate(&digits);

    // The string form must agree with the digit form
    let text: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
    assert_eq!(luhn::is_luhn_valid(&text), valid, "string and digit checks disagree");
    assert_eq!(luhn::to_digits(&text).as_deref(), Some(digits.as_slice()));

    // Test check digit generation
    if digits.len() <= 18 {
        let check = luhn::generate_check_digit(&digits);
        assert!(check <= 9, "Check digit should be 0-9");

        // Adding check digit should make it valid
        let mut with_check = digits.clone();
        with_check.push(check);
        assert!(luhn::validate(&with_check), "Adding check digit should make valid");
    }

    // Raw bytes are never valid unless they are all ASCII digits
    if let Ok(raw) = std::str::from_utf8(data) {
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            assert!(!luhn::is_luhn_valid(raw));
        }
    }
});
