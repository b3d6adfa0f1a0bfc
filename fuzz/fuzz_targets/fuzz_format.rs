//! Fuzz target for card formatting.
//!
//! Tests that formatting functions never panic on arbitrary input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use access_checkout::{format, length, mask, CardConfiguration};

fuzz_target!(|data: &str| {
    let config = CardConfiguration::built_in();

    // These should never panic
    let _ = format::format_pan_with_separator(data, None, "-");
    let _ = format::format_pan_with_separator(data, None, "");
    let _ = mask::mask_pan(data);
    let _ = mask::last_four(data);
    let _ = length::pan_max_length(data, &config, true);
    let _ = length::cvc_max_length(Some(data), &config);

    // Test with every brand
    for brand in config.brands() {
        let formatted = format::format_pan(data, Some(brand));
        let _ = format::expected_space_count(Some(brand), &config);

        // Verify roundtrip property
        let stripped = format::strip_formatting(&formatted);
        let original_digits = format::strip_formatting(data);
        assert_eq!(stripped, original_digits, "Format roundtrip should preserve digits");
        assert!(!formatted.ends_with(format::SEPARATOR));
    }

    if let Some(clamped) = length::clamp(data, 19) {
        assert_eq!(clamped.chars().count(), 19);
    }
});
