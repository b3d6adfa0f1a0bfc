//! Fuzz target for the card configuration parser.
//!
//! Arbitrary documents must either parse or fall back to defaults, and a
//! parsed configuration must be usable for validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use access_checkout::config::{parse_card_configuration, try_parse_card_configuration};
use access_checkout::validate_pan;

fuzz_target!(|data: &str| {
    let config = parse_card_configuration(data);

    if try_parse_card_configuration(data).is_err() {
        assert!(config.is_empty(), "failed parse should fall back to defaults");
    }

    for brand in config.brands() {
        assert!(!brand.name().trim().is_empty());
    }

    let _ = validate_pan("4111111111111111", &config);
    let _ = validate_pan(data, &config);
});
