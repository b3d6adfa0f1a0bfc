//! Fuzz target for PAN and CVC validation.
//!
//! Tests that validation never panics and that its results stay
//! consistent on arbitrary input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use access_checkout::{cvc, validate, CardConfiguration};
use std::sync::OnceLock;

static CONFIG: OnceLock<CardConfiguration> = OnceLock::new();

fuzz_target!(|data: &str| {
    let config = CONFIG.get_or_init(CardConfiguration::built_in);

    let (result, brand) = validate::validate_pan(data, config);
    assert!(!result.complete || result.partial, "complete without partial");

    // Complete PANs are Luhn-valid digit strings
    if result.complete {
        let digits = validate::strip_spaces(data);
        assert!(access_checkout::luhn::is_luhn_valid(&digits));
    }

    let check = validate::check_pan(data, config, &["visa", "mastercard"]);
    assert_eq!(check.result, result);
    assert_eq!(check.brand, brand);
    if check.is_valid() {
        assert!(result.complete);
    }

    // CVC against the same input, both as CVC and as PAN
    let (cvc_result, _) = cvc::validate_cvc(data, Some(data), config);
    assert!(!cvc_result.complete || cvc_result.partial);
    let _ = cvc::validate_cvc_for_brand(data, brand, config);
    let _ = cvc::is_valid_cvc(data, None, config);
});
