//! Fuzz target for expiry date handling.
//!
//! Tests that sanitising, splitting and validating expiry input never
//! panics on arbitrary input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use access_checkout::{expiry, CardConfiguration};
use chrono::{TimeZone, Utc};

fuzz_target!(|data: &str| {
    let config = CardConfiguration::default();
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();

    // These should never panic
    let sanitised = expiry::sanitise_expiry_date(data);
    if !data.trim().is_empty() {
        assert!(sanitised.len() <= 5, "sanitised too long: {sanitised:?}");
    }

    let (month, year) = expiry::split_expiry_date(data);
    let _ = expiry::can_update(month, year, &config);
    let _ = expiry::validate_expiry_date(data, &config, &now);
    let _ = expiry::validate_expiry_with_options(month, year, &config, &now, None);
    let _ = expiry::validate_expiry_date(&sanitised, &config, &now);

    // If parsing succeeds, it must print back in MM/YY form
    if let Ok(date) = expiry::ExpiryDate::parse(data) {
        let printed = date.to_string();
        assert_eq!(expiry::ExpiryDate::parse(&printed), Ok(date));
    }
});
