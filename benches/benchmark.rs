//! Benchmarks for access_checkout performance testing.
//!
//! Run with: cargo bench

use access_checkout::config::parse_card_configuration;
use access_checkout::controller::{CardField, CardValidationController};
use access_checkout::expiry::{sanitise_expiry_date, validate_expiry_date};
use access_checkout::format::format_pan;
use access_checkout::hal::HalDocument;
use access_checkout::session::SessionResponse;
use access_checkout::{
    detect, luhn, validate_cvc, validate_pan, CardConfiguration, Field, ValidationListener,
};
use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::{Arc, Mutex};

// Test card numbers
const VISA_16: &str = "4111111111111111";
const VISA_16_FORMATTED: &str = "4111 1111 1111 1111";
const MASTERCARD: &str = "5555555555554444";
const AMEX: &str = "378282246310005";
const MAESTRO: &str = "6759649826438453";

const VISA_DIGITS: [u8; 16] = [4, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1];

const SESSION_RESPONSE: &str = r#"{
    "_links": {
        "sessions:session": { "href": "https://access.example.com/sessions/abc" },
        "curies": [{ "href": "https://access.example.com/rels/sessions/{rel}", "name": "sessions", "templated": true }]
    }
}"#;

/// Benchmark PAN validation against the built-in brands
fn bench_pan_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("pan_validation");
    let config = CardConfiguration::built_in();

    group.bench_function("visa_16_raw", |b| {
        b.iter(|| validate_pan(black_box(VISA_16), &config))
    });

    group.bench_function("visa_16_spaced", |b| {
        b.iter(|| validate_pan(black_box(VISA_16_FORMATTED), &config))
    });

    group.bench_function("mastercard", |b| {
        b.iter(|| validate_pan(black_box(MASTERCARD), &config))
    });

    group.bench_function("amex_15", |b| {
        b.iter(|| validate_pan(black_box(AMEX), &config))
    });

    // Last brand in priority order, so every matcher runs
    group.bench_function("maestro_last_brand", |b| {
        b.iter(|| validate_pan(black_box(MAESTRO), &config))
    });

    group.finish();
}

/// Benchmark brand detection as the PAN grows keystroke by keystroke
fn bench_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection");
    let config = CardConfiguration::built_in();

    for length in [1, 4, 8, 16] {
        let prefix = &MAESTRO[..length];
        group.bench_with_input(BenchmarkId::new("find_brand", length), prefix, |b, prefix| {
            b.iter(|| detect::find_brand(black_box(prefix), config.brands()))
        });
    }

    group.finish();
}

/// Benchmark Luhn algorithm specifically
fn bench_luhn(c: &mut Criterion) {
    let mut group = c.benchmark_group("luhn");

    group.bench_function("luhn_16_digits", |b| {
        b.iter(|| luhn::validate(black_box(&VISA_DIGITS)))
    });

    group.bench_function("luhn_16_str", |b| {
        b.iter(|| luhn::is_luhn_valid(black_box(VISA_16)))
    });

    group.bench_function("check_digit_15", |b| {
        b.iter(|| luhn::generate_check_digit(black_box(&VISA_DIGITS[..15])))
    });

    group.finish();
}

/// Benchmark the other field rules
fn bench_fields(c: &mut Criterion) {
    let mut group = c.benchmark_group("fields");
    let config = CardConfiguration::built_in();
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
    let amex = config.brand_named("amex");

    group.bench_function("cvc_for_pan", |b| {
        b.iter(|| validate_cvc(black_box("1234"), Some(AMEX), &config))
    });

    group.bench_function("expiry_date", |b| {
        b.iter(|| validate_expiry_date(black_box("12/30"), &config, &now))
    });

    group.bench_function("sanitise_expiry", |b| {
        b.iter(|| sanitise_expiry_date(black_box("1230")))
    });

    group.bench_function("format_amex", |b| {
        b.iter(|| format_pan(black_box(AMEX), amex))
    });

    group.finish();
}

/// Benchmark mixed valid and invalid PANs
fn bench_mixed_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_batch");
    let config = CardConfiguration::built_in();

    let mixed: Vec<&str> = (0..1000)
        .map(|i| {
            if i % 5 == 0 {
                "4111111111111112" // Invalid (wrong checksum)
            } else if i % 3 == 0 {
                MASTERCARD
            } else if i % 7 == 0 {
                AMEX
            } else {
                VISA_16
            }
        })
        .collect();

    group.throughput(Throughput::Elements(1000));

    group.bench_function("count_complete", |b| {
        b.iter(|| {
            black_box(&mixed)
                .iter()
                .filter(|pan| validate_pan(pan, &config).0.complete)
                .count()
        })
    });

    group.finish();
}

/// Benchmark parsing the wire documents
fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    let card_types = include_str!("../data/card_types.json");

    group.bench_function("card_configuration", |b| {
        b.iter(|| parse_card_configuration(black_box(card_types)))
    });

    group.bench_function("hal_document", |b| {
        b.iter(|| HalDocument::parse(black_box(SESSION_RESPONSE)))
    });

    group.bench_function("session_response", |b| {
        b.iter(|| SessionResponse::from_json(black_box(SESSION_RESPONSE), "sessions:session"))
    });

    group.finish();
}

#[derive(Default)]
struct Input(Mutex<String>);

impl CardField for Input {
    fn text(&self) -> String {
        self.0.lock().unwrap().clone()
    }

    fn set_text(&self, text: &str) {
        *self.0.lock().unwrap() = text.to_string();
    }

    fn set_max_length(&self, _max: usize) {}
}

struct Quiet;

impl ValidationListener for Quiet {}

/// Benchmark a full keystroke through the controller
fn bench_controller(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller");

    let pan = Arc::new(Input::default());
    let controller = CardValidationController::builder()
        .pan(pan.clone())
        .expiry_date(Arc::new(Input::default()))
        .cvc(Arc::new(Input::default()))
        .listener(Arc::new(Quiet))
        .configuration(Arc::new(CardConfiguration::built_in()))
        .enable_pan_formatting()
        .build()
        .unwrap();

    group.bench_function("pan_keystroke", |b| {
        b.iter(|| {
            pan.set_text(black_box(VISA_16));
            controller.on_text_changed(Field::Pan);
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_pan_validation,
    bench_detection,
    bench_luhn,
    bench_fields,
    bench_mixed_batch,
    bench_parsing,
    bench_controller,
);

criterion_main!(benches);
