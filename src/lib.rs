//! # access_checkout
//!
//! Card field validation and session tokenisation for Access Checkout.
//!
//! The crate has two halves:
//!
//! - **Validation**: brand detection, PAN/CVC/expiry rules driven by a
//!   remote card configuration, formatting and a per-field controller that
//!   keeps a set of input fields consistent and reports validity changes.
//! - **Sessions**: HAL link discovery against the Access Worldpay API and
//!   the card and CVC session requests built on top of it.
//!
//! ## Quick Start
//!
//! ```rust
//! use access_checkout::{validate_pan, validate_cvc, CardConfiguration};
//!
//! let config = CardConfiguration::built_in();
//!
//! let (result, brand) = validate_pan("4111 1111 1111 1111", &config);
//! assert!(result.complete);
//! assert_eq!(brand.unwrap().name(), "visa");
//!
//! // The CVC rule follows the brand of the PAN.
//! let (result, _) = validate_cvc("1234", Some("343434343434343"), &config);
//! assert!(result.complete);
//! ```
//!
//! ## Partial and Complete
//!
//! Every rule answers two questions: could the text still become valid
//! (`partial`), and is it valid now (`complete`).
//!
//! ```rust
//! use access_checkout::{validate_pan, CardConfiguration};
//!
//! let config = CardConfiguration::built_in();
//!
//! let (result, _) = validate_pan("4111", &config);
//! assert!(result.partial);
//! assert!(!result.complete);
//!
//! let (result, _) = validate_pan("4111abc", &config);
//! assert!(!result.partial);
//! ```
//!
//! ## Expiry Dates
//!
//! ```rust
//! use access_checkout::expiry::{sanitise_expiry_date, validate_expiry_date};
//! use access_checkout::CardConfiguration;
//! use chrono::{TimeZone, Utc};
//!
//! assert_eq!(sanitise_expiry_date("1225"), "12/25");
//! assert_eq!(sanitise_expiry_date("4"), "04/");
//!
//! let config = CardConfiguration::built_in();
//! let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
//! assert!(validate_expiry_date("06/24", &config, &now).complete);
//! assert!(!validate_expiry_date("05/24", &config, &now).complete);
//! ```
//!
//! ## Formatting
//!
//! ```rust
//! use access_checkout::format::format_pan;
//! use access_checkout::CardConfiguration;
//!
//! let config = CardConfiguration::built_in();
//! let amex = config.brand_named("amex");
//! assert_eq!(format_pan("343434343434343", amex), "3434 343434 34343");
//! assert_eq!(format_pan("4111111111111111", None), "4111 1111 1111 1111");
//! ```
//!
//! ## Sessions
//!
//! [`AccessCheckoutClient`] discovers the session endpoints, posts the
//! card details and reports every requested session type back through a
//! [`SessionResponseListener`](client::SessionResponseListener) exactly once.
//! See the [`client`] module for a full example.
//!
//! ## Supported Card Brands
//!
//! The built-in configuration mirrors the hosted `cardTypes.json`:
//!
//! | Brand | Prefix | Length | CVC |
//! |-------|--------|--------|-----|
//! | Visa | 4 | 13, 16, 18, 19 | 3 |
//! | Mastercard | 51-55, 22-27 | 16 | 3 |
//! | American Express | 34, 37 | 15 | 4 |
//! | JCB | 352-358, 2131, 1800 | 16-19 | 3 |
//! | Discover | 6011, 644-649, 65 | 16, 19 | 3 |
//! | Diners Club | 300-305, 36, 38, 39 | 14, 16, 19 | 3 |
//! | Maestro | 493698, 500-509, 56-59, 6 | 12-19 | 3 |
//!
//! Brands are tried in table order and the first match wins, so `6011...`
//! is Discover even though Maestro also claims every `6` prefix.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `cli` | Command-line tool |
//!
//! ## Security
//!
//! - Card details are zeroized when dropped
//! - `Debug` output masks the PAN and hides the CVC
//! - Log lines only ever carry masked PANs
//! - No unsafe code (`#![deny(unsafe_code)]`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod card;
pub mod client;
pub mod config;
pub mod controller;
pub mod cvc;
pub mod detect;
pub mod discovery;
pub mod error;
pub mod expiry;
pub mod format;
pub mod hal;
pub mod http;
pub mod length;
pub mod luhn;
pub mod mask;
pub mod rule;
pub mod session;
pub mod state;
pub mod tracker;
pub mod validate;

// Re-export main types at crate root
pub use card::{CardBrand, CardConfiguration, CardDefaults};
pub use client::{AccessCheckoutClient, CardDetails, ClientConfig, SessionResponseListener};
pub use config::CardConfigurationProvider;
pub use controller::{CardField, CardValidationController};
pub use cvc::{is_valid_cvc, validate_cvc};
pub use error::{AccessCheckoutError, Result};
pub use rule::{CardValidationRule, ValidationResult};
pub use session::SessionType;
pub use state::{Field, ValidationListener};
pub use validate::{is_valid_pan, validate_pan};
