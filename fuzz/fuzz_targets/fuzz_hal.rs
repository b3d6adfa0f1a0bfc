//! Fuzz target for discovery and session response parsing.
//!
//! Tests that arbitrary response bodies produce errors, never panics.

#![no_main]

use libfuzzer_sys::fuzz_target;
use access_checkout::hal::HalDocument;
use access_checkout::session::{SessionResponse, SESSION_RELATION};

fuzz_target!(|data: &str| {
    if let Ok(document) = HalDocument::parse(data) {
        let _ = document.href("service:sessions");
        let _ = document.href(SESSION_RELATION);
        let _ = document.curies();
    }

    if let Ok(response) = SessionResponse::from_json(data, SESSION_RELATION) {
        let document = HalDocument::parse(data).unwrap();
        assert_eq!(
            document.href(SESSION_RELATION).unwrap().as_deref(),
            Some(response.href())
        );
    }
});
