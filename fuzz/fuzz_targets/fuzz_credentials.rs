#![no_main]

//! Fuzz target for the credentials file parser.
//!
//! # Goal
//! Malformed credentials files must degrade to an error, never a panic, and a
//! resolved endpoint must never render the secret.

use firegate::config::Credentials;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(credentials) = Credentials::from_json(data) else {
        return;
    };

    let Some(endpoint) = credentials.endpoint() else {
        return;
    };
    assert!(endpoint.url().path().ends_with(".json"));
    assert!(
        endpoint
            .url()
            .query_pairs()
            .any(|(k, _)| k == "auth")
    );

    // The rendered form masks the secret value.
    assert!(endpoint.to_string().contains("auth=%5BREDACTED%5D"));
});
