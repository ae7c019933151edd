//! Shared fixtures for unit tests.

use crate::config::{Options, Policy};

pub const COOKIE_SECRET: &str = "OromP1gurwGWjQPYb1nNgSxtbVB5NnLzX6z5WOKr0Yw=";
pub const SHARED_SECRET: &str = "80ldlrU2d7w+wVpKNfevk6fmb8otEx6CqOfshj2LwhQ=";

pub fn signing_key() -> &'static str {
    include_str!("../testdata/signing_key.b64").trim()
}

pub fn custom_ca() -> &'static str {
    include_str!("../testdata/custom_ca.b64").trim()
}

pub fn client_cert() -> &'static str {
    include_str!("../testdata/client_cert.b64").trim()
}

pub fn client_key() -> &'static str {
    include_str!("../testdata/client_key.b64").trim()
}

/// Minimal valid options with a single policy.
pub fn options() -> Options {
    Options {
        authenticate_url: "https://authenticate.corp.example".to_string(),
        authorize_url: "https://authorize.corp.example".to_string(),
        cookie_secret: COOKIE_SECRET.to_string(),
        shared_secret: SHARED_SECRET.to_string(),
        policies: vec![Policy::new(
            "https://corp.example.example",
            "https://example.example",
        )],
        ..Options::default()
    }
}
