// src/logging.rs
//! Tracing setup and log-safe helpers.

use sha2::{Digest, Sha256};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Short, stable hash of user text. Queries are never logged raw.
pub fn anon_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Install the global subscriber.
///
/// Filter: `RUST_LOG` if set, else `debug` in development and `info` otherwise.
/// Format: JSON when `LOG_FORMAT=json`, compact text otherwise.
/// Calling this twice is harmless (the second install is ignored).
pub fn init_tracing(development: bool) {
    let default_level = if development { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},hyper=warn,reqwest=warn")));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_ok() {
        tracing::info!(development, json, "=== video research service starting ===");
    }
}
