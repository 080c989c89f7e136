//! Logging setup for binaries and tests embedding the library.
//!
//! The library only emits `tracing` events; nothing is printed until a
//! subscriber is installed, either by the host application or through
//! [`configure_logging`].

use std::collections::HashMap;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding the requested level.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Install a console subscriber filtering at `level`, or at `LOG_LEVEL` when set.
///
/// Returns `false` when a global subscriber was already installed.
pub fn configure_logging(level: &str) -> bool {
    let env: HashMap<String, String> = std::env::vars().collect();
    let filter = build_filter(level, &env);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .try_init()
        .is_ok()
}

fn effective_level(level: &str, env: &HashMap<String, String>) -> String {
    env.get(LOG_LEVEL_ENV)
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.trim().to_lowercase())
        .unwrap_or_else(|| level.to_lowercase())
}

fn build_filter(level: &str, env: &HashMap<String, String>) -> EnvFilter {
    EnvFilter::try_new(effective_level(level, env)).unwrap_or_else(|_| EnvFilter::new("info"))
}
