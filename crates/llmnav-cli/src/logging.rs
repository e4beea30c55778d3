// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_PREFIX: &str = "llmnav.log";

/// File-only logging. The terminal belongs to the TUI, so nothing is
/// written to stdout or stderr.
pub fn init(dir: &Path, level: &str) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create log directory {} -- set [log].dir", dir.display()))?;

    let file_layer = fmt::layer()
        .with_writer(rolling::daily(dir, LOG_FILE_PREFIX))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(file_layer)
        .try_init()
        .context("install log subscriber")
}

/// `RUST_LOG` wins over the configured level.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::env_filter;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn configured_level_applies_without_rust_log() {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("RUST_LOG");
        }
        assert_eq!(env_filter("debug").to_string(), "debug");
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("RUST_LOG", "llmnav_store=trace");
        }
        let filter = env_filter("info");
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("RUST_LOG");
        }
        assert_eq!(filter.to_string(), "llmnav_store=trace");
    }
}
