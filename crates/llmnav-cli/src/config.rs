// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use llmnav_app::{PAGE_SIZES, TabKind};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: Backend::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub default_tab: Option<String>,
    pub page_size: Option<usize>,
    pub popular_only: Option<bool>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            default_tab: Some(TabKind::Links.as_str().to_owned()),
            page_size: Some(llmnav_app::DEFAULT_PAGE_SIZE),
            popular_only: Some(true),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub dir: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("LLMNAV_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set LLMNAV_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(llmnav_store::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [backend], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(url) = &self.backend.url
            && url::Url::parse(url.trim()).is_err()
        {
            bail!(
                "backend.url in {} is not a valid URL: {url:?} -- use the project URL, e.g. https://<project>.supabase.co",
                path.display()
            );
        }

        if let Some(timeout) = &self.backend.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "backend.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(tab) = &self.ui.default_tab
            && TabKind::parse(tab).is_none()
        {
            bail!(
                "ui.default_tab in {} must be one of links, table, prompts, profile; got {tab:?}",
                path.display()
            );
        }

        if let Some(page_size) = self.ui.page_size
            && !PAGE_SIZES.contains(&page_size)
        {
            bail!(
                "ui.page_size in {} must be one of 10, 20, 30, 40, 50; got {page_size}",
                path.display()
            );
        }

        if let Some(level) = &self.log.level
            && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
        {
            bail!(
                "log.level in {} must be one of trace, debug, info, warn, error; got {level:?}",
                path.display()
            );
        }

        Ok(())
    }

    /// Project URL; `LLMNAV_BACKEND_URL` wins over the file.
    pub fn backend_url(&self) -> Result<String> {
        let url = env_override("LLMNAV_BACKEND_URL")
            .or_else(|| self.backend.url.clone())
            .unwrap_or_default();
        let url = url.trim().trim_end_matches('/').to_owned();
        if url.is_empty() {
            bail!("backend.url must not be empty -- set [backend].url in config or LLMNAV_BACKEND_URL");
        }
        Ok(url)
    }

    /// Public anon key; `LLMNAV_ANON_KEY` wins over the file.
    pub fn anon_key(&self) -> Result<String> {
        let key = env_override("LLMNAV_ANON_KEY")
            .or_else(|| self.backend.anon_key.clone())
            .unwrap_or_default();
        let key = key.trim().to_owned();
        if key.is_empty() {
            bail!("backend.anon_key must not be empty -- set [backend].anon_key in config or LLMNAV_ANON_KEY");
        }
        Ok(key)
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.backend.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn default_tab(&self) -> TabKind {
        self.ui
            .default_tab
            .as_deref()
            .and_then(TabKind::parse)
            .unwrap_or(TabKind::Links)
    }

    pub fn page_size(&self) -> usize {
        self.ui.page_size.unwrap_or(llmnav_app::DEFAULT_PAGE_SIZE)
    }

    pub fn popular_only(&self) -> bool {
        self.ui.popular_only.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        match &self.log.dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => llmnav_store::default_log_dir(),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# llmnav config\n# Place this file at: {}\n\nversion = 1\n\n[backend]\n# Project URL and public anon key. LLMNAV_BACKEND_URL and LLMNAV_ANON_KEY override these.\nurl = \"https://your-project.supabase.co\"\nanon_key = \"\"\ntimeout = \"{}\"\n\n[ui]\n# links, table, prompts, or profile\ndefault_tab = \"links\"\n# 10, 20, 30, 40, or 50\npage_size = {}\npopular_only = true\n\n[log]\nlevel = \"{}\"\n# Optional. Default is the platform data dir (for example ~/.local/share/llmnav/logs)\n# dir = \"/absolute/path/to/logs\"\n",
            path.display(),
            DEFAULT_TIMEOUT,
            llmnav_app::DEFAULT_PAGE_SIZE,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn env_override(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use llmnav_app::TabKind;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.default_tab(), TabKind::Links);
        assert_eq!(config.page_size(), 10);
        assert!(config.popular_only());
        assert_eq!(config.timeout()?, Duration::from_secs(10));
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[backend]\nurl=\"https://x.supabase.co\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[backend], [ui], and [log]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("LLMNAV_BACKEND_URL");
            std::env::remove_var("LLMNAV_ANON_KEY");
        }
        let (_temp, path) = write_config(
            "version = 1\n[backend]\nurl = \"https://demo.supabase.co/\"\nanon_key = \"public-key\"\ntimeout = \"500ms\"\n[ui]\ndefault_tab = \"prompts\"\npage_size = 30\npopular_only = false\n[log]\nlevel = \"debug\"\ndir = \"/tmp/llmnav-logs\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.backend_url()?, "https://demo.supabase.co");
        assert_eq!(config.anon_key()?, "public-key");
        assert_eq!(config.timeout()?, Duration::from_millis(500));
        assert_eq!(config.default_tab(), TabKind::Prompts);
        assert_eq!(config.page_size(), 30);
        assert!(!config.popular_only());
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_dir()?, PathBuf::from("/tmp/llmnav-logs"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn invalid_ui_values_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\npage_size = 25\n")?;
        let error = Config::load(&path).expect_err("page size 25 should fail");
        assert!(error.to_string().contains("must be one of 10, 20, 30, 40, 50"));

        let (_temp, path) = write_config("version = 1\n[ui]\ndefault_tab = \"house\"\n")?;
        let error = Config::load(&path).expect_err("unknown tab should fail");
        assert!(error.to_string().contains("ui.default_tab"));
        Ok(())
    }

    #[test]
    fn invalid_backend_values_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\nurl = \"not a url\"\n")?;
        let error = Config::load(&path).expect_err("bad url should fail");
        assert!(error.to_string().contains("backend.url"));

        let (_temp, path) = write_config("version = 1\n[backend]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));

        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"loud\"\n")?;
        let error = Config::load(&path).expect_err("bad level should fail");
        assert!(error.to_string().contains("log.level"));
        Ok(())
    }

    #[test]
    fn env_overrides_backend_settings() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config(
            "version = 1\n[backend]\nurl = \"https://file.supabase.co\"\nanon_key = \"file-key\"\n",
        )?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("LLMNAV_BACKEND_URL", "https://env.supabase.co");
            std::env::set_var("LLMNAV_ANON_KEY", "env-key");
        }
        let config = Config::load(&path)?;
        let url = config.backend_url();
        let key = config.anon_key();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("LLMNAV_BACKEND_URL");
            std::env::remove_var("LLMNAV_ANON_KEY");
        }
        assert_eq!(url?, "https://env.supabase.co");
        assert_eq!(key?, "env-key");
        Ok(())
    }

    #[test]
    fn missing_backend_settings_explain_remediation() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("LLMNAV_BACKEND_URL");
            std::env::remove_var("LLMNAV_ANON_KEY");
        }
        let config = Config::default();
        let error = config.backend_url().expect_err("no url configured");
        assert!(error.to_string().contains("set [backend].url"));
        let error = config.anon_key().expect_err("no key configured");
        assert!(error.to_string().contains("LLMNAV_ANON_KEY"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("LLMNAV_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("LLMNAV_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_uses_config_toml_suffix_when_no_env_override() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("LLMNAV_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("llmnav/config.toml"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        let error = parse_duration("soon").expect_err("invalid duration should fail");
        assert!(error.to_string().contains("invalid"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[backend]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("[log]"));

        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.page_size(), 10);
        Ok(())
    }
}
