use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use shared::domain::Persona;
use url::Url;

use crate::token_store::default_token_path;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_CONFIG_FILE: &str = "yuna.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_base_url: String,
    pub auth_base_url: String,
    pub token_path: PathBuf,
    pub default_persona: Persona,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_base_url: DEFAULT_BACKEND_URL.into(),
            auth_base_url: DEFAULT_BACKEND_URL.into(),
            token_path: default_token_path(),
            default_persona: Persona::default(),
        }
    }
}

/// Defaults, then `path` (or `yuna.toml`) if present, then environment.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(file) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse config file '{}'", file.display()))?,
        Err(err) if path.is_some() => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", file.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings.backend_base_url = normalize_base_url(&settings.backend_base_url)?;
    settings.auth_base_url = normalize_base_url(&settings.auth_base_url)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg = toml::from_str::<HashMap<String, String>>(raw)?;
    if let Some(v) = file_cfg.get("backend_url") {
        settings.backend_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("auth_url") {
        settings.auth_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("token_path") {
        settings.token_path = PathBuf::from(v);
    }
    if let Some(v) = file_cfg.get("persona") {
        settings.default_persona = Persona::new(v.as_str());
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("YUNA_BACKEND_URL") {
        settings.backend_base_url = v;
    }
    if let Some(v) = var("APP__BACKEND_URL") {
        settings.backend_base_url = v;
    }

    if let Some(v) = var("YUNA_AUTH_URL") {
        settings.auth_base_url = v;
    }
    if let Some(v) = var("APP__AUTH_URL") {
        settings.auth_base_url = v;
    }

    if let Some(v) = var("APP__TOKEN_PATH") {
        settings.token_path = PathBuf::from(v);
    }

    if let Some(v) = var("APP__PERSONA") {
        settings.default_persona = Persona::new(v);
    }
}

/// Validates `raw` as an absolute http(s) URL and drops any trailing slash so
/// endpoint paths can be appended verbatim.
pub fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    let parsed = Url::parse(raw).with_context(|| format!("invalid base url '{raw}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(anyhow!(
            "unsupported scheme '{}' in base url '{raw}'",
            parsed.scheme()
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
