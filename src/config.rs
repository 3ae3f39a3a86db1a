use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::util::is_http_url;

pub const CONFIG_FILE_NAME: &str = ".machtiani-config.yml";
pub const IGNORE_FILE_NAME: &str = ".machtiani.ignore";

pub const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MACHTIANI_URL: &str = "http://localhost:5071";
pub const DEFAULT_REPO_MANAGER_URL: &str = "http://localhost:5070";
pub const DEFAULT_API_GATEWAY_HOST_KEY: &str = "X-RapidAPI-Key";

const MODEL_API_KEY_VARS: [&str; 3] = ["MCT_MODEL_API_KEY", "MODEL_API_KEY", "MACHTIANI_MODEL_API_KEY"];
const MODEL_API_KEY_OTHER_VARS: [&str; 3] = [
    "MCT_MODEL_API_KEY_OTHER",
    "MODEL_API_KEY_OTHER",
    "MACHTIANI_MODEL_API_KEY_OTHER",
];
const MODEL_BASE_URL_VARS: [&str; 3] = ["MCT_MODEL_BASE_URL", "MODEL_BASE_URL", "MACHTIANI_MODEL_BASE_URL"];
const MODEL_BASE_URL_OTHER_VARS: [&str; 3] = [
    "MCT_MODEL_BASE_URL_OTHER",
    "MODEL_BASE_URL_OTHER",
    "MACHTIANI_MODEL_BASE_URL_OTHER",
];

/// Effective settings, built once at start-up and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub model_api_key: String,
    pub model_api_key_other: String,
    pub model_base_url: String,
    pub model_base_url_other: String,
    pub machtiani_url: String,
    pub repo_manager_url: String,
    pub code_host_url: String,
    pub code_host_api_key: Option<String>,
    pub api_gateway_host_key: String,
    pub api_gateway_host_value: Option<String>,
    pub working_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    environment: EnvironmentSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvironmentSection {
    #[serde(rename = "MODEL_API_KEY")]
    model_api_key: Option<String>,
    #[serde(rename = "MODEL_API_KEY_OTHER")]
    model_api_key_other: Option<String>,
    #[serde(rename = "MODEL_BASE_URL")]
    model_base_url: Option<String>,
    #[serde(rename = "MODEL_BASE_URL_OTHER")]
    model_base_url_other: Option<String>,
    #[serde(rename = "MACHTIANI_URL")]
    machtiani_url: Option<String>,
    #[serde(rename = "MACHTIANI_REPO_MANAGER_URL")]
    repo_manager_url: Option<String>,
    #[serde(rename = "CODE_HOST_URL")]
    code_host_url: Option<String>,
    #[serde(rename = "CODE_HOST_API_KEY")]
    code_host_api_key: Option<String>,
    #[serde(rename = "API_GATEWAY_HOST_KEY")]
    api_gateway_host_key: Option<String>,
    #[serde(rename = "API_GATEWAY_HOST_VALUE")]
    api_gateway_host_value: Option<String>,
}

impl EnvironmentSection {
    /// Non-empty values in `other` replace the current ones.
    fn overlay(&mut self, other: EnvironmentSection) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if let Some(value) = non_empty(value) {
                *slot = Some(value);
            }
        }
        take(&mut self.model_api_key, other.model_api_key);
        take(&mut self.model_api_key_other, other.model_api_key_other);
        take(&mut self.model_base_url, other.model_base_url);
        take(&mut self.model_base_url_other, other.model_base_url_other);
        take(&mut self.machtiani_url, other.machtiani_url);
        take(&mut self.repo_manager_url, other.repo_manager_url);
        take(&mut self.code_host_url, other.code_host_url);
        take(&mut self.code_host_api_key, other.code_host_api_key);
        take(&mut self.api_gateway_host_key, other.api_gateway_host_key);
        take(&mut self.api_gateway_host_value, other.api_gateway_host_value);
    }

    fn apply_env(&mut self) {
        // Setting a primary model key or URL drops the configured fallback.
        if let Some(value) = first_env(&MODEL_API_KEY_VARS) {
            self.model_api_key = Some(value);
            self.model_api_key_other = None;
        }
        if let Some(value) = first_env(&MODEL_BASE_URL_VARS) {
            self.model_base_url = Some(value);
            self.model_base_url_other = None;
        }
        if let Some(value) = first_env(&MODEL_API_KEY_OTHER_VARS) {
            self.model_api_key_other = Some(value);
        }
        if let Some(value) = first_env(&MODEL_BASE_URL_OTHER_VARS) {
            self.model_base_url_other = Some(value);
        }

        let singles: [(&str, &mut Option<String>); 6] = [
            ("MACHTIANI_URL", &mut self.machtiani_url),
            ("MACHTIANI_REPO_MANAGER_URL", &mut self.repo_manager_url),
            ("CODE_HOST_URL", &mut self.code_host_url),
            ("CODE_HOST_API_KEY", &mut self.code_host_api_key),
            ("MACHTIANI_API_GATEWAY_HOST_KEY", &mut self.api_gateway_host_key),
            ("MACHTIANI_API_GATEWAY_HOST_VALUE", &mut self.api_gateway_host_value),
        ];
        for (name, slot) in singles {
            if let Some(value) = first_env(&[name]) {
                *slot = Some(value);
            }
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let working_dir = std::env::current_dir()?;
        Self::load_from(dirs::home_dir().as_deref(), &working_dir)
    }

    /// Merges `<home>/.machtiani-config.yml`, `<working_dir>/.machtiani-config.yml`
    /// and the environment, in that order of increasing priority.
    pub fn load_from(home: Option<&Path>, working_dir: &Path) -> Result<Self> {
        let mut env = EnvironmentSection::default();

        match home {
            Some(home) => {
                if let Some(global) = read_config_file(&home.join(CONFIG_FILE_NAME))? {
                    env.overlay(global.environment);
                }
            }
            None => tracing::warn!("home directory unavailable, skipping global config"),
        }
        if let Some(local) = read_config_file(&working_dir.join(CONFIG_FILE_NAME))? {
            env.overlay(local.environment);
        }
        env.apply_env();

        Ok(Self {
            model_api_key: env.model_api_key.unwrap_or_default(),
            model_api_key_other: env.model_api_key_other.unwrap_or_default(),
            model_base_url: env
                .model_base_url
                .unwrap_or_else(|| DEFAULT_MODEL_BASE_URL.to_string()),
            model_base_url_other: env.model_base_url_other.unwrap_or_default(),
            machtiani_url: env
                .machtiani_url
                .unwrap_or_else(|| DEFAULT_MACHTIANI_URL.to_string()),
            repo_manager_url: env
                .repo_manager_url
                .unwrap_or_else(|| DEFAULT_REPO_MANAGER_URL.to_string()),
            code_host_url: env.code_host_url.unwrap_or_default(),
            code_host_api_key: env.code_host_api_key,
            api_gateway_host_key: env
                .api_gateway_host_key
                .unwrap_or_else(|| DEFAULT_API_GATEWAY_HOST_KEY.to_string()),
            api_gateway_host_value: env.api_gateway_host_value,
            working_dir: working_dir.to_path_buf(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_api_key.trim().is_empty() {
            bail!(
                "MODEL_API_KEY must be set (environment variable or '{}' environment section)",
                CONFIG_FILE_NAME
            );
        }

        for (name, url) in [
            ("MODEL_BASE_URL", &self.model_base_url),
            ("MACHTIANI_URL", &self.machtiani_url),
            ("MACHTIANI_REPO_MANAGER_URL", &self.repo_manager_url),
        ] {
            if !is_http_url(url) {
                bail!("Invalid {name} '{url}': expected http:// or https:// URL");
            }
        }

        if !self.model_base_url_other.is_empty() && !is_http_url(&self.model_base_url_other) {
            bail!(
                "Invalid MODEL_BASE_URL_OTHER '{}': expected http:// or https:// URL",
                self.model_base_url_other
            );
        }

        Ok(())
    }

    /// The header pair sent to an API gateway, when a value is configured.
    pub fn gateway_header(&self) -> Option<(&str, &str)> {
        self.api_gateway_host_value
            .as_deref()
            .map(|value| (self.api_gateway_host_key.as_str(), value))
    }
}

/// Reads `.machtiani.ignore` from `dir`. A missing file means nothing is ignored.
pub fn load_ignore_files(dir: &Path) -> Result<Vec<String>> {
    let path = dir.join(IGNORE_FILE_NAME);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read {}", path.display()))
        }
    };

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect())
}

fn read_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read {}", path.display()))
        }
    };
    if text.trim().is_empty() {
        return Ok(Some(ConfigFile::default()));
    }
    let parsed = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(parsed))
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| non_empty(std::env::var(name).ok()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
