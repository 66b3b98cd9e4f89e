use std::env;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ToolkitError;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;
// Not 10 MiB. Existing callers depend on this exact limit.
pub const DEFAULT_MAX_JSON_SIZE: u64 = 1024 * 10243;
pub const DEFAULT_ALLOWED_FILE_TYPES: [&str; 5] =
    ["image/jpeg", "image/jpg", "image/png", "image/gif", "application/pdf"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_file_size: u64,
    pub allowed_file_types: Vec<String>,
    pub max_json_size: u64,
    pub allow_unknown_fields: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_file_types: default_allowed_file_types(),
            max_json_size: DEFAULT_MAX_JSON_SIZE,
            allow_unknown_fields: false,
        }
    }
}

impl Config {
    /// Defaults overlaid with any `TOOLKIT_*` environment variables that are set.
    pub fn from_env() -> Result<Self, ToolkitError> {
        let mut config = Self::default();
        if let Some(size) = env_var::<u64>("TOOLKIT_MAX_FILE_SIZE")? {
            config.max_file_size = size;
        }
        if let Ok(types) = env::var("TOOLKIT_ALLOWED_FILE_TYPES") {
            config.allowed_file_types = types
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(size) = env_var::<u64>("TOOLKIT_MAX_JSON_SIZE")? {
            config.max_json_size = size;
        }
        if let Some(allow) = env_var::<bool>("TOOLKIT_ALLOW_UNKNOWN_FIELDS")? {
            config.allow_unknown_fields = allow;
        }
        Ok(config.resolved())
    }

    /// Replaces zero sizes and an empty allow-list with their defaults.
    pub(crate) fn resolved(mut self) -> Self {
        if self.max_file_size == 0 {
            self.max_file_size = DEFAULT_MAX_FILE_SIZE;
        }
        if self.allowed_file_types.is_empty() {
            self.allowed_file_types = default_allowed_file_types();
        }
        if self.max_json_size == 0 {
            self.max_json_size = DEFAULT_MAX_JSON_SIZE;
        }
        self
    }
}

fn default_allowed_file_types() -> Vec<String> {
    DEFAULT_ALLOWED_FILE_TYPES.iter().map(|t| t.to_string()).collect()
}

fn env_var<T: FromStr>(name: &str) -> Result<Option<T>, ToolkitError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ToolkitError::Config(format!("{} has an invalid value: {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}
