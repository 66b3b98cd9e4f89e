mod config;
pub mod error;
pub mod file_utils;
pub mod json_utils;
pub mod multipart_utils;
pub mod text_utils;
pub mod upload;

pub use config::{
    Config, DEFAULT_ALLOWED_FILE_TYPES, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_JSON_SIZE,
};
pub use error::{ToolkitError, UploadFailure};
pub use file_utils::{create_dir_if_not_exist, download_static_file};
pub use json_utils::{
    error_json, error_json_with_status, post_json, write_json, write_json_with_headers,
    JsonResponse,
};
pub use text_utils::{random_string, slugify};
pub use upload::UploadedFile;

/// Request helpers bound to one resolved [`Config`].
///
/// Every default is applied when the value is built, so a `Tools` can be shared
/// across workers (for example through `web::Data`) without further setup.
#[derive(Debug, Clone, Default)]
pub struct Tools {
    config: Config,
}

impl Tools {
    pub fn new(config: Config) -> Self {
        Self { config: config.resolved() }
    }

    pub fn builder() -> ToolsBuilder {
        ToolsBuilder::default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolsBuilder {
    config: Config,
}

impl ToolsBuilder {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn allowed_file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_file_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_json_size(mut self, bytes: u64) -> Self {
        self.config.max_json_size = bytes;
        self
    }

    pub fn allow_unknown_fields(mut self, allow: bool) -> Self {
        self.config.allow_unknown_fields = allow;
        self
    }

    pub fn build(self) -> Tools {
        Tools::new(self.config)
    }
}
