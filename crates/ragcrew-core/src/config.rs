use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::data_processor::DEFAULT_MAX_CHUNK_CHARS;
use crate::error::{Error, Result};
use crate::types::Metric;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_type: String,
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub dimension: usize,
    pub timeout_secs: Option<u64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_type: "openai".to_string(),
            base_url: "http://localhost:3000/v1".to_string(),
            api_key: String::new(),
            model_name: "text-embedding-v1".to_string(),
            dimension: 1536,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub api_type: String,
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub timeout_secs: Option<u64>,
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_type: "openai".to_string(),
            base_url: "http://localhost:3000/v1".to_string(),
            api_key: String::new(),
            model_name: "qwen-turbo".to_string(),
            timeout_secs: None,
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorConfig {
    /// `lance` or `memory`.
    pub backend: String,
    pub uri: String,
    pub collection: String,
    pub id_field: String,
    pub vector_field: String,
    pub text_field: String,
    pub text_max_len: usize,
    pub metric: Metric,
    pub manage_timeout_secs: u64,
    pub index_timeout_secs: u64,
    pub load_timeout_secs: u64,
    pub search_timeout_secs: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: "lance".to_string(),
            uri: "../dev_data/indexes/lancedb".to_string(),
            collection: "crew_prod_collection".to_string(),
            id_field: "my_id".to_string(),
            vector_field: "my_vector".to_string(),
            text_field: "my_varchar".to_string(),
            text_max_len: 512,
            metric: Metric::Cosine,
            manage_timeout_secs: 20,
            index_timeout_secs: 10,
            load_timeout_secs: 10,
            search_timeout_secs: 10,
        }
    }
}

/// Deadlines for the blocking calls into a vector backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorTimeouts {
    pub manage: Duration,
    pub index: Duration,
    pub load: Duration,
    pub search: Duration,
}

impl Default for VectorTimeouts {
    fn default() -> Self {
        VectorConfig::default().timeouts()
    }
}

impl VectorConfig {
    pub fn timeouts(&self) -> VectorTimeouts {
        VectorTimeouts {
            manage: Duration::from_secs(self.manage_timeout_secs),
            index: Duration::from_secs(self.index_timeout_secs),
            load: Duration::from_secs(self.load_timeout_secs),
            search: Duration::from_secs(self.search_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub raw_txt_dir: String,
    pub max_chunk_chars: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { raw_txt_dir: "../dev_data/txt".to_string(), max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    pub output_dir: String,
    /// Rewrite each answer through the LLM before rendering.
    pub use_llm: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { enabled: true, output_dir: "output".to_string(), use_llm: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub vector: VectorConfig,
    pub data: DataConfig,
    pub report: ReportConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be positive".to_string()));
        }
        if self.embedding.base_url.trim().is_empty() {
            return Err(Error::Config("embedding.base_url is empty".to_string()));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(Error::Config("llm.base_url is empty".to_string()));
        }
        match self.vector.backend.as_str() {
            "lance" | "memory" => {}
            other => return Err(Error::Config(format!("unknown vector.backend '{other}'"))),
        }
        if self.vector.collection.trim().is_empty() {
            return Err(Error::Config("vector.collection is empty".to_string()));
        }
        let fields = [&self.vector.id_field, &self.vector.vector_field, &self.vector.text_field];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(Error::Config("vector field names must be non-empty".to_string()));
        }
        if fields[0] == fields[1] || fields[0] == fields[2] || fields[1] == fields[2] {
            return Err(Error::Config("vector field names must be distinct".to_string()));
        }
        if self.vector.text_max_len == 0 {
            return Err(Error::Config("vector.text_max_len must be positive".to_string()));
        }
        let timeouts = [
            self.vector.manage_timeout_secs,
            self.vector.index_timeout_secs,
            self.vector.load_timeout_secs,
            self.vector.search_timeout_secs,
        ];
        if timeouts.contains(&0) {
            return Err(Error::Config("vector timeouts must be positive".to_string()));
        }
        if self.data.max_chunk_chars == 0 {
            return Err(Error::Config("data.max_chunk_chars must be positive".to_string()));
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load from the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Wrap an explicit figment, mostly for tests and embedding callers.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Config(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Config(format!("Failed to extract settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against `base` after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
