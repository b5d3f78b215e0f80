use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sources: Vec<SourceConfig>,
    pub enrichment: EnrichmentConfig,
    pub run: RunConfig,
    pub storage: StorageConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            enrichment: EnrichmentConfig::default(),
            run: RunConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Registry key of the adapter that handles this source.
    pub id: String,
    pub name: String,
    pub url: String,
    /// Overrides the adapter's card selector.
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SourceConfig {
    pub fn new(id: &str, name: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            selector: None,
            timeout_secs: default_source_timeout(),
            max_items: default_max_items(),
            enabled: true,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_source_timeout() -> u64 {
    10
}
fn default_max_items() -> usize {
    5
}
fn default_true() -> bool {
    true
}

pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("sparklabs-taiwan", "SparkLabs Taiwan", "https://www.sparklabstaiwan.com"),
        SourceConfig::new("startup101", "Startup 101", "https://startup101.biz/"),
        SourceConfig::new("886studios", "886 Studios", "https://886studios.com/resources"),
        SourceConfig::new("500-global", "500 Global", "https://500.co/"),
        SourceConfig::new("appworks", "AppWorks", "https://appworks.tw/"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentProvider {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Dummy,
}

impl EnrichmentProvider {
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Dummy)
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub provider: EnrichmentProvider,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Injected from the environment, never read from or written to files.
    #[serde(skip)]
    pub api_key: Option<String>,
    pub language: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    pub breaker_threshold: u32,
    pub concurrency: usize,
    pub request_timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            provider: EnrichmentProvider::Gemini,
            model: None,
            base_url: None,
            api_key: None,
            language: "Traditional Chinese".to_string(),
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_ms: 250,
            breaker_threshold: 5,
            concurrency: 4,
            request_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for EnrichmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("language", &self.language)
            .field("max_attempts", &self.max_attempts)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("jitter_ms", &self.jitter_ms)
            .field("breaker_threshold", &self.breaker_threshold)
            .field("concurrency", &self.concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Wall-clock budget of one run, measured from its start.
    pub deadline_secs: u64,
    pub reconcile_failed: bool,
    pub reconcile_limit: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 510,
            reconcile_failed: true,
            reconcile_limit: 20,
        }
    }
}

impl RunConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Sqlite,
            path: PathBuf::from("articles.db"),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Configuration(format!("Invalid config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Checks everything that must hold before a run touches the network.
    pub fn validate(&self, known_adapters: &[&str]) -> Result<()> {
        if self.enabled_sources().next().is_none() {
            return Err(Error::Configuration("No sources configured".to_string()));
        }
        for source in self.enabled_sources() {
            if !known_adapters.contains(&source.id.as_str()) {
                return Err(Error::Configuration(format!(
                    "No adapter registered for source `{}`",
                    source.id
                )));
            }
            if source.max_items == 0 {
                return Err(Error::Configuration(format!(
                    "Source `{}` has max_items = 0",
                    source.id
                )));
            }
        }
        self.enrichment.validate()
    }
}

impl EnrichmentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.provider.requires_api_key()
            && self.api_key.as_deref().map(str::trim).unwrap_or_default().is_empty()
        {
            return Err(Error::Configuration(format!(
                "Missing API key for enrichment provider {:?}",
                self.provider
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::Configuration("enrichment.max_attempts must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Configuration("enrichment.concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &["sparklabs-taiwan", "startup101", "886studios", "500-global", "appworks"];

    fn with_key(mut config: PipelineConfig) -> PipelineConfig {
        config.enrichment.api_key = Some("secret".to_string());
        config
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.sources.len(), 5);
        assert_eq!(config.enrichment.max_attempts, 3);
        assert_eq!(config.enrichment.breaker_threshold, 5);
        assert_eq!(config.run.deadline_secs, 510);
        assert_eq!(config.storage.backend, StorageBackendKind::Sqlite);
        assert!(with_key(config).validate(KNOWN).is_ok());
    }

    #[test]
    fn test_parse_overrides() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [[sources]]
            id = "appworks"
            name = "AppWorks"
            url = "https://appworks.tw/"
            timeout_secs = 3

            [enrichment]
            provider = "dummy"
            concurrency = 2

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].timeout(), Duration::from_secs(3));
        assert_eq!(config.sources[0].max_items, 5);
        assert_eq!(config.enrichment.provider, EnrichmentProvider::Dummy);
        assert_eq!(config.enrichment.concurrency, 2);
        assert_eq!(config.storage.backend, StorageBackendKind::Memory);
        assert!(config.validate(KNOWN).is_ok());
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let err = PipelineConfig::from_toml_str("[enrichment]\nprovider = \"bard\"").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let mut config = with_key(PipelineConfig::default());
        config.sources.iter_mut().for_each(|s| s.enabled = false);
        assert!(matches!(config.validate(KNOWN), Err(Error::Configuration(_))));

        let config = PipelineConfig::default();
        assert!(matches!(config.validate(KNOWN), Err(Error::Configuration(_))));

        let mut config = with_key(PipelineConfig::default());
        config.sources.push(SourceConfig::new("techcrunch", "TechCrunch", "https://techcrunch.com"));
        assert!(matches!(config.validate(KNOWN), Err(Error::Configuration(_))));

        let mut config = with_key(PipelineConfig::default());
        config.enrichment.concurrency = 0;
        assert!(matches!(config.validate(KNOWN), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = with_key(PipelineConfig::default());
        let rendered = format!("{:?}", config.enrichment);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
