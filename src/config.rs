use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub tour_api: TourApiConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub image: ImageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dims")]
    pub embedding_dims: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            embedding_dims: default_embedding_dims(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dims() -> usize {
    1536
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    600
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct TourApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    /// Listing over-fetch factor: the listing call asks for
    /// `max(page_size_floor, want * fetch_multiplier)` rows so the category
    /// filter and cleanup heuristics still leave enough candidates.
    #[serde(default = "default_fetch_multiplier")]
    pub fetch_multiplier: usize,
    #[serde(default = "default_page_size_floor")]
    pub page_size_floor: usize,
}

impl Default for TourApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_api_timeout_secs(),
            fetch_multiplier: default_fetch_multiplier(),
            page_size_floor: default_page_size_floor(),
        }
    }
}

fn default_base_url() -> String {
    "http://apis.data.go.kr/B551011/KorService2".to_string()
}
fn default_api_timeout_secs() -> u64 {
    10
}
fn default_fetch_multiplier() -> usize {
    6
}
fn default_page_size_floor() -> usize {
    80
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecommendConfig {
    #[serde(default = "default_num_recommend")]
    pub num_recommend: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            num_recommend: default_num_recommend(),
        }
    }
}

fn default_num_recommend() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// Cosine similarity floor for treating a cached query as a hit.
    /// Below this the cache reports a miss.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            similarity_threshold: default_similarity_threshold(),
            enabled: default_cache_enabled(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("vector_cache.jsonl")
}
fn default_similarity_threshold() -> f32 {
    0.82
}
fn default_cache_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_allowed_exts")]
    pub allowed_exts: HashSet<String>,
    #[serde(default = "default_deny_domains")]
    pub deny_domains: HashSet<String>,
    #[serde(default = "default_min_bytes")]
    pub min_bytes: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_require_head_ok")]
    pub require_head_ok: bool,
    /// Hosts whose HEAD responses are known to be unreliable; the HEAD
    /// check is skipped for these.
    #[serde(default = "default_head_whitelist")]
    pub head_whitelist: HashSet<String>,
    #[serde(default = "default_url_cache_ttl_secs")]
    pub url_cache_ttl_secs: u64,
    #[serde(default = "default_url_cache_max")]
    pub url_cache_max: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            allowed_exts: default_allowed_exts(),
            deny_domains: default_deny_domains(),
            min_bytes: default_min_bytes(),
            max_bytes: default_max_bytes(),
            require_head_ok: default_require_head_ok(),
            head_whitelist: default_head_whitelist(),
            url_cache_ttl_secs: default_url_cache_ttl_secs(),
            url_cache_max: default_url_cache_max(),
        }
    }
}

fn default_allowed_exts() -> HashSet<String> {
    ["jpg", "jpeg", "png", "webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_deny_domains() -> HashSet<String> {
    ["example.com", "localhost", "127.0.0.1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_min_bytes() -> u64 {
    1024
}
fn default_max_bytes() -> u64 {
    15 * 1024 * 1024
}
fn default_require_head_ok() -> bool {
    true
}
fn default_head_whitelist() -> HashSet<String> {
    ["tong.visitkorea.or.kr"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_url_cache_ttl_secs() -> u64 {
    7 * 24 * 3600
}
fn default_url_cache_max() -> usize {
    1000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.recommend.num_recommend < 1 {
        anyhow::bail!("recommend.num_recommend must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.cache.similarity_threshold) {
        anyhow::bail!("cache.similarity_threshold must be in [0.0, 1.0]");
    }

    if config.tour_api.fetch_multiplier < 1 {
        anyhow::bail!("tour_api.fetch_multiplier must be >= 1");
    }

    if config.openai.embedding_dims == 0 {
        anyhow::bail!("openai.embedding_dims must be > 0");
    }

    Ok(config)
}

/// Load the config file if present, otherwise fall back to defaults.
/// API keys always come from the environment, so a missing file is
/// a perfectly usable setup.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}
