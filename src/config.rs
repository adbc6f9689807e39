use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docingest_core::chunker::ChunkConfig;
use docingest_core::segment::{SegmenterConfig, SUPPORTED_LANGUAGES};
use docingest_core::tokens::TokenizerKind;
use docingest_core::validate::{DEFAULT_MAX_BYTES, MIME_PDF};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub segmenter: SegmenterSection,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory stored PDFs are written to.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}
fn default_allowed_mime_types() -> Vec<String> {
    vec![MIME_PDF.to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_tokens")]
    pub target_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
    #[serde(default = "default_min_chunk_tokens")]
    pub min_chunk_tokens: usize,
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: default_target_tokens(),
            overlap_tokens: default_overlap_tokens(),
            min_chunk_tokens: default_min_chunk_tokens(),
            tokenizer: default_tokenizer(),
        }
    }
}

impl ChunkingConfig {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            target_size: self.target_tokens,
            overlap: self.overlap_tokens,
            min_chunk_size: self.min_chunk_tokens,
        }
    }
}

fn default_target_tokens() -> usize {
    512
}
fn default_overlap_tokens() -> usize {
    50
}
fn default_min_chunk_tokens() -> usize {
    100
}
fn default_tokenizer() -> String {
    "cl100k_base".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmenterSection {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub extra_abbreviations: Vec<String>,
}

impl Default for SegmenterSection {
    fn default() -> Self {
        Self {
            language: default_language(),
            extra_abbreviations: Vec::new(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Config {
    /// Segmenter settings, with the tokenizer taken from `[chunking]`.
    pub fn segmenter_config(&self) -> Result<SegmenterConfig> {
        let tokenizer: TokenizerKind = self.chunking.tokenizer.parse()?;
        Ok(SegmenterConfig {
            language: self.segmenter.language.clone(),
            tokenizer,
            extra_abbreviations: self.segmenter.extra_abbreviations.clone(),
        })
    }

    /// Check invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.upload.max_bytes == 0 {
            bail!("upload.max_bytes must be > 0");
        }
        if self.upload.allowed_mime_types.is_empty() {
            bail!("upload.allowed_mime_types must list at least one type");
        }

        self.chunking
            .chunk_config()
            .validate()
            .map_err(|e| anyhow::anyhow!("chunking: {}", e))?;

        if let Err(e) = self.chunking.tokenizer.parse::<TokenizerKind>() {
            bail!("chunking.tokenizer: {}", e);
        }

        if !SUPPORTED_LANGUAGES.contains(&self.segmenter.language.as_str()) {
            bail!(
                "Unknown segmenter language: '{}'. Supported: {}.",
                self.segmenter.language,
                SUPPORTED_LANGUAGES.join(", ")
            );
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
