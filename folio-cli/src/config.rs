use anyhow::{Context, Result, bail};
use folio_ingest::{DocumentOptions, FileKind, LlmConfig, Provider};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::state::ensure_folio_home;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub extraction: ExtractionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key. The key itself is never stored.
    pub api_key_env: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    pub timeout_secs: u64,
    pub retries: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-3-5-sonnet-latest".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 8192,
        }
    }
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            retries: 1,
        }
    }
}

impl Config {
    pub fn document_options(&self) -> DocumentOptions {
        DocumentOptions {
            timeout: Duration::from_secs(self.extraction.timeout_secs.max(1)),
            retries: self.extraction.retries,
        }
    }

    /// LLM settings for the document path, or `None` when no API key is available.
    pub fn llm_config(&self) -> Result<Option<LlmConfig>> {
        let Some(provider) = Provider::parse(&self.llm.provider) else {
            bail!("unknown llm provider '{}' (expected anthropic or openai)", self.llm.provider);
        };
        let api_key = match std::env::var(&self.llm.api_key_env) {
            Ok(k) if !k.trim().is_empty() => k,
            _ => return Ok(None),
        };
        Ok(Some(LlmConfig {
            provider,
            model: self.llm.model.clone(),
            base_url: self.llm.base_url.clone(),
            api_key,
            max_tokens: self.llm.max_tokens,
        }))
    }

    /// LLM settings needed to parse a file of `kind`; `None` for anything but documents.
    pub fn llm_config_for(&self, kind: Option<FileKind>) -> Result<Option<LlmConfig>> {
        match kind {
            Some(FileKind::Pdf) => self.llm_config(),
            _ => Ok(None),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_folio_home()?.join("config.toml"))
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg.llm.provider, "anthropic");
        assert_eq!(cfg.extraction.timeout_secs, 60);
        assert_eq!(cfg.document_options().retries, 1);
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        fs::write(&p, "[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\n\n[extraction]\ntimeout_secs = 15\n").unwrap();
        let cfg = load_config_from(&p).unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.max_tokens, 8192);
        assert_eq!(cfg.extraction.timeout_secs, 15);
        assert_eq!(cfg.extraction.retries, 1);
    }

    #[test]
    fn test_no_api_key_means_no_llm() {
        let mut cfg = Config::default();
        cfg.llm.api_key_env = "FOLIO_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(cfg.llm_config().unwrap().is_none());
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        let mut cfg = Config::default();
        cfg.llm.provider = "gemini".to_string();
        assert!(cfg.llm_config().is_err());
    }

    #[test]
    fn test_bad_provider_only_affects_documents() {
        let mut cfg = Config::default();
        cfg.llm.provider = "anthropc".to_string();
        assert!(cfg.llm_config_for(Some(FileKind::Csv)).unwrap().is_none());
        assert!(cfg.llm_config_for(Some(FileKind::Xlsx)).unwrap().is_none());
        assert!(cfg.llm_config_for(None).unwrap().is_none());
        assert!(cfg.llm_config_for(Some(FileKind::Pdf)).is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.llm.api_key_env, "ANTHROPIC_API_KEY");
    }
}
