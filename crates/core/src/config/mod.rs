use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_PROFILE_NAME: &str = "openai";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_interface_format() -> String {
    "openai".to_string()
}

fn default_model_name() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    1.0
}

fn default_max_tokens() -> u32 {
    300
}

fn default_timeout() -> u64 {
    600
}

fn default_max_retries() -> usize {
    1
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no API credential configured for profile `{profile}`: set the `{env}` environment variable or `api_key` in the config file")]
    MissingCredential { profile: String, env: String },
    #[error("unknown LLM profile `{0}`")]
    UnknownProfile(String),
    #[error("no LLM profile is configured")]
    MissingProfile,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// Literal key; only consulted when the environment variable is unset.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_interface_format")]
    pub interface_format: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_key_env: default_api_key_env(),
            base_url: String::new(),
            interface_format: default_interface_format(),
            model_name: default_model_name(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// The secret used to authenticate against the completion endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Resolves the credential for `profile` from the process environment,
    /// falling back to the literal `api_key`.
    pub fn resolve(profile_name: &str, profile: &LlmConfig) -> Result<Self, ConfigError> {
        Self::resolve_with(profile_name, profile, |name| std::env::var(name).ok())
    }

    pub fn resolve_with<F>(
        profile_name: &str,
        profile: &LlmConfig,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_name = profile.api_key_env.trim();
        if !env_name.is_empty() {
            if let Some(value) = lookup(env_name) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return Ok(Self(trimmed.to_string()));
                }
            }
        }

        let literal = profile.api_key.trim();
        if !literal.is_empty() {
            return Ok(Self(literal.to_string()));
        }

        Err(ConfigError::MissingCredential {
            profile: profile_name.to_string(),
            env: env_name.to_string(),
        })
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PromptConfig {
    #[serde(default)]
    pub custom_directories: Vec<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RecentUsage {
    #[serde(default)]
    pub last_llm_interface: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub llm_profiles: BTreeMap<String, LlmConfig>,
    #[serde(default)]
    pub prompts: PromptConfig,
    #[serde(default)]
    pub recent: RecentUsage,
}

impl Default for Config {
    fn default() -> Self {
        let mut llm_profiles = BTreeMap::new();
        llm_profiles.insert(DEFAULT_PROFILE_NAME.to_string(), LlmConfig::default());
        Self {
            llm_profiles,
            prompts: PromptConfig::default(),
            recent: RecentUsage::default(),
        }
    }
}

impl Config {
    pub fn get_llm_profile(&self, name: &str) -> Option<&LlmConfig> {
        self.llm_profiles.get(name)
    }

    pub fn upsert_llm_profile<S: Into<String>>(&mut self, name: S, profile: LlmConfig) {
        self.llm_profiles.insert(name.into(), profile);
    }

    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = if path.exists() {
            Config::from_path(&path)?
        } else {
            Config::default()
        };

        Ok(Self { path, config })
    }

    pub fn with_config(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.config.to_path(&self.path)
    }

    pub fn touch_llm_interface<S: Into<String>>(&mut self, name: S) {
        self.config.recent.last_llm_interface = Some(name.into());
    }

    pub fn last_llm_interface(&self) -> Option<&str> {
        self.config
            .recent
            .last_llm_interface
            .as_deref()
            .and_then(|name| self.config.llm_profiles.get(name).map(|_| name))
    }

    pub fn ensure_recent_defaults(&mut self) {
        if self
            .config
            .recent
            .last_llm_interface
            .as_ref()
            .map(|name| self.config.llm_profiles.contains_key(name))
            != Some(true)
        {
            let next = self.config.llm_profiles.keys().next().cloned();
            self.config.recent.last_llm_interface = next;
        }
    }

    /// Picks the profile to use: the explicit preference, then the most
    /// recently used one, then the first configured one.
    pub fn select_llm_profile(&self, preferred: Option<&str>) -> Result<String, ConfigError> {
        if let Some(name) = preferred.map(str::trim).filter(|name| !name.is_empty()) {
            if self.config.llm_profiles.contains_key(name) {
                return Ok(name.to_string());
            }
            return Err(ConfigError::UnknownProfile(name.to_string()));
        }

        if let Some(name) = self.last_llm_interface() {
            return Ok(name.to_string());
        }

        self.config
            .llm_profiles
            .keys()
            .next()
            .cloned()
            .ok_or(ConfigError::MissingProfile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn parses_profile_config_with_defaults() {
        let json = r#"{
            "llm_profiles": {
                "deepseek": {
                    "api_key_env": "DEEPSEEK_API_KEY",
                    "base_url": "https://api.deepseek.com/v1",
                    "interface_format": "DeepSeek",
                    "model_name": "deepseek-chat"
                }
            },
            "prompts": { "custom_directories": ["prompts"] },
            "recent": { "last_llm_interface": "deepseek" }
        }"#;

        let config = Config::from_json_str(json).unwrap();
        let profile = config.get_llm_profile("deepseek").unwrap();
        assert_eq!(profile.max_tokens, 300);
        assert_eq!(profile.top_p, 1.0);
        assert_eq!(profile.max_retries, 1);
        assert_eq!(config.prompts.custom_directories, vec![PathBuf::from("prompts")]);
        assert_eq!(config.recent.last_llm_interface.as_deref(), Some("deepseek"));
    }

    #[test]
    fn empty_input_yields_default_openai_profile() {
        let config = Config::from_json_str("   ").unwrap();
        let profile = config.get_llm_profile(DEFAULT_PROFILE_NAME).unwrap();
        assert_eq!(profile.model_name, "gpt-3.5-turbo");
        assert_eq!(profile.api_key_env, DEFAULT_API_KEY_ENV);
        assert_eq!(profile.temperature, 0.7);
    }

    #[test]
    fn credential_prefers_environment_over_literal() {
        let profile = LlmConfig {
            api_key: "literal".into(),
            ..LlmConfig::default()
        };
        let credential = Credential::resolve_with("openai", &profile, |name| {
            (name == DEFAULT_API_KEY_ENV).then(|| "from-env".to_string())
        })
        .unwrap();
        assert_eq!(credential.expose(), "from-env");
    }

    #[test]
    fn credential_falls_back_to_literal_key() {
        let profile = LlmConfig {
            api_key: " literal ".into(),
            ..LlmConfig::default()
        };
        let credential = Credential::resolve_with("openai", &profile, |_| None).unwrap();
        assert_eq!(credential.expose(), "literal");
    }

    #[test]
    fn blank_credential_is_missing() {
        let profile = LlmConfig::default();
        let err = Credential::resolve_with("openai", &profile, |_| Some("   ".into()))
            .expect_err("blank env value must not count");
        match err {
            ConfigError::MissingCredential { profile, env } => {
                assert_eq!(profile, "openai");
                assert_eq!(env, DEFAULT_API_KEY_ENV);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("sk-secret");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
    }

    #[test]
    fn store_persists_config() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("config.json");

        let mut store = ConfigStore::open(config_path.clone()).unwrap();
        store.config_mut().upsert_llm_profile(
            "local",
            LlmConfig {
                base_url: "http://localhost:11434/v1".into(),
                interface_format: "Ollama".into(),
                model_name: "llama3".into(),
                ..LlmConfig::default()
            },
        );
        store.touch_llm_interface("local");
        store.save().unwrap();

        let store = ConfigStore::open(config_path).unwrap();
        assert_eq!(store.last_llm_interface(), Some("local"));
        assert!(store.config().llm_profiles.contains_key("local"));
    }

    #[test]
    fn select_profile_prefers_explicit_then_recent() {
        let mut store = ConfigStore::open(PathBuf::from("/nonexistent/config.json")).unwrap();
        store
            .config_mut()
            .upsert_llm_profile("zeta", LlmConfig::default());

        assert_eq!(store.select_llm_profile(Some("zeta")).unwrap(), "zeta");
        assert_eq!(store.select_llm_profile(None).unwrap(), DEFAULT_PROFILE_NAME);

        store.touch_llm_interface("zeta");
        assert_eq!(store.select_llm_profile(Some("  ")).unwrap(), "zeta");

        let err = store.select_llm_profile(Some("missing")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(name) if name == "missing"));
    }

    #[test]
    fn ensure_recent_defaults_backfills_missing_profiles() {
        let mut store = ConfigStore::open(PathBuf::from("/nonexistent/config.json")).unwrap();
        store.touch_llm_interface("gone");
        store.ensure_recent_defaults();
        assert_eq!(store.last_llm_interface(), Some(DEFAULT_PROFILE_NAME));
    }
}
