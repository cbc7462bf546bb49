use eyre::{Result, WrapErr};
use macrolog::InterpreterOptions;
use macrolog::llm::{AnthropicClient, AnthropicConfig, GeminiClient, GeminiConfig, LlmClient, anthropic, gemini};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub interpreter: InterpreterConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Anthropic,
    Gemini,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub temperature: Option<f32>,
    pub api_key_env: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: None,
            max_tokens: 2048,
            timeout_ms: 30000,
            temperature: None,
            api_key_env: None,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Environment variable the API key is read from
    pub fn api_key_env(&self) -> &str {
        match (&self.api_key_env, self.provider) {
            (Some(var), _) => var.as_str(),
            (None, Provider::Anthropic) => anthropic::ANTHROPIC_API_KEY_ENV,
            (None, Provider::Gemini) => gemini::GEMINI_API_KEY_ENV,
        }
    }

    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model.as_str(),
            (None, Provider::Anthropic) => anthropic::DEFAULT_MODEL,
            (None, Provider::Gemini) => gemini::DEFAULT_MODEL,
        }
    }

    /// Construct the configured model client
    pub fn build_client(&self) -> Result<Arc<dyn LlmClient>> {
        let client: Arc<dyn LlmClient> = match self.provider {
            Provider::Anthropic => {
                let config = AnthropicConfig {
                    max_tokens: self.max_tokens,
                    timeout: self.timeout(),
                    ..AnthropicConfig::with_model(self.model())
                };
                Arc::new(AnthropicClient::from_env(self.api_key_env(), config).wrap_err("Failed to create Anthropic client")?)
            }
            Provider::Gemini => {
                let config = GeminiConfig {
                    max_tokens: self.max_tokens,
                    timeout: self.timeout(),
                    ..GeminiConfig::with_model(self.model())
                };
                Arc::new(GeminiClient::from_env(self.api_key_env(), config).wrap_err("Failed to create Gemini client")?)
            }
        };

        log::info!("Using {:?} model {}", self.provider, client.model());
        Ok(client)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub max_description_chars: usize,
    pub totals_tolerance: f64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_description_chars: 2000,
            totals_tolerance: 0.05,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            interpreter: InterpreterConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).wrap_err(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).wrap_err("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).wrap_err("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Interpreter tunables derived from the llm and interpreter sections
    pub fn interpreter_options(&self) -> InterpreterOptions {
        InterpreterOptions {
            timeout: self.llm.timeout(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            model: None,
            max_description_chars: self.interpreter.max_description_chars,
            totals_tolerance: self.interpreter.totals_tolerance,
        }
    }
}
