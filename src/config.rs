use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `stripe` or `bmac`. Validated when the access gate is built.
    #[serde(default = "default_payment_provider")]
    pub payment_provider: String,
    /// Use Stripe test credentials and the test payment link
    #[serde(default)]
    pub testing_mode: bool,
    #[serde(default)]
    pub openai: OpenAIConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub bmac: BmacConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_payment_provider() -> String {
    "stripe".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: Option<String>,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo-16k".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StripeConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_key_test: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub link_test: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BmacConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub link: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

/// Chunking and model parameters for the quiz pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_tokenizer_model")]
    pub tokenizer_model: String,
    #[serde(default = "default_question_chunk_size")]
    pub question_chunk_size: usize,
    #[serde(default = "default_question_chunk_overlap")]
    pub question_chunk_overlap: usize,
    #[serde(default = "default_answer_chunk_size")]
    pub answer_chunk_size: usize,
    #[serde(default = "default_answer_chunk_overlap")]
    pub answer_chunk_overlap: usize,
    #[serde(default)]
    pub question_temperature: f32,
    #[serde(default)]
    pub answer_temperature: f32,
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,
}

fn default_tokenizer_model() -> String {
    "gpt-3.5-turbo-16k".to_string()
}

fn default_question_chunk_size() -> usize {
    10000
}

fn default_question_chunk_overlap() -> usize {
    200
}

fn default_answer_chunk_size() -> usize {
    1000
}

fn default_answer_chunk_overlap() -> usize {
    100
}

fn default_retrieval_k() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tokenizer_model: default_tokenizer_model(),
            question_chunk_size: default_question_chunk_size(),
            question_chunk_overlap: default_question_chunk_overlap(),
            answer_chunk_size: default_answer_chunk_size(),
            answer_chunk_overlap: default_answer_chunk_overlap(),
            question_temperature: 0.0,
            answer_temperature: 0.0,
            retrieval_k: default_retrieval_k(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            payment_provider: default_payment_provider(),
            testing_mode: false,
            openai: OpenAIConfig::default(),
            stripe: StripeConfig::default(),
            bmac: BmacConfig::default(),
            google: GoogleConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Get the configuration directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("smartquiz");
        Ok(config_dir)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Configuration file not found at {}. Run 'smartquiz init' first.",
                config_path.display()
            );
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file at {}", config_path.display()))
    }

    /// Parse a configuration document and resolve its secrets
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.expand_env_vars();
        Ok(config)
    }

    /// Expand environment variables in secret values
    fn expand_env_vars(&mut self) {
        self.openai.api_key = expand_env_var(&self.openai.api_key);
        if self.openai.api_key.is_empty() {
            self.openai.api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        }
        self.stripe.api_key = expand_env_var(&self.stripe.api_key);
        self.stripe.api_key_test = expand_env_var(&self.stripe.api_key_test);
        self.bmac.api_key = expand_env_var(&self.bmac.api_key);
        self.google.client_id = expand_env_var(&self.google.client_id);
        self.google.client_secret = expand_env_var(&self.google.client_secret);
    }

    /// Stripe secret key for the current mode
    pub fn stripe_api_key(&self) -> &str {
        if self.testing_mode {
            &self.stripe.api_key_test
        } else {
            &self.stripe.api_key
        }
    }

    /// Stripe payment link for the current mode
    pub fn stripe_link(&self) -> &str {
        if self.testing_mode {
            &self.stripe.link_test
        } else {
            &self.stripe.link
        }
    }
}

/// Expand environment variable references like ${VAR_NAME}
fn expand_env_var(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).unwrap_or_default()
    } else if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_default()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_var_braces() {
        // SAFETY: test is single-threaded
        unsafe { std::env::set_var("SMARTQUIZ_TEST_VAR_A", "value_a") };
        assert_eq!(expand_env_var("${SMARTQUIZ_TEST_VAR_A}"), "value_a");
        unsafe { std::env::remove_var("SMARTQUIZ_TEST_VAR_A") };
    }

    #[test]
    fn test_expand_env_var_dollar() {
        unsafe { std::env::set_var("SMARTQUIZ_TEST_VAR_B", "value_b") };
        assert_eq!(expand_env_var("$SMARTQUIZ_TEST_VAR_B"), "value_b");
        unsafe { std::env::remove_var("SMARTQUIZ_TEST_VAR_B") };
    }

    #[test]
    fn test_expand_env_var_literal() {
        assert_eq!(expand_env_var("sk_live_literal"), "sk_live_literal");
    }

    #[test]
    fn test_expand_env_var_missing_returns_empty() {
        assert_eq!(expand_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), "");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.payment_provider, "stripe");
        assert!(!config.testing_mode);
        assert_eq!(config.openai.chat_model, "gpt-3.5-turbo-16k");
        assert_eq!(config.openai.embedding_model, "text-embedding-ada-002");
        assert_eq!(config.pipeline.question_chunk_size, 10000);
        assert_eq!(config.pipeline.question_chunk_overlap, 200);
        assert_eq!(config.pipeline.answer_chunk_size, 1000);
        assert_eq!(config.pipeline.answer_chunk_overlap, 100);
        assert_eq!(config.pipeline.retrieval_k, 4);
        assert_eq!(config.pipeline.answer_temperature, 0.0);
        assert_eq!(config.pipeline.question_temperature, 0.0);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            payment_provider = "bmac"

            [openai]
            api_key = "sk-test"
            chat_model = "gpt-4o-mini"

            [bmac]
            api_key = "bmac-token"
            link = "https://buymeacoffee.com/example"

            [pipeline]
            answer_chunk_size = 500
            answer_chunk_overlap = 50
        "#;
        let config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.payment_provider, "bmac");
        assert_eq!(config.openai.api_key, "sk-test");
        assert_eq!(config.openai.chat_model, "gpt-4o-mini");
        assert_eq!(config.bmac.link, "https://buymeacoffee.com/example");
        assert_eq!(config.pipeline.answer_chunk_size, 500);
        assert_eq!(config.pipeline.question_chunk_size, 10000);
    }

    #[test]
    fn test_stripe_testing_mode_switches_credentials() {
        let toml_str = r#"
            testing_mode = true

            [stripe]
            api_key = "sk_live_1"
            api_key_test = "sk_test_1"
            link = "https://buy.stripe.com/live"
            link_test = "https://buy.stripe.com/test"
        "#;
        let mut config = Config::from_toml(toml_str).unwrap();
        assert_eq!(config.stripe_api_key(), "sk_test_1");
        assert_eq!(config.stripe_link(), "https://buy.stripe.com/test");

        config.testing_mode = false;
        assert_eq!(config.stripe_api_key(), "sk_live_1");
        assert_eq!(config.stripe_link(), "https://buy.stripe.com/live");
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let mut config = Config::default();
        config.payment_provider = "bmac".into();
        config.openai.api_key = "sk-123".into();

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized = Config::from_toml(&serialized).unwrap();
        assert_eq!(deserialized.payment_provider, "bmac");
        assert_eq!(deserialized.openai.api_key, "sk-123");
        assert_eq!(deserialized.pipeline.retrieval_k, 4);
    }
}
