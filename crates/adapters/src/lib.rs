mod base_url;
mod error;
mod llm;
mod retry;

pub use base_url::normalize_base_url;
pub use error::AdapterError;
pub use llm::{create_llm_adapter, create_llm_adapter_from_profile};
pub use retry::{call_with_retry, RetryConfig};

pub use story_core::{Config, ConfigStore, Credential, LanguageModel, LanguageModelError, LlmConfig};
