use std::time::Duration;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use story_core::{ChatMessage, Config, Credential, LanguageModel, LanguageModelError, LlmConfig};

use crate::base_url::normalize_base_url;
use crate::error::AdapterError;
use crate::retry::{call_with_retry, RetryConfig};

const RETRY_SLEEP: Duration = Duration::from_secs(2);

/// Resolves the credential for `profile_name` and builds its adapter.
pub fn create_llm_adapter(
    config: &Config,
    profile_name: &str,
) -> Result<Box<dyn LanguageModel>, AdapterError> {
    let profile = config.get_llm_profile(profile_name).ok_or_else(|| {
        AdapterError::invalid_config(format!("unknown LLM profile `{profile_name}`"))
    })?;
    let credential = Credential::resolve(profile_name, profile)?;
    create_llm_adapter_from_profile(profile, &credential)
}

pub fn create_llm_adapter_from_profile(
    profile: &LlmConfig,
    credential: &Credential,
) -> Result<Box<dyn LanguageModel>, AdapterError> {
    let settings = RequestSettings::from_profile(profile);
    let fmt = profile.interface_format.trim().to_lowercase();

    let default_base_url = match fmt.as_str() {
        "" | "openai" => "https://api.openai.com/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "grok" => "https://api.x.ai/v1",
        "ollama" => "http://localhost:11434/v1",
        "lm studio" => "http://localhost:1234/v1",
        "azure openai" => {
            return Ok(Box::new(AzureOpenAiAdapter::new(
                credential,
                &profile.base_url,
                settings,
            )?))
        }
        other => {
            return Err(AdapterError::invalid_config(format!(
                "unknown interface_format: {other}"
            )))
        }
    };

    Ok(Box::new(OpenAiLikeAdapter::new(
        normalize_base_url(&profile.base_url, default_base_url),
        credential,
        profile.model_name.clone(),
        settings,
    )?))
}

/// Sampling and transport settings shared by every adapter.
#[derive(Clone, Copy, Debug)]
struct RequestSettings {
    max_tokens: Option<u32>,
    temperature: f32,
    top_p: f32,
    timeout: Duration,
    retry: RetryConfig,
}

impl RequestSettings {
    fn from_profile(profile: &LlmConfig) -> Self {
        Self {
            max_tokens: (profile.max_tokens > 0).then_some(profile.max_tokens),
            temperature: profile.temperature,
            top_p: profile.top_p,
            timeout: Duration::from_secs(profile.timeout.max(1)),
            retry: RetryConfig::new(profile.max_retries.max(1), RETRY_SLEEP),
        }
    }

    fn build_client(&self) -> Result<Client, AdapterError> {
        Ok(Client::builder().timeout(self.timeout).build()?)
    }
}

struct OpenAiLikeAdapter {
    client: Client,
    url: String,
    api_key: String,
    model_name: String,
    settings: RequestSettings,
}

impl OpenAiLikeAdapter {
    fn new(
        base_url: String,
        credential: &Credential,
        model_name: String,
        settings: RequestSettings,
    ) -> Result<Self, AdapterError> {
        if base_url.trim().is_empty() {
            return Err(AdapterError::invalid_config("base_url must not be empty"));
        }
        if model_name.trim().is_empty() {
            return Err(AdapterError::invalid_config("model_name must not be empty"));
        }

        Ok(Self {
            client: settings.build_client()?,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: credential.expose().to_string(),
            model_name,
            settings,
        })
    }

    fn invoke_once(&self, messages: &[ChatMessage]) -> Result<String, AdapterError> {
        let body = ChatCompletionRequest::new(Some(&self.model_name), messages, &self.settings);
        debug!(
            "POST {} (model {}, {} messages)",
            self.url,
            self.model_name,
            messages.len()
        );

        let response = self
            .client
            .post(&self.url)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        handle_chat_response(response)
    }
}

impl LanguageModel for OpenAiLikeAdapter {
    fn invoke(&self, messages: &[ChatMessage]) -> Result<String, LanguageModelError> {
        call_with_retry(|| self.invoke_once(messages), &self.settings.retry).map_err(Into::into)
    }
}

static AZURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https://([^/]+)/openai/deployments/([^/]+)/chat/completions\?api-version=([^/?&]+)",
    )
    .expect("valid regex for azure deployment url")
});

struct AzureOpenAiAdapter {
    client: Client,
    url: String,
    headers: HeaderMap,
    settings: RequestSettings,
}

impl AzureOpenAiAdapter {
    fn new(
        credential: &Credential,
        base_url: &str,
        settings: RequestSettings,
    ) -> Result<Self, AdapterError> {
        let captures = AZURE_RE.captures(base_url.trim()).ok_or_else(|| {
            AdapterError::invalid_config(
                "Invalid Azure OpenAI base_url format. Expected https://<resource>.openai.azure.com/openai/deployments/<deployment>/chat/completions?api-version=<version>",
            )
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "api-key",
            HeaderValue::from_str(credential.expose()).map_err(|err| {
                AdapterError::invalid_config(format!("invalid api key header: {err}"))
            })?,
        );

        Ok(Self {
            client: settings.build_client()?,
            url: format!(
                "https://{}/openai/deployments/{}/chat/completions?api-version={}",
                &captures[1], &captures[2], &captures[3]
            ),
            headers,
            settings,
        })
    }

    fn invoke_once(&self, messages: &[ChatMessage]) -> Result<String, AdapterError> {
        let body = ChatCompletionRequest::new(None, messages, &self.settings);
        debug!("POST {} ({} messages)", self.url, messages.len());

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(&body)
            .send()?;
        handle_chat_response(response)
    }
}

impl LanguageModel for AzureOpenAiAdapter {
    fn invoke(&self, messages: &[ChatMessage]) -> Result<String, LanguageModelError> {
        call_with_retry(|| self.invoke_once(messages), &self.settings.retry).map_err(Into::into)
    }
}

fn handle_chat_response(response: reqwest::blocking::Response) -> Result<String, AdapterError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(AdapterError::HttpStatus { status, body });
    }

    let parsed: ChatCompletionResponse = response.json()?;
    extract_choice_content(parsed).ok_or(AdapterError::EmptyResponse)
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
    top_p: f32,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(
        model: Option<&'a str>,
        messages: &'a [ChatMessage],
        settings: &RequestSettings,
    ) -> Self {
        Self {
            model,
            messages,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// First choice's text, trimmed. An empty string is a valid answer; a
/// choice list without any text is not.
fn extract_choice_content(response: ChatCompletionResponse) -> Option<String> {
    let choice = response.choices.into_iter().next()?;
    choice
        .message
        .and_then(|message| message.content)
        .or(choice.text)
        .or(choice.content)
        .map(|content| content.trim().to_string())
}
