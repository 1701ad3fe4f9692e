//! Concrete LLM providers.
//!
//! A provider is one arm of the [`Provider`] sum type with two operations —
//! `complete` and `embed` — plus the capability checks `supports(model)` and
//! `usable(keys)`.  Adding a provider is a compile-time change: extend the
//! enum and every `match` follows.
//!
//! The [`ScriptedProvider`] arm answers from a rule table instead of the
//! network.  It drives the test suite and keeps offline simulations running
//! on prompt failsafes.

use std::sync::Mutex;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::json;

use ga_memory::{Embedder, HashEmbedder};

use crate::error::{LlmError, LlmResult};

/// The `api_keys` block of the world config.
pub type ApiKeys = FxHashMap<String, String>;

/// Provider block of the world/agent config.  `type` selects the enum arm.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

// ── Provider ──────────────────────────────────────────────────────────────────

/// The registered provider set.
pub enum Provider {
    OpenAi(OpenAiProvider),
    Ollama(OllamaProvider),
    ZhipuAi(ZhipuProvider),
    Scripted(ScriptedProvider),
}

impl Provider {
    /// Construct the provider named by `config.kind`.
    ///
    /// Fails fast on an unknown type or a missing key — both are
    /// [`ConfigError`]-class conditions at startup.
    pub fn from_config(config: &ProviderConfig, keys: &ApiKeys) -> LlmResult<Self> {
        match config.kind.as_str() {
            "openai" => Ok(Provider::OpenAi(OpenAiProvider::new(config, keys)?)),
            "ollama" => Ok(Provider::Ollama(OllamaProvider::new(config))),
            "zhipuai" => Ok(Provider::ZhipuAi(ZhipuProvider::new(config, keys)?)),
            "scripted" => Ok(Provider::Scripted(ScriptedProvider::default())),
            other => Err(LlmError::UnsupportedProvider(other.to_string())),
        }
    }

    /// Whether a provider type can be built from the available keys.
    pub fn usable(kind: &str, keys: &ApiKeys) -> bool {
        match kind {
            "openai" => keys.contains_key("OPENAI_API_KEY"),
            "zhipuai" => keys.contains_key("ZHIPUAI_API_KEY"),
            "ollama" | "scripted" => true,
            _ => false,
        }
    }

    /// Whether this provider serves the given model name.
    pub fn supports(&self, model: &str) -> bool {
        match self {
            Provider::OpenAi(_) => model.starts_with("gpt-") || model.starts_with("text-embedding-"),
            Provider::Ollama(_) => true,
            Provider::ZhipuAi(_) => model.starts_with("glm-") || model.starts_with("embedding-"),
            Provider::Scripted(_) => true,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAi(p) => &p.model,
            Provider::Ollama(p) => &p.model,
            Provider::ZhipuAi(p) => &p.model,
            Provider::Scripted(_) => "scripted",
        }
    }

    pub fn complete(&self, prompt: &str) -> LlmResult<String> {
        match self {
            Provider::OpenAi(p) => p.complete(prompt),
            Provider::Ollama(p) => p.complete(prompt),
            Provider::ZhipuAi(p) => p.complete(prompt),
            Provider::Scripted(p) => Ok(p.complete(prompt)),
        }
    }

    pub fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        match self {
            Provider::OpenAi(p) => p.embed(text),
            Provider::Ollama(p) => p.embed(text),
            Provider::ZhipuAi(p) => p.embed(text),
            Provider::Scripted(p) => Ok(p.embed(text)),
        }
    }
}

// ── HTTP helpers ──────────────────────────────────────────────────────────────

fn http_client() -> LlmResult<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()?)
}

/// POST `body` as JSON and return the parsed response, mapping non-2xx
/// statuses into [`LlmError::Api`].
fn post_json(
    client: &reqwest::blocking::Client,
    url: &str,
    bearer: Option<&str>,
    body: serde_json::Value,
) -> LlmResult<serde_json::Value> {
    let mut request = client.post(url).json(&body);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(LlmError::Api {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        });
    }
    Ok(response.json()?)
}

fn chat_content(value: &serde_json::Value) -> LlmResult<String> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LlmError::Malformed("no choices[0].message.content".into()))
}

fn embedding_vector(value: &serde_json::Value) -> LlmResult<Vec<f32>> {
    value["data"][0]["embedding"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect())
        .ok_or_else(|| LlmError::Malformed("no data[0].embedding".into()))
}

// ── OpenAI-compatible ─────────────────────────────────────────────────────────

/// Any endpoint speaking the OpenAI chat/embeddings API.
pub struct OpenAiProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    pub model: String,
    embedding_model: String,
    api_key: String,
    temperature: f32,
}

impl OpenAiProvider {
    fn new(config: &ProviderConfig, keys: &ApiKeys) -> LlmResult<Self> {
        let api_key = keys
            .get("OPENAI_API_KEY")
            .cloned()
            .ok_or(LlmError::MissingKey("OPENAI_API_KEY"))?;
        Ok(Self {
            client: http_client()?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".into()),
            model: config.model.clone(),
            embedding_model: config
                .embedding_model
                .clone()
                .unwrap_or_else(|| "text-embedding-3-small".into()),
            api_key,
            temperature: config.temperature.unwrap_or(0.0),
        })
    }

    fn complete(&self, prompt: &str) -> LlmResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
        });
        let url = format!("{}/chat/completions", self.base_url);
        chat_content(&post_json(&self.client, &url, Some(&self.api_key), body)?)
    }

    fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        let body = json!({ "model": self.embedding_model, "input": text });
        let url = format!("{}/embeddings", self.base_url);
        embedding_vector(&post_json(&self.client, &url, Some(&self.api_key), body)?)
    }
}

// ── Ollama ────────────────────────────────────────────────────────────────────

/// A local Ollama daemon; no keys involved.
pub struct OllamaProvider {
    client: Option<reqwest::blocking::Client>,
    base_url: String,
    pub model: String,
    embedding_model: String,
}

impl OllamaProvider {
    fn new(config: &ProviderConfig) -> Self {
        Self {
            client: http_client().ok(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".into()),
            model: config.model.clone(),
            embedding_model: config
                .embedding_model
                .clone()
                .unwrap_or_else(|| config.model.clone()),
        }
    }

    fn client(&self) -> LlmResult<&reqwest::blocking::Client> {
        self.client
            .as_ref()
            .ok_or_else(|| LlmError::Malformed("http client unavailable".into()))
    }

    fn complete(&self, prompt: &str) -> LlmResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });
        let url = format!("{}/api/chat", self.base_url);
        let value = post_json(self.client()?, &url, None, body)?;
        value["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::Malformed("no message.content".into()))
    }

    fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        let body = json!({ "model": self.embedding_model, "prompt": text });
        let url = format!("{}/api/embeddings", self.base_url);
        let value = post_json(self.client()?, &url, None, body)?;
        value["embedding"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect())
            .ok_or_else(|| LlmError::Malformed("no embedding".into()))
    }
}

// ── ZhipuAI ───────────────────────────────────────────────────────────────────

/// ZhipuAI GLM chat + `embedding-2` over the open.bigmodel.cn v4 API.
pub struct ZhipuProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    pub model: String,
    embedding_model: String,
    api_key: String,
    temperature: f32,
}

impl ZhipuProvider {
    fn new(config: &ProviderConfig, keys: &ApiKeys) -> LlmResult<Self> {
        let api_key = keys
            .get("ZHIPUAI_API_KEY")
            .cloned()
            .ok_or(LlmError::MissingKey("ZHIPUAI_API_KEY"))?;
        Ok(Self {
            client: http_client()?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://open.bigmodel.cn/api/paas/v4".into()),
            model: config.model.clone(),
            embedding_model: config
                .embedding_model
                .clone()
                .unwrap_or_else(|| "embedding-2".into()),
            api_key,
            temperature: config.temperature.unwrap_or(0.1),
        })
    }

    fn complete(&self, prompt: &str) -> LlmResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
        });
        let url = format!("{}/chat/completions", self.base_url);
        chat_content(&post_json(&self.client, &url, Some(&self.api_key), body)?)
    }

    fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        let body = json!({ "model": self.embedding_model, "input": text });
        let url = format!("{}/embeddings", self.base_url);
        embedding_vector(&post_json(&self.client, &url, Some(&self.api_key), body)?)
    }
}

// ── Scripted ──────────────────────────────────────────────────────────────────

/// One canned answer: fired when `needle` appears in the prompt, at most
/// `remaining` times (`None` = unlimited).
struct ScriptRule {
    needle: String,
    response: String,
    remaining: Option<u32>,
}

/// Deterministic rule-table provider for tests and offline runs.
///
/// Rules are tried in registration order; the first live match wins.  With
/// no matching rule the default response (empty unless overridden) is
/// returned, which sends every prompt to its failsafe.
pub struct ScriptedProvider {
    rules: Mutex<Vec<ScriptRule>>,
    default_response: String,
    embedder: HashEmbedder,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            default_response: String::new(),
            embedder: HashEmbedder::default(),
        }
    }
}

impl ScriptedProvider {
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Register an unlimited rule.
    pub fn rule(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.push_rule(needle.into(), response.into(), None);
        self
    }

    /// Register a rule consumed after `uses` firings.
    pub fn rule_n(self, needle: impl Into<String>, response: impl Into<String>, uses: u32) -> Self {
        self.push_rule(needle.into(), response.into(), Some(uses));
        self
    }

    fn push_rule(&self, needle: String, response: String, remaining: Option<u32>) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(ScriptRule { needle, response, remaining });
        }
    }

    fn complete(&self, prompt: &str) -> String {
        if let Ok(mut rules) = self.rules.lock() {
            for rule in rules.iter_mut() {
                if !prompt.contains(&rule.needle) {
                    continue;
                }
                match &mut rule.remaining {
                    Some(0) => continue,
                    Some(n) => *n -= 1,
                    None => {}
                }
                return rule.response.clone();
            }
        }
        self.default_response.clone()
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        self.embedder.embed(text).unwrap_or_default()
    }
}
