//! Blocking client for the Gemini generative-language REST API.
//!
//! One [`GeminiClient`] is built at startup from the loaded API key and cloned
//! into every model and embedder that needs it.

use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const EMBEDDING_MODEL: &str = "models/embedding-001";
const EMBEDDING_TITLE: &str = "Custom query";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Produces a reply for a fully rendered prompt.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(GeminiClient {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "POST");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()?;
        read_body(response)
    }

    /// Names of the models that support `generateContent`.
    pub fn list_models(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .http
                .get(format!("{}/models", self.base_url))
                .header("x-goog-api-key", &self.api_key);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let body = read_body(request.send()?)?;
            let page: ModelList = serde_json::from_str(&body)
                .map_err(|e| RagError::Provider(format!("unexpected model list: {e}")))?;
            names.extend(generation_models(&page));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(names)
    }
}

fn read_body(response: reqwest::blocking::Response) -> Result<String> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(RagError::Provider(api_error_message(status.as_u16(), &body)));
    }
    Ok(body)
}

fn api_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => format!("{status} {}: {}", parsed.error.status, parsed.error.message),
        Err(_) => format!("{status}: {body}"),
    }
}

fn model_path(model_name: &str) -> String {
    if model_name.starts_with("models/") {
        model_name.to_string()
    } else {
        format!("models/{model_name}")
    }
}

/// A generative model bound to a client, with optional fixed system
/// instruction and temperature.
#[derive(Clone)]
pub struct GenerativeModel {
    client: GeminiClient,
    model_name: String,
    temperature: Option<f32>,
    system_instruction: Option<String>,
}

impl GenerativeModel {
    pub fn new(client: GeminiClient, model_name: impl Into<String>) -> Self {
        GenerativeModel {
            client,
            model_name: model_name.into(),
            temperature: None,
            system_instruction: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    fn request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: self.system_instruction.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config: self
                .temperature
                .map(|temperature| GenerationConfig { temperature }),
        }
    }
}

impl TextGenerator for GenerativeModel {
    fn generate(&self, prompt: &str) -> Result<String> {
        let path = format!("{}:generateContent", model_path(&self.model_name));
        let body = self.client.post(&path, &self.request(prompt))?;
        parse_generate_response(&body)
    }
}

/// Document embeddings from `embedding-001`, one batch call per `embed`.
pub struct GeminiEmbedder {
    client: GeminiClient,
}

impl GeminiEmbedder {
    pub fn new(client: GeminiClient) -> Self {
        GeminiEmbedder { client }
    }
}

impl Embedder for GeminiEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: EMBEDDING_MODEL,
                    content: Content {
                        role: None,
                        parts: vec![Part { text }],
                    },
                    task_type: "RETRIEVAL_DOCUMENT",
                    title: EMBEDDING_TITLE,
                })
                .collect(),
        };
        let path = format!("{EMBEDDING_MODEL}:batchEmbedContents");
        let body = self.client.post(&path, &request)?;
        parse_embed_response(&body)
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'a str,
    title: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn parse_generate_response(body: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| RagError::Provider(format!("unexpected generateContent response: {e}")))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(RagError::Provider("response contained no text".to_string()));
    }
    Ok(text)
}

fn parse_embed_response(body: &str) -> Result<Vec<Vec<f32>>> {
    let response: BatchEmbedResponse =
        serde_json::from_str(body).map_err(|e| RagError::Embedding(e.to_string()))?;
    Ok(response.embeddings.into_iter().map(|e| e.values).collect())
}

fn generation_models(page: &ModelList) -> Vec<String> {
    page.models
        .iter()
        .filter(|m| m.supported_generation_methods.iter().any(|s| s == "generateContent"))
        .map(|m| m.name.clone())
        .collect()
}
