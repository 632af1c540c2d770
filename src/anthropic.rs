//! Minimal text-generation client for our use-cases.
//!
//! One blocking call per request against the Anthropic Messages API, no retries.
//! Calls are instrumented and log model name, latency and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::{GenerationSettings, ProviderConfig};
use crate::domain::ArtifactKind;
use crate::error::TrainingError;

const API_VERSION: &str = "2023-06-01";

/// Token budget and sampling temperature of one call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelParams {
  pub max_tokens: u32,
  pub temperature: f32,
}

impl ModelParams {
  pub fn for_kind(kind: ArtifactKind, settings: &GenerationSettings) -> Self {
    match kind {
      ArtifactKind::Lesson => Self {
        max_tokens: settings.lesson_max_tokens,
        temperature: settings.lesson_temperature,
      },
      ArtifactKind::Simulation => Self {
        max_tokens: settings.simulation_max_tokens,
        temperature: settings.simulation_temperature,
      },
    }
  }
}

/// Seam between the training pipeline and the external text-generation provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
  /// Fails with `TrainingError::Configuration` when the provider cannot be called at all.
  fn ensure_configured(&self) -> Result<(), TrainingError>;

  /// Returns the first textual block of the provider response.
  async fn generate(&self, prompt: &str, params: &ModelParams) -> Result<String, TrainingError>;
}

/// Long-lived client, built once at startup and shared.
#[derive(Clone)]
pub struct Anthropic {
  client: reqwest::Client,
  api_key: Option<String>,
  pub base_url: String,
  pub model: String,
}

impl Anthropic {
  pub fn new(cfg: &ProviderConfig) -> Result<Self, TrainingError> {
    let client = reqwest::Client::builder()
      .timeout(cfg.timeout)
      .build()
      .map_err(|e| TrainingError::Configuration(format!("HTTP client: {e}")))?;
    let api_key = cfg.validate().ok().map(str::to_string);
    Ok(Self { client, api_key, base_url: cfg.base_url.trim_end_matches('/').to_string(), model: cfg.model.clone() })
  }

  pub fn is_configured(&self) -> bool {
    self.api_key.is_some()
  }

  fn key(&self) -> Result<&str, TrainingError> {
    self
      .api_key
      .as_deref()
      .ok_or_else(|| TrainingError::Configuration("ANTHROPIC_API_KEY is not set".into()))
  }
}

#[async_trait]
impl TextGenerator for Anthropic {
  fn ensure_configured(&self) -> Result<(), TrainingError> {
    self.key().map(|_| ())
  }

  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len(), max_tokens = params.max_tokens))]
  async fn generate(&self, prompt: &str, params: &ModelParams) -> Result<String, TrainingError> {
    let key = self.key()?;
    let url = format!("{}/messages", self.base_url);
    let req = MessagesRequest {
      model: &self.model,
      max_tokens: params.max_tokens,
      temperature: params.temperature,
      messages: vec![MessageReq { role: "user", content: prompt }],
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "calibra-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-api-key", key)
      .header("anthropic-version", API_VERSION)
      .json(&req).send().await.map_err(transport_error)?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_provider_error(&body).unwrap_or(body);
      error!(target: "training", %status, elapsed = ?start.elapsed(), "Provider returned an error status");
      return Err(TrainingError::Provider(format!("HTTP {}: {}", status, msg)));
    }

    let body: MessagesResponse = res.json().await.map_err(transport_error)?;
    if let Some(usage) = &body.usage {
      info!(target: "training", input_tokens = ?usage.input_tokens, output_tokens = ?usage.output_tokens, elapsed = ?start.elapsed(), "Provider usage");
    }
    first_text_block(body)
  }
}

fn transport_error(e: reqwest::Error) -> TrainingError {
  if e.is_timeout() {
    TrainingError::Provider(format!("request timed out: {e}"))
  } else {
    TrainingError::Provider(e.to_string())
  }
}

fn first_text_block(body: MessagesResponse) -> Result<String, TrainingError> {
  body
    .content
    .into_iter()
    .find_map(|block| match block {
      ContentBlock::Text { text } => Some(text),
      ContentBlock::Other => None,
    })
    .ok_or_else(|| TrainingError::Provider("response contained no text block".into()))
}

// --- Messages DTOs ---

#[derive(Serialize)]
struct MessagesRequest<'a> {
  model: &'a str,
  max_tokens: u32,
  temperature: f32,
  messages: Vec<MessageReq<'a>>,
}
#[derive(Serialize)]
struct MessageReq<'a> { role: &'a str, content: &'a str }

#[derive(Deserialize)]
struct MessagesResponse {
  #[serde(default)] content: Vec<ContentBlock>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
  Text { text: String },
  #[serde(other)]
  Other,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] input_tokens: Option<u32>,
  #[serde(default)] output_tokens: Option<u32>,
}

/// Try to extract a clean error message from the provider's error body.
fn extract_provider_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(json: &str) -> MessagesResponse {
    serde_json::from_str(json).unwrap()
  }

  #[test]
  fn picks_first_text_block() {
    let body = parse(r#"{"content":[{"type":"tool_use","id":"t","name":"x","input":{}},{"type":"text","text":"hello"},{"type":"text","text":"later"}],"usage":{"input_tokens":3,"output_tokens":1}}"#);
    assert_eq!(first_text_block(body).unwrap(), "hello");
  }

  #[test]
  fn no_text_block_is_a_provider_error() {
    let body = parse(r#"{"content":[]}"#);
    assert!(matches!(first_text_block(body), Err(TrainingError::Provider(_))));
    let body = parse(r#"{"content":[{"type":"thinking","thinking":"..."}]}"#);
    assert!(matches!(first_text_block(body), Err(TrainingError::Provider(_))));
  }

  #[test]
  fn extracts_error_message() {
    let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
    assert_eq!(extract_provider_error(body).as_deref(), Some("Overloaded"));
    assert_eq!(extract_provider_error("<html>"), None);
  }

  #[test]
  fn params_follow_kind() {
    let s = GenerationSettings::default();
    let lesson = ModelParams::for_kind(ArtifactKind::Lesson, &s);
    let sim = ModelParams::for_kind(ArtifactKind::Simulation, &s);
    assert_eq!(lesson.max_tokens, 300);
    assert!(sim.max_tokens > lesson.max_tokens);
  }

  #[tokio::test]
  async fn missing_key_fails_before_any_request() {
    let cfg = ProviderConfig { base_url: "http://127.0.0.1:9".into(), ..ProviderConfig::default() };
    let client = Anthropic::new(&cfg).unwrap();
    assert!(!client.is_configured());
    assert!(matches!(client.ensure_configured(), Err(TrainingError::Configuration(_))));
    let params = ModelParams::for_kind(ArtifactKind::Lesson, &GenerationSettings::default());
    let err = client.generate("hi", &params).await.unwrap_err();
    assert_eq!(err.kind(), "configuration_error");
  }

  use std::time::Duration;

  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::{TcpListener, TcpStream};

  fn client_for(addr: std::net::SocketAddr, timeout: Duration) -> Anthropic {
    let cfg = ProviderConfig {
      api_key: Some("sk-test".into()),
      base_url: format!("http://{addr}/v1"),
      timeout,
      ..ProviderConfig::default()
    };
    Anthropic::new(&cfg).unwrap()
  }

  fn lesson_params() -> ModelParams {
    ModelParams::for_kind(ArtifactKind::Lesson, &GenerationSettings::default())
  }

  /// Read one HTTP request (headers plus content-length body) and return it as text.
  async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
      let n = stream.read(&mut chunk).await.unwrap();
      if n == 0 {
        break;
      }
      buf.extend_from_slice(&chunk[..n]);
      let text = String::from_utf8_lossy(&buf);
      if let Some(head_end) = text.find("\r\n\r\n") {
        let len = text[..head_end]
          .lines()
          .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap_or(0)))
          .unwrap_or(0);
        if buf.len() >= head_end + 4 + len {
          break;
        }
      }
    }
    String::from_utf8_lossy(&buf).into_owned()
  }

  /// Answer exactly one request with `status` and a JSON `body`; yields the raw request.
  async fn stub_server(status: &'static str, body: &'static str) -> (std::net::SocketAddr, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
      let (mut stream, _) = listener.accept().await.unwrap();
      let request = read_request(&mut stream).await;
      let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
      );
      stream.write_all(response.as_bytes()).await.unwrap();
      stream.flush().await.unwrap();
      request
    });
    (addr, handle)
  }

  #[tokio::test]
  async fn silent_provider_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept and hold connections without ever answering.
    let holder = tokio::spawn(async move {
      let mut held = Vec::new();
      while let Ok((stream, _)) = listener.accept().await {
        held.push(stream);
      }
    });

    let client = client_for(addr, Duration::from_secs(1));
    let err = tokio::time::timeout(Duration::from_secs(10), client.generate("hi", &lesson_params()))
      .await
      .expect("client timeout must fire first")
      .unwrap_err();
    assert_eq!(err.kind(), "provider_error");
    assert!(err.to_string().contains("timed out"), "{err}");
    holder.abort();
  }

  #[tokio::test]
  async fn error_status_becomes_provider_error() {
    let (addr, server) = stub_server(
      "529 Overloaded",
      r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
    )
    .await;
    let err = client_for(addr, Duration::from_secs(5)).generate("hi", &lesson_params()).await.unwrap_err();
    assert_eq!(err.kind(), "provider_error");
    let msg = err.to_string();
    assert!(msg.contains("529"), "{msg}");
    assert!(msg.contains("Overloaded"), "{msg}");
    server.await.unwrap();
  }

  #[tokio::test]
  async fn success_sends_credentials_and_returns_text() {
    let (addr, server) = stub_server(
      "200 OK",
      r#"{"content":[{"type":"text","text":"Own the miss."}],"usage":{"input_tokens":12,"output_tokens":4}}"#,
    )
    .await;
    let text = client_for(addr, Duration::from_secs(5)).generate("coach me", &lesson_params()).await.unwrap();
    assert_eq!(text, "Own the miss.");

    let request = server.await.unwrap();
    let lower = request.to_ascii_lowercase();
    assert!(request.starts_with("POST /v1/messages "));
    assert!(lower.contains("x-api-key: sk-test"));
    assert!(lower.contains("anthropic-version: 2023-06-01"));
    assert!(request.contains("\"max_tokens\":300"));
    assert!(request.contains("coach me"));
  }
}
