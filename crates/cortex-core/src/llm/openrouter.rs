use crate::constants::endpoints;
use crate::error::CortexError;
use crate::llm::catalog::ModelSpec;
use crate::llm::traits::*;
use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client for OpenRouter and other OpenAI-compatible chat completion APIs.
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    app_name: Option<String>,
    referer: Option<String>,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), api_key)
    }

    /// Share one connection pool (and its timeout) across several clients.
    pub fn with_http_client(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: crate::constants::models::GPT_35_TURBO.to_string(),
            base_url: endpoints::OPENROUTER_BASE_URL.to_string(),
            max_tokens: None,
            temperature: None,
            app_name: None,
            referer: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Apply the model slug and request parameters of a catalog entry.
    pub fn with_spec(mut self, spec: &ModelSpec) -> Self {
        self.model = spec.slug().to_string();
        self.max_tokens = Some(spec.max_tokens);
        self.temperature = Some(spec.temperature);
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// OpenRouter attribution headers (`X-Title`, `HTTP-Referer`).
    pub fn with_attribution(
        mut self,
        app_name: Option<String>,
        referer: Option<String>,
    ) -> Self {
        self.app_name = app_name.filter(|s| !s.is_empty());
        self.referer = referer.filter(|s| !s.is_empty());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url, endpoints::CHAT_COMPLETIONS_PATH)
    }

    fn request_body<'a>(&'a self, messages: &'a [ChatMessage], stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: stream.then_some(true),
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, CortexError> {
        let mut request = self
            .client
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body);
        if let Some(ref name) = self.app_name {
            request = request.header("X-Title", name);
        }
        if let Some(ref referer) = self.referer {
            request = request.header("HTTP-Referer", referer);
        }

        tracing::debug!(
            model = %self.model,
            messages = body.messages.len(),
            stream = body.stream.unwrap_or(false),
            "Sending chat completion request"
        );

        Ok(request.send().await?)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Pull the human-readable message out of an OpenAI-style error body,
/// falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parse a non-streaming completion body into the reply text.
fn parse_response(body: &str) -> Result<LlmResponse, CortexError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CortexError::remote(format!("Failed to parse response: {e}")))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CortexError::remote("No choices in response"))?;

    Ok(LlmResponse {
        content: choice.message.content.unwrap_or_default(),
        usage: response.usage.map(|u| Usage {
            input_tokens: u32::try_from(u.prompt_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(u.completion_tokens).unwrap_or(u32::MAX),
        }),
    })
}

/// Outcome of one SSE `data:` payload.
#[derive(Debug, PartialEq)]
enum SseStep {
    Continue,
    Done,
    Failed,
}

fn usage_field(usage: &Value, key: &str) -> u32 {
    usage
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Handle one SSE `data:` payload. Errors are reported on `tx` before
/// [`SseStep::Failed`] is returned.
fn handle_sse_data(
    data: &str,
    saw_choice: &mut bool,
    tx: &mpsc::UnboundedSender<StreamEvent>,
) -> SseStep {
    if data == "[DONE]" {
        if !*saw_choice {
            let _ = tx.unbounded_send(StreamEvent::Error("No choices in response".into()));
            return SseStep::Failed;
        }
        return SseStep::Done;
    }

    let event = match serde_json::from_str::<Value>(data) {
        Ok(event) => event,
        Err(e) => {
            let _ = tx.unbounded_send(StreamEvent::Error(format!(
                "Failed to parse stream chunk: {e}"
            )));
            return SseStep::Failed;
        }
    };

    if let Some(err) = event.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("stream error")
            .to_string();
        let _ = tx.unbounded_send(StreamEvent::Error(message));
        return SseStep::Failed;
    }

    if let Some(usage) = event.get("usage") {
        let input = usage_field(usage, "prompt_tokens");
        let output = usage_field(usage, "completion_tokens");
        if input > 0 || output > 0 {
            let _ = tx.unbounded_send(StreamEvent::Usage(Usage {
                input_tokens: input,
                output_tokens: output,
            }));
        }
    }

    if let Some(choice) = event
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    {
        *saw_choice = true;
        if let Some(content) = choice
            .get("delta")
            .and_then(|d| d.get("content"))
            .and_then(|c| c.as_str())
        {
            if !content.is_empty() {
                let _ = tx.unbounded_send(StreamEvent::TextDelta(content.to_string()));
            }
        }
    }

    SseStep::Continue
}

/// Splits an SSE body into lines. Raw bytes are buffered until a full line
/// arrives, so characters split across network chunks decode intact.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    saw_choice: bool,
}

impl SseDecoder {
    /// Feed one network chunk. Returns `false` once the stream has ended,
    /// after `Done` or `Error` has been sent.
    fn feed(&mut self, chunk: &[u8], tx: &mpsc::UnboundedSender<StreamEvent>) -> bool {
        self.buffer.extend_from_slice(chunk);

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);

            // Blank lines and `: keep-alive` comments carry no data
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            match handle_sse_data(data.trim_start(), &mut self.saw_choice, tx) {
                SseStep::Continue => {}
                SseStep::Done => {
                    let _ = tx.unbounded_send(StreamEvent::Done);
                    return false;
                }
                SseStep::Failed => return false,
            }
        }

        true
    }

    /// The body ended without `[DONE]`.
    fn finish(&mut self, tx: &mpsc::UnboundedSender<StreamEvent>) {
        if !self.buffer.is_empty() {
            let mut rest = std::mem::take(&mut self.buffer);
            rest.push(b'\n');
            if !self.feed(&rest, tx) {
                return;
            }
        }

        let message = if self.saw_choice {
            "Stream ended before [DONE]"
        } else {
            "Malformed streaming response: no completion data"
        };
        let _ = tx.unbounded_send(StreamEvent::Error(message.to_string()));
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse, CortexError> {
        let response = self.send(&self.request_body(messages, false)).await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(CortexError::remote(format!(
                "{} returned {}: {}",
                self.model,
                status,
                error_message(&response_text)
            )));
        }

        parse_response(&response_text)
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, CortexError> {
        let response = self.send(&self.request_body(messages, true)).await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CortexError::remote(format!(
                "{} returned {}: {}",
                self.model,
                status,
                error_message(&text)
            )));
        }

        let (tx, rx) = mpsc::unbounded();

        let mut stream = response.bytes_stream();
        tokio::spawn(async move {
            use futures::StreamExt;
            let mut decoder = SseDecoder::default();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.unbounded_send(StreamEvent::Error(
                            CortexError::from(e).to_string(),
                        ));
                        return;
                    }
                };
                if !decoder.feed(&chunk, &tx) {
                    return;
                }
            }

            decoder.finish(&tx);
        });

        Ok(rx)
    }
}
