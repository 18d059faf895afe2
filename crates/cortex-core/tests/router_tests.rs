use cortex_core::llm::{LlmResponse, OpenRouterClient, Usage};
use cortex_core::*;
use futures::channel::mpsc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ========================================================================
// Mock client
// ========================================================================

enum Reply {
    Text(&'static str),
    Fail(&'static str),
}

/// Records the messages it receives and answers with a canned reply.
struct MockClient {
    reply: Reply,
    seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        self.seen.lock().unwrap().push(messages.to_vec());
        match self.reply {
            Reply::Text(text) => Ok(LlmResponse {
                content: text.to_string(),
                usage: Some(Usage {
                    input_tokens: 10,
                    output_tokens: 2,
                }),
            }),
            Reply::Fail(message) => Err(CortexError::remote(message)),
        }
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let (tx, rx) = mpsc::unbounded();
        match self.reply {
            Reply::Text(text) => {
                for word in text.split_inclusive(' ') {
                    tx.unbounded_send(StreamEvent::TextDelta(word.to_string()))
                        .unwrap();
                }
                tx.unbounded_send(StreamEvent::Done).unwrap();
            }
            Reply::Fail(message) => {
                tx.unbounded_send(StreamEvent::TextDelta("partial".into()))
                    .unwrap();
                tx.unbounded_send(StreamEvent::Error(message.to_string()))
                    .unwrap();
            }
        }
        Ok(rx)
    }
}

type Seen = Arc<Mutex<Vec<Vec<ChatMessage>>>>;

fn mock_router(reply_for: impl Fn(ModelId) -> Reply, history_window: usize) -> (ModelRouter, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let mut clients: HashMap<ModelId, Box<dyn LlmClient>> = HashMap::new();
    for id in ModelId::all() {
        clients.insert(
            *id,
            Box::new(MockClient {
                reply: reply_for(*id),
                seen: seen.clone(),
            }),
        );
    }
    (ModelRouter::with_clients(clients, history_window), seen)
}

fn conversation_with(n: usize) -> Conversation {
    let mut conv = Conversation::with_id("conv", "Chat");
    for i in 0..n {
        if i % 2 == 0 {
            conv.push(Message::user(format!("question {i}")));
        } else {
            conv.push(Message::assistant(format!("answer {i}")));
        }
    }
    conv
}

// ========================================================================
// ModelRouter
// ========================================================================

#[tokio::test]
async fn test_complete_returns_reply_text() {
    let (router, _) = mock_router(|_| Reply::Text("Hello there"), 3);
    let conv = conversation_with(1);

    let reply = router.complete(&conv, "gpt-3.5-turbo", None).await.unwrap();
    assert_eq!(reply, "Hello there");
}

#[tokio::test]
async fn test_complete_unknown_model_fails() {
    let (router, seen) = mock_router(|_| Reply::Text("never"), 3);
    let conv = conversation_with(1);

    for model in ["gpt-4o", "hackclub/model1", ""] {
        let err = router.complete(&conv, model, None).await.unwrap_err();
        assert!(matches!(err, CortexError::UnknownModel(_)), "{model}: {err}");
    }
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_complete_model_without_client_is_unknown() {
    let mut clients: HashMap<ModelId, Box<dyn LlmClient>> = HashMap::new();
    clients.insert(
        ModelId::Claude3Haiku,
        Box::new(MockClient {
            reply: Reply::Text("haiku"),
            seen: Arc::new(Mutex::new(Vec::new())),
        }),
    );
    let router = ModelRouter::with_clients(clients, 3);
    let conv = conversation_with(1);

    assert_eq!(router.models().len(), 1);
    assert_eq!(
        router.complete(&conv, "anthropic/claude-3-haiku", None).await.unwrap(),
        "haiku"
    );
    assert!(matches!(
        router.complete(&conv, "gpt-3.5-turbo", None).await,
        Err(CortexError::UnknownModel(_))
    ));
}

#[tokio::test]
async fn test_complete_routes_to_selected_model() {
    let (router, _) = mock_router(
        |id| match id {
            ModelId::Gpt35Turbo => Reply::Text("from gpt"),
            ModelId::Claude3Haiku => Reply::Text("from claude"),
            ModelId::Llama31_8b => Reply::Text("from llama"),
        },
        3,
    );
    let conv = conversation_with(1);

    assert_eq!(router.complete(&conv, "claude-3-haiku", None).await.unwrap(), "from claude");
    assert_eq!(router.complete(&conv, "llama-3.1-8b", None).await.unwrap(), "from llama");
    assert_eq!(router.complete(&conv, "openai/gpt-3.5-turbo", None).await.unwrap(), "from gpt");
}

#[tokio::test]
async fn test_complete_remote_failure() {
    let (router, _) = mock_router(|_| Reply::Fail("503 upstream"), 3);
    let conv = conversation_with(1);

    let err = router.complete(&conv, "gpt-3.5-turbo", None).await.unwrap_err();
    assert!(err.is_remote());
    assert!(err.to_string().contains("503 upstream"));
}

#[test]
fn test_build_request_profile_first_then_window() {
    let (router, _) = mock_router(|_| Reply::Text(""), 3);
    let conv = conversation_with(5);

    let messages = router.build_request(&conv, Some("User Profile: My name is Sam."));
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], ChatMessage::system("User Profile: My name is Sam."));
    assert_eq!(messages[1], ChatMessage::user("question 2"));
    assert_eq!(messages[3], ChatMessage::user("question 4"));
}

#[test]
fn test_build_request_without_profile() {
    let (router, _) = mock_router(|_| Reply::Text(""), 3);
    let conv = conversation_with(2);

    let messages = router.build_request(&conv, None);
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.role != Role::System));

    // Blank profile text counts as no profile
    assert_eq!(router.build_request(&conv, Some("   ")).len(), 2);
}

#[test]
fn test_build_request_unlimited_window() {
    let (router, _) = mock_router(|_| Reply::Text(""), 0);
    let conv = conversation_with(7);

    let messages = router.build_request(&conv, None);
    assert_eq!(messages.len(), 7);
    assert_eq!(messages[0], ChatMessage::user("question 0"));
}

// ========================================================================
// ChatSession
// ========================================================================

#[tokio::test]
async fn test_session_appends_exchange_and_persists() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::with_dir(dir.path()).unwrap();
    let (router, seen) = mock_router(|_| Reply::Text("Try a treasure hunt."), 3);
    let session = ChatSession::new(&store, &router);

    let mut conv = Conversation::new("Untitled");
    let profile = UserProfile {
        name: "Sam".into(),
        ..Default::default()
    };
    let reply = session
        .send(
            &mut conv,
            "Ideas for a 10 year old's birthday?",
            "claude-3-haiku",
            profile.to_context().as_deref(),
        )
        .await
        .unwrap();

    assert_eq!(reply, "Try a treasure hunt.");
    assert_eq!(conv.len(), 2);
    assert_eq!(conv.last().unwrap().role, Role::Assistant);
    assert_eq!(conv.title(), "Ideas for a 10 year old's birt...");
    assert_eq!(conv.model(), Some("claude-3-haiku"));

    let stored = store.load(conv.id()).unwrap();
    assert_eq!(stored, conv);

    let sent = seen.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0][0].role, Role::System);
    assert!(sent[0][0].content.contains("My name is Sam"));
    assert_eq!(sent[0][1], ChatMessage::user("Ideas for a 10 year old's birthday?"));
}

#[tokio::test]
async fn test_session_remote_failure_keeps_user_message_only() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::with_dir(dir.path()).unwrap();
    let (router, _) = mock_router(|_| Reply::Fail("timeout"), 3);
    let session = ChatSession::new(&store, &router);

    let mut conv = Conversation::with_id("fail", "Chat");
    let err = session
        .send(&mut conv, "hello?", "gpt-3.5-turbo", None)
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert_eq!(conv.len(), 1);
    assert_eq!(conv.last().unwrap().role, Role::User);
    assert_eq!(store.load("fail").unwrap().len(), 1);
}

#[tokio::test]
async fn test_session_unknown_model_appends_nothing() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::with_dir(dir.path()).unwrap();
    let (router, _) = mock_router(|_| Reply::Text("x"), 3);
    let session = ChatSession::new(&store, &router);

    let mut conv = Conversation::with_id("strict", "Chat");
    let err = session
        .send(&mut conv, "hello", "mystery-model", None)
        .await
        .unwrap_err();

    assert!(matches!(err, CortexError::UnknownModel(_)));
    assert!(conv.is_empty());
    assert!(store.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_session_streaming_collects_deltas() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::with_dir(dir.path()).unwrap();
    let (router, _) = mock_router(|_| Reply::Text("one two three"), 3);
    let session = ChatSession::new(&store, &router);

    let mut conv = Conversation::with_id("stream", "Chat");
    let mut deltas = Vec::new();
    let reply = session
        .send_streaming(&mut conv, "count", "llama-3.1-8b", None, |d| {
            deltas.push(d.to_string())
        })
        .await
        .unwrap();

    assert_eq!(reply, "one two three");
    assert_eq!(deltas, vec!["one ", "two ", "three"]);
    assert_eq!(store.load("stream").unwrap().len(), 2);
}

#[tokio::test]
async fn test_session_streaming_error_discards_partial_reply() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::with_dir(dir.path()).unwrap();
    let (router, _) = mock_router(|_| Reply::Fail("connection reset"), 3);
    let session = ChatSession::new(&store, &router);

    let mut conv = Conversation::with_id("broken", "Chat");
    let err = session
        .send_streaming(&mut conv, "hi", "gpt-3.5-turbo", None, |_| {})
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert_eq!(conv.len(), 1);
    assert_eq!(store.load("broken").unwrap().len(), 1);
}

// ========================================================================
// OpenRouterClient against a local HTTP responder
// ========================================================================

/// Serve exactly one request with the given status line and body, then
/// hand back the raw request text.
async fn serve_once(
    status: &'static str,
    body: &'static str,
    delay: Duration,
) -> (String, tokio::task::JoinHandle<String>) {
    serve_parts(status, "application/json", vec![body.as_bytes().to_vec()], delay).await
}

/// Like [`serve_once`], but writes the body in separate parts with a short
/// pause between them so the client sees them as separate chunks.
async fn serve_parts(
    status: &'static str,
    content_type: &'static str,
    parts: Vec<Vec<u8>>,
    delay: Duration,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];

        // Read headers, then as much body as Content-Length announces
        let body_start = loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break raw.len();
            }
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&raw[..body_start]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while raw.len() < body_start + content_length {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }

        tokio::time::sleep(delay).await;

        let body_len: usize = parts.iter().map(Vec::len).sum();
        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {body_len}\r\nConnection: close\r\n\r\n"
        );
        let _ = socket.write_all(head.as_bytes()).await;
        for part in &parts {
            let _ = socket.write_all(part).await;
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&raw).to_string()
    });

    (base_url, handle)
}

#[tokio::test]
async fn test_openrouter_client_success() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"id":"gen-1","choices":[{"message":{"role":"assistant","content":"Hi from the wire"}}],"usage":{"prompt_tokens":5,"completion_tokens":4}}"#,
        Duration::ZERO,
    )
    .await;

    let client = OpenRouterClient::new("secret-key")
        .with_spec(&ModelId::Llama31_8b.spec())
        .with_base_url(base_url)
        .with_attribution(Some("Cortex".into()), None);
    let response = client
        .chat(&[ChatMessage::system("profile"), ChatMessage::user("hello")])
        .await
        .unwrap();

    assert_eq!(response.content, "Hi from the wire");
    assert_eq!(response.usage.unwrap().output_tokens, 4);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /v1/chat/completions"));
    let lower = request.to_lowercase();
    assert!(lower.contains("authorization: bearer secret-key"));
    assert!(lower.contains("x-title: cortex"));
    assert!(request.contains("meta-llama/llama-3.1-8b-instruct"));
    assert!(request.contains(r#""role":"system""#));
}

#[tokio::test]
async fn test_openrouter_client_http_error_is_remote() {
    let (base_url, server) = serve_once(
        "401 Unauthorized",
        r#"{"error":{"message":"No auth credentials found","code":401}}"#,
        Duration::ZERO,
    )
    .await;

    let client = OpenRouterClient::new("bad").with_base_url(base_url);
    let err = client.chat(&[ChatMessage::user("hi")]).await.unwrap_err();

    assert!(err.is_remote());
    assert!(err.to_string().contains("No auth credentials found"));
    server.await.unwrap();
}

#[tokio::test]
async fn test_openrouter_client_malformed_body_is_remote() {
    let (base_url, server) = serve_once("200 OK", "<html>oops</html>", Duration::ZERO).await;

    let client = OpenRouterClient::new("k").with_base_url(base_url);
    let err = client.chat(&[ChatMessage::user("hi")]).await.unwrap_err();

    assert!(err.is_remote());
    server.await.unwrap();
}

#[tokio::test]
async fn test_openrouter_client_timeout_is_remote() {
    let (base_url, server) = serve_once("200 OK", "{}", Duration::from_secs(2)).await;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let client = OpenRouterClient::with_http_client(http, "k").with_base_url(base_url);
    let err = client.chat(&[ChatMessage::user("hi")]).await.unwrap_err();

    assert!(err.is_remote());
    assert!(err.to_string().contains("timed out"));
    server.abort();
}

#[tokio::test]
async fn test_openrouter_client_connection_refused_is_remote() {
    // Bind then drop to get a port nobody listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = OpenRouterClient::new("k").with_base_url(format!("http://127.0.0.1:{port}"));
    let err = client.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
    assert!(err.is_remote());
}

// ========================================================================
// OpenRouterClient streaming
// ========================================================================

async fn collect_events(rx: mpsc::UnboundedReceiver<StreamEvent>) -> Vec<StreamEvent> {
    use futures::StreamExt;
    rx.collect().await
}

#[tokio::test]
async fn test_openrouter_stream_success() {
    let body = concat!(
        ": OPENROUTER PROCESSING\n\n",
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{}}],\"usage\":{\"prompt_tokens\":7,\"completion_tokens\":2}}\n\n",
        "data: [DONE]\n\n",
    );
    let (base_url, server) = serve_parts(
        "200 OK",
        "text/event-stream",
        vec![body.as_bytes().to_vec()],
        Duration::ZERO,
    )
    .await;

    let client = OpenRouterClient::new("k").with_base_url(base_url);
    let rx = client.chat_stream(&[ChatMessage::user("hi")]).await.unwrap();
    let events = collect_events(rx).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::TextDelta("Hel".into()),
            StreamEvent::TextDelta("lo".into()),
            StreamEvent::Usage(Usage {
                input_tokens: 7,
                output_tokens: 2
            }),
            StreamEvent::Done,
        ]
    );

    let request = server.await.unwrap();
    assert!(request.contains(r#""stream":true"#));
}

#[tokio::test]
async fn test_openrouter_stream_http_error_is_remote() {
    let (base_url, server) = serve_once(
        "429 Too Many Requests",
        r#"{"error":{"message":"Rate limit exceeded","code":429}}"#,
        Duration::ZERO,
    )
    .await;

    let client = OpenRouterClient::new("k").with_base_url(base_url);
    let err = client
        .chat_stream(&[ChatMessage::user("hi")])
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert!(err.to_string().contains("Rate limit exceeded"));
    server.await.unwrap();
}

#[tokio::test]
async fn test_openrouter_stream_malformed_body_is_error() {
    let (base_url, server) = serve_once("200 OK", "<html>oops</html>", Duration::ZERO).await;

    let client = OpenRouterClient::new("k").with_base_url(base_url);
    let rx = client.chat_stream(&[ChatMessage::user("hi")]).await.unwrap();
    let events = collect_events(rx).await;

    assert!(matches!(events.as_slice(), [StreamEvent::Error(_)]), "{events:?}");
    server.await.unwrap();
}

#[tokio::test]
async fn test_session_streaming_malformed_body_appends_no_reply() {
    let (base_url, server) = serve_once("200 OK", "<html>oops</html>", Duration::ZERO).await;

    let mut clients: HashMap<ModelId, Box<dyn LlmClient>> = HashMap::new();
    clients.insert(
        ModelId::Gpt35Turbo,
        Box::new(OpenRouterClient::new("k").with_base_url(base_url)),
    );
    let router = ModelRouter::with_clients(clients, 3);
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::with_dir(dir.path()).unwrap();
    let session = ChatSession::new(&store, &router);

    let mut conv = Conversation::with_id("html", "Chat");
    let err = session
        .send_streaming(&mut conv, "hi", "gpt-3.5-turbo", None, |_| {})
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert_eq!(conv.len(), 1);
    assert_eq!(conv.last().unwrap().role, Role::User);
    assert_eq!(store.load("html").unwrap().len(), 1);
    server.await.unwrap();
}

#[tokio::test]
async fn test_openrouter_stream_keeps_utf8_split_across_chunks() {
    let body = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9} \u{1F600}\"}}]}\n\ndata: [DONE]\n\n";
    // Cut inside the two-byte "é" so each half arrives on its own
    let split = body.find('\u{e9}').unwrap() + 1;
    let bytes = body.as_bytes();
    let (base_url, server) = serve_parts(
        "200 OK",
        "text/event-stream",
        vec![bytes[..split].to_vec(), bytes[split..].to_vec()],
        Duration::ZERO,
    )
    .await;

    let client = OpenRouterClient::new("k").with_base_url(base_url);
    let rx = client.chat_stream(&[ChatMessage::user("hi")]).await.unwrap();
    let events = collect_events(rx).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::TextDelta("caf\u{e9} \u{1F600}".into()),
            StreamEvent::Done,
        ]
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_session_keeps_user_title_after_rename() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::with_dir(dir.path()).unwrap();
    let (router, _) = mock_router(|_| Reply::Text("Lisbon is lovely in June."), 3);
    let session = ChatSession::new(&store, &router);

    let mut conv = Conversation::with_id("trip", "Chat 1");
    conv.rename("Trip planning");
    session
        .send_streaming(&mut conv, "Where should we go in June?", "gpt-3.5-turbo", None, |_| {})
        .await
        .unwrap();

    assert_eq!(conv.title(), "Trip planning");
    assert_eq!(store.load("trip").unwrap().title(), "Trip planning");
}
