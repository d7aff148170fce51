//! EXTERNAL strategy against a mock chat-completions server, and the
//! LOCAL fallback behind it driven by a scripted `edgequake-llm` provider.
//!
//! Run with:
//!   cargo test --test vision_service -- --nocapture

use async_trait::async_trait;
use edgequake_figtab::{
    extract, DiagramType, ExtractionConfig, Strategy, VisionMode, VisionServiceConfig,
};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LLMResponse, LlmError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn config_for(server: &MockServer) -> edgequake_figtab::ExtractionConfigBuilder {
    ExtractionConfig::builder()
        .enable_remote_services(true)
        .vision_mode(VisionMode::Advanced)
        .vision_service(VisionServiceConfig::new(
            server.uri(),
            "test-key",
            "vision-model",
        ))
}

fn picture() -> Value {
    json!([{ "type": "picture", "caption": "Checkout", "image_base64": "AQID" }])
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

/// Vision model that answers every chat with a fixed reply, or fails.
struct ScriptedModel {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn respond(&self) -> Result<LLMResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some(ref reply) => Ok(LLMResponse::new(reply.clone(), "scripted-vision")),
            None => Err(LlmError::ApiError("model not loaded".into())),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-vision"
    }

    fn max_context_length(&self) -> usize {
        8192
    }

    async fn complete(&self, _prompt: &str) -> Result<LLMResponse, LlmError> {
        self.respond()
    }

    async fn complete_with_options(
        &self,
        _prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<LLMResponse, LlmError> {
        self.respond()
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _options: Option<&CompletionOptions>,
    ) -> Result<LLMResponse, LlmError> {
        self.respond()
    }
}

async fn failing_service() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;
    server
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mermaid_reply_is_parsed_and_attached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "vision-model",
            "max_tokens": 1000
        })))
        .respond_with(completion(
            "Checkout flow\n```mermaid\nflowchart TD\nA[Start] --> B{Paid?}\n```",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server).build().unwrap();
    let out = extract(&picture(), None, &config).await.unwrap();
    let d = &out.diagrams[0];
    assert_eq!(d.strategy, Strategy::External);
    assert_eq!(d.diagram_type, DiagramType::Flowchart);
    assert_eq!(d.confidence, 0.8);
    assert_eq!(d.description, "Checkout flow");
    assert_eq!(
        d.mermaid_source.as_deref(),
        Some("flowchart TD\nA[Start] --> B{Paid?}")
    );

    let requests = server.received_requests().await.expect("recording enabled");
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let content = &body["messages"][0]["content"];
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(content[0]["type"], "text");
    assert!(content[0]["text"]
        .as_str()
        .unwrap()
        .contains("<!-- No clear diagram detected -->"));
    assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AQID");
}

#[tokio::test]
async fn json_reply_is_parsed() {
    let server = MockServer::start().await;
    let reply = json!({
        "description": "Login sequence",
        "type": "flowchart",
        "confidence": 0.95,
        "elements": ["User", "Server"],
        "mermaid": "graph LR\nA-->B"
    })
    .to_string();
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(&reply))
        .mount(&server)
        .await;

    let config = config_for(&server).build().unwrap();
    let out = extract(&picture(), None, &config).await.unwrap();
    let d = &out.diagrams[0];
    assert_eq!(d.description, "Login sequence");
    assert_eq!(d.confidence, 0.95);
    assert_eq!(d.elements.len(), 2);
    assert_eq!(d.mermaid_source.as_deref(), Some("graph LR\nA-->B"));
}

#[tokio::test]
async fn no_diagram_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("<!-- No clear diagram detected -->"))
        .mount(&server)
        .await;

    let config = config_for(&server).build().unwrap();
    let out = extract(&picture(), None, &config).await.unwrap();
    let d = &out.diagrams[0];
    assert_eq!(d.diagram_type, DiagramType::None);
    assert_eq!(d.confidence, 0.9);
    assert!(d.mermaid_source.is_none());
}

#[tokio::test]
async fn invalid_model_mermaid_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("```mermaid\ngraph TD\nA[Start --> B\n```"))
        .mount(&server)
        .await;

    let config = config_for(&server).build().unwrap();
    let out = extract(&picture(), None, &config).await.unwrap();
    assert!(out.diagrams[0].mermaid_source.is_none());
    assert_eq!(out.stats.mermaid_rejected, 1);
    assert_eq!(out.stats.mermaid_attached, 0);
}

#[tokio::test]
async fn server_error_falls_back_to_basic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server).build().unwrap();
    let out = extract(&picture(), None, &config).await.unwrap();
    let d = &out.diagrams[0];
    assert_eq!(d.strategy, Strategy::Basic);
    assert_eq!(d.confidence, 0.5);
    assert_eq!(d.description, "Basic image analysis - diagram detected");
    assert_eq!(out.stats.by_strategy.get("basic"), Some(&1));
}

#[tokio::test]
async fn server_error_without_fallback_is_a_failure_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let config = config_for(&server).fallback_local(false).build().unwrap();
    let out = extract(&picture(), None, &config).await.unwrap();
    let d = &out.diagrams[0];
    assert_eq!(d.strategy, Strategy::External);
    assert_eq!(d.diagram_type, DiagramType::Error);
    assert_eq!(d.confidence, 0.0);
    assert_eq!(d.description, "VLM API request failed: 500");
    assert!(d.mermaid_source.is_none());
    assert_eq!(out.stats.figures_failed, 1);
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("too late").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = config_for(&server)
        .fallback_local(false)
        .api_timeout_secs(1)
        .build()
        .unwrap();
    let out = extract(&picture(), None, &config).await.unwrap();
    let d = &out.diagrams[0];
    assert_eq!(d.diagram_type, DiagramType::Error);
    assert!(d.description.contains("timed out"), "got: {}", d.description);
}

#[tokio::test]
async fn context_only_figures_never_call_the_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let config = config_for(&server).build().unwrap();
    let doc = json!([{ "type": "figure", "surrounding_text": "Revenue grew to 150 million in Q3" }]);
    let out = extract(&doc, None, &config).await.unwrap();
    assert_eq!(out.diagrams[0].strategy, Strategy::Context);
}

#[tokio::test]
async fn standard_mode_never_calls_the_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let config = config_for(&server)
        .vision_mode(VisionMode::Standard)
        .build()
        .unwrap();
    let out = extract(&picture(), None, &config).await.unwrap();
    assert_eq!(out.diagrams[0].strategy, Strategy::Basic);
}

#[tokio::test]
async fn empty_choices_fall_back_to_basic_even_without_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let config = config_for(&server).fallback_local(false).build().unwrap();
    let out = extract(&picture(), None, &config).await.unwrap();
    let d = &out.diagrams[0];
    assert_eq!(d.strategy, Strategy::Basic);
    assert_eq!(d.confidence, 0.5);
    assert_eq!(out.stats.figures_failed, 0);
}

#[tokio::test]
async fn unusable_reply_skips_the_local_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let model = ScriptedModel::replying("```mermaid\ngraph TD\nA-->B\n```");
    let config = config_for(&server)
        .local_provider(model.clone())
        .build()
        .unwrap();
    let out = extract(&picture(), None, &config).await.unwrap();
    assert_eq!(out.diagrams[0].strategy, Strategy::Basic);
    assert_eq!(model.calls(), 0);
}

// ── LOCAL fallback ───────────────────────────────────────────────────────────

#[tokio::test]
async fn server_error_falls_back_to_local_model() {
    let server = failing_service().await;
    let model = ScriptedModel::replying(
        "Scan and store\n```mermaid\nflowchart LR\nA[Scan] --> B[Store]\n```",
    );
    let config = config_for(&server)
        .local_provider(model.clone())
        .build()
        .unwrap();

    let out = extract(&picture(), None, &config).await.unwrap();
    let d = &out.diagrams[0];
    assert_eq!(d.strategy, Strategy::Local);
    assert_eq!(d.diagram_type, DiagramType::Flowchart);
    assert_eq!(d.description, "Scan and store");
    assert_eq!(
        d.mermaid_source.as_deref(),
        Some("flowchart LR\nA[Scan] --> B[Store]")
    );
    assert_eq!(model.calls(), 1);
    assert_eq!(out.stats.by_strategy.get("local"), Some(&1));
}

#[tokio::test]
async fn failing_local_model_falls_back_to_basic() {
    let server = failing_service().await;
    let model = ScriptedModel::failing();
    let config = config_for(&server)
        .local_provider(model.clone())
        .build()
        .unwrap();

    let out = extract(&picture(), None, &config).await.unwrap();
    let d = &out.diagrams[0];
    assert_eq!(d.strategy, Strategy::Basic);
    assert_eq!(d.confidence, 0.5);
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn local_model_without_vision_service() {
    let model = ScriptedModel::replying("```mermaid\ngraph TD\nA[In] --> B[Out]\n```");
    let config = ExtractionConfig::builder()
        .enable_remote_services(true)
        .vision_mode(VisionMode::Local)
        .local_provider(model.clone())
        .build()
        .unwrap();

    let out = extract(&picture(), None, &config).await.unwrap();
    let d = &out.diagrams[0];
    assert_eq!(d.strategy, Strategy::Local);
    assert_eq!(d.mermaid_source.as_deref(), Some("graph TD\nA[In] --> B[Out]"));
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn local_model_needs_remote_permission() {
    let model = ScriptedModel::replying("```mermaid\ngraph TD\nA-->B\n```");
    let config = ExtractionConfig::builder()
        .local_provider(model.clone())
        .build()
        .unwrap();

    let out = extract(&picture(), None, &config).await.unwrap();
    assert_eq!(out.diagrams[0].strategy, Strategy::Basic);
    assert_eq!(model.calls(), 0);
}
