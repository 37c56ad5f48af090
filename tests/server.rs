use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use formpilot::server::{create_router, AnswerGenerator, AnthropicGenerator, AppState};
use formpilot::{AnswerMap, Error, FieldDescriptor, FillClient, FillRequest, Result};

/// Generator stub: returns a canned result and counts invocations.
struct StubGenerator {
    answers: std::result::Result<AnswerMap, String>,
    calls: AtomicUsize,
}

impl StubGenerator {
    fn ok(answers: AnswerMap) -> Arc<Self> {
        Arc::new(Self {
            answers: Ok(answers),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            answers: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AnswerGenerator for StubGenerator {
    async fn generate(&self, _request: &FillRequest) -> Result<AnswerMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answers {
            Ok(map) => Ok(map.clone()),
            Err(msg) => Err(Error::ModelError(msg.clone())),
        }
    }
}

async fn spawn_service(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn sample_request() -> FillRequest {
    FillRequest {
        profile: BTreeMap::from([("name".to_string(), "Ada".to_string())]),
        form_fields: vec![FieldDescriptor {
            id: "email".into(),
            r#type: "text".into(),
            label: "Email".into(),
            placeholder: String::new(),
        }],
    }
}

#[tokio::test]
async fn health_check_responds() {
    let generator = StubGenerator::ok(AnswerMap::new());
    let base = spawn_service(Arc::new(AppState::new(generator, None))).await;

    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn fill_without_configured_secret_needs_no_auth() {
    let generator = StubGenerator::ok(AnswerMap::from([(
        "email".to_string(),
        "ada@example.com".to_string(),
    )]));
    let base = spawn_service(Arc::new(AppState::new(generator.clone(), None))).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/fill"))
        .json(&sample_request())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: AnswerMap = response.json().await.unwrap();
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_token_is_rejected_before_the_model_is_called() {
    let generator = StubGenerator::ok(AnswerMap::new());
    let state = Arc::new(AppState::new(generator.clone(), Some("s3cret".into())));
    let base = spawn_service(state).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/fill"))
        .json(&sample_request())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mismatched_token_is_rejected() {
    let generator = StubGenerator::ok(AnswerMap::new());
    let state = Arc::new(AppState::new(generator.clone(), Some("s3cret".into())));
    let base = spawn_service(state).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/fill"))
        .bearer_auth("wrong")
        .json(&sample_request())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn matching_token_is_accepted() {
    let generator = StubGenerator::ok(AnswerMap::from([(
        "email".to_string(),
        "ada@example.com".to_string(),
    )]));
    let state = Arc::new(AppState::new(generator, Some("s3cret".into())));
    let base = spawn_service(state).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/fill"))
        .bearer_auth("s3cret")
        .json(&sample_request())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn generator_failure_becomes_bad_gateway() {
    let generator = StubGenerator::failing("quota exceeded");
    let base = spawn_service(Arc::new(AppState::new(generator, None))).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/fill"))
        .json(&sample_request())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn fill_client_round_trip_against_the_service() {
    let generator = StubGenerator::ok(AnswerMap::from([(
        "email".to_string(),
        "ada@example.com".to_string(),
    )]));
    let state = Arc::new(AppState::new(generator, Some("s3cret".into())));
    let base = spawn_service(state).await;

    let client = FillClient::new(base.clone(), Some("s3cret".into()));
    let answers = client.fill(&sample_request()).await.unwrap();
    assert_eq!(answers["email"], "ada@example.com");

    // Wrong key surfaces the 401 status through the client error.
    let bad_client = FillClient::new(base, Some("nope".into()));
    let err = bad_client.fill(&sample_request()).await.unwrap_err();
    assert!(matches!(err, Error::ServiceError { status: 401, .. }));
}

// ── AnthropicGenerator against a mocked upstream ────────────────────────

#[tokio::test]
async fn anthropic_generator_parses_tool_input() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "content": [{
                "type": "tool_use",
                "id": "toolu_1",
                "name": "record_answers",
                "input": {
                    "email": "ada@example.com",
                    "count": 3
                }
            }]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let generator = AnthropicGenerator::new("sk-ant-test".into()).base_url(upstream.uri());
    let answers = generator.generate(&sample_request()).await.unwrap();

    // Non-string values from the model are dropped, not trusted.
    assert_eq!(answers.len(), 1);
    assert_eq!(answers["email"], "ada@example.com");

    // The outbound prompt embeds the serialized profile and field list.
    let requests = upstream.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("\"name\": \"Ada\""));
    assert!(prompt.contains("\"id\": \"email\""));
    assert_eq!(body["tool_choice"]["name"], "record_answers");
    assert_eq!(
        body["tools"][0]["input_schema"]["additionalProperties"]["type"],
        "string"
    );
}

#[tokio::test]
async fn anthropic_generator_accepts_text_json_fallback() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "content": [{
                "type": "text",
                "text": "{\"email\": \"ada@example.com\"}"
            }]
        })))
        .mount(&upstream)
        .await;

    let generator = AnthropicGenerator::new("sk-ant-test".into()).base_url(upstream.uri());
    let answers = generator.generate(&sample_request()).await.unwrap();
    assert_eq!(answers["email"], "ada@example.com");
}

#[tokio::test]
async fn anthropic_generator_surfaces_api_errors() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "type": "rate_limit_error", "message": "Too many requests" }
        })))
        .mount(&upstream)
        .await;

    let generator = AnthropicGenerator::new("sk-ant-test".into()).base_url(upstream.uri());
    let err = generator.generate(&sample_request()).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("429"), "message was: {message}");
    assert!(message.contains("Too many requests"), "message was: {message}");
}
