//! Integration tests: the Groq client and generator against a local OpenAI-compatible
//! server that replies with a canned server-sent-event stream.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use prompter::config::GeneratorConfig;
use prompter::generator::{AnswerGenerator, GenerateError};
use prompter::llm::{ChatMessage, CompletionBackend, GroqClient, LlmError};
use prompter::prompt::GenerationRequest;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

fn event(content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({ "id": "c1", "choices": [{ "index": 0, "delta": { "content": content } }] })
    )
}

fn sse(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn completions(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    rec.auth.lock().unwrap().push(auth);
    rec.bodies.lock().unwrap().push(body);
    sse(format!(
        "data: {{\"choices\":[{{\"delta\":{{\"role\":\"assistant\"}}}}]}}\n\n{}{}data: [DONE]\n\n",
        event("Hel"),
        event("lo")
    ))
}

async fn denied() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        r#"{"error":{"message":"Invalid API Key"}}"#,
    )
        .into_response()
}

async fn broken() -> Response {
    sse(format!(
        "{}data: {{\"error\":{{\"message\":\"rate limited\"}}}}\n\n",
        event("par")
    ))
}

async fn garbled() -> Response {
    sse("data: {oops not json\n\ndata: [DONE]\n\n".to_string())
}

async fn fake_server() -> (String, Recorded) {
    let rec = Recorded::default();
    let app = Router::new()
        .route("/ok/chat/completions", post(completions))
        .route("/denied/chat/completions", post(denied))
        .route("/broken/chat/completions", post(broken))
        .route("/garbled/chat/completions", post(garbled))
        .with_state(rec.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), rec)
}

async fn collect(client: &GroqClient) -> (Vec<String>, Result<(), LlmError>) {
    let mut got = Vec::new();
    let mut on_chunk = |s: &str| got.push(s.to_string());
    let res = client
        .chat_stream("test-model", vec![ChatMessage::user("hi")], &mut on_chunk)
        .await;
    (got, res)
}

#[tokio::test]
async fn streams_fragments_with_bearer_auth() {
    let (base, rec) = fake_server().await;
    let client = GroqClient::new(Some(format!("{}/ok", base)), "test-key", None).unwrap();

    let (got, res) = collect(&client).await;
    res.expect("stream ok");
    assert_eq!(got, vec!["Hel".to_string(), "lo".to_string()]);

    assert_eq!(rec.auth.lock().unwrap()[0], "Bearer test-key");
    let body = rec.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"], json!([{ "role": "user", "content": "hi" }]));
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let (base, _) = fake_server().await;
    let client = GroqClient::new(Some(format!("{}/denied", base)), "bad", None).unwrap();

    let (got, res) = collect(&client).await;
    assert!(got.is_empty());
    match res {
        Err(LlmError::Api(msg)) => {
            assert!(msg.contains("401"), "{}", msg);
            assert!(msg.contains("Invalid API Key"), "{}", msg);
        }
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn error_event_mid_stream_fails_the_call() {
    let (base, _) = fake_server().await;
    let client = GroqClient::new(Some(format!("{}/broken", base)), "k", None).unwrap();

    let (_, res) = collect(&client).await;
    assert!(matches!(res, Err(LlmError::Api(ref m)) if m == "rate limited"));
}

#[tokio::test]
async fn unreachable_server_is_request_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let client = GroqClient::new(Some(format!("http://127.0.0.1:{}", port)), "k", None).unwrap();

    let (_, res) = collect(&client).await;
    assert!(matches!(res, Err(LlmError::Request(_))));
}

#[tokio::test]
async fn generator_answers_through_groq_client() {
    let (base, rec) = fake_server().await;
    let config = GeneratorConfig {
        base_url: format!("{}/ok", base),
        ..Default::default()
    };
    let generator = AnswerGenerator::from_config(&config, Some("test-key".to_string()));

    let text = GenerationRequest {
        question: "Tell me about yourself",
        context: "Rust engineer",
        image: None,
    };
    assert_eq!(generator.generate(&text).await.unwrap(), "Hello");

    let vision = GenerationRequest {
        image: Some("QUJD"),
        ..text
    };
    assert_eq!(generator.generate(&vision).await.unwrap(), "Hello");

    let bodies = rec.bodies.lock().unwrap();
    assert_eq!(bodies[0]["model"], "llama-3.1-8b-instant");
    assert_eq!(
        bodies[0]["messages"][1]["content"],
        "Context: Rust engineer\n\nQuestion: Tell me about yourself"
    );
    assert_eq!(bodies[1]["model"], "llama-3.2-11b-vision-preview");
    assert_eq!(
        bodies[1]["messages"][1]["content"][1]["image_url"]["url"],
        "data:image/jpeg;base64,QUJD"
    );
}

#[tokio::test]
async fn generator_reports_upstream_status() {
    let (base, _) = fake_server().await;
    let config = GeneratorConfig {
        base_url: format!("{}/denied", base),
        ..Default::default()
    };
    let generator = AnswerGenerator::from_config(&config, Some("bad".to_string()));
    let req = GenerationRequest {
        question: "q",
        context: "",
        image: None,
    };
    let err = generator.generate(&req).await.unwrap_err();
    assert!(matches!(err, GenerateError::Upstream(LlmError::Api(_))));
    assert!(err
        .to_string()
        .starts_with("Error generating answer: api error: 401"));
}

#[tokio::test]
async fn malformed_stream_is_an_error_not_an_empty_answer() {
    let (base, _) = fake_server().await;
    let client = GroqClient::new(Some(format!("{}/garbled", base)), "k", None).unwrap();
    let (got, res) = collect(&client).await;
    assert!(got.is_empty());
    assert!(matches!(res, Err(LlmError::Decode(_))));

    let config = GeneratorConfig {
        base_url: format!("{}/garbled", base),
        ..Default::default()
    };
    let generator = AnswerGenerator::from_config(&config, Some("k".to_string()));
    let req = GenerationRequest {
        question: "q",
        context: "",
        image: None,
    };
    let err = generator.generate(&req).await.unwrap_err();
    assert!(matches!(err, GenerateError::Upstream(LlmError::Decode(_))));
    assert!(err
        .to_string()
        .starts_with("Error generating answer: malformed stream event:"));
}
