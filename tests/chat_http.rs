// tests/chat_http.rs
//
// OpenAI-compatible chat backend against a local fake completions server,
// plus the full app wired from config.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt as _;

use common::{json_body, serve};
use sign_news::chat::{ChatClient, OpenAiChat, RetryPolicy, RetryingChat};
use sign_news::config::{AppConfig, ChatSection};
use sign_news::error::ChatError;

#[derive(Clone)]
struct Fake {
    calls: Arc<AtomicUsize>,
    /// Status to return per call; past the end the last entry repeats.
    statuses: Arc<Vec<u16>>,
    last_auth: Arc<Mutex<Option<String>>>,
    last_body: Arc<Mutex<Value>>,
}

impl Fake {
    fn new(statuses: Vec<u16>) -> Self {
        Self {
            calls: Arc::default(),
            statuses: Arc::new(statuses),
            last_auth: Arc::default(),
            last_body: Arc::default(),
        }
    }
}

async fn completions(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let n = fake.calls.fetch_add(1, Ordering::SeqCst);
    *fake.last_auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *fake.last_body.lock().unwrap() = body;

    let code = fake.statuses[n.min(fake.statuses.len() - 1)];
    if code == 200 {
        Json(json!({
            "id": "chatcmpl-test",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "  ยกมือขึ้นแล้วโบก  " } }
            ]
        }))
        .into_response()
    } else {
        let status = StatusCode::from_u16(code).unwrap();
        (status, Json(json!({ "error": { "message": "nope" } }))).into_response()
    }
}

async fn fake_openai(statuses: Vec<u16>) -> (String, Fake) {
    let fake = Fake::new(statuses);
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(fake.clone());
    let base = serve(app).await;
    (format!("{base}/v1"), fake)
}

fn chat_section(base_url: &str, key: Option<&str>) -> ChatSection {
    ChatSection {
        base_url: base_url.to_string(),
        api_key: key.map(str::to_string),
        ..ChatSection::default()
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(1),
        step_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn completion_reply_is_trimmed_and_request_is_well_formed() {
    let (base, fake) = fake_openai(vec![200]).await;
    let chat = RetryingChat::new(
        OpenAiChat::new(&chat_section(&base, Some("sk-test"))).unwrap(),
        fast_policy(),
    );

    let reply = chat.reply("How do I sign hello?").await.unwrap();
    assert_eq!(reply, "ยกมือขึ้นแล้วโบก");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fake.last_auth.lock().unwrap().as_deref(), Some("Bearer sk-test"));

    let body = fake.last_body.lock().unwrap().clone();
    assert_eq!(body["model"], "gpt-4o-mini");
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "How do I sign hello?");
}

#[tokio::test]
async fn rate_limit_then_success_is_retried() {
    let (base, fake) = fake_openai(vec![429, 503, 200]).await;
    let chat = RetryingChat::new(
        OpenAiChat::new(&chat_section(&base, Some("sk-test"))).unwrap(),
        fast_policy(),
    );
    assert_eq!(chat.reply("hi").await.unwrap(), "ยกมือขึ้นแล้วโบก");
    assert_eq!(fake.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let (base, fake) = fake_openai(vec![401, 200]).await;
    let chat = RetryingChat::new(
        OpenAiChat::new(&chat_section(&base, Some("sk-bad"))).unwrap(),
        fast_policy(),
    );
    assert!(matches!(chat.reply("hi").await, Err(ChatError::Unauthorized)));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn persistent_overload_exhausts_attempts() {
    let (base, fake) = fake_openai(vec![529]).await;
    let chat = RetryingChat::new(
        OpenAiChat::new(&chat_section(&base, Some("sk-test"))).unwrap(),
        fast_policy(),
    );
    assert!(matches!(chat.reply("hi").await, Err(ChatError::Overloaded(529))));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn missing_key_fails_without_calling_out() {
    let (base, fake) = fake_openai(vec![200]).await;
    let chat = RetryingChat::new(
        OpenAiChat::new(&chat_section(&base, None)).unwrap(),
        fast_policy(),
    );
    assert!(matches!(chat.reply("hi").await, Err(ChatError::Unauthorized)));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn app_chat_route_uses_configured_backend() {
    let (base, _fake) = fake_openai(vec![200]).await;
    let cfg = AppConfig {
        chat: chat_section(&base, Some("sk-test")),
        ..AppConfig::default()
    };
    let app = sign_news::app_with_config(&cfg).unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "message": "สวัสดี" }).to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v, json!({ "success": true, "reply": "ยกมือขึ้นแล้วโบก" }));
}

#[tokio::test]
async fn undecodable_reply_is_not_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::OK, "<html>oops</html>")
            }
        }),
    );
    let base = format!("{}/v1", serve(app).await);

    let chat = RetryingChat::new(
        OpenAiChat::new(&chat_section(&base, Some("sk-test"))).unwrap(),
        fast_policy(),
    );
    assert!(matches!(chat.reply("hi").await, Err(ChatError::Decode(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
