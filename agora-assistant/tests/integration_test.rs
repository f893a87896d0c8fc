//! Integration tests for agora-assistant.
//!
//! Drives the full router against a mocked completion API and mocked
//! PostgREST feeds.

use agora_assistant::chat::{FailureKind, PERSONA};
use agora_assistant::{build_app, build_state};
use agora_common::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(llm: &MockServer, feeds: Option<&MockServer>) -> Config {
    let mut config = Config::default();
    config.llm.base_url = llm.uri();
    config.secrets.llm_api_key = Some("test-key".into());
    config.feeds.url = feeds.map(|server| server.uri());
    config
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
    }))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let llm = MockServer::start().await;
    let app = build_app(build_state(&config_for(&llm, None)));

    for uri in ["/health", "/api/health"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "agora-assistant");
        assert_eq!(json["sessions"], 0);
    }
}

#[tokio::test]
async fn test_conversation_flow_with_grounding() {
    let llm = MockServer::start().await;
    let feeds = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/communities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "Gardeners", "member_count": 42, "tags": ["plants"]}
        ])))
        .mount(&feeds)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/marketplace_listings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"title": "Seeds", "category": "Garden", "price": 0}
        ])))
        .mount(&feeds)
        .await;

    let grounded_first_turn = format!(
        "[{}\n\nActive communities:\n- Gardeners (42 members) [Tags: plants]\n\n\
         Marketplace listings:\n- Seeds (Garden) - Free]\n\nWhat should I join?",
        PERSONA
    );

    // Partial matching accepts longer arrays, so the follow-up mock goes first.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "user", "content": grounded_first_turn},
                {"role": "assistant", "content": "Try Gardeners!"},
                {"role": "user", "content": "Thanks"}
            ]
        })))
        .respond_with(completion("You're welcome."))
        .expect(1)
        .mount(&llm)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{"role": "user", "content": grounded_first_turn}]
        })))
        .respond_with(completion("Try Gardeners!"))
        .expect(1)
        .mount(&llm)
        .await;

    let app = build_app(build_state(&config_for(&llm, Some(&feeds))));

    // 1. First message opens a session
    let response = app
        .clone()
        .oneshot(post_json("/api/chat", json!({"message": "What should I join?"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response).await;
    assert_eq!(json["response"], "Try Gardeners!");
    let session_id = json["sessionId"].as_str().unwrap().to_string();
    assert!(!session_id.is_empty());

    // 2. Follow-up keeps the session and sends the history
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "Thanks", "sessionId": session_id}),
        ))
        .await
        .unwrap();
    let json = read_json(response).await;
    assert_eq!(json["response"], "You're welcome.");
    assert_eq!(json["sessionId"], session_id.as_str());

    // 3. Clear
    let response = app
        .clone()
        .oneshot(post_json("/api/chat/clear", json!({"sessionId": session_id})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({"success": true}));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(read_json(response).await["sessions"], 0);
}

#[tokio::test]
async fn test_rate_limit_reply_keeps_session() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&llm)
        .await;

    let app = build_app(build_state(&config_for(&llm, None)));

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "Hello", "sessionId": ""}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["response"], FailureKind::RateLimit.user_message());
    assert!(!json["sessionId"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_feeds_do_not_block_chat() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{"role": "user", "content": format!("[{}]\n\nHi", PERSONA)}]
        })))
        .respond_with(completion("Hello!"))
        .expect(1)
        .mount(&llm)
        .await;

    let mut config = config_for(&llm, None);
    config.feeds.url = Some("http://127.0.0.1:9".into());
    let app = build_app(build_state(&config));

    let response = app
        .oneshot(post_json("/api/chat", json!({"message": "Hi"})))
        .await
        .unwrap();
    assert_eq!(read_json(response).await["response"], "Hello!");
}

#[tokio::test]
async fn test_missing_api_key_gets_setup_apology() {
    let llm = MockServer::start().await;
    let mut config = config_for(&llm, None);
    config.secrets.llm_api_key = None;

    let app = build_app(build_state(&config));
    let response = app
        .oneshot(post_json("/api/chat", json!({"message": "Hi"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await["response"],
        FailureKind::Auth.user_message()
    );
}

#[tokio::test]
async fn test_input_validation() {
    let llm = MockServer::start().await;
    let app = build_app(build_state(&config_for(&llm, None)));

    let response = app
        .clone()
        .oneshot(post_json("/api/chat", json!({"message": "   "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "EMPTY_MESSAGE");

    let response = app
        .clone()
        .oneshot(post_json("/api/chat", json!({"message": "x".repeat(4001)})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "MESSAGE_TOO_LONG");

    let response = app
        .clone()
        .oneshot(post_json("/api/chat", json!({"sessionId": "abc"})))
        .await
        .unwrap();
    assert!(response.status().is_client_error());

    // Nothing reached the completion API
    assert!(llm.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_unknown_session_succeeds() {
    let llm = MockServer::start().await;
    let app = build_app(build_state(&config_for(&llm, None)));

    let response = app
        .oneshot(post_json(
            "/api/chat/clear",
            json!({"sessionId": "session-0-unknown"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({"success": true}));
}
