//! HTTP API tests: the router is bound to an ephemeral port and called
//! with a real client.

mod common;

use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;

use common::{text_reply, tool_reply, ScriptedLlm, TestEnv};
use course_rag::llm::LlmError;
use course_rag::rag::RagSystem;
use course_rag::server::router;

struct TestServer {
    base: String,
    _env: TestEnv,
}

async fn spawn_server(llm: Arc<ScriptedLlm>) -> TestServer {
    let env = TestEnv::new();
    let frontend = env.dir.path().join("frontend");
    fs::create_dir_all(&frontend).unwrap();
    fs::write(frontend.join("index.html"), "<html>chat</html>").unwrap();

    let store = Arc::new(env.store().await);
    let rag = RagSystem::new(Arc::new(env.config.clone()), store, llm);
    rag.add_course_folder(&env.docs(), false).await.unwrap();

    let app = router(Arc::new(rag), Some(&frontend));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        _env: env,
    }
}

#[tokio::test]
async fn test_query_endpoint() {
    let llm = ScriptedLlm::new(vec![
        tool_reply(
            "toolu_1",
            "search_course_content",
            json!({"query": "ownership", "course_name": "Rust", "lesson_number": 1}),
        ),
        text_reply("Each value has a single owner."),
    ]);
    let server = spawn_server(llm).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/query", server.base))
        .json(&json!({"query": "What is ownership in the Rust course?"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], "Each value has a single owner.");
    assert_eq!(body["session_id"], "session_1");
    assert_eq!(
        body["sources"],
        json!([{
            "text": "Introduction to Rust Programming - Lesson 1",
            "link": "https://example.com/rust/lesson-1"
        }])
    );
}

#[tokio::test]
async fn test_query_reuses_session() {
    let llm = ScriptedLlm::new(vec![text_reply("first"), text_reply("second")]);
    let server = spawn_server(llm.clone()).await;
    let client = reqwest::Client::new();

    let first: Value = client
        .post(format!("{}/api/query", server.base))
        .json(&json!({"query": "one"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = first["session_id"].as_str().unwrap().to_string();

    let second: Value = client
        .post(format!("{}/api/query", server.base))
        .json(&json!({"query": "two", "session_id": session_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(second["session_id"], first["session_id"]);
    assert!(second["sources"].as_array().unwrap().is_empty());
    assert!(llm.requests()[1].system.contains("User: one\nAssistant: first"));
}

#[tokio::test]
async fn test_delete_session_forgets_history() {
    let llm = ScriptedLlm::new(vec![text_reply("first"), text_reply("second")]);
    let server = spawn_server(llm.clone()).await;
    let client = reqwest::Client::new();

    let first: Value = client
        .post(format!("{}/api/query", server.base))
        .json(&json!({"query": "one"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = first["session_id"].as_str().unwrap().to_string();

    let resp = client
        .delete(format!("{}/api/sessions/{}", server.base, session_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let second: Value = client
        .post(format!("{}/api/query", server.base))
        .json(&json!({"query": "two", "session_id": session_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(second["answer"], "second");
    assert!(!llm.requests()[1].system.contains("User: one"));
}

#[tokio::test]
async fn test_delete_unknown_session_is_204() {
    let server = spawn_server(ScriptedLlm::new(vec![])).await;

    let resp = reqwest::Client::new()
        .delete(format!("{}/api/sessions/session_99", server.base))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 204);
}

#[tokio::test]
async fn test_query_missing_field_is_422() {
    let server = spawn_server(ScriptedLlm::new(vec![])).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/query", server.base))
        .json(&json!({"session_id": "abc"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn test_query_llm_failure_is_500_with_detail() {
    let llm = ScriptedLlm::new(vec![Err(LlmError::Api {
        status: 401,
        message: "invalid x-api-key".to_string(),
    })]);
    let server = spawn_server(llm).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/query", server.base))
        .json(&json!({"query": "hello"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"detail": "LLM API error 401: invalid x-api-key"}));
}

#[tokio::test]
async fn test_courses_endpoint() {
    let server = spawn_server(ScriptedLlm::new(vec![])).await;

    let body: Value = reqwest::get(format!("{}/api/courses", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(
        body,
        json!({
            "total_courses": 2,
            "course_titles": [
                "Introduction to Rust Programming",
                "MCP: Build Rich-Context AI Apps with Anthropic"
            ]
        })
    );
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = spawn_server(ScriptedLlm::new(vec![])).await;

    let body: Value = reqwest::get(format!("{}/health", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_static_ui_is_not_cached() {
    let server = spawn_server(ScriptedLlm::new(vec![])).await;

    let resp = reqwest::get(format!("{}/", server.base)).await.unwrap();

    assert_eq!(resp.status(), 200);
    let headers = resp.headers().clone();
    assert_eq!(
        headers["cache-control"],
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(headers["pragma"], "no-cache");
    assert_eq!(headers["expires"], "0");
    assert_eq!(resp.text().await.unwrap(), "<html>chat</html>");
}

#[tokio::test]
async fn test_cors_preflight_allowed() {
    let server = spawn_server(ScriptedLlm::new(vec![])).await;

    let resp = reqwest::Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/api/query", server.base),
        )
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}
