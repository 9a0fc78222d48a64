//! End-to-end queries through `RagSystem` with a scripted model.

mod common;

use serde_json::json;
use std::sync::Arc;

use common::{text_reply, tool_reply, tool_results, ScriptedLlm, TestEnv};
use course_rag::llm::{LlmError, Role};
use course_rag::rag::RagSystem;

const MCP_TITLE: &str = "MCP: Build Rich-Context AI Apps with Anthropic";

async fn rag_with(env: &TestEnv, llm: Arc<ScriptedLlm>) -> RagSystem {
    let store = Arc::new(env.store().await);
    let rag = RagSystem::new(Arc::new(env.config.clone()), store, llm);
    rag.add_course_folder(&env.docs(), false).await.unwrap();
    rag
}

#[tokio::test]
async fn test_content_question_uses_search_tool() {
    let env = TestEnv::new();
    let llm = ScriptedLlm::new(vec![
        tool_reply(
            "toolu_1",
            "search_course_content",
            json!({"query": "stdio transport", "course_name": "MCP", "lesson_number": 2}),
        ),
        text_reply("The stdio transport runs the server as a subprocess."),
    ]);
    let rag = rag_with(&env, llm.clone()).await;

    let outcome = rag
        .query("How does the stdio transport work in lesson 2 of MCP?", None)
        .await
        .unwrap();

    assert_eq!(outcome.answer, "The stdio transport runs the server as a subprocess.");
    assert_eq!(outcome.session_id, "session_1");
    assert_eq!(outcome.sources.len(), 1);
    assert_eq!(outcome.sources[0].text, format!("{} - Lesson 2", MCP_TITLE));
    assert_eq!(
        outcome.sources[0].link.as_deref(),
        Some("https://example.com/mcp/lesson-2")
    );

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 2);
    assert_eq!(requests[1].tools.len(), 2);

    let second = &requests[1];
    assert_eq!(second.messages.len(), 3);
    assert_eq!(second.messages[1].role, Role::Assistant);
    assert_eq!(second.messages[2].role, Role::User);
    let results = tool_results(second);
    assert_eq!(results.len(), 1);
    assert!(results[0].starts_with(&format!("[{} - Lesson 2]\n", MCP_TITLE)));
}

#[tokio::test]
async fn test_outline_question_uses_outline_tool() {
    let env = TestEnv::new();
    let llm = ScriptedLlm::new(vec![
        tool_reply("toolu_1", "get_course_outline", json!({"course_name": "MCP"})),
        text_reply("The MCP course has two lessons."),
    ]);
    let rag = rag_with(&env, llm.clone()).await;

    let outcome = rag.query("What is the outline of the MCP course?", None).await.unwrap();

    assert_eq!(outcome.answer, "The MCP course has two lessons.");
    assert_eq!(outcome.sources.len(), 1);
    assert_eq!(outcome.sources[0].text, MCP_TITLE);
    assert_eq!(outcome.sources[0].link.as_deref(), Some("https://example.com/mcp"));

    let results = tool_results(&llm.requests()[1]);
    assert!(results[0].contains("Lessons (2 total):"));
    assert!(results[0].contains("  2. MCP Architecture"));
}

#[tokio::test]
async fn test_general_question_answers_directly() {
    let env = TestEnv::new();
    let llm = ScriptedLlm::new(vec![text_reply("Paris.")]);
    let rag = rag_with(&env, llm.clone()).await;

    let outcome = rag.query("What is the capital of France?", None).await.unwrap();

    assert_eq!(outcome.answer, "Paris.");
    assert!(outcome.sources.is_empty());
    assert_eq!(llm.requests().len(), 1);
}

#[tokio::test]
async fn test_sources_do_not_carry_into_next_query() {
    let env = TestEnv::new();
    let llm = ScriptedLlm::new(vec![
        tool_reply("toolu_1", "search_course_content", json!({"query": "ownership"})),
        text_reply("Every value has one owner."),
        text_reply("Paris."),
    ]);
    let rag = rag_with(&env, llm).await;

    let first = rag.query("What is ownership?", None).await.unwrap();
    assert!(!first.sources.is_empty());

    let second = rag
        .query("What is the capital of France?", Some(&first.session_id))
        .await
        .unwrap();
    assert!(second.sources.is_empty());
}

#[tokio::test]
async fn test_history_reaches_system_prompt() {
    let env = TestEnv::new();
    let llm = ScriptedLlm::new(vec![text_reply("a1"), text_reply("a2")]);
    let rag = rag_with(&env, llm.clone()).await;

    let first = rag.query("q1", None).await.unwrap();
    rag.query("q2", Some(&first.session_id)).await.unwrap();

    let requests = llm.requests();
    assert!(!requests[0].system.contains("Previous conversation:"));
    assert!(requests[1]
        .system
        .ends_with("\n\nPrevious conversation:\nUser: q1\nAssistant: a1"));
    assert_eq!(
        rag.sessions().get_conversation_history(&first.session_id).as_deref(),
        Some("User: q1\nAssistant: a1\nUser: q2\nAssistant: a2")
    );
}

#[tokio::test]
async fn test_caller_supplied_session_id_is_kept() {
    let env = TestEnv::new();
    let llm = ScriptedLlm::new(vec![text_reply("hello")]);
    let rag = rag_with(&env, llm).await;

    let outcome = rag.query("hi", Some("my-session")).await.unwrap();

    assert_eq!(outcome.session_id, "my-session");
    assert_eq!(
        rag.sessions().get_conversation_history("my-session").as_deref(),
        Some("User: hi\nAssistant: hello")
    );
}

#[tokio::test]
async fn test_unknown_tool_reported_to_model() {
    let env = TestEnv::new();
    let llm = ScriptedLlm::new(vec![
        tool_reply("toolu_1", "delete_everything", json!({})),
        text_reply("I can't do that."),
    ]);
    let rag = rag_with(&env, llm.clone()).await;

    let outcome = rag.query("Delete it all", None).await.unwrap();

    assert_eq!(outcome.answer, "I can't do that.");
    assert!(outcome.sources.is_empty());
    assert_eq!(
        tool_results(&llm.requests()[1]),
        vec!["Tool 'delete_everything' not found".to_string()]
    );
}

#[tokio::test]
async fn test_llm_error_propagates_without_recording() {
    let env = TestEnv::new();
    let llm = ScriptedLlm::new(vec![Err(LlmError::Api {
        status: 529,
        message: "overloaded".to_string(),
    })]);
    let rag = rag_with(&env, llm).await;

    let err = rag.query("q", Some("s1")).await.unwrap_err();

    assert_eq!(err.to_string(), "LLM API error 529: overloaded");
    assert_eq!(rag.sessions().get_conversation_history("s1"), None);
}

#[tokio::test]
async fn test_course_analytics() {
    let env = TestEnv::new();
    let rag = rag_with(&env, ScriptedLlm::new(vec![])).await;

    let analytics = rag.course_analytics().await.unwrap();

    assert_eq!(analytics.total_courses, 2);
    assert_eq!(
        analytics.course_titles,
        vec![
            "Introduction to Rust Programming".to_string(),
            MCP_TITLE.to_string()
        ]
    );
}
