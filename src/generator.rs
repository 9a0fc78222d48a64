//! Answer generation with at most one tool round trip.
//!
//! ```text
//! system prompt (+ history) ─┐
//! "Answer this question…"  ──┴─▶ LLM ──end_turn──▶ answer
//!                                 │
//!                              tool_use
//!                                 ▼
//!                     run every requested tool
//!                                 │
//!            assistant turn + tool_result blocks appended
//!                                 ▼
//!                       LLM (tools still declared) ──▶ answer
//! ```
//!
//! The second reply is final even if it asks for more tools. Sources from
//! tool calls are collected in a [`SourceBuffer`] owned by the call, so
//! concurrent requests never see each other's sources.

use anyhow::Result;
use std::sync::Arc;

use course_rag_core::models::Source;

use crate::llm::{ContentBlock, LlmClient, LlmRequest, Message, Role};
use crate::tools::ToolRegistry;

pub const SYSTEM_PROMPT: &str = "You are an AI assistant specialized in course materials and educational content with access to tools for course information.

Tool Usage:
- Use **search_course_content** for questions about specific course content or detailed educational materials
- Use **get_course_outline** for questions about a course's structure, its link, or its list of lessons
- **One tool round per query maximum**
- Synthesize tool results into accurate, fact-based responses
- If a tool yields no results, state this clearly without offering alternatives

Response Protocol:
- **General knowledge questions**: Answer using existing knowledge without using tools
- **Course-specific questions**: Use the appropriate tool first, then answer
- **No meta-commentary**:
 - Provide direct answers only, with no reasoning process, tool explanations, or question-type analysis
 - Do not mention \"based on the search results\"

All responses must be:
1. **Brief, concise and focused** - Get to the point quickly
2. **Educational** - Maintain instructional value
3. **Clear** - Use accessible language
4. **Example-supported** - Include relevant examples when they aid understanding
Provide only the direct answer to what was asked.
";

/// Sources from the most recent tool call that produced any.
///
/// Reading with [`take`](SourceBuffer::take) empties the buffer.
#[derive(Debug, Default)]
pub struct SourceBuffer {
    sources: Vec<Source>,
}

impl SourceBuffer {
    /// Replace the buffered sources. An empty set leaves the buffer as is.
    pub fn record(&mut self, sources: Vec<Source>) {
        if !sources.is_empty() {
            self.sources = sources;
        }
    }

    pub fn take(&mut self) -> Vec<Source> {
        std::mem::take(&mut self.sources)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
}

pub struct AiGenerator {
    llm: Arc<dyn LlmClient>,
}

impl AiGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn system_prompt(history: Option<&str>) -> String {
        match history {
            Some(h) if !h.is_empty() => format!("{}\n\nPrevious conversation:\n{}", SYSTEM_PROMPT, h),
            _ => SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn user_prompt(query: &str) -> String {
        format!("Answer this question about course materials: {}", query)
    }

    /// Answer `query`, letting the model call `tools` at most once.
    ///
    /// LLM failures propagate. Tool failures do not: the model receives
    /// `Tool execution failed: …` as that call's result.
    pub async fn generate_response(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&ToolRegistry>,
    ) -> Result<GeneratedAnswer> {
        let system = Self::system_prompt(history);
        let definitions = tools.map(|t| t.definitions()).unwrap_or_default();
        let mut request = LlmRequest {
            system,
            messages: vec![Message::user(Self::user_prompt(query))],
            tools: definitions,
        };

        let response = self.llm.create_message(&request).await?;

        let registry = match tools {
            Some(registry) if response.wants_tools() => registry,
            _ => {
                return Ok(GeneratedAnswer {
                    answer: response.first_text(),
                    sources: Vec::new(),
                })
            }
        };

        let mut buffer = SourceBuffer::default();
        let mut results = Vec::new();
        for (id, name, input) in response.tool_uses() {
            tracing::info!(tool = name, "executing tool call");
            let content = match registry.execute(name, input.clone()).await {
                Ok(output) => {
                    buffer.record(output.sources);
                    if output.text.is_empty() {
                        "No results returned".to_string()
                    } else {
                        output.text
                    }
                }
                Err(e) => {
                    tracing::warn!(tool = name, error = %e, "tool execution failed");
                    format!("Tool execution failed: {}", e)
                }
            };
            results.push(ContentBlock::ToolResult {
                tool_use_id: id.to_string(),
                content,
            });
        }

        request.messages.push(Message {
            role: Role::Assistant,
            content: response
                .content
                .iter()
                .filter(|b| !matches!(b, ContentBlock::Unsupported))
                .cloned()
                .collect(),
        });
        request.messages.push(Message {
            role: Role::User,
            content: results,
        });

        let final_response = self.llm.create_message(&request).await?;

        Ok(GeneratedAnswer {
            answer: final_response.first_text(),
            sources: buffer.take(),
        })
    }
}
