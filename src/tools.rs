//! Retrieval tools the model can call mid-conversation.
//!
//! | Tool | Purpose |
//! |------|---------|
//! | `search_course_content` | semantic search over lesson chunks, optional course/lesson filter |
//! | `get_course_outline` | course title, link and lesson list |
//!
//! Tools implement [`Tool`] and live in a [`ToolRegistry`]. A call returns
//! a [`ToolOutput`]: the text handed back to the model plus the sources
//! that backed it. Tools hold no per-call state; the caller owns whatever
//! it does with the sources.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use course_rag_core::models::{CourseOutline, SearchResults, Source};

use crate::llm::ToolDefinition;
use crate::vector_store::VectorStore;

/// Result of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool input.
    fn parameters_schema(&self) -> Value;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput>;
}

/// Tools available to the generator.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with the course search and outline tools over `store`.
    pub fn with_course_tools(store: Arc<VectorStore>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CourseSearchTool::new(Arc::clone(&store))));
        registry.register(Box::new(CourseOutlineTool::new(store)));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Run a tool by name. An unknown name is not an error: the model gets
    /// `Tool '{name}' not found` back as the result text.
    pub async fn execute(&self, name: &str, params: Value) -> Result<ToolOutput> {
        match self.find(name) {
            Some(tool) => tool.execute(params).await,
            None => {
                tracing::warn!(tool = name, "model called unknown tool");
                Ok(ToolOutput::text(format!("Tool '{}' not found", name)))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads an optional integer parameter, accepting numeric strings too.
fn optional_i64(params: &Value, key: &str) -> Option<i64> {
    match params.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

// ============ search_course_content ============

pub struct CourseSearchTool {
    store: Arc<VectorStore>,
}

impl CourseSearchTool {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    /// Render hits as `[Course - Lesson N]` blocks and collect one source per hit.
    async fn format_results(&self, results: &SearchResults) -> ToolOutput {
        let mut outlines: HashMap<String, Option<CourseOutline>> = HashMap::new();
        let mut blocks = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());

        for (doc, meta, _distance) in results.iter() {
            let label = match meta.lesson_number {
                Some(n) => format!("{} - Lesson {}", meta.course_title, n),
                None => meta.course_title.clone(),
            };
            blocks.push(format!("[{}]\n{}", label, doc));

            if !outlines.contains_key(&meta.course_title) {
                let outline = self
                    .store
                    .course_outline(&meta.course_title)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::warn!(course = %meta.course_title, error = %e, "link lookup failed");
                        None
                    });
                outlines.insert(meta.course_title.clone(), outline);
            }
            let outline = outlines.get(&meta.course_title).and_then(|o| o.as_ref());
            let lesson_link = outline.and_then(|o| {
                o.lessons
                    .iter()
                    .find(|l| meta.lesson_number.is_some() && l.lesson_number == meta.lesson_number)
                    .and_then(|l| l.lesson_link.clone())
            });
            let link = lesson_link.or_else(|| outline.and_then(|o| o.course_link.clone()));

            sources.push(Source { text: label, link });
        }

        ToolOutput {
            text: blocks.join("\n\n"),
            sources,
        }
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        "search_course_content"
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let Some(query) = params.get("query").and_then(|q| q.as_str()) else {
            bail!("missing required parameter 'query'");
        };
        let course_name = optional_str(&params, "course_name");
        let lesson_number = optional_i64(&params, "lesson_number");

        let results = self
            .store
            .search(query, course_name, lesson_number, None)
            .await;

        if let Some(error) = results.error {
            return Ok(ToolOutput::text(error));
        }

        if results.is_empty() {
            let mut msg = String::from("No relevant content found");
            if let Some(course) = course_name {
                msg.push_str(&format!(" in course '{}'", course));
            }
            if let Some(n) = lesson_number {
                msg.push_str(&format!(" in lesson {}", n));
            }
            msg.push('.');
            return Ok(ToolOutput::text(msg));
        }

        Ok(self.format_results(&results).await)
    }
}

// ============ get_course_outline ============

pub struct CourseOutlineTool {
    store: Arc<VectorStore>,
}

impl CourseOutlineTool {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }
}

fn format_outline(outline: &CourseOutline) -> String {
    let mut lines = vec![format!("Course: {}", outline.course_title)];
    if let Some(link) = &outline.course_link {
        lines.push(format!("Link: {}", link));
    }
    if let Some(instructor) = &outline.instructor {
        lines.push(format!("Instructor: {}", instructor));
    }
    lines.push(format!("\nLessons ({} total):", outline.lessons.len()));
    for lesson in &outline.lessons {
        match lesson.lesson_number {
            Some(n) => lines.push(format!("  {}. {}", n, lesson.title)),
            None => lines.push(format!("  - {}", lesson.title)),
        }
    }
    lines.join("\n")
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &str {
        "get_course_outline"
    }

    fn description(&self) -> &str {
        "Get a course outline: title, link, and the numbered list of lessons"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_name": {
                    "type": "string",
                    "description": "Course title or part of it (e.g. 'MCP', 'Computer Use')"
                }
            },
            "required": ["course_name"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let Some(name) = optional_str(&params, "course_name") else {
            bail!("missing required parameter 'course_name'");
        };

        let not_found = || ToolOutput::text(format!("No course found matching '{}'.", name));
        let Some(title) = self.store.resolve_course_name(name).await else {
            return Ok(not_found());
        };
        let Some(outline) = self.store.course_outline(&title).await? else {
            return Ok(not_found());
        };

        Ok(ToolOutput {
            text: format_outline(&outline),
            sources: vec![Source {
                text: outline.course_title.clone(),
                link: outline.course_link.clone(),
            }],
        })
    }
}
