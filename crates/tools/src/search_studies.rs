//! Study search tool: semantic retrieval over the clinical-study index.
//!
//! The answering agent's only tool. Given a natural-language query it returns
//! the most similar study passages, numbered, so the model can cite them.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use trialscout_core::error::{QueryError, ToolError};
use trialscout_core::tool::{Tool, ToolResult};
use trialscout_index::IndexHandle;

pub const TOOL_NAME: &str = "search_studies";
pub const TOOL_DESCRIPTION: &str = "Searches and retrieves information from clinical studies.";

pub struct SearchStudiesTool {
    index: IndexHandle,
    top_k: usize,
}

/// One retrieved passage as exposed in the tool's structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Passage {
    pub rank: usize,
    pub study_id: String,
    pub score: f32,
    pub text: String,
}

impl SearchStudiesTool {
    /// `top_k` below 1 is raised to 1.
    pub fn new(index: IndexHandle, top_k: usize) -> Self {
        Self {
            index,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The top-k passage texts for `query`, most similar first.
    pub async fn search(&self, query: &str) -> Result<Vec<String>, QueryError> {
        self.index.query_texts(query, self.top_k).await
    }

    async fn passages(&self, query: &str) -> Result<Vec<Passage>, QueryError> {
        let scored = self.index.query(query, self.top_k).await?;
        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, s)| Passage {
                rank: i + 1,
                study_id: s.chunk.study_id,
                score: s.score,
                text: s.chunk.text,
            })
            .collect())
    }
}

/// Accept `{"query": "..."}` or a bare JSON string.
fn query_argument(arguments: &serde_json::Value) -> Result<&str, ToolError> {
    let query = match arguments {
        serde_json::Value::String(s) => s.as_str(),
        other => other["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?,
    };

    let query = query.trim();
    if query.is_empty() {
        return Err(ToolError::InvalidArguments("'query' must not be empty".into()));
    }
    Ok(query)
}

fn render(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return "No matching study passages found.".into();
    }
    passages
        .iter()
        .map(|p| format!("[{}] {}", p.rank, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for SearchStudiesTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        TOOL_DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for in the clinical studies, e.g. a condition, intervention, or eligibility question"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = query_argument(&arguments)?;

        let passages = self.passages(query).await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: e.to_string(),
        })?;

        debug!(query, results = passages.len(), "Study search");

        let data = serde_json::to_value(&passages).map_err(|e| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: e.to_string(),
        })?;

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: render(&passages),
            data: Some(data),
        })
    }
}
