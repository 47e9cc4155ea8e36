//! Answering-agent step and phase types.
//!
//! Each reasoning call yields exactly one [`AgentStep`]: either a request to
//! invoke a tool or the final answer. The agent loop itself lives in
//! `trialscout-agent`; these types are shared with the gateway and CLI.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Where an answering run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// Waiting on the reasoning service
    Thinking,
    /// Executing the requested tool
    ToolInvocation,
    /// Recording the tool's output as an observation
    Observing,
    /// A final answer was produced
    Concluding,
    /// The run ended with an error
    Failed,
}

impl AgentPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Concluding | Self::Failed)
    }
}

/// A tool request decoded from an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// The model's tool-call ID, echoed back on the observation
    pub call_id: String,

    /// Tool name as requested
    pub name: String,

    /// Parsed arguments. Non-JSON argument text is kept as a JSON string.
    pub arguments: serde_json::Value,
}

/// The decision carried by a single reasoning response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStep {
    ToolInvocation(ToolInvocation),
    FinalAnswer(String),
}

impl AgentStep {
    /// Decode the model's reply. Only the first tool call is honored; if
    /// there is none, the message content is the final answer.
    pub fn decode(message: &Message) -> Self {
        match message.tool_calls.first() {
            Some(call) => {
                let arguments = serde_json::from_str(&call.arguments)
                    .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()));
                Self::ToolInvocation(ToolInvocation {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    arguments,
                })
            }
            None => Self::FinalAnswer(message.content.clone()),
        }
    }
}
