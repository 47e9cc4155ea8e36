//! Answering agent: Thought → Action → Observation until a final answer.
//!
//! Each reasoning call is decoded into exactly one [`AgentStep`]. A tool
//! invocation runs the requested tool and feeds its output back as an
//! observation; a final answer ends the run. Tool failures are observations
//! too, so the model can recover. Only a failed reasoning call or an
//! exhausted step budget ends a run with an error.
//!
//! When the model asks for several tool calls at once, only the first is
//! executed and the others are removed from the assistant message, so every
//! step reasons over a context that reflects all prior observations.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trialscout_config::AppConfig;
use trialscout_core::error::AgentError;
use trialscout_core::event::{DomainEvent, EventBus};
use trialscout_core::message::{Conversation, Message};
use trialscout_core::provider::{Provider, ProviderRequest};
use trialscout_core::tool::{ToolCall, ToolRegistry};
use trialscout_core::{AgentPhase, AgentStep, ToolInvocation};

use crate::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::trace::RunTrace;

pub const DEFAULT_MAX_ITERATIONS: u32 = 15;

pub struct AnsweringAgent {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: u32,
    event_bus: Arc<EventBus>,
}

/// A study passage the agent observed while answering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub study_id: String,
    pub text: String,
    #[serde(default)]
    pub score: f32,
}

/// The outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentAnswer {
    pub answer: String,
    pub trace: RunTrace,
    pub iterations: u32,
    pub tool_calls_made: usize,
    /// Distinct passages returned by the tools, in the order first seen.
    pub sources: Vec<Source>,
}

impl AnsweringAgent {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            tools,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            event_bus,
        }
    }

    /// Build an agent with model, sampling and budget settings from `config`.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let mut agent = Self::new(provider, config.model.clone(), tools, event_bus)
            .with_temperature(config.temperature)
            .with_max_iterations(config.agent.max_iterations);
        if let Some(max) = config.max_tokens {
            agent = agent.with_max_tokens(max);
        }
        if let Some(prompt) = &config.agent.system_prompt {
            agent = agent.with_system_prompt(prompt.clone());
        }
        agent
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Budget of reasoning calls per run (minimum 1).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// A fresh conversation seeded with this agent's system prompt.
    pub fn new_conversation(&self) -> Conversation {
        Conversation::with_system(self.system_prompt.clone())
    }

    /// Answer `question` in a fresh conversation.
    pub async fn run(&self, question: &str) -> Result<AgentAnswer, AgentError> {
        let mut conversation = self.new_conversation();
        self.run_in(&mut conversation, question).await
    }

    /// Answer `question` as the next turn of `conversation`.
    ///
    /// The conversation keeps everything the run appended, including on
    /// failure, so a caller can inspect or continue it.
    pub async fn run_in(
        &self,
        conversation: &mut Conversation,
        question: &str,
    ) -> Result<AgentAnswer, AgentError> {
        let mut trace = RunTrace::new(self.max_iterations);
        let mut sources: Vec<Source> = Vec::new();
        let mut tool_calls_made = 0usize;
        let mut tokens_used = 0u32;
        let tool_defs = self.tools.definitions();
        let parallel_tool_calls = (!tool_defs.is_empty()).then_some(false);

        conversation.push(Message::user(question));
        info!(
            conversation_id = %conversation.id,
            model = %self.model,
            max_iterations = self.max_iterations,
            "Answering run starting"
        );

        loop {
            if !trace.tick() {
                warn!(
                    conversation_id = %conversation.id,
                    max_iterations = self.max_iterations,
                    "Answering run exceeded its step budget"
                );
                trace.enter(AgentPhase::Failed);
                let err = AgentError::StepBudgetExceeded {
                    max_iterations: self.max_iterations,
                };
                self.publish_failure(&err);
                return Err(err);
            }

            trace.enter(AgentPhase::Thinking);
            debug!(iteration = trace.iterations, "Reasoning step");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_defs.clone(),
                tool_choice: None,
                parallel_tool_calls,
                stop: vec![],
            };

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Reasoning call failed");
                    trace.enter(AgentPhase::Failed);
                    let err = AgentError::Reasoning(e);
                    self.publish_failure(&err);
                    return Err(err);
                }
            };

            if let Some(usage) = &response.usage {
                tokens_used = tokens_used.saturating_add(usage.total_tokens);
            }

            let mut message = response.message;
            match AgentStep::decode(&message) {
                AgentStep::FinalAnswer(answer) => {
                    trace.enter(AgentPhase::Concluding);
                    trace.add_answer(&answer);
                    conversation.push(message);

                    self.event_bus.publish(DomainEvent::ResponseGenerated {
                        conversation_id: conversation.id.to_string(),
                        model: response.model,
                        iterations: trace.iterations,
                        tokens_used,
                        timestamp: Utc::now(),
                    });

                    info!(
                        iterations = trace.iterations,
                        tool_calls = tool_calls_made,
                        sources = sources.len(),
                        "Answering run completed"
                    );

                    return Ok(AgentAnswer {
                        answer,
                        iterations: trace.iterations,
                        trace,
                        tool_calls_made,
                        sources,
                    });
                }
                AgentStep::ToolInvocation(invocation) => {
                    if !message.content.trim().is_empty() {
                        trace.add_thought(&message.content);
                    }
                    if message.tool_calls.len() > 1 {
                        debug!(
                            dropped = message.tool_calls.len() - 1,
                            "Keeping only the first requested tool call"
                        );
                        message.tool_calls.truncate(1);
                    }
                    conversation.push(message);

                    tool_calls_made += 1;
                    let observation = self.invoke(invocation, &mut trace, &mut sources).await;
                    conversation.push(observation);
                }
            }
        }
    }

    /// Execute one tool invocation and turn its outcome into an observation.
    async fn invoke(
        &self,
        invocation: ToolInvocation,
        trace: &mut RunTrace,
        sources: &mut Vec<Source>,
    ) -> Message {
        trace.enter(AgentPhase::ToolInvocation);
        trace.add_action(&format!("{}({})", invocation.name, invocation.arguments));

        let call = ToolCall {
            id: invocation.call_id,
            name: invocation.name,
            arguments: invocation.arguments,
        };

        let start = Instant::now();
        let result = self.tools.execute(&call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        trace.enter(AgentPhase::Observing);
        let (observation, success) = match result {
            Ok(result) => {
                if let Some(data) = &result.data {
                    collect_sources(data, sources);
                }
                (result.output, result.success)
            }
            Err(e) => {
                debug!(tool = %call.name, error = %e, "Tool call failed; reporting to the model");
                (format!("Error: {e}"), false)
            }
        };

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        trace.add_observation(&observation);
        Message::tool_result(call.id, observation)
    }

    fn publish_failure(&self, err: &AgentError) {
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: "answering_agent".into(),
            error_message: err.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Add passages from a tool's structured data, skipping ones already seen.
fn collect_sources(data: &serde_json::Value, sources: &mut Vec<Source>) {
    let Ok(passages) = serde_json::from_value::<Vec<Source>>(data.clone()) else {
        return;
    };
    for passage in passages {
        let seen = sources
            .iter()
            .any(|s| s.study_id == passage.study_id && s.text == passage.text);
        if !seen {
            sources.push(passage);
        }
    }
}
