//! The answering agent for TrialScout.
//!
//! Runs a **Thought → Action → Observation** loop over a single tool:
//!
//! 1. **Receive** a question
//! 2. **Reason** over the conversation (system prompt + history + observations)
//! 3. **If a tool call**: execute it, append the observation, loop back to 2
//! 4. **If text**: that is the final answer
//!
//! The loop ends with an answer, a failed reasoning call, or an exhausted
//! step budget.

pub mod answering;
pub mod prompt;
pub mod trace;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use answering::{AgentAnswer, AnsweringAgent, DEFAULT_MAX_ITERATIONS, Source};
pub use prompt::DEFAULT_SYSTEM_PROMPT;
pub use trace::{RunTrace, TraceEntry, TraceKind};
