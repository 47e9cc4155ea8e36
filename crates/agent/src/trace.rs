//! Run trace: the inspectable record of a single answering run.
//!
//! Captures the model's thoughts, the tool actions it took and what it
//! observed, alongside every phase transition. A trace is owned by one run
//! and handed back with the answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trialscout_core::AgentPhase;

/// Everything recorded during one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunTrace {
    /// Thought / Action / Observation entries in order.
    pub entries: Vec<TraceEntry>,

    /// Phase transitions in order, starting with the first `Thinking`.
    pub phases: Vec<AgentPhase>,

    /// Reasoning calls made so far.
    pub iterations: u32,

    /// Reasoning calls allowed.
    pub max_iterations: u32,
}

/// A single entry in the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub kind: TraceKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Thought,
    Action,
    Observation,
    Answer,
}

impl RunTrace {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            ..Self::default()
        }
    }

    /// Count one reasoning call. Returns `false` once the budget is spent.
    pub fn tick(&mut self) -> bool {
        if self.iterations >= self.max_iterations {
            return false;
        }
        self.iterations += 1;
        true
    }

    pub fn enter(&mut self, phase: AgentPhase) {
        self.phases.push(phase);
    }

    /// The phase the run is currently in, if it has started.
    pub fn phase(&self) -> Option<AgentPhase> {
        self.phases.last().copied()
    }

    pub fn add_thought(&mut self, thought: &str) {
        self.push(TraceKind::Thought, thought);
    }

    pub fn add_action(&mut self, action: &str) {
        self.push(TraceKind::Action, action);
    }

    pub fn add_observation(&mut self, observation: &str) {
        self.push(TraceKind::Observation, observation);
    }

    pub fn add_answer(&mut self, answer: &str) {
        self.push(TraceKind::Answer, answer);
    }

    fn push(&mut self, kind: TraceKind, content: &str) {
        self.entries.push(TraceEntry {
            kind,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Entries of one kind, in order.
    pub fn of_kind(&self, kind: TraceKind) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Render the trace as text, one line per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let label = match entry.kind {
                TraceKind::Thought => "Thought",
                TraceKind::Action => "Action",
                TraceKind::Observation => "Observation",
                TraceKind::Answer => "Answer",
            };
            out.push_str(label);
            out.push_str(": ");
            out.push_str(&entry.content);
            out.push('\n');
        }
        out
    }
}
