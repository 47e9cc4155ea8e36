//! Tool implementations for TrialScout.
//!
//! The answering agent gets exactly one tool, [`SearchStudiesTool`], which
//! performs semantic search over the study index.

pub mod search_studies;

use trialscout_core::tool::ToolRegistry;
use trialscout_index::IndexHandle;

pub use search_studies::{Passage, SearchStudiesTool};

/// Create the agent's tool registry: study search over `index` returning
/// `top_k` passages per call.
pub fn default_registry(index: IndexHandle, top_k: usize) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SearchStudiesTool::new(index, top_k)));
    registry
}
