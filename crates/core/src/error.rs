//! Error types for the TrialScout domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all TrialScout operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Registry boundary ---
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Retrieval ---
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Index build error: {0}")]
    Build(#[from] BuildError),

    #[error("Index query error: {0}")]
    Query(#[from] QueryError),

    // --- Agent ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the reasoning and embedding services.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether a caller-side retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_)
        ) || matches!(self, Self::ApiError { status_code, .. } if *status_code >= 500)
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failures turning a free-text patient description into registry parameters.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Patient description is empty")]
    EmptyInput,

    #[error("Parameter extraction call failed: {0}")]
    Reasoning(#[from] ProviderError),

    #[error("Model returned no parameter extraction call")]
    NoParameters,

    #[error("Extracted arguments are not a JSON object: {0}")]
    MalformedArguments(String),

    #[error("Unknown registry parameter: {0}")]
    UnknownParameter(String),

    #[error("Parameter '{name}' must be {expected}")]
    InvalidValue { name: String, expected: &'static str },

    #[error("Required parameter 'query.cond' is missing or empty")]
    MissingCondition,
}

/// Failures talking to the clinical-trials registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry request failed with status code {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Registry network error: {0}")]
    Network(String),

    #[error("Registry request timed out: {0}")]
    Timeout(String),

    #[error("Registry returned an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("Registry repeated page token '{0}'")]
    PaginationLoop(String),
}

/// Failures reading the persisted study input.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Study input is not a sequence of records")]
    NotASequence,

    #[error("Study input element {index} is not a record")]
    NotARecord { index: usize },

    #[error("Failed to read study input at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse study input at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Failures building the vector index. Any of these aborts startup.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Index has already been built")]
    AlreadyBuilt,

    #[error("Invalid index settings: {0}")]
    InvalidSettings(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Chunk {chunk} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        chunk: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("Index queried before it was built")]
    NotBuilt,

    #[error("k must be at least 1")]
    InvalidK,

    #[error("Query embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Query embedding has dimension {actual}, index uses {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Terminal failures of an answering-agent run.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Step budget exceeded after {max_iterations} iterations")]
    StepBudgetExceeded { max_iterations: u32 },

    #[error("Reasoning call failed: {0}")]
    Reasoning(#[from] ProviderError),
}
