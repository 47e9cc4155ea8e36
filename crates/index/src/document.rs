//! Document Builder: one plain-text document per study record.
//!
//! The text layout is fixed so that every chunk carries recognisable field
//! labels:
//!
//! ```text
//! Study ID: <id>
//! Title: <title>
//! Description: <description>
//! Inclusion Criteria: <eligibility>
//! Conditions: <c1>, <c2>, ...
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trialscout_core::error::DocumentError;
use trialscout_core::StudyRecord;

pub const UNKNOWN_ID: &str = "Unknown ID";
pub const NO_TITLE: &str = "No Title Provided";
pub const NO_DESCRIPTION: &str = "No Description Provided";
pub const NO_ELIGIBILITY: &str = "No Eligibility Criteria Provided";

/// The text rendering of one study record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Position of the source record in the input sequence
    pub index: usize,
    pub study_id: String,
    pub text: String,
}

/// Validate the persisted input: a JSON array whose elements are objects.
pub fn parse_records(value: Value) -> Result<Vec<StudyRecord>, DocumentError> {
    let Value::Array(items) = value else {
        return Err(DocumentError::NotASequence);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if item.is_object() {
                Ok(StudyRecord::new(item))
            } else {
                Err(DocumentError::NotARecord { index })
            }
        })
        .collect()
}

/// Read and validate the persisted study records at `path`.
pub fn load_records(path: &Path) -> Result<Vec<StudyRecord>, DocumentError> {
    let content = std::fs::read_to_string(path).map_err(|e| DocumentError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let value: Value = serde_json::from_str(&content).map_err(|e| DocumentError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    parse_records(value)
}

/// Render one document per record, in input order. Never fails.
pub fn build_documents(records: &[StudyRecord]) -> Vec<Document> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| build_document(index, record))
        .collect()
}

fn build_document(index: usize, record: &StudyRecord) -> Document {
    let study_id = record.nct_id().unwrap_or(UNKNOWN_ID).to_string();
    let text = [
        format!("Study ID: {study_id}"),
        format!("Title: {}", record.brief_title().unwrap_or(NO_TITLE)),
        format!(
            "Description: {}",
            record.detailed_description().unwrap_or(NO_DESCRIPTION)
        ),
        format!(
            "Inclusion Criteria: {}",
            record.eligibility_criteria().unwrap_or(NO_ELIGIBILITY)
        ),
        format!("Conditions: {}", record.conditions().join(", ")),
    ]
    .join("\n");

    Document {
        index,
        study_id,
        text,
    }
}
