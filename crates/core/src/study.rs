//! Study records as returned by the ClinicalTrials.gov v2 API.
//!
//! A record is an opaque nested JSON tree. Only a handful of fields are read,
//! and any of them may be absent, `null`, or of an unexpected type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One study from the registry, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudyRecord(pub Value);

impl StudyRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// `protocolSection.identificationModule.nctId`
    pub fn nct_id(&self) -> Option<&str> {
        self.text_at(&["protocolSection", "identificationModule", "nctId"])
    }

    /// `protocolSection.identificationModule.briefTitle`
    pub fn brief_title(&self) -> Option<&str> {
        self.text_at(&["protocolSection", "identificationModule", "briefTitle"])
    }

    /// `protocolSection.descriptionModule.detailedDescription`
    pub fn detailed_description(&self) -> Option<&str> {
        self.text_at(&["protocolSection", "descriptionModule", "detailedDescription"])
    }

    /// `protocolSection.eligibilityModule.eligibilityCriteria`
    pub fn eligibility_criteria(&self) -> Option<&str> {
        self.text_at(&["protocolSection", "eligibilityModule", "eligibilityCriteria"])
    }

    /// `protocolSection.conditionsModule.conditions`, string entries only.
    pub fn conditions(&self) -> Vec<&str> {
        self.at(&["protocolSection", "conditionsModule", "conditions"])
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    fn at(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.0, |node, key| node.get(key))
    }

    fn text_at(&self, path: &[&str]) -> Option<&str> {
        self.at(path).and_then(Value::as_str)
    }
}

impl From<Value> for StudyRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
