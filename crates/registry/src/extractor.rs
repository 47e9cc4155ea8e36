//! Structured-parameter extraction.
//!
//! Turns a free-text patient description into [`SearchParams`] with a single
//! forced function call. The model fills in the registry's search keys; the
//! result is validated against the fixed parameter table before use.

use std::sync::Arc;

use tracing::{debug, info};
use trialscout_config::AppConfig;
use trialscout_core::error::ExtractionError;
use trialscout_core::message::Message;
use trialscout_core::provider::{Provider, ProviderRequest, ToolDefinition};

use crate::params::{self, PAGE_TOKEN, SearchParams};

pub const FUNCTION_NAME: &str = "extract_clinical_trial_params";

pub const FUNCTION_DESCRIPTION: &str = "Extract all relevant parameters for the clinical trial API \
call from user input. The field name in the JSON object should match the API parameter name. \n \
Do not have a field named \"patient\" in the JSON object, this should be called query.patient \n \
For filter.geo, if given a general location name, convert the value to this format: \
distance(latitude,longitude,radius). Examples: distance(39.0035707,-77.1013313,50mi)";

pub struct ParameterExtractor {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ParameterExtractor {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Uses `[extractor] model`, falling back to the main model.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>) -> Self {
        Self::new(provider, config.extractor_model())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The function offered to (and forced on) the model.
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: FUNCTION_NAME.into(),
            description: FUNCTION_DESCRIPTION.into(),
            parameters: params::schema(),
        }
    }

    /// Extract registry search parameters from `description`.
    ///
    /// `pageToken` is discarded; paging is the registry client's job.
    pub async fn extract(&self, description: &str) -> Result<SearchParams, ExtractionError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }

        let mut request = ProviderRequest::new(&self.model, vec![Message::user(description)]);
        request.tools = vec![Self::definition()];
        request.tool_choice = Some(FUNCTION_NAME.into());

        let response = self.provider.complete(request).await?;

        let call = response
            .message
            .tool_calls
            .iter()
            .find(|c| c.name == FUNCTION_NAME)
            .ok_or(ExtractionError::NoParameters)?;

        let arguments: serde_json::Value = serde_json::from_str(&call.arguments)
            .map_err(|e| ExtractionError::MalformedArguments(e.to_string()))?;
        let mut arguments = match arguments {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(ExtractionError::MalformedArguments(format!(
                    "expected an object, got {other}"
                )));
            }
        };

        if arguments.remove(PAGE_TOKEN).is_some() {
            debug!("Dropping extracted pageToken");
        }

        let params = SearchParams::from_arguments(&arguments)?;
        info!(
            model = %self.model,
            condition = params.condition().unwrap_or_default(),
            parameters = params.len(),
            "Extracted registry parameters"
        );
        Ok(params)
    }
}
