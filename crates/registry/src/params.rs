//! Registry search parameters.
//!
//! The registry's study search accepts a fixed set of dotted query keys
//! (`query.cond`, `filter.overallStatus`, ...). [`PARAMETERS`] is that set,
//! with the value kind and the description the extraction model sees.
//! [`SearchParams`] only ever holds keys from it, with values of the
//! declared kind.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};
use trialscout_core::error::ExtractionError;

/// The one required key.
pub const CONDITION: &str = "query.cond";
pub const OVERALL_STATUS: &str = "filter.overallStatus";
pub const PAGE_TOKEN: &str = "pageToken";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    List,
    Bool,
    Integer,
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::List => "array",
            Self::Bool => "boolean",
            Self::Integer => "integer",
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Self::Text => "a string",
            Self::List => "a list of strings",
            Self::Bool => "a boolean",
            Self::Integer => "an integer",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
}

const fn param(name: &'static str, kind: ParamKind, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        description,
    }
}

pub const PARAMETERS: &[ParamSpec] = &[
    param(CONDITION, ParamKind::Text, "Condition or disease the user is looking for."),
    param("query.term", ParamKind::Text, "Other terms for additional filtering or keywords."),
    param("query.locn", ParamKind::Text, "Location terms for finding nearby trials."),
    param("query.titles", ParamKind::Text, "Search by study titles or acronyms."),
    param("query.intr", ParamKind::Text, "Search for intervention or treatment details."),
    param("query.outc", ParamKind::Text, "Search for outcome measures."),
    param("query.spons", ParamKind::Text, "Search by sponsor or collaborator."),
    param("query.lead", ParamKind::Text, "Search by lead sponsor name."),
    param("query.id", ParamKind::Text, "Search by specific study IDs."),
    param("query.patient", ParamKind::Text, "Patient-specific filters for clinical trials."),
    param(
        OVERALL_STATUS,
        ParamKind::List,
        "Recruitment statuses to filter by (e.g., RECRUITING, COMPLETED).",
    ),
    param(
        "filter.geo",
        ParamKind::Text,
        "Geographical filter (e.g., distance(latitude,longitude,radius)). Filter by geo-function. \
         Currently only distance function is supported. Format: distance(latitude,longitude,distance)\
         Examples: distance(39.0035707,-77.1013313,50mi)",
    ),
    param("filter.ids", ParamKind::List, "Filter by specific study IDs."),
    param("filter.advanced", ParamKind::Text, "Advanced filters using Essie expression syntax."),
    param("filter.synonyms", ParamKind::List, "Filters based on area:synonym_id pairs."),
    param("postFilter.overallStatus", ParamKind::List, "Post-filters by recruitment status."),
    param("postFilter.geo", ParamKind::Text, "Post-filters by geographical location."),
    param("postFilter.ids", ParamKind::List, "Post-filters by specific study IDs."),
    param("postFilter.advanced", ParamKind::Text, "Post-filters using Essie expression syntax."),
    param("postFilter.synonyms", ParamKind::List, "Post-filters based on area:synonym_id pairs."),
    param("aggFilters", ParamKind::Text, "Apply aggregation filters."),
    param("geoDecay", ParamKind::Text, "Proximity factor for geographical filters."),
    param("fields", ParamKind::List, "Fields to return in the API response."),
    param("sort", ParamKind::List, "Sorting options for studies."),
    param(
        "countTotal",
        ParamKind::Bool,
        "Whether to include the total count of studies in the response.",
    ),
    param("pageSize", ParamKind::Integer, "Number of studies to return per page."),
    param(PAGE_TOKEN, ParamKind::Text, "Token for fetching the next page of results."),
];

/// Look up a key in [`PARAMETERS`].
pub fn spec(name: &str) -> Option<&'static ParamSpec> {
    PARAMETERS.iter().find(|p| p.name == name)
}

/// JSON Schema for the full parameter set, with `query.cond` required.
pub fn schema() -> Value {
    let mut properties = Map::new();
    for p in PARAMETERS {
        let mut property = json!({
            "type": p.kind.json_type(),
            "description": p.description,
        });
        if p.kind == ParamKind::List {
            property["items"] = json!({ "type": "string" });
        }
        properties.insert(p.name.to_string(), property);
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": [CONDITION],
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    List(Vec<String>),
    Bool(bool),
    Integer(i64),
}

impl ParamValue {
    fn kind(&self) -> ParamKind {
        match self {
            Self::Text(_) => ParamKind::Text,
            Self::List(_) => ParamKind::List,
            Self::Bool(_) => ParamKind::Bool,
            Self::Integer(_) => ParamKind::Integer,
        }
    }

    /// Decode a JSON value as `kind`. `Ok(None)` means "no value": null, an
    /// empty string or an empty list. A lone string is accepted for a list.
    fn from_json(kind: ParamKind, value: &Value) -> Result<Option<Self>, ()> {
        if value.is_null() {
            return Ok(None);
        }
        let decoded = match (kind, value) {
            (ParamKind::Text, Value::String(s)) => Self::Text(s.trim().to_string()),
            (ParamKind::List, Value::String(s)) => Self::List(vec![s.trim().to_string()]),
            (ParamKind::List, Value::Array(items)) => Self::List(
                items
                    .iter()
                    .map(|item| item.as_str().map(|s| s.trim().to_string()).ok_or(()))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            (ParamKind::Bool, Value::Bool(b)) => Self::Bool(*b),
            (ParamKind::Integer, Value::Number(n)) => Self::Integer(n.as_i64().ok_or(())?),
            _ => return Err(()),
        };
        Ok((!decoded.is_empty()).then_some(decoded))
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Bool(_) | Self::Integer(_) => false,
        }
    }
}

/// A validated set of registry search parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SearchParams {
    values: BTreeMap<String, ParamValue>,
}

impl SearchParams {
    /// Parameters searching for one condition.
    pub fn for_condition(condition: impl Into<String>) -> Self {
        let mut params = Self::default();
        params
            .values
            .insert(CONDITION.to_string(), ParamValue::Text(condition.into()));
        params
    }

    /// Validate an extraction call's arguments.
    ///
    /// Every key must be a known parameter with a value of its declared
    /// kind. Null and empty values are dropped. `query.cond` must end up
    /// present and non-empty.
    pub fn from_arguments(arguments: &Map<String, Value>) -> Result<Self, ExtractionError> {
        let mut params = Self::default();
        for (name, value) in arguments {
            let spec = spec(name).ok_or_else(|| ExtractionError::UnknownParameter(name.clone()))?;
            let decoded =
                ParamValue::from_json(spec.kind, value).map_err(|()| ExtractionError::InvalidValue {
                    name: name.clone(),
                    expected: spec.kind.expected(),
                })?;
            if let Some(decoded) = decoded {
                params.values.insert(name.clone(), decoded);
            }
        }

        if params.condition().is_none() {
            return Err(ExtractionError::MissingCondition);
        }
        Ok(params)
    }

    pub fn condition(&self) -> Option<&str> {
        match self.values.get(CONDITION) {
            Some(ParamValue::Text(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Set a known parameter. Returns the value back if the key is unknown
    /// or the value has the wrong kind.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), ParamValue> {
        match spec(name) {
            Some(spec) if spec.kind == value.kind() => {
                self.values.insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(value),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render as URL query pairs, in key order.
    ///
    /// Lists are comma-joined, except status lists which the registry
    /// expects pipe-joined. `pageToken` is never emitted here.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .filter(|(name, _)| name.as_str() != PAGE_TOKEN)
            .map(|(name, value)| {
                let rendered = match value {
                    ParamValue::Text(s) => s.clone(),
                    ParamValue::List(items) => items.join(list_separator(name)),
                    ParamValue::Bool(b) => b.to_string(),
                    ParamValue::Integer(n) => n.to_string(),
                };
                (name.clone(), rendered)
            })
            .collect()
    }
}

fn list_separator(name: &str) -> &'static str {
    if name.ends_with(".overallStatus") { "|" } else { "," }
}
