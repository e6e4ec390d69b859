//! Tool catalog: names, JSON Schemas, argument decoding and dispatch.

use std::collections::HashMap;

use jsonschema::JSONSchema;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::{
    DateRange, MetrikaClient, MetrikaError, ReportQuery, MAX_DIMENSIONS, MAX_LIMIT, MAX_METRICS,
};

const DATE_PATTERN: &str = "^\\d{4}-\\d{2}-\\d{2}$";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    AccountInfo,
    Visits,
    SourcesSummary,
    SourcesSearchPhrases,
    Report,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::AccountInfo,
        Tool::Visits,
        Tool::SourcesSummary,
        Tool::SourcesSearchPhrases,
        Tool::Report,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AccountInfo => "get_account_info",
            Self::Visits => "get_visits",
            Self::SourcesSummary => "sources_summary",
            Self::SourcesSearchPhrases => "sources_search_phrases",
            Self::Report => "get_report",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::AccountInfo => "Get account info",
            Self::Visits => "Get visits",
            Self::SourcesSummary => "Sources Summary",
            Self::SourcesSearchPhrases => "Sources Search Phrases",
            Self::Report => "Custom report",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::AccountInfo => "Get counter (account) info from Yandex Metrika.",
            Self::Visits => {
                "Get visits from Yandex Metrika. If dates are not provided, \
                 returns visits for the last 7 days."
            }
            Self::SourcesSummary => {
                "Get the traffic sources summary report from Yandex Metrika. \
                 If dates are not provided, returns data for the last 7 days."
            }
            Self::SourcesSearchPhrases => {
                "Get the search phrases report from Yandex Metrika. Returns data \
                 about search queries and browser information."
            }
            Self::Report => {
                "Build a custom Yandex Metrika report from explicit metrics \
                 (e.g. ym:s:visits) and optional dimensions (e.g. ym:s:trafficSource)."
            }
        }
    }

    /// Prefix of the success text returned to the agent.
    fn label(self) -> &'static str {
        match self {
            Self::AccountInfo => "Account info",
            Self::Visits => "Visits",
            Self::SourcesSummary => "Sources Summary",
            Self::SourcesSearchPhrases => "Search Phrases",
            Self::Report => "Report",
        }
    }

    fn input_schema(self) -> Value {
        let mut properties = serde_json::Map::new();
        properties.insert(
            "counter_id".to_owned(),
            json!({
                "type": "string",
                "minLength": 1,
                "description": "Yandex Metrika counter ID"
            }),
        );
        if self != Self::AccountInfo {
            properties.insert(
                "date_from".to_owned(),
                json!({
                    "type": "string",
                    "pattern": DATE_PATTERN,
                    "description": "Start date in YYYY-MM-DD format"
                }),
            );
            properties.insert(
                "date_to".to_owned(),
                json!({
                    "type": "string",
                    "pattern": DATE_PATTERN,
                    "description": "End date in YYYY-MM-DD format"
                }),
            );
        }

        let mut required = vec!["counter_id"];
        if self == Self::Report {
            properties.insert(
                "metrics".to_owned(),
                json!({
                    "type": "array",
                    "items": {"type": "string", "minLength": 1},
                    "minItems": 1,
                    "maxItems": MAX_METRICS,
                    "description": "Metric names, e.g. ym:s:visits"
                }),
            );
            properties.insert(
                "dimensions".to_owned(),
                json!({
                    "type": "array",
                    "items": {"type": "string", "minLength": 1},
                    "maxItems": MAX_DIMENSIONS,
                    "description": "Dimension names, e.g. ym:s:trafficSource"
                }),
            );
            properties.insert(
                "sort".to_owned(),
                json!({
                    "type": "string",
                    "description": "Sort expression; prefix with '-' for descending"
                }),
            );
            properties.insert(
                "limit".to_owned(),
                json!({
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_LIMIT,
                    "description": "Maximum number of rows"
                }),
            );
            required.push("metrics");
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Entry for a `tools/list` response.
    pub fn descriptor(self) -> Value {
        json!({
            "name": self.name(),
            "title": self.title(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CounterArgs {
    counter_id: String,
}

#[derive(Debug, Deserialize)]
struct PeriodArgs {
    counter_id: String,
    #[serde(default)]
    date_from: Option<String>,
    #[serde(default)]
    date_to: Option<String>,
}

impl PeriodArgs {
    fn dates(&self) -> crate::Result<DateRange> {
        DateRange::parse(self.date_from.as_deref(), self.date_to.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ReportArgs {
    counter_id: String,
    metrics: Vec<String>,
    #[serde(default)]
    dimensions: Vec<String>,
    #[serde(default)]
    date_from: Option<String>,
    #[serde(default)]
    date_to: Option<String>,
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

impl ReportArgs {
    fn into_query(self) -> crate::Result<ReportQuery> {
        let dates = DateRange::parse(self.date_from.as_deref(), self.date_to.as_deref())?;
        let mut query = ReportQuery::new(self.counter_id, self.metrics)
            .dimensions(self.dimensions)
            .dates(dates);
        query.sort = self.sort;
        query.limit = self.limit;
        Ok(query)
    }
}

fn decode<T: DeserializeOwned>(args: Value) -> crate::Result<T> {
    serde_json::from_value(args)
        .map_err(|err| MetrikaError::Validation(format!("invalid arguments: {err}")))
}

/// Compiled argument validators for every tool.
pub struct ToolCatalog {
    validators: HashMap<Tool, JSONSchema>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        let mut validators = HashMap::new();
        for tool in Tool::ALL {
            let schema = tool.input_schema();
            match JSONSchema::compile(&schema) {
                Ok(compiled) => {
                    validators.insert(tool, compiled);
                }
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(tool = tool.name(), error = %_err, "input schema does not compile");
                }
            }
        }
        Self { validators }
    }

    pub fn list(&self) -> Vec<Value> {
        Tool::ALL.into_iter().map(Tool::descriptor).collect()
    }

    /// Checks `args` against the tool's input schema.
    pub fn validate(&self, tool: Tool, args: &Value) -> crate::Result<()> {
        let Some(schema) = self.validators.get(&tool) else {
            return Err(MetrikaError::Validation(format!(
                "no input schema available for {}",
                tool.name()
            )));
        };
        if let Err(errors) = schema.validate(args) {
            let rendered: Vec<String> = errors
                .take(10)
                .map(|err| {
                    let path = err.instance_path.to_string();
                    if path.is_empty() {
                        err.to_string()
                    } else {
                        format!("{path}: {err}")
                    }
                })
                .collect();
            return Err(MetrikaError::Validation(format!(
                "invalid arguments for {}: {}",
                tool.name(),
                rendered.join("; ")
            )));
        }
        Ok(())
    }

    /// Validates, dispatches to the client and renders the text payload.
    ///
    /// Returns `Ok` with the success text or `Err` with the diagnostic text;
    /// either way the caller wraps it into a tool result.
    pub async fn call(
        &self,
        client: &MetrikaClient,
        tool: Tool,
        args: Value,
    ) -> Result<String, String> {
        let outcome = match self.validate(tool, &args) {
            Ok(()) => dispatch(client, tool, args).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(value) => Ok(format!("{}: {}", tool.label(), value)),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(tool = tool.name(), error = %err, "tool call failed");
                Err(format!("Something went wrong. Error: {err}"))
            }
        }
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch(client: &MetrikaClient, tool: Tool, args: Value) -> crate::Result<Value> {
    match tool {
        Tool::AccountInfo => {
            let args: CounterArgs = decode(args)?;
            client.get_account_info(&args.counter_id).await
        }
        Tool::Visits => {
            let args: PeriodArgs = decode(args)?;
            client.get_visits(&args.counter_id, &args.dates()?).await
        }
        Tool::SourcesSummary => {
            let args: PeriodArgs = decode(args)?;
            client
                .get_sources_summary(&args.counter_id, &args.dates()?)
                .await
        }
        Tool::SourcesSearchPhrases => {
            let args: PeriodArgs = decode(args)?;
            client
                .get_sources_search_phrases(&args.counter_id, &args.dates()?)
                .await
        }
        Tool::Report => {
            let args: ReportArgs = decode(args)?;
            client.get_report(&args.into_query()?).await
        }
    }
}
