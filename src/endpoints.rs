//! Report URL assembly.
//!
//! Every builder validates its input and fails with
//! [`MetrikaError::Validation`] before any request is made.

use reqwest::Url;

use crate::{
    types::{MAX_DIMENSIONS, MAX_LIMIT, MAX_METRICS},
    DateRange, MetrikaError, Preset, ReportQuery, Result,
};

/// Public Yandex Metrika API host.
pub const DEFAULT_BASE_URL: &str = "https://api-metrika.yandex.net";

const MANAGEMENT_PATH: [&str; 2] = ["management", "v1"];
const REPORTS_PATH: [&str; 3] = ["stat", "v1", "data"];
const VISITS_METRIC: &str = "ym:s:visits";

/// Builds request URLs relative to an API base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// Parses and checks an absolute `http`/`https` base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url.trim()).map_err(|err| {
            MetrikaError::Configuration(format!("invalid base URL '{base_url}': {err}"))
        })?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(MetrikaError::Configuration(format!(
                "base URL must be an absolute http(s) URL, got '{base_url}'"
            )));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `GET management/v1/counter/{id}`
    pub fn account_info(&self, counter_id: &str) -> Result<Url> {
        let counter_id = validate_counter_id(counter_id)?;
        let mut segments: Vec<&str> = MANAGEMENT_PATH.to_vec();
        segments.extend(["counter", counter_id]);
        self.with_path(&segments)
    }

    /// Visits metric over an optional period.
    pub fn visits(&self, counter_id: &str, dates: &DateRange) -> Result<Url> {
        let counter_id = validate_counter_id(counter_id)?;
        let mut url = self.with_path(&REPORTS_PATH)?;
        url.query_pairs_mut()
            .append_pair("ids", counter_id)
            .append_pair("metrics", VISITS_METRIC);
        append_dates(&mut url, dates);
        Ok(url)
    }

    /// Server-defined preset report.
    pub fn preset(&self, preset: Preset, counter_id: &str, dates: &DateRange) -> Result<Url> {
        let counter_id = validate_counter_id(counter_id)?;
        let mut url = self.with_path(&REPORTS_PATH)?;
        url.query_pairs_mut()
            .append_pair("preset", preset.as_str())
            .append_pair("ids", counter_id);
        append_dates(&mut url, dates);
        Ok(url)
    }

    /// Custom report with explicit metrics and dimensions.
    pub fn report(&self, query: &ReportQuery) -> Result<Url> {
        let counter_id = validate_counter_id(&query.counter_id)?;
        let metrics = validate_names("metrics", &query.metrics, 1, MAX_METRICS)?;
        let dimensions = validate_names("dimensions", &query.dimensions, 0, MAX_DIMENSIONS)?;
        if let Some(limit) = query.limit {
            if limit == 0 || limit > MAX_LIMIT {
                return Err(MetrikaError::Validation(format!(
                    "limit must be between 1 and {MAX_LIMIT}, got {limit}"
                )));
            }
        }

        let mut url = self.with_path(&REPORTS_PATH)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("ids", counter_id)
                .append_pair("metrics", &metrics);
            if !dimensions.is_empty() {
                pairs.append_pair("dimensions", &dimensions);
            }
        }
        append_dates(&mut url, &query.dates);
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(sort) = query.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                pairs.append_pair("sort", sort);
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        Ok(url)
    }

    fn with_path(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| {
                MetrikaError::Configuration(format!("base URL '{}' cannot hold a path", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn validate_counter_id(counter_id: &str) -> Result<&str> {
    let trimmed = counter_id.trim();
    if trimmed.is_empty() {
        return Err(MetrikaError::Validation(
            "Counter ID must be a non-empty string".to_owned(),
        ));
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MetrikaError::Validation(format!(
            "Counter ID must be numeric, got '{trimmed}'"
        )));
    }
    Ok(trimmed)
}

fn validate_names(field: &str, names: &[String], min: usize, max: usize) -> Result<String> {
    let names: Vec<&str> = names.iter().map(|name| name.trim()).collect();
    if names.iter().any(|name| name.is_empty()) {
        return Err(MetrikaError::Validation(format!(
            "{field} must not contain empty names"
        )));
    }
    if names.len() < min || names.len() > max {
        return Err(MetrikaError::Validation(format!(
            "{field} must contain between {min} and {max} entries, got {}",
            names.len()
        )));
    }
    Ok(names.join(","))
}

fn append_dates(url: &mut Url, dates: &DateRange) {
    if dates.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    if let Some(from) = dates.from {
        pairs.append_pair("date1", &from.to_string());
    }
    if let Some(to) = dates.to {
        pairs.append_pair("date2", &to.to_string());
    }
}
