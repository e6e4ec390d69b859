use chrono::NaiveDate;

use crate::{MetrikaError, Result};

/// Most metrics a single report request may name.
pub const MAX_METRICS: usize = 20;
/// Most dimensions a single report request may name.
pub const MAX_DIMENSIONS: usize = 10;
/// Largest row limit accepted by the reports API.
pub const MAX_LIMIT: u32 = 100_000;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Optional reporting period.
///
/// When a bound is absent the API applies its own default (the last seven
/// days).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Parses optional `YYYY-MM-DD` strings into a range.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let range = Self {
            from: from.map(|value| parse_date("dateFrom", value)).transpose()?,
            to: to.map(|value| parse_date("dateTo", value)).transpose()?,
        };
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(MetrikaError::Validation(format!(
                    "dateFrom ({from}) must not be after dateTo ({to})"
                )));
            }
        }
        Ok(range)
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    let invalid = || MetrikaError::Validation(format!("{field} must be in YYYY-MM-DD format"));
    // chrono accepts unpadded fields; the API does not.
    let bytes = value.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid())
}

/// Server-defined report bundles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    SourcesSummary,
    SourcesSearchPhrases,
}

impl Preset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourcesSummary => "sources_summary",
            Self::SourcesSearchPhrases => "sources_search_phrases",
        }
    }
}

/// Custom report over explicit metrics and dimensions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportQuery {
    pub counter_id: String,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    pub dates: DateRange,
    /// Sort expression such as `-ym:s:visits`.
    pub sort: Option<String>,
    pub limit: Option<u32>,
}

impl ReportQuery {
    pub fn new<I, S>(counter_id: impl Into<String>, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            counter_id: counter_id.into(),
            metrics: metrics.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn dates(mut self, dates: DateRange) -> Self {
        self.dates = dates;
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{DateRange, Preset, ReportQuery};
    use crate::MetrikaError;

    #[test]
    fn parses_iso_dates() {
        let range = DateRange::parse(Some("2024-01-01"), Some("2024-01-31")).expect("valid");
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(range.to, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert!(!range.is_empty());
        assert!(DateRange::parse(None, None).expect("empty").is_empty());
    }

    #[test]
    fn rejects_badly_shaped_dates() {
        for bad in ["2024-1-01", "01-01-2024", "2024/01/01", "yesterday", "", "2024-02-30"] {
            let err = DateRange::parse(Some(bad), None).expect_err(bad);
            assert!(
                matches!(&err, MetrikaError::Validation(msg) if msg.contains("dateFrom")),
                "{bad}: {err}"
            );
        }
        assert!(DateRange::parse(None, Some("2024-13-01")).is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        let err = DateRange::parse(Some("2024-02-01"), Some("2024-01-01")).expect_err("inverted");
        assert!(matches!(err, MetrikaError::Validation(_)));
    }

    #[test]
    fn preset_names() {
        assert_eq!(Preset::SourcesSummary.as_str(), "sources_summary");
        assert_eq!(
            Preset::SourcesSearchPhrases.as_str(),
            "sources_search_phrases"
        );
    }

    #[test]
    fn report_query_builder() {
        let query = ReportQuery::new("123", ["ym:s:visits", "ym:s:users"])
            .dimensions(["ym:s:date"])
            .sort("-ym:s:visits")
            .limit(50);
        assert_eq!(query.metrics.len(), 2);
        assert_eq!(query.dimensions, vec!["ym:s:date".to_owned()]);
        assert_eq!(query.sort.as_deref(), Some("-ym:s:visits"));
        assert_eq!(query.limit, Some(50));
    }
}
