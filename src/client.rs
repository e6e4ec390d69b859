use std::fmt;

use reqwest::{header, Url};
use serde_json::Value as JsonValue;

use crate::{
    endpoints::{Endpoints, DEFAULT_BASE_URL},
    retry::with_retry,
    ClientOptions, DateRange, MetrikaError, Preset, ReportQuery, Result,
};

/// Environment variable holding the OAuth token.
pub const TOKEN_ENV: &str = "YANDEX_API_KEY";

#[derive(Clone)]
/// HTTP client for the Yandex Metrika management and reporting APIs.
pub struct MetrikaClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    authorization: header::HeaderValue,
    options: ClientOptions,
}

impl fmt::Debug for MetrikaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetrikaClient")
            .field("base_url", &self.endpoints.base().as_str())
            .field("authorization", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl MetrikaClient {
    /// Creates a client for the public API host from an OAuth token.
    ///
    /// Fails with [`MetrikaError::Configuration`] when the token is empty or
    /// cannot be sent as a header value. The `OAuth ` scheme prefix is added
    /// if missing.
    pub fn new(token: impl AsRef<str>) -> Result<Self> {
        let token = token.as_ref().trim();
        if token.is_empty() {
            return Err(MetrikaError::Configuration(
                "Yandex Metrika token is required".to_owned(),
            ));
        }
        let mut authorization = header::HeaderValue::from_str(&normalize_oauth_authorization(
            token,
        ))
        .map_err(|_| {
            MetrikaError::Configuration(
                "Yandex Metrika token contains characters not allowed in a header".to_owned(),
            )
        })?;
        authorization.set_sensitive(true);
        Ok(Self {
            http: reqwest::Client::new(),
            endpoints: Endpoints::new(DEFAULT_BASE_URL)?,
            authorization,
            options: ClientOptions::default(),
        })
    }

    /// Creates a client from the `YANDEX_API_KEY` environment variable.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use metrika_http::MetrikaClient;
    ///
    /// let client = MetrikaClient::from_env().expect("YANDEX_API_KEY must be set");
    /// ```
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV).map_err(|_| {
            MetrikaError::Configuration(format!("missing {TOKEN_ENV} environment variable"))
        })?;
        Self::new(token)
    }

    /// Points the client at another API host, e.g. a proxy or a test server.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Result<Self> {
        self.endpoints = Endpoints::new(base_url.as_ref())?;
        Ok(self)
    }

    /// Applies timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Result<Self> {
        opts.validate()?;
        self.options = opts;
        Ok(self)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Counter settings from the management API.
    pub async fn get_account_info(&self, counter_id: &str) -> Result<JsonValue> {
        let url = self.endpoints.account_info(counter_id)?;
        self.execute(url).await
    }

    /// Visit counts over an optional period.
    pub async fn get_visits(&self, counter_id: &str, dates: &DateRange) -> Result<JsonValue> {
        let url = self.endpoints.visits(counter_id, dates)?;
        self.execute(url).await
    }

    /// Traffic sources summary preset.
    pub async fn get_sources_summary(
        &self,
        counter_id: &str,
        dates: &DateRange,
    ) -> Result<JsonValue> {
        self.get_preset(Preset::SourcesSummary, counter_id, dates)
            .await
    }

    /// Search phrases preset.
    pub async fn get_sources_search_phrases(
        &self,
        counter_id: &str,
        dates: &DateRange,
    ) -> Result<JsonValue> {
        self.get_preset(Preset::SourcesSearchPhrases, counter_id, dates)
            .await
    }

    pub async fn get_preset(
        &self,
        preset: Preset,
        counter_id: &str,
        dates: &DateRange,
    ) -> Result<JsonValue> {
        let url = self.endpoints.preset(preset, counter_id, dates)?;
        self.execute(url).await
    }

    /// Custom report over explicit metrics and dimensions.
    pub async fn get_report(&self, query: &ReportQuery) -> Result<JsonValue> {
        let url = self.endpoints.report(query)?;
        self.execute(url).await
    }

    /// Performs one logical GET against `url` and parses the JSON body.
    ///
    /// Timeouts and HTTP 500/502/503 are retried up to
    /// [`ClientOptions::max_attempts`] times in total, sleeping
    /// `retry_delay_ms * n` after the n-th failed attempt. Every other failure
    /// is returned on first occurrence.
    pub async fn execute(&self, url: Url) -> Result<JsonValue> {
        #[cfg(feature = "tracing")]
        tracing::debug!(path = url.path(), "sending request");

        with_retry(&self.options, |_attempt| self.send_once(&url)).await
    }

    async fn send_once(&self, url: &Url) -> Result<JsonValue> {
        let response = self
            .http
            .get(url.clone())
            .header(header::AUTHORIZATION, self.authorization.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|err| self.classify_transport(err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| self.classify_transport(err))?;

        if !status.is_success() {
            return Err(MetrikaError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|err| {
            MetrikaError::MalformedResponse(format!("invalid JSON body: {err}; body: {body}"))
        })
    }

    fn classify_transport(&self, err: reqwest::Error) -> MetrikaError {
        if err.is_timeout() {
            MetrikaError::Timeout {
                timeout_ms: self.options.timeout_ms,
            }
        } else {
            MetrikaError::Transport(err)
        }
    }
}

fn normalize_oauth_authorization(token: &str) -> String {
    let prefix = token.get(..6);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("oauth ")) {
        token.to_owned()
    } else {
        format!("OAuth {token}")
    }
}
