//! `metrika-http` is an async HTTP client for the Yandex Metrika API.
//!
//! The crate wraps the management and reporting endpoints with typed methods:
//! - [`MetrikaClient::get_account_info`]
//! - [`MetrikaClient::get_visits`]
//! - [`MetrikaClient::get_sources_summary`] / [`MetrikaClient::get_sources_search_phrases`]
//! - [`MetrikaClient::get_report`]
//!
//! All of them go through [`MetrikaClient::execute`], which enforces a
//! per-attempt deadline and retries transient failures with linear backoff.
//! The [`mcp`] module exposes the same calls as Model Context Protocol tools
//! over stdio.

mod client;
mod endpoints;
mod error;
mod options;
mod retry;
mod types;

pub mod mcp;

pub use client::{MetrikaClient, TOKEN_ENV};
pub use endpoints::{Endpoints, DEFAULT_BASE_URL};
pub use error::MetrikaError;
pub use options::ClientOptions;
pub use types::{DateRange, Preset, ReportQuery, MAX_DIMENSIONS, MAX_LIMIT, MAX_METRICS};

pub type Result<T> = std::result::Result<T, MetrikaError>;
