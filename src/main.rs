use anyhow::{Context, Result};
use clap::Parser;
use metrika_http::{mcp::McpServer, ClientOptions, MetrikaClient, DEFAULT_BASE_URL, TOKEN_ENV};
use tracing_subscriber::EnvFilter;

/// metrika-mcp - Yandex Metrika tools for MCP agents
///
/// Speaks JSON-RPC on stdin/stdout. Logs go to stderr and are filtered with
/// RUST_LOG (default: info).
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// OAuth token for the Yandex Metrika API
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    token: String,

    /// API base URL
    #[arg(long, env = "METRIKA_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-attempt request timeout in milliseconds
    #[arg(long, env = "METRIKA_TIMEOUT_MS", default_value_t = ClientOptions::default().timeout_ms)]
    timeout_ms: u64,

    /// Total attempts per request, including the first
    #[arg(long, env = "METRIKA_MAX_ATTEMPTS", default_value_t = ClientOptions::default().max_attempts)]
    max_attempts: u32,

    /// Base delay between attempts in milliseconds (grows linearly)
    #[arg(long, env = "METRIKA_RETRY_DELAY_MS", default_value_t = ClientOptions::default().retry_delay_ms)]
    retry_delay_ms: u64,
}

impl Cli {
    fn options(&self) -> ClientOptions {
        ClientOptions {
            timeout_ms: self.timeout_ms,
            max_attempts: self.max_attempts,
            retry_delay_ms: self.retry_delay_ms,
        }
    }

    fn client(&self) -> Result<MetrikaClient> {
        let client = MetrikaClient::new(&self.token)
            .and_then(|client| client.with_base_url(&self.base_url))
            .and_then(|client| client.with_options(self.options()))
            .context("invalid client configuration")?;
        Ok(client)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let client = cli.client()?;
    tracing::info!(base_url = %cli.base_url, "client configured");

    McpServer::new(client)
        .run_stdio()
        .await
        .context("stdio transport failed")?;
    Ok(())
}
