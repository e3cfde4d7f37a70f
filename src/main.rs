//! spacegate - schema introspection and ad-hoc SQL over IPROTO.

use std::io::Read;
use std::process::ExitCode;

use anyhow::Context;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::{error, info};

use spacegate::cli::{Cli, Command};
use spacegate::config::{Config, ConnectionTarget};
use spacegate::error::{GatewayError, Result};
use spacegate::gateway::Gateway;
use spacegate::logging;
use spacegate::query::QueryRequest;
use spacegate::response::{ApiResponse, ErrorResponse};
use spacegate::schema::SpaceSummary;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before parsing so clap sees TARANTOOL_PASSWORD from it.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();
    logging::init_stderr_logging(logging::DEFAULT_FILTER);

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the command and prints its envelope. Returns whether it succeeded.
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let op = cli.command.operation();

    let rendered = match execute(cli).await {
        Ok(data) => render(&ApiResponse::success(op, data), cli.pretty)?,
        Err(e) => {
            let rendered = render(&ErrorResponse::from_error(op, &e), cli.pretty)?;
            println!("{rendered}");
            return Ok(false);
        }
    };

    println!("{rendered}");
    Ok(true)
}

async fn execute(cli: &Cli) -> Result<JsonValue> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let target = cli.resolve_target(&config)?;
    info!("Target: {}", target.display_string());

    let gateway = Gateway::from_settings(&config.gateway);

    match &cli.command {
        Command::Test => {
            gateway.test_connection(&target).await?;
            Ok(target_summary(&target))
        }
        Command::Schema => {
            let spaces = gateway.get_schema(&target).await?;
            let summaries: Vec<SpaceSummary> = spaces.iter().map(SpaceSummary::from).collect();
            to_json(&summaries)
        }
        Command::Query { sql } => {
            let request = if sql == "-" {
                read_request_from_stdin()?
            } else {
                QueryRequest::new(sql.as_str())
            };
            let result = gateway.query(&target, &request.sql).await?;
            to_json(&result)
        }
    }
}

fn target_summary(target: &ConnectionTarget) -> JsonValue {
    json!({
        "host": target.host,
        "port": target.port,
        "username": target.username,
    })
}

fn read_request_from_stdin() -> Result<QueryRequest> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| GatewayError::config(format!("Failed to read query from stdin: {e}")))?;
    serde_json::from_str(&input)
        .map_err(|e| GatewayError::config(format!("Invalid query document: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> Result<JsonValue> {
    serde_json::to_value(value).map_err(|e| GatewayError::format(e.to_string()))
}

fn render<T: Serialize>(envelope: &T, pretty: bool) -> anyhow::Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(envelope)
    } else {
        serde_json::to_string(envelope)
    };
    rendered.context("Failed to serialize response")
}
