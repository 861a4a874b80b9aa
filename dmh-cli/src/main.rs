// dmh-cli/src/main.rs
// ============================================================================
// Module: DMH CLI Entry Point
// Description: Command dispatcher for serving and operating DMH over HTTP.
// Purpose: Provide the server entry point and an operator client.
// Dependencies: clap, dmh-api, reqwest, serde_json
// ============================================================================

//! ## Overview
//! `dmh serve` runs the configured components; the remaining commands are a
//! thin client over the issuer HTTP API for heartbeats and action
//! management. Client commands print the response body and exit non-zero on
//! any non-success status, so the binary scripts cleanly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use dmh_api::Config;
use thiserror::Error;
use tracing::error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default issuer endpoint for client commands.
const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";
/// Client request timeout.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "dmh", version, about = "Dead-man's hand issuer and keeper")]
struct Cli {
    /// Issuer HTTP endpoint used by client commands.
    #[arg(long, short = 's', global = true, default_value = DEFAULT_SERVER)]
    server: String,
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the configured components.
    Serve(ServeCommand),
    /// Update last seen information.
    Alive,
    /// Action operations.
    Action {
        /// Selected action subcommand.
        #[command(subcommand)]
        command: ActionCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Config file path (defaults to dmh.toml or the DMH_CONFIG_FILE env).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Action subcommands.
#[derive(Subcommand, Debug)]
enum ActionCommand {
    /// List all actions.
    #[command(alias = "ls")]
    List,
    /// Show a single action.
    Get {
        /// Action UUID.
        uuid: String,
    },
    /// Delete an action.
    Delete {
        /// Action UUID.
        uuid: String,
    },
    /// Add a new action.
    Add(AddCommand),
    /// Run an action once without storing it.
    Test(TestCommand),
}

/// Arguments for adding an action.
#[derive(Args, Debug)]
struct AddCommand {
    /// Action kind.
    #[arg(long, short = 'k')]
    kind: String,
    /// Action data (JSON formatted).
    #[arg(long, short = 'd')]
    data: String,
    /// Action comment (stored unencrypted).
    #[arg(long, default_value = "")]
    comment: String,
    /// Process the action after this many units since last seen.
    #[arg(long, short = 'p')]
    process_after: i64,
    /// Re-run the action after this many units since last run. Values
    /// greater than zero make the action run forever; use with caution.
    #[arg(long, short = 'i', default_value_t = 0)]
    min_interval: i64,
}

/// Arguments for test-running an action.
#[derive(Args, Debug)]
struct TestCommand {
    /// Action kind.
    #[arg(long, short = 'k')]
    kind: String,
    /// Action data (JSON formatted).
    #[arg(long, short = 'd')]
    data: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Client command errors.
#[derive(Debug, Error)]
enum ClientError {
    /// Request failed in transit.
    #[error("request failed: {0}")]
    Transport(String),
    /// Server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),
    /// Response body failed to decode.
    #[error("response decode failed: {0}")]
    Decode(String),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(serve) => match Config::load(serve.config.as_deref()) {
            Ok(config) => {
                if let Err(err) = dmh_api::server::run(&config) {
                    error!(error = %err, "server failed");
                    return ExitCode::from(1);
                }
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!(error = %err, "configuration is invalid");
                ExitCode::from(2)
            }
        },
        Commands::Alive => run_client(|client| client.alive(&cli.server)),
        Commands::Action {
            command,
        } => match command {
            ActionCommand::List => run_client(|client| client.list(&cli.server)),
            ActionCommand::Get {
                uuid,
            } => run_client(move |client| client.get(&cli.server, &uuid)),
            ActionCommand::Delete {
                uuid,
            } => run_client(move |client| client.delete(&cli.server, &uuid)),
            ActionCommand::Add(add) => run_client(move |client| client.add(&cli.server, &add)),
            ActionCommand::Test(test) => {
                run_client(move |client| client.test(&cli.server, &test))
            }
        },
    }
}

fn run_client(call: impl FnOnce(&ApiClient) -> Result<(), ClientError>) -> ExitCode {
    let client = match ApiClient::new() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };
    match call(&client) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}

// ============================================================================
// SECTION: API Client
// ============================================================================

/// Blocking client over the issuer HTTP API.
struct ApiClient {
    /// HTTP client with bounded timeout.
    http: reqwest::blocking::Client,
}

impl ApiClient {
    fn new() -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(Self {
            http,
        })
    }

    fn alive(&self, server: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{server}/api/alive"))
            .send()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        expect_success(response.status().as_u16())?;
        println!("alive updated");
        Ok(())
    }

    fn list(&self, server: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .get(format!("{server}/api/action/store"))
            .send()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        expect_success(response.status().as_u16())?;
        let actions: serde_json::Value =
            response.json().map_err(|err| ClientError::Decode(err.to_string()))?;
        print_json(&actions)
    }

    fn get(&self, server: &str, uuid: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .get(format!("{server}/api/action/store/{uuid}"))
            .send()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        expect_success(response.status().as_u16())?;
        let action: serde_json::Value =
            response.json().map_err(|err| ClientError::Decode(err.to_string()))?;
        print_json(&action)
    }

    fn delete(&self, server: &str, uuid: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(format!("{server}/api/action/store/{uuid}"))
            .send()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        expect_success(response.status().as_u16())?;
        println!("action {uuid} deleted");
        Ok(())
    }

    fn add(&self, server: &str, add: &AddCommand) -> Result<(), ClientError> {
        let body = serde_json::json!({
            "kind": add.kind,
            "data": add.data,
            "comment": add.comment,
            "process_after": add.process_after,
            "min_interval": add.min_interval,
        });
        let response = self
            .http
            .post(format!("{server}/api/action/store"))
            .json(&body)
            .send()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        expect_success(response.status().as_u16())?;
        println!("action added");
        Ok(())
    }

    fn test(&self, server: &str, test: &TestCommand) -> Result<(), ClientError> {
        let body = serde_json::json!({
            "kind": test.kind,
            "data": test.data,
            "process_after": 1,
        });
        let response = self
            .http
            .post(format!("{server}/api/action/test"))
            .json(&body)
            .send()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        expect_success(response.status().as_u16())?;
        println!("action test succeeded");
        Ok(())
    }
}

fn expect_success(status: u16) -> Result<(), ClientError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(ClientError::Status(status))
}

fn print_json(value: &serde_json::Value) -> Result<(), ClientError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| ClientError::Decode(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_command_parses_flags() {
        let cli = Cli::parse_from([
            "dmh",
            "action",
            "add",
            "--kind",
            "json_post",
            "--data",
            "{}",
            "--process-after",
            "12",
        ]);
        match cli.command {
            Commands::Action {
                command: ActionCommand::Add(add),
            } => {
                assert_eq!(add.kind, "json_post");
                assert_eq!(add.process_after, 12);
                assert_eq!(add.min_interval, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn server_flag_is_global() {
        let cli = Cli::parse_from(["dmh", "action", "list", "--server", "http://issuer:9999"]);
        assert_eq!(cli.server, "http://issuer:9999");
    }

    #[test]
    fn success_statuses_pass() {
        expect_success(200).unwrap();
        expect_success(201).unwrap();
        assert!(expect_success(404).is_err());
        assert!(expect_success(500).is_err());
    }
}
