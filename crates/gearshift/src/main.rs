// SPDX-FileCopyrightText: 2026 Gearshift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gearshift command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::info;

use gearshift::shutdown::install_signal_handler;
use gearshift::Gearshift;
use gearshift_config::GearshiftConfig;
use gearshift_core::{CredentialState, GearshiftError, ModelId, RouteRequest, UserState};

/// Gearshift - tier, quota and cost aware model routing.
#[derive(Parser, Debug)]
#[command(name = "gearshift", version, about, long_about = None)]
struct Cli {
    /// Configuration file to load instead of the standard lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Pick the model for one request.
    Route {
        /// Model the caller asked for.
        #[arg(long)]
        model: String,
        /// Code the request operates on.
        #[arg(long)]
        snippet: Option<String>,
        /// Natural-language instruction.
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Show tier, quota and credential state.
    Status,
    /// Print a validated access token.
    Token {
        /// Rotate before printing.
        #[arg(long)]
        rotate: bool,
    },
    /// Classify text without routing it.
    Classify { text: String },
    /// Validate and print the effective configuration.
    Config,
    /// Keep the credential refreshed until interrupted.
    Watch,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    user: UserState,
    cached_at: Option<chrono::DateTime<chrono::Utc>>,
    credential_state: String,
    credential_source: Option<String>,
    credential_expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
struct ClassifyReport {
    category: String,
    token_count: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => gearshift_config::load_and_validate_path(path),
        None => gearshift_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            gearshift_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging.level);

    match run(cli.command, cli.json, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gearshift: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Option<Commands>,
    json: bool,
    config: GearshiftConfig,
) -> Result<(), GearshiftError> {
    let Some(command) = command else {
        println!("gearshift: use --help for available commands");
        return Ok(());
    };

    if let Commands::Config = command {
        return print_config(&config, json);
    }

    let gearshift = Gearshift::from_config(&config)?;
    match command {
        Commands::Route {
            model,
            snippet,
            prompt,
        } => {
            let mut request = RouteRequest::new(model);
            request.code_snippet = snippet;
            request.prompt = prompt;
            let decision = gearshift.decide(&request).await;
            if json {
                print_json(&decision)?;
            } else {
                println!("{}", decision.selected_model);
                eprintln!("{} ({}): {}", decision.outcome, decision.category, decision.reason);
            }
        }
        Commands::Status => {
            let user = gearshift.get_user_state().await;
            let active = gearshift.credentials().active_credential().await;
            let report = StatusReport {
                user,
                cached_at: gearshift.user_state_cache().cached_at(),
                credential_state: gearshift.credential_state().to_string(),
                credential_source: active.as_ref().map(|c| c.source.clone()),
                credential_expires_at: active.as_ref().map(|c| c.expires_at),
            };
            if json {
                print_json(&report)?;
            } else {
                print_status(&report);
            }
        }
        Commands::Token { rotate } => {
            let token = if rotate {
                gearshift.rotate_token().await?
            } else {
                gearshift.get_token().await?
            };
            println!("{}", token.expose_secret());
        }
        Commands::Classify { text } => {
            let result = gearshift.classify(&text);
            let report = ClassifyReport {
                category: result.category.to_string(),
                token_count: result.token_count,
            };
            if json {
                print_json(&report)?;
            } else {
                println!("{} ({} tokens)", report.category, report.token_count);
            }
        }
        Commands::Watch => watch(&gearshift).await,
        Commands::Config => {}
    }
    Ok(())
}

async fn watch(gearshift: &Gearshift) {
    let cancel = install_signal_handler();
    let mut states = gearshift.subscribe_credentials();
    gearshift.start();

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state: CredentialState = *states.borrow_and_update();
                info!(state = %state, "credential state changed");
            }
            _ = cancel.cancelled() => break,
        }
    }
    gearshift.shutdown().await;
}

fn print_config(config: &GearshiftConfig, json: bool) -> Result<(), GearshiftError> {
    if json {
        return print_json(config);
    }
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| GearshiftError::Internal(format!("failed to render config: {e}")))?;
    print!("{rendered}");
    Ok(())
}

fn print_status(report: &StatusReport) {
    println!("privileged:      {}", report.user.is_privileged);
    println!("fast quota left: {}", report.user.fast_quota_remaining);
    println!("total requests:  {}", report.user.total_requests);
    let models: Vec<&str> = report
        .user
        .accessible_models
        .iter()
        .map(ModelId::as_str)
        .collect();
    println!("models:          {}", models.join(", "));
    match report.cached_at {
        Some(at) => println!("fetched at:      {}", at.to_rfc3339()),
        None => println!("fetched at:      (not cached, fail-open)"),
    }
    println!("credential:      {}", report.credential_state);
    if let (Some(source), Some(expires)) = (&report.credential_source, report.credential_expires_at)
    {
        println!("  source:        {source}");
        println!("  expires at:    {}", expires.to_rfc3339());
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), GearshiftError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| GearshiftError::Internal(format!("failed to render JSON: {e}")))?;
    println!("{rendered}");
    Ok(())
}

/// `RUST_LOG` wins; otherwise `gearshift=<level>,warn`. Logs go to stderr so
/// command output stays pipeable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gearshift={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn route_arguments_parse() {
        let cli = Cli::try_parse_from([
            "gearshift",
            "--json",
            "route",
            "--model",
            "claude-3.7-sonnet",
            "--prompt",
            "rename x",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Some(Commands::Route { model, prompt, snippet }) => {
                assert_eq!(model, "claude-3.7-sonnet");
                assert_eq!(prompt.as_deref(), Some("rename x"));
                assert!(snippet.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn default_config_renders_as_toml() {
        let config = gearshift_config::load_and_validate_str("").unwrap();
        assert!(print_config(&config, false).is_ok());
        assert!(print_config(&config, true).is_ok());
    }
}
