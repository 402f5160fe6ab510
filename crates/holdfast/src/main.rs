// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Holdfast - inspect and drain a durable offline operation queue.
//!
//! This is the binary entry point.

mod commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use holdfast_core::{OperationKind, Priority};

/// Holdfast - durable offline operation queue.
#[derive(Parser, Debug)]
#[command(name = "holdfast", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize the persisted queue.
    Status {
        /// Output JSON for scripting.
        #[arg(long)]
        json: bool,
    },
    /// List queued operations, optionally for one session.
    List {
        subject: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Queue an operation for later replay.
    Enqueue {
        /// Operation kind, e.g. send-message.
        #[arg(value_parser = commands::parse_kind)]
        kind: OperationKind,
        /// Session the operation applies to.
        subject: String,
        /// JSON payload.
        #[arg(long, default_value = "{}", value_parser = commands::parse_payload)]
        payload: serde_json::Value,
        #[arg(long, default_value = "medium", value_parser = commands::parse_priority)]
        priority: Priority,
        /// Id of an operation that must complete first. Repeatable.
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
    },
    /// Replay queued operations against the API until settled or timed out.
    Drain {
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
        #[arg(long)]
        json: bool,
    },
    /// Remove terminal operations older than the retention window.
    Cleanup,
    /// Remove every operation for a session.
    Clear { subject: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => holdfast_config::load_and_validate_path(path),
        None => holdfast_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            holdfast_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    commands::init_tracing(&config.logging.level);

    let result = match cli.command {
        Commands::Status { json } => commands::status::run_status(&config, json, cli.plain).await,
        Commands::List { subject, json } => {
            commands::list::run_list(&config, subject, json, cli.plain).await
        }
        Commands::Enqueue {
            kind,
            subject,
            payload,
            priority,
            depends_on,
        } => {
            let request = holdfast_core::NewOperation::new(kind, subject, payload)
                .priority(priority)
                .depends_on(depends_on.into_iter().map(holdfast_core::OperationId));
            commands::enqueue::run_enqueue(&config, request).await
        }
        Commands::Drain { timeout_secs, json } => {
            commands::drain::run_drain(&config, Duration::from_secs(timeout_secs), json, cli.plain)
                .await
        }
        Commands::Cleanup => commands::maintenance::run_cleanup(&config).await,
        Commands::Clear { subject } => commands::maintenance::run_clear(&config, subject).await,
    };

    if let Err(e) = result {
        eprintln!("holdfast: {e}");
        std::process::exit(1);
    }
}
