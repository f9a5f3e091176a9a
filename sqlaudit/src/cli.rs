//! `sqlaudit` subcommands.
//!
//! Results are written to stdout as JSON (or raw text for DDL and protected tokens); diagnostics go
//! through tracing to stderr. `review`, and `datasources ddl --review`, succeed only when the score
//! reaches the configured `pass_threshold`.

use crate::api::models::audit::{AuditResult, Privilege, StatementClass};
use crate::api::models::pagination::DEFAULT_PAGE_SIZE;
use crate::client::Client;
use crate::config::Config;
use crate::crypto::CredentialProtector;
use crate::errors::Error;
use crate::types::DatasourceId;
use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Submit SQL text for review
    Review(ReviewArgs),

    /// Browse the datasource registry
    #[command(subcommand)]
    Datasources(DatasourceCommand),

    /// Protect a secret read from stdin with the backend's public key
    Protect,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReviewArgs {
    /// Review as DML instead of DDL
    #[arg(long)]
    pub dml: bool,

    /// Role to review as; without one only DDL can be reviewed, through the generic entry point
    #[arg(long, value_enum)]
    pub role: Option<RoleArg>,

    /// File holding the SQL text, or `-` for stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DatasourceCommand {
    /// List datasources page by page
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    /// Show one datasource
    Show { id: DatasourceId },
    /// List the databases of a datasource
    Databases { id: DatasourceId },
    /// List the tables of a database
    Tables { id: DatasourceId, database: String },
    /// Print the DDL of a table, optionally reviewing it
    Ddl {
        id: DatasourceId,
        database: String,
        table: String,
        /// Submit the DDL for review instead of printing it
        #[arg(long)]
        review: bool,
        #[arg(long, value_enum, requires = "review")]
        role: Option<RoleArg>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    Admin,
    Ordinary,
}

impl From<RoleArg> for Privilege {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Privilege::Administrator,
            RoleArg::Ordinary => Privilege::Ordinary,
        }
    }
}

/// What a command printed and whether it counts as a success.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub output: String,
    pub success: bool,
}

impl Outcome {
    fn ok(output: String) -> Self {
        Self { output, success: true }
    }

    fn json<T: Serialize>(value: &T) -> anyhow::Result<Self> {
        Ok(Self::ok(serde_json::to_string_pretty(value)?))
    }
}

/// Keep the targeted message on top while preserving the typed error underneath.
fn describe(err: Error) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

/// Run a command against the configured backend and print its output.
pub async fn run(command: Command, config: &Config) -> anyhow::Result<ExitCode> {
    let client = Client::from_config(config).map_err(describe)?;
    let outcome = execute(command, config, &client, &mut std::io::stdin()).await?;

    println!("{}", outcome.output);
    Ok(if outcome.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Run a command, reading any piped input from `stdin`.
pub async fn execute(command: Command, config: &Config, client: &Client, stdin: &mut (dyn Read + Send)) -> anyhow::Result<Outcome> {
    match command {
        Command::Review(args) => {
            let sql = read_input(&args.input, stdin)?;
            let class = if args.dml { StatementClass::Dml } else { StatementClass::Ddl };
            let result = client
                .review
                .submit(&sql, class, args.role.map(Privilege::from))
                .await
                .map_err(describe)?;
            verdict(&result, config.pass_threshold)
        }
        Command::Datasources(command) => datasources(command, config, client).await,
        Command::Protect => {
            let mut secret = String::new();
            stdin.read_to_string(&mut secret).context("Failed to read secret from stdin")?;
            let secret = secret.trim_end_matches(['\r', '\n']);

            let token = config.protector().map_err(describe)?.protect(secret).map_err(|e| describe(e.into()))?;
            Ok(Outcome::ok(token.as_str().to_string()))
        }
    }
}

async fn datasources(command: DatasourceCommand, config: &Config, client: &Client) -> anyhow::Result<Outcome> {
    let registry = &client.datasources;
    match command {
        DatasourceCommand::List { page, page_size } => Outcome::json(&registry.list_page(page, page_size).await.map_err(describe)?),
        DatasourceCommand::Show { id } => Outcome::json(&registry.get_by_id(id).await.map_err(describe)?),
        DatasourceCommand::Databases { id } => Outcome::json(&registry.list_databases(id).await.map_err(describe)?),
        DatasourceCommand::Tables { id, database } => {
            let level = registry
                .drill_down()
                .await
                .map_err(describe)?
                .datasource(id)
                .await
                .map_err(describe)?
                .database(&database)
                .await
                .map_err(describe)?;
            Outcome::json(&level.tables())
        }
        DatasourceCommand::Ddl {
            id,
            database,
            table,
            review,
            role,
        } => {
            let ddl = registry
                .drill_down()
                .await
                .map_err(describe)?
                .datasource(id)
                .await
                .map_err(describe)?
                .database(&database)
                .await
                .map_err(describe)?
                .ddl(&table)
                .await
                .map_err(describe)?;

            if !review {
                return Ok(Outcome::ok(ddl));
            }

            let result = client
                .review
                .submit(&ddl, StatementClass::Ddl, role.map(Privilege::from))
                .await
                .map_err(describe)?;
            verdict(&result, config.pass_threshold)
        }
    }
}

fn verdict(result: &AuditResult, threshold: f64) -> anyhow::Result<Outcome> {
    let passed = result.is_passing(threshold);
    if passed {
        info!(score = result.score(), threshold, "Review passed");
    } else {
        warn!(score = result.score(), threshold, "Review score below threshold");
    }

    Ok(Outcome {
        success: passed,
        ..Outcome::json(result)?
    })
}

fn read_input(path: &Path, stdin: &mut (dyn Read + Send)) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        stdin.read_to_string(&mut text).context("Failed to read SQL from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read SQL from {}", path.display()))
    }
}
