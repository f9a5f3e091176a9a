//! Client configuration.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `sqlaudit.yaml` and can be set with `-f` or the `SQLAUDIT_CONFIG` environment
//! variable. A missing file is fine: every field has a default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `sqlaudit.yaml`)
//! 2. **Environment variables** - Variables prefixed with `SQLAUDIT_` override YAML values
//!
//! ## Example
//!
//! ```yaml
//! base_url: https://audit.example.com/api/
//! access_token: eyJhbGciOiJIUzUxMiJ9...
//! request_timeout: 15s
//! public_key_path: /etc/sqlaudit/backend.pem
//! pass_threshold: 75
//! log_format: json
//! ```
//!
//! ```bash
//! SQLAUDIT_BASE_URL=http://localhost:8080/api/
//! SQLAUDIT_PASS_THRESHOLD=80
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::api::models::audit::DEFAULT_PASS_THRESHOLD;
use crate::cli::Command;
use crate::crypto::RsaProtector;
use crate::errors::Error;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SQLAUDIT_CONFIG", default_value = "sqlaudit.yaml")]
    pub config: String,

    /// Validate configuration and exit.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL of the review backend; request paths are resolved against it
    pub base_url: Url,
    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// PEM file holding the backend's RSA public key, used to protect passwords
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_path: Option<PathBuf>,
    /// Scores below this fail `sqlaudit review`
    pub pass_threshold: f64,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:8080/api/").expect("Failed to parse default base URL"),
            access_token: None,
            request_timeout: Duration::from_secs(30),
            public_key_path: None,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err(Error::invalid_input(format!(
                "Config validation: pass_threshold must be between 0 and 100, got {}",
                self.pass_threshold
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::invalid_input("Config validation: request_timeout must be greater than zero"));
        }

        if self.base_url.cannot_be_a_base() {
            return Err(Error::invalid_input(format!(
                "Config validation: base_url '{}' cannot be used as a base URL",
                self.base_url
            )));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // SQLAUDIT_CONFIG names the file itself, not a config key
            .merge(Env::prefixed("SQLAUDIT_").ignore(&["config"]).split("__"))
    }

    /// Load the RSA protector from `public_key_path`.
    pub fn protector(&self) -> Result<RsaProtector, Error> {
        let path = self
            .public_key_path
            .as_deref()
            .ok_or_else(|| Error::invalid_input("public_key_path is not configured; it is needed to protect credentials"))?;
        Ok(RsaProtector::from_pem_file(path)?)
    }
}
