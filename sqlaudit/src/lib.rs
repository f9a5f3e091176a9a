//! # sqlaudit: client for the SQL review platform
//!
//! `sqlaudit` talks to a backend that stores database connection records ("datasources"),
//! audits submitted SQL for style and safety issues, and manages the users allowed to do both.
//!
//! ## Overview
//!
//! The heart of the crate is review dispatch. A caller hands over SQL text together with its
//! statement class (DDL or DML) and, when known, its privilege (administrator or ordinary). The
//! [`ReviewDispatcher`] picks exactly one backend endpoint from a fixed routing table, submits
//! the text, and normalizes the reply into an [`AuditResult`]: an overall score, a count of
//! optimizable items, per-dimension scores and the backend's narrative. Nothing in the crate
//! parses SQL; classification is always the caller's claim, and the backend is the only gate on
//! privilege.
//!
//! Around that sit two supporting clients. The [`DatasourceClient`] covers CRUD over stored
//! connections, enable/disable, connectivity tests and a drill-down from datasource to database to
//! table to DDL, which is how most SQL gets chosen for review. The [`UserClient`] covers login,
//! token refresh and user management; a login's roles resolve to the privilege used for routing.
//!
//! ## Credentials
//!
//! Passwords never leave the process in plaintext. A [`CredentialProtector`] (by default the
//! [`RsaProtector`], loaded from the backend's public key) turns a secret into a
//! [`ProtectedSecret`], and that type is the only thing request models accept in a password
//! position.
//!
//! ## Transport
//!
//! Every client holds an `Arc<dyn Transport>`. [`ReqwestTransport`] is the production
//! implementation; [`MockTransport`](http::MockTransport) replays queued responses for tests.
//! Each operation is a single request and response. There are no retries and no caching.
//!
//! ## Example
//!
//! ```no_run
//! use sqlaudit::{Client, Config, Privilege, StatementClass};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::from_config(&Config::default())?;
//!
//! let ddl = client
//!     .datasources
//!     .drill_down()
//!     .await?
//!     .datasource(1)
//!     .await?
//!     .database("sales")
//!     .await?
//!     .ddl("orders")
//!     .await?;
//!
//! let verdict = client.review.submit(&ddl, StatementClass::Ddl, Some(Privilege::Ordinary)).await?;
//! println!("{} scored {}", verdict.table_name().unwrap_or("statement"), verdict.score());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod http;
pub mod telemetry;
pub mod types;

pub use api::models::audit::{AuditResult, DEFAULT_PASS_THRESHOLD, Privilege, StatementClass};
pub use api::models::datasources::{ConnectionInfo, Datasource, DatasourceSummary, DatasourceWrite, DeleteOutcome, DeleteStatus};
pub use api::models::pagination::{Page, PageRequest};
pub use api::models::users::{Session, TokenPair, User, UserWrite};
pub use client::{Client, DatasourceClient, ReviewDispatcher, ReviewRoute, UserClient};
pub use config::Config;
pub use crypto::{CredentialProtector, EncryptionError, ProtectedSecret, RsaProtector};
pub use errors::{Error, ErrorKind, Result};
pub use http::{ApiRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{DatasourceId, UserId};
