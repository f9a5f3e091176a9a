//! SQL review request/response models.
//!
//! [`AuditResult`] is the canonical verdict handed to callers. It is built once from the backend
//! payload and never changes afterwards; the only computation done on it is the advisory
//! [`AuditResult::is_passing`] threshold check.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default pass mark used when configuration does not override it.
pub const DEFAULT_PASS_THRESHOLD: f64 = 60.0;

/// Statement class of the submitted SQL. Chosen by the caller; the text itself is never parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementClass {
    Ddl,
    Dml,
}

impl fmt::Display for StatementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementClass::Ddl => write!(f, "DDL"),
            StatementClass::Dml => write!(f, "DML"),
        }
    }
}

/// Caller privilege as claimed by the client. Advisory only: the backend is the real gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    Administrator,
    Ordinary,
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Privilege::Administrator => write!(f, "administrator"),
            Privilege::Ordinary => write!(f, "ordinary"),
        }
    }
}

/// Body of every review endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuditRequest<'a> {
    pub sql_text: &'a str,
}

/// `data` of a review reply as the backend sends it. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuditPayload {
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub optimizable_items: Option<u32>,
    #[serde(default)]
    pub raw_result: Option<String>,
    #[serde(default)]
    pub dimensional_scores: Option<BTreeMap<String, f64>>,
}

/// Canonical scored review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    code: i64,
    message: String,
    table_name: Option<String>,
    score: f64,
    optimizable_items: u32,
    raw_result: String,
    dimensional_scores: BTreeMap<String, f64>,
}

impl AuditResult {
    /// Normalize a backend payload.
    ///
    /// Absent and `null` table names both become `None`; an empty string stays `Some("")`. A
    /// payload without a score is rejected, everything else falls back to an empty value.
    pub(crate) fn from_payload(code: i64, message: String, payload: AuditPayload) -> Result<Self> {
        let score = payload
            .score
            .ok_or_else(|| Error::malformed("Review reply carried no score"))?;

        Ok(Self {
            code,
            message,
            table_name: payload.table_name,
            score,
            optimizable_items: payload.optimizable_items.unwrap_or(0),
            raw_result: payload.raw_result.unwrap_or_default(),
            dimensional_scores: payload.dimensional_scores.unwrap_or_default(),
        })
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Subject table, absent for multi-statement or non-DDL reviews.
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn optimizable_items(&self) -> u32 {
        self.optimizable_items
    }

    /// Verbatim backend narrative.
    pub fn raw_result(&self) -> &str {
        &self.raw_result
    }

    pub fn dimensional_scores(&self) -> &BTreeMap<String, f64> {
        &self.dimensional_scores
    }

    pub fn dimension(&self, name: &str) -> Option<f64> {
        self.dimensional_scores.get(name).copied()
    }

    /// `score >= threshold`, with no rounding. Advisory; the backend score stays authoritative.
    pub fn is_passing(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}
