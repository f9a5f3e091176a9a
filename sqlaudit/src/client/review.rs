//! Review dispatch: route SQL text to exactly one audit endpoint and normalize the verdict.
//!
//! The route is a pure function of the statement class and the caller's privilege:
//!
//! | class | privilege     | path                |
//! |-------|---------------|---------------------|
//! | DDL   | administrator | `review/admin/ddl`  |
//! | DML   | administrator | `review/admin/dml`  |
//! | DDL   | ordinary      | `review/common/ddl` |
//! | DML   | ordinary      | `review/common/dml` |
//! | DDL   | unresolved    | `review/ddl`        |
//!
//! There is no fallback: DML without a resolved privilege is refused before anything is sent.
//! The privilege is the caller's claim; the backend decides whether to honour it.

use crate::api::envelope::{self, Subject};
use crate::api::models::audit::{AuditPayload, AuditRequest, AuditResult, Privilege, StatementClass};
use crate::errors::{Error, Result};
use crate::http::{ApiRequest, Transport};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// One of the five review endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewRoute {
    AdminDdl,
    AdminDml,
    CommonDdl,
    CommonDml,
    /// Privilege-agnostic DDL review, for callers whose role is not known yet
    GenericDdl,
}

impl ReviewRoute {
    pub const ALL: [ReviewRoute; 5] = [
        ReviewRoute::AdminDdl,
        ReviewRoute::AdminDml,
        ReviewRoute::CommonDdl,
        ReviewRoute::CommonDml,
        ReviewRoute::GenericDdl,
    ];

    /// The routing table.
    pub fn select(class: StatementClass, privilege: Option<Privilege>) -> Result<Self> {
        match (class, privilege) {
            (StatementClass::Ddl, Some(Privilege::Administrator)) => Ok(ReviewRoute::AdminDdl),
            (StatementClass::Dml, Some(Privilege::Administrator)) => Ok(ReviewRoute::AdminDml),
            (StatementClass::Ddl, Some(Privilege::Ordinary)) => Ok(ReviewRoute::CommonDdl),
            (StatementClass::Dml, Some(Privilege::Ordinary)) => Ok(ReviewRoute::CommonDml),
            (StatementClass::Ddl, None) => Ok(ReviewRoute::GenericDdl),
            (StatementClass::Dml, None) => Err(Error::Unauthorized {
                message: "DML review requires a resolved administrator or ordinary role".to_string(),
            }),
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            ReviewRoute::AdminDdl => "review/admin/ddl",
            ReviewRoute::AdminDml => "review/admin/dml",
            ReviewRoute::CommonDdl => "review/common/ddl",
            ReviewRoute::CommonDml => "review/common/dml",
            ReviewRoute::GenericDdl => "review/ddl",
        }
    }

    pub fn statement_class(self) -> StatementClass {
        match self {
            ReviewRoute::AdminDml | ReviewRoute::CommonDml => StatementClass::Dml,
            ReviewRoute::AdminDdl | ReviewRoute::CommonDdl | ReviewRoute::GenericDdl => StatementClass::Ddl,
        }
    }
}

impl fmt::Display for ReviewRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Submits SQL text for review.
///
/// Each `submit` is an independent request/response exchange; concurrent submissions are allowed
/// and come back in whatever order the backend answers.
#[derive(Clone)]
pub struct ReviewDispatcher {
    transport: Arc<dyn Transport>,
}

impl ReviewDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Submit `sql_text` to the endpoint selected by `class` and `privilege`.
    ///
    /// # Errors
    /// - `InvalidInput` for empty or whitespace-only text (nothing is sent)
    /// - `Unauthorized` for DML without a privilege, or when the backend rejects the privilege
    /// - `Transport` when the backend cannot be reached
    /// - `MalformedResponse` when the reply carries no verdict
    #[instrument(skip(self, sql_text), fields(sql_len = sql_text.len()), err)]
    pub async fn submit(&self, sql_text: &str, class: StatementClass, privilege: Option<Privilege>) -> Result<AuditResult> {
        if sql_text.trim().is_empty() {
            return Err(Error::invalid_input("SQL text must not be empty"));
        }

        let route = ReviewRoute::select(class, privilege)?;
        self.dispatch(route, sql_text).await
    }

    /// Submit DDL through the privilege-agnostic entry point.
    pub async fn submit_generic(&self, sql_text: &str) -> Result<AuditResult> {
        self.submit(sql_text, StatementClass::Ddl, None).await
    }

    async fn dispatch(&self, route: ReviewRoute, sql_text: &str) -> Result<AuditResult> {
        debug!(%route, "Dispatching review");

        let request = ApiRequest::post(route.path()).json(&AuditRequest { sql_text })?;
        let response = self.transport.execute(&request).await?;

        let reply = envelope::decode::<AuditPayload>(response, &Subject::new("Review endpoint", route.path()))?;
        let (code, message) = (reply.code, reply.message.clone());
        let payload = reply.require_data("review verdict")?;
        let result = AuditResult::from_payload(code, message, payload)?;

        info!(
            %route,
            score = result.score(),
            optimizable_items = result.optimizable_items(),
            table = result.table_name().unwrap_or("-"),
            "Review completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::http::{HttpResponse, MockTransport};
    use serde_json::json;

    fn dispatcher() -> (ReviewDispatcher, MockTransport) {
        let mock = MockTransport::new();
        (ReviewDispatcher::new(Arc::new(mock.clone())), mock)
    }

    fn verdict(score: f64) -> serde_json::Value {
        json!({
            "tableName": "orders",
            "score": score,
            "optimizableItems": 2,
            "rawResult": "primary key missing",
            "dimensionalScores": {"naming": 80, "performance": 70}
        })
    }

    #[test]
    fn test_routing_table() {
        use Privilege::*;
        use StatementClass::*;

        assert_eq!(ReviewRoute::select(Ddl, Some(Administrator)).unwrap().path(), "review/admin/ddl");
        assert_eq!(ReviewRoute::select(Dml, Some(Administrator)).unwrap().path(), "review/admin/dml");
        assert_eq!(ReviewRoute::select(Ddl, Some(Ordinary)).unwrap().path(), "review/common/ddl");
        assert_eq!(ReviewRoute::select(Dml, Some(Ordinary)).unwrap().path(), "review/common/dml");
        assert_eq!(ReviewRoute::select(Ddl, None).unwrap().path(), "review/ddl");
        assert_eq!(ReviewRoute::select(Dml, None).unwrap_err().kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_routes_are_distinct_and_keep_their_class() {
        let paths: std::collections::HashSet<_> = ReviewRoute::ALL.iter().map(|r| r.path()).collect();
        assert_eq!(paths.len(), ReviewRoute::ALL.len());

        for route in ReviewRoute::ALL {
            assert_eq!(route.path().ends_with("dml"), route.statement_class() == StatementClass::Dml);
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_each_pair_hits_exactly_its_endpoint() {
        let pairs = [
            (StatementClass::Ddl, Privilege::Administrator, "review/admin/ddl"),
            (StatementClass::Dml, Privilege::Administrator, "review/admin/dml"),
            (StatementClass::Ddl, Privilege::Ordinary, "review/common/ddl"),
            (StatementClass::Dml, Privilege::Ordinary, "review/common/dml"),
        ];

        for (class, privilege, expected) in pairs {
            let (dispatcher, mock) = dispatcher();
            mock.add_ok(&format!("POST {expected}"), verdict(90.0));

            let result = dispatcher.submit("ALTER TABLE t ADD c int", class, Some(privilege)).await.unwrap();
            assert_eq!(result.score(), 90.0);

            let calls = mock.get_calls();
            assert_eq!(calls.len(), 1, "{class} / {privilege} must make exactly one call");
            assert_eq!(calls[0].path, expected);
            assert_eq!(calls[0].method, reqwest::Method::POST);
            assert_eq!(calls[0].body, Some(json!({"sqlText": "ALTER TABLE t ADD c int"})));
        }
    }

    #[tokio::test]
    async fn test_generic_entry_point() {
        let (dispatcher, mock) = dispatcher();
        mock.add_ok("POST review/ddl", verdict(75.0));

        let result = dispatcher.submit_generic("CREATE TABLE t (id int)").await.unwrap();
        assert_eq!(result.score(), 75.0);
        assert_eq!(mock.last_call().unwrap().path, "review/ddl");
    }

    #[tokio::test]
    async fn test_empty_sql_never_reaches_transport() {
        let (dispatcher, mock) = dispatcher();

        for text in ["", "   ", "\n\t"] {
            for class in [StatementClass::Ddl, StatementClass::Dml] {
                for privilege in [Some(Privilege::Administrator), Some(Privilege::Ordinary), None] {
                    let err = dispatcher.submit(text, class, privilege).await.unwrap_err();
                    assert_eq!(err.kind(), ErrorKind::InvalidInput);
                }
            }
        }

        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_dml_without_privilege_is_refused_locally() {
        let (dispatcher, mock) = dispatcher();
        let err = dispatcher.submit("DELETE FROM t", StatementClass::Dml, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_rejects_privilege() {
        let (dispatcher, mock) = dispatcher();
        mock.add_response(
            "POST review/admin/dml",
            Ok(HttpResponse::json(403, json!({"code": 403, "message": "administrator role required"}))),
        );

        let err = dispatcher
            .submit("UPDATE t SET a = 1", StatementClass::Dml, Some(Privilege::Administrator))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { ref message } if message == "administrator role required"));
    }

    #[tokio::test]
    async fn test_envelope_level_rejection() {
        let (dispatcher, mock) = dispatcher();
        mock.add_response(
            "POST review/admin/ddl",
            Ok(HttpResponse::json(200, json!({"code": 401, "message": "token expired", "data": null}))),
        );

        let err = dispatcher
            .submit("DROP TABLE t", StatementClass::Ddl, Some(Privilege::Administrator))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_masked() {
        let (dispatcher, mock) = dispatcher();
        mock.add_response(
            "POST review/common/ddl",
            Err(Error::Transport(anyhow::anyhow!("connection reset by peer"))),
        );

        let err = dispatcher
            .submit("CREATE TABLE t (id int)", StatementClass::Ddl, Some(Privilege::Ordinary))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(ref cause) if cause.to_string().contains("connection reset")));
    }

    #[tokio::test]
    async fn test_reply_without_verdict_is_malformed() {
        let (dispatcher, mock) = dispatcher();
        mock.add_ok("POST review/common/dml", serde_json::Value::Null);

        let err = dispatcher
            .submit("INSERT INTO t VALUES (1)", StatementClass::Dml, Some(Privilege::Ordinary))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_normalizes_multi_statement_dml() {
        let (dispatcher, mock) = dispatcher();
        mock.add_ok(
            "POST review/common/dml",
            json!({"score": 64, "optimizableItems": 5, "rawResult": "2 statements without WHERE"}),
        );

        let result = dispatcher
            .submit("UPDATE a SET x = 1; UPDATE b SET y = 2;", StatementClass::Dml, Some(Privilege::Ordinary))
            .await
            .unwrap();

        assert_eq!(result.code(), 200);
        assert_eq!(result.message(), "success");
        assert_eq!(result.table_name(), None);
        assert_eq!(result.optimizable_items(), 5);
        assert!(result.is_passing(60.0));
        assert!(!result.is_passing(65.0));
    }

    #[tokio::test]
    async fn test_concurrent_submissions_are_independent() {
        let (dispatcher, mock) = dispatcher();
        mock.add_ok("POST review/common/ddl", verdict(50.0));
        mock.add_ok("POST review/admin/ddl", verdict(95.0));

        let (ordinary, admin) = tokio::join!(
            dispatcher.submit("CREATE TABLE a (id int)", StatementClass::Ddl, Some(Privilege::Ordinary)),
            dispatcher.submit("CREATE TABLE b (id int)", StatementClass::Ddl, Some(Privilege::Administrator)),
        );

        assert_eq!(ordinary.unwrap().score(), 50.0);
        assert_eq!(admin.unwrap().score(), 95.0);
        assert_eq!(mock.call_count(), 2);
    }
}
