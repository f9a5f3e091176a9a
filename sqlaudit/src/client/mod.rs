//! Clients for the review backend.
//!
//! All clients share one [`Transport`]. They hold no mutable state, so cloning one is cheap and
//! clones may be used from any number of tasks at once.

pub mod datasources;
pub mod review;
pub mod users;

pub use datasources::{DatabaseLevel, DatasourceClient, DrillDown, TableLevel};
pub use review::{ReviewDispatcher, ReviewRoute};
pub use users::UserClient;

use crate::config::Config;
use crate::errors::Result;
use crate::http::{ReqwestTransport, Transport};
use std::sync::Arc;

/// Every client, wired to a single transport.
#[derive(Clone)]
pub struct Client {
    pub datasources: DatasourceClient,
    pub review: ReviewDispatcher,
    pub users: UserClient,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            datasources: DatasourceClient::new(transport.clone()),
            review: ReviewDispatcher::new(transport.clone()),
            users: UserClient::new(transport),
        }
    }

    /// Build a client backed by [`ReqwestTransport`] using the configured base URL, token and
    /// timeout.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(Arc::new(ReqwestTransport::from_config(config)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::audit::{Privilege, StatementClass};
    use crate::http::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_clients_share_one_transport() {
        let mock = MockTransport::new();
        let client = Client::new(Arc::new(mock.clone()));

        mock.add_ok("GET db/getAllDatasource", json!([]));
        mock.add_ok("POST review/common/dml", json!({"score": 80}));

        assert!(client.datasources.list_datasources().await.unwrap().is_empty());
        let verdict = client
            .review
            .submit("UPDATE t SET a = 1", StatementClass::Dml, Some(Privilege::Ordinary))
            .await
            .unwrap();
        assert_eq!(verdict.score(), 80.0);
        assert_eq!(mock.call_count(), 2);
    }

    #[test]
    fn test_from_config() {
        assert!(Client::from_config(&Config::default()).is_ok());
    }
}
