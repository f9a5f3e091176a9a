//! API request/response models for datasources (stored database connection records).
//!
//! Read models never carry the password: the backend may echo one, but it is dropped during
//! decoding. Write models only accept a [`ProtectedSecret`] in password position.
//!
//! A read model without a `status` flag counts as enabled, whichever endpoint it came from.

use crate::crypto::ProtectedSecret;
use crate::errors::{Error, Result};
use crate::types::DatasourceId;
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

/// A stored datasource as returned by the registry.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    id: DatasourceId,
    pub datasource_name: String,
    pub host: String,
    /// Sent as a number by some endpoints and as a string by others
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub port: u16,
    pub database_name: String,
    pub username: String,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
    /// Enabled flag
    #[serde(default = "enabled_by_default")]
    pub status: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Datasource {
    /// Server-assigned identifier; there is deliberately no way to change it.
    pub fn id(&self) -> DatasourceId {
        self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.status
    }
}

/// Body of `db/addDatasource` and `db/updateDatasource/{id}`.
#[derive(Debug, Clone, Serialize, Builder)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct DatasourceWrite {
    pub datasource_name: String,
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub password: ProtectedSecret,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[builder(default = true)]
    pub status: bool,
}

impl DatasourceWrite {
    /// Check the fields the backend requires, in wire order.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Validation { field: "host" });
        }
        if self.port == 0 {
            return Err(Error::Validation { field: "port" });
        }
        if self.database_name.trim().is_empty() {
            return Err(Error::Validation { field: "databaseName" });
        }
        if self.username.trim().is_empty() {
            return Err(Error::Validation { field: "username" });
        }
        Ok(())
    }

    /// Connection details for `connect/test`, reusing the already-protected password.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            host: self.host.clone(),
            port: self.port,
            database_name: self.database_name.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Full-replace body: the write model plus the identifier it is keyed by.
#[derive(Debug, Serialize)]
pub(crate) struct DatasourceReplace<'a> {
    pub id: DatasourceId,
    #[serde(flatten)]
    pub record: &'a DatasourceWrite,
}

/// Body of `connect/test`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub password: ProtectedSecret,
}

/// Entry of `db/getAllDatasource`, the first level of the drill-down.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceSummary {
    pub id: DatasourceId,
    #[serde(alias = "name")]
    pub datasource_name: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub status: bool,
}

impl DatasourceSummary {
    pub fn is_enabled(&self) -> bool {
        self.status
    }
}

/// `data` of `db/addDatasource`: either the bare id or the created record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CreatedId {
    Id(DatasourceId),
    Record { id: DatasourceId },
}

impl From<CreatedId> for DatasourceId {
    fn from(value: CreatedId) -> Self {
        match value {
            CreatedId::Id(id) | CreatedId::Record { id } => id,
        }
    }
}

/// Body of `db/batchDeleteDatasource`.
#[derive(Debug, Serialize)]
pub(crate) struct BatchDeleteRequest<'a> {
    pub ids: &'a [DatasourceId],
}

/// One entry of the backend's per-item batch delete report.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BatchDeleteItem {
    pub id: DatasourceId,
    pub success: bool,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
}

/// What happened to one id in a batch delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeleteStatus {
    Deleted,
    NotFound,
    Failed { message: String },
    /// The backend's report did not mention this id
    NotReported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: DatasourceId,
    #[serde(flatten)]
    pub status: DeleteStatus,
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        self.status == DeleteStatus::Deleted
    }
}

impl From<&BatchDeleteItem> for DeleteStatus {
    fn from(item: &BatchDeleteItem) -> Self {
        if item.success {
            return DeleteStatus::Deleted;
        }
        match item.code {
            Some(404) => DeleteStatus::NotFound,
            _ => DeleteStatus::Failed {
                message: item.message.clone().unwrap_or_default(),
            },
        }
    }
}

/// Map the backend report onto the requested ids, one outcome per id in request order.
///
/// With no report at all (a plain success reply) every id counts as deleted.
pub(crate) fn batch_outcomes(ids: &[DatasourceId], report: Option<Vec<BatchDeleteItem>>) -> Vec<DeleteOutcome> {
    match report {
        None => ids
            .iter()
            .map(|&id| DeleteOutcome {
                id,
                status: DeleteStatus::Deleted,
            })
            .collect(),
        Some(items) => ids
            .iter()
            .map(|&id| DeleteOutcome {
                id,
                status: items.iter().find(|item| item.id == id).map(DeleteStatus::from).unwrap_or(DeleteStatus::NotReported),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write() -> DatasourceWrite {
        DatasourceWrite::builder()
            .datasource_name("sales-primary")
            .host("10.0.0.5")
            .port(5432)
            .database_name("sales")
            .username("svc")
            .password(ProtectedSecret::from_token("tok"))
            .build()
    }

    #[test]
    fn test_datasource_port_as_number_or_string() {
        let base = json!({
            "id": 3,
            "datasourceName": "sales-primary",
            "host": "10.0.0.5",
            "databaseName": "sales",
            "username": "svc",
            "password": "should-be-ignored",
            "creator": "admin",
            "createTime": "2024-05-01 10:00:00",
            "status": true
        });

        let mut numeric = base.clone();
        numeric["port"] = json!(5432);
        let mut textual = base;
        textual["port"] = json!("5432");

        let a: Datasource = serde_json::from_value(numeric).unwrap();
        let b: Datasource = serde_json::from_value(textual).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id(), 3);
        assert_eq!(a.port, 5432);
        assert!(a.is_enabled());

        // The echoed password never makes it into the model
        let serialized = serde_json::to_value(&a).unwrap();
        assert!(serialized.get("password").is_none());
    }

    #[test]
    fn test_missing_status_is_enabled_for_both_read_models() {
        let record = json!({
            "id": 3,
            "datasourceName": "sales-primary",
            "host": "10.0.0.5",
            "port": 5432,
            "databaseName": "sales",
            "username": "svc"
        });
        let full: Datasource = serde_json::from_value(record.clone()).unwrap();
        let summary: DatasourceSummary = serde_json::from_value(record).unwrap();
        assert!(full.is_enabled());
        assert!(summary.is_enabled());

        let disabled: Datasource = serde_json::from_value(json!({
            "id": 4, "datasourceName": "legacy", "host": "h", "port": 1, "databaseName": "d", "username": "u", "status": false
        }))
        .unwrap();
        assert!(!disabled.is_enabled());
    }

    #[test]
    fn test_write_serialization() {
        let value = serde_json::to_value(write()).unwrap();
        assert_eq!(
            value,
            json!({
                "datasourceName": "sales-primary",
                "host": "10.0.0.5",
                "port": 5432,
                "databaseName": "sales",
                "username": "svc",
                "password": "tok",
                "status": true
            })
        );

        let replace = DatasourceReplace { id: 9, record: &write() };
        let value = serde_json::to_value(&replace).unwrap();
        assert_eq!(value["id"], 9);
        assert_eq!(value["host"], "10.0.0.5");
    }

    #[test]
    fn test_write_validation() {
        assert!(write().validate().is_ok());

        let mut missing = write();
        missing.host = "  ".to_string();
        assert!(matches!(missing.validate(), Err(Error::Validation { field: "host" })));

        let mut missing = write();
        missing.port = 0;
        assert!(matches!(missing.validate(), Err(Error::Validation { field: "port" })));

        let mut missing = write();
        missing.database_name.clear();
        assert!(matches!(missing.validate(), Err(Error::Validation { field: "databaseName" })));

        let mut missing = write();
        missing.username.clear();
        assert!(matches!(missing.validate(), Err(Error::Validation { field: "username" })));
    }

    #[test]
    fn test_created_id_shapes() {
        let id: CreatedId = serde_json::from_value(json!(12)).unwrap();
        assert_eq!(DatasourceId::from(id), 12);
        let id: CreatedId = serde_json::from_value(json!({"id": 13, "host": "x"})).unwrap();
        assert_eq!(DatasourceId::from(id), 13);
    }

    #[test]
    fn test_batch_outcomes_per_id() {
        let report = vec![
            BatchDeleteItem {
                id: 1,
                success: true,
                code: None,
                message: None,
            },
            BatchDeleteItem {
                id: 2,
                success: false,
                code: Some(404),
                message: Some("not found".to_string()),
            },
            BatchDeleteItem {
                id: 3,
                success: false,
                code: Some(500),
                message: Some("in use".to_string()),
            },
        ];

        let outcomes = batch_outcomes(&[1, 2, 3, 4], Some(report));
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].status, DeleteStatus::Deleted);
        assert_eq!(outcomes[1].status, DeleteStatus::NotFound);
        assert_eq!(
            outcomes[2].status,
            DeleteStatus::Failed {
                message: "in use".to_string()
            }
        );
        assert_eq!(outcomes[3].status, DeleteStatus::NotReported);

        let outcomes = batch_outcomes(&[5, 6], None);
        assert!(outcomes.iter().all(DeleteOutcome::is_deleted));
    }
}
