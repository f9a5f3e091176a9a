//! Connection registry client.
//!
//! CRUD, enable/disable and connectivity tests over stored datasources, plus the read-only
//! drill-down (datasource → database → table → DDL) used to pick what to review. Every call goes
//! to the backend; nothing is cached, so callers that need a consistent view across a multi-step
//! drill-down hold on to the identifiers they got back.

use crate::api::envelope::{self, Failure, Subject};
use crate::api::models::datasources::{
    BatchDeleteItem, BatchDeleteRequest, ConnectionInfo, CreatedId, Datasource, DatasourceReplace, DatasourceSummary, DatasourceWrite,
    DeleteOutcome, batch_outcomes,
};
use crate::api::models::pagination::{Page, PageRequest};
use crate::errors::{Error, ErrorKind, Result};
use crate::http::{ApiRequest, Transport, encode_segment};
use crate::types::DatasourceId;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const RESOURCE: &str = "Datasource";

#[derive(Clone)]
pub struct DatasourceClient {
    transport: Arc<dyn Transport>,
}

impl DatasourceClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// `GET db/page?page&pageSize`
    #[instrument(skip(self), err)]
    pub async fn list_page(&self, page: u32, page_size: u32) -> Result<Page<Datasource>> {
        let paging = PageRequest::new(page, page_size)?;
        let mut request = ApiRequest::get("db/page");
        for (key, value) in paging.query() {
            request = request.query(key, value);
        }

        let response = self.transport.execute(&request).await?;
        envelope::decode::<Page<Datasource>>(response, &Subject::new(RESOURCE, "page"))?.require_data("datasource page")
    }

    /// `GET db/getDatasourceInfo/{id}`
    #[instrument(skip(self), err)]
    pub async fn get_by_id(&self, id: DatasourceId) -> Result<Datasource> {
        let response = self.transport.execute(&ApiRequest::get(format!("db/getDatasourceInfo/{id}"))).await?;
        let subject = Subject::new(RESOURCE, id);

        // Some backends answer a missing id with an empty success reply
        envelope::decode::<Datasource>(response, &subject)?.data.ok_or_else(|| Error::NotFound {
            resource: RESOURCE.to_string(),
            id: id.to_string(),
        })
    }

    /// `POST db/addDatasource`, returning the backend-assigned identifier.
    #[instrument(skip(self, record), fields(host = %record.host, database = %record.database_name), err)]
    pub async fn add(&self, record: &DatasourceWrite) -> Result<DatasourceId> {
        record.validate()?;

        let request = ApiRequest::post("db/addDatasource").json(record)?;
        let response = self.transport.execute(&request).await?;
        let id: DatasourceId = envelope::decode::<CreatedId>(response, &Subject::new(RESOURCE, "new"))?
            .require_data("datasource id")?
            .into();

        info!(id, "Datasource added");
        Ok(id)
    }

    /// `PUT db/updateDatasource/{id}`: full replace keyed by `id`.
    #[instrument(skip(self, record), err)]
    pub async fn update(&self, id: DatasourceId, record: &DatasourceWrite) -> Result<()> {
        record.validate()?;

        let request = ApiRequest::put(format!("db/updateDatasource/{id}")).json(&DatasourceReplace { id, record })?;
        let response = self.transport.execute(&request).await?;
        envelope::decode::<serde_json::Value>(response, &Subject::new(RESOURCE, id))?;
        Ok(())
    }

    /// `DELETE db/deleteDatasource/{id}`. Deleting an id that is already gone is `NotFound`.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: DatasourceId) -> Result<()> {
        let response = self.transport.execute(&ApiRequest::delete(format!("db/deleteDatasource/{id}"))).await?;
        envelope::decode::<serde_json::Value>(response, &Subject::new(RESOURCE, id))?;
        info!(id, "Datasource deleted");
        Ok(())
    }

    /// `DELETE db/batchDeleteDatasource` with body `{ids}`.
    ///
    /// Returns one outcome per requested id, in request order. An id the backend reports as
    /// missing does not abort the rest of the batch, and a failure code that still carries a
    /// per-id report is read as that report.
    #[instrument(skip(self), fields(count = ids.len()), err)]
    pub async fn batch_delete(&self, ids: &[DatasourceId]) -> Result<Vec<DeleteOutcome>> {
        if ids.is_empty() {
            return Err(Error::invalid_input("Batch delete needs at least one id"));
        }

        let request = ApiRequest::delete("db/batchDeleteDatasource").json(&BatchDeleteRequest { ids })?;
        let response = self.transport.execute(&request).await?;
        let report = match envelope::decode_with_data::<Vec<BatchDeleteItem>>(response, &Subject::new(RESOURCE, "batch")) {
            Ok(reply) => reply.data,
            Err(Failure { error, data: Some(items) }) if error.kind() != ErrorKind::Unauthorized && !items.is_empty() => {
                warn!(%error, "Batch delete replied with a failure code and a per-id report");
                Some(items)
            }
            Err(failure) => return Err(failure.error),
        };

        let outcomes = batch_outcomes(ids, report);
        let deleted = outcomes.iter().filter(|o| o.is_deleted()).count();
        if deleted < outcomes.len() {
            warn!(deleted, requested = outcomes.len(), "Batch delete partially failed");
        }
        Ok(outcomes)
    }

    /// `PATCH db/enable/{id}?status`: flips usability without touching the configuration.
    #[instrument(skip(self), err)]
    pub async fn set_enabled(&self, id: DatasourceId, enabled: bool) -> Result<()> {
        let request = ApiRequest::patch(format!("db/enable/{id}")).query("status", enabled);
        let response = self.transport.execute(&request).await?;
        envelope::decode::<serde_json::Value>(response, &Subject::new(RESOURCE, id))?;
        Ok(())
    }

    /// `POST connect/test`.
    ///
    /// A reply the backend classifies as a plain failure (bad credentials, unreachable database)
    /// is `Ok(false)`, as is a success reply whose data is literally `false`. Any other success
    /// payload counts as connected. Privilege, validation and transport problems are still errors.
    #[instrument(skip(self, info), fields(host = %info.host, port = info.port), err)]
    pub async fn test_connection(&self, info: &ConnectionInfo) -> Result<bool> {
        let request = ApiRequest::post("connect/test").json(info)?;
        let response = self.transport.execute(&request).await?;

        match envelope::decode::<Value>(response, &Subject::new(RESOURCE, &info.host)) {
            Ok(reply) => Ok(!matches!(reply.data, Some(Value::Bool(false)))),
            Err(Error::Backend { code, message, .. }) => {
                warn!(code, %message, "Connection test failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// `GET db/getAllDatasource`
    #[instrument(skip(self), err)]
    pub async fn list_datasources(&self) -> Result<Vec<DatasourceSummary>> {
        let response = self.transport.execute(&ApiRequest::get("db/getAllDatasource")).await?;
        Ok(envelope::decode::<Vec<DatasourceSummary>>(response, &Subject::new(RESOURCE, "all"))?
            .data
            .unwrap_or_default())
    }

    /// `GET db/datasource/{id}/databases`
    #[instrument(skip(self), err)]
    pub async fn list_databases(&self, datasource_id: DatasourceId) -> Result<Vec<String>> {
        let response = self
            .transport
            .execute(&ApiRequest::get(format!("db/datasource/{datasource_id}/databases")))
            .await?;
        Ok(envelope::decode::<Vec<String>>(response, &Subject::new(RESOURCE, datasource_id))?
            .data
            .unwrap_or_default())
    }

    /// `GET db/datasources/{id}/databases/{db}/tables`
    #[instrument(skip(self), err)]
    pub async fn list_tables(&self, datasource_id: DatasourceId, database: &str) -> Result<Vec<String>> {
        require_name("database", database)?;
        let path = format!("db/datasources/{datasource_id}/databases/{}/tables", encode_segment(database));
        let response = self.transport.execute(&ApiRequest::get(path)).await?;
        Ok(envelope::decode::<Vec<String>>(response, &Subject::new("Database", database))?
            .data
            .unwrap_or_default())
    }

    /// `GET db/datasources/{id}/databases/{db}/tables/{table}/ddl`: SQL text ready for review.
    #[instrument(skip(self), err)]
    pub async fn derive_ddl(&self, datasource_id: DatasourceId, database: &str, table: &str) -> Result<String> {
        require_name("database", database)?;
        require_name("table", table)?;
        let path = format!(
            "db/datasources/{datasource_id}/databases/{}/tables/{}/ddl",
            encode_segment(database),
            encode_segment(table)
        );
        let response = self.transport.execute(&ApiRequest::get(path)).await?;
        let ddl = envelope::decode::<String>(response, &Subject::new("Table", table))?.require_data("DDL text")?;

        if ddl.trim().is_empty() {
            return Err(Error::malformed(format!("Backend returned empty DDL for {database}.{table}")));
        }
        Ok(ddl)
    }

    /// Start a drill-down at the datasource level.
    pub async fn drill_down(&self) -> Result<DrillDown> {
        let datasources = self.list_datasources().await?;
        Ok(DrillDown {
            client: self.clone(),
            datasources,
        })
    }
}

/// Names become single path segments, so relative segments that URL resolution would collapse
/// are refused along with blank ones.
fn require_name(what: &str, value: &str) -> Result<()> {
    match value.trim() {
        "" => Err(Error::invalid_input(format!("{what} name must not be empty"))),
        "." | ".." => Err(Error::invalid_input(format!("{what} name '{value}' is not a valid path segment"))),
        _ => Ok(()),
    }
}

/// First drill-down level: the datasources the backend offered.
///
/// Each level can only be reached from the one above it, and only with an item that level
/// actually listed.
pub struct DrillDown {
    client: DatasourceClient,
    datasources: Vec<DatasourceSummary>,
}

impl DrillDown {
    pub fn datasources(&self) -> &[DatasourceSummary] {
        &self.datasources
    }

    /// Select a listed, enabled datasource and fetch its databases.
    pub async fn datasource(self, id: DatasourceId) -> Result<DatabaseLevel> {
        let summary = self
            .datasources
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::invalid_input(format!("Datasource {id} was not offered by the registry")))?;
        if !summary.is_enabled() {
            return Err(Error::invalid_input(format!("Datasource {id} is disabled")));
        }

        let databases = self.client.list_databases(id).await?;
        Ok(DatabaseLevel {
            client: self.client,
            datasource_id: id,
            databases,
        })
    }
}

impl fmt::Debug for DrillDown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrillDown").field("datasources", &self.datasources).finish_non_exhaustive()
    }
}

/// Second level: databases of one datasource.
pub struct DatabaseLevel {
    client: DatasourceClient,
    datasource_id: DatasourceId,
    databases: Vec<String>,
}

impl DatabaseLevel {
    pub fn datasource_id(&self) -> DatasourceId {
        self.datasource_id
    }

    pub fn databases(&self) -> &[String] {
        &self.databases
    }

    pub async fn database(self, name: &str) -> Result<TableLevel> {
        if !self.databases.iter().any(|d| d == name) {
            return Err(Error::invalid_input(format!(
                "Database '{name}' is not listed for datasource {}",
                self.datasource_id
            )));
        }

        let tables = self.client.list_tables(self.datasource_id, name).await?;
        Ok(TableLevel {
            client: self.client,
            datasource_id: self.datasource_id,
            database: name.to_string(),
            tables,
        })
    }
}

impl fmt::Debug for DatabaseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseLevel")
            .field("datasource_id", &self.datasource_id)
            .field("databases", &self.databases)
            .finish_non_exhaustive()
    }
}

/// Third level: tables of one database.
pub struct TableLevel {
    client: DatasourceClient,
    datasource_id: DatasourceId,
    database: String,
    tables: Vec<String>,
}

impl TableLevel {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Derive the DDL of a listed table.
    pub async fn ddl(&self, table: &str) -> Result<String> {
        if !self.tables.iter().any(|t| t == table) {
            return Err(Error::invalid_input(format!("Table '{table}' is not listed in database '{}'", self.database)));
        }
        self.client.derive_ddl(self.datasource_id, &self.database, table).await
    }
}

impl fmt::Debug for TableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableLevel")
            .field("datasource_id", &self.datasource_id)
            .field("database", &self.database)
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}
