use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::integration::{
    CreateDataSource, CreateDataSourceQuery, CredentialChange, Credentials, DataSourceView, UpdateDataSource,
    UpdateDataSourceQuery,
};
use crate::database::models::{AuthType, DataSourceQuery, ExternalDataSource};
use crate::error::ApiError;
use crate::integrations::fetcher::SourceTestResult;
use crate::integrations::import::ImportFile;
use crate::integrations::{DataFetcher, FetchOptions, FetchOutcome, TenantScope};

const SOURCE_COLUMNS: &str = "id, name, description, base_url, auth_type, encrypted_credentials, default_headers, \
     timeout_secs, is_active, created_at, updated_at";
const QUERY_COLUMNS: &str = "id, data_source_id, name, description, http_method, endpoint, query_params, \
     body_template, json_path, expected_type, cache_ttl_secs, is_active, created_at, updated_at";

pub const MAX_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryFilter {
    pub data_source_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    pub query: String,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<BatchItem>,
    #[serde(default)]
    pub refresh: bool,
}

/// Per-item result; one failing query does not fail the batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub query: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<FetchOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestQueryRequest {
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ImportReport {
    pub sources_created: Vec<String>,
    pub sources_updated: Vec<String>,
    pub queries_created: Vec<String>,
    pub queries_updated: Vec<String>,
}

pub struct IntegrationService {
    pool: PgPool,
    scope: TenantScope,
}

impl IntegrationService {
    pub fn new(pool: PgPool, scope: TenantScope) -> Self {
        Self { pool, scope }
    }

    fn fetcher() -> Result<&'static DataFetcher, ApiError> {
        Ok(DataFetcher::shared()?)
    }

    fn encrypt(credentials: &Credentials) -> Result<String, ApiError> {
        let plaintext = serde_json::to_string(credentials)
            .map_err(|e| ApiError::internal_server_error(format!("Failed to encode credentials: {}", e)))?;
        Ok(Self::fetcher()?.encryptor().encrypt(&plaintext)?)
    }

    fn invalidate(&self, names: &[&str]) {
        if let Ok(fetcher) = DataFetcher::shared() {
            for name in names {
                fetcher.invalidate_query(&self.scope.database, name);
            }
        }
    }

    // data sources

    pub async fn list_sources(&self) -> Result<Vec<DataSourceView>, ApiError> {
        let sql = format!("SELECT {} FROM external_data_sources ORDER BY name", SOURCE_COLUMNS);
        let sources = sqlx::query_as::<_, ExternalDataSource>(&sql).fetch_all(&self.pool).await?;
        Ok(sources.into_iter().map(DataSourceView::from).collect())
    }

    pub async fn get_source_row(&self, id: Uuid) -> Result<ExternalDataSource, ApiError> {
        let sql = format!("SELECT {} FROM external_data_sources WHERE id = $1", SOURCE_COLUMNS);
        sqlx::query_as::<_, ExternalDataSource>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Data source {} not found", id)))
    }

    pub async fn get_source(&self, id: Uuid) -> Result<DataSourceView, ApiError> {
        Ok(self.get_source_row(id).await?.into())
    }

    async fn ensure_source_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ApiError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM external_data_sources WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(name)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        if count > 0 {
            return Err(ApiError::conflict(format!("A data source named '{}' already exists", name)));
        }
        Ok(())
    }

    pub async fn create_source(&self, input: CreateDataSource) -> Result<DataSourceView, ApiError> {
        let (mut source, credentials) = input.into_source(Utc::now())?;
        self.ensure_source_name_free(&source.name, None).await?;
        source.encrypted_credentials = credentials.as_ref().map(Self::encrypt).transpose()?;

        let mut conn = self.pool.acquire().await?;
        let created = insert_source(&mut conn, &source).await?;
        info!("Created data source '{}' ({:?})", created.name, created.auth_type);
        Ok(created.into())
    }

    pub async fn update_source(&self, id: Uuid, patch: UpdateDataSource) -> Result<DataSourceView, ApiError> {
        let mut source = self.get_source_row(id).await?;
        let old_name = source.name.clone();

        match patch.apply(&mut source)? {
            CredentialChange::Keep => {}
            CredentialChange::Clear => source.encrypted_credentials = None,
            CredentialChange::Replace(credentials) => source.encrypted_credentials = Some(Self::encrypt(&credentials)?),
        }
        if source.name != old_name {
            self.ensure_source_name_free(&source.name, Some(id)).await?;
        }

        let mut conn = self.pool.acquire().await?;
        let saved = save_source(&mut conn, &source).await?;

        let names = self.query_names_for(id).await?;
        self.invalidate(&names.iter().map(String::as_str).collect::<Vec<_>>());
        Ok(saved.into())
    }

    /// Deletes the source and, by cascade, its queries
    pub async fn delete_source(&self, id: Uuid) -> Result<(), ApiError> {
        let names = self.query_names_for(id).await?;
        let result = sqlx::query("DELETE FROM external_data_sources WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(format!("Data source {} not found", id)));
        }

        self.invalidate(&names.iter().map(String::as_str).collect::<Vec<_>>());
        info!("Deleted data source {} and {} query(ies)", id, names.len());
        Ok(())
    }

    pub async fn test_source(&self, id: Uuid) -> Result<SourceTestResult, ApiError> {
        let source = self.get_source_row(id).await?;
        Ok(Self::fetcher()?.test_source(&source).await?)
    }

    async fn query_names_for(&self, source_id: Uuid) -> Result<Vec<String>, ApiError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM data_source_queries WHERE data_source_id = $1")
            .bind(source_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    // queries

    pub async fn list_queries(&self, filter: &QueryFilter) -> Result<Vec<DataSourceQuery>, ApiError> {
        let sql = format!(
            "SELECT {} FROM data_source_queries WHERE ($1::uuid IS NULL OR data_source_id = $1) ORDER BY name",
            QUERY_COLUMNS
        );
        Ok(sqlx::query_as::<_, DataSourceQuery>(&sql)
            .bind(filter.data_source_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get_query(&self, id: Uuid) -> Result<DataSourceQuery, ApiError> {
        let sql = format!("SELECT {} FROM data_source_queries WHERE id = $1", QUERY_COLUMNS);
        sqlx::query_as::<_, DataSourceQuery>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Query {} not found", id)))
    }

    pub async fn find_query_by_name(&self, name: &str) -> Result<DataSourceQuery, ApiError> {
        let sql = format!("SELECT {} FROM data_source_queries WHERE name = $1", QUERY_COLUMNS);
        sqlx::query_as::<_, DataSourceQuery>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Query '{}' not found", name)))
    }

    async fn ensure_query_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ApiError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM data_source_queries WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(name)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        if count > 0 {
            return Err(ApiError::conflict(format!("A query named '{}' already exists", name)));
        }
        Ok(())
    }

    pub async fn create_query(&self, input: CreateDataSourceQuery) -> Result<DataSourceQuery, ApiError> {
        self.get_source_row(input.data_source_id).await?;
        let query = input.into_query(Utc::now())?;
        self.ensure_query_name_free(&query.name, None).await?;

        let mut conn = self.pool.acquire().await?;
        let created = insert_query(&mut conn, &query).await?;
        self.invalidate(&[created.name.as_str()]);
        info!("Created query '{}' on data source {}", created.name, created.data_source_id);
        Ok(created)
    }

    pub async fn update_query(&self, id: Uuid, patch: UpdateDataSourceQuery) -> Result<DataSourceQuery, ApiError> {
        let mut query = self.get_query(id).await?;
        let old_name = query.name.clone();
        patch.apply(&mut query)?;
        if query.name != old_name {
            self.ensure_query_name_free(&query.name, Some(id)).await?;
        }

        let mut conn = self.pool.acquire().await?;
        let saved = save_query(&mut conn, &query).await?;
        self.invalidate(&[old_name.as_str(), saved.name.as_str()]);
        Ok(saved)
    }

    pub async fn delete_query(&self, id: Uuid) -> Result<(), ApiError> {
        let query = self.get_query(id).await?;
        sqlx::query("DELETE FROM data_source_queries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.invalidate(&[query.name.as_str()]);
        info!("Deleted query '{}'", query.name);
        Ok(())
    }

    // execution

    async fn run(
        &self,
        query: &DataSourceQuery,
        context: BTreeMap<String, String>,
        options: FetchOptions,
    ) -> Result<FetchOutcome, ApiError> {
        let source = self.get_source_row(query.data_source_id).await?;
        Ok(Self::fetcher()?
            .execute(&self.scope, &source, query, context, options)
            .await?)
    }

    pub async fn execute_named(
        &self,
        name: &str,
        context: BTreeMap<String, String>,
        options: FetchOptions,
    ) -> Result<FetchOutcome, ApiError> {
        let query = self.find_query_by_name(name).await?;
        self.run(&query, context, options).await
    }

    pub async fn batch(&self, request: BatchRequest) -> Result<Vec<BatchResult>, ApiError> {
        if request.requests.is_empty() {
            return Err(ApiError::invalid_field("requests", "At least one request is required"));
        }
        if request.requests.len() > MAX_BATCH_SIZE {
            return Err(ApiError::invalid_field(
                "requests",
                format!("At most {} requests per batch", MAX_BATCH_SIZE),
            ));
        }

        let options = FetchOptions { refresh: request.refresh, bypass_cache: false };
        let runs = request.requests.into_iter().map(|item| async move {
            let outcome = self.execute_named(&item.query, item.context, options).await;
            match outcome {
                Ok(data) => BatchResult {
                    query: item.query,
                    success: true,
                    data: Some(data),
                    error: None,
                    code: None,
                },
                Err(e) => BatchResult {
                    query: item.query,
                    success: false,
                    data: None,
                    error: Some(e.message().to_string()),
                    code: Some(e.error_code()),
                },
            }
        });

        Ok(join_all(runs).await)
    }

    /// Runs a query with the given context and never touches the cache
    pub async fn test_query(&self, id: Uuid, request: TestQueryRequest) -> Result<FetchOutcome, ApiError> {
        let query = self.get_query(id).await?;
        let options = FetchOptions { refresh: true, bypass_cache: true };
        self.run(&query, request.context, options).await
    }

    // import

    /// Upserts sources and queries by name in a single transaction
    pub async fn import(&self, file: ImportFile) -> Result<ImportReport, ApiError> {
        let now = Utc::now();
        let mut report = ImportReport::default();
        let mut tx = self.pool.begin().await?;

        for entry in file.sources {
            let (create, queries) = entry.into_parts()?;
            let (mut source, credentials) = create.into_source(now)?;

            let sql = format!("SELECT {} FROM external_data_sources WHERE name = $1 FOR UPDATE", SOURCE_COLUMNS);
            let existing = sqlx::query_as::<_, ExternalDataSource>(&sql)
                .bind(&source.name)
                .fetch_optional(&mut *tx)
                .await?;

            source.encrypted_credentials = match (&credentials, &existing) {
                (Some(creds), _) => Some(Self::encrypt(creds)?),
                (None, _) if source.auth_type == AuthType::None => None,
                (None, Some(current)) => current.encrypted_credentials.clone(),
                (None, None) => None,
            };

            let saved = match existing {
                Some(current) => {
                    source.id = current.id;
                    source.created_at = current.created_at;
                    let saved = save_source(&mut tx, &source).await?;
                    report.sources_updated.push(saved.name.clone());
                    saved
                }
                None => {
                    let saved = insert_source(&mut tx, &source).await?;
                    report.sources_created.push(saved.name.clone());
                    saved
                }
            };

            for entry in queries {
                let mut query = entry.into_create(saved.id).into_query(now)?;

                let sql = format!("SELECT {} FROM data_source_queries WHERE name = $1 FOR UPDATE", QUERY_COLUMNS);
                let existing = sqlx::query_as::<_, DataSourceQuery>(&sql)
                    .bind(&query.name)
                    .fetch_optional(&mut *tx)
                    .await?;

                match existing {
                    Some(current) => {
                        if current.data_source_id != saved.id {
                            warn!("Import moves query '{}' to data source '{}'", query.name, saved.name);
                        }
                        query.id = current.id;
                        query.created_at = current.created_at;
                        save_query(&mut tx, &query).await?;
                        report.queries_updated.push(query.name);
                    }
                    None => {
                        insert_query(&mut tx, &query).await?;
                        report.queries_created.push(query.name);
                    }
                }
            }
        }

        tx.commit().await?;

        let touched: Vec<&str> = report
            .queries_created
            .iter()
            .chain(report.queries_updated.iter())
            .map(String::as_str)
            .collect();
        self.invalidate(&touched);

        info!(
            "Imported {} source(s) and {} query(ies) into tenant '{}'",
            report.sources_created.len() + report.sources_updated.len(),
            touched.len(),
            self.scope.tenant
        );
        Ok(report)
    }
}

/// Query-string variables for a data request; `refresh` is a control flag, not a variable
pub fn context_from_params(params: BTreeMap<String, String>) -> (BTreeMap<String, String>, bool) {
    let mut context = params;
    let refresh = context
        .remove("refresh")
        .is_some_and(|v| matches!(v.as_str(), "true" | "1" | "yes"));
    (context, refresh)
}

async fn insert_source(conn: &mut PgConnection, source: &ExternalDataSource) -> Result<ExternalDataSource, ApiError> {
    let sql = format!(
        "INSERT INTO external_data_sources (id, name, description, base_url, auth_type, encrypted_credentials, \
         default_headers, timeout_secs, is_active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
        SOURCE_COLUMNS
    );
    Ok(sqlx::query_as::<_, ExternalDataSource>(&sql)
        .bind(source.id)
        .bind(&source.name)
        .bind(&source.description)
        .bind(&source.base_url)
        .bind(source.auth_type)
        .bind(&source.encrypted_credentials)
        .bind(&source.default_headers)
        .bind(source.timeout_secs)
        .bind(source.is_active)
        .bind(source.created_at)
        .bind(source.updated_at)
        .fetch_one(conn)
        .await?)
}

async fn save_source(conn: &mut PgConnection, source: &ExternalDataSource) -> Result<ExternalDataSource, ApiError> {
    let sql = format!(
        "UPDATE external_data_sources SET name = $2, description = $3, base_url = $4, auth_type = $5, \
         encrypted_credentials = $6, default_headers = $7, timeout_secs = $8, is_active = $9, updated_at = $10 \
         WHERE id = $1 RETURNING {}",
        SOURCE_COLUMNS
    );
    Ok(sqlx::query_as::<_, ExternalDataSource>(&sql)
        .bind(source.id)
        .bind(&source.name)
        .bind(&source.description)
        .bind(&source.base_url)
        .bind(source.auth_type)
        .bind(&source.encrypted_credentials)
        .bind(&source.default_headers)
        .bind(source.timeout_secs)
        .bind(source.is_active)
        .bind(source.updated_at)
        .fetch_one(conn)
        .await?)
}

async fn insert_query(conn: &mut PgConnection, query: &DataSourceQuery) -> Result<DataSourceQuery, ApiError> {
    let sql = format!(
        "INSERT INTO data_source_queries (id, data_source_id, name, description, http_method, endpoint, \
         query_params, body_template, json_path, expected_type, cache_ttl_secs, is_active, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING {}",
        QUERY_COLUMNS
    );
    Ok(sqlx::query_as::<_, DataSourceQuery>(&sql)
        .bind(query.id)
        .bind(query.data_source_id)
        .bind(&query.name)
        .bind(&query.description)
        .bind(query.http_method)
        .bind(&query.endpoint)
        .bind(&query.query_params)
        .bind(&query.body_template)
        .bind(&query.json_path)
        .bind(query.expected_type)
        .bind(query.cache_ttl_secs)
        .bind(query.is_active)
        .bind(query.created_at)
        .bind(query.updated_at)
        .fetch_one(conn)
        .await?)
}

async fn save_query(conn: &mut PgConnection, query: &DataSourceQuery) -> Result<DataSourceQuery, ApiError> {
    let sql = format!(
        "UPDATE data_source_queries SET data_source_id = $2, name = $3, description = $4, http_method = $5, \
         endpoint = $6, query_params = $7, body_template = $8, json_path = $9, expected_type = $10, \
         cache_ttl_secs = $11, is_active = $12, updated_at = $13 WHERE id = $1 RETURNING {}",
        QUERY_COLUMNS
    );
    Ok(sqlx::query_as::<_, DataSourceQuery>(&sql)
        .bind(query.id)
        .bind(query.data_source_id)
        .bind(&query.name)
        .bind(&query.description)
        .bind(query.http_method)
        .bind(&query.endpoint)
        .bind(&query.query_params)
        .bind(&query.body_template)
        .bind(&query.json_path)
        .bind(query.expected_type)
        .bind(query.cache_ttl_secs)
        .bind(query.is_active)
        .bind(query.updated_at)
        .fetch_one(conn)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_flag_is_not_a_template_variable() {
        let mut params = BTreeMap::new();
        params.insert("project".to_string(), "SOC".to_string());
        params.insert("refresh".to_string(), "true".to_string());

        let (context, refresh) = context_from_params(params);
        assert!(refresh);
        assert_eq!(context.len(), 1);
        assert_eq!(context["project"], "SOC");

        let (_, refresh) = context_from_params(BTreeMap::new());
        assert!(!refresh);
    }

    #[test]
    fn batch_results_serialize_compactly() {
        let failed = BatchResult {
            query: "open_tickets".to_string(),
            success: false,
            data: None,
            error: Some("Query 'open_tickets' not found".to_string()),
            code: Some("NOT_FOUND"),
        };
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["code"], "NOT_FOUND");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn batch_request_context_defaults_to_empty() {
        let request: BatchRequest = serde_json::from_value(serde_json::json!({
            "requests": [{ "query": "open_tickets" }, { "query": "sla", "context": { "project": "SOC" } }]
        }))
        .unwrap();
        assert!(request.requests[0].context.is_empty());
        assert_eq!(request.requests[1].context["project"], "SOC");
        assert!(!request.refresh);
        let report = serde_json::to_value(ImportReport::default()).unwrap();
        assert_eq!(report["sources_created"], serde_json::json!([]));
    }
}
