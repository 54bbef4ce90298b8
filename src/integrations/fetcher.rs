use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::cache::{cache_key, CachedValue, QueryCache};
use super::coerce::coerce;
use super::crypto::{self, CredentialEncryptor};
use super::json_path::JsonPath;
use super::template::{self, Escape};
use super::transport::{send_with_retry, HttpRequest, HttpTransport, ReqwestTransport, RetryPolicy};
use crate::config;
use crate::database::models::integration::Credentials;
use crate::database::models::{AuthType, DataSourceQuery, ExpectedType, ExternalDataSource};

const BODY_EXCERPT: usize = 200;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Missing template variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0} is inactive")]
    Inactive(String),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream request failed: {0}")]
    Transport(String),

    #[error("Upstream response is not valid JSON: {0}")]
    InvalidResponse(String),

    #[error("JSONPath '{0}' matched nothing")]
    PathNotFound(String),

    #[error("Expected {expected} but found {found}")]
    Coercion { expected: ExpectedType, found: String },
}

/// Who is asking; scopes the cache and feeds the `tenant` variable
#[derive(Debug, Clone)]
pub struct TenantScope {
    pub tenant: String,
    pub database: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Skip the cache read; a fresh result is still stored
    pub refresh: bool,
    /// Never read or write the cache
    pub bypass_cache: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub query: String,
    pub value: Value,
    pub expected_type: ExpectedType,
    pub cached: bool,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceTestResult {
    pub reachable: bool,
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

pub struct DataFetcher {
    transport: Arc<dyn HttpTransport>,
    encryptor: Arc<dyn CredentialEncryptor>,
    cache: QueryCache,
    policy: RetryPolicy,
    default_timeout: Duration,
    max_cache_ttl: Duration,
}

static FETCHER: OnceCell<DataFetcher> = OnceCell::new();

impl DataFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        encryptor: Arc<dyn CredentialEncryptor>,
        cache_capacity: u64,
        policy: RetryPolicy,
        default_timeout: Duration,
        max_cache_ttl: Duration,
    ) -> Self {
        Self {
            transport,
            encryptor,
            cache: QueryCache::new(cache_capacity),
            policy,
            default_timeout,
            max_cache_ttl,
        }
    }

    /// Process-wide fetcher built from configuration
    pub fn shared() -> Result<&'static DataFetcher, FetchError> {
        FETCHER.get_or_try_init(|| {
            let cfg = &config::config().integrations;
            let transport = ReqwestTransport::new().map_err(|e| FetchError::Transport(e.to_string()))?;
            let encryptor = crypto::encryptor().map_err(|e| FetchError::Credentials(e.to_string()))?;
            info!(
                "Data fetcher ready (timeout {}s, {} retries, cache capacity {})",
                cfg.http_timeout_secs, cfg.max_retries, cfg.cache_capacity
            );
            Ok(DataFetcher::new(
                Arc::new(transport),
                encryptor,
                cfg.cache_capacity,
                RetryPolicy {
                    max_retries: cfg.max_retries,
                    backoff: Duration::from_millis(cfg.retry_backoff_ms),
                },
                Duration::from_secs(cfg.http_timeout_secs),
                Duration::from_secs(cfg.max_cache_ttl_secs),
            ))
        })
    }

    pub fn encryptor(&self) -> &dyn CredentialEncryptor {
        self.encryptor.as_ref()
    }

    /// Runs one query end to end
    pub async fn execute(
        &self,
        scope: &TenantScope,
        source: &ExternalDataSource,
        query: &DataSourceQuery,
        context: BTreeMap<String, String>,
        options: FetchOptions,
    ) -> Result<FetchOutcome, FetchError> {
        if !query.is_active {
            return Err(FetchError::Inactive(format!("Query '{}'", query.name)));
        }
        if !source.is_active {
            return Err(FetchError::Inactive(format!("Data source '{}'", source.name)));
        }

        let ttl = self.effective_ttl(query);
        let use_cache = !options.bypass_cache && !ttl.is_zero();
        let vars = Self::variables(scope, &context);
        let key = cache_key(&scope.database, &query.name, &Self::cache_context(query, &context, &vars)?);

        if use_cache && !options.refresh {
            if let Some(hit) = self.cache.get(&key).await {
                return Ok(FetchOutcome {
                    query: query.name.clone(),
                    value: hit.value,
                    expected_type: query.expected_type,
                    cached: true,
                    fetched_at: hit.fetched_at,
                });
            }
        }

        let request = self.render_request(source, query, &vars)?;
        debug!("Fetching query '{}' via {} {}", query.name, request.method, request.url.path());

        let response = send_with_retry(self.transport.as_ref(), &request, self.policy)
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !response.is_success() {
            warn!("Query '{}' upstream returned {}", query.name, response.status);
            return Err(FetchError::Upstream {
                status: response.status,
                body: excerpt(&response.body),
            });
        }

        let document: Value =
            serde_json::from_str(&response.body).map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
        let path = JsonPath::parse(&query.json_path)?;
        let value = coerce(path.evaluate(&document)?, query.expected_type)?;
        let fetched_at = Utc::now();

        if use_cache {
            self.cache
                .insert(key, CachedValue { value: value.clone(), fetched_at, ttl })
                .await;
        }

        Ok(FetchOutcome {
            query: query.name.clone(),
            value,
            expected_type: query.expected_type,
            cached: false,
            fetched_at,
        })
    }

    /// Single unauthenticated-retry GET against the source base URL
    pub async fn test_source(&self, source: &ExternalDataSource) -> Result<SourceTestResult, FetchError> {
        let url = url::Url::parse(&source.base_url).map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        let request = HttpRequest {
            method: reqwest::Method::GET,
            url,
            headers: self.headers_for(source)?,
            body: None,
            timeout: self.timeout_for(source),
        };

        let started = Instant::now();
        let result = self.transport.send(&request).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(match result {
            Ok(response) => SourceTestResult {
                reachable: response.is_success(),
                status: Some(response.status),
                latency_ms,
                error: (!response.is_success()).then(|| excerpt(&response.body)),
            },
            Err(e) => SourceTestResult {
                reachable: false,
                status: None,
                latency_ms,
                error: Some(e.to_string()),
            },
        })
    }

    pub fn invalidate_query(&self, tenant_db: &str, query_name: &str) {
        self.cache.invalidate_query(tenant_db, query_name);
    }

    fn effective_ttl(&self, query: &DataSourceQuery) -> Duration {
        let secs = u64::try_from(query.cache_ttl_secs).unwrap_or(0);
        Duration::from_secs(secs).min(self.max_cache_ttl)
    }

    fn timeout_for(&self, source: &ExternalDataSource) -> Duration {
        match u64::try_from(source.timeout_secs) {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => self.default_timeout,
        }
    }

    /// Context plus `today`, `now` and `tenant` unless the caller set them
    fn variables(scope: &TenantScope, context: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let now = Utc::now();
        let mut vars = BTreeMap::new();
        vars.insert("today".to_string(), now.format("%Y-%m-%d").to_string());
        vars.insert("now".to_string(), now.to_rfc3339());
        vars.insert("tenant".to_string(), scope.tenant.clone());
        vars.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars
    }

    /// Caller context plus the built-in date variables the query's templates use, so a
    /// `{{today}}` query never serves yesterday's result. `tenant` is already in the key.
    fn cache_context(
        query: &DataSourceQuery,
        context: &BTreeMap<String, String>,
        vars: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, FetchError> {
        let mut used = template::placeholders(&query.endpoint)?;
        if let Some(params) = query.query_params.as_object() {
            for text in params.values().filter_map(Value::as_str) {
                used.extend(template::placeholders(text)?);
            }
        }
        if let Some(body) = &query.body_template {
            used.extend(template::placeholders(body)?);
        }

        let mut keyed = context.clone();
        for name in ["today", "now"] {
            if context.contains_key(name) || !used.iter().any(|u| u == name) {
                continue;
            }
            if let Some(value) = vars.get(name) {
                keyed.insert(name.to_string(), value.clone());
            }
        }
        Ok(keyed)
    }

    pub fn build_request(
        &self,
        scope: &TenantScope,
        source: &ExternalDataSource,
        query: &DataSourceQuery,
        context: &BTreeMap<String, String>,
    ) -> Result<HttpRequest, FetchError> {
        self.render_request(source, query, &Self::variables(scope, context))
    }

    fn render_request(
        &self,
        source: &ExternalDataSource,
        query: &DataSourceQuery,
        vars: &BTreeMap<String, String>,
    ) -> Result<HttpRequest, FetchError> {
        // report every missing variable at once, across all templates
        let mut missing = template::missing(&query.endpoint, vars)?;
        let params = query.query_params.as_object().cloned().unwrap_or_default();
        for value in params.values() {
            if let Some(text) = value.as_str() {
                missing.extend(template::missing(text, vars)?);
            }
        }
        if let Some(body) = &query.body_template {
            missing.extend(template::missing(body, vars)?);
        }
        if !missing.is_empty() {
            return Err(FetchError::MissingVariables(missing.into_iter().collect()));
        }

        let endpoint = template::render(&query.endpoint, vars, Escape::PathSegment)?;
        let mut url = join_url(&source.base_url, &endpoint)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &params {
                let text = value
                    .as_str()
                    .ok_or_else(|| FetchError::InvalidRequest(format!("Query parameter '{}' must be a string", name)))?;
                pairs.append_pair(name, &template::render(text, vars, Escape::Raw)?);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let body = match &query.body_template {
            Some(body) => {
                let rendered = template::render(body, vars, Escape::Json)?;
                serde_json::from_str::<Value>(&rendered)
                    .map_err(|e| FetchError::InvalidTemplate(format!("Rendered body is not valid JSON: {}", e)))?;
                Some(rendered)
            }
            None => None,
        };

        Ok(HttpRequest {
            method: query.http_method.as_reqwest(),
            url,
            headers: self.headers_for(source)?,
            body,
            timeout: self.timeout_for(source),
        })
    }

    fn headers_for(&self, source: &ExternalDataSource) -> Result<Vec<(String, String)>, FetchError> {
        let mut headers: Vec<(String, String)> = source
            .default_headers
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(auth) = self.auth_header(source)? {
            headers.push(auth);
        }
        Ok(headers)
    }

    fn auth_header(&self, source: &ExternalDataSource) -> Result<Option<(String, String)>, FetchError> {
        if source.auth_type == AuthType::None {
            return Ok(None);
        }

        let ciphertext = source
            .encrypted_credentials
            .as_deref()
            .ok_or_else(|| FetchError::Credentials(format!("Data source '{}' has no credentials", source.name)))?;
        let plaintext = self
            .encryptor
            .decrypt(ciphertext)
            .map_err(|e| FetchError::Credentials(e.to_string()))?;
        let credentials: Credentials = serde_json::from_str(&plaintext)
            .map_err(|_| FetchError::Credentials(format!("Stored credentials for '{}' are malformed", source.name)))?;

        if credentials.auth_type() != source.auth_type {
            return Err(FetchError::Credentials(format!(
                "Stored credentials for '{}' do not match its auth type",
                source.name
            )));
        }

        let header = match credentials {
            Credentials::Basic { username, password } => (
                "Authorization".to_string(),
                format!("Basic {}", BASE64.encode(format!("{}:{}", username, password))),
            ),
            Credentials::Bearer { token } => ("Authorization".to_string(), format!("Bearer {}", token)),
            Credentials::ApiKey { header, key } => (header, key),
        };
        Ok(Some(header))
    }
}

fn join_url(base: &str, endpoint: &str) -> Result<url::Url, FetchError> {
    let base_url = url::Url::parse(base).map_err(|e| FetchError::InvalidRequest(format!("Invalid base URL: {}", e)))?;
    let joined = format!("{}/{}", base.trim_end_matches('/'), endpoint.trim_start_matches('/'));
    let url = url::Url::parse(&joined).map_err(|e| FetchError::InvalidRequest(format!("Invalid endpoint: {}", e)))?;

    if url.origin() != base_url.origin() {
        return Err(FetchError::InvalidRequest("Endpoint must stay on the data source host".to_string()));
    }
    Ok(url)
}

fn excerpt(body: &str) -> String {
    let mut text: String = body.chars().take(BODY_EXCERPT).collect();
    if body.chars().count() > BODY_EXCERPT {
        text.push('…');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::QueryMethod;
    use crate::integrations::crypto::PlaintextEncryptor;
    use crate::integrations::transport::mock::MockTransport;
    use crate::integrations::transport::TransportError;
    use serde_json::json;
    use uuid::Uuid;

    fn scope(database: &str) -> TenantScope {
        TenantScope { tenant: "acme".to_string(), database: database.to_string() }
    }

    fn source(auth_type: AuthType, credentials: Option<&str>) -> ExternalDataSource {
        ExternalDataSource {
            id: Uuid::new_v4(),
            name: "jira".to_string(),
            description: None,
            base_url: "https://jira.example.com".to_string(),
            auth_type,
            encrypted_credentials: credentials.map(str::to_string),
            default_headers: json!({ "Accept": "application/json" }),
            timeout_secs: 10,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn query(ttl: i32) -> DataSourceQuery {
        DataSourceQuery {
            id: Uuid::new_v4(),
            data_source_id: Uuid::new_v4(),
            name: "open_tickets".to_string(),
            description: None,
            http_method: QueryMethod::Get,
            endpoint: "/rest/api/2/project/{{project}}/search".to_string(),
            query_params: json!({ "jql": "status = Open AND created >= {{since}}" }),
            body_template: None,
            json_path: "$.total".to_string(),
            expected_type: ExpectedType::Number,
            cache_ttl_secs: ttl,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn context() -> BTreeMap<String, String> {
        [("project", "SOC ops"), ("since", "2025-01-01")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fetcher(transport: Arc<MockTransport>) -> DataFetcher {
        DataFetcher::new(
            transport,
            Arc::new(PlaintextEncryptor),
            100,
            RetryPolicy { max_retries: 2, backoff: Duration::from_millis(1) },
            Duration::from_secs(30),
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn builds_url_and_extracts_value() {
        let transport = Arc::new(MockTransport::new(vec![MockTransport::ok(200, r#"{"total": "17"}"#)]));
        let fetcher = fetcher(transport.clone());

        let outcome = fetcher
            .execute(&scope("tenant_a"), &source(AuthType::None, None), &query(0), context(), FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.value, json!(17));
        assert!(!outcome.cached);

        let sent = &transport.requests()[0];
        assert_eq!(sent.url.path(), "/rest/api/2/project/SOC%20ops/search");
        let jql: Vec<(String, String)> = sent.url.query_pairs().into_owned().collect();
        assert_eq!(jql, vec![("jql".to_string(), "status = Open AND created >= 2025-01-01".to_string())]);
        assert!(sent.headers.contains(&("Accept".to_string(), "application/json".to_string())));
        assert_eq!(sent.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_variables_fail_before_any_request() {
        let transport = Arc::new(MockTransport::new(vec![]));
        let fetcher = fetcher(transport.clone());
        let err = fetcher
            .execute(
                &scope("tenant_a"),
                &source(AuthType::None, None),
                &query(0),
                BTreeMap::new(),
                FetchOptions::default(),
            )
            .await
            .unwrap_err();
        match err {
            FetchError::MissingVariables(names) => assert_eq!(names, vec!["project", "since"]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn cache_hits_then_refresh_bypasses() {
        let transport = Arc::new(MockTransport::new(vec![
            MockTransport::ok(200, r#"{"total": 1}"#),
            MockTransport::ok(200, r#"{"total": 2}"#),
        ]));
        let fetcher = fetcher(transport.clone());
        let (scope, source, query) = (scope("tenant_a"), source(AuthType::None, None), query(60));

        let first = fetcher.execute(&scope, &source, &query, context(), FetchOptions::default()).await.unwrap();
        let second = fetcher.execute(&scope, &source, &query, context(), FetchOptions::default()).await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.value, json!(1));
        assert_eq!(transport.requests().len(), 1);

        let refreshed = fetcher
            .execute(&scope, &source, &query, context(), FetchOptions { refresh: true, bypass_cache: false })
            .await
            .unwrap();
        assert!(!refreshed.cached);
        assert_eq!(refreshed.value, json!(2));
    }

    #[test]
    fn date_builtins_are_keyed_only_when_used() {
        let day = |today: &str| -> BTreeMap<String, String> {
            [("today", today), ("now", "2026-10-14T08:00:00+00:00"), ("tenant", "acme")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };

        let mut dated = query(60);
        dated.query_params = json!({ "jql": "created >= {{since}} AND created < {{today}}" });
        let monday = DataFetcher::cache_context(&dated, &context(), &day("2026-10-12")).unwrap();
        let tuesday = DataFetcher::cache_context(&dated, &context(), &day("2026-10-13")).unwrap();
        assert_eq!(monday.get("today").map(String::as_str), Some("2026-10-12"));
        assert!(!monday.contains_key("now"));
        assert_ne!(
            cache_key("tenant_a", &dated.name, &monday),
            cache_key("tenant_a", &dated.name, &tuesday)
        );

        let undated = DataFetcher::cache_context(&query(60), &context(), &day("2026-10-12")).unwrap();
        assert_eq!(undated, context());
    }

    #[tokio::test]
    async fn cache_is_per_tenant() {
        let transport = Arc::new(MockTransport::new(vec![
            MockTransport::ok(200, r#"{"total": 1}"#),
            MockTransport::ok(200, r#"{"total": 2}"#),
        ]));
        let fetcher = fetcher(transport.clone());
        let (source, query) = (source(AuthType::None, None), query(60));

        fetcher.execute(&scope("tenant_a"), &source, &query, context(), FetchOptions::default()).await.unwrap();
        let other = fetcher
            .execute(&scope("tenant_b"), &source, &query, context(), FetchOptions::default())
            .await
            .unwrap();
        assert!(!other.cached);
        assert_eq!(other.value, json!(2));
    }

    #[tokio::test]
    async fn upstream_errors_carry_status() {
        let transport = Arc::new(MockTransport::new(vec![MockTransport::ok(401, "bad token")]));
        let err = fetcher(transport)
            .execute(&scope("tenant_a"), &source(AuthType::None, None), &query(0), context(), FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Upstream { status: 401, .. }));
    }

    #[tokio::test]
    async fn transport_failures_surface_after_retries() {
        let transport = Arc::new(MockTransport::new(vec![
            Err(TransportError::Connect("refused".to_string())),
            Err(TransportError::Connect("refused".to_string())),
            Err(TransportError::Connect("refused".to_string())),
        ]));
        let err = fetcher(transport.clone())
            .execute(&scope("tenant_a"), &source(AuthType::None, None), &query(0), context(), FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn coercion_failure_is_reported() {
        let transport = Arc::new(MockTransport::new(vec![MockTransport::ok(200, r#"{"total": null}"#)]));
        let err = fetcher(transport)
            .execute(&scope("tenant_a"), &source(AuthType::None, None), &query(0), context(), FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Coercion { expected: ExpectedType::Number, .. }));
    }

    #[tokio::test]
    async fn inactive_query_is_rejected() {
        let transport = Arc::new(MockTransport::new(vec![]));
        let mut q = query(0);
        q.is_active = false;
        let err = fetcher(transport)
            .execute(&scope("tenant_a"), &source(AuthType::None, None), &q, context(), FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Inactive(_)));
    }

    #[test]
    fn credentials_become_auth_headers() {
        let fetcher = fetcher(Arc::new(MockTransport::new(vec![])));
        let basic = source(AuthType::Basic, Some(r#"{"type":"basic","username":"svc","password":"pw"}"#));
        let header = fetcher.auth_header(&basic).unwrap().unwrap();
        assert_eq!(header, ("Authorization".to_string(), format!("Basic {}", BASE64.encode("svc:pw"))));

        let api_key = source(AuthType::ApiKey, Some(r#"{"type":"api_key","header":"X-Api-Key","key":"k1"}"#));
        assert_eq!(fetcher.auth_header(&api_key).unwrap().unwrap(), ("X-Api-Key".to_string(), "k1".to_string()));

        let mismatched = source(AuthType::Bearer, Some(r#"{"type":"basic","username":"svc","password":"pw"}"#));
        assert!(matches!(fetcher.auth_header(&mismatched), Err(FetchError::Credentials(_))));
    }

    #[test]
    fn body_values_are_json_escaped() {
        let fetcher = fetcher(Arc::new(MockTransport::new(vec![])));
        let mut q = query(0);
        q.http_method = QueryMethod::Post;
        q.endpoint = "/rest/api/2/search".to_string();
        q.query_params = json!({});
        q.body_template = Some(r#"{"jql": "project = \"{{project}}\"", "tenant": "{{tenant}}"}"#.to_string());

        let mut ctx = BTreeMap::new();
        ctx.insert("project".to_string(), "a\"b".to_string());
        let request = fetcher.build_request(&scope("tenant_a"), &source(AuthType::None, None), &q, &ctx).unwrap();

        let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["jql"], "project = \"a\"b\"");
        assert_eq!(body["tenant"], "acme");
        assert!(request.url.query().is_none());
    }

    #[test]
    fn endpoints_join_under_the_base_path() {
        let url = join_url("https://jira.example.com:8443/jira/", "/rest/api/2").unwrap();
        assert_eq!(url.as_str(), "https://jira.example.com:8443/jira/rest/api/2");
        let url = join_url("https://jira.example.com", "x@evil.example.net/").unwrap();
        assert_eq!(url.host_str(), Some("jira.example.com"));
    }
}
