use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;
use crate::integrations::json_path::JsonPath;
use crate::integrations::template;
use crate::validation::{double_option, optional_text, required_text, validate_http_url};

const MAX_TIMEOUT_SECS: i32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "data_source_auth", rename_all = "snake_case")]
pub enum AuthType {
    None,
    Basic,
    Bearer,
    ApiKey,
}

/// Decrypted credential material, stored as encrypted JSON
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer { token: String },
    ApiKey { header: String, key: String },
}

// never print secrets
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { username, .. } => write!(f, "Basic({}, ***)", username),
            Credentials::Bearer { .. } => f.write_str("Bearer(***)"),
            Credentials::ApiKey { header, .. } => write!(f, "ApiKey({}: ***)", header),
        }
    }
}

impl Credentials {
    /// Reads the request shape for `auth_type` (without the `type` tag)
    pub fn from_request(auth_type: AuthType, value: &Value) -> Result<Option<Credentials>, ApiError> {
        let field = |name: &str| -> Result<String, ApiError> {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ApiError::invalid_field("credentials", format!("'{}' is required", name)))
        };

        let creds = match auth_type {
            AuthType::None => return Ok(None),
            AuthType::Basic => Credentials::Basic {
                username: field("username")?,
                password: field("password")?,
            },
            AuthType::Bearer => Credentials::Bearer { token: field("token")? },
            AuthType::ApiKey => {
                let header = field("header")?;
                reqwest::header::HeaderName::from_bytes(header.as_bytes())
                    .map_err(|_| ApiError::invalid_field("credentials", "'header' is not a valid header name"))?;
                Credentials::ApiKey { header, key: field("key")? }
            }
        };
        Ok(Some(creds))
    }

    pub fn auth_type(&self) -> AuthType {
        match self {
            Credentials::Basic { .. } => AuthType::Basic,
            Credentials::Bearer { .. } => AuthType::Bearer,
            Credentials::ApiKey { .. } => AuthType::ApiKey,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ExternalDataSource {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub base_url: String,
    pub auth_type: AuthType,
    pub encrypted_credentials: Option<String>,
    pub default_headers: Value,
    pub timeout_secs: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response shape for a data source; credentials never leave the server
#[derive(Debug, Clone, Serialize)]
pub struct DataSourceView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub base_url: String,
    pub auth_type: AuthType,
    pub has_credentials: bool,
    pub default_headers: Value,
    pub timeout_secs: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ExternalDataSource> for DataSourceView {
    fn from(source: ExternalDataSource) -> Self {
        Self {
            id: source.id,
            has_credentials: source.encrypted_credentials.is_some(),
            name: source.name,
            description: source.description,
            base_url: source.base_url,
            auth_type: source.auth_type,
            default_headers: source.default_headers,
            timeout_secs: source.timeout_secs,
            is_active: source.is_active,
            created_at: source.created_at,
            updated_at: source.updated_at,
        }
    }
}

fn validate_headers(value: &Value) -> Result<(), ApiError> {
    let map = value
        .as_object()
        .ok_or_else(|| ApiError::invalid_field("default_headers", "Must be a JSON object"))?;
    for (name, v) in map {
        if reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(ApiError::invalid_field("default_headers", format!("'{}' is not a valid header name", name)));
        }
        if !v.is_string() {
            return Err(ApiError::invalid_field("default_headers", format!("Header '{}' must be a string", name)));
        }
    }
    Ok(())
}

fn validate_timeout(secs: i32) -> Result<(), ApiError> {
    if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
        return Err(ApiError::invalid_field(
            "timeout_secs",
            format!("Must be between 1 and {}", MAX_TIMEOUT_SECS),
        ));
    }
    Ok(())
}

/// Names are used in URLs and cache keys
fn validate_name(field: &str, name: &str) -> Result<String, ApiError> {
    let name = required_text(field, name, 100)?;
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
        return Err(ApiError::invalid_field(field, "Only letters, digits, '_', '-' and '.' are allowed"));
    }
    Ok(name)
}

fn normalize_base_url(value: &str) -> Result<String, ApiError> {
    let url = validate_http_url("base_url", value)?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDataSource {
    pub name: String,
    pub description: Option<String>,
    pub base_url: String,
    pub auth_type: Option<AuthType>,
    pub credentials: Option<Value>,
    pub default_headers: Option<Value>,
    pub timeout_secs: Option<i32>,
    pub is_active: Option<bool>,
}

impl CreateDataSource {
    /// Validated row plus the credentials still to be encrypted
    pub fn into_source(self, now: DateTime<Utc>) -> Result<(ExternalDataSource, Option<Credentials>), ApiError> {
        let auth_type = self.auth_type.unwrap_or(AuthType::None);
        let credentials = match &self.credentials {
            Some(value) => Credentials::from_request(auth_type, value)?,
            None if auth_type != AuthType::None => {
                return Err(ApiError::invalid_field("credentials", "Required for this auth type"));
            }
            None => None,
        };

        let default_headers = self.default_headers.unwrap_or_else(|| Value::Object(Map::new()));
        validate_headers(&default_headers)?;
        let timeout_secs = self.timeout_secs.unwrap_or(30);
        validate_timeout(timeout_secs)?;

        let source = ExternalDataSource {
            id: Uuid::new_v4(),
            name: validate_name("name", &self.name)?,
            description: optional_text(self.description),
            base_url: normalize_base_url(&self.base_url)?,
            auth_type,
            encrypted_credentials: None,
            default_headers,
            timeout_secs,
            is_active: self.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        Ok((source, credentials))
    }
}

/// Outcome of a credential patch
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialChange {
    Keep,
    Clear,
    Replace(Credentials),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDataSource {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub base_url: Option<String>,
    pub auth_type: Option<AuthType>,
    #[serde(default, deserialize_with = "double_option")]
    pub credentials: Option<Option<Value>>,
    pub default_headers: Option<Value>,
    pub timeout_secs: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateDataSource {
    pub fn apply(self, source: &mut ExternalDataSource) -> Result<CredentialChange, ApiError> {
        if let Some(name) = self.name {
            source.name = validate_name("name", &name)?;
        }
        if let Some(v) = self.description {
            source.description = optional_text(v);
        }
        if let Some(url) = self.base_url {
            source.base_url = normalize_base_url(&url)?;
        }
        if let Some(headers) = self.default_headers {
            validate_headers(&headers)?;
            source.default_headers = headers;
        }
        if let Some(secs) = self.timeout_secs {
            validate_timeout(secs)?;
            source.timeout_secs = secs;
        }
        if let Some(active) = self.is_active {
            source.is_active = active;
        }

        let auth_changed = self.auth_type.is_some_and(|t| t != source.auth_type);
        if let Some(t) = self.auth_type {
            source.auth_type = t;
        }

        let change = match self.credentials {
            Some(Some(value)) => match Credentials::from_request(source.auth_type, &value)? {
                Some(creds) => CredentialChange::Replace(creds),
                None => CredentialChange::Clear,
            },
            Some(None) => CredentialChange::Clear,
            None if auth_changed && source.auth_type == AuthType::None => CredentialChange::Clear,
            None if auth_changed => {
                return Err(ApiError::invalid_field("credentials", "New credentials are required when changing auth type"));
            }
            None => CredentialChange::Keep,
        };

        if change == CredentialChange::Clear && source.auth_type != AuthType::None {
            return Err(ApiError::invalid_field("credentials", "Required for this auth type"));
        }

        source.updated_at = Utc::now();
        Ok(change)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "query_method", rename_all = "UPPERCASE")]
pub enum QueryMethod {
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "put")]
    Put,
}

impl QueryMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            QueryMethod::Get => reqwest::Method::GET,
            QueryMethod::Post => reqwest::Method::POST,
            QueryMethod::Put => reqwest::Method::PUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "expected_type", rename_all = "snake_case")]
pub enum ExpectedType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl std::fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExpectedType::String => "string",
            ExpectedType::Number => "number",
            ExpectedType::Boolean => "boolean",
            ExpectedType::Object => "object",
            ExpectedType::Array => "array",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DataSourceQuery {
    pub id: Uuid,
    pub data_source_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub http_method: QueryMethod,
    pub endpoint: String,
    pub query_params: Value,
    pub body_template: Option<String>,
    pub json_path: String,
    pub expected_type: ExpectedType,
    pub cache_ttl_secs: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataSourceQuery {
    fn validate(&self) -> Result<(), ApiError> {
        template::placeholders(&self.endpoint).map_err(|e| ApiError::invalid_field("endpoint", e.to_string()))?;

        let params = self
            .query_params
            .as_object()
            .ok_or_else(|| ApiError::invalid_field("query_params", "Must be a JSON object"))?;
        for (name, v) in params {
            let text = v
                .as_str()
                .ok_or_else(|| ApiError::invalid_field("query_params", format!("'{}' must be a string", name)))?;
            template::placeholders(text).map_err(|e| ApiError::invalid_field("query_params", e.to_string()))?;
        }

        if let Some(body) = &self.body_template {
            if self.http_method == QueryMethod::Get {
                return Err(ApiError::invalid_field("body_template", "GET queries cannot carry a body"));
            }
            template::placeholders(body).map_err(|e| ApiError::invalid_field("body_template", e.to_string()))?;
        }

        JsonPath::parse(&self.json_path).map_err(|e| ApiError::invalid_field("json_path", e.to_string()))?;

        if self.cache_ttl_secs < 0 {
            return Err(ApiError::invalid_field("cache_ttl_secs", "Cannot be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDataSourceQuery {
    pub data_source_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub http_method: Option<QueryMethod>,
    pub endpoint: String,
    pub query_params: Option<Value>,
    pub body_template: Option<String>,
    pub json_path: Option<String>,
    pub expected_type: Option<ExpectedType>,
    pub cache_ttl_secs: Option<i32>,
    pub is_active: Option<bool>,
}

impl CreateDataSourceQuery {
    pub fn into_query(self, now: DateTime<Utc>) -> Result<DataSourceQuery, ApiError> {
        let query = DataSourceQuery {
            id: Uuid::new_v4(),
            data_source_id: self.data_source_id,
            name: validate_name("name", &self.name)?,
            description: optional_text(self.description),
            http_method: self.http_method.unwrap_or(QueryMethod::Get),
            endpoint: required_text("endpoint", &self.endpoint, 2000)?,
            query_params: self.query_params.unwrap_or_else(|| Value::Object(Map::new())),
            body_template: optional_text(self.body_template),
            json_path: optional_text(self.json_path).unwrap_or_else(|| "$".to_string()),
            expected_type: self.expected_type.unwrap_or(ExpectedType::Object),
            cache_ttl_secs: self.cache_ttl_secs.unwrap_or(0),
            is_active: self.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        query.validate()?;
        Ok(query)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDataSourceQuery {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub http_method: Option<QueryMethod>,
    pub endpoint: Option<String>,
    pub query_params: Option<Value>,
    #[serde(default, deserialize_with = "double_option")]
    pub body_template: Option<Option<String>>,
    pub json_path: Option<String>,
    pub expected_type: Option<ExpectedType>,
    pub cache_ttl_secs: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateDataSourceQuery {
    pub fn apply(self, query: &mut DataSourceQuery) -> Result<(), ApiError> {
        if let Some(name) = self.name {
            query.name = validate_name("name", &name)?;
        }
        if let Some(v) = self.description {
            query.description = optional_text(v);
        }
        if let Some(m) = self.http_method {
            query.http_method = m;
        }
        if let Some(endpoint) = self.endpoint {
            query.endpoint = required_text("endpoint", &endpoint, 2000)?;
        }
        if let Some(params) = self.query_params {
            query.query_params = params;
        }
        if let Some(v) = self.body_template {
            query.body_template = optional_text(v);
        }
        if let Some(path) = self.json_path {
            query.json_path = optional_text(Some(path)).unwrap_or_else(|| "$".to_string());
        }
        if let Some(t) = self.expected_type {
            query.expected_type = t;
        }
        if let Some(ttl) = self.cache_ttl_secs {
            query.cache_ttl_secs = ttl;
        }
        if let Some(active) = self.is_active {
            query.is_active = active;
        }
        query.validate()?;
        query.updated_at = Utc::now();
        Ok(())
    }
}
