//! YAML definitions of data sources and their queries, for `mssp integrations import`.
//!
//! ```yaml
//! sources:
//!   - name: jira
//!     base_url: https://acme.atlassian.net
//!     auth_type: basic
//!     credentials: { username: svc-dashboard, password: "${JIRA_TOKEN}" }
//!     queries:
//!       - name: open_tickets
//!         endpoint: /rest/api/2/search
//!         query_params: { jql: "project = {{project}} AND status = Open" }
//!         json_path: $.total
//!         expected_type: number
//!         cache_ttl_secs: 300
//! ```
//!
//! `${VAR}` in credential values is read from the environment at import time.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::database::models::integration::{CreateDataSource, CreateDataSourceQuery};
use crate::database::models::{AuthType, ExpectedType, QueryMethod};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Environment variable '{0}' referenced by source '{1}' is not set")]
    MissingEnv(String, String),

    #[error("Duplicate {0} name '{1}' in import file")]
    Duplicate(&'static str, String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportFile {
    #[serde(default)]
    pub sources: Vec<ImportSource>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportSource {
    pub name: String,
    pub description: Option<String>,
    pub base_url: String,
    pub auth_type: Option<AuthType>,
    pub credentials: Option<Value>,
    pub default_headers: Option<Value>,
    pub timeout_secs: Option<i32>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub queries: Vec<ImportQuery>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportQuery {
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

pub fn parse(yaml: &str) -> Result<ImportFile, ImportError> {
    let file: ImportFile = serde_yaml::from_str(yaml)?;

    let mut source_names = std::collections::HashSet::new();
    let mut query_names = std::collections::HashSet::new();
    for source in &file.sources {
        if !source_names.insert(source.name.as_str()) {
            return Err(ImportError::Duplicate("source", source.name.clone()));
        }
        for query in &source.queries {
            if !query_names.insert(query.name.as_str()) {
                return Err(ImportError::Duplicate("query", query.name.clone()));
            }
        }
    }
    Ok(file)
}

/// Replaces `${VAR}` string values with the variable's value
fn resolve_env(value: Value, source: &str) -> Result<Value, ImportError> {
    match value {
        Value::String(s) => match s.trim().strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
            Some(var) => std::env::var(var)
                .map(Value::String)
                .map_err(|_| ImportError::MissingEnv(var.to_string(), source.to_string())),
            None => Ok(Value::String(s)),
        },
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| resolve_env(v, source).map(|v| (k, v)))
            .collect::<Result<serde_json::Map<_, _>, _>>()
            .map(Value::Object),
        other => Ok(other),
    }
}

impl ImportSource {
    /// Splits into the source request and its query definitions
    pub fn into_parts(self) -> Result<(CreateDataSource, Vec<ImportQuery>), ImportError> {
        let credentials = self
            .credentials
            .map(|c| resolve_env(c, &self.name))
            .transpose()?;
        let source = CreateDataSource {
            name: self.name,
            description: self.description,
            base_url: self.base_url,
            auth_type: self.auth_type,
            credentials,
            default_headers: self.default_headers,
            timeout_secs: self.timeout_secs,
            is_active: self.is_active,
        };
        Ok((source, self.queries))
    }
}

impl ImportQuery {
    pub fn into_create(self, data_source_id: Uuid) -> CreateDataSourceQuery {
        CreateDataSourceQuery {
            data_source_id,
            name: self.name,
            description: self.description,
            http_method: self.http_method,
            endpoint: self.endpoint,
            query_params: self.query_params,
            body_template: self.body_template,
            json_path: self.json_path,
            expected_type: self.expected_type,
            cache_ttl_secs: self.cache_ttl_secs,
            is_active: self.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
sources:
  - name: jira
    base_url: https://acme.atlassian.net
    auth_type: bearer
    credentials:
      token: "${MSSP_IMPORT_TEST_TOKEN}"
    queries:
      - name: open_tickets
        endpoint: /rest/api/2/search
        query_params:
          jql: "project = {{project}}"
        json_path: $.total
        expected_type: number
        cache_ttl_secs: 300
      - name: sla_breaches
        http_method: POST
        endpoint: /rest/api/2/search
        body_template: '{"jql": "sla = breached"}'
        json_path: $.issues.length()
        expected_type: number
"#;

    #[test]
    fn parses_sources_and_queries() {
        let file = parse(SAMPLE).unwrap();
        assert_eq!(file.sources.len(), 1);
        assert_eq!(file.sources[0].queries.len(), 2);
        assert_eq!(file.sources[0].queries[1].http_method, Some(QueryMethod::Post));
    }

    #[test]
    fn credentials_resolve_from_environment() {
        std::env::set_var("MSSP_IMPORT_TEST_TOKEN", "t0k3n");
        let mut file = parse(SAMPLE).unwrap();
        let (source, queries) = file.sources.remove(0).into_parts().unwrap();
        assert_eq!(source.credentials.unwrap()["token"], "t0k3n");
        let query = queries.into_iter().next().unwrap().into_create(Uuid::nil());
        assert_eq!(query.data_source_id, Uuid::nil());
    }

    #[test]
    fn missing_environment_is_an_error() {
        let yaml = r#"
sources:
  - name: servicenow
    base_url: https://acme.service-now.com
    auth_type: bearer
    credentials: { token: "${MSSP_IMPORT_DEFINITELY_UNSET}" }
"#;
        let mut file = parse(yaml).unwrap();
        assert!(matches!(
            file.sources.remove(0).into_parts(),
            Err(ImportError::MissingEnv(_, _))
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let yaml = r#"
sources:
  - name: a
    base_url: https://a.example.com
    queries:
      - { name: q, endpoint: /x }
  - name: b
    base_url: https://b.example.com
    queries:
      - { name: q, endpoint: /y }
"#;
        assert!(matches!(parse(yaml), Err(ImportError::Duplicate("query", _))));
        assert!(parse("sources: [{ name: a, base_url: x, bogus: 1 }]").is_err());
    }
}
