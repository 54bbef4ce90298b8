use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub query: QueryConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub integrations: IntegrationConfig,
    pub finance: FinanceConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_limit: i64,
    pub max_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub system_database: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Base64 encoded 32-byte key for credential encryption at rest.
    #[serde(skip_serializing)]
    pub encryption_key: Option<String>,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceConfig {
    /// Currency that summaries and trends report in unless the request names one
    pub reporting_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub http_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_cache_ttl_secs: u64,
    pub cache_capacity: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Query overrides
        if let Ok(v) = env::var("QUERY_DEFAULT_LIMIT") {
            self.query.default_limit = v.parse().unwrap_or(self.query.default_limit);
        }
        if let Ok(v) = env::var("QUERY_MAX_LIMIT") {
            self.query.max_limit = v.parse().unwrap_or(self.query.max_limit);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_SYSTEM_NAME") {
            if !v.trim().is_empty() {
                self.database.system_database = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = env::var("MSSP_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("ENCRYPTION_KEY") {
            if !v.trim().is_empty() {
                self.security.encryption_key = Some(v.trim().to_string());
            }
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Integration overrides
        if let Ok(v) = env::var("INTEGRATIONS_HTTP_TIMEOUT_SECS") {
            self.integrations.http_timeout_secs = v.parse().unwrap_or(self.integrations.http_timeout_secs);
        }
        if let Ok(v) = env::var("INTEGRATIONS_MAX_RETRIES") {
            self.integrations.max_retries = v.parse().unwrap_or(self.integrations.max_retries);
        }
        if let Ok(v) = env::var("INTEGRATIONS_RETRY_BACKOFF_MS") {
            self.integrations.retry_backoff_ms = v.parse().unwrap_or(self.integrations.retry_backoff_ms);
        }
        if let Ok(v) = env::var("INTEGRATIONS_MAX_CACHE_TTL_SECS") {
            self.integrations.max_cache_ttl_secs = v.parse().unwrap_or(self.integrations.max_cache_ttl_secs);
        }
        if let Ok(v) = env::var("INTEGRATIONS_CACHE_CAPACITY") {
            self.integrations.cache_capacity = v.parse().unwrap_or(self.integrations.cache_capacity);
        }

        if let Ok(v) = env::var("FINANCE_REPORTING_CURRENCY") {
            let code = v.trim();
            if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
                self.finance.reporting_currency = code.to_ascii_uppercase();
            }
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            query: QueryConfig {
                default_limit: 50,
                max_limit: 500,
            },
            database: DatabaseConfig {
                system_database: "mssp_main".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                jwt_secret: "development-only-jwt-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                encryption_key: None,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            integrations: IntegrationConfig {
                http_timeout_secs: 30,
                max_retries: 2,
                retry_backoff_ms: 250,
                max_cache_ttl_secs: 3600,
                cache_capacity: 1_000,
            },
            finance: FinanceConfig {
                reporting_currency: "USD".to_string(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            query: QueryConfig {
                default_limit: 50,
                max_limit: 200,
            },
            database: DatabaseConfig {
                system_database: "mssp_main".to_string(),
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                encryption_key: None,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            integrations: IntegrationConfig {
                http_timeout_secs: 15,
                max_retries: 3,
                retry_backoff_ms: 500,
                max_cache_ttl_secs: 6 * 3600,
                cache_capacity: 5_000,
            },
            finance: FinanceConfig {
                reporting_currency: "USD".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            query: QueryConfig {
                default_limit: 25,
                max_limit: 100,
            },
            database: DatabaseConfig {
                system_database: "mssp_main".to_string(),
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                encryption_key: None,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            integrations: IntegrationConfig {
                http_timeout_secs: 10,
                max_retries: 3,
                retry_backoff_ms: 500,
                max_cache_ttl_secs: 24 * 3600,
                cache_capacity: 10_000,
            },
            finance: FinanceConfig {
                reporting_currency: "USD".to_string(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.query.max_limit, 500);
        assert!(!config.security.jwt_secret.is_empty());
        assert_eq!(config.database.system_database, "mssp_main");
        assert_eq!(config.finance.reporting_currency, "USD");
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.query.max_limit, 100);
        // production must be given a secret explicitly
        assert!(config.security.jwt_secret.is_empty());
        assert!(config.security.encryption_key.is_none());
    }

    #[test]
    fn secrets_are_not_serialized() {
        let config = AppConfig::development();
        let value = serde_json::to_value(&config).unwrap();
        assert!(value["security"].get("jwt_secret").is_none());
        assert!(value["security"].get("encryption_key").is_none());
        assert_eq!(value["security"]["jwt_expiry_hours"], 168);
    }
}
