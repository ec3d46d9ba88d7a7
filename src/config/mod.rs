use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub invoices: InvoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<i32>,
    pub default_limit: i32,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
    pub allow_public_registration: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub documents_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceConfig {
    pub default_due_days: i64,
    pub default_tax_rate: rust_decimal::Decimal,
    pub overdue_sweep_secs: u64,
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

    /// Refuses configurations the server must not start with.
    ///
    /// Development tolerates an empty `JWT_SECRET` (logins simply fail);
    /// staging and production do not.
    pub fn check_startup(&self) -> anyhow::Result<()> {
        if self.security.jwt_secret.is_empty() && !matches!(self.environment, Environment::Development) {
            anyhow::bail!("JWT_SECRET must be set when running in {:?} mode", self.environment);
        }
        Ok(())
    }

    fn with_env_overrides(mut self) -> Self {
        // Filter overrides
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("FILTER_DEFAULT_LIMIT") {
            self.filter.default_limit = v.parse().unwrap_or(self.filter.default_limit);
        }
        if let Ok(v) = env::var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // API overrides
        if let Some(port) = env::var("LEXCASE_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("API_ALLOW_PUBLIC_REGISTRATION") {
            self.api.allow_public_registration = v.parse().unwrap_or(self.api.allow_public_registration);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_DOCUMENTS_DIR") {
            self.storage.documents_dir = v;
        }

        // Invoice overrides
        if let Ok(v) = env::var("INVOICE_DEFAULT_DUE_DAYS") {
            self.invoices.default_due_days = v.parse().unwrap_or(self.invoices.default_due_days);
        }
        if let Ok(v) = env::var("INVOICE_DEFAULT_TAX_RATE") {
            self.invoices.default_tax_rate = v.parse().unwrap_or(self.invoices.default_tax_rate);
        }
        if let Ok(v) = env::var("INVOICE_OVERDUE_SWEEP_SECS") {
            self.invoices.overdue_sweep_secs = v.parse().unwrap_or(self.invoices.overdue_sweep_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig {
                max_limit: Some(1000),
                default_limit: 100,
                debug_logging: true,
            },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            api: ApiConfig {
                port: 4000,
                enable_request_logging: true,
                max_request_size_bytes: 25 * 1024 * 1024, // 25MB
                allow_public_registration: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string()],
                enable_audit_logging: false,
                jwt_secret: "lexcase-development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                bcrypt_cost: 10,
            },
            storage: StorageConfig {
                documents_dir: "./storage/documents".to_string(),
            },
            invoices: InvoiceConfig {
                default_due_days: 30,
                default_tax_rate: rust_decimal::Decimal::ZERO,
                overdue_sweep_secs: 15 * 60,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            filter: FilterConfig {
                max_limit: Some(500),
                default_limit: 50,
                debug_logging: false,
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            api: ApiConfig {
                port: 4000,
                enable_request_logging: true,
                max_request_size_bytes: 25 * 1024 * 1024,
                allow_public_registration: false,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                enable_audit_logging: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                bcrypt_cost: 12,
            },
            storage: StorageConfig {
                documents_dir: "/var/lib/lexcase/documents".to_string(),
            },
            invoices: InvoiceConfig {
                default_due_days: 30,
                default_tax_rate: rust_decimal::Decimal::ZERO,
                overdue_sweep_secs: 60 * 60,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            filter: FilterConfig {
                max_limit: Some(200),
                default_limit: 50,
                debug_logging: false,
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            api: ApiConfig {
                port: 4000,
                enable_request_logging: false,
                max_request_size_bytes: 25 * 1024 * 1024,
                allow_public_registration: false,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                enable_audit_logging: true,
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                bcrypt_cost: 12,
            },
            storage: StorageConfig {
                documents_dir: "/var/lib/lexcase/documents".to_string(),
            },
            invoices: InvoiceConfig {
                default_due_days: 30,
                default_tax_rate: rust_decimal::Decimal::ZERO,
                overdue_sweep_secs: 60 * 60,
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
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

/// Emit an audit event when audit logging is enabled.
#[macro_export]
macro_rules! audit {
    ($($arg:tt)+) => {
        if $crate::config::CONFIG.security.enable_audit_logging {
            tracing::info!(target: "audit", $($arg)+);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.api.allow_public_registration);
        assert_eq!(config.filter.max_limit, Some(1000));
        assert!(!config.security.jwt_secret.is_empty());
        assert!(config.database.run_migrations);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.api.allow_public_registration);
        assert_eq!(config.filter.max_limit, Some(200));
        // Production must be given a secret explicitly
        assert!(config.security.jwt_secret.is_empty());
        assert!(config.security.enable_audit_logging);
    }

    #[test]
    fn test_production_refuses_an_empty_secret() {
        let mut config = AppConfig::production();
        let err = config.check_startup().unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        config.security.jwt_secret = "rotated-secret".to_string();
        assert!(config.check_startup().is_ok());
    }

    #[test]
    fn test_development_tolerates_an_empty_secret() {
        let mut config = AppConfig::development();
        config.security.jwt_secret.clear();
        assert!(config.check_startup().is_ok());
        assert!(AppConfig::staging().check_startup().is_err());
    }

    #[test]
    fn test_staging_sits_between() {
        let config = AppConfig::staging();
        assert_eq!(config.filter.max_limit, Some(500));
        assert_eq!(config.security.jwt_expiry_hours, 24);
    }
}
