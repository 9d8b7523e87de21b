//! Process configuration read from the environment (after `.env` is loaded).

use crate::error::ConfigError;
use std::net::SocketAddr;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/hr_console";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Object storage credentials. All four are required at startup.
#[derive(Clone)]
pub struct StorageSettings {
    pub access_key: String,
    pub secret: String,
    pub region: String,
    pub bucket: String,
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub database_schema: String,
    pub max_connections: u32,
    pub listen_addr: SocketAddr,
    pub storage: StorageSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::MissingEnv(name));

        let storage = StorageSettings {
            access_key: required("STORAGE_ACCESS_KEY")?,
            secret: required("STORAGE_SECRET")?,
            region: required("STORAGE_REGION")?,
            bucket: required("STORAGE_BUCKET")?,
        };

        let listen = optional("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen.parse().map_err(|_| ConfigError::InvalidEnv {
            name: "LISTEN_ADDR",
            value: listen.clone(),
        })?;
        let max_connections = match optional("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "DATABASE_MAX_CONNECTIONS",
                value: v.clone(),
            })?,
            None => 5,
        };

        Ok(Settings {
            database_url: optional("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_schema: optional("DATABASE_SCHEMA").unwrap_or_else(|| "public".to_string()),
            max_connections,
            listen_addr,
            storage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn storage_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("STORAGE_ACCESS_KEY", "AKIA"),
            ("STORAGE_SECRET", "shh"),
            ("STORAGE_REGION", "ap-south-1"),
            ("STORAGE_BUCKET", "hr-files"),
        ]
    }

    #[test]
    fn missing_storage_variable_is_fatal() {
        let mut pairs = storage_vars();
        pairs.retain(|(k, _)| *k != "STORAGE_BUCKET");
        let env = vars(&pairs);
        let err = Settings::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("STORAGE_BUCKET")));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut pairs = storage_vars();
        pairs.push(("STORAGE_SECRET", "  "));
        let env: HashMap<String, String> = vars(&pairs);
        let err = Settings::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("STORAGE_SECRET")));
    }

    #[test]
    fn defaults_fill_the_rest() {
        let env = vars(&storage_vars());
        let s = Settings::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(s.database_schema, "public");
        assert_eq!(s.max_connections, 5);
        assert_eq!(s.listen_addr.port(), 3000);
        assert_eq!(s.storage.bucket, "hr-files");
        assert!(!format!("{:?}", s.storage).contains("shh"));
    }
}
