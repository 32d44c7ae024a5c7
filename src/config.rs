//! Runtime configuration from the environment

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_NAMESPACE: &str = "conversations";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,
    pub port: u16,
    /// Key-value namespace conversations are stored under
    pub namespace: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("DEALFLOW_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".dealflow").join("dealflow.db")
            },
            PathBuf::from,
        );

        let port = lookup("DEALFLOW_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let namespace = lookup("DEALFLOW_NAMESPACE")
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        Self {
            db_path,
            port,
            namespace,
        }
    }
}
