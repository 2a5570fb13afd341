//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// RPC listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log level filter (e.g. "info", "debug", "armory_server=trace").
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Render logs for humans; set to false for JSON output.
    #[serde(default = "default_human_readable_output")]
    pub human_readable_output: bool,
    /// Base directory for the filesystem blob backend. Relative paths are
    /// resolved against the working directory.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Blob backend selection.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Metadata store connection.
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_level: default_log_level(),
            human_readable_output: default_human_readable_output(),
            storage_dir: default_storage_dir(),
            persistence: PersistenceConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    9876
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_human_readable_output() -> bool {
    true
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./data/artifacts")
}

/// Blob backend selection.
///
/// `kind` is a plain string rather than a tagged enum so that unknown values
/// can fall back to the filesystem backend with a warning instead of failing
/// deserialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend type: "filesystem" or "s3".
    #[serde(rename = "type", default = "default_persistence_type")]
    pub kind: String,
    /// S3 connection settings; required when type is "s3".
    #[serde(default)]
    pub s3: Option<S3Config>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            kind: default_persistence_type(),
            s3: None,
        }
    }
}

fn default_persistence_type() -> String {
    "filesystem".to_string()
}

/// S3-compatible object store settings. All fields are required.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct S3Config {
    /// Endpoint URL (e.g. "http://minio:9000").
    pub endpoint: String,
    /// Region name.
    pub region: String,
    /// Access key ID.
    pub key_id: String,
    /// Secret access key.
    pub access_key: String,
    /// Bucket name.
    pub bucket: String,
    /// Per-operation timeout as a duration string (e.g. "30s").
    #[serde(default = "default_s3_timeout")]
    pub timeout: String,
}

fn default_s3_timeout() -> String {
    "30s".to_string()
}

impl S3Config {
    /// Check that every required field is present and the timeout parses.
    pub fn validate(&self) -> crate::Result<()> {
        for (field, value) in [
            ("endpoint", &self.endpoint),
            ("region", &self.region),
            ("key_id", &self.key_id),
            ("access_key", &self.access_key),
            ("bucket", &self.bucket),
        ] {
            if value.trim().is_empty() {
                return Err(crate::Error::InvalidName {
                    field: "persistence.s3",
                    reason: format!("{field} must be set"),
                });
            }
        }
        self.timeout_duration()?;
        Ok(())
    }

    /// Parse the configured timeout.
    pub fn timeout_duration(&self) -> crate::Result<Duration> {
        parse_duration(&self.timeout)
    }
}

/// Metadata store connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// SQLite file. Suitable for tests and single-node deployments.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL server.
    Postgres {
        host: String,
        port: u16,
        username: String,
        password: String,
        database: String,
        #[serde(default = "default_sslmode")]
        sslmode: String,
    },
}

fn default_sslmode() -> String {
    "disable".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/registry.db"),
        }
    }
}

/// Parse a duration string (e.g. "500ms", "30s", "5m", "1h", "1d").
pub fn parse_duration(s: &str) -> crate::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidDuration(s.to_string()));
    }

    let num_end = s
        .chars()
        .position(|c| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());

    let (num_str, unit) = s.split_at(num_end);
    let num: f64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidDuration(s.to_string()))?;

    let millis = match unit.trim() {
        "ms" => 1.0,
        "s" => 1000.0,
        "m" => 60.0 * 1000.0,
        "h" => 60.0 * 60.0 * 1000.0,
        "d" => 24.0 * 60.0 * 60.0 * 1000.0,
        _ => return Err(crate::Error::InvalidDuration(s.to_string())),
    };

    Ok(Duration::from_millis((num * millis) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.port, 9876);
        assert_eq!(config.log_level, "info");
        assert!(config.human_readable_output);
        assert_eq!(config.persistence.kind, "filesystem");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30x").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn test_s3_config_validation() {
        let mut config = S3Config {
            endpoint: "http://minio:9000".to_string(),
            region: "us-east-1".to_string(),
            key_id: "key".to_string(),
            access_key: "secret".to_string(),
            bucket: "artifacts".to_string(),
            timeout: "30s".to_string(),
        };
        assert!(config.validate().is_ok());

        config.bucket = "".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bucket"), "{err}");
    }
}
