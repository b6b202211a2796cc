//! Trellis Configuration Management
//!
//! Connection and behavior settings for one client. Loaded from
//! environment variables or a TOML file, with defaults suitable for a
//! local development server.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default root URI for a local Neo4j Server
pub const NEO4J_URI: &str = "http://localhost:7474/db/data";

/// Default root URI for a local Rexster graph
pub const REXSTER_URI: &str = "http://localhost:8182/graphs/emptygraph";

/// Default root URI for a local Titan graph served by Rexster
pub const TITAN_URI: &str = "http://localhost:8182/graphs/graph";

/// Client configuration
///
/// Immutable once a client has been built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root endpoint of the graph service
    pub root_uri: String,

    /// Basic auth username
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<String>,

    /// Property read as the element id when a record carries none
    pub id_var: String,

    /// Property holding a vertex's element type
    pub type_var: String,

    /// Property read as the edge label when a record carries none
    pub label_var: String,

    /// Default vertex index name
    pub vertex_index: String,

    /// Default edge index name
    pub edge_index: String,

    /// Index elements on create/update
    pub autoindex: bool,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_uri: NEO4J_URI.to_string(),
            username: None,
            password: None,
            id_var: "eid".to_string(),
            type_var: "element_type".to_string(),
            label_var: "label".to_string(),
            vertex_index: "vertex".to_string(),
            edge_index: "edge".to_string(),
            autoindex: true,
            timeout_secs: 30,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Create a config for the given root URI
    pub fn new(root_uri: impl Into<String>) -> Self {
        Self {
            root_uri: root_uri.into(),
            ..Default::default()
        }
    }

    /// Set basic auth credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Toggle index-on-write
    pub fn with_autoindex(mut self, autoindex: bool) -> Self {
        self.autoindex = autoindex;
        self
    }

    /// Root URI without a trailing slash
    pub fn root(&self) -> &str {
        self.root_uri.trim_end_matches('/')
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Merge with environment variables (env takes precedence)
    ///
    /// Every `TRELLIS_*` variable that is set replaces the current value,
    /// including values equal to the defaults.
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        if let Ok(uri) = std::env::var("TRELLIS_ROOT_URI") {
            self.root_uri = uri;
        }
        if let Ok(user) = std::env::var("TRELLIS_USERNAME") {
            self.username = Some(user);
        }
        if let Ok(pass) = std::env::var("TRELLIS_PASSWORD") {
            self.password = Some(pass);
        }
        if let Ok(flag) = std::env::var("TRELLIS_AUTOINDEX") {
            self.autoindex = parse_bool("TRELLIS_AUTOINDEX", &flag)?;
        }
        if let Ok(secs) = std::env::var("TRELLIS_TIMEOUT_SECS") {
            self.timeout_secs = secs.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TRELLIS_TIMEOUT_SECS".to_string(),
                value: secs,
            })?;
        }
        if let Ok(level) = std::env::var("TRELLIS_LOG_LEVEL") {
            self.log_level = level;
        }

        Ok(self)
    }

    /// Reject configs that cannot address a server
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_uri.trim().is_empty() {
            return Err(ConfigError::MissingRequired("root_uri".to_string()));
        }
        if self.type_var.is_empty() {
            return Err(ConfigError::MissingRequired("type_var".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_KEYS: [&str; 6] = [
        "TRELLIS_ROOT_URI",
        "TRELLIS_USERNAME",
        "TRELLIS_PASSWORD",
        "TRELLIS_AUTOINDEX",
        "TRELLIS_TIMEOUT_SECS",
        "TRELLIS_LOG_LEVEL",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.root_uri, NEO4J_URI);
        assert_eq!(config.type_var, "element_type");
        assert_eq!(config.vertex_index, "vertex");
        assert!(config.autoindex);
    }

    #[test]
    fn test_root_strips_trailing_slash() {
        let config = Config::new("http://localhost:8182/graphs/emptygraph/");
        assert_eq!(config.root(), "http://localhost:8182/graphs/emptygraph");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("K", "true").unwrap());
        assert!(!parse_bool("K", "Off").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
    }

    #[test]
    fn test_toml_partial_config() {
        let config: Config = toml::from_str(
            r#"
            root_uri = "http://db:7474/db/data"
            autoindex = false
            "#,
        )
        .unwrap();
        assert_eq!(config.root_uri, "http://db:7474/db/data");
        assert!(!config.autoindex);
        assert_eq!(config.edge_index, "edge");
    }

    #[test]
    fn test_validate_empty_uri() {
        let config = Config::new("  ");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_wins_even_with_default_values() {
        clear_env();
        let file: Config = toml::from_str(&format!(
            "root_uri = \"{REXSTER_URI}\"\nautoindex = false\n"
        ))
        .unwrap();

        std::env::set_var("TRELLIS_AUTOINDEX", "true");
        std::env::set_var("TRELLIS_ROOT_URI", NEO4J_URI);
        let config = file.with_env_override();
        clear_env();

        let config = config.unwrap();
        assert!(config.autoindex);
        assert_eq!(config.root_uri, NEO4J_URI);
    }

    #[test]
    #[serial]
    fn test_unset_env_keeps_file_values() {
        clear_env();
        let file: Config = toml::from_str(
            r#"
            root_uri = "http://db:7474/db/data"
            timeout_secs = 5
            "#,
        )
        .unwrap();

        let config = file.with_env_override().unwrap();
        assert_eq!(config.root_uri, "http://db:7474/db/data");
        assert_eq!(config.timeout_secs, 5);
        assert!(config.username.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_variables() {
        clear_env();
        std::env::set_var("TRELLIS_USERNAME", "neo");
        std::env::set_var("TRELLIS_TIMEOUT_SECS", "7");
        let config = Config::from_env();
        std::env::set_var("TRELLIS_TIMEOUT_SECS", "soon");
        let invalid = Config::from_env();
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.username.as_deref(), Some("neo"));
        assert_eq!(config.timeout_secs, 7);
        assert_eq!(config.root_uri, NEO4J_URI);
        assert!(matches!(invalid, Err(ConfigError::InvalidValue { .. })));
    }
}
