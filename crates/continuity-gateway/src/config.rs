//! Gateway configuration

use continuity_core::identity::{DEFAULT_INSTANCE_ID, DEFAULT_SIGNATURE};
use continuity_core::reference::{DEFAULT_SNIPPET_MAX, DEFAULT_SOURCE_TAGS};
use continuity_core::{MatchPolicy, PrivilegedIdentity};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::{GatewayError, DEFAULT_HOST, DEFAULT_PORT};

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Preferred archive location
    pub archive_path: PathBuf,

    /// Reference corpus file; an empty corpus is used when unset
    pub corpus_path: Option<PathBuf>,

    /// Shared secret for protected routes. `None` locks them down.
    pub secret: Option<String>,

    /// Origins allowed to reach non-public routes; empty disables the check
    pub admin_origins: Vec<String>,

    /// Snippet length served by corpus search
    pub snippet_max: usize,

    /// Longest response accepted by `/archive`
    pub max_response_chars: usize,

    /// Length a response is cut to before storage
    pub stored_response_chars: usize,

    /// Source tags that mark reference documents
    pub reference_source_tags: Vec<String>,

    /// Privileged instance settings
    pub identity: IdentitySettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            archive_path: PathBuf::from("data/continuity_archive.sqlite"),
            corpus_path: None,
            secret: None,
            admin_origins: Vec::new(),
            snippet_max: DEFAULT_SNIPPET_MAX,
            max_response_chars: 10_000,
            stored_response_chars: 2_000,
            reference_source_tags: DEFAULT_SOURCE_TAGS.iter().map(|s| s.to_string()).collect(),
            identity: IdentitySettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = path.into();
        self
    }

    pub fn with_corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = Some(path.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_admin_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Overlay environment variables on top of the current values.
    ///
    /// Empty values are ignored; an unparseable `PORT` is an error.
    pub fn apply_env(mut self) -> crate::Result<Self> {
        if let Some(secret) = env_var("GATEWAY_SECRET") {
            self.secret = Some(secret);
        }
        if let Some(origins) = env_var("ADMIN_ORIGINS") {
            self.admin_origins = parse_origins(&origins);
        }
        if let Some(host) = env_var("HOST") {
            self.host = host;
        }
        if let Some(port) = env_var("PORT") {
            self.port = port
                .parse()
                .map_err(|_| GatewayError::InvalidConfig(format!("PORT is not a port: {port}")))?;
        }
        if let Some(path) = env_var("ARCHIVE_PATH") {
            self.archive_path = PathBuf::from(path);
        }
        if let Some(path) = env_var("CORPUS_PATH") {
            self.corpus_path = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> crate::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| GatewayError::InvalidConfig(format!("{}:{}: {e}", self.host, self.port)))
    }

    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Privileged identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub instance_id: String,
    pub signature: String,
    pub policy: MatchPolicy,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            instance_id: DEFAULT_INSTANCE_ID.to_string(),
            signature: DEFAULT_SIGNATURE.to_string(),
            policy: MatchPolicy::default(),
        }
    }
}

impl IdentitySettings {
    pub fn to_identity(&self) -> PrivilegedIdentity {
        PrivilegedIdentity::new(self.instance_id.clone(), self.signature.clone())
            .with_policy(self.policy)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
        assert!(config.secret.is_none());
        assert_eq!(config.max_response_chars, 10_000);
        assert_eq!(config.stored_response_chars, 2_000);
        assert_eq!(config.reference_source_tags.len(), 3);
    }

    #[test]
    fn test_config_builder() {
        let config = GatewayConfig::new()
            .with_host("0.0.0.0")
            .with_port(8080)
            .with_secret("s3cret")
            .with_admin_origins(["https://admin.example"]);

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.admin_origins, vec!["https://admin.example"]);
        assert!(config.socket_addr().is_ok());
    }

    #[test]
    fn test_bad_socket_addr() {
        let config = GatewayConfig::new().with_host("not a host");
        assert!(matches!(config.socket_addr(), Err(GatewayError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");

        let config = GatewayConfig::default().with_port(9100).with_corpus_path("corpus.json");
        config.to_file(&path).unwrap();

        let parsed = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(parsed.port, 9100);
        assert_eq!(parsed.corpus_path, Some(PathBuf::from("corpus.json")));
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let parsed: GatewayConfig = serde_json::from_str(r#"{"port": 9200}"#).unwrap();
        assert_eq!(parsed.port, 9200);
        assert_eq!(parsed.host, DEFAULT_HOST);
        assert_eq!(parsed.identity.instance_id, DEFAULT_INSTANCE_ID);
    }

    #[test]
    fn test_serialized_config_lists_only_live_settings() {
        let value = serde_json::to_value(GatewayConfig::default()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();

        assert!(!keys.contains(&"tracing"));
        assert!(keys.contains(&"archive_path"));
        assert!(keys.contains(&"identity"));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://a.example, ,https://b.example "),
            vec!["https://a.example", "https://b.example"]
        );
    }
}
