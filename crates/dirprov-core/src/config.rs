//! Configuration for Dirprov

use crate::types::{IdentityType, PasswordPolicy};
use crate::{DEFAULT_PASSWORD_BYTES, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub password: PasswordConfig,

    #[serde(default)]
    pub membership: MembershipConfig,

    #[serde(default)]
    pub graph: Option<GraphConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProvisioningConfig {
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `DIRPROV_*` environment variables onto this configuration
    pub fn apply_env(&mut self) {
        if let Ok(domain) = std::env::var("DIRPROV_DOMAIN") {
            self.directory.domain = domain;
        }
        if let Ok(realm) = std::env::var("DIRPROV_REALM") {
            self.directory.realm = realm;
        }
        if let Ok(url) = std::env::var("DIRPROV_SERVER_URL") {
            self.directory.server_url = Some(url);
        }
        if let Ok(principal) = std::env::var("DIRPROV_BIND_PRINCIPAL") {
            self.directory.bind_principal = principal;
        }
        if let Ok(password) = std::env::var("DIRPROV_BIND_PASSWORD") {
            self.directory.bind_password = password;
        }
        if let Ok(start_tls) = std::env::var("DIRPROV_START_TLS") {
            self.directory.start_tls = start_tls != "false";
        }
        if let Ok(token) = std::env::var("DIRPROV_GRAPH_TOKEN") {
            self.graph
                .get_or_insert_with(GraphConfig::default)
                .access_token = token;
        }
        if let Ok(level) = std::env::var("DIRPROV_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.directory.validate()?;
        self.password.validate()?;
        if let Some(graph) = &self.graph {
            graph.validate()?;
        }
        Ok(())
    }
}

/// Directory service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Domain name, e.g. `corp` in `corp.com`
    #[serde(default)]
    pub domain: String,

    /// Realm / top-level domain, e.g. `com`
    #[serde(default)]
    pub realm: String,

    /// Explicit server URL; defaults to `ldap://<domain>.<realm>`
    #[serde(default)]
    pub server_url: Option<String>,

    /// Principal used for the session bind
    #[serde(default)]
    pub bind_principal: String,

    #[serde(default)]
    pub bind_password: String,

    /// Upgrade `ldap://` connections with StartTLS. Binds and password
    /// writes are refused over plaintext connections.
    #[serde(default = "default_start_tls")]
    pub start_tls: bool,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Object classes written on newly created user entries
    #[serde(default = "default_user_object_classes")]
    pub user_object_classes: Vec<String>,

    /// Base DN for group lookups; defaults to the domain root
    #[serde(default)]
    pub group_base_dn: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_start_tls() -> bool {
    true
}

fn default_user_object_classes() -> Vec<String> {
    ["top", "person", "organizationalPerson", "user"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            realm: String::new(),
            server_url: None,
            bind_principal: String::new(),
            bind_password: String::new(),
            start_tls: default_start_tls(),
            timeout_seconds: default_timeout(),
            user_object_classes: default_user_object_classes(),
            group_base_dn: None,
        }
    }
}

impl DirectoryConfig {
    /// URL the session binds to
    pub fn server_url(&self) -> String {
        match &self.server_url {
            Some(url) => url.clone(),
            None => format!("ldap://{}.{}", self.domain, self.realm),
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.domain.is_empty() {
            return Err(crate::Error::Config("directory.domain is required".into()));
        }
        if self.realm.is_empty() {
            return Err(crate::Error::Config("directory.realm is required".into()));
        }
        if self.timeout_seconds == 0 {
            return Err(crate::Error::Config(
                "directory.timeout_seconds must be greater than zero".into(),
            ));
        }

        let url = self.server_url();
        if !url.starts_with("ldap://") && !url.starts_with("ldaps://") {
            return Err(crate::Error::Config(
                "Server URL must start with ldap:// or ldaps://".into(),
            ));
        }
        url::Url::parse(&url)
            .map_err(|e| crate::Error::Config(format!("Invalid server URL {}: {}", url, e)))?;
        if url.starts_with("ldap://") && !self.start_tls {
            return Err(crate::Error::Config(
                "ldap:// without start_tls sends the bind and password writes in cleartext; \
                 enable start_tls or use ldaps://"
                    .into(),
            ));
        }

        Ok(())
    }
}

/// Generated password settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_password_bytes")]
    pub byte_length: usize,

    #[serde(flatten)]
    pub policy: PasswordPolicy,
}

fn default_password_bytes() -> usize {
    DEFAULT_PASSWORD_BYTES
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            byte_length: default_password_bytes(),
            policy: PasswordPolicy::default(),
        }
    }
}

impl PasswordConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.byte_length == 0 {
            return Err(crate::Error::Config(
                "password.byte_length must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipConfig {
    #[serde(default)]
    pub identity_type: IdentityType,
}

/// Cloud identity graph settings used to mirror group memberships
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_endpoint")]
    pub endpoint: String,

    /// Bearer token; acquiring it is the caller's responsibility
    #[serde(default)]
    pub access_token: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_graph_endpoint() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            endpoint: default_graph_endpoint(),
            access_token: String::new(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.access_token.is_empty() {
            return Err(crate::Error::Config("graph.access_token is required".into()));
        }
        url::Url::parse(&self.endpoint).map_err(|e| {
            crate::Error::Config(format!("Invalid graph endpoint {}: {}", self.endpoint, e))
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PasswordEncoding;
    use std::io::Write;

    const SAMPLE: &str = r#"
[directory]
domain = "corp"
realm = "com"
bind_principal = "CORP\\svc-provision"
bind_password = "secret"

[password]
byte_length = 32
encoding = "sha256_hex"
require_symbol = false

[membership]
identity_type = "sam_account_name"

[logging]
level = "debug"
format = "json"
"#;

    #[test]
    fn test_parse_config() {
        let config = ProvisioningConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.directory.server_url(), "ldap://corp.com");
        assert_eq!(config.directory.timeout_seconds, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.directory.user_object_classes.len(), 4);
        assert_eq!(config.password.byte_length, 32);
        assert_eq!(config.password.policy.encoding, PasswordEncoding::Sha256Hex);
        assert!(!config.password.policy.require_symbol);
        assert!(config.password.policy.require_upper);
        assert_eq!(
            config.membership.identity_type,
            IdentityType::SamAccountName
        );
        assert!(config.graph.is_none());
        assert!(config.directory.start_tls);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_logging_section() {
        let config = ProvisioningConfig::from_toml("[logging]\nlevel = \"warn\"\n").unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = ProvisioningConfig::from_file(file.path()).unwrap();
        assert_eq!(config.directory.domain, "corp");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_validation() {
        let mut config = ProvisioningConfig::default();
        assert!(config.validate().is_err());

        config.directory.domain = "corp".into();
        config.directory.realm = "com".into();
        assert!(config.validate().is_ok());

        config.directory.server_url = Some("http://corp.com".into());
        assert!(config.validate().is_err());

        config.directory.server_url = None;
        config.directory.start_tls = false;
        assert!(config.validate().is_err());

        config.directory.server_url = Some("ldaps://dc01.corp.com:636".into());
        assert!(config.validate().is_ok());
        config.directory.start_tls = true;

        config.directory.server_url = Some("ldaps://dc01.corp.com:636".into());
        config.password.byte_length = 0;
        assert!(config.validate().is_err());

        config.password.byte_length = 20;
        config.graph = Some(GraphConfig::default());
        assert!(config.validate().is_err());
    }
}
