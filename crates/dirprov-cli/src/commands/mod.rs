//! CLI command implementations

pub mod ou;
pub mod password;
pub mod provision;

use crate::OutputFormat;
use anyhow::Result;
use dirprov_core::config::ProvisioningConfig;
use dirprov_directory::{DirectoryConnector, LdapConnector, MemoryDirectory};
use serde::Serialize;
use std::sync::Arc;

/// Context passed to all commands
pub struct CommandContext {
    pub config: ProvisioningConfig,
    pub output_format: OutputFormat,
    pub dry_run: bool,
}

impl CommandContext {
    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Connector for the configured directory, or an in-memory one for
    /// dry runs. Dry runs skip configuration validation.
    pub fn connector(&self) -> Result<(Arc<dyn DirectoryConnector>, Option<MemoryDirectory>)> {
        if self.dry_run {
            let directory = self.memory_directory();
            return Ok((Arc::new(directory.clone()), Some(directory)));
        }

        self.config.validate()?;
        Ok((Arc::new(LdapConnector::from_config(&self.config.directory)), None))
    }

    /// Config with placeholder domain and realm filled in for dry runs
    pub fn effective_config(&self) -> ProvisioningConfig {
        let mut config = self.config.clone();
        if self.dry_run {
            if config.directory.domain.is_empty() {
                config.directory.domain = "example".into();
            }
            if config.directory.realm.is_empty() {
                config.directory.realm = "com".into();
            }
            config.graph = None;
        }
        config
    }

    fn memory_directory(&self) -> MemoryDirectory {
        let config = self.effective_config();
        MemoryDirectory::new(&config.directory.domain, &config.directory.realm)
    }

    /// Print `value` as pretty JSON
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
