//! Issuer registry
//!
//! Maps an issuer identity to its trust configuration. Lookup is exact and
//! case-sensitive; there is no wildcard or prefix matching. The registry is
//! built once and never mutated, so reads need no locking.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::IssuerConfig;
use crate::error::{ConfigError, ConfigResult};

/// Read-only map from issuer identity to [`IssuerConfig`]
#[derive(Debug, Clone, Default)]
pub struct IssuerRegistry {
    /// Configurations in registration order
    entries: Vec<Arc<IssuerConfig>>,
    /// Issuer -> index into `entries`
    index: HashMap<String, usize>,
}

impl IssuerRegistry {
    /// Build a registry, validating every entry
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateIssuer`] if two entries share an
    /// issuer identity, or the first entry whose
    /// [`IssuerConfig::validate`] fails.
    pub fn new(configs: impl IntoIterator<Item = IssuerConfig>) -> ConfigResult<Self> {
        let mut registry = Self::default();

        for config in configs {
            config.validate()?;
            if registry.index.contains_key(&config.issuer) {
                return Err(ConfigError::DuplicateIssuer(config.issuer));
            }

            debug!(
                issuer = %config.issuer,
                provider = %config.kind(),
                "Registered issuer"
            );
            registry
                .index
                .insert(config.issuer.clone(), registry.entries.len());
            registry.entries.push(Arc::new(config));
        }

        Ok(registry)
    }

    /// Find the configuration for `issuer`
    pub fn lookup(&self, issuer: &str) -> Option<&Arc<IssuerConfig>> {
        self.index.get(issuer).map(|&i| &self.entries[i])
    }

    /// Number of registered issuers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no issuer is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate configurations in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<IssuerConfig>> {
        self.entries.iter()
    }
}
