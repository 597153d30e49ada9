use std::collections::HashMap;

use async_trait::async_trait;
use withconfig_core::{EnvMap, Result, WithConfigError};

use crate::{ConfigResolver, DEFAULT_NAMESPACE};

/// In-memory configuration store keyed by namespace and name
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    configs: HashMap<(String, String), EnvMap>, // (namespace, name) -> entries
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        entries: EnvMap,
    ) -> Self {
        self.insert(namespace, name, entries);
        self
    }

    pub fn insert(&mut self, namespace: impl Into<String>, name: impl Into<String>, entries: EnvMap) {
        self.configs.insert((namespace.into(), name.into()), entries);
    }
}

#[async_trait]
impl ConfigResolver for StaticResolver {
    async fn resolve(&self, name: &str, namespace: Option<&str>) -> Result<EnvMap> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        self.configs
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| WithConfigError::ConfigResolution {
                name: name.to_string(),
                reason: format!("not found in namespace '{}'", namespace),
            })
    }
}
