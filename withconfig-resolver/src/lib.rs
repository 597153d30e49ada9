//! Configuration sources for `with-config`.
//!
//! A [`ConfigResolver`] turns a configuration name and an optional namespace
//! into the key/value pairs that end up in the child's environment. Any error
//! is fatal to the run; nothing is retried.

use async_trait::async_trait;
use withconfig_core::{EnvMap, Result, WithConfigError};

mod file;
mod kubectl;
mod static_map;

pub use file::FileResolver;
pub use kubectl::KubectlResolver;
pub use static_map::StaticResolver;

/// Namespace used when none is given and the backend has no better answer.
pub const DEFAULT_NAMESPACE: &str = "default";

#[async_trait]
pub trait ConfigResolver: Send + Sync {
    /// Fetch the named configuration as a string-to-string mapping.
    async fn resolve(&self, name: &str, namespace: Option<&str>) -> Result<EnvMap>;
}

#[async_trait]
impl<T: ConfigResolver + ?Sized> ConfigResolver for Box<T> {
    async fn resolve(&self, name: &str, namespace: Option<&str>) -> Result<EnvMap> {
        (**self).resolve(name, namespace).await
    }
}

/// Convert a JSON object of scalars into an env mapping.
pub(crate) fn env_from_json_object(
    origin: &str,
    object: &serde_json::Map<String, serde_json::Value>,
) -> Result<EnvMap> {
    use serde_json::Value;

    let mut env = EnvMap::new();
    for (key, value) in object {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            Value::Array(_) | Value::Object(_) => {
                return Err(WithConfigError::InvalidConfiguration(format!(
                    "{}: value of '{}' must be a string, number or boolean",
                    origin, key
                )));
            }
        };
        env.insert(key.clone(), value);
    }
    Ok(env)
}

/// Names end up in file paths and command arguments; keep them to the
/// character set Kubernetes allows for object names.
pub(crate) fn validate_name(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(WithConfigError::InvalidConfiguration(format!(
            "invalid {} '{}'",
            kind, value
        )))
    }
}
