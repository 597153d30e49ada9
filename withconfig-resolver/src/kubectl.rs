use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use withconfig_core::{EnvMap, Result, WithConfigError};

use crate::{env_from_json_object, validate_name, ConfigResolver, DEFAULT_NAMESPACE};

/// Reads a Kubernetes ConfigMap through `kubectl`.
///
/// `kubectl` brings the usual kubeconfig loading rules (`KUBECONFIG`, current
/// context, in-cluster credentials), so no cluster settings live here.
#[derive(Debug, Clone)]
pub struct KubectlResolver {
    program: PathBuf,
    context: Option<String>,
}

impl KubectlResolver {
    /// Locate `kubectl` on the search path.
    pub fn locate() -> Result<Self> {
        let program = which::which("kubectl").map_err(|e| {
            WithConfigError::InvalidConfiguration(format!("kubectl not found on PATH: {}", e))
        })?;
        Ok(Self::with_program(program))
    }

    pub fn with_program<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.is_empty());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(context) = &self.context {
            cmd.arg(format!("--context={}", context));
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Namespace of the current kubeconfig context, or `default`.
    async fn current_namespace(&self) -> String {
        let output = self
            .command()
            .args(["config", "view", "--minify", "--output=jsonpath={..namespace}"])
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let namespace = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if namespace.is_empty() {
                    DEFAULT_NAMESPACE.to_string()
                } else {
                    namespace
                }
            }
            Ok(output) => {
                debug!(
                    status = %output.status,
                    "kubectl config view failed; falling back to default namespace"
                );
                DEFAULT_NAMESPACE.to_string()
            }
            Err(e) => {
                debug!(error = %e, "kubectl config view could not run; falling back to default namespace");
                DEFAULT_NAMESPACE.to_string()
            }
        }
    }
}

#[async_trait]
impl ConfigResolver for KubectlResolver {
    async fn resolve(&self, name: &str, namespace: Option<&str>) -> Result<EnvMap> {
        validate_name("configuration name", name)?;

        let namespace = match namespace {
            Some(ns) => ns.to_string(),
            None => {
                let ns = self.current_namespace().await;
                info!(namespace = %ns, "Namespace not provided, using the current context namespace");
                ns
            }
        };
        validate_name("namespace", &namespace)?;

        debug!(configmap = %name, namespace = %namespace, "Fetching ConfigMap");

        let output = self
            .command()
            .args(["get", "configmap", name])
            .arg(format!("--namespace={}", namespace))
            .arg("--output=json")
            .output()
            .await
            .map_err(|e| WithConfigError::ConfigResolution {
                name: name.to_string(),
                reason: format!("failed to run {}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(WithConfigError::ConfigResolution {
                name: name.to_string(),
                reason: if stderr.is_empty() {
                    format!("kubectl {}", output.status)
                } else {
                    stderr
                },
            });
        }

        parse_configmap(name, &output.stdout)
    }
}

/// Extract the `data` entries of a ConfigMap JSON document.
fn parse_configmap(name: &str, document: &[u8]) -> Result<EnvMap> {
    let value: serde_json::Value = serde_json::from_slice(document).map_err(|e| {
        WithConfigError::ConfigResolution {
            name: name.to_string(),
            reason: format!("invalid kubectl output: {}", e),
        }
    })?;

    match value.get("data") {
        Some(serde_json::Value::Object(data)) => env_from_json_object(name, data),
        // A ConfigMap without data is valid and simply adds nothing.
        Some(serde_json::Value::Null) | None => Ok(EnvMap::new()),
        Some(_) => Err(WithConfigError::ConfigResolution {
            name: name.to_string(),
            reason: "ConfigMap data is not an object".to_string(),
        }),
    }
}
