use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use withconfig_core::{EnvMap, Result, WithConfigError};
use withconfig_parser::parse_env_file;

use crate::{env_from_json_object, validate_name, ConfigResolver, DEFAULT_NAMESPACE};

/// File extensions tried, in order, for `<root>/<namespace>/<name>.<ext>`.
const EXTENSIONS: [&str; 3] = ["env", "toml", "json"];

/// Resolves configurations from files laid out as `<root>/<namespace>/<name>.<ext>`.
///
/// - `.env`: dotenv-style `KEY=VALUE` lines
/// - `.toml`: a top-level table of scalar values
/// - `.json`: an object of scalar values, or a ConfigMap document whose
///   `data` field is used (e.g. the output of `kubectl get cm -o json`)
#[derive(Debug, Clone)]
pub struct FileResolver {
    root: PathBuf,
}

impl FileResolver {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Paths that are tried for a configuration, in lookup order.
    pub fn candidates(&self, name: &str, namespace: Option<&str>) -> Vec<PathBuf> {
        let dir = self.root.join(namespace.unwrap_or(DEFAULT_NAMESPACE));
        EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", name, ext)))
            .collect()
    }
}

#[async_trait]
impl ConfigResolver for FileResolver {
    async fn resolve(&self, name: &str, namespace: Option<&str>) -> Result<EnvMap> {
        validate_name("configuration name", name)?;
        if let Some(ns) = namespace {
            validate_name("namespace", ns)?;
        }

        let candidates = self.candidates(name, namespace);
        for path in &candidates {
            let contents = match tokio::fs::read_to_string(path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(WithConfigError::ConfigResolution {
                        name: name.to_string(),
                        reason: format!("failed to read {}: {}", path.display(), e),
                    });
                }
            };

            debug!(path = %path.display(), "Loading configuration file");
            return parse_config_file(path, &contents);
        }

        let tried = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(WithConfigError::ConfigResolution {
            name: name.to_string(),
            reason: format!("no configuration file found (tried {})", tried),
        })
    }
}

fn parse_config_file(path: &Path, contents: &str) -> Result<EnvMap> {
    let origin = path.display().to_string();
    match path.extension().and_then(|e| e.to_str()) {
        Some("env") => parse_env_file(contents)
            .map_err(|e| WithConfigError::ParseError(format!("{}: {}", origin, e))),
        Some("toml") => parse_toml(&origin, contents),
        Some("json") => parse_json(&origin, contents),
        _ => Err(WithConfigError::InvalidConfiguration(format!(
            "{}: unsupported file type",
            origin
        ))),
    }
}

fn parse_toml(origin: &str, contents: &str) -> Result<EnvMap> {
    use toml::Value;

    let table: toml::Table = toml::from_str(contents)
        .map_err(|e| WithConfigError::ParseError(format!("{}: {}", origin, e)))?;

    let mut env = EnvMap::new();
    for (key, value) in table {
        let value = match value {
            Value::String(s) => s,
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Datetime(d) => d.to_string(),
            Value::Array(_) | Value::Table(_) => {
                return Err(WithConfigError::InvalidConfiguration(format!(
                    "{}: value of '{}' must be a string, number or boolean",
                    origin, key
                )));
            }
        };
        env.insert(key, value);
    }
    Ok(env)
}

fn parse_json(origin: &str, contents: &str) -> Result<EnvMap> {
    let value: serde_json::Value = serde_json::from_str(contents)
        .map_err(|e| WithConfigError::ParseError(format!("{}: {}", origin, e)))?;

    let object = value.as_object().ok_or_else(|| {
        WithConfigError::InvalidConfiguration(format!("{}: expected a JSON object", origin))
    })?;

    if object.get("kind").and_then(|k| k.as_str()) == Some("ConfigMap") {
        return match object.get("data") {
            Some(serde_json::Value::Object(data)) => env_from_json_object(origin, data),
            Some(serde_json::Value::Null) | None => Ok(EnvMap::new()),
            Some(_) => Err(WithConfigError::InvalidConfiguration(format!(
                "{}: ConfigMap data must be an object",
                origin
            ))),
        };
    }

    env_from_json_object(origin, object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(root: &Path, namespace: &str, file: &str, contents: &str) {
        let dir = root.join(namespace);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), contents).unwrap();
    }

    #[tokio::test]
    async fn test_resolve_env_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), "default", "app.env", "GREETING=hi\nexport TARGET=\"the world\"\n");

        let resolver = FileResolver::new(tmp.path());
        let env = resolver.resolve("app", None).await.unwrap();
        assert_eq!(env["GREETING"], "hi");
        assert_eq!(env["TARGET"], "the world");
    }

    #[tokio::test]
    async fn test_resolve_toml_file_in_namespace() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(
            tmp.path(),
            "staging",
            "api.toml",
            "HOST = \"0.0.0.0\"\nPORT = 8080\nDEBUG = false\nRATIO = 0.5\n",
        );

        let resolver = FileResolver::new(tmp.path());
        let env = resolver.resolve("api", Some("staging")).await.unwrap();
        assert_eq!(env["HOST"], "0.0.0.0");
        assert_eq!(env["PORT"], "8080");
        assert_eq!(env["DEBUG"], "false");
        assert_eq!(env["RATIO"], "0.5");
    }

    #[tokio::test]
    async fn test_resolve_toml_rejects_tables() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), "default", "api.toml", "[server]\nport = 1\n");

        let err = FileResolver::new(tmp.path()).resolve("api", None).await.unwrap_err();
        assert!(matches!(err, WithConfigError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_resolve_json_configmap_document() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(
            tmp.path(),
            "default",
            "web.json",
            r#"{"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"web"},"data":{"LOG_LEVEL":"info"}}"#,
        );

        let env = FileResolver::new(tmp.path()).resolve("web", None).await.unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env["LOG_LEVEL"], "info");
    }

    #[tokio::test]
    async fn test_resolve_json_plain_object() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), "default", "web.json", r#"{"WORKERS": 4, "NAME": "web"}"#);

        let env = FileResolver::new(tmp.path()).resolve("web", None).await.unwrap();
        assert_eq!(env["WORKERS"], "4");
        assert_eq!(env["NAME"], "web");
    }

    #[tokio::test]
    async fn test_env_file_takes_precedence() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), "default", "app.env", "SOURCE=env\n");
        write_config(tmp.path(), "default", "app.json", r#"{"SOURCE":"json"}"#);

        let env = FileResolver::new(tmp.path()).resolve("app", None).await.unwrap();
        assert_eq!(env["SOURCE"], "env");
    }

    #[tokio::test]
    async fn test_missing_config_lists_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        let err = FileResolver::new(tmp.path()).resolve("absent", Some("ns")).await.unwrap_err();

        assert!(matches!(err, WithConfigError::ConfigResolution { .. }));
        let message = err.to_string();
        assert!(message.contains("absent.env"));
        assert!(message.contains("absent.json"));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = FileResolver::new(tmp.path());
        assert!(resolver.resolve("../secret", None).await.is_err());
        assert!(resolver.resolve("app", Some("..")).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_env_file_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_config(tmp.path(), "default", "bad.env", "this is not valid\n");

        let err = FileResolver::new(tmp.path()).resolve("bad", None).await.unwrap_err();
        assert!(matches!(err, WithConfigError::ParseError(_)));
        assert!(err.to_string().contains("bad.env"));
    }
}
