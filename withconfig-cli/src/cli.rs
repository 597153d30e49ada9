use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use withconfig_core::ConfigSelection;
use withconfig_runner::{EnvPolicy, ProcessConfig};

#[derive(Parser, Debug)]
#[command(name = "with-config", version)]
#[command(about = "Run a command with a ConfigMap's entries as environment variables", long_about = None)]
#[command(after_help = "Example:\n  $ export WITH_CONFIGMAP=my-configmap\n  $ with-config my-command --its-own-flag")]
pub struct Cli {
    /// Name of the ConfigMap (or config file) to load
    #[arg(short = 'c', long, env = "WITH_CONFIGMAP", value_name = "NAME")]
    pub configmap: String,

    /// Namespace of the ConfigMap; defaults to the current context's namespace
    #[arg(short, long, env = "KUBE_NAMESPACE")]
    pub namespace: Option<String>,

    /// Where configuration is read from
    #[arg(long, value_enum, env = "WITH_CONFIG_SOURCE", default_value_t = Source::Kubectl)]
    pub source: Source,

    /// Root directory for `--source file` (<dir>/<namespace>/<name>.{env,toml,json})
    #[arg(long, env = "WITH_CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    /// kubeconfig context to use with `--source kubectl`
    #[arg(long, env = "KUBE_CONTEXT")]
    pub context: Option<String>,

    /// Start the command with only the configuration entries, not our environment
    #[arg(long)]
    pub isolated_env: bool,

    /// Kill the command after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run the command in this directory
    #[arg(short = 'C', long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Log verbosity (logs go to stderr)
    #[arg(long, value_enum, env = "WITH_CONFIG_LOG")]
    pub log_level: Option<LogLevel>,

    /// Command to execute, followed by its arguments
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Source {
    /// Read a Kubernetes ConfigMap with kubectl
    Kubectl,
    /// Read a local .env, .toml or .json file
    File,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Cli {
    pub fn selection(&self) -> ConfigSelection {
        ConfigSelection::new(self.configmap.clone()).with_namespace(self.namespace.clone())
    }

    pub fn process_config(&self) -> ProcessConfig {
        let policy = if self.isolated_env {
            EnvPolicy::Isolated
        } else {
            EnvPolicy::Inherit
        };
        ProcessConfig::new()
            .with_env_policy(policy)
            .with_timeout(self.timeout.map(Duration::from_secs))
            .with_working_directory(self.working_dir.clone())
    }

    /// The program and its arguments.
    pub fn program(&self) -> (&str, &[String]) {
        match self.command.split_first() {
            Some((program, args)) => (program.as_str(), args),
            None => ("", &[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_with_its_own_flags() {
        let cli = Cli::try_parse_from([
            "with-config", "-c", "app", "-n", "prod", "ls", "-la", "--color", "/tmp",
        ])
        .unwrap();

        assert_eq!(cli.configmap, "app");
        assert_eq!(cli.namespace.as_deref(), Some("prod"));
        let (program, args) = cli.program();
        assert_eq!(program, "ls");
        assert_eq!(args, ["-la", "--color", "/tmp"]);
    }

    #[test]
    fn test_flags_after_command_belong_to_command() {
        let cli = Cli::try_parse_from(["with-config", "-c", "app", "env", "--namespace", "x"]).unwrap();
        assert_eq!(cli.namespace, None);
        assert_eq!(cli.program().1, ["--namespace", "x"]);
    }

    #[test]
    fn test_command_is_required() {
        assert!(Cli::try_parse_from(["with-config", "-c", "app"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["with-config", "-c", "app", "true"]).unwrap();
        assert_eq!(cli.source, Source::Kubectl);
        assert_eq!(cli.config_dir, PathBuf::from("."));

        let config = cli.process_config();
        assert_eq!(config.env_policy, EnvPolicy::Inherit);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_process_config_from_flags() {
        let cli = Cli::try_parse_from([
            "with-config",
            "-c",
            "app",
            "--source",
            "file",
            "--isolated-env",
            "--timeout",
            "30",
            "-C",
            "/srv",
            "run",
        ])
        .unwrap();

        assert_eq!(cli.source, Source::File);
        let config = cli.process_config();
        assert_eq!(config.env_policy, EnvPolicy::Isolated);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.working_directory, Some(PathBuf::from("/srv")));
    }

    #[test]
    fn test_empty_namespace_means_unset() {
        let cli = Cli::try_parse_from(["with-config", "-c", "app", "-n", "", "true"]).unwrap();
        assert_eq!(cli.selection().namespace, None);
    }
}
