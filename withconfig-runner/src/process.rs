use std::path::PathBuf;
use std::time::Duration;

use crate::environment::EnvPolicy;

/// Settings applied to every process a launcher starts
#[derive(Debug, Clone, Default)]
pub struct ProcessConfig {
    /// Kill the child if it has not finished within this duration.
    pub timeout: Option<Duration>,
    pub env_policy: EnvPolicy,
    pub working_directory: Option<PathBuf>,
}

impl ProcessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env_policy(mut self, policy: EnvPolicy) -> Self {
        self.env_policy = policy;
        self
    }

    pub fn with_working_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.working_directory = dir;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_inherits_environment() {
        let config = ProcessConfig::default();
        assert_eq!(config.env_policy, EnvPolicy::Inherit);
        assert!(config.timeout.is_none());
        assert!(config.working_directory.is_none());
    }

    #[test]
    fn test_builder() {
        let config = ProcessConfig::new()
            .with_timeout(Some(Duration::from_secs(5)))
            .with_env_policy(EnvPolicy::Isolated)
            .with_working_directory(Some(PathBuf::from("/tmp")));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.env_policy, EnvPolicy::Isolated);
        assert_eq!(config.working_directory, Some(PathBuf::from("/tmp")));
    }
}
