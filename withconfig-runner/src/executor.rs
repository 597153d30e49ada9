use tracing::{error, info};
use withconfig_core::{ConfigSelection, ExitOutcome, LaunchRequest, Result, WithConfigError};
use withconfig_resolver::ConfigResolver;

use crate::launcher::Launch;

/// Resolves a configuration and runs a command with it
pub struct WithConfigExecutor<R, L> {
    resolver: R,
    launcher: L,
}

impl<R, L> WithConfigExecutor<R, L>
where
    R: ConfigResolver,
    L: Launch,
{
    pub fn new(resolver: R, launcher: L) -> Self {
        Self { resolver, launcher }
    }

    /// Resolve `selection`, then launch `command` with the result layered
    /// over the environment. Nothing is spawned if resolution fails.
    pub async fn execute(
        &self,
        selection: &ConfigSelection,
        command: &str,
        args: &[String],
    ) -> Result<ExitOutcome> {
        info!(
            configmap = %selection.name,
            namespace = ?selection.namespace,
            "Resolving configuration"
        );

        let env = self
            .resolver
            .resolve(&selection.name, selection.namespace.as_deref())
            .await
            .map_err(|e| {
                error!(configmap = %selection.name, error = %e, "Configuration resolution failed");
                resolution_error(&selection.name, e)
            })?;

        info!(
            configmap = %selection.name,
            entries = env.len(),
            "Configuration resolved"
        );

        let request = LaunchRequest::new(command)
            .with_args(args.iter().cloned())
            .with_env(env);
        self.launcher.launch(request).await
    }
}

fn resolution_error(name: &str, err: WithConfigError) -> WithConfigError {
    match err {
        err @ WithConfigError::ConfigResolution { .. } => err,
        other => WithConfigError::ConfigResolution {
            name: name.to_string(),
            reason: other.to_string(),
        },
    }
}
