use clap::Parser;
use std::process;
use tracing::warn;
use withconfig_core::{
    exit_code_for, ExitOutcome, Result, WithConfigError, LAUNCHER_FAILURE_EXIT_CODE,
};
use withconfig_resolver::{ConfigResolver, FileResolver, KubectlResolver};
use withconfig_runner::{ProcessLauncher, WithConfigExecutor};

mod cli;
mod logging;

use cli::{Cli, Source};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not failures
            let code = if e.use_stderr() { LAUNCHER_FAILURE_EXIT_CODE } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    if let Err(e) = logging::init_logging(cli.log_level) {
        eprintln!("with-config: {:#}", e);
        process::exit(LAUNCHER_FAILURE_EXIT_CODE);
    }

    let result = run(&cli).await;
    match &result {
        Ok(outcome) => {
            if let Err(e) = outcome.check() {
                warn!(error = %e, timed_out = outcome.timed_out, "Command failed");
            }
        }
        Err(e) => eprintln!("with-config: {}", e),
    }

    process::exit(exit_code_for(&result));
}

async fn run(cli: &Cli) -> Result<ExitOutcome> {
    let resolver = build_resolver(cli)?;
    let launcher = ProcessLauncher::with_config(cli.process_config());
    let executor = WithConfigExecutor::new(resolver, launcher);

    let (program, args) = cli.program();
    executor.execute(&cli.selection(), program, args).await
}

fn build_resolver(cli: &Cli) -> Result<Box<dyn ConfigResolver>> {
    Ok(match cli.source {
        Source::Kubectl => {
            let resolver = KubectlResolver::locate().map_err(|e| WithConfigError::ConfigResolution {
                name: cli.configmap.clone(),
                reason: e.to_string(),
            })?;
            Box::new(resolver.with_context(cli.context.clone()))
        }
        Source::File => Box::new(FileResolver::new(&cli.config_dir)),
    })
}
