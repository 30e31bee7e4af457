use anyhow::{Context, Result};

use sieve_git_pushdeploy::{hooks, telemetry};

fn main() -> Result<()> {
    telemetry::init_tracing();

    let argv: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    // git runs hooks from the repository directory
    let repo_path = std::env::current_dir().context("cannot determine repository path")?;

    let registry = hooks::default_registry();
    let code = hooks::dispatch(&registry, &argv, &repo_path)?;
    std::process::exit(code);
}
