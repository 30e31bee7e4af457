use std::path::Path;

use clap::Parser;
use tracing::debug;

use crate::hooks::HookRegistry;
use crate::ui;

/// Explicit form: `<binary> <hook-name> [hook-args...]`
///
/// There are no flags; anything after the binary name is positional so
/// hook arguments starting with `-` pass through untouched.
#[derive(Parser, Debug)]
#[command(
    name = "sieve-git-pushdeploy",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct InvocationArgs {
    #[arg(allow_hyphen_values = true)]
    hook: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// Which hook to run and with what
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub hook_name: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Work out the hook from the full argument vector.
    ///
    /// With only the program name present, the hook is the last path
    /// component of argv[0], which is how git runs a symlinked hook.
    /// Otherwise argv[1] names the hook and the rest are its arguments.
    pub fn from_argv(argv: &[String]) -> Result<Self, clap::Error> {
        if argv.len() <= 1 {
            return Ok(Invocation {
                hook_name: program_name(argv),
                args: Vec::new(),
            });
        }

        let parsed = InvocationArgs::try_parse_from(argv)?;
        Ok(Invocation {
            hook_name: parsed.hook.unwrap_or_default(),
            args: parsed.args,
        })
    }
}

fn program_name(argv: &[String]) -> String {
    argv.first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Run the hook named by `argv` against the repository at `repo_path`.
///
/// Returns the process exit code. Unknown hook names print the usage text
/// and give 1; configuration and protocol errors are reported and give 1.
/// Any other error is returned for the caller to report.
pub fn dispatch(registry: &HookRegistry, argv: &[String], repo_path: &Path) -> anyhow::Result<i32> {
    let invocation = match Invocation::from_argv(argv) {
        Ok(invocation) => Some(invocation),
        Err(e) => {
            debug!(error = %e, "cannot parse arguments");
            None
        }
    };

    let hook = invocation
        .as_ref()
        .and_then(|invocation| registry.get(&invocation.hook_name));
    let (Some(invocation), Some(hook)) = (invocation.as_ref(), hook) else {
        print_usage(registry);
        return Ok(1);
    };

    debug!(hook = hook.name(), repo = %repo_path.display(), "running hook");
    match hook.run(repo_path, &invocation.args) {
        Ok(code) => Ok(code),
        Err(e) if e.is_expected() => {
            debug!(error = ?e, "hook failed");
            ui::display_error(&e.to_string());
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

/// Usage text for `registry`
pub fn usage(registry: &HookRegistry) -> String {
    let hooks: Vec<(&str, &str)> = registry
        .hooks()
        .map(|hook| (hook.name(), hook.description()))
        .collect();
    ui::format_usage(env!("CARGO_PKG_NAME"), &hooks)
}

fn print_usage(registry: &HookRegistry) {
    eprint!("{}", usage(registry));
}
