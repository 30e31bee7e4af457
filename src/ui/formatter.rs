//! Pure formatting functions for UI output.
//!
//! Styling comes from `console`, which drops the escape codes when the
//! stream is not a terminal, as is the case when git relays hook output to
//! the pushing client.

use console::style;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").for_stderr().red(), message);
}

/// Print a final confirmation line exactly as given (green on a terminal).
pub fn display_done(message: &str) {
    println!("{}", style(message).green());
}

/// Build the usage text listing every registered hook.
///
/// # Arguments
/// * `program` - Name the binary was invoked as
/// * `hooks` - `(name, description)` pairs, in display order
pub fn format_usage(program: &str, hooks: &[(&str, &str)]) -> String {
    let width = hooks.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

    let mut text = format!(
        "Usage: {program} <hook-name> [hook-args...]\n   or: install {program} as .git/hooks/<hook-name>\n\nAvailable hooks:\n"
    );
    for (name, description) in hooks {
        text.push_str(&format!("  {:<width$}  {}\n", name, description, width = width));
    }
    text
}
