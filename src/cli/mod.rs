use clap::Parser;

pub mod args;
pub mod handlers;

/// Builds the dynamic, color-aware full help string at runtime.
fn build_help_string() -> &'static str {
    // This function acts as a mini-renderer for our semantic help template.
    // It replaces placeholders like `<title>` with colored/styled text.

    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let template = t!("cli.help.template");

    // Define styles. If colors are disabled, they are empty strings.
    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan (for commands)
    let group = if use_colors { "\x1b[1;32m" } else { "" }; // Bold Green
    let err = if use_colors { "\x1b[91m" } else { "" }; // Bright Red (for destructive)
    let dim = if use_colors { "\x1b[2m" } else { "" }; // Dim
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = template
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<group>", group)
        .replace("</group>", reset)
        .replace("<err>", err)
        .replace("</err>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    Box::leak(formatted_string.into_boxed_str())
}

/// pyrun: a self-healing Python virtual environment manager and script runner.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// The command followed by its arguments, or directly a script to run.
    #[arg()]
    pub args: Vec<String>,
}
