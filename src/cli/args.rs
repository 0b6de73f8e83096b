// src/cli/args.rs
use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)] // Important: the dispatcher already consumed the command name
pub struct RunArgs {
    /// The Python script to run.
    pub script: String,

    /// Packages to install when no manifest is found next to the script.
    pub packages: Vec<String>,

    /// Manifest file to use (a .toml manifest or a requirements .txt).
    #[arg(long, short)]
    pub config: Option<String>,

    /// Virtual environment path (can be shared between scripts).
    #[arg(long)]
    pub env: Option<String>,

    /// Configuration profile to activate, overriding the manifest.
    #[arg(long, short)]
    pub profile: Option<String>,

    /// Restart on script changes, reinstall-and-restart on manifest changes.
    #[arg(long)]
    pub watch: bool,

    /// Run detached in the background and persist the child's PID.
    #[arg(long, short)]
    pub background: bool,

    /// Arguments passed through to the script (e.g. "[-p 8000 --debug]").
    #[arg(long, short)]
    pub extra: Option<String>,

    /// Reinstall every dependency even if nothing appears to have changed.
    #[arg(long)]
    pub force_update: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct PackageArgs {
    /// The package specifier to install or remove.
    pub package: String,

    /// The environment to operate on.
    #[arg(long)]
    pub env: String,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct EnvArg {
    /// The environment directory.
    pub env: String,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct EnvsArgs {
    /// Directory to scan for environments. Defaults to the current directory.
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct CleanupArgs {
    /// Remove environments unused for more than this many days.
    pub days: Option<u64>,

    /// Directory to scan for environments. Defaults to the current directory.
    #[arg(long)]
    pub root: Option<String>,

    /// Do not ask for confirmation.
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct CloneArgs {
    /// The environment to copy.
    pub source: String,

    /// The path of the copy. Must not exist yet.
    pub target: String,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct ResetArgs {
    /// The environment directory to delete.
    pub env: String,

    /// Do not ask for confirmation.
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
pub struct DoctorArgs {
    /// A specific environment to check. All local environments by default.
    pub env: Option<String>,
}
