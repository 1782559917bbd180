use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mlproj")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative environments for MarkLogic projects", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Which environment to compile, and the parameters to compile it with
#[derive(Args, Debug, Default)]
pub struct ProjectArgs {
    /// Project directory
    #[arg(short, long, default_value = ".", global = true)]
    pub dir: String,

    /// Environment name, read from xproject/ml/{env}.json
    #[arg(short, long, global = true, conflicts_with = "file")]
    pub env: Option<String>,

    /// Environment file, instead of a named environment
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Set a parameter, as name=value (@name for identity parameters)
    #[arg(short, long = "param", value_name = "NAME=VALUE", global = true)]
    pub params: Vec<String>,

    /// Override the host to connect to
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Override the user to connect with
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Override the password to connect with
    #[arg(short = 'z', long, global = true, env = "MLPROJ_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the compiled environment
    Show,

    /// Create or update databases, forests, servers and security resources
    Setup(SetupArgs),

    /// Load the files of a source set as documents
    Load(LoadArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct SetupArgs {
    /// Print the plan without executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct LoadArgs {
    /// Source set to load
    pub source: String,

    /// Target database (id or name)
    #[arg(long, conflicts_with = "srv")]
    pub db: Option<String>,

    /// Target server (id or name), loading into its content database
    #[arg(long)]
    pub srv: Option<String>,

    /// Print the plan without executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}
