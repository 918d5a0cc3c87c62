use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cirrus")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative App Service provisioning", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emulator state file (overrides `state_file` in config.toml)
    #[arg(long, env = "CIRRUS_STATE", global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change, without changing anything
    Plan(ManifestArgs),

    /// Converge resources to the desired state in a manifest
    Apply(ApplyArgs),

    /// Show the observed state of every resource a manifest names
    Collect(CollectArgs),

    /// Show desired vs observed state as a unified diff
    Diff(ManifestArgs),

    /// List valid values for resource attributes
    #[command(subcommand)]
    Suggest(SuggestCommand),

    /// Inspect host configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Manifest Commands
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct ManifestArgs {
    /// Manifest file, or a directory of *.toml manifests
    pub path: PathBuf,

    /// Only resources matching a kind, kind.name or resource group
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip caller-side validation against the catalogs
    #[arg(long)]
    pub no_validate: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of resource groups converged in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Cancel outstanding work after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Toml)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Toml,
    Json,
}

// ============================================================================
// Suggest Commands
// ============================================================================

#[derive(Subcommand, Debug, Clone)]
pub enum SuggestCommand {
    /// Regions, with display and programmatic names
    Regions,

    /// App Service pricing tiers
    PricingTiers,

    /// Runtime versions for a stack (net, php, python, java)
    Runtimes {
        /// Runtime stack
        stack: String,
    },

    /// Java web containers
    WebContainers,

    /// Resource groups that already exist
    ResourceGroups,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show the config file location and effective settings
    Show,
}
