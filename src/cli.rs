// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{ArgGroup, Parser, Subcommand};
use ephem::store::{CleanupPolicy, TestStatus};

#[derive(Parser)]
#[command(name = "ephem")]
#[command(about = "Provision, monitor, and clean up ephemeral cloud test environments")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results (for CI)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ephem.yml configuration file
    Init {
        /// Owner contact recorded on every environment
        #[arg(long)]
        owner: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Provision scenarios, wait for them, and apply the cleanup policy
    Deploy {
        /// Scenario to deploy (repeatable; default: all configured scenarios)
        #[arg(short, long = "scenario")]
        scenarios: Vec<String>,

        /// Cleanup policy for these deployments (immediate, on-success, manual, scheduled)
        #[arg(long)]
        cleanup_policy: Option<CleanupPolicy>,

        /// Branch recorded on the deployments (default: current git branch)
        #[arg(long)]
        branch: Option<String>,

        /// Print progress lines instead of the live table
        #[arg(long)]
        no_live: bool,
    },

    /// Resume monitoring of deployments still in flight
    Monitor {
        /// Print progress lines instead of the live table
        #[arg(long)]
        no_live: bool,
    },

    /// Show recorded deployments
    Status {
        /// Include deleted deployments
        #[arg(short, long)]
        all: bool,

        /// List managed environments that have no local record
        #[arg(long)]
        orphans: bool,
    },

    /// Tear down deployments according to their cleanup policy
    #[command(group(
        ArgGroup::new("selector")
            .required(true)
            .args(["id", "all", "older_than"])
    ))]
    Cleanup {
        /// Deployment id, unique id prefix, or unique substring
        #[arg(long)]
        id: Option<String>,

        /// Every deployment not yet deleted
        #[arg(long)]
        all: bool,

        /// Deployments older than an age such as 30m, 2h, 3d, or 1w
        #[arg(long)]
        older_than: Option<String>,

        /// Ignore cleanup policy and the managed-tag safety check
        #[arg(short, long)]
        force: bool,

        /// Show what would be destroyed without destroying anything
        #[arg(long)]
        dry_run: bool,

        /// Wait for teardown to finish
        #[arg(long)]
        wait: bool,
    },

    /// Record the downstream test result for a deployment
    TestResult {
        /// Deployment id, unique id prefix, or unique substring
        id: String,

        /// passed, failed, or not-run
        status: TestStatus,
    },
}
