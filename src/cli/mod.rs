pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "teampulse",
    about = "Daily stand-up aggregation & team health digests"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive setup of the config file and the default organization.
    Onboard {
        #[arg(long, default_value_t = false)]
        seed_demo: bool,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Load the embedded demo organization.
    Seed,
    /// Run the HTTP API and the daily digest scheduler.
    Serve,
    Status,
    Doctor,
    /// List teams.
    Team,
    /// Print a team (or department) health summary.
    Summary {
        #[arg(long, conflicts_with = "dept")]
        team: Option<String>,
        #[arg(long)]
        dept: Option<String>,
        #[arg(long)]
        date: Option<String>,
        /// Dashboard filters as a query string, e.g. "filter=highRisk&q=ann".
        #[arg(long)]
        filter: Option<String>,
    },
    /// Compose and store the manager digest.
    Digest {
        #[arg(long, conflicts_with = "dept")]
        team: Option<String>,
        #[arg(long)]
        dept: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    Mentor {
        #[arg(long)]
        user: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Turn free text into a structured task.
    Structure { text: String },
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum AiCommands {
    Test {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}
