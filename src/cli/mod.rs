use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "ticket-flow")]
#[command(about = "Ticket status transition engine for repair-shop workflows")]
#[command(long_about = "ticket-flow loads a workflow definition (statuses, actions, ticket types and \
                       transition rules) and answers which status a ticket moves to when an action \
                       is applied. Without --definition the built-in repair workflow is used.")]
pub struct Cli {
    /// Workflow definition file (TOML)
    #[arg(long, global = true, help = "Workflow definition to load instead of the built-in one")]
    pub definition: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the workflow definition and report dead-end statuses
    Check,
    /// Resolve the target status for an action
    Resolve {
        /// Current status code
        #[arg(long)]
        status: String,
        /// Action code
        #[arg(long)]
        action: String,
        /// Ticket type code
        #[arg(long)]
        ticket_type: String,
    },
    /// List the actions that can be applied from a status
    Actions {
        #[arg(long)]
        status: String,
        #[arg(long)]
        ticket_type: String,
    },
    /// List transition rules
    Rules {
        #[arg(long)]
        ticket_type: Option<String>,
        #[arg(long)]
        from_status: Option<String>,
        #[arg(long, help = "Hide deactivated rules")]
        active_only: bool,
    },
    /// Show the lifecycle graph of a ticket type
    Graph {
        #[arg(long)]
        ticket_type: String,
    },
    /// Print the loaded workflow definition as TOML
    Export,
}
