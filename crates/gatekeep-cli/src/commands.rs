//! CLI command definitions.

use crate::config::parse_key_value;
use clap::{Args, Subcommand};
use gatekeep_core::event::AuthorRole;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a pipeline definition
    Validate {
        #[command(flatten)]
        source: DefinitionArgs,
    },

    /// Evaluate a VCS event and print the decision for every matched trigger
    Evaluate {
        #[command(flatten)]
        source: DefinitionArgs,

        #[command(flatten)]
        event: EventArgs,

        /// User parameter override (repeatable)
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// Builds already running on the event's branch
        #[arg(long, default_value_t = 0)]
        running: usize,
    },

    /// Show the resolved parameters of a trigger
    Params {
        #[command(flatten)]
        source: DefinitionArgs,

        /// Trigger name
        #[arg(short, long)]
        trigger: String,

        /// Branch the build runs on (defaults to the definition's default branch)
        #[arg(short, long)]
        branch: Option<String>,

        /// User parameter override (repeatable)
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },

    /// Print the JSON Schema of the definition format
    Schema,
}

#[derive(Args)]
pub struct DefinitionArgs {
    /// Path to the pipeline definition
    #[arg(env = "GATEKEEP_DEFINITION", default_value = "gatekeep.yaml")]
    pub definition: PathBuf,

    /// Patch applied after loading (repeatable, applied in order)
    #[arg(long = "patch")]
    pub patches: Vec<PathBuf>,
}

#[derive(Args)]
pub struct EventArgs {
    /// Read the event from a JSON or YAML file
    #[arg(long, conflicts_with = "branch")]
    pub event: Option<PathBuf>,

    /// Branch the event refers to
    #[arg(short, long, required_unless_present = "event")]
    pub branch: Option<String>,

    /// Commit message
    #[arg(short, long, default_value = "")]
    pub message: String,

    /// Treat the event as a pull request
    #[arg(long)]
    pub pr: bool,

    /// Pull request author role (member, non-member, unknown)
    #[arg(long, default_value = "unknown")]
    pub author_role: AuthorRole,

    /// Pull request target branch
    #[arg(long)]
    pub target_branch: Option<String>,

    /// Pull request is a draft
    #[arg(long)]
    pub draft: bool,

    /// Changed path (repeatable)
    #[arg(long = "path")]
    pub paths: Vec<String>,
}
