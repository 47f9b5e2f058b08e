use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strato_models::ResourceKind;

/// Strato - managed cloud resource provisioning
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Provision resources from a spec file
    Provision {
        /// Path to the YAML spec file
        #[arg(short, long)]
        spec: PathBuf,

        /// Only provision the named resource from the file
        #[arg(long)]
        only: Option<String>,
    },

    /// Decommission resources by instance id
    Decommission {
        /// Instance ids to tear down
        ids: Vec<String>,

        /// Resource kind of the listed ids
        #[arg(short, long)]
        kind: Option<ResourceKind>,

        /// Companion elastic addresses, matched to ids by position
        #[arg(long = "eip")]
        eips: Vec<String>,

        /// Path to a YAML file listing teardown targets
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List instances of a product
    List {
        /// Resource kind to list
        #[arg(short, long)]
        kind: ResourceKind,

        /// Output format (table or json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}
