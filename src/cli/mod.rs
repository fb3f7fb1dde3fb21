//! [Command-line interface](Cli) (CLI) of the main binary.

pub mod analyze;
pub mod store;

use crate::Verbosity;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// ----------------------------------------------------------------------------
// CLI Entry Point
// ----------------------------------------------------------------------------

/// The command-line interface (CLI).
///
/// Parses user input from the command line in the main function:
/// ```no_run
/// use clap::Parser;
/// let args = repseq::Cli::parse();
/// ```
#[derive(Debug, Parser)]
#[clap(name = "repseq", author, version)]
#[clap(about = "repseq analyzes immune-receptor repertoires from Adaptive-style TSV files.")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,

    /// Set the output verbosity level.
    #[clap(short = 'v', long)]
    #[clap(value_enum, default_value_t = Verbosity::default())]
    #[clap(global = true)]
    pub verbosity: Verbosity,
}

/// Where the repertoire store lives and whose data to operate on.
#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    /// Base directory of the repertoire store.
    #[clap(short = 's', long, default_value = "store")]
    pub store: PathBuf,

    /// User id owning the data.
    #[clap(short = 'u', long)]
    pub user: String,

    /// Context (workspace) within the user's data.
    #[clap(short = 'c', long, default_value = "default")]
    pub context: String,
}

/// Result delivery shared by the analysis commands.
#[derive(Args, Clone, Debug, Default)]
pub struct OutputArgs {
    /// Print results as JSON instead of a table.
    #[clap(short = 'j', long)]
    pub json: bool,

    /// Also write the table to a .tsv/.csv file.
    #[clap(short = 'o', long)]
    pub output: Option<PathBuf>,
}

/// CLI [commands](#variants), one per operation.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List a user's contexts.
    Contexts(store::ContextsArgs),
    /// List the repertoires of a context.
    List(store::ListArgs),
    /// Import a repertoire TSV from a file or url.
    Import(store::ImportArgs),
    /// Export a repertoire as TSV or FASTA.
    Export(store::ExportArgs),
    /// Copy a repertoire to another user, context or name.
    Copy(store::CopyArgs),
    /// Move a repertoire to another user, context or name.
    Move(store::MoveArgs),
    /// Delete a repertoire.
    Delete(store::DeleteArgs),
    /// Show the top rearrangements of one or more repertoires.
    Top(analyze::TopArgs),
    /// Search repertoires for a motif.
    Search(analyze::SearchArgs),
    /// Compute the key overlap between repertoires.
    Overlap(analyze::OverlapArgs),
    /// Track target clones across repertoires.
    Track(analyze::TrackArgs),
    /// Aggregate V/J gene usage for a repertoire.
    GeneUse(analyze::GeneUseArgs),
    /// Show the reconciled segment partition of rearrangements.
    Segments(analyze::SegmentsArgs),
}
