use clap::Parser;
use color_eyre::eyre::{Report, Result};
use repseq::cli::{analyze, store, Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Report> {
    // ------------------------------------------------------------------------
    // CLI Setup

    // Parse CLI parameters
    let args = Cli::parse();

    // initialize color_eyre crate for colorized logs
    color_eyre::install()?;

    // Set logging/verbosity level via RUST_LOG
    std::env::set_var("RUST_LOG", args.verbosity.to_string());

    // initialize env_logger crate for logging/verbosity level
    env_logger::init();

    match args.command {
        Command::Contexts(args) => store::contexts(&args)?,
        Command::List(args) => store::list(&args)?,
        Command::Import(args) => store::import(&args).await?,
        Command::Export(args) => store::run_export(&args)?,
        Command::Copy(args) => store::copy(&args)?,
        Command::Move(args) => store::run_move(&args)?,
        Command::Delete(args) => store::delete(&args)?,
        Command::Top(args) => analyze::top(&args)?,
        Command::Search(args) => analyze::search(&args)?,
        Command::Overlap(args) => analyze::run_overlap(&args)?,
        Command::Track(args) => analyze::run_track(&args)?,
        Command::GeneUse(args) => analyze::gene_use(&args)?,
        Command::Segments(args) => analyze::segments(&args)?,
    }

    Ok(())
}
