//! Store-facing commands: list, import, export, copy, move, delete.

use crate::admin;
use crate::cli::StoreArgs;
use crate::export;
use crate::repertoire::Repertoire;
use crate::store::{ContextStore, FileStore, RepertoireStore};
use crate::table::Table;
use crate::tsv::{self, ReceiveOptions, ReceiveOutcome};
use crate::utils;
use chrono::NaiveDate;
use clap::Args;
use color_eyre::eyre::{eyre, Report, Result};
use color_eyre::Help;
use indicatif::ProgressBar;
use indoc::formatdoc;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Contexts

#[derive(Args, Debug)]
pub struct ContextsArgs {
    #[clap(flatten)]
    pub store: StoreArgs,
}

pub fn contexts(args: &ContextsArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let contexts = store.user_contexts(&args.store.user)?;

    let mut table = Table::new(vec!["Context"]);
    for context in contexts {
        table.add_row(vec![context]);
    }
    println!("{}", table.to_markdown());
    Ok(())
}

// ----------------------------------------------------------------------------
// List

#[derive(Args, Debug)]
pub struct ListArgs {
    #[clap(flatten)]
    pub store: StoreArgs,
}

pub fn list(args: &ListArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let crs = ContextStore::open(&store, &args.store.user, &args.store.context)?;

    let mut table =
        Table::new(vec!["Name", "Date", "Uniques", "Count", "Cells", "Milliliters"]);
    let mut repertoires: Vec<Repertoire> = crs.repertoires().to_vec();
    repertoires.sort_by(|a, b| a.chronological(b));

    for r in repertoires {
        table.add_row(vec![
            r.name.clone(),
            r.date.map(|d| d.to_string()).unwrap_or_default(),
            r.total_uniques.to_string(),
            r.total_count.to_string(),
            r.total_cells.to_string(),
            format!("{:.1}", r.total_milliliters),
        ]);
    }
    println!("{}", table.to_markdown());
    Ok(())
}

// ----------------------------------------------------------------------------
// Import

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Name for the imported repertoire.
    #[clap(short = 'n', long)]
    pub name: String,

    /// Local TSV file (.tsv, or .tsv.zst for compressed).
    #[clap(short = 'f', long, conflicts_with = "url")]
    pub file: Option<PathBuf>,

    /// Fetch the TSV from a url instead of a local file.
    #[clap(long)]
    pub url: Option<String>,

    /// Effective sample date (yyyy-mm-dd).
    #[clap(short = 'd', long)]
    pub date: Option<NaiveDate>,

    /// Total cells, when the file does not carry them.
    #[clap(long)]
    pub cells: Option<u64>,

    /// Sample volume in milliliters, for cell-free assays.
    #[clap(short = 'm', long)]
    pub milliliters: Option<f64>,
}

pub async fn import(args: &ImportArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let spec = crate::repertoire::RepertoireSpec::new(
        &args.store.user,
        &args.store.context,
        &args.name,
    );

    // the staging dir must outlive the read below, hence the binding
    let mut staging: Option<tempfile::TempDir> = None;
    let path = match (&args.file, &args.url) {
        (Some(path), _) => path.clone(),
        (None, Some(url)) => {
            let dir = tempfile::tempdir()?;
            let fetched = utils::download_file(url, dir.path()).await?;
            staging.replace(dir);
            fetched
        }
        (None, None) => {
            return Err(eyre!("Nothing to import.")
                .suggestion("Pass --file <path> or --url <url>."))
        }
    };

    let options = ReceiveOptions {
        date: args.date,
        total_cells: args.cells,
        total_milliliters: args.milliliters,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("importing {}", spec));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let input = utils::open_maybe_compressed(&path)?;
    let outcome = tsv::receive(input, &store, &spec, &options)?;
    spinner.finish_and_clear();
    drop(staging);

    match outcome {
        ReceiveOutcome::Exists => {
            Err(eyre!("Repertoire {spec} already exists; nothing imported.")
                .suggestion("Delete it first, or import under a different --name."))
        }
        ReceiveOutcome::Received(repertoire) => {
            let summary = formatdoc!(
                "imported {name}
                   uniques: {uniques}
                   count: {count}
                   cells: {cells}",
                name = repertoire.name,
                uniques = repertoire.total_uniques,
                count = repertoire.total_count,
                cells = repertoire.total_cells,
            );
            info!("{summary}");
            println!("{summary}");
            Ok(())
        }
    }
}

// ----------------------------------------------------------------------------
// Export

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Repertoire to export.
    #[clap(short = 'n', long)]
    pub name: String,

    /// Export format.
    #[clap(short = 'f', long, value_enum, default_value_t = export::Format::default())]
    pub format: export::Format,

    /// Output file; defaults to `<name>.<ext>` in the working directory.
    #[clap(short = 'o', long)]
    pub output: Option<PathBuf>,
}

pub fn run_export(args: &ExportArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let crs = ContextStore::open(&store, &args.store.user, &args.store.context)?;

    let output = match &args.output {
        Some(path) => path.clone(),
        None => PathBuf::from(format!("{}.{}", args.name, args.format.extension())),
    };

    export::export(&crs, &args.name, args.format, &output)?;
    println!("exported {} to {output:?}", args.name);
    Ok(())
}

// ----------------------------------------------------------------------------
// Copy / Move / Delete

#[derive(Args, Debug)]
pub struct CopyArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Source repertoire name.
    #[clap(short = 'n', long)]
    pub name: String,

    /// Destination user; defaults to the source user.
    #[clap(long)]
    pub to_user: Option<String>,

    /// Destination context; defaults to the source context.
    #[clap(long)]
    pub to_context: Option<String>,

    /// Destination name; defaults to the source name.
    #[clap(long)]
    pub to_name: Option<String>,
}

impl CopyArgs {
    fn params(&self) -> admin::MoveCopyParams {
        let from = crate::repertoire::RepertoireSpec::new(
            &self.store.user,
            &self.store.context,
            &self.name,
        );
        let to = crate::repertoire::RepertoireSpec::new(
            self.to_user.as_deref().unwrap_or(&self.store.user),
            self.to_context.as_deref().unwrap_or(&self.store.context),
            self.to_name.as_deref().unwrap_or(&self.name),
        );
        admin::MoveCopyParams { from, to }
    }
}

pub fn copy(args: &CopyArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let params = args.params();

    match admin::copy_repertoire(&store, &params)? {
        ReceiveOutcome::Received(_) => {
            println!("copied {params}");
            Ok(())
        }
        ReceiveOutcome::Exists => Err(eyre!("Destination {} already exists.", params.to)),
    }
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    #[clap(flatten)]
    pub copy: CopyArgs,
}

pub fn run_move(args: &MoveArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.copy.store.store)?;
    let params = args.copy.params();

    if admin::move_repertoire(&store, &params)? {
        println!("moved {params}");
        Ok(())
    } else {
        Err(eyre!("Move failed for {params}"))
    }
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Repertoire to delete.
    #[clap(short = 'n', long)]
    pub name: String,
}

pub fn delete(args: &DeleteArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let spec = crate::repertoire::RepertoireSpec::new(
        &args.store.user,
        &args.store.context,
        &args.name,
    );

    if admin::delete_repertoire(&store, &spec)? {
        println!("deleted {spec}");
        Ok(())
    } else {
        Err(eyre!("Repertoire {spec} not found."))
    }
}
