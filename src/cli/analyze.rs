//! Analysis commands: top, search, overlap, track, gene-use, segments.

use crate::cli::{OutputArgs, StoreArgs};
use crate::geneuse;
use crate::keys::KeyType;
use crate::overlap;
use crate::repertoire::{Rearrangement, RepertoireResult};
use crate::search;
use crate::segments::Segment;
use crate::store::{ContextStore, FileStore};
use crate::table::Table;
use crate::topx;
use crate::track;
use crate::tsv;
use clap::Args;
use color_eyre::eyre::{Report, Result};
use console::Style;
use itertools::Itertools;
use serde::Serialize;
use strum::IntoEnumIterator;

// ----------------------------------------------------------------------------
// Shared helpers

fn open<'s>(store: &'s FileStore, args: &StoreArgs) -> Result<ContextStore<'s>, Report> {
    ContextStore::open(store, &args.user, &args.context)
}

/// Print JSON or a table, optionally writing the table to a file.
fn deliver<T: Serialize>(value: &T, table: Table, output: &OutputArgs) -> Result<(), Report> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", table.to_markdown());
    }
    if let Some(path) = &output.output {
        table.write(path)?;
    }
    Ok(())
}

fn results_table(results: &[RepertoireResult]) -> Table {
    let mut table = Table::new(vec![
        "Repertoire",
        "Rearrangement",
        "AminoAcid",
        "Frame",
        "Count",
        "FractionOfLocus",
    ]);

    for result in results {
        for r in &result.rearrangements {
            table.add_row(vec![
                result.repertoire.name.clone(),
                r.rearrangement.clone(),
                r.amino_acid.clone(),
                format!("{:?}", r.frame_type),
                r.count.to_string(),
                format!("{:.5}", r.fraction_of_locus(&result.repertoire)),
            ]);
        }
    }
    table
}

// ----------------------------------------------------------------------------
// Top

#[derive(Args, Debug)]
pub struct TopArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Repertoires to rank, comma separated.
    #[clap(short = 'r', long, value_delimiter = ',', required = true)]
    pub repertoires: Vec<String>,

    /// Ranking criterion.
    #[clap(long, value_enum, default_value_t = topx::Sort::default())]
    pub sort: topx::Sort,

    /// Rows per repertoire.
    #[clap(long, default_value_t = 25)]
    pub count: usize,

    #[clap(flatten)]
    pub output: OutputArgs,
}

pub fn top(args: &TopArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let crs = open(&store, &args.store)?;

    let params = topx::Params {
        repertoires: args.repertoires.clone(),
        sort: args.sort,
        count: args.count,
    };
    let results = topx::top(&crs, &params, &topx::Config::default())?;

    deliver(&results, results_table(&results), &args.output)
}

// ----------------------------------------------------------------------------
// Search

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Repertoires to search, comma separated.
    #[clap(short = 'r', long, value_delimiter = ',', required = true)]
    pub repertoires: Vec<String>,

    /// Motif to look for.
    #[clap(short = 'm', long)]
    pub motif: String,

    /// Key string the motif is matched against.
    #[clap(short = 'k', long, value_enum, default_value_t = KeyType::default())]
    pub key_type: KeyType,

    /// Mismatches a hit may contain.
    #[clap(long, default_value_t = 0)]
    pub mutations: usize,

    #[clap(flatten)]
    pub output: OutputArgs,
}

pub fn search(args: &SearchArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let crs = open(&store, &args.store)?;

    let params = search::Params {
        repertoires: args.repertoires.clone(),
        motif: args.motif.clone(),
        key_type: args.key_type,
        allowed_mutations: args.mutations,
    };
    let results = search::search(&crs, &params)?;

    deliver(&results, results_table(&results), &args.output)
}

// ----------------------------------------------------------------------------
// Overlap

#[derive(Args, Debug)]
pub struct OverlapArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Repertoires to compare, comma separated.
    #[clap(short = 'r', long, value_delimiter = ',', required = true)]
    pub repertoires: Vec<String>,

    /// Key string compared across repertoires.
    #[clap(short = 'k', long, value_enum, default_value_t = KeyType::default())]
    pub key_type: KeyType,

    /// Report every key grouped by count profile, not just shared ones.
    #[clap(long)]
    pub combined: bool,

    #[clap(flatten)]
    pub output: OutputArgs,
}

pub fn run_overlap(args: &OverlapArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let crs = open(&store, &args.store)?;

    let params = overlap::Params {
        repertoires: args.repertoires.clone(),
        key_type: args.key_type,
        mode: if args.combined { overlap::Mode::Combined } else { overlap::Mode::Standard },
    };
    let result = overlap::overlap(&crs, &params, &overlap::Config::default())?;

    let mut headers = vec!["Key".to_string(), "Keys".to_string(), "PresentIn".to_string()];
    headers.extend(result.repertoires.iter().map(|r| r.name.clone()));
    let mut table = Table::new(headers.iter().map(String::as_str).collect());

    for item in &result.items {
        let mut row = vec![
            item.key.clone(),
            item.key_count.to_string(),
            item.present_in.to_string(),
        ];
        row.extend(item.counts.iter().map(|count| count.to_string()));
        table.add_row(row);
    }

    if result.truncated {
        log::warn!("overlap results truncated to the best {}", result.items.len());
    }

    deliver(&result, table, &args.output)
}

// ----------------------------------------------------------------------------
// Track

#[derive(Args, Debug)]
pub struct TrackArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Repertoires to track across, comma separated.
    #[clap(short = 'r', long, value_delimiter = ',', required = true)]
    pub repertoires: Vec<String>,

    /// Target nucleotide sequences, comma separated.
    #[clap(short = 't', long, value_delimiter = ',')]
    #[clap(required_unless_present = "dx_options")]
    pub targets: Vec<String>,

    /// Suggest trackable clones instead of counting targets.
    #[clap(long)]
    pub dx_options: bool,

    /// Minimum matched bases for a clone hit.
    #[clap(long, default_value_t = 25)]
    pub min_match: usize,

    #[clap(flatten)]
    pub output: OutputArgs,
}

pub fn run_track(args: &TrackArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let crs = open(&store, &args.store)?;
    let mrd = track::MrdEngine::new(track::MrdConfig { min_match_length: args.min_match });

    if args.dx_options {
        let results =
            track::dx_options(&crs, &args.repertoires, &track::Config::default(), &mrd)?;
        return deliver(&results, results_table(&results), &args.output);
    }

    let targets = args
        .targets
        .iter()
        .map(|sequence| Rearrangement {
            rearrangement: sequence.clone(),
            ..Default::default()
        })
        .collect();

    let params = track::Params { repertoires: args.repertoires.clone(), targets };
    let results = track::track(&crs, &params, &track::Config::default(), &mrd)?;

    let mut headers = vec!["Target".to_string()];
    headers.extend(results.repertoires.iter().map(|r| r.name.clone()));
    let mut table = Table::new(headers.iter().map(String::as_str).collect());

    for values in &results.target_values {
        let mut row = vec![values.target.rearrangement.clone()];
        row.extend(values.values.iter().map(|count| count.to_string()));
        table.add_row(row);
    }

    deliver(&results, table, &args.output)
}

// ----------------------------------------------------------------------------
// GeneUse

#[derive(Args, Debug)]
pub struct GeneUseArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Repertoire to aggregate.
    #[clap(short = 'n', long)]
    pub name: String,

    /// Keep rearrangements with an unresolved gene, bucketed as X.
    #[clap(long)]
    pub include_unknown: bool,

    /// Keep family-only calls, bucketed as <family>-X.
    #[clap(long)]
    pub include_family_only: bool,

    #[clap(flatten)]
    pub output: OutputArgs,
}

pub fn gene_use(args: &GeneUseArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let crs = open(&store, &args.store)?;

    let params = geneuse::Params {
        repertoire: args.name.clone(),
        include_unknown: args.include_unknown,
        include_family_only: args.include_family_only,
    };
    let usage = geneuse::gene_use(&crs, &params)?;

    let mut table = Table::new(vec!["V", "J", "Count"]);
    for at in 0..usage.counts.len() {
        table.add_row(vec![
            usage.v_genes[at].clone(),
            usage.j_genes[at].clone(),
            usage.counts[at].to_string(),
        ]);
    }

    deliver(&usage, table, &args.output)
}

// ----------------------------------------------------------------------------
// Segments

#[derive(Args, Debug)]
pub struct SegmentsArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Repertoire to display.
    #[clap(short = 'n', long)]
    pub name: String,

    /// First row to display.
    #[clap(long, default_value_t = 0)]
    pub start: usize,

    /// Rows to display.
    #[clap(long, default_value_t = 25)]
    pub count: usize,
}

fn segment_style(segment: Segment) -> Style {
    match segment {
        Segment::V => Style::new().blue(),
        Segment::N1 => Style::new().magenta(),
        Segment::D => Style::new().red(),
        Segment::N2 => Style::new().yellow(),
        Segment::J => Style::new().green(),
    }
}

/// Print rearrangements with their segment partitions color-coded.
pub fn segments(args: &SegmentsArgs) -> Result<(), Report> {
    let store = FileStore::new(&args.store.store)?;
    let crs = open(&store, &args.store)?;
    crs.require(&args.name)?;

    let legend = Segment::iter()
        .map(|segment| segment_style(segment).apply_to(segment).to_string())
        .join(" ");
    println!("segments: {legend}");

    let mut reader = tsv::Reader::new(crs.open_repertoire(&args.name)?, args.start);
    for r in reader.read_batch(args.count)? {
        let colored = r
            .segments()
            .iter()
            .map(|span| segment_style(span.segment).apply_to(span.text).to_string())
            .collect::<String>();
        println!("{:>8}  {colored}", r.count);
    }

    Ok(())
}
