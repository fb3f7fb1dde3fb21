//! The top X rearrangements of each repertoire under a chosen sort.


use crate::repertoire::{Rearrangement, Repertoire, RepertoireResult};
use crate::store::ContextStore;
use crate::tsv;
use clap::ValueEnum;
use color_eyre::eyre::{eyre, Report, Result};
use color_eyre::Help;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ----------------------------------------------------------------------------
// Config

#[derive(Clone, Debug)]
pub struct Config {
    /// Upper bound on how many rows a caller may request.
    pub max_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config { max_count: 500 }
    }
}

// ----------------------------------------------------------------------------
// Sort

/// Ranking criterion; larger is better for all of them.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, ValueEnum)]
pub enum Sort {
    #[default]
    Count,
    FractionOfCells,
    FractionOfLocus,
    FractionOfCount,
    /// Dx-flagged clones first, then fraction of locus.
    DxPotential,
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Sort::Count => "count",
            Sort::FractionOfCells => "fraction-of-cells",
            Sort::FractionOfLocus => "fraction-of-locus",
            Sort::FractionOfCount => "fraction-of-count",
            Sort::DxPotential => "dx-potential",
        };
        write!(f, "{name}")
    }
}

impl Sort {
    fn compare(&self, a: &Rearrangement, b: &Rearrangement, repertoire: &Repertoire) -> Ordering {
        match self {
            Sort::Count => a.count.cmp(&b.count),
            Sort::FractionOfCells => {
                total_order(a.fraction_of_cells(repertoire), b.fraction_of_cells(repertoire))
            }
            Sort::FractionOfLocus => {
                total_order(a.fraction_of_locus(repertoire), b.fraction_of_locus(repertoire))
            }
            Sort::FractionOfCount => {
                total_order(a.fraction_of_count(repertoire), b.fraction_of_count(repertoire))
            }
            Sort::DxPotential => a.dx.cmp(&b.dx).then_with(|| {
                total_order(a.fraction_of_locus(repertoire), b.fraction_of_locus(repertoire))
            }),
        }
    }
}

fn total_order(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

// ----------------------------------------------------------------------------
// TopX

#[derive(Clone, Debug)]
pub struct Params {
    pub repertoires: Vec<String>,
    pub sort: Sort,
    pub count: usize,
}

/// The best `count` rearrangements of each repertoire, one streaming pass
/// per file, repertoires in parallel.
pub fn top(crs: &ContextStore, params: &Params, cfg: &Config) -> Result<Vec<RepertoireResult>, Report> {
    if params.count > cfg.max_count {
        return Err(eyre!("Row count {} above configured max {}", params.count, cfg.max_count)
            .suggestion("Request fewer rows per repertoire."));
    }

    params
        .repertoires
        .par_iter()
        .map(|name| {
            let repertoire = crs.require(name)?.clone();
            let mut reader = tsv::Reader::new(crs.open_repertoire(name)?, 0);

            let mut best: Vec<Rearrangement> = Vec::with_capacity(params.count + 1);
            while let Some(r) = reader.read_next()? {
                insert_bounded(&mut best, r, params.count, |a, b| {
                    params.sort.compare(a, b, &repertoire)
                });
            }

            Ok(RepertoireResult { repertoire, rearrangements: best, ..Default::default() })
        })
        .collect()
}

/// Keep `rearrangements` sorted best-first and at most `max_size` long.
///
/// The walk runs from the tail because a streaming row usually ranks below
/// everything already kept.
fn insert_bounded(
    rearrangements: &mut Vec<Rearrangement>,
    r: Rearrangement,
    max_size: usize,
    compare: impl Fn(&Rearrangement, &Rearrangement) -> Ordering,
) {
    if max_size == 0 {
        return;
    }

    let mut at = rearrangements.len();
    while at > 0 && compare(&r, &rearrangements[at - 1]) == Ordering::Greater {
        at -= 1;
    }

    if rearrangements.len() < max_size {
        rearrangements.insert(at, r);
    } else if at < rearrangements.len() {
        rearrangements.insert(at, r);
        rearrangements.truncate(max_size);
    }
}
