//! Track clones across repertoires over time.

#[cfg(test)]
pub mod tests;

use crate::repertoire::{Rearrangement, Repertoire, RepertoireResult};
use crate::store::ContextStore;
use crate::topx;
use crate::tsv;
use color_eyre::eyre::{eyre, Report, Result};
use color_eyre::Help;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// MrdEngine

/// Cross-assay clone matching.
///
/// Tracking runs across assay versions whose reads cover different amounts
/// of the rearrangement, so two reports of one clone rarely have equal
/// sequences. Matching aligns both sequences on their J index (or on their
/// right edge when either J call is unusable) and scans outward; a match
/// must cover the shorter sequence completely. Without a minimum matched
/// length, very short sequences over-match, so that floor is configurable.
#[derive(Clone, Debug)]
pub struct MrdConfig {
    pub min_match_length: usize,
}

impl Default for MrdConfig {
    fn default() -> Self {
        MrdConfig { min_match_length: 25 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MrdEngine {
    cfg: MrdConfig,
}

impl MrdEngine {
    pub fn new(cfg: MrdConfig) -> Self {
        MrdEngine { cfg }
    }

    /// True when the two rearrangements look like the same clone.
    pub fn matches(&self, a: &Rearrangement, b: &Rearrangement) -> bool {
        self.matches_anchored(&a.rearrangement, a.j_index, &b.rearrangement, b.j_index)
    }

    pub fn matches_anchored(
        &self,
        a: &str,
        a_j: Option<usize>,
        b: &str,
        b_j: Option<usize>,
    ) -> bool {
        let a = a.as_bytes();
        let b = b.as_bytes();

        // knowing one J index but not the other is no help; fall back to
        // aligning both right edges
        let (anchor_a, anchor_b) = match (a_j, b_j) {
            (Some(a_j), Some(b_j)) if a_j < a.len() && b_j < b.len() => (a_j, b_j),
            _ => (a.len(), b.len()),
        };

        let mut matched = 0;

        // scan right from the anchor
        let right = a[anchor_a..].iter().zip(b[anchor_b..].iter());
        for (ch_a, ch_b) in right {
            if !ch_a.eq_ignore_ascii_case(ch_b) {
                return false;
            }
            matched += 1;
        }

        // and left
        let left = a[..anchor_a].iter().rev().zip(b[..anchor_b].iter().rev());
        for (ch_a, ch_b) in left {
            if !ch_a.eq_ignore_ascii_case(ch_b) {
                return false;
            }
            matched += 1;
        }

        matched >= self.cfg.min_match_length
    }
}

// ----------------------------------------------------------------------------
// Tracking

#[derive(Clone, Debug)]
pub struct Config {
    /// Most targets one tracking call may follow.
    pub max_targets: usize,
    /// How many dx candidates to pull per repertoire.
    pub dx_options_count: usize,
    /// Locus-fraction floor for dx candidacy.
    pub dx_options_min_fraction_of_locus: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_targets: 50,
            dx_options_count: 20,
            dx_options_min_fraction_of_locus: 0.05,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Params {
    pub repertoires: Vec<String>,
    pub targets: Vec<Rearrangement>,
}

/// One target's counts across every tracked repertoire.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetValues {
    pub target: Rearrangement,
    /// In the order of [`Results::repertoires`].
    pub values: Vec<u64>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Results {
    /// Chronological; undated repertoires sort last.
    pub repertoires: Vec<Repertoire>,
    pub target_values: Vec<TargetValues>,
}

/// Count every target across every repertoire.
pub fn track(
    crs: &ContextStore,
    params: &Params,
    cfg: &Config,
    mrd: &MrdEngine,
) -> Result<Results, Report> {
    if params.targets.len() > cfg.max_targets {
        return Err(eyre!(
            "Too many tracking targets: {} > {}",
            params.targets.len(),
            cfg.max_targets
        )
        .suggestion("Track fewer clones per call."));
    }

    let mut repertoires = params
        .repertoires
        .iter()
        .map(|name| crs.require(name).cloned())
        .collect::<Result<Vec<_>, Report>>()?;
    repertoires.sort_by(|a, b| a.chronological(b));

    // counts per repertoire, pivoted by target below
    let matrix = repertoires
        .par_iter()
        .map(|repertoire| match_targets(crs, params, repertoire, mrd))
        .collect::<Result<Vec<Vec<u64>>, Report>>()?;

    let target_values = params
        .targets
        .iter()
        .enumerate()
        .map(|(at, target)| TargetValues {
            target: target.clone(),
            values: matrix.iter().map(|counts| counts[at]).collect(),
        })
        .collect();

    Ok(Results { repertoires, target_values })
}

fn match_targets(
    crs: &ContextStore,
    params: &Params,
    repertoire: &Repertoire,
    mrd: &MrdEngine,
) -> Result<Vec<u64>, Report> {
    let mut reader = tsv::Reader::new(crs.open_repertoire(&repertoire.name)?, 0);
    let mut counts = vec![0u64; params.targets.len()];

    while let Some(r) = reader.read_next()? {
        for (target, count) in params.targets.iter().zip(counts.iter_mut()) {
            if mrd.matches(target, &r) {
                *count += r.count;
            }
        }
    }

    Ok(counts)
}

// ----------------------------------------------------------------------------
// Dx options

/// Suggest trackable clones: the dx-potential leaders of each repertoire.
///
/// Rearrangements pass the cut if they are already dx-flagged or dominate
/// their locus; dx-flagged clones not seen in an earlier repertoire (under
/// MRD matching) are pre-selected.
pub fn dx_options(
    crs: &ContextStore,
    repertoires: &[String],
    cfg: &Config,
    mrd: &MrdEngine,
) -> Result<Vec<RepertoireResult>, Report> {
    let topx_params = topx::Params {
        repertoires: repertoires.to_vec(),
        sort: topx::Sort::DxPotential,
        count: cfg.dx_options_count,
    };
    let mut potentials = topx::top(crs, &topx_params, &topx::Config::default())?;
    potentials.sort_by(|a, b| a.repertoire.chronological(&b.repertoire));

    let mut results = Vec::new();
    let mut seen: Vec<Rearrangement> = Vec::new();

    for potential in potentials {
        if potential.rearrangements.is_empty() {
            continue;
        }

        let mut result = RepertoireResult {
            repertoire: potential.repertoire,
            selection_indices: Some(Vec::new()),
            ..Default::default()
        };

        for r in potential.rearrangements {
            let fraction = r.fraction_of_locus(&result.repertoire);
            let keep = r.dx || fraction >= cfg.dx_options_min_fraction_of_locus;
            if keep {
                result.rearrangements.push(r.clone());
            }

            if r.dx && !seen.iter().any(|prior| mrd.matches(&r, prior)) {
                if let Some(selected) = result.selection_indices.as_mut() {
                    selected.push(result.rearrangements.len() - 1);
                }
                seen.push(r);
            }
        }

        if !result.rearrangements.is_empty() {
            results.push(result);
        }
    }

    Ok(results)
}
