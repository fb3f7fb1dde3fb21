//! Motif search across the repertoires of a context.

#[cfg(test)]
pub mod tests;

use crate::keys::{KeyType, Matcher};
use crate::repertoire::RepertoireResult;
use crate::store::ContextStore;
use crate::tsv;
use color_eyre::eyre::{Report, Result};
use log::debug;
use rayon::prelude::*;

// ----------------------------------------------------------------------------
// Params

#[derive(Clone, Debug)]
pub struct Params {
    /// Repertoire names to search, in result order.
    pub repertoires: Vec<String>,
    /// The motif to look for.
    pub motif: String,
    /// Which key string of each rearrangement the motif is matched against.
    pub key_type: KeyType,
    /// How many mismatches a hit may contain.
    pub allowed_mutations: usize,
}

// ----------------------------------------------------------------------------
// Search

/// Scan every requested repertoire for the motif, in parallel.
///
/// Results come back in request order, one (possibly empty) entry per
/// repertoire. Unknown repertoire names fail the whole search.
pub fn search(crs: &ContextStore, params: &Params) -> Result<Vec<RepertoireResult>, Report> {
    // resolve every name before doing any work
    let repertoires = params
        .repertoires
        .iter()
        .map(|name| crs.require(name).cloned())
        .collect::<Result<Vec<_>, Report>>()?;

    let matcher = Matcher::new(params.allowed_mutations, false);

    repertoires
        .into_par_iter()
        .map(|repertoire| {
            let mut result = RepertoireResult { repertoire, ..Default::default() };
            let mut reader = tsv::Reader::new(crs.open_repertoire(&result.repertoire.name)?, 0);

            while let Some(r) = reader.read_next()? {
                let hit = params
                    .key_type
                    .extract(&r)
                    .map(|key| matcher.matches(&params.motif, key))
                    .unwrap_or(false);
                if hit {
                    result.rearrangements.push(r);
                }
            }

            debug!(
                "search {}: {} of {} rearrangements match",
                result.repertoire.name,
                result.rearrangements.len(),
                result.repertoire.total_uniques
            );
            Ok(result)
        })
        .collect()
}
