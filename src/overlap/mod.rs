//! Find rearrangement keys shared between repertoires.

#[cfg(test)]
pub mod tests;

use crate::keys::KeyType;
use crate::repertoire::Repertoire;
use crate::sorter::{self, KeyItem, KeySorter};
use crate::store::ContextStore;
use color_eyre::eyre::{eyre, Report, Result};
use color_eyre::Help;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use structdoc::StructDoc;

// ----------------------------------------------------------------------------
// Config

#[derive(Clone, Debug)]
pub struct Config {
    /// Most repertoires one overlap may compare.
    pub max_repertoires: usize,
    /// Standard-mode result rows kept after sorting.
    pub max_standard_overlaps: usize,
    /// Combined-mode key list length before elision.
    pub max_combined_key_length: usize,
    pub sorter: sorter::Config,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_repertoires: 6,
            max_standard_overlaps: 1000,
            max_combined_key_length: 1024,
            sorter: sorter::Config::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Params

/// How overlap results are grouped and reported.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, StructDoc)]
pub enum Mode {
    /// Only keys present in more than one repertoire, most overlapping
    /// first.
    #[default]
    Standard,
    /// Every key, one row per distinct count profile; rows with identical
    /// profiles are merged and their keys concatenated.
    Combined,
}

#[derive(Clone, Debug)]
pub struct Params {
    pub repertoires: Vec<String>,
    pub key_type: KeyType,
    pub mode: Mode,
}

// ----------------------------------------------------------------------------
// Results

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultItem {
    pub key: String,
    /// How many distinct keys this row stands for (Combined mode merging).
    pub key_count: usize,
    /// Number of repertoires the key appears in.
    pub present_in: usize,
    /// Count per repertoire, in request order; zero where absent.
    pub counts: Vec<u64>,
    pub max_count: u64,
}

impl ResultItem {
    fn new(key: &str, matches: &[usize], heads: &[Option<KeyItem>], width: usize) -> Self {
        let mut counts = vec![0; width];
        let mut max_count = 0;
        for &at in matches {
            if let Some(item) = &heads[at] {
                counts[at] = item.count;
                max_count = max_count.max(item.count);
            }
        }
        ResultItem {
            key: key.to_string(),
            key_count: 1,
            present_in: matches.len(),
            counts,
            max_count,
        }
    }

    /// Merge another key into this row, eliding once the combined key list
    /// would grow past `max_length`.
    fn append_key(&mut self, key: &str, max_length: usize) {
        self.key_count += 1;

        if self.key.ends_with("...") {
            return;
        }
        if self.key.len() + key.len() + 2 > max_length.saturating_sub(3) {
            self.key.push_str("...");
        } else {
            self.key.push_str(", ");
            self.key.push_str(key);
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OverlapResult {
    pub repertoires: Vec<Repertoire>,
    pub items: Vec<ResultItem>,
    pub truncated: bool,
}

// ----------------------------------------------------------------------------
// Overlap

/// Compute the overlap between the requested repertoires.
pub fn overlap(crs: &ContextStore, params: &Params, cfg: &Config) -> Result<OverlapResult, Report> {
    if params.repertoires.len() > cfg.max_repertoires {
        return Err(eyre!(
            "Too many repertoires for overlap: {} > {}",
            params.repertoires.len(),
            cfg.max_repertoires
        )
        .suggestion("Compare fewer repertoires per call."));
    }

    let mut result = OverlapResult::default();
    for name in &params.repertoires {
        result.repertoires.push(crs.require(name)?.clone());
    }

    debug!("key-sorting {} repertoires", params.repertoires.len());
    let mut sorters = params
        .repertoires
        .par_iter()
        .map(|name| KeySorter::sort(crs, name, params.key_type, &cfg.sorter))
        .collect::<Result<Vec<_>, Report>>()?;

    find_overlaps(&mut sorters, &mut result, params.mode, cfg)?;

    match params.mode {
        Mode::Standard => {
            result.items.sort_by(|a, b| {
                b.max_count
                    .cmp(&a.max_count)
                    .then(b.present_in.cmp(&a.present_in))
                    .then(b.key.len().cmp(&a.key.len()))
            });
            if result.items.len() > cfg.max_standard_overlaps {
                // every overlap had to be found to sort the best on top, but
                // there is no point shipping the tail
                result.items.truncate(cfg.max_standard_overlaps);
                result.truncated = true;
            }
        }
        Mode::Combined if !result.items.is_empty() => {
            // sort so equal count profiles are adjacent, then merge them
            result.items.sort_by(|a, b| a.counts.cmp(&b.counts));

            let mut merged: Vec<ResultItem> = Vec::new();
            for item in std::mem::take(&mut result.items) {
                match merged.last_mut() {
                    Some(last) if last.counts == item.counts => {
                        last.append_key(&item.key, cfg.max_combined_key_length);
                    }
                    _ => merged.push(item),
                }
            }
            result.items = merged;
        }
        Mode::Combined => (),
    }

    Ok(result)
}

// K-way merge over the sorted key streams.
fn find_overlaps(
    sorters: &mut [KeySorter],
    result: &mut OverlapResult,
    mode: Mode,
    cfg: &Config,
) -> Result<(), Report> {
    debug!("finding overlaps");

    let width = sorters.len();
    let mut heads: Vec<Option<KeyItem>> = Vec::with_capacity(width);
    for sorter in sorters.iter_mut() {
        heads.push(sorter.read_next()?);
    }

    let continue_below = match mode {
        Mode::Standard => 2,
        Mode::Combined => 1,
    };

    // singleton profiles are collapsed as they stream by, keyed compactly
    let mut singletons: BTreeMap<String, ResultItem> = BTreeMap::new();

    loop {
        // the minimum key across the streams, and everyone holding it
        let mut min_key: Option<&str> = None;
        let mut matches: Vec<usize> = Vec::new();
        let mut active = 0;

        for (at, head) in heads.iter().enumerate() {
            let Some(item) = head else { continue };
            active += 1;

            match min_key {
                None => {
                    min_key = Some(&item.key);
                    matches.push(at);
                }
                Some(current) => match item.key.as_str().cmp(current) {
                    std::cmp::Ordering::Equal => matches.push(at),
                    std::cmp::Ordering::Less => {
                        min_key = Some(&item.key);
                        matches.clear();
                        matches.push(at);
                    }
                    std::cmp::Ordering::Greater => (),
                },
            }
        }

        if active < continue_below || min_key.is_none() {
            break;
        }
        let key = min_key.unwrap_or_default().to_string();

        if matches.len() > 1 {
            result.items.push(ResultItem::new(&key, &matches, &heads, width));
        } else if mode == Mode::Combined {
            let item = heads[matches[0]].as_ref();
            let count = item.map(|i| i.count).unwrap_or(0);
            let profile = format!("{}-{}", matches[0], count);

            match singletons.get_mut(&profile) {
                Some(existing) => existing.append_key(&key, cfg.max_combined_key_length),
                None => {
                    singletons.insert(profile, ResultItem::new(&key, &matches, &heads, width));
                }
            }
        }

        // advance everyone sitting at the minimum
        for &at in &matches {
            heads[at] = sorters[at].read_next()?;
        }
    }

    result.items.extend(singletons.into_values());
    Ok(())
}
