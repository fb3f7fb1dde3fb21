//! External merge sort of rearrangement keys.
//!
//! Overlap needs each repertoire's keys in sorted order with duplicate keys
//! collapsed into one count. Repertoires can be far larger than memory, so
//! keys are sorted in bounded chunks spilled to temp files, then the chunks
//! are merged pairwise until one file remains. The sorted result can be
//! cached as a store secondary file so the next overlap skips the work.

#[cfg(test)]
pub mod tests;

use crate::keys::KeyType;
use crate::store::ContextStore;
use crate::tsv;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use log::{debug, info};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

// ----------------------------------------------------------------------------
// Config

#[derive(Clone, Debug)]
pub struct Config {
    /// Keys held in memory per chunk before spilling.
    pub chunk_size: usize,
    /// Cache the sorted output as a store secondary file.
    pub use_cache: bool,
    /// Where chunk and merge temp files live.
    pub working_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chunk_size: 500_000,
            use_cache: true,
            working_dir: std::env::temp_dir(),
        }
    }
}

// ----------------------------------------------------------------------------
// KeyItem

/// One key with its accumulated count, serialized as `key<TAB>count`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyItem {
    pub key: String,
    pub count: u64,
}

impl KeyItem {
    pub fn new(key: impl Into<String>, count: u64) -> Self {
        KeyItem { key: key.into(), count }
    }

    fn to_line(&self) -> String {
        format!("{}\t{}", self.key, self.count)
    }

    fn from_line(line: &str) -> Result<Self, Report> {
        let (key, count) = line
            .rsplit_once('\t')
            .ok_or_else(|| eyre!("Malformed key line: {line:?}"))?;
        let count = count.parse().wrap_err_with(|| eyre!("Malformed key count: {line:?}"))?;
        Ok(KeyItem::new(key, count))
    }
}

impl Ord for KeyItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl PartialOrd for KeyItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ----------------------------------------------------------------------------
// KeyReader / KeyWriter

struct KeyReader {
    input: Box<dyn BufRead + Send>,
}

impl KeyReader {
    fn new(input: Box<dyn BufRead + Send>) -> Self {
        KeyReader { input }
    }

    fn from_file(file: &NamedTempFile) -> Result<Self, Report> {
        let reopened = file.reopen().wrap_err("Failed to reopen sort chunk")?;
        Ok(KeyReader::new(Box::new(BufReader::new(reopened))))
    }

    fn read_next(&mut self) -> Result<Option<KeyItem>, Report> {
        let mut line = String::new();
        if self.input.read_line(&mut line).wrap_err("Failed to read key line")? == 0 {
            return Ok(None);
        }
        Ok(Some(KeyItem::from_line(line.trim_end())?))
    }
}

fn write_items<W: Write>(out: &mut W, items: &[KeyItem]) -> Result<(), Report> {
    // adjacent duplicates collapse here; the input must be sorted
    let mut pending: Option<KeyItem> = None;
    for item in items {
        match &mut pending {
            Some(last) if last.key == item.key => last.count += item.count,
            slot => {
                if let Some(last) = slot.take() {
                    writeln!(out, "{}", last.to_line())?;
                }
                *slot = Some(item.clone());
            }
        }
    }
    if let Some(last) = pending {
        writeln!(out, "{}", last.to_line())?;
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// KeySorter

/// Streams a repertoire's keys in sorted order, after an external sort.
pub struct KeySorter {
    reader: KeyReader,
    // keeps the backing temp file alive while reading; None on a cache hit
    _merged: Option<NamedTempFile>,
}

impl KeySorter {
    /// Sort one repertoire's keys, serving from cache when possible.
    pub fn sort(
        crs: &ContextStore,
        repertoire: &str,
        key_type: KeyType,
        cfg: &Config,
    ) -> Result<Self, Report> {
        let cache_key = format!("keysorter-{key_type}");

        if cfg.use_cache {
            if let Some(cached) = crs.open_secondary(repertoire, &cache_key)? {
                info!("KeySorter cache hit for {repertoire}/{cache_key}");
                return Ok(KeySorter { reader: KeyReader::new(cached), _merged: None });
            }
        }

        let mut files = initial_chunks(crs, repertoire, key_type, cfg)?;

        // merge pairwise until a single sorted file remains
        while files.len() > 1 {
            files = merge_round(files, cfg)?;
        }
        let merged = match files.pop() {
            Some(file) => file,
            // a repertoire with no extractable keys at all
            None => empty_chunk(cfg)?,
        };

        if cfg.use_cache {
            save_to_cache(crs, repertoire, &cache_key, &merged)?;
        }

        Ok(KeySorter { reader: KeyReader::from_file(&merged)?, _merged: Some(merged) })
    }

    /// The next key in sort order, or `None` when exhausted.
    pub fn read_next(&mut self) -> Result<Option<KeyItem>, Report> {
        self.reader.read_next()
    }
}

// Chunk the repertoire TSV into sorted, deduped spill files.
fn initial_chunks(
    crs: &ContextStore,
    repertoire: &str,
    key_type: KeyType,
    cfg: &Config,
) -> Result<Vec<NamedTempFile>, Report> {
    let mut reader = tsv::Reader::new(crs.open_repertoire(repertoire)?, 0);
    let mut files = Vec::new();
    let mut items: Vec<KeyItem> = Vec::new();

    loop {
        let next = reader.read_next()?;

        if let Some(r) = &next {
            if let Some(key) = key_type.extract(r) {
                items.push(KeyItem::new(key, r.count));
            }
        }

        if items.len() == cfg.chunk_size || (next.is_none() && !items.is_empty()) {
            items.sort();
            let file = spill_chunk(&items, cfg)?;
            debug!("initial chunk {:?} with {} keys", file.path(), items.len());
            files.push(file);
            items.clear();
        }

        if next.is_none() {
            break;
        }
    }

    Ok(files)
}

fn new_temp_file(cfg: &Config) -> Result<NamedTempFile, Report> {
    tempfile::Builder::new()
        .prefix("repseq")
        .suffix(".txt")
        .tempfile_in(&cfg.working_dir)
        .wrap_err_with(|| eyre!("Failed to create sort file in {:?}", cfg.working_dir))
}

fn spill_chunk(items: &[KeyItem], cfg: &Config) -> Result<NamedTempFile, Report> {
    let file = new_temp_file(cfg)?;
    let mut out = BufWriter::new(file.as_file());
    write_items(&mut out, items)?;
    out.flush()?;
    drop(out);
    Ok(file)
}

fn empty_chunk(cfg: &Config) -> Result<NamedTempFile, Report> {
    new_temp_file(cfg)
}

// One round of pairwise merges, in parallel; an odd straggler passes through.
fn merge_round(files: Vec<NamedTempFile>, cfg: &Config) -> Result<Vec<NamedTempFile>, Report> {
    let mut pairs = Vec::new();
    let mut merged = Vec::new();

    let mut drain = files.into_iter();
    loop {
        match (drain.next(), drain.next()) {
            (Some(left), Some(right)) => pairs.push((left, right)),
            (Some(straggler), None) => {
                debug!("merge straggler: {:?}", straggler.path());
                merged.push(straggler);
                break;
            }
            _ => break,
        }
    }

    let mut results = pairs
        .into_par_iter()
        .map(|(left, right)| merge_pair(&left, &right, cfg))
        .collect::<Result<Vec<_>, Report>>()?;

    merged.append(&mut results);
    Ok(merged)
}

// Merge two sorted files into a new one, accumulating duplicate keys.
fn merge_pair(
    left: &NamedTempFile,
    right: &NamedTempFile,
    cfg: &Config,
) -> Result<NamedTempFile, Report> {
    let mut rdr1 = KeyReader::from_file(left)?;
    let mut rdr2 = KeyReader::from_file(right)?;

    let file = new_temp_file(cfg)?;
    let mut out = BufWriter::new(file.as_file());

    let mut item1 = rdr1.read_next()?;
    let mut item2 = rdr2.read_next()?;

    while let (Some(i1), Some(i2)) = (&mut item1, &mut item2) {
        match i1.key.cmp(&i2.key) {
            Ordering::Equal => {
                i1.count += i2.count;
                item2 = rdr2.read_next()?;
            }
            Ordering::Less => {
                writeln!(out, "{}", i1.to_line())?;
                item1 = rdr1.read_next()?;
            }
            Ordering::Greater => {
                writeln!(out, "{}", i2.to_line())?;
                item2 = rdr2.read_next()?;
            }
        }
    }

    // spit out the balance
    while let Some(item) = item1 {
        writeln!(out, "{}", item.to_line())?;
        item1 = rdr1.read_next()?;
    }
    while let Some(item) = item2 {
        writeln!(out, "{}", item.to_line())?;
        item2 = rdr2.read_next()?;
    }

    out.flush()?;
    drop(out);
    Ok(file)
}

fn save_to_cache(
    crs: &ContextStore,
    repertoire: &str,
    cache_key: &str,
    merged: &NamedTempFile,
) -> Result<(), Report> {
    // a failed cache write is not fatal; the sort itself succeeded
    let save = || -> Result<(), Report> {
        let mut writer = crs.create_secondary(repertoire, cache_key)?;
        let mut reopened = merged.reopen()?;
        std::io::copy(&mut reopened, &mut writer)?;
        writer.flush()?;
        Ok(())
    };

    match save() {
        Ok(()) => info!("KeySorter cached result for {repertoire}/{cache_key}"),
        Err(err) => log::warn!("KeySorter cache save failed (non-fatal): {err:?}"),
    }
    Ok(())
}
