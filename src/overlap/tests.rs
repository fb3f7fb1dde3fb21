use crate::keys::KeyType;
use crate::overlap::{overlap, Config, Mode, Params};
use crate::store::ContextStore;
use crate::testutil::{TempStore, TEST_CONTEXT, TEST_USER, TSV_OTHER, TSV_V3};

use color_eyre::eyre::{Report, Result};

fn params(repertoires: &[&str], mode: Mode) -> Params {
    Params {
        repertoires: repertoires.iter().map(|r| r.to_string()).collect(),
        key_type: KeyType::Rearrangement,
        mode,
    }
}

fn no_cache() -> Config {
    let mut cfg = Config::default();
    cfg.sorter.use_cache = false;
    cfg
}

#[test]
fn standard_mode_reports_shared_keys() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;
    temp.add("rep2", TSV_OTHER)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let result = overlap(&crs, &params(&["rep1", "rep2"], Mode::Standard), &no_cache())?;

    // exactly one nucleotide sequence appears in both repertoires
    assert_eq!(2, result.repertoires.len());
    assert_eq!(1, result.items.len());
    assert!(!result.truncated);

    let item = &result.items[0];
    assert_eq!("CAGCTCTTTACTTCTCGGCA", item.key);
    assert_eq!(2, item.present_in);
    assert_eq!(vec![120, 30], item.counts);
    assert_eq!(120, item.max_count);
    Ok(())
}

#[test]
fn standard_mode_sorts_by_max_count() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;
    temp.add("rep2", TSV_V3.replace("120", "90").as_str())?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let result = overlap(&crs, &params(&["rep1", "rep2"], Mode::Standard), &no_cache())?;

    // identical files overlap on every key, biggest counts first
    assert_eq!(4, result.items.len());
    let max_counts: Vec<u64> = result.items.iter().map(|i| i.max_count).collect();
    let mut sorted = max_counts.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(sorted, max_counts);
    Ok(())
}

#[test]
fn combined_mode_keeps_singletons() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;
    temp.add("rep2", TSV_OTHER)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let result = overlap(&crs, &params(&["rep1", "rep2"], Mode::Combined), &no_cache())?;

    // every distinct count profile shows up exactly once
    let total_keys: usize = result.items.iter().map(|i| i.key_count).sum();
    assert_eq!(5, total_keys);

    // the shared key is present in both columns
    let shared = result
        .items
        .iter()
        .find(|i| i.present_in == 2)
        .ok_or_else(|| color_eyre::eyre::eyre!("no shared item"))?;
    assert_eq!(vec![120, 30], shared.counts);
    Ok(())
}

#[test]
fn too_many_repertoires_is_an_error() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let cfg = Config { max_repertoires: 1, ..no_cache() };
    let result = overlap(&crs, &params(&["rep1", "rep1"], Mode::Standard), &cfg);
    assert!(result.is_err());
    Ok(())
}
