use crate::keys::KeyType;
use crate::sorter::{Config, KeyItem, KeySorter};
use crate::store::ContextStore;
use crate::testutil::{TempStore, TEST_CONTEXT, TEST_USER};

use color_eyre::eyre::{Report, Result};

// duplicate keys out of order, so sorting and accumulation both matter
const TSV_DUPES: &str = "\
rearrangement\tamino_acid\tframe_type\ttemplates\tv_resolved\td_resolved\tj_resolved\tcdr3_length\tv_index\td_index\tj_index\tn1_index\tn2_index
TTTT\tCF\tIn\t7\tTCRBV05-01\t\tTCRBJ02-01\t0\t-1\t-1\t-1\t-1\t-1
AAAA\tCK\tIn\t10\tTCRBV05-01\t\tTCRBJ02-01\t0\t-1\t-1\t-1\t-1\t-1
CCCC\tCP\tIn\t2\tTCRBV05-01\t\tTCRBJ02-01\t0\t-1\t-1\t-1\t-1\t-1
AAAA\tCK\tIn\t5\tTCRBV05-01\t\tTCRBJ02-01\t0\t-1\t-1\t-1\t-1\t-1
GGGG\tCG\tIn\t1\tTCRBV05-01\t\tTCRBJ02-01\t0\t-1\t-1\t-1\t-1\t-1
";

fn drain(sorter: &mut KeySorter) -> Result<Vec<KeyItem>, Report> {
    let mut items = Vec::new();
    while let Some(item) = sorter.read_next()? {
        items.push(item);
    }
    Ok(items)
}

fn expected_items() -> Vec<KeyItem> {
    vec![
        KeyItem::new("AAAA", 15),
        KeyItem::new("CCCC", 2),
        KeyItem::new("GGGG", 1),
        KeyItem::new("TTTT", 7),
    ]
}

#[test]
fn sorts_and_accumulates_duplicates() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_DUPES)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let cfg = Config { use_cache: false, ..Default::default() };
    let mut sorter = KeySorter::sort(&crs, "rep1", KeyType::Rearrangement, &cfg)?;

    assert_eq!(expected_items(), drain(&mut sorter)?);
    Ok(())
}

#[test]
fn tiny_chunks_force_merging() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_DUPES)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    // five rows across chunks of two exercises merge rounds and a straggler
    let cfg = Config { chunk_size: 2, use_cache: false, ..Default::default() };
    let mut sorter = KeySorter::sort(&crs, "rep1", KeyType::Rearrangement, &cfg)?;

    assert_eq!(expected_items(), drain(&mut sorter)?);
    Ok(())
}

#[test]
fn cached_sort_is_reused() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_DUPES)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let cfg = Config { use_cache: true, ..Default::default() };
    let mut first = KeySorter::sort(&crs, "rep1", KeyType::Rearrangement, &cfg)?;
    assert_eq!(expected_items(), drain(&mut first)?);

    // the cache file exists now, and serves the same stream
    assert!(crs.open_secondary("rep1", "keysorter-rearrangement")?.is_some());

    let mut second = KeySorter::sort(&crs, "rep1", KeyType::Rearrangement, &cfg)?;
    assert_eq!(expected_items(), drain(&mut second)?);
    Ok(())
}

#[test]
fn keyless_repertoire_sorts_to_nothing() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_DUPES)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    // no rearrangement in the file has a CDR3 call
    let cfg = Config { use_cache: false, ..Default::default() };
    let mut sorter = KeySorter::sort(&crs, "rep1", KeyType::Cdr3, &cfg)?;

    assert_eq!(None, sorter.read_next()?);
    Ok(())
}
