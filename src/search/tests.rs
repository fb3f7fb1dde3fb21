use crate::keys::KeyType;
use crate::search::{search, Params};
use crate::store::ContextStore;
use crate::testutil::{TempStore, TEST_CONTEXT, TEST_USER, TSV_OTHER, TSV_V3};

use color_eyre::eyre::{Report, Result};

fn params(repertoires: &[&str], motif: &str, key_type: KeyType, muts: usize) -> Params {
    Params {
        repertoires: repertoires.iter().map(|r| r.to_string()).collect(),
        motif: motif.to_string(),
        key_type,
        allowed_mutations: muts,
    }
}

#[test]
fn motif_not_found_anywhere() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;
    temp.add("rep2", TSV_OTHER)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let results =
        search(&crs, &params(&["rep1", "rep2"], "AAAAAAAAAA", KeyType::Rearrangement, 0))?;

    assert_eq!(2, results.len());
    assert_eq!("rep1", results[0].repertoire.name);
    assert_eq!(0, results[0].rearrangements.len());
    assert_eq!("rep2", results[1].repertoire.name);
    assert_eq!(0, results[1].rearrangements.len());
    Ok(())
}

#[test]
fn nucleotide_motif_found_in_both() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;
    temp.add("rep2", TSV_OTHER)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let results =
        search(&crs, &params(&["rep1", "rep2"], "CAGCTCTTTACTTCT", KeyType::Rearrangement, 0))?;

    // two prefix-sharing rows in rep1, one in rep2
    assert_eq!(2, results[0].rearrangements.len());
    assert_eq!(1, results[1].rearrangements.len());
    Ok(())
}

#[test]
fn amino_acid_motif_with_mutations() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let exact = search(&crs, &params(&["rep1"], "CASSLG", KeyType::AminoAcid, 0))?;
    assert_eq!(1, exact[0].rearrangements.len());

    // one mutation also pulls in CASSLT
    let fuzzy = search(&crs, &params(&["rep1"], "CASSLG", KeyType::AminoAcid, 1))?;
    assert_eq!(2, fuzzy[0].rearrangements.len());
    Ok(())
}

#[test]
fn unknown_repertoire_fails_the_search() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let result = search(&crs, &params(&["rep1", "missing"], "ACGT", KeyType::Rearrangement, 0));
    assert!(result.is_err());
    Ok(())
}
