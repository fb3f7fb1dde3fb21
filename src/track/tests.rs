use crate::repertoire::Rearrangement;
use crate::store::ContextStore;
use crate::testutil::{TempStore, TEST_CONTEXT, TEST_USER, TSV_OTHER, TSV_V3};
use crate::track::{track, Config, MrdConfig, MrdEngine, Params};
use crate::tsv::{self, ReceiveOptions};

use chrono::NaiveDate;
use color_eyre::eyre::{Report, Result};

fn engine(min: usize) -> MrdEngine {
    MrdEngine::new(MrdConfig { min_match_length: min })
}

#[test]
fn identical_sequences_match() -> Result<(), Report> {
    let mrd = engine(10);
    assert!(mrd.matches_anchored("CAGCTCTTTACTTCTCGGCA", Some(14), "CAGCTCTTTACTTCTCGGCA", Some(14)));
    Ok(())
}

#[test]
fn j_anchor_aligns_different_read_lengths() -> Result<(), Report> {
    let mrd = engine(10);

    // the second assay read five fewer leading bases; anchors line up the rest
    let long = "AACCGGTTCAGCTCTTTACTTCT";
    let short = "GTTCAGCTCTTTACTTCT";
    assert!(mrd.matches_anchored(long, Some(16), short, Some(11)));

    // misaligned anchors compare different bases and fail
    assert!(!mrd.matches_anchored(long, Some(16), short, Some(10)));
    Ok(())
}

#[test]
fn unusable_j_falls_back_to_right_edge() -> Result<(), Report> {
    let mrd = engine(10);

    let long = "AACCGGTTCAGCTCTTTACTTCT";
    let short = "GTTCAGCTCTTTACTTCT";

    // suffix-aligned, so edge matching succeeds without any J call
    assert!(mrd.matches_anchored(long, None, short, None));

    // knowing only one J is no better than knowing neither
    assert!(mrd.matches_anchored(long, Some(16), short, None));
    Ok(())
}

#[test]
fn match_is_case_insensitive() -> Result<(), Report> {
    let mrd = engine(4);
    assert!(mrd.matches_anchored("acgtacgt", None, "ACGTACGT", None));
    Ok(())
}

#[test]
fn short_overlaps_fail_the_length_floor() -> Result<(), Report> {
    // the matched region covers the shorter sequence but only 4 bases
    assert!(!engine(10).matches_anchored("ACGTACGT", None, "ACGT", None));
    assert!(engine(4).matches_anchored("ACGTACGT", None, "ACGT", None));
    Ok(())
}

#[test]
fn track_counts_targets_across_repertoires() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;
    temp.add("rep2", TSV_OTHER)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let target = Rearrangement {
        rearrangement: "CAGCTCTTTACTTCTCGGCA".to_string(),
        j_index: Some(14),
        ..Default::default()
    };
    let params = Params {
        repertoires: vec!["rep1".to_string(), "rep2".to_string()],
        targets: vec![target],
    };

    let results = track(&crs, &params, &Config::default(), &engine(15))?;

    assert_eq!(2, results.repertoires.len());
    assert_eq!(1, results.target_values.len());
    // undated repertoires sort by name, so values follow rep1, rep2
    assert_eq!(vec![120, 30], results.target_values[0].values);
    Ok(())
}

#[test]
fn repertoires_sort_chronologically() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;

    // a dated repertoire sorts ahead of the undated rep1
    let spec = temp.spec("dated");
    let options = ReceiveOptions {
        date: NaiveDate::from_ymd_opt(2023, 6, 1),
        ..Default::default()
    };
    tsv::receive(TSV_OTHER.as_bytes(), &temp.store, &spec, &options)?;

    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;
    let params = Params {
        repertoires: vec!["rep1".to_string(), "dated".to_string()],
        targets: vec![],
    };

    let results = track(&crs, &params, &Config::default(), &engine(15))?;
    let names: Vec<&str> = results.repertoires.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(vec!["dated", "rep1"], names);
    Ok(())
}

#[test]
fn dx_options_filter_below_the_locus_floor() -> Result<(), Report> {
    let dominated = "\
rearrangement\tamino_acid\tframe_type\ttemplates\tv_resolved\td_resolved\tj_resolved\tcdr3_length\tv_index\td_index\tj_index\tn1_index\tn2_index
AAAACCCCGGGGTTTTAAAA\tCASSF\tIn\t1000\tTCRBV05-01\t\tTCRBJ02-01\t0\t-1\t-1\t-1\t-1\t-1
CCCCGGGGTTTTAAAACCCC\tCASSG\tIn\t10\tTCRBV06-01\t\tTCRBJ02-03\t0\t-1\t-1\t-1\t-1\t-1
";
    let temp = TempStore::new()?;
    temp.add("rep1", dominated)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let options = crate::track::dx_options(
        &crs,
        &["rep1".to_string()],
        &Config::default(),
        &engine(15),
    )?;

    // only the dominant clone clears the 5% locus-fraction floor
    assert_eq!(1, options.len());
    assert_eq!(1, options[0].rearrangements.len());
    assert_eq!(1000, options[0].rearrangements[0].count);
    Ok(())
}

#[test]
fn too_many_targets_is_an_error() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;
    let crs = ContextStore::open(&temp.store, TEST_USER, TEST_CONTEXT)?;

    let cfg = Config { max_targets: 1, ..Default::default() };
    let params = Params {
        repertoires: vec!["rep1".to_string()],
        targets: vec![Rearrangement::default(), Rearrangement::default()],
    };

    assert!(track(&crs, &params, &cfg, &engine(15)).is_err());
    Ok(())
}
