use crate::repertoire::{FrameType, Locus};
use crate::testutil::{TempStore, TEST_CONTEXT, TEST_USER, TSV_V2, TSV_V3};
use crate::tsv::{receive, Reader, ReceiveOptions, ReceiveOutcome};

use color_eyre::eyre::{eyre, Report, Result};

#[test]
fn v3_dialect_parses() -> Result<(), Report> {
    let mut reader = Reader::new(TSV_V3.as_bytes(), 0);

    let r = reader.read_next()?.ok_or_else(|| eyre!("no first row"))?;
    assert_eq!("CAGCTCTTTACTTCTCGGCA", r.rearrangement);
    assert_eq!("CASSLG", r.amino_acid);
    assert_eq!(FrameType::In, r.frame_type);
    assert_eq!(Some(Locus::Tcrb), r.locus);
    assert_eq!(120, r.count);
    assert_eq!(12, r.cdr3_length);
    assert_eq!(Some(2), r.v_index);
    assert_eq!(Some(9), r.d_index);
    assert_eq!(Some(14), r.j_index);
    assert_eq!(Some(7), r.n1_index);
    assert_eq!(Some(12), r.n2_index);
    assert!(r.v_shm_indices.is_empty());

    // -1 columns come through uncalled
    let r = reader.read_next()?.ok_or_else(|| eyre!("no second row"))?;
    assert_eq!(None, r.d_index);
    assert_eq!(None, r.n1_index);
    assert_eq!(None, r.n2_index);
    assert_eq!(vec![3, 17], r.v_shm_indices);

    assert_eq!(2, reader.read_batch(10)?.len());
    assert_eq!(None, reader.read_next()?);
    Ok(())
}

#[test]
fn v2_dialect_parses_identically() -> Result<(), Report> {
    let mut v2 = Reader::new(TSV_V2.as_bytes(), 0);
    let mut v3 = Reader::new(TSV_V3.as_bytes(), 0);

    loop {
        let (a, b) = (v2.read_next()?, v3.read_next()?);
        assert_eq!(a, b);
        if a.is_none() {
            break;
        }
    }
    Ok(())
}

#[test]
fn blank_and_comment_lines_skip_before_the_header() -> Result<(), Report> {
    let prefixed = format!("# export v3\n\n{TSV_V3}");
    let mut reader = Reader::new(prefixed.as_bytes(), 0);
    assert_eq!(4, reader.read_batch(100)?.len());
    Ok(())
}

#[test]
fn start_row_index_pages_forward() -> Result<(), Report> {
    let mut reader = Reader::new(TSV_V3.as_bytes(), 2);

    let r = reader.read_next()?.ok_or_else(|| eyre!("no paged row"))?;
    assert_eq!("CAGCTCTTTACTTCTAAAAA", r.rearrangement);
    assert_eq!(3, reader.next_row_index());
    Ok(())
}

#[test]
fn cells_come_from_the_first_carrying_row() -> Result<(), Report> {
    let mut reader = Reader::new(TSV_V3.as_bytes(), 0);
    while reader.read_next()?.is_some() {}
    assert_eq!(Some(10000), reader.discovered_cells());
    Ok(())
}

#[test]
fn missing_required_column_is_an_error() -> Result<(), Report> {
    let broken = TSV_V3.replace("templates", "template_count");
    let mut reader = Reader::new(broken.as_bytes(), 0);
    assert!(reader.read_next().is_err());
    Ok(())
}

#[test]
fn malformed_row_reports_its_index() -> Result<(), Report> {
    let broken = TSV_V3.replace("\t120\t", "\tlots\t");
    let mut reader = Reader::new(broken.as_bytes(), 0);

    let err = match reader.read_next() {
        Err(err) => err,
        Ok(_) => return Err(eyre!("expected a parse failure")),
    };
    assert!(format!("{err:?}").contains("row 0"));
    Ok(())
}

#[test]
fn tee_copies_every_raw_line() -> Result<(), Report> {
    let mut reader = Reader::with_tee(TSV_V3.as_bytes(), Vec::new());
    while reader.read_next()?.is_some() {}

    let copy = reader.finish()?.ok_or_else(|| eyre!("tee missing"))?;
    assert_eq!(TSV_V3.as_bytes(), copy.as_slice());
    Ok(())
}

#[test]
fn receive_accumulates_the_summary() -> Result<(), Report> {
    let temp = TempStore::new()?;
    let outcome =
        receive(TSV_V3.as_bytes(), &temp.store, &temp.spec("rep1"), &ReceiveOptions::default())?;

    let repertoire = match outcome {
        ReceiveOutcome::Received(repertoire) => repertoire,
        ReceiveOutcome::Exists => return Err(eyre!("unexpected collision")),
    };

    assert_eq!(225, repertoire.total_count);
    assert_eq!(4, repertoire.total_uniques);
    assert_eq!(10000, repertoire.total_cells);
    assert_eq!(Some(&220), repertoire.locus_counts.get(&Locus::Tcrb));
    assert_eq!(Some(&5), repertoire.locus_counts.get(&Locus::Igh));
    Ok(())
}

#[test]
fn receive_options_override_discovery() -> Result<(), Report> {
    let temp = TempStore::new()?;
    let options = ReceiveOptions {
        total_cells: Some(777),
        total_milliliters: Some(2.5),
        ..Default::default()
    };
    let outcome = receive(TSV_V3.as_bytes(), &temp.store, &temp.spec("rep1"), &options)?;

    let repertoire = match outcome {
        ReceiveOutcome::Received(repertoire) => repertoire,
        ReceiveOutcome::Exists => return Err(eyre!("unexpected collision")),
    };
    assert_eq!(777, repertoire.total_cells);
    assert!(repertoire.is_cellfree());
    Ok(())
}

#[test]
fn receive_twice_reports_exists() -> Result<(), Report> {
    let temp = TempStore::new()?;
    temp.add("rep1", TSV_V3)?;

    let outcome =
        receive(TSV_V3.as_bytes(), &temp.store, &temp.spec("rep1"), &ReceiveOptions::default())?;
    assert_eq!(ReceiveOutcome::Exists, outcome);
    Ok(())
}

#[test]
fn failed_receive_leaves_no_partial_file() -> Result<(), Report> {
    let temp = TempStore::new()?;
    let broken = TSV_V3.replace("\t120\t", "\tlots\t");

    let result =
        receive(broken.as_bytes(), &temp.store, &temp.spec("rep1"), &ReceiveOptions::default());
    assert!(result.is_err());

    // neither the file nor an index entry survives
    assert!(temp.store.open_repertoire(&temp.spec("rep1")).is_err());
    assert!(temp.store.context_repertoires(TEST_USER, TEST_CONTEXT)?.is_empty());

    // and the name is free for a corrected import
    temp.add("rep1", TSV_V3)?;
    Ok(())
}
