//! Shared fixtures for store-backed unit tests.

use crate::repertoire::RepertoireSpec;
use crate::store::FileStore;
use crate::tsv::{self, ReceiveOptions, ReceiveOutcome};
use color_eyre::eyre::{eyre, Report, Result};
use tempfile::TempDir;

pub const TEST_USER: &str = "foo@bar.com";
pub const TEST_CONTEXT: &str = "context";

/// A v3-dialect TSV with four rearrangements across two loci.
///
/// Row 0 and row 2 share the CAGCTC... prefix so motif tests can match a
/// subset; row 3 is IGH so locus counting has two groups to track.
pub const TSV_V3: &str = "\
rearrangement\tamino_acid\tframe_type\ttemplates\tv_resolved\td_resolved\tj_resolved\tcdr3_length\tv_index\td_index\tj_index\tn1_index\tn2_index\tv_shm_indexes\tsample_cells
CAGCTCTTTACTTCTCGGCA\tCASSLG\tIn\t120\tTCRBV05-01*01\tTCRBD01-01\tTCRBJ02-01*01\t12\t2\t9\t14\t7\t12\t\t10000
GGTTAACCGGTTAACCGGTT\tCSARDG\tOut\t40\tTCRBV07-02\t\tTCRBJ01-05\t9\t1\t-1\t12\t-1\t-1\t3,17\t
CAGCTCTTTACTTCTAAAAA\tCASSLT\tIn\t60\tTCRBV05-01\tTCRBD02-01\tTCRBJ02-03\t12\t2\t8\t15\t6\t11\t\t
TTGGCCAATTGGCCAATTGG\tCARGYW\tStop\t5\tIGHV03-23\tIGHD02-02\tIGHJ04-02\t15\t0\t7\t13\t5\t10\t\t
";

/// The same four rows in the v2 dialect, columns shuffled.
pub const TSV_V2: &str = "\
aminoAcid\tnucleotide\tcount (templates/reads)\tsequenceStatus\tvMaxResolved\tdMaxResolved\tjMaxResolved\tcdr3Length\tvIndex\tdIndex\tjIndex\tn1Index\tn2Index\tvAlignSubstitutionIndexes
CASSLG\tCAGCTCTTTACTTCTCGGCA\t120\tIn\tTCRBV05-01*01\tTCRBD01-01\tTCRBJ02-01*01\t12\t2\t9\t14\t7\t12\t
CSARDG\tGGTTAACCGGTTAACCGGTT\t40\tOut\tTCRBV07-02\t\tTCRBJ01-05\t9\t1\t-1\t12\t-1\t-1\t3,17
CASSLT\tCAGCTCTTTACTTCTAAAAA\t60\tIn\tTCRBV05-01\tTCRBD02-01\tTCRBJ02-03\t12\t2\t8\t15\t6\t11\t
CARGYW\tTTGGCCAATTGGCCAATTGG\t5\tStop\tIGHV03-23\tIGHD02-02\tIGHJ04-02\t15\t0\t7\t13\t5\t10\t
";

/// A second repertoire: shares row 0's nucleotides with [`TSV_V3`], plus one
/// rearrangement of its own.
pub const TSV_OTHER: &str = "\
rearrangement\tamino_acid\tframe_type\ttemplates\tv_resolved\td_resolved\tj_resolved\tcdr3_length\tv_index\td_index\tj_index\tn1_index\tn2_index
CAGCTCTTTACTTCTCGGCA\tCASSLG\tIn\t30\tTCRBV05-01*01\tTCRBD01-01\tTCRBJ02-01*01\t12\t2\t9\t14\t7\t12
ACGTACGTACGTACGTACGT\tCAWSVG\tIn\t75\tTCRBV09-01\tTCRBD01-01\tTCRBJ02-07\t12\t2\t9\t14\t7\t12
";

/// A temp-dir store populated by `add`; everything is removed on drop.
pub struct TempStore {
    pub store: FileStore,
    // owns the directory for the lifetime of the test
    _dir: TempDir,
}

impl TempStore {
    pub fn new() -> Result<Self, Report> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::new(dir.path())?;
        Ok(TempStore { store, _dir: dir })
    }

    pub fn add(&self, name: &str, content: &str) -> Result<(), Report> {
        let spec = RepertoireSpec::new(TEST_USER, TEST_CONTEXT, name);
        let outcome =
            tsv::receive(content.as_bytes(), &self.store, &spec, &ReceiveOptions::default())?;
        match outcome {
            ReceiveOutcome::Received(_) => Ok(()),
            ReceiveOutcome::Exists => Err(eyre!("Repertoire {name} already staged")),
        }
    }

    pub fn spec(&self, name: &str) -> RepertoireSpec {
        RepertoireSpec::new(TEST_USER, TEST_CONTEXT, name)
    }
}
