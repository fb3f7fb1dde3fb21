//! Data model: rearrangements, repertoire summaries, loci and frame types.
//!
//! JSON field names keep the PascalCase casing of the stored wire format, and
//! the index fields keep its `-1` sentinel for "not called", so existing
//! `context.json` files and exported results stay readable by older tooling.


use crate::segments::{self, SegmentCalls, Span};
use chrono::NaiveDate;
use color_eyre::eyre::{eyre, Report, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::EnumIter;

// ----------------------------------------------------------------------------
// Locus

/// The receptor locus a rearrangement belongs to.
///
/// TCRA and TCRD are interleaved on one locus and counted together, as are
/// the IG light chains.
#[derive(
    Clone, Copy, Debug, Deserialize, EnumIter, Eq, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum Locus {
    #[serde(rename = "TCRAD")]
    Tcrad,
    #[serde(rename = "TCRB")]
    Tcrb,
    #[serde(rename = "TCRG")]
    Tcrg,
    #[serde(rename = "IGH")]
    Igh,
    #[serde(rename = "IGKL")]
    Igkl,
}

impl Locus {
    /// Infer the locus from resolved gene names, preferring the most
    /// trustworthy call (J, then D, then V).
    pub fn from_genes(v: &str, d: &str, j: &str) -> Result<Self, Report> {
        let gene = [j, d, v].into_iter().find(|g| !g.is_empty()).unwrap_or("");

        if let Some(rest) = gene.strip_prefix("TCR") {
            return match rest.chars().next() {
                Some('B') => Ok(Locus::Tcrb),
                Some('G') => Ok(Locus::Tcrg),
                Some(_) => Ok(Locus::Tcrad),
                None => Err(eyre!("Unresolvable locus: {gene:?}")),
            };
        }
        if let Some(rest) = gene.strip_prefix("IG") {
            return match rest.chars().next() {
                Some('H') => Ok(Locus::Igh),
                Some(_) => Ok(Locus::Igkl),
                None => Err(eyre!("Unresolvable locus: {gene:?}")),
            };
        }
        Err(eyre!("Unresolvable locus: {gene:?}"))
    }
}

impl std::fmt::Display for Locus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Locus::Tcrad => "TCRAD",
            Locus::Tcrb => "TCRB",
            Locus::Tcrg => "TCRG",
            Locus::Igh => "IGH",
            Locus::Igkl => "IGKL",
        };
        write!(f, "{name}")
    }
}

// ----------------------------------------------------------------------------
// FrameType

/// Reading-frame status of a rearrangement.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum FrameType {
    #[default]
    In,
    Out,
    Stop,
}

impl FromStr for FrameType {
    type Err = Report;

    fn from_str(text: &str) -> Result<Self, Report> {
        match text.to_lowercase().as_str() {
            "in" => Ok(FrameType::In),
            "out" => Ok(FrameType::Out),
            "stop" => Ok(FrameType::Stop),
            _ => Err(eyre!("Unknown frame type: {text:?}")),
        }
    }
}

// ----------------------------------------------------------------------------
// Rearrangement

/// One observed rearrangement row.
///
/// The five index fields are byte offsets into `rearrangement`; `None` means
/// the upstream pipeline did not call that boundary. On the wire an uncalled
/// index is `-1`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rearrangement {
    pub rearrangement: String,
    pub amino_acid: String,
    pub frame_type: FrameType,
    pub locus: Option<Locus>,
    pub count: u64,
    pub v_resolved: String,
    pub d_resolved: String,
    pub j_resolved: String,
    pub cdr3_length: usize,
    #[serde(with = "index_sentinel")]
    pub v_index: Option<usize>,
    #[serde(with = "index_sentinel")]
    pub d_index: Option<usize>,
    #[serde(with = "index_sentinel")]
    pub j_index: Option<usize>,
    #[serde(with = "index_sentinel")]
    pub n1_index: Option<usize>,
    #[serde(with = "index_sentinel")]
    pub n2_index: Option<usize>,
    #[serde(rename = "VSHMIndices", default)]
    pub v_shm_indices: Vec<usize>,
    #[serde(default)]
    pub dx: bool,
}

impl Rearrangement {
    /// Fraction of the repertoire's counts on this rearrangement's locus.
    pub fn fraction_of_locus(&self, repertoire: &Repertoire) -> f64 {
        let Some(locus) = self.locus else { return 0.0 };
        match repertoire.locus_counts.get(&locus) {
            Some(&total) if total > 0 => self.count as f64 / total as f64,
            _ => 0.0,
        }
    }

    /// Fraction of the repertoire's total count.
    pub fn fraction_of_count(&self, repertoire: &Repertoire) -> f64 {
        match repertoire.total_count {
            0 => 0.0,
            total => self.count as f64 / total as f64,
        }
    }

    /// Fraction of the repertoire's total cells; zero when cells are unknown.
    pub fn fraction_of_cells(&self, repertoire: &Repertoire) -> f64 {
        match repertoire.total_cells {
            0 => 0.0,
            total => self.count as f64 / total as f64,
        }
    }

    /// The CDR3 nucleotide slice, anchored three bases past the V index.
    pub fn cdr3(&self) -> Option<&str> {
        let start = self.v_index? + 3;
        let end = start + self.cdr3_length;
        if self.cdr3_length == 0 || end > self.rearrangement.len() {
            return None;
        }
        self.rearrangement.get(start..end)
    }

    /// Boundary calls for segment partitioning.
    pub fn segment_calls(&self) -> SegmentCalls {
        SegmentCalls {
            n1: self.n1_index,
            d: self.d_index,
            n2: self.n2_index,
            j: self.j_index,
        }
    }

    /// The reconciled, labeled partition of the nucleotide sequence.
    pub fn segments(&self) -> Vec<Span<'_>> {
        segments::partition(&self.rearrangement, &self.segment_calls())
    }
}

// Serialize an optional index as itself or the -1 wire sentinel.
mod index_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(index: &Option<usize>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_i64(index.map(|at| at as i64).unwrap_or(-1))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<usize>, D::Error> {
        let raw = i64::deserialize(de)?;
        Ok(usize::try_from(raw).ok())
    }
}

/// Parse a raw index field, mapping any negative value to "not called".
pub fn index_from_raw(raw: i64) -> Option<usize> {
    usize::try_from(raw).ok()
}

// ----------------------------------------------------------------------------
// Repertoire

/// Summary metadata for one imported repertoire.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Repertoire {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub total_cells: u64,
    pub total_count: u64,
    pub total_uniques: u64,
    pub total_milliliters: f64,
    pub locus_counts: BTreeMap<Locus, u64>,
}

impl Repertoire {
    pub fn new(name: &str) -> Self {
        Repertoire { name: name.to_string(), ..Default::default() }
    }

    /// A cell-free (volume-normalized) sample.
    pub fn is_cellfree(&self) -> bool {
        self.total_milliliters > 0.0
    }

    /// Fold one rearrangement's counts into the summary.
    pub fn accumulate(&mut self, locus: Option<Locus>, count: u64) {
        self.total_count += count;
        self.total_uniques += 1;
        if let Some(locus) = locus {
            *self.locus_counts.entry(locus).or_insert(0) += count;
        }
    }

    /// Order repertoires for display: dated before undated, oldest first,
    /// ties broken by name.
    pub fn chronological(&self, other: &Self) -> Ordering {
        match (&self.date, &other.date) {
            (Some(a), Some(b)) => a.cmp(b).then_with(|| self.name.cmp(&other.name)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.name.cmp(&other.name),
        }
    }

    pub fn find<'r>(repertoires: &'r [Repertoire], name: &str) -> Option<&'r Repertoire> {
        repertoires.iter().find(|r| r.name == name)
    }
}

// ----------------------------------------------------------------------------
// RepertoireSpec

/// Fully-qualified repertoire address: user, context, name.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepertoireSpec {
    pub user_id: String,
    pub context: String,
    pub name: String,
}

impl RepertoireSpec {
    pub fn new(user_id: &str, context: &str, name: &str) -> Self {
        RepertoireSpec {
            user_id: user_id.to_string(),
            context: context.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for RepertoireSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.user_id, self.context, self.name)
    }
}

// ----------------------------------------------------------------------------
// RepertoireResult

/// Rearrangements selected from one repertoire by a query operation.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepertoireResult {
    pub repertoire: Repertoire,
    pub rearrangements: Vec<Rearrangement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_indices: Option<Vec<usize>>,
}
