//! Reconcile gene-segment boundary calls into an ordered partition.
//!
//! Upstream pipelines report the start offsets of the V, N1, D, N2 and J
//! regions of a rearrangement, but the calls are not always consistent with
//! each other: insertions are sometimes labeled in the wrong order, and a
//! boundary can land behind one that precedes it in segment order. The
//! functions here repair what can be repaired (N1/N2 relabeling) and discard
//! what cannot, producing labeled spans that always cover the sequence
//! end-to-end with no gaps and no overlaps.


use serde::{Deserialize, Serialize};
use strum::EnumIter;

// ----------------------------------------------------------------------------
// Segment

/// A region label within a rearrangement, in fixed biological order.
#[derive(Clone, Copy, Debug, Deserialize, EnumIter, Eq, PartialEq, Serialize)]
pub enum Segment {
    /// V germline gene segment.
    V,
    /// Non-templated insertion at the V-D junction.
    N1,
    /// D germline gene segment.
    D,
    /// Non-templated insertion at the D-J junction.
    N2,
    /// J germline gene segment.
    J,
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ----------------------------------------------------------------------------
// SegmentCalls

/// Candidate start offsets for the labeled regions of one rearrangement.
///
/// `None` means the region was not called. The V region needs no offset: a
/// partition always begins at the start of the sequence, which carries the
/// V label.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SegmentCalls {
    pub n1: Option<usize>,
    pub d: Option<usize>,
    pub n2: Option<usize>,
    pub j: Option<usize>,
}

impl SegmentCalls {
    /// Relabel the insertion offsets so that `n1` precedes D and `n2`
    /// follows it.
    ///
    /// Producers disagree about which physical insertion is "N1" and which
    /// is "N2", so the labels are not trusted. With both insertions called,
    /// relative order decides. A lone insertion in the `n2` field that falls
    /// before the D call must really be the V-D insertion, and moving it to
    /// `n1` contradicts nothing that comes earlier in segment order. The
    /// mirror case (a lone `n1` past the D call) gets no such repair:
    /// offsets are trusted left to right, so the insertion stands and the
    /// D call is the one discarded, by the reconciliation pass below.
    fn oriented(self) -> Self {
        let mut calls = self;
        match (calls.n1, calls.n2) {
            (Some(n1), Some(n2)) if n1 > n2 => {
                calls.n1 = Some(n2);
                calls.n2 = Some(n1);
            }
            (None, Some(n2)) if calls.d.is_some_and(|d| n2 < d) => {
                calls.n1 = Some(n2);
                calls.n2 = None;
            }
            _ => (),
        }
        calls
    }
}

// ----------------------------------------------------------------------------
// Span

/// One labeled region of a partitioned rearrangement.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Span<'seq> {
    pub segment: Segment,
    pub text: &'seq str,
}

// ----------------------------------------------------------------------------
// Partition

/// Split `sequence` into labeled spans at the reconciled boundary offsets.
///
/// Boundaries are considered in fixed segment order. The start of the
/// sequence is a synthetic boundary carrying the V label, so the first span
/// is always V; each later boundary is accepted only if it lies strictly
/// beyond every offset accepted before it, and rejected offsets are treated
/// as uncalled rather than rendered out of order. Each accepted boundary
/// runs to the next accepted one, or to the end of the sequence.
///
/// Never fails: with no usable calls the result is a single V span covering
/// the whole sequence. Concatenating the span texts always reproduces
/// `sequence` exactly.
///
/// # Examples
///
/// ```
/// use repseq::segments::{partition, SegmentCalls};
///
/// let calls = SegmentCalls { n1: Some(4), d: Some(6), n2: Some(9), j: Some(11) };
/// let spans = partition("ACGTACGTACGTACGT", &calls);
///
/// let text: Vec<&str> = spans.iter().map(|s| s.text).collect();
/// assert_eq!(vec!["ACGT", "AC", "GTA", "CG", "TACGT"], text);
/// ```
pub fn partition<'seq>(sequence: &'seq str, calls: &SegmentCalls) -> Vec<Span<'seq>> {
    let len = sequence.len();
    let calls = calls.oriented();

    let mut boundaries = [
        (Segment::V, Some(0)),
        (Segment::N1, calls.n1),
        (Segment::D, calls.d),
        (Segment::N2, calls.n2),
        (Segment::J, calls.j),
    ];

    // Monotonicity pass: trust is assigned left to right. An offset at or
    // behind the running maximum of accepted offsets must be wrong, as is
    // anything past the end of the sequence or inside a multi-byte char.
    let mut accepted = 0;
    for (_, offset) in boundaries.iter_mut().skip(1) {
        match *offset {
            Some(at) if at > accepted && at <= len && sequence.is_char_boundary(at) => {
                accepted = at;
            }
            _ => *offset = None,
        }
    }

    // Each surviving boundary runs to the next surviving one.
    let starts: Vec<(Segment, usize)> =
        boundaries.iter().filter_map(|(segment, at)| at.map(|at| (*segment, at))).collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, (segment, at))| {
            let end = starts.get(i + 1).map(|(_, next)| *next).unwrap_or(len);
            Span { segment: *segment, text: &sequence[*at..end] }
        })
        .collect()
}
