//! `repseq` analyzes immune-receptor repertoires from Adaptive-style TSV files.
//!
//! ## What it does
//!
//! 1. `repseq` manages a filesystem **store** of repertoires.
//!
//!    Repertoires are imported from v2 or v3 TSV exports (local files, urls,
//!    optionally zstd-compressed) into per-user, per-context directories with
//!    a JSON index of summary metadata.
//!
//! 1. `repseq` runs **queries** against stored repertoires.
//!
//!    Top rearrangements under pluggable sorts, motif search with a mismatch
//!    budget, multi-repertoire key overlap, clone tracking across time
//!    points, and V/J gene-usage aggregation.
//!
//! 1. `repseq` **reconciles** inconsistent gene-segment calls.
//!
//!    Upstream pipelines emit V/N1/D/N2/J boundary offsets that disagree
//!    with each other; [segments] repairs or discards them and produces a
//!    gap-free labeled partition of every rearrangement for display.

pub mod admin;
pub mod cli;
pub mod export;
pub mod geneuse;
pub mod keys;
pub mod overlap;
pub mod repertoire;
pub mod search;
pub mod segments;
pub mod sorter;
pub mod store;
pub mod table;
pub mod topx;
pub mod track;
pub mod tsv;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutil;

#[doc(inline)]
pub use crate::cli::Cli;
#[doc(inline)]
pub use crate::repertoire::{Rearrangement, Repertoire};
#[doc(inline)]
pub use crate::store::{ContextStore, FileStore, RepertoireStore};
#[doc(inline)]
pub use crate::table::Table;
#[doc(inline)]
pub use utils::verbosity::Verbosity;
