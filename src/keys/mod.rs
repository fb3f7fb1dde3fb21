//! Extract and match the comparable "key" of a rearrangement.


use crate::repertoire::Rearrangement;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use structdoc::StructDoc;

// ----------------------------------------------------------------------------
// KeyType

/// Which string identifies a clone for search, overlap and sorting.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, StructDoc, ValueEnum,
)]
pub enum KeyType {
    /// The full nucleotide sequence.
    #[default]
    Rearrangement,
    /// The translated amino-acid sequence.
    AminoAcid,
    /// The CDR3 nucleotide slice.
    Cdr3,
}

impl KeyType {
    /// The key string of one rearrangement; `None` when the record cannot
    /// provide it (no CDR3 call, empty translation).
    pub fn extract<'r>(&self, r: &'r Rearrangement) -> Option<&'r str> {
        let key = match self {
            KeyType::Rearrangement => Some(r.rearrangement.as_str()),
            KeyType::AminoAcid => Some(r.amino_acid.as_str()),
            KeyType::Cdr3 => r.cdr3(),
        };
        key.filter(|key| !key.is_empty())
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyType::Rearrangement => "rearrangement",
            KeyType::AminoAcid => "aminoacid",
            KeyType::Cdr3 => "cdr3",
        };
        write!(f, "{name}")
    }
}

impl FromStr for KeyType {
    type Err = color_eyre::eyre::Report;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_lowercase().as_str() {
            "rearrangement" => Ok(KeyType::Rearrangement),
            "aminoacid" => Ok(KeyType::AminoAcid),
            "cdr3" => Ok(KeyType::Cdr3),
            _ => Err(color_eyre::eyre::eyre!("Unknown key type: {text:?}")),
        }
    }
}

// ----------------------------------------------------------------------------
// Matcher

/// Sliding substring match with a mismatch budget.
///
/// `N` runs at nucleotide edges over-match badly when treated as wildcards
/// (we have seen runs of 15+), so no wildcarding is done for any key type.
#[derive(Clone, Copy, Debug)]
pub struct Matcher {
    allowed_mutations: usize,
    full_length: bool,
}

impl Matcher {
    pub fn new(allowed_mutations: usize, full_length: bool) -> Self {
        Matcher { allowed_mutations, full_length }
    }

    /// True when `search` occurs in `key` with at most the allowed number
    /// of mismatches. Empty inputs never match.
    pub fn matches(&self, search: &str, key: &str) -> bool {
        if search.is_empty() || key.is_empty() {
            return false;
        }

        let search = search.as_bytes();
        let key = key.as_bytes();

        if self.full_length && search.len() != key.len() {
            return false;
        }
        if search.len() > key.len() {
            return false;
        }

        for window in key.windows(search.len()) {
            let mut mutations_remaining = self.allowed_mutations;
            let mut matched = true;

            for (have, want) in window.iter().zip(search.iter()) {
                if have != want {
                    if mutations_remaining == 0 {
                        matched = false;
                        break;
                    }
                    mutations_remaining -= 1;
                }
            }

            if matched {
                return true;
            }
        }

        false
    }
}
