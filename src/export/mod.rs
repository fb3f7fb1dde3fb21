//! Export a repertoire as TSV or FASTA.


use crate::store::ContextStore;
use crate::tsv;
use crate::utils;
use bio::io::fasta;
use clap::ValueEnum;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use structdoc::StructDoc;

// ----------------------------------------------------------------------------
// Format

/// Output format for an exported repertoire.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, StructDoc, ValueEnum,
)]
pub enum Format {
    /// The stored TSV, byte for byte.
    #[default]
    Original,
    /// FASTA with records named by row ordinal.
    FastaIndex,
    /// FASTA with records named by the sha-256 of their sequence.
    FastaHash,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Original => "tsv",
            Format::FastaIndex | Format::FastaHash => "fasta",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Format::Original => "original",
            Format::FastaIndex => "fasta-index",
            Format::FastaHash => "fasta-hash",
        };
        write!(f, "{name}")
    }
}

// ----------------------------------------------------------------------------
// Export

/// Write one repertoire to `output` in the requested format.
pub fn export(
    crs: &ContextStore,
    repertoire: &str,
    format: Format,
    output: &Path,
) -> Result<(), Report> {
    crs.require(repertoire)?;

    let file = File::create(output)
        .wrap_err_with(|| eyre!("Failed to create export file: {output:?}"))?;
    let mut out = BufWriter::new(file);

    match format {
        Format::Original => {
            let mut input = crs.open_repertoire(repertoire)?;
            std::io::copy(&mut input, &mut out)
                .wrap_err_with(|| eyre!("Failed to copy repertoire {repertoire}"))?;
        }
        Format::FastaIndex | Format::FastaHash => {
            export_fasta(crs, repertoire, format, &mut out)?;
        }
    }

    out.flush()?;
    info!("exported {repertoire} as {format} to {output:?}");
    Ok(())
}

fn export_fasta<W: Write>(
    crs: &ContextStore,
    repertoire: &str,
    format: Format,
    out: W,
) -> Result<(), Report> {
    let mut reader = tsv::Reader::new(crs.open_repertoire(repertoire)?, 0);
    let mut writer = fasta::Writer::new(out);

    let mut row = 0;
    while let Some(r) = reader.read_next()? {
        let id = match format {
            Format::FastaHash => utils::sha256_hex(&r.rearrangement),
            _ => row.to_string(),
        };
        writer
            .write(&id, None, r.rearrangement.as_bytes())
            .wrap_err_with(|| eyre!("Failed to write FASTA record {row}"))?;
        row += 1;
    }

    Ok(())
}
