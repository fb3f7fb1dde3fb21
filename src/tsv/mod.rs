//! Read and import Adaptive-style rearrangement TSV files.
//!
//! Two header dialects are in the wild: the v2 export (`nucleotide`,
//! `aminoAcid`, `vMaxResolved`, ...) and the v3 export (`rearrangement`,
//! `amino_acid`, `v_resolved`, ...). Columns are located by name, matched
//! case-insensitively, so column order never matters and unknown columns are
//! ignored.

#[cfg(test)]
pub mod tests;

use crate::repertoire::{
    index_from_raw, FrameType, Locus, Rearrangement, Repertoire, RepertoireSpec,
};
use crate::store::RepertoireStore;
use chrono::NaiveDate;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use log::{info, warn};
use std::io::{BufRead, Write};
use strum::{EnumCount, EnumIter, IntoEnumIterator};

const TSV_SEP: char = '\t';

// ----------------------------------------------------------------------------
// Columns

/// The columns a rearrangement row is built from.
#[derive(Clone, Copy, Debug, EnumCount, EnumIter, Eq, PartialEq)]
enum Column {
    Rearrangement,
    AminoAcid,
    FrameType,
    Count,
    VResolved,
    DResolved,
    JResolved,
    Cdr3Length,
    VIndex,
    DIndex,
    JIndex,
    N1Index,
    N2Index,
    VShmIndices,
    Cells,
    CellsEstimate,
}

impl Column {
    /// Map a lowercased header cell to its column, for both dialects.
    fn from_header(header: &str) -> Option<Self> {
        let column = match header {
            // v2
            "nucleotide" => Column::Rearrangement,
            "aminoacid" => Column::AminoAcid,
            "sequencestatus" => Column::FrameType,
            "count (templates/reads)" => Column::Count,
            "vmaxresolved" => Column::VResolved,
            "dmaxresolved" => Column::DResolved,
            "jmaxresolved" => Column::JResolved,
            "cdr3length" => Column::Cdr3Length,
            "vindex" => Column::VIndex,
            "dindex" => Column::DIndex,
            "jindex" => Column::JIndex,
            "n1index" => Column::N1Index,
            "n2index" => Column::N2Index,
            "valignsubstitutionindexes" => Column::VShmIndices,

            // v3
            "rearrangement" => Column::Rearrangement,
            "amino_acid" => Column::AminoAcid,
            "frame_type" => Column::FrameType,
            "templates" => Column::Count,
            "v_resolved" => Column::VResolved,
            "d_resolved" => Column::DResolved,
            "j_resolved" => Column::JResolved,
            "cdr3_length" => Column::Cdr3Length,
            "v_index" => Column::VIndex,
            "d_index" => Column::DIndex,
            "j_index" => Column::JIndex,
            "n1_index" => Column::N1Index,
            "n2_index" => Column::N2Index,
            "v_shm_indexes" => Column::VShmIndices,
            "sample_cells" => Column::Cells,
            "sample_cells_mass_estimate" => Column::CellsEstimate,

            _ => return None,
        };
        Some(column)
    }

    /// Columns that every usable file must carry.
    fn required(&self) -> bool {
        !matches!(self, Column::VShmIndices | Column::Cells | Column::CellsEstimate)
    }
}

#[derive(Clone, Debug)]
struct Header {
    positions: [Option<usize>; Column::COUNT],
}

impl Header {
    fn parse(line: &str) -> Result<Self, Report> {
        let mut positions = [None; Column::COUNT];
        for (at, cell) in line.split(TSV_SEP).enumerate() {
            if let Some(column) = Column::from_header(&cell.trim().to_lowercase()) {
                positions[column as usize] = Some(at);
            }
        }

        let header = Header { positions };
        for column in Column::iter().filter(Column::required) {
            if header.positions[column as usize].is_none() {
                return Err(eyre!("TSV header is missing the {column:?} column"));
            }
        }
        Ok(header)
    }

    fn get<'row>(&self, row: &[&'row str], column: Column) -> Option<&'row str> {
        let at = self.positions[column as usize]?;
        row.get(at).map(|cell| cell.trim())
    }

    fn require<'row>(&self, row: &[&'row str], column: Column) -> Result<&'row str, Report> {
        self.get(row, column).ok_or_else(|| eyre!("Row is missing the {column:?} column"))
    }
}

// ----------------------------------------------------------------------------
// Reader

/// Streaming TSV reader, optionally teeing raw lines into a writer.
///
/// The tee receives every line read, including the header and any comment
/// lines, which is what import needs to persist a byte-faithful copy.
pub struct Reader<R: BufRead, W: Write = std::io::Sink> {
    input: R,
    tee: Option<W>,
    header: Option<Header>,
    start_row_index: usize,
    next_row_index: usize,
    discovered_cells: Option<u64>,
}

impl<R: BufRead> Reader<R> {
    pub fn new(input: R, start_row_index: usize) -> Self {
        Reader {
            input,
            tee: None,
            header: None,
            start_row_index,
            next_row_index: 0,
            discovered_cells: None,
        }
    }
}

impl<R: BufRead, W: Write> Reader<R, W> {
    pub fn with_tee(input: R, tee: W) -> Self {
        Reader {
            input,
            tee: Some(tee),
            header: None,
            start_row_index: 0,
            next_row_index: 0,
            discovered_cells: None,
        }
    }

    /// Index of the next data row `read_next` would return.
    pub fn next_row_index(&self) -> usize {
        self.next_row_index
    }

    /// Cell count found in the file itself, if any row carried one.
    pub fn discovered_cells(&self) -> Option<u64> {
        self.discovered_cells
    }

    /// Flush and hand back the tee writer.
    pub fn finish(mut self) -> Result<Option<W>, Report> {
        if let Some(tee) = self.tee.as_mut() {
            tee.flush().wrap_err("Failed to flush import copy")?;
        }
        Ok(self.tee)
    }

    /// Read rows until `max` are collected or the file ends.
    pub fn read_batch(&mut self, max: usize) -> Result<Vec<Rearrangement>, Report> {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.read_next()? {
                Some(rearrangement) => batch.push(rearrangement),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Read and parse the next data row, or `None` at end of file.
    pub fn read_next(&mut self) -> Result<Option<Rearrangement>, Report> {
        if self.header.is_none() {
            self.initialize()?;
        }

        let Some(line) = self.read_line()? else { return Ok(None) };
        let row_index = self.next_row_index;
        self.next_row_index += 1;

        self.parse_row(&line).wrap_err_with(|| eyre!("Failed to parse TSV row {row_index}"))
    }

    fn parse_row(&mut self, line: &str) -> Result<Option<Rearrangement>, Report> {
        let row: Vec<&str> = line.split(TSV_SEP).collect();
        let header = self.header.as_ref().ok_or_else(|| eyre!("TSV header not parsed"))?;

        let mut r = Rearrangement {
            rearrangement: header.require(&row, Column::Rearrangement)?.to_string(),
            amino_acid: header.require(&row, Column::AminoAcid)?.to_string(),
            v_resolved: header.require(&row, Column::VResolved)?.to_string(),
            d_resolved: header.require(&row, Column::DResolved)?.to_string(),
            j_resolved: header.require(&row, Column::JResolved)?.to_string(),
            ..Default::default()
        };

        r.frame_type = header.require(&row, Column::FrameType)?.parse::<FrameType>()?;
        r.count = parse_number(header.require(&row, Column::Count)?)?;
        r.cdr3_length = parse_number(header.require(&row, Column::Cdr3Length)?)?;
        r.v_index = parse_index(header.require(&row, Column::VIndex)?)?;
        r.d_index = parse_index(header.require(&row, Column::DIndex)?)?;
        r.j_index = parse_index(header.require(&row, Column::JIndex)?)?;
        r.n1_index = parse_index(header.require(&row, Column::N1Index)?)?;
        r.n2_index = parse_index(header.require(&row, Column::N2Index)?)?;

        r.locus = Locus::from_genes(&r.v_resolved, &r.d_resolved, &r.j_resolved).ok();

        if let Some(csv) = header.get(&row, Column::VShmIndices).filter(|s| !s.is_empty()) {
            r.v_shm_indices = csv
                .split(',')
                .map(|cell| parse_number(cell.trim()))
                .collect::<Result<Vec<usize>, Report>>()?;
        }

        if self.discovered_cells.is_none() {
            for column in [Column::Cells, Column::CellsEstimate] {
                if let Some(cell) = header.get(&row, column).filter(|s| !s.is_empty()) {
                    self.discovered_cells = Some(parse_number(cell)?);
                    break;
                }
            }
        }

        Ok(Some(r))
    }

    fn initialize(&mut self) -> Result<(), Report> {
        while let Some(line) = self.read_line()? {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            self.header = Some(Header::parse(trimmed)?);
            break;
        }

        if self.header.is_none() {
            return Err(eyre!("TSV input ended before a header line"));
        }

        // skip forward for paged reads
        while self.next_row_index < self.start_row_index {
            if self.read_line()?.is_none() {
                break;
            }
            self.next_row_index += 1;
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, Report> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line).wrap_err("Failed to read TSV line")?;
        if read == 0 {
            return Ok(None);
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        if let Some(tee) = self.tee.as_mut() {
            tee.write_all(line.as_bytes()).wrap_err("Failed to write import copy")?;
            tee.write_all(b"\n").wrap_err("Failed to write import copy")?;
        }
        Ok(Some(line))
    }
}

fn parse_number<T>(cell: &str) -> Result<T, Report>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    cell.parse().wrap_err_with(|| eyre!("Invalid numeric field: {cell:?}"))
}

fn parse_index(cell: &str) -> Result<Option<usize>, Report> {
    let raw: i64 = cell.parse().wrap_err_with(|| eyre!("Invalid index field: {cell:?}"))?;
    Ok(index_from_raw(raw))
}

// ----------------------------------------------------------------------------
// Receive

/// How an import attempt ended (short of an error).
#[derive(Clone, Debug, PartialEq)]
pub enum ReceiveOutcome {
    /// Imported and committed to the context.
    Received(Repertoire),
    /// A repertoire with this name already exists; nothing was written.
    Exists,
}

/// Caller-supplied metadata that overrides anything discovered in the file.
#[derive(Clone, Debug, Default)]
pub struct ReceiveOptions {
    pub date: Option<NaiveDate>,
    pub total_cells: Option<u64>,
    pub total_milliliters: Option<f64>,
}

/// Stream a TSV into the store, accumulating the repertoire summary.
///
/// The raw bytes are copied line-for-line while each row is parsed and
/// folded into the summary, so the file is read exactly once. A failed parse
/// removes the partial copy before the error is returned.
pub fn receive(
    input: impl BufRead,
    store: &dyn RepertoireStore,
    spec: &RepertoireSpec,
    options: &ReceiveOptions,
) -> Result<ReceiveOutcome, Report> {
    let existing = store.context_repertoires(&spec.user_id, &spec.context)?;
    if Repertoire::find(&existing, &spec.name).is_some() {
        info!("Attempted re-import of existing repertoire: {spec}");
        return Ok(ReceiveOutcome::Exists);
    }

    let copy = store.create_repertoire(spec)?;
    let mut reader = Reader::with_tee(input, copy);

    let mut repertoire = Repertoire::new(&spec.name);
    repertoire.date = options.date;

    let received = loop {
        match reader.read_next() {
            Ok(Some(r)) => repertoire.accumulate(r.locus, r.count),
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        }
    };

    if let Err(err) = received {
        // close, then drop the partial copy; the context index was never
        // touched
        drop(reader);
        if let Err(cleanup) = store.delete_repertoire(spec) {
            warn!("Failed to remove partial import {spec}: {cleanup:?}");
        }
        return Err(err).wrap_err_with(|| eyre!("Import of {spec} failed"));
    }

    let discovered_cells = reader.discovered_cells();
    reader.finish()?;

    repertoire.total_cells = options.total_cells.or(discovered_cells).unwrap_or(0);
    repertoire.total_milliliters = options.total_milliliters.unwrap_or(0.0);

    store.commit_repertoire(&spec.user_id, &spec.context, &repertoire)?;
    Ok(ReceiveOutcome::Received(repertoire))
}
