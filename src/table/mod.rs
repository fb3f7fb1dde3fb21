//! Plain-text table rendering for CLI output.

use crate::utils;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A row-based table of displayable values.
///
/// # Examples
///
/// ```
/// use repseq::table::Table;
///
/// let mut table = Table::new(vec!["name", "count"]);
/// table.add_row(vec!["rep1".to_string(), "120".to_string()]);
/// println!("{}", table.to_markdown());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<&str>) -> Self {
        Table { headers: headers.into_iter().map(String::from).collect(), rows: Vec::new() }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Render with padded, pipe-separated columns.
    pub fn to_markdown(&self) -> String {
        // widest cell per column, with a space of padding on either side
        let widths = self
            .headers
            .iter()
            .enumerate()
            .map(|(col, header)| {
                self.rows
                    .iter()
                    .map(|row| row.get(col).map(String::len).unwrap_or(0))
                    .chain(std::iter::once(header.len()))
                    .max()
                    .unwrap_or(0)
                    + 2
            })
            .collect_vec();

        let mut markdown = String::from("|");
        let mut frame = String::from("|");
        for (header, width) in self.headers.iter().zip(widths.iter()) {
            markdown.push_str(&format!("{:^width$}|", header, width = width));
            frame.push_str(&format!("{}|", "-".repeat(*width)));
        }
        markdown.push('\n');
        markdown.push_str(&frame);
        markdown.push('\n');

        for row in &self.rows {
            markdown.push('|');
            for (col, width) in widths.iter().enumerate() {
                let cell = row.get(col).map(String::as_str).unwrap_or("");
                markdown.push_str(&format!("{:^width$}|", cell, width = width));
            }
            markdown.push('\n');
        }

        markdown
    }

    /// Write as a delimited file; the delimiter follows the extension.
    pub fn write(&self, path: &Path) -> Result<(), Report> {
        let delim = utils::get_delimiter(&path)?.to_string();
        let mut file =
            File::create(path).wrap_err_with(|| eyre!("Unable to create file: {path:?}"))?;

        let line = format!("{}\n", self.headers.iter().join(&delim));
        file.write_all(line.as_bytes())
            .wrap_err_with(|| eyre!("Unable to write table headers: {line}"))?;

        for row in &self.rows {
            let line = format!("{}\n", row.iter().join(&delim));
            file.write_all(line.as_bytes())
                .wrap_err_with(|| eyre!("Unable to write table row: {line}"))?;
        }

        Ok(())
    }
}
