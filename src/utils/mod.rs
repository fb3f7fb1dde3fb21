pub mod verbosity;

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use zstd::stream::read::Decoder;

/// Hex sha-256 digest of a string.
///
/// ```rust
/// use repseq::utils::sha256_hex;
///
/// assert_eq!(
///     "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
///     sha256_hex("hello"),
/// );
/// ```
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Get delimiter based on file extension.
///
/// - `.tsv` => `\t`
/// - `.txt` => `\t`
/// - `.csv` => `,`
///
/// Note that `.txt` is assumed to be tab-delimited!
///
/// ```rust
/// use repseq::utils::get_delimiter;
///
/// assert_eq!(get_delimiter(&"file.tsv")?, '\t');
/// assert_eq!(get_delimiter(&"file.csv")?, ',');
/// assert!(get_delimiter(&"file").is_err());
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn get_delimiter<P>(path: &P) -> Result<char, Report>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    let ext = path
        .as_ref()
        .extension()
        .ok_or_else(|| eyre!("Failed to get file extension: {path:?}"))?
        .to_str()
        .ok_or_else(|| eyre!("Failed to convert file extension to str: {path:?}"))?;

    match ext {
        "tsv" | "txt" => Ok('\t'),
        "csv" => Ok(','),
        _ext => {
            Err(eyre!("Unknown file extension: {_ext:?}").suggestion("Options: tsv, csv, or txt"))
        }
    }
}

/// Open a file for buffered reading, decompressing `.zst` transparently.
pub fn open_maybe_compressed(path: &Path) -> Result<Box<dyn BufRead + Send>, Report> {
    let file = File::open(path).wrap_err_with(|| eyre!("Failed to open: {path:?}"))?;

    let ext = path.extension().and_then(|ext| ext.to_str());
    if ext == Some("zst") {
        let decoder =
            Decoder::new(file).wrap_err_with(|| eyre!("Failed to decode: {path:?}"))?;
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Download a file from a url into a directory, named after the url's last
/// path component.
pub async fn download_file(url: &str, output_dir: &Path) -> Result<PathBuf, Report> {
    let name = url
        .split('/')
        .last()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| eyre!("Failed to parse file name from url: {url}"))?;

    std::fs::create_dir_all(output_dir)
        .wrap_err_with(|| eyre!("Failed to create directory: {output_dir:?}"))?;
    let output = output_dir.join(name);

    let response = reqwest::get(url).await.wrap_err_with(|| eyre!("Failed to fetch: {url}"))?;
    if !response.status().is_success() {
        return Err(eyre!("Failed to download: {url}")
            .suggestion(format!("Status code: {}", response.status())));
    }

    let bytes = response.bytes().await?;
    std::fs::write(&output, bytes).wrap_err_with(|| eyre!("Unable to write: {output:?}"))?;

    Ok(output)
}
