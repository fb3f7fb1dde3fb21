//! Repertoire storage: a pluggable store trait and its filesystem backend.


use crate::repertoire::{Repertoire, RepertoireSpec};
use crate::utils;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use log::warn;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const TSV_EXT: &str = "tsv";
const CACHE_SUFFIX: &str = "__cache";

// ----------------------------------------------------------------------------
// RepertoireStore

/// Storage backend for repertoire TSVs and per-context metadata.
///
/// Implementations must enforce that a repertoire is only reachable through
/// its owning user and context; handing out a stream across contexts would
/// leak one user's data to another.
pub trait RepertoireStore: Send + Sync {
    /// Names of the contexts a user owns.
    fn user_contexts(&self, user_id: &str) -> Result<Vec<String>, Report>;

    /// The repertoire index of one context; empty if the context is new.
    fn context_repertoires(&self, user_id: &str, context: &str) -> Result<Vec<Repertoire>, Report>;

    /// Open a repertoire TSV for reading.
    fn open_repertoire(&self, spec: &RepertoireSpec) -> Result<Box<dyn BufRead + Send>, Report>;

    /// Create the TSV for a new repertoire; fails if one already exists.
    fn create_repertoire(&self, spec: &RepertoireSpec) -> Result<Box<dyn Write + Send>, Report>;

    /// Add a repertoire to its context's index.
    fn commit_repertoire(
        &self,
        user_id: &str,
        context: &str,
        repertoire: &Repertoire,
    ) -> Result<(), Report>;

    /// Remove a repertoire, its cached files and its index entry. Returns
    /// false when the name was not in the index.
    fn delete_repertoire(&self, spec: &RepertoireSpec) -> Result<bool, Report>;

    /// Open a named cache file, or `None` when nothing is cached.
    fn open_secondary(
        &self,
        spec: &RepertoireSpec,
        key: &str,
    ) -> Result<Option<Box<dyn BufRead + Send>>, Report>;

    /// Create (or overwrite) a named cache file.
    fn create_secondary(
        &self,
        spec: &RepertoireSpec,
        key: &str,
    ) -> Result<Box<dyn Write + Send>, Report>;

    /// Drop all cache files for a repertoire.
    fn delete_secondary_files(&self, spec: &RepertoireSpec) -> Result<(), Report>;
}

// ----------------------------------------------------------------------------
// FileStore

/// Filesystem store.
///
/// Layout under the base directory: one directory per user (name plus a
/// sha-256 of the raw user id, so that ids differing only in punctuation
/// cannot collapse into one directory), one subdirectory per context holding
/// `context.json` and a `<name>.tsv` per repertoire, with cached artifacts
/// in `<name>__cache/`.
#[derive(Clone, Debug)]
pub struct FileStore {
    base: PathBuf,
    context_file_name: String,
}

impl FileStore {
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, Report> {
        let base = base.into();
        fs::create_dir_all(&base)
            .wrap_err_with(|| eyre!("Failed to create store directory: {base:?}"))?;
        Ok(FileStore { base, context_file_name: "context.json".to_string() })
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.base.join(format!("{}_{}", clean(user_id), utils::sha256_hex(user_id)))
    }

    fn context_dir(&self, user_id: &str, context: &str) -> PathBuf {
        self.user_dir(user_id).join(clean(context))
    }

    fn context_file(&self, user_id: &str, context: &str) -> PathBuf {
        self.context_dir(user_id, context).join(&self.context_file_name)
    }

    fn repertoire_file(&self, spec: &RepertoireSpec) -> PathBuf {
        self.context_dir(&spec.user_id, &spec.context)
            .join(format!("{}.{TSV_EXT}", clean(&spec.name)))
    }

    fn cache_dir(&self, spec: &RepertoireSpec) -> PathBuf {
        self.context_dir(&spec.user_id, &spec.context)
            .join(format!("{}{CACHE_SUFFIX}", clean(&spec.name)))
    }

    fn save_context_repertoires(
        &self,
        user_id: &str,
        context: &str,
        repertoires: &[Repertoire],
    ) -> Result<(), Report> {
        let dir = self.context_dir(user_id, context);
        fs::create_dir_all(&dir)
            .wrap_err_with(|| eyre!("Failed to create context directory: {dir:?}"))?;

        let path = self.context_file(user_id, context);
        let json = serde_json::to_string_pretty(repertoires)
            .wrap_err("Failed to serialize context index")?;
        fs::write(&path, format!("{json}\n"))
            .wrap_err_with(|| eyre!("Failed to write context index: {path:?}"))?;
        Ok(())
    }
}

impl RepertoireStore for FileStore {
    fn user_contexts(&self, user_id: &str) -> Result<Vec<String>, Report> {
        let dir = self.user_dir(user_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut contexts = Vec::new();
        for entry in fs::read_dir(&dir).wrap_err_with(|| eyre!("Failed to list {dir:?}"))? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                contexts.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        contexts.sort();
        Ok(contexts)
    }

    fn context_repertoires(&self, user_id: &str, context: &str) -> Result<Vec<Repertoire>, Report> {
        let path = self.context_file(user_id, context);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).wrap_err_with(|| eyre!("Failed to read context index: {path:?}"))
            }
        };

        serde_json::from_str(&json)
            .wrap_err_with(|| eyre!("Failed to parse context index: {path:?}"))
    }

    fn open_repertoire(&self, spec: &RepertoireSpec) -> Result<Box<dyn BufRead + Send>, Report> {
        let path = self.repertoire_file(spec);
        let file = File::open(&path)
            .wrap_err_with(|| eyre!("Failed to open repertoire {spec}: {path:?}"))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn create_repertoire(&self, spec: &RepertoireSpec) -> Result<Box<dyn Write + Send>, Report> {
        let dir = self.context_dir(&spec.user_id, &spec.context);
        fs::create_dir_all(&dir)
            .wrap_err_with(|| eyre!("Failed to create context directory: {dir:?}"))?;

        let path = self.repertoire_file(spec);
        if path.exists() {
            return Err(eyre!("File for repertoire {spec} already exists")
                .suggestion("A name collision after cleaning? Pick a different name."));
        }

        let file = File::create(&path)
            .wrap_err_with(|| eyre!("Failed to create repertoire {spec}: {path:?}"))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn commit_repertoire(
        &self,
        user_id: &str,
        context: &str,
        repertoire: &Repertoire,
    ) -> Result<(), Report> {
        let mut repertoires = self.context_repertoires(user_id, context)?;
        repertoires.retain(|r| r.name != repertoire.name);
        repertoires.push(repertoire.clone());
        self.save_context_repertoires(user_id, context, &repertoires)
    }

    fn delete_repertoire(&self, spec: &RepertoireSpec) -> Result<bool, Report> {
        let repertoires = self.context_repertoires(&spec.user_id, &spec.context)?;
        let remaining: Vec<Repertoire> =
            repertoires.iter().filter(|r| r.name != spec.name).cloned().collect();
        let found = remaining.len() != repertoires.len();

        if found {
            if remaining.is_empty() {
                remove_if_present(&self.context_file(&spec.user_id, &spec.context))?;
            } else {
                self.save_context_repertoires(&spec.user_id, &spec.context, &remaining)?;
            }
        }

        remove_if_present(&self.repertoire_file(spec))?;
        self.delete_secondary_files(spec)?;

        if found && remaining.is_empty() {
            // last repertoire in the context; the directory goes too
            let dir = self.context_dir(&spec.user_id, &spec.context);
            if let Err(err) = fs::remove_dir_all(&dir) {
                warn!("Failed to remove context directory {dir:?}: {err}");
            }
        }

        Ok(found)
    }

    fn open_secondary(
        &self,
        spec: &RepertoireSpec,
        key: &str,
    ) -> Result<Option<Box<dyn BufRead + Send>>, Report> {
        let path = self.cache_dir(spec).join(clean(key));
        match File::open(&path) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).wrap_err_with(|| eyre!("Failed to open cache file {key} for {spec}"))
            }
        }
    }

    fn create_secondary(
        &self,
        spec: &RepertoireSpec,
        key: &str,
    ) -> Result<Box<dyn Write + Send>, Report> {
        let dir = self.cache_dir(spec);
        fs::create_dir_all(&dir)
            .wrap_err_with(|| eyre!("Failed to create cache directory: {dir:?}"))?;

        let path = dir.join(clean(key));
        let file = File::create(&path)
            .wrap_err_with(|| eyre!("Failed to create cache file {key} for {spec}"))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn delete_secondary_files(&self, spec: &RepertoireSpec) -> Result<(), Report> {
        let dir = self.cache_dir(spec);
        if dir.is_dir() {
            fs::remove_dir_all(&dir)
                .wrap_err_with(|| eyre!("Failed to remove cache directory: {dir:?}"))?;
        }
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> Result<(), Report> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).wrap_err_with(|| eyre!("Failed to remove {path:?}")),
    }
}

/// Collapse runs of non-word characters to a single underscore, keeping
/// path components portable.
fn clean(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    let mut gap = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            cleaned.push(ch);
            gap = false;
        } else if !gap {
            cleaned.push('_');
            gap = true;
        }
    }
    cleaned
}

// ----------------------------------------------------------------------------
// ContextStore

/// One user's context with its repertoire index loaded.
pub struct ContextStore<'store> {
    store: &'store dyn RepertoireStore,
    user_id: String,
    context: String,
    repertoires: Vec<Repertoire>,
}

impl<'store> ContextStore<'store> {
    pub fn open(
        store: &'store dyn RepertoireStore,
        user_id: &str,
        context: &str,
    ) -> Result<Self, Report> {
        let repertoires = store.context_repertoires(user_id, context)?;
        Ok(ContextStore {
            store,
            user_id: user_id.to_string(),
            context: context.to_string(),
            repertoires,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn repertoires(&self) -> &[Repertoire] {
        &self.repertoires
    }

    pub fn find(&self, name: &str) -> Option<&Repertoire> {
        Repertoire::find(&self.repertoires, name)
    }

    /// Look up a repertoire that callers expect to exist.
    pub fn require(&self, name: &str) -> Result<&Repertoire, Report> {
        self.find(name).ok_or_else(|| {
            eyre!("Repertoire {name} not found in {}/{}", self.user_id, self.context)
        })
    }

    pub fn spec(&self, name: &str) -> RepertoireSpec {
        RepertoireSpec::new(&self.user_id, &self.context, name)
    }

    pub fn open_repertoire(&self, name: &str) -> Result<Box<dyn BufRead + Send>, Report> {
        self.store.open_repertoire(&self.spec(name))
    }

    pub fn open_secondary(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Option<Box<dyn BufRead + Send>>, Report> {
        self.store.open_secondary(&self.spec(name), key)
    }

    pub fn create_secondary(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Box<dyn Write + Send>, Report> {
        self.store.create_secondary(&self.spec(name), key)
    }
}
