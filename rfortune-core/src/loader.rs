//! Loader - Module Files into the Key-Space
//!
//! TigerStyle: lazy parsing, one atomic batch per fortune, typed failures.
//!
//! # File Format
//!
//! ```text
//! A fortune may span
//! several lines.
//! %
//! Another one.
//! %
//! ```
//!
//! A line that is exactly `%` ends a record. Line breaks inside a record are
//! kept. A trailing record with no closing `%` is discarded, and records with
//! no visible text are skipped.
//!
//! # Write Protocol
//!
//! ```text
//! INCR fid                       → id
//! MULTI
//!   SET  f/<id>         text
//!   SADD fmod/<module>  id
//!   SADD fmods          module
//! EXEC
//! ```
//!
//! The id is minted outside the batch; a crash in between leaves an unused
//! id and nothing else. The batch itself is all-or-nothing, so an id never
//! sits in a module set without its text.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::backend::{KvConnection, WriteOp};
use crate::constants::{MODULE_NAME_BYTES_MAX, RECORD_DELIMITER, STRFILE_INDEX_EXTENSION};
use crate::error::{FortuneError, FortuneResult};
use crate::pool::{ConnectionPool, ManageConnection};
use crate::schema::{fortune_text_key, id_counter_key, module_fortune_set_key, module_set_key};

// =============================================================================
// Parser
// =============================================================================

/// Lazily splits a module file into fortune texts.
pub struct ModuleParser<R> {
    lines: std::io::Split<R>,
    record: String,
    record_lines: usize,
    discarded_trailing: bool,
    skipped_empty: usize,
    done: bool,
}

impl<R: BufRead> ModuleParser<R> {
    /// Parse records from `reader`. Invalid UTF-8 is replaced, not rejected.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.split(b'\n'),
            record: String::new(),
            record_lines: 0,
            discarded_trailing: false,
            skipped_empty: 0,
            done: false,
        }
    }

    /// True once the parser has dropped an unterminated trailing record.
    #[must_use]
    pub fn discarded_trailing(&self) -> bool {
        self.discarded_trailing
    }

    /// Records skipped because they held no visible text.
    #[must_use]
    pub fn skipped_empty(&self) -> usize {
        self.skipped_empty
    }
}

impl<R: BufRead> Iterator for ModuleParser<R> {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let raw = match self.lines.next() {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    if !self.record.trim().is_empty() {
                        self.discarded_trailing = true;
                    }
                    return None;
                }
            };

            let line = String::from_utf8_lossy(&raw);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line == RECORD_DELIMITER {
                let record = std::mem::take(&mut self.record);
                self.record_lines = 0;
                if record.trim().is_empty() {
                    self.skipped_empty += 1;
                    continue;
                }
                return Some(Ok(record));
            }

            if self.record_lines > 0 {
                self.record.push('\n');
            }
            self.record.push_str(line);
            self.record_lines += 1;
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// Fortunes stored for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLoad {
    /// Module name
    pub module: String,
    /// Fortunes written
    pub count: usize,
}

/// A module file that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFailure {
    /// Module name
    pub module: String,
    /// What went wrong
    pub error: String,
}

/// Outcome of loading a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Modules loaded, in load order
    pub modules: Vec<ModuleLoad>,
    /// Modules skipped because their file could not be read
    pub failed: Vec<ModuleFailure>,
}

impl LoadReport {
    /// Total fortunes written.
    #[must_use]
    pub fn total(&self) -> usize {
        self.modules.iter().map(|m| m.count).sum()
    }

    /// True when no module file failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// =============================================================================
// Store
// =============================================================================

/// Store one fortune and return its freshly minted id.
///
/// # Errors
/// Propagates backend failures. Nothing is rolled back: if the batch fails
/// the minted id is simply never used.
pub async fn store_fortune<C>(conn: &mut C, module: &str, text: &str) -> FortuneResult<u64>
where
    C: KvConnection + ?Sized,
{
    // Preconditions
    assert!(!module.is_empty(), "module name cannot be empty");
    assert!(!text.trim().is_empty(), "fortune text cannot be empty");

    let id = conn.incr(id_counter_key()).await?;
    conn.exec_atomic(&[
        WriteOp::set(fortune_text_key(id), text),
        WriteOp::set_add(module_fortune_set_key(module), id.to_string()),
        WriteOp::set_add(module_set_key(), module),
    ])
    .await?;

    Ok(id)
}

/// Parse `reader` and store every record under `module`.
///
/// `source` only labels read errors.
///
/// # Errors
/// `Io` if reading fails; backend errors abort the remaining writes of this
/// module, leaving earlier fortunes in place.
pub async fn load_module<C, R>(
    conn: &mut C,
    module: &str,
    reader: R,
    source: &Path,
) -> FortuneResult<usize>
where
    C: KvConnection + ?Sized,
    R: BufRead,
{
    let mut parser = ModuleParser::new(reader);
    let mut count = 0;

    for record in parser.by_ref() {
        let text = record.map_err(|e| FortuneError::io(source, e))?;
        if let Err(e) = store_fortune(conn, module, &text).await {
            tracing::error!(module, stored = count, error = %e, "aborting module load");
            return Err(e);
        }
        count += 1;
    }

    if parser.discarded_trailing() {
        tracing::warn!(module, "discarded unterminated last record");
    }
    if parser.skipped_empty() > 0 {
        tracing::debug!(module, skipped = parser.skipped_empty(), "skipped empty records");
    }

    Ok(count)
}

/// Check a module name taken from a file name or a caller.
///
/// # Errors
/// `InvalidConfig` for an empty or oversized name.
pub fn validate_module_name(module: &str) -> FortuneResult<()> {
    if module.is_empty() {
        return Err(FortuneError::InvalidConfig("module name cannot be empty".into()));
    }
    if module.len() > MODULE_NAME_BYTES_MAX {
        return Err(FortuneError::InvalidConfig(format!(
            "module name {} bytes exceeds max {}",
            module.len(),
            MODULE_NAME_BYTES_MAX
        )));
    }
    Ok(())
}

// =============================================================================
// Directory
// =============================================================================

/// Module files directly inside `dir`, sorted by name.
///
/// Directories, hidden files and `strfile` `.dat` indexes are skipped.
///
/// # Errors
/// `Io` if the directory cannot be listed.
pub async fn module_files(dir: &Path) -> FortuneResult<Vec<(String, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| FortuneError::io(dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| FortuneError::io(dir, e))?
    {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!(path = %path.display(), "skipping file with non UTF-8 name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some(STRFILE_INDEX_EXTENSION) {
            continue;
        }
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        }
        if validate_module_name(&name).is_err() {
            tracing::warn!(path = %path.display(), "skipping file with unusable module name");
            continue;
        }
        files.push((name, path));
    }

    files.sort();
    Ok(files)
}

/// Load every module file in `dir`.
///
/// A module file that cannot be read is recorded in the report and the run
/// continues. A backend failure aborts the run.
///
/// # Errors
/// `Io` if `dir` cannot be listed; any backend error.
pub async fn load_dir<M>(pool: &ConnectionPool<M>, dir: &Path) -> FortuneResult<LoadReport>
where
    M: ManageConnection,
    M::Connection: KvConnection,
{
    let mut report = LoadReport::default();

    for (module, path) in module_files(dir).await? {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = FortuneError::io(&path, e);
                tracing::warn!(module = %module, error = %error, "skipping module");
                report.failed.push(ModuleFailure {
                    module,
                    error: error.to_string(),
                });
                continue;
            }
        };

        let count = load_pooled(pool, &module, bytes.as_slice(), &path).await?;
        tracing::info!(module = %module, count, "Loaded {} fortunes from {}", count, module);
        report.modules.push(ModuleLoad { module, count });
    }

    tracing::info!(
        modules = report.modules.len(),
        fortunes = report.total(),
        failed = report.failed.len(),
        "load finished"
    );
    Ok(report)
}

/// Load one module through a pooled connection.
pub(crate) async fn load_pooled<M, R>(
    pool: &ConnectionPool<M>,
    module: &str,
    reader: R,
    source: &Path,
) -> FortuneResult<usize>
where
    M: ManageConnection,
    M::Connection: KvConnection,
    R: BufRead,
{
    let mut conn = pool.acquire().await?;
    let result = load_module(&mut *conn, module, reader, source).await;
    if matches!(&result, Err(e) if e.is_unavailable()) {
        conn.discard();
    }
    result
}

// =============================================================================
// Tests
// =============================================================================
