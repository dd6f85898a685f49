//! Project-scoped incremental indexer: discovers Python files, keeps
//! them fresh in the symbol store, and answers the read-side queries
//! every other component builds on.
//!
//! File discovery walks the project with `ignore::WalkBuilder`, with
//! gitignore-style filtering disabled in favor of an exact
//! directory-name prune list.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::{ParsedSymbol, SymbolKind};
use crate::parser::ConcreteParser;
use crate::store::{content_hash, project_digest_hex12, SymbolStore};

/// Directory names pruned during project discovery, matched exactly
/// against the final path component.
const PRUNED_DIR_NAMES: &[&str] = &[
    "__pycache__",
    ".git",
    ".venv",
    "venv",
    "node_modules",
    ".tox",
    "build",
    "dist",
    ".eggs",
];

const BATCH_SIZE: usize = 100;

pub struct ProjectIndexer {
    project_root: PathBuf,
    store: SymbolStore,
    parser: ConcreteParser,
}

impl ProjectIndexer {
    /// Opens (creating if necessary) the project's symbol store at
    /// `<cache_dir>/<basename>_<hash12>.db`.
    pub fn open(project_root: &Path, cache_dir: &Path) -> Result<Self> {
        let project_root = project_root
            .canonicalize()
            .with_context(|| format!("failed to resolve project root {}", project_root.display()))?;

        let basename = project_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        let digest = project_digest_hex12(&project_root);
        let db_path = cache_dir.join(format!("{basename}_{digest}.db"));

        let store = SymbolStore::open(&db_path)?;
        let parser = ConcreteParser::new()?;

        Ok(Self {
            project_root,
            store,
            parser,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Walks the project tree, pruning known noise directories,
    /// returning every discovered `.py` file.
    pub fn discover_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkBuilder::new(&self.project_root)
            .standard_filters(false)
            .filter_entry(|entry| {
                if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                    let name = entry.file_name().to_string_lossy();
                    return !PRUNED_DIR_NAMES.contains(&name.as_ref());
                }
                true
            })
            .build();

        for entry in walker {
            let entry = entry.context("failed while walking project tree")?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("py") {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }

    /// Builds or refreshes the index. Skips entirely when the project
    /// is already marked indexed and `force` is false.
    pub fn build_index(&mut self, force: bool) -> Result<()> {
        if !force && self.store.is_indexed()? {
            return Ok(());
        }

        let files = self.discover_files()?;
        let mut pending = Vec::new();

        for file in &files {
            let mtime = file_mtime(file)?;
            if !force && self.store.is_file_fresh(file, mtime)? {
                continue;
            }
            let symbols = self.ingest_file(file, mtime)?;
            pending.extend(symbols);
            if pending.len() >= BATCH_SIZE {
                self.store.put_symbols(&pending)?;
                pending.clear();
            }
        }

        if !pending.is_empty() {
            self.store.put_symbols(&pending)?;
        }

        self.store.set_indexed(true)?;

        let finished_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(
            project = %self.project_root.display(),
            at = %finished_at,
            "project index build finished"
        );

        Ok(())
    }

    /// Re-parses and re-stores a single file, replacing any symbols it
    /// previously contributed.
    fn ingest_file(&mut self, file: &Path, mtime: f64) -> Result<Vec<ParsedSymbol>> {
        let source = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;

        self.store.drop_file(file)?;

        let tree = self.parser.parse(source.as_bytes())?;
        let (classes, functions) = crate::extractor::extract_file(&tree, source.as_bytes(), file);

        self.store.put_file(file, mtime, &source)?;

        let mut symbols = classes;
        symbols.extend(functions);
        Ok(symbols)
    }

    /// Drops and, if the file still exists, re-ingests it immediately.
    /// Used when a caller knows a specific file changed out-of-band.
    pub fn invalidate(&mut self, file: &Path) -> Result<()> {
        if !file.exists() {
            self.store.drop_file(file)?;
            return Ok(());
        }
        let mtime = file_mtime(file)?;
        let symbols = self.ingest_file(file, mtime)?;
        self.store.put_symbols(&symbols)?;
        Ok(())
    }

    /// Returns symbols defined in `file`, re-ingesting first if the
    /// on-disk file is newer than what the store has cached.
    pub fn get_file_symbols(&mut self, file: &Path) -> Result<Vec<ParsedSymbol>> {
        let mtime = file_mtime(file)?;
        if !self.store.is_file_fresh(file, mtime)? {
            let symbols = self.ingest_file(file, mtime)?;
            self.store.put_symbols(&symbols)?;
        }
        self.store.find_by_file(file)
    }

    pub fn get_all_symbols(&mut self, kind: Option<SymbolKind>) -> Result<Vec<ParsedSymbol>> {
        self.build_index(false)?;
        self.store.all(kind)
    }

    pub fn find_symbol(
        &mut self,
        name: &str,
        kind: Option<SymbolKind>,
        file_hint: Option<&str>,
    ) -> Result<Vec<ParsedSymbol>> {
        self.build_index(false)?;
        self.store.find_by_name(name, kind, file_hint)
    }

    pub fn find_all_symbols(&mut self, name: &str) -> Result<Vec<ParsedSymbol>> {
        self.build_index(false)?;
        self.store.find_by_name(name, None, None)
    }

    pub fn store(&self) -> &SymbolStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SymbolStore {
        &mut self.store
    }
}

fn file_mtime(path: &Path) -> Result<f64> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    let modified = metadata
        .modified()
        .with_context(|| format!("filesystem lacks mtime support for {}", path.display()))?;
    let duration = modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Ok(duration.as_secs_f64())
}

/// Re-exported for callers that only need a content hash without
/// touching a store (e.g. the HTTP layer's cache-busting headers).
pub fn hash_source(source: &str) -> String {
    content_hash(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_file(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn discover_files_prunes_noise_directories() {
        let project = tempdir().unwrap();
        write_file(project.path(), "app.py", "def f():\n    pass\n");
        write_file(project.path(), "__pycache__/app.cpython.pyc.py", "garbage");
        write_file(project.path(), ".venv/lib/site.py", "garbage");
        write_file(project.path(), "pkg/mod.py", "class C:\n    pass\n");

        let cache = tempdir().unwrap();
        let indexer = ProjectIndexer::open(project.path(), cache.path()).unwrap();
        let files = indexer.discover_files().unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| !f.to_string_lossy().contains("__pycache__")));
        assert!(files.iter().all(|f| !f.to_string_lossy().contains(".venv")));
    }

    #[test]
    fn build_index_is_idempotent_without_force() {
        let project = tempdir().unwrap();
        write_file(project.path(), "app.py", "class Widget:\n    pass\n");

        let cache = tempdir().unwrap();
        let mut indexer = ProjectIndexer::open(project.path(), cache.path()).unwrap();
        indexer.build_index(false).unwrap();
        let first = indexer.get_all_symbols(None).unwrap();

        indexer.build_index(false).unwrap();
        let second = indexer.get_all_symbols(None).unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn find_symbol_locates_class_after_indexing() {
        let project = tempdir().unwrap();
        write_file(project.path(), "widget.py", "class Widget:\n    def run(self):\n        pass\n");

        let cache = tempdir().unwrap();
        let mut indexer = ProjectIndexer::open(project.path(), cache.path()).unwrap();
        let found = indexer.find_symbol("Widget", Some(SymbolKind::Class), None).unwrap();
        assert_eq!(found.len(), 1);

        let methods = indexer.find_symbol("run", Some(SymbolKind::Function), None).unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].host_class.as_deref(), Some("Widget"));
    }

    #[test]
    fn invalidate_reflects_source_edits() {
        let project = tempdir().unwrap();
        let file = write_file(project.path(), "widget.py", "class Widget:\n    pass\n");

        let cache = tempdir().unwrap();
        let mut indexer = ProjectIndexer::open(project.path(), cache.path()).unwrap();
        indexer.build_index(false).unwrap();

        fs::write(&file, "class Widget:\n    pass\n\nclass Other:\n    pass\n").unwrap();

        // invalidate() always re-ingests regardless of freshness, so it
        // picks up the edit even if the filesystem's mtime resolution is
        // too coarse to have changed.
        indexer.invalidate(&file).unwrap();
        let all = indexer.get_all_symbols(None).unwrap();
        assert_eq!(all.len(), 2);
    }
}
