//! Fallback resolution hook for callees the structural passes cannot
//! place. Kept as a trait seam so a real semantic analyser can be
//! wired in without touching the resolver.

use std::path::{Path, PathBuf};

use anyhow::Result;

/// A definition site located by a semantic analyser, independent of
/// the project's own import graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticDefinition {
    pub name: String,
    pub module_path: PathBuf,
}

/// Last-resort lookup for a callee that import-directed and
/// project-global resolution both failed to place.
pub trait SemanticResolver: Send + Sync {
    fn locate(
        &self,
        symbol_name: &str,
        snippet: &str,
        file_path: &Path,
    ) -> Result<Vec<SemanticDefinition>>;
}

/// Default resolver used when no external analyser is configured:
/// always reports nothing, so callers fall through cleanly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSemanticResolver;

impl SemanticResolver for NullSemanticResolver {
    fn locate(
        &self,
        _symbol_name: &str,
        _snippet: &str,
        _file_path: &Path,
    ) -> Result<Vec<SemanticDefinition>> {
        Ok(Vec::new())
    }
}
