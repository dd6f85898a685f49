//! Core data model shared by the store, extractor, indexer, and resolver.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What a [`ParsedSymbol`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Function,
    Method,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "class" => Some(SymbolKind::Class),
            "function" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            _ => None,
        }
    }
}

/// Source span: 1-based line numbers, 0-based columns, matching
/// tree-sitter's own `Point` convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
    pub start_col: usize,
    pub end_col: usize,
}

/// The unit of indexing: one class, function, or method definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
    pub content: String,
    pub file_path: PathBuf,
    pub host_class: Option<String>,
    pub callees: Vec<String>,
    pub imports: HashMap<String, String>,
    pub base_classes: Vec<String>,
    pub calls_super: bool,
}

/// A file-cache row: the freshness oracle for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCacheRow {
    pub file_path: PathBuf,
    pub mtime: f64,
    pub content_hash: String,
    pub source: String,
}

/// A callee resolved to concrete source text and a file path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub qualified_name: Option<String>,
    pub file_path: Option<PathBuf>,
    pub content: String,
    pub is_class: bool,
    pub host_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum QueryResult {
    #[serde(rename = "class")]
    Class(ClassQueryResult),
    #[serde(rename = "func")]
    Function(FunctionQueryResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassQueryResult {
    pub content: String,
    pub file_path: PathBuf,
    pub depends: Vec<String>,
    pub depends_path: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionQueryResult {
    pub content: String,
    pub host_class: Option<String>,
    pub file_path: PathBuf,
    pub depends: Vec<String>,
    pub depends_path: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub name: String,
    pub file_path: PathBuf,
    pub start_line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub name: String,
    pub file_path: PathBuf,
    pub start_line: usize,
    pub host_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListSymbolsResult {
    pub classes: Vec<ClassSummary>,
    pub functions: Vec<FunctionSummary>,
}

impl From<&ParsedSymbol> for ClassSummary {
    fn from(symbol: &ParsedSymbol) -> Self {
        ClassSummary {
            name: symbol.name.clone(),
            file_path: symbol.file_path.clone(),
            start_line: symbol.span.start_line,
        }
    }
}

impl From<&ParsedSymbol> for FunctionSummary {
    fn from(symbol: &ParsedSymbol) -> Self {
        FunctionSummary {
            name: symbol.name.clone(),
            file_path: symbol.file_path.clone(),
            start_line: symbol.span.start_line,
            host_class: symbol.host_class.clone(),
        }
    }
}
