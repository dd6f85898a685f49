//! Project-scoped symbol indexer and dependency resolver for Python
//! source: parses each file with tree-sitter, extracts classes,
//! functions, and methods, persists them in a per-project SQLite
//! cache, and resolves each symbol's callees to concrete dependency
//! source for downstream tooling (e.g. LLM context assembly).

pub mod cli;
pub mod config;
pub mod extractor;
pub mod indexer;
pub mod models;
pub mod parser;
pub mod resolver;
pub mod semantic;
pub mod server;
pub mod store;
