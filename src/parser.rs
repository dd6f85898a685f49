//! Thin tree-sitter wrapper producing a concrete syntax tree from source
//! bytes, specialized to a single fixed grammar.

use anyhow::{anyhow, Result};
use tree_sitter::{Parser, Tree};
use tree_sitter_python::LANGUAGE;

/// Wraps a tree-sitter `Parser` configured for the target grammar.
pub struct ConcreteParser {
    parser: Parser,
}

impl ConcreteParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language = LANGUAGE.into();
        parser
            .set_language(&language)
            .map_err(|e| anyhow!("failed to load grammar: {e}"))?;
        Ok(Self { parser })
    }

    /// Parses `source`, returning a tree even when it contains error
    /// nodes. Callers that care about well-formedness should inspect
    /// `tree.root_node().has_error()`; the extractor itself treats
    /// error subtrees as opaque rather than failing the file.
    pub fn parse(&mut self, source: &[u8]) -> Result<Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("parser produced no tree (cancelled or timed out)"))
    }
}

impl Default for ConcreteParser {
    fn default() -> Self {
        Self::new().expect("tree-sitter-python grammar failed to load")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_module() {
        let mut parser = ConcreteParser::new().unwrap();
        let tree = parser.parse(b"def f():\n    pass\n").unwrap();
        assert!(!tree.root_node().has_error());
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn tolerates_broken_source() {
        let mut parser = ConcreteParser::new().unwrap();
        let tree = parser.parse(b"def f(:\n    pass\n").unwrap();
        // tree-sitter still returns a tree; it just contains error nodes.
        let _ = tree.root_node();
    }
}
