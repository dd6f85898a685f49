//! Walks a concrete syntax tree and emits [`ParsedSymbol`]s: imports,
//! callees, base classes, and the `calls_super` flag.
//!
//! Extraction covers imports, direct calls, attribute-call chains, and
//! bare capitalized references, walking attribute chains structurally
//! rather than splitting on `.` (see DESIGN.md's open-question decisions).

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tree_sitter::{Node, Tree};

use crate::models::{ParsedSymbol, Span, SymbolKind};

/// Node kinds in which a bare attribute access (not itself a call)
/// contributes a callee, including its final segment.
const BARE_ATTRIBUTE_CONTEXTS: &[&str] = &[
    "argument_list",
    "assignment",
    "return_statement",
    "yield",
    "comparison_operator",
    "boolean_operator",
    "binary_operator",
    "conditional_expression",
    "list",
    "tuple",
    "dictionary",
    "set",
    "subscript",
];

/// Node kinds in which a bare capitalized identifier contributes a
/// callee.
const BARE_IDENTIFIER_CONTEXTS: &[&str] = &["argument_list", "assignment", "expression_statement"];

fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or_default()
}

fn node_span(node: Node) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start_line: start.row + 1,
        end_line: end.row + 1,
        start_col: start.column,
        end_col: end.column,
    }
}

/// Extracts the file-wide import map. Imports may appear anywhere in
/// the tree (e.g. inside functions), so the whole tree is walked rather
/// than only its top level.
pub fn extract_imports(tree: &Tree, source: &[u8]) -> HashMap<String, String> {
    let mut imports = HashMap::new();
    walk_imports(tree.root_node(), source, &mut imports);
    imports
}

fn walk_imports(node: Node, source: &[u8], imports: &mut HashMap<String, String>) {
    match node.kind() {
        "import_statement" => process_import_direct(node, source, imports),
        "import_from_statement" => process_import_from(node, source, imports),
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_imports(child, source, imports);
    }
}

fn process_import_direct(node: Node, source: &[u8], imports: &mut HashMap<String, String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let name = node_text(child, source).to_string();
                imports.insert(name.clone(), name);
            }
            "aliased_import" => {
                if let (Some(name_node), Some(alias_node)) = (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("alias"),
                ) {
                    let dotted = node_text(name_node, source).to_string();
                    let alias = node_text(alias_node, source).to_string();
                    imports.insert(alias, dotted);
                }
            }
            _ => {}
        }
    }
}

fn process_import_from(node: Node, source: &[u8], imports: &mut HashMap<String, String>) {
    let module = node
        .child_by_field_name("module_name")
        .map(|n| node_text(n, source).to_string());

    let qualify = |name: &str| match &module {
        Some(m) => format!("{m}.{name}"),
        None => name.to_string(),
    };

    let mut cursor = node.walk();
    for child in node.children_by_field_name("name", &mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let name = node_text(child, source).to_string();
                let key = name.rsplit('.').next().unwrap_or(&name).to_string();
                imports.insert(key, qualify(&name));
            }
            "aliased_import" => {
                if let (Some(name_node), Some(alias_node)) = (
                    child.child_by_field_name("name"),
                    child.child_by_field_name("alias"),
                ) {
                    let orig = node_text(name_node, source).to_string();
                    let alias = node_text(alias_node, source).to_string();
                    imports.insert(alias, qualify(&orig));
                }
            }
            "identifier" => {
                let name = node_text(child, source).to_string();
                imports.insert(name.clone(), qualify(&name));
            }
            _ => {}
        }
    }
}

/// Decomposes an `attribute` node into `(root_identifier, segments)`,
/// walking right-to-left. Returns `None` if the chain does not bottom
/// out on a plain identifier (e.g. the receiver is itself a call).
fn decompose_attribute(node: Node, source: &[u8]) -> Option<(String, Vec<String>)> {
    let mut segments = Vec::new();
    let mut current = node;
    loop {
        match current.kind() {
            "attribute" => {
                let attr = current.child_by_field_name("attribute")?;
                segments.push(node_text(attr, source).to_string());
                current = current.child_by_field_name("object")?;
            }
            "identifier" => {
                let root = node_text(current, source).to_string();
                segments.reverse();
                return Some((root, segments));
            }
            _ => return None,
        }
    }
}

#[derive(Default)]
struct CalleeCollector {
    seen: HashSet<String>,
    ordered: Vec<String>,
    calls_super: bool,
}

impl CalleeCollector {
    fn add(&mut self, name: String) {
        if name == "super" {
            self.calls_super = true;
            return;
        }
        if self.seen.insert(name.clone()) {
            self.ordered.push(name);
        }
    }
}

fn is_self_or_cls(root: &str) -> bool {
    root == "self" || root == "cls"
}

fn collect_callees(node: Node, source: &[u8], collector: &mut CalleeCollector) {
    match node.kind() {
        "call" => {
            if let Some(func) = node.child_by_field_name("function") {
                match func.kind() {
                    "identifier" => {
                        collector.add(node_text(func, source).to_string());
                    }
                    "attribute" => {
                        if let Some((root, segments)) = decompose_attribute(func, source) {
                            if !is_self_or_cls(&root) {
                                let chain = chain_without_last(&root, &segments);
                                collector.add(chain);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "attribute" => {
            let parent = node.parent();
            let parent_is_attribute =
                parent.map(|p| p.kind() == "attribute").unwrap_or(false);
            let is_call_function = parent
                .and_then(|p| {
                    (p.kind() == "call")
                        .then(|| p.child_by_field_name("function"))
                        .flatten()
                })
                .map(|f| f.id() == node.id())
                .unwrap_or(false);

            if !parent_is_attribute && !is_call_function {
                if let Some(parent_kind) = parent.map(|p| p.kind()) {
                    if BARE_ATTRIBUTE_CONTEXTS.contains(&parent_kind) {
                        if let Some((root, segments)) = decompose_attribute(node, source) {
                            if !is_self_or_cls(&root) {
                                collector.add(full_chain(&root, &segments));
                            }
                        }
                    }
                }
            }
        }
        "identifier" => {
            if let Some(parent) = node.parent() {
                if BARE_IDENTIFIER_CONTEXTS.contains(&parent.kind()) {
                    let name = node_text(node, source);
                    if name.chars().next().map(char::is_uppercase).unwrap_or(false) {
                        collector.add(name.to_string());
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_callees(child, source, collector);
    }
}

fn full_chain(root: &str, segments: &[String]) -> String {
    if segments.is_empty() {
        return root.to_string();
    }
    let mut parts = Vec::with_capacity(segments.len() + 1);
    parts.push(root.to_string());
    parts.extend(segments.iter().cloned());
    parts.join(".")
}

fn chain_without_last(root: &str, segments: &[String]) -> String {
    if segments.len() <= 1 {
        return root.to_string();
    }
    let mut parts = Vec::with_capacity(segments.len());
    parts.push(root.to_string());
    parts.extend(segments[..segments.len() - 1].iter().cloned());
    parts.join(".")
}

/// Extracts base classes from a class definition's argument list.
fn extract_base_classes(node: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let Some(args) = node.child_by_field_name("superclasses") else {
        return out;
    };
    let mut cursor = args.walk();
    for child in args.named_children(&mut cursor) {
        match child.kind() {
            "identifier" | "attribute" => out.push(node_text(child, source).to_string()),
            "call" => {
                if let Some(func) = child.child_by_field_name("function") {
                    out.push(node_text(func, source).to_string());
                }
            }
            "subscript" => {
                if let Some(value) = child.child_by_field_name("value") {
                    out.push(node_text(value, source).to_string());
                }
            }
            _ => {}
        }
    }
    out
}

/// Walks the whole tree emitting one `ParsedSymbol` per class
/// definition.
pub fn find_classes(
    tree: &Tree,
    source: &[u8],
    file_path: &Path,
    imports: &HashMap<String, String>,
) -> Vec<ParsedSymbol> {
    let mut out = Vec::new();
    walk_classes(tree.root_node(), source, file_path, imports, &mut out);
    out
}

fn walk_classes(
    node: Node,
    source: &[u8],
    file_path: &Path,
    imports: &HashMap<String, String>,
    out: &mut Vec<ParsedSymbol>,
) {
    if node.kind() == "class_definition" {
        if let Some(name_node) = node.child_by_field_name("name") {
            let mut collector = CalleeCollector::default();
            collect_callees(node, source, &mut collector);
            out.push(ParsedSymbol {
                name: node_text(name_node, source).to_string(),
                kind: SymbolKind::Class,
                span: node_span(node),
                content: node_text(node, source).to_string(),
                file_path: file_path.to_path_buf(),
                host_class: None,
                callees: collector.ordered,
                imports: imports.clone(),
                base_classes: extract_base_classes(node, source),
                calls_super: collector.calls_super,
            });
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_classes(child, source, file_path, imports, out);
    }
}

/// Walks the whole tree emitting one `ParsedSymbol` per function or
/// method definition, threading `current_class` through the recursion
/// so nested functions inside a method still record the nearest
/// enclosing class as their `host_class`.
pub fn find_functions(
    tree: &Tree,
    source: &[u8],
    file_path: &Path,
    imports: &HashMap<String, String>,
) -> Vec<ParsedSymbol> {
    let mut out = Vec::new();
    walk_functions(tree.root_node(), source, file_path, imports, None, &mut out);
    out
}

fn walk_functions(
    node: Node,
    source: &[u8],
    file_path: &Path,
    imports: &HashMap<String, String>,
    current_class: Option<&str>,
    out: &mut Vec<ParsedSymbol>,
) {
    if node.kind() == "class_definition" {
        let class_name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string());
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            walk_functions(child, source, file_path, imports, class_name.as_deref(), out);
        }
        return;
    }

    if node.kind() == "function_definition" {
        if let Some(name_node) = node.child_by_field_name("name") {
            let mut collector = CalleeCollector::default();
            collect_callees(node, source, &mut collector);
            let kind = if current_class.is_some() {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            };
            out.push(ParsedSymbol {
                name: node_text(name_node, source).to_string(),
                kind,
                span: node_span(node),
                content: node_text(node, source).to_string(),
                file_path: file_path.to_path_buf(),
                host_class: current_class.map(|s| s.to_string()),
                callees: collector.ordered,
                imports: imports.clone(),
                base_classes: Vec::new(),
                calls_super: collector.calls_super,
            });
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            walk_functions(child, source, file_path, imports, current_class, out);
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_functions(child, source, file_path, imports, current_class, out);
    }
}

/// Extracts both classes and functions for one file, sharing a single
/// import map.
pub fn extract_file(
    tree: &Tree,
    source: &[u8],
    file_path: &Path,
) -> (Vec<ParsedSymbol>, Vec<ParsedSymbol>) {
    let imports = extract_imports(tree, source);
    let classes = find_classes(tree, source, file_path, &imports);
    let functions = find_functions(tree, source, file_path, &imports);
    (classes, functions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ConcreteParser;
    use std::path::PathBuf;

    fn parse(source: &str) -> (Tree, Vec<u8>) {
        let mut parser = ConcreteParser::new().unwrap();
        let bytes = source.as_bytes().to_vec();
        let tree = parser.parse(&bytes).unwrap();
        (tree, bytes)
    }

    #[test]
    fn multi_import_map_matches_expected_aliasing() {
        let source = "from utils import func_a, func_b, ClassA\n\
                       from other.module import helper as h, processor\n";
        let (tree, bytes) = parse(source);
        let imports = extract_imports(&tree, &bytes);

        assert_eq!(imports.get("func_a").map(String::as_str), Some("utils.func_a"));
        assert_eq!(imports.get("func_b").map(String::as_str), Some("utils.func_b"));
        assert_eq!(imports.get("ClassA").map(String::as_str), Some("utils.ClassA"));
        assert_eq!(
            imports.get("h").map(String::as_str),
            Some("other.module.helper")
        );
        assert_eq!(
            imports.get("processor").map(String::as_str),
            Some("other.module.processor")
        );
        assert_eq!(imports.len(), 5);
    }

    #[test]
    fn direct_import_unaliased_keys_on_full_dotted_name() {
        let source = "import a.b.c\n";
        let (tree, bytes) = parse(source);
        let imports = extract_imports(&tree, &bytes);
        assert_eq!(imports.get("a.b.c").map(String::as_str), Some("a.b.c"));
    }

    #[test]
    fn super_call_sets_flag_and_ddd_collapses_to_one_entry() {
        let source = "class Child(Parent):\n\
                       \x20   def __init__(self, value):\n\
                       \x20       super().__init__(ddd.config)\n\
                       \x20       self.value = value\n\
                       \x20       self.data = ddd.get_data()\n";
        let (tree, bytes) = parse(source);
        let path = PathBuf::from("child.py");
        let (classes, functions) = extract_file(&tree, &bytes, &path);

        assert_eq!(classes[0].base_classes, vec!["Parent".to_string()]);

        let init = functions
            .iter()
            .find(|f| f.name == "__init__")
            .expect("init method present");
        assert!(init.calls_super);
        assert!(!init.callees.contains(&"super".to_string()));
        assert!(!init.callees.contains(&"self".to_string()));
        assert!(init.callees.contains(&"ddd".to_string()));
    }

    #[test]
    fn generic_marker_base_class_uses_subscript_value() {
        let source = "class Foo(module.Bar, Generic[T]):\n    pass\n";
        let (tree, bytes) = parse(source);
        let path = PathBuf::from("foo.py");
        let classes = find_classes(&tree, &bytes, &path, &HashMap::new());
        assert_eq!(
            classes[0].base_classes,
            vec!["module.Bar".to_string(), "Generic".to_string()]
        );
    }

    #[test]
    fn nested_function_keeps_enclosing_class_as_host() {
        let source = "class C:\n\
                       \x20   def m(self):\n\
                       \x20       def inner():\n\
                       \x20           pass\n\
                       \x20       return inner\n";
        let (tree, bytes) = parse(source);
        let path = PathBuf::from("c.py");
        let functions = find_functions(&tree, &bytes, &path, &HashMap::new());

        let inner = functions.iter().find(|f| f.name == "inner").unwrap();
        assert_eq!(inner.host_class.as_deref(), Some("C"));
        assert_eq!(inner.kind, SymbolKind::Method);
    }

    #[test]
    fn capitalised_bare_identifier_in_assignment_is_recorded() {
        let source = "class MyClass:\n\
                       \x20   def __init__(self):\n\
                       \x20       self.helper = HelperClass()\n";
        let (tree, bytes) = parse(source);
        let path = PathBuf::from("m.py");
        let (classes, _) = extract_file(&tree, &bytes, &path);
        assert!(classes[0].callees.contains(&"HelperClass".to_string()));
    }

    #[test]
    fn builtin_skip_set_is_not_enforced_by_extractor() {
        // The extractor records raw callees; the builtin-skip set is
        // applied by the resolver, not here.
        let source = "def f():\n    return isinstance(x, int)\n";
        let (tree, bytes) = parse(source);
        let path = PathBuf::from("f.py");
        let functions = find_functions(&tree, &bytes, &path, &HashMap::new());
        assert!(functions[0].callees.contains(&"isinstance".to_string()));
    }
}
