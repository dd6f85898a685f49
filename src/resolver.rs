//! Turns raw callee names recorded by the extractor into concrete
//! dependency source, following three resolution strategies in order:
//! import-directed, project-global name lookup, and an external
//! semantic fallback.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::indexer::ProjectIndexer;
use crate::models::{
    ClassQueryResult, Dependency, FunctionQueryResult, ListSymbolsResult, ParsedSymbol, SymbolKind,
};
use crate::semantic::{NullSemanticResolver, SemanticResolver};

/// Names the resolver never tries to chase down a file for, because
/// they name a builtin, a builtin exception, or a reflection helper
/// rather than a project symbol.
pub const BUILTIN_SKIP_SET: &[&str] = &[
    "str",
    "int",
    "float",
    "bool",
    "list",
    "dict",
    "set",
    "tuple",
    "None",
    "True",
    "False",
    "print",
    "len",
    "range",
    "enumerate",
    "zip",
    "map",
    "filter",
    "super",
    "type",
    "isinstance",
    "hasattr",
    "getattr",
    "setattr",
    "Exception",
    "ValueError",
    "TypeError",
    "KeyError",
    "IndexError",
    "AttributeError",
    "RuntimeError",
];

pub struct DependencyResolver {
    indexer: ProjectIndexer,
    semantic: Box<dyn SemanticResolver>,
}

impl DependencyResolver {
    pub fn new(indexer: ProjectIndexer) -> Self {
        Self::with_semantic_resolver(indexer, Box::new(NullSemanticResolver))
    }

    pub fn with_semantic_resolver(indexer: ProjectIndexer, semantic: Box<dyn SemanticResolver>) -> Self {
        Self { indexer, semantic }
    }

    pub fn rebuild_index(&mut self, force: bool) -> Result<()> {
        self.indexer.build_index(force)
    }

    pub fn list_symbols(&mut self, file: Option<&Path>) -> Result<ListSymbolsResult> {
        self.indexer.build_index(false)?;
        let symbols = match file {
            Some(f) => self.indexer.get_file_symbols(f)?,
            None => self.indexer.get_all_symbols(None)?,
        };
        let mut result = ListSymbolsResult::default();
        for symbol in &symbols {
            match symbol.kind {
                SymbolKind::Class => result.classes.push(symbol.into()),
                SymbolKind::Function | SymbolKind::Method => result.functions.push(symbol.into()),
            }
        }
        Ok(result)
    }

    pub fn query_class(
        &mut self,
        name: &str,
        file_hint: Option<&str>,
    ) -> Result<Option<ClassQueryResult>> {
        let matches = self.indexer.find_symbol(name, Some(SymbolKind::Class), file_hint)?;
        let Some(symbol) = matches.into_iter().next() else {
            return Ok(None);
        };
        let deps = self.resolve_dependencies(&symbol)?;
        let (depends, depends_path) = self.promote_and_collect(deps)?;
        Ok(Some(ClassQueryResult {
            content: symbol.content,
            file_path: symbol.file_path,
            depends,
            depends_path,
        }))
    }

    pub fn query_function(
        &mut self,
        name: &str,
        file_hint: Option<&str>,
        host_class: Option<&str>,
    ) -> Result<Option<FunctionQueryResult>> {
        let mut matches = self
            .indexer
            .find_symbol(name, Some(SymbolKind::Function), file_hint)?;
        if let Some(host) = host_class {
            matches.retain(|s| s.host_class.as_deref() == Some(host));
        }
        let Some(symbol) = matches.into_iter().next() else {
            return Ok(None);
        };
        let deps = self.resolve_dependencies(&symbol)?;
        let (depends, depends_path) = self.promote_and_collect(deps)?;
        Ok(Some(FunctionQueryResult {
            content: symbol.content,
            host_class: symbol.host_class.clone(),
            file_path: symbol.file_path,
            depends,
            depends_path,
        }))
    }

    /// Resolves every callee recorded on `symbol`, in callee order,
    /// skipping builtins and any callee that no strategy can place.
    fn resolve_dependencies(&mut self, symbol: &ParsedSymbol) -> Result<Vec<Dependency>> {
        let mut out = Vec::new();
        for callee in &symbol.callees {
            let simple = callee.rsplit('.').next().unwrap_or(callee);
            if BUILTIN_SKIP_SET.contains(&simple) {
                continue;
            }
            if let Some(dep) = self.resolve_single(callee, symbol)? {
                out.push(dep);
            }
        }
        Ok(out)
    }

    fn resolve_single(&mut self, callee: &str, symbol: &ParsedSymbol) -> Result<Option<Dependency>> {
        if let Some(dep) = self.resolve_via_imports(callee, symbol)? {
            return Ok(Some(dep));
        }
        if let Some(dep) = self.resolve_via_global_lookup(callee, symbol)? {
            return Ok(Some(dep));
        }
        self.resolve_via_semantic(callee, symbol)
    }

    fn resolve_via_imports(&mut self, callee: &str, symbol: &ParsedSymbol) -> Result<Option<Dependency>> {
        let Some((qualified, suffix)) = best_import_match(&symbol.imports, callee) else {
            return Ok(None);
        };
        let project_root = self.indexer.project_root().to_path_buf();
        let current_file = symbol.file_path.clone();
        let full_dotted = match &suffix {
            Some(s) => format!("{qualified}.{s}"),
            None => qualified,
        };

        if let Some((file, sym_name)) = resolve_module_symbol(&project_root, &current_file, &full_dotted) {
            if let Some(found) = self.lookup_symbol_in_file(&file, &sym_name)? {
                return Ok(Some(to_dependency(found)));
            }
        }

        if let Some(file) = resolve_module_only(&project_root, &current_file, &full_dotted) {
            let simple = callee.rsplit('.').next().unwrap_or(callee);
            if let Some(found) = self.lookup_symbol_in_file(&file, simple)? {
                return Ok(Some(to_dependency(found)));
            }
        }

        Ok(None)
    }

    fn resolve_via_global_lookup(
        &mut self,
        callee: &str,
        _symbol: &ParsedSymbol,
    ) -> Result<Option<Dependency>> {
        let simple = callee.rsplit('.').next().unwrap_or(callee);
        let matches = self.indexer.find_symbol(simple, None, None)?;
        Ok(matches.into_iter().next().map(to_dependency))
    }

    fn resolve_via_semantic(&mut self, callee: &str, symbol: &ParsedSymbol) -> Result<Option<Dependency>> {
        let simple = callee.rsplit('.').next().unwrap_or(callee);
        let defs = self.semantic.locate(simple, &symbol.content, &symbol.file_path)?;
        for def in defs {
            if let Some(found) = self.lookup_symbol_in_file(&def.module_path, simple)? {
                return Ok(Some(to_dependency(found)));
            }
        }
        Ok(None)
    }

    fn lookup_symbol_in_file(&mut self, file: &Path, name: &str) -> Result<Option<ParsedSymbol>> {
        if !file.is_file() {
            return Ok(None);
        }
        let symbols = self.indexer.get_file_symbols(file)?;
        Ok(symbols.into_iter().find(|s| s.name == name))
    }

    /// Expands method dependencies to their enclosing class's full
    /// source, then splits into the `depends`/`depends_path` pair with
    /// their documented asymmetric dedup: `depends_path` keeps only
    /// the first occurrence of each path, `depends` keeps every entry
    /// (grounded in `resolver.py`'s `analyze_class`/`analyze_function`,
    /// which append to one list unconditionally and to the other only
    /// behind a `not in` check).
    fn promote_and_collect(&mut self, deps: Vec<Dependency>) -> Result<(Vec<String>, Vec<PathBuf>)> {
        let mut depends = Vec::with_capacity(deps.len());
        let mut depends_path = Vec::with_capacity(deps.len());
        let mut seen_paths = HashSet::new();

        for dep in deps {
            let content = if !dep.is_class {
                self.promoted_content(&dep)?
            } else {
                dep.content.clone()
            };
            depends.push(content);

            if let Some(path) = dep.file_path {
                if seen_paths.insert(path.clone()) {
                    depends_path.push(path);
                }
            }
        }

        Ok((depends, depends_path))
    }

    fn promoted_content(&mut self, dep: &Dependency) -> Result<String> {
        let (Some(host), Some(file)) = (&dep.host_class, &dep.file_path) else {
            return Ok(dep.content.clone());
        };
        let hint = file.to_string_lossy().into_owned();
        let host_class = self
            .indexer
            .find_symbol(host, Some(SymbolKind::Class), Some(&hint))?
            .into_iter()
            .next();
        Ok(host_class.map(|c| c.content).unwrap_or_else(|| dep.content.clone()))
    }
}

fn to_dependency(symbol: ParsedSymbol) -> Dependency {
    Dependency {
        name: symbol.name.clone(),
        qualified_name: symbol
            .host_class
            .as_ref()
            .map(|host| format!("{host}.{}", symbol.name)),
        file_path: Some(symbol.file_path),
        content: symbol.content,
        is_class: symbol.kind == SymbolKind::Class,
        host_class: symbol.host_class,
    }
}

/// Finds the import-map entry whose key is the longest dot-boundary
/// prefix of `callee`, trying an exact match first. Returns the
/// matched value and whatever suffix of `callee` was not covered.
fn best_import_match(imports: &HashMap<String, String>, callee: &str) -> Option<(String, Option<String>)> {
    if let Some(qualified) = imports.get(callee) {
        return Some((qualified.clone(), None));
    }
    let parts: Vec<&str> = callee.split('.').collect();
    for i in (1..parts.len()).rev() {
        let prefix = parts[..i].join(".");
        if let Some(qualified) = imports.get(&prefix) {
            let suffix = parts[i..].join(".");
            return Some((qualified.clone(), Some(suffix)));
        }
    }
    None
}

/// Splits a dotted module path into its filesystem base directory
/// (honoring leading dots as relative-import hops) and its remaining
/// segments.
fn parse_dotted(project_root: &Path, current_file: &Path, dotted: &str) -> (PathBuf, Vec<String>) {
    let mut level = 0usize;
    let mut rest = dotted;
    while let Some(stripped) = rest.strip_prefix('.') {
        level += 1;
        rest = stripped;
    }

    let base_dir = if level > 0 {
        let mut dir = current_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_root.to_path_buf());
        for _ in 1..level {
            dir = dir.parent().map(Path::to_path_buf).unwrap_or(dir);
        }
        dir
    } else {
        project_root.to_path_buf()
    };

    let segments = rest
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    (base_dir, segments)
}

fn module_to_file(base_dir: &Path, segments: &[String]) -> Option<PathBuf> {
    if segments.is_empty() {
        let init = base_dir.join("__init__.py");
        return init.is_file().then_some(init);
    }
    let rel: PathBuf = segments.iter().collect();
    let as_module = base_dir.join(&rel).with_extension("py");
    if as_module.is_file() {
        return Some(as_module);
    }
    let as_package = base_dir.join(&rel).join("__init__.py");
    as_package.is_file().then_some(as_package)
}

/// Treats everything but the last segment as the module path and the
/// last segment as a symbol name inside it (the `from mod import sym`
/// shape).
fn resolve_module_symbol(project_root: &Path, current_file: &Path, dotted: &str) -> Option<(PathBuf, String)> {
    let (base_dir, segments) = parse_dotted(project_root, current_file, dotted);
    let symbol_name = segments.last()?.clone();
    let module_segments = &segments[..segments.len() - 1];
    let file = module_to_file(&base_dir, module_segments)?;
    Some((file, symbol_name))
}

/// Treats the whole dotted path as a module path (the `import mod`
/// shape, where the call site still names a top-level symbol inside
/// that module by its own short name).
fn resolve_module_only(project_root: &Path, current_file: &Path, dotted: &str) -> Option<PathBuf> {
    let (base_dir, segments) = parse_dotted(project_root, current_file, dotted);
    module_to_file(&base_dir, &segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
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

    fn resolver_for(project: &Path) -> DependencyResolver {
        let cache = AppConfig::with_cache_dir(Some(project.join("cache"))).unwrap();
        let indexer = ProjectIndexer::open(project, &cache.cache_dir).unwrap();
        DependencyResolver::new(indexer)
    }

    #[test]
    fn builtin_callees_are_never_resolved() {
        let project = tempdir().unwrap();
        write_file(
            project.path(),
            "app.py",
            "def f(x):\n    return isinstance(x, int)\n",
        );
        let mut resolver = resolver_for(project.path());
        let result = resolver.query_function("f", None, None).unwrap().unwrap();
        assert!(result.depends.is_empty());
        assert!(result.depends_path.is_empty());
    }

    #[test]
    fn import_directed_resolution_finds_function_source() {
        let project = tempdir().unwrap();
        write_file(project.path(), "helpers.py", "def helper():\n    return 1\n");
        write_file(
            project.path(),
            "app.py",
            "from helpers import helper\n\n\ndef f():\n    return helper()\n",
        );

        let mut resolver = resolver_for(project.path());
        let result = resolver.query_function("f", None, None).unwrap().unwrap();

        assert_eq!(result.depends.len(), 1);
        assert!(result.depends[0].contains("return 1"));
        assert_eq!(result.depends_path.len(), 1);
        assert!(result.depends_path[0].ends_with("helpers.py"));
    }

    #[test]
    fn method_dependency_is_promoted_to_enclosing_class_source() {
        let project = tempdir().unwrap();
        write_file(
            project.path(),
            "widget.py",
            "class Widget:\n    def run(self):\n        return 1\n",
        );
        write_file(
            project.path(),
            "app.py",
            "from widget import Widget\n\n\nclass Caller:\n    def go(self):\n        w = Widget()\n        return w.run()\n",
        );

        let mut resolver = resolver_for(project.path());
        let result = resolver.query_function("go", None, None).unwrap().unwrap();

        // `run` resolves via global lookup (the import only names the class);
        // promotion should substitute the whole `Widget` class body.
        assert_eq!(result.depends.len(), 1);
        assert!(result.depends[0].contains("class Widget"));
    }

    #[test]
    fn depends_path_dedups_first_occurrence_but_depends_does_not() {
        let project = tempdir().unwrap();
        write_file(
            project.path(),
            "helpers.py",
            "def helper():\n    return 1\n\n\ndef other_helper():\n    return helper()\n",
        );
        write_file(
            project.path(),
            "app.py",
            "from helpers import helper, other_helper\n\n\ndef f():\n    helper()\n    return other_helper()\n",
        );

        let mut resolver = resolver_for(project.path());
        let result = resolver.query_function("f", None, None).unwrap().unwrap();

        assert_eq!(result.depends.len(), 2);
        assert_eq!(result.depends_path.len(), 1);
    }
}
