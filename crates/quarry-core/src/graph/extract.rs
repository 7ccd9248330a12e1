//! Per-file entity and relation extraction from Python sources.
//!
//! A single tree-sitter pass over each file collects top-level and nested
//! definitions, superclass names, call sites, and imports. Resolution of
//! names against the whole repository happens later in
//! [`crate::graph::code_graph::CodeGraph::build`]; this module only reports
//! what the file itself says.

use std::path::Path;

use tree_sitter::Node;

use crate::errors::{QuarryError, QuarryResult};
use crate::models::{Entity, EntityKind};

/// A call expression observed inside a file, attributed to its source line.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Callee name as written: `foo()` yields `foo`, `obj.save()` yields `save`.
    pub callee: String,
    /// 1-based line of the call expression.
    pub line: i64,
}

/// Everything the graph builder needs to know about one Python file.
#[derive(Debug)]
pub struct FileExtraction {
    /// Repository-relative path, also the module entity id.
    pub path: String,
    pub module: Entity,
    /// Function and class entities in preorder, so an enclosing definition
    /// always precedes the definitions nested inside it.
    pub definitions: Vec<Entity>,
    /// `(class entity id, superclass name)` pairs awaiting resolution.
    pub bases: Vec<(String, String)>,
    pub calls: Vec<CallSite>,
    /// Imported module names, dotted form.
    pub imports: Vec<String>,
}

/// Parse `source` with the Python grammar, rejecting files the grammar
/// cannot make sense of.
pub fn parse_python(source: &str) -> QuarryResult<tree_sitter::Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| QuarryError::Parse(e.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| QuarryError::Parse("parser produced no tree".into()))?;
    if tree.root_node().has_error() {
        return Err(QuarryError::Parse("syntax error in source".into()));
    }
    Ok(tree)
}

/// Read and extract a file on disk. `rel_path` becomes the module id.
pub fn extract_path(path: &Path, rel_path: &str) -> QuarryResult<FileExtraction> {
    let source = std::fs::read_to_string(path)?;
    extract_source(rel_path, &source)
}

/// Extract entities and relations from in-memory source.
pub fn extract_source(rel_path: &str, source: &str) -> QuarryResult<FileExtraction> {
    let tree = parse_python(source)?;
    let line_count = source.lines().count().max(1) as i64;
    let stem = Path::new(rel_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| rel_path.to_string());
    let module = Entity {
        id: rel_path.to_string(),
        name: stem,
        kind: EntityKind::Module,
        file: rel_path.to_string(),
        line_start: 1,
        line_end: line_count,
        docstring: None,
        signature: None,
    };
    let mut walker = Walker {
        source: source.as_bytes(),
        rel_path,
        definitions: Vec::new(),
        bases: Vec::new(),
        calls: Vec::new(),
        imports: Vec::new(),
    };
    walker.visit(tree.root_node());
    Ok(FileExtraction {
        path: rel_path.to_string(),
        module,
        definitions: walker.definitions,
        bases: walker.bases,
        calls: walker.calls,
        imports: walker.imports,
    })
}

struct Walker<'a> {
    source: &'a [u8],
    rel_path: &'a str,
    definitions: Vec<Entity>,
    bases: Vec<(String, String)>,
    calls: Vec<CallSite>,
    imports: Vec<String>,
}

impl<'a> Walker<'a> {
    fn visit(&mut self, node: Node) {
        match node.kind() {
            "function_definition" => self.on_definition(node, EntityKind::Function),
            "class_definition" => self.on_definition(node, EntityKind::Class),
            "call" => self.on_call(node),
            "import_statement" => self.on_import(node),
            "import_from_statement" => self.on_import_from(node),
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    fn on_definition(&mut self, node: Node, kind: EntityKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        let signature = match kind {
            EntityKind::Function => node
                .child_by_field_name("parameters")
                .map(|params| format!("def {name}{}", self.text(params))),
            _ => None,
        };
        let entity = Entity {
            id: format!("{}:{name}", self.rel_path),
            name: name.clone(),
            kind,
            file: self.rel_path.to_string(),
            line_start: node.start_position().row as i64 + 1,
            line_end: node.end_position().row as i64 + 1,
            docstring: docstring_of(node, self.source),
            signature,
        };
        if kind == EntityKind::Class {
            if let Some(supers) = node.child_by_field_name("superclasses") {
                let mut cursor = supers.walk();
                for arg in supers.named_children(&mut cursor) {
                    if arg.kind() == "identifier" {
                        self.bases.push((entity.id.clone(), self.text(arg)));
                    }
                }
            }
        }
        self.definitions.push(entity);
    }

    fn on_call(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        // `obj.method()` attributes to the method name, `foo()` to `foo`.
        let callee = match function.kind() {
            "identifier" => self.text(function),
            "attribute" => function
                .child_by_field_name("attribute")
                .map(|a| self.text(a))
                .unwrap_or_default(),
            _ => String::new(),
        };
        if !callee.is_empty() {
            self.calls.push(CallSite {
                callee,
                line: node.start_position().row as i64 + 1,
            });
        }
    }

    fn on_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    let module = self.text(child);
                    self.imports.push(module);
                }
                "aliased_import" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        let module = self.text(name);
                        self.imports.push(module);
                    }
                }
                _ => {}
            }
        }
    }

    fn on_import_from(&mut self, node: Node) {
        if let Some(module) = node.child_by_field_name("module_name") {
            self.imports.push(self.text(module));
        }
    }
}

/// The docstring of a definition is the leading string expression of its
/// body, quotes stripped.
fn docstring_of(node: Node, source: &[u8]) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let inner = first.named_child(0)?;
    if inner.kind() != "string" {
        return None;
    }
    let raw = inner.utf8_text(source).ok()?;
    Some(strip_quotes(raw))
}

fn strip_quotes(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_start_matches(|c| matches!(c, 'r' | 'R' | 'b' | 'B' | 'f' | 'F' | 'u' | 'U'));
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if trimmed.starts_with(quote)
            && trimmed.ends_with(quote)
            && trimmed.len() >= 2 * quote.len()
        {
            return trimmed[quote.len()..trimmed.len() - quote.len()]
                .trim()
                .to_string();
        }
    }
    trimmed.to_string()
}
