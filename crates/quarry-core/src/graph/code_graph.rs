//! Repository-wide knowledge graph over extracted entities.
//!
//! Build runs in two phases. Phase one registers every entity so that name
//! resolution in phase two sees the whole repository; phase two turns the
//! per-file call sites, superclasses, and imports into edges. Names that
//! resolve nowhere become `<external>:` placeholder nodes, kept as edge
//! endpoints but never surfaced as entities.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::QuarryResult;
use crate::graph::extract::{self, FileExtraction};
use crate::guards;
use crate::index::store::write_staged;
use crate::models::{external_id, is_external, Entity, Relation, RelationKind};

pub const GRAPH_FILE: &str = "graph.json";

#[derive(Debug, Default)]
pub struct CodeGraph {
    /// Insertion-ordered so traversal and serialization are deterministic.
    entities: IndexMap<String, Entity>,
    relations: Vec<Relation>,
    edge_set: HashSet<Relation>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
    by_file: HashMap<String, Vec<String>>,
}

impl CodeGraph {
    /// Extract every file under `repo_root` named in `rel_paths` and link
    /// the results. Files that fail to parse are skipped with a warning.
    pub fn build(repo_root: &Path, rel_paths: &[String]) -> Self {
        let mut sorted: Vec<&String> = rel_paths.iter().collect();
        sorted.sort();
        let extractions: Vec<Option<FileExtraction>> = sorted
            .par_iter()
            .map(|rel| match extract::extract_path(&repo_root.join(rel), rel) {
                Ok(extraction) => Some(extraction),
                Err(e) => {
                    warn!(path = %rel, error = %e, "skipping file in graph build");
                    None
                }
            })
            .collect();
        let extractions: Vec<FileExtraction> = extractions.into_iter().flatten().collect();

        let mut graph = CodeGraph::default();
        for extraction in &extractions {
            graph.add_entity(extraction.module.clone());
            for def in &extraction.definitions {
                graph.add_entity(def.clone());
            }
        }
        for extraction in &extractions {
            graph.link_extraction(extraction);
        }
        info!(
            entities = graph.entities.len(),
            edges = graph.relations.len(),
            "code graph built"
        );
        graph
    }

    fn add_entity(&mut self, entity: Entity) {
        self.by_file
            .entry(entity.file.clone())
            .or_default()
            .push(entity.id.clone());
        self.entities.insert(entity.id.clone(), entity);
    }

    fn link_extraction(&mut self, extraction: &FileExtraction) {
        let module_id = extraction.path.clone();
        for def in &extraction.definitions {
            self.add_relation(Relation::new(&module_id, &def.id, RelationKind::Defines));
        }
        for (class_id, base) in &extraction.bases {
            let target = self.resolve(base, &extraction.path);
            self.add_relation(Relation::new(class_id, &target, RelationKind::Inherits));
        }
        for call in &extraction.calls {
            let source = enclosing_definition(extraction, call.line)
                .unwrap_or_else(|| module_id.clone());
            let target = self.resolve(&call.callee, &extraction.path);
            self.add_relation(Relation::new(&source, &target, RelationKind::Calls));
        }
        for module in &extraction.imports {
            self.add_relation(Relation::new(
                &module_id,
                &external_id(module),
                RelationKind::Imports,
            ));
        }
    }

    fn add_relation(&mut self, relation: Relation) {
        if self.edge_set.insert(relation.clone()) {
            let idx = self.relations.len();
            self.outgoing
                .entry(relation.source_id.clone())
                .or_default()
                .push(idx);
            self.incoming
                .entry(relation.target_id.clone())
                .or_default()
                .push(idx);
            self.relations.push(relation);
        }
    }

    /// Resolve a bare name seen in `file`: same-file definition first, then
    /// any entity in the repository with that name, else an external
    /// placeholder.
    fn resolve(&self, name: &str, file: &str) -> String {
        let local = format!("{file}:{name}");
        if self.entities.contains_key(&local) {
            return local;
        }
        if let Some(entity) = self.entities.values().find(|e| e.name == name) {
            return entity.id.clone();
        }
        external_id(name)
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities of `file` whose line span intersects `[start, end]`.
    pub fn entities_overlapping(&self, file: &str, start: i64, end: i64) -> Vec<&Entity> {
        let Some(ids) = self.by_file.get(file) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.entities.get(id))
            .filter(|e| e.line_start <= end && e.line_end >= start)
            .collect()
    }

    /// Breadth-first neighborhood of `id` over the undirected edge view,
    /// bounded by `hops`. External placeholders are traversed but never
    /// returned; the seed itself is excluded. Results come back in
    /// discovery order, nearest first.
    pub fn related_entities(&self, id: &str, hops: usize) -> Vec<&Entity> {
        let hops = guards::clamp_hops(hops);
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(id);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        queue.push_back((id, 0));
        let mut found = Vec::new();
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= hops {
                continue;
            }
            for neighbor in self.neighbors(current) {
                if visited.insert(neighbor) {
                    if !is_external(neighbor) {
                        if let Some(entity) = self.entities.get(neighbor) {
                            found.push(entity);
                        }
                    }
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
        found
    }

    fn neighbors(&self, id: &str) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(indices) = self.outgoing.get(id) {
            for &idx in indices {
                out.push(self.relations[idx].target_id.as_str());
            }
        }
        if let Some(indices) = self.incoming.get(id) {
            for &idx in indices {
                out.push(self.relations[idx].source_id.as_str());
            }
        }
        out
    }

    /// Entities whose call edges point at `id`.
    pub fn callers(&self, id: &str) -> Vec<&str> {
        self.incoming
            .get(id)
            .map(|indices| {
                indices
                    .iter()
                    .filter(|&&idx| self.relations[idx].kind == RelationKind::Calls)
                    .map(|&idx| self.relations[idx].source_id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Targets of call edges leaving `id`, external placeholders included.
    pub fn callees(&self, id: &str) -> Vec<&str> {
        self.outgoing
            .get(id)
            .map(|indices| {
                indices
                    .iter()
                    .filter(|&&idx| self.relations[idx].kind == RelationKind::Calls)
                    .map(|&idx| self.relations[idx].target_id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Compact textual card for an entity, used as synthesized fragment text
    /// during graph expansion.
    pub fn entity_context(&self, id: &str) -> Option<String> {
        let entity = self.entities.get(id)?;
        let mut lines = vec![
            format!("[{}] {}", entity.kind.as_str(), entity.name),
            format!(
                "File: {}:{}-{}",
                entity.file, entity.line_start, entity.line_end
            ),
        ];
        if let Some(signature) = &entity.signature {
            lines.push(format!("Signature: {signature}"));
        }
        if let Some(docstring) = &entity.docstring {
            let mut doc = docstring.clone();
            if doc.chars().count() > 200 {
                doc = doc.chars().take(200).collect();
            }
            lines.push(format!("Docstring: {doc}"));
        }
        let callers = short_names(&self.callers(id), 5);
        if !callers.is_empty() {
            lines.push(format!("Called by: {}", callers.join(", ")));
        }
        let callees = short_names(&self.callees(id), 5);
        if !callees.is_empty() {
            lines.push(format!("Calls: {}", callees.join(", ")));
        }
        Some(lines.join("\n"))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn save(&self, dir: &Path) -> QuarryResult<()> {
        std::fs::create_dir_all(dir)?;
        let doc = GraphDoc {
            entities: self.entities.clone(),
            edges: self.relations.clone(),
        };
        write_staged(&dir.join(GRAPH_FILE), serde_json::to_vec_pretty(&doc)?.as_slice())
    }

    /// Load a previously saved graph. A missing file yields an empty graph.
    pub fn load(dir: &Path) -> QuarryResult<Self> {
        let path = dir.join(GRAPH_FILE);
        if !path.exists() {
            return Ok(CodeGraph::default());
        }
        let doc: GraphDoc = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let mut graph = CodeGraph::default();
        for entity in doc.entities.into_values() {
            graph.add_entity(entity);
        }
        for relation in doc.edges {
            graph.add_relation(relation);
        }
        Ok(graph)
    }
}

fn short_names(ids: &[&str], limit: usize) -> Vec<String> {
    ids.iter()
        .take(limit)
        .map(|id| id.rsplit(':').next().unwrap_or(id).to_string())
        .collect()
}

/// On-disk shape: entity id to full record, plus the edge triples.
#[derive(Serialize, Deserialize)]
struct GraphDoc {
    entities: IndexMap<String, Entity>,
    edges: Vec<Relation>,
}

/// Innermost enclosing definition is never wanted here: call edges attach to
/// the outermost definition containing the line, falling back to the module.
fn enclosing_definition(extraction: &FileExtraction, line: i64) -> Option<String> {
    extraction
        .definitions
        .iter()
        .find(|def| def.line_start <= line && line <= def.line_end)
        .map(|def| def.id.clone())
}
