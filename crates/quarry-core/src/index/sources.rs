//! Fragment extraction from repository files.
//!
//! A [`FragmentSource`] turns one file into fragments; the indexer walks the
//! repository, dispatches each file to the first source that claims it, and
//! splits oversized fragments before handing the batch to the store.

use std::path::Path;
use std::sync::Arc;

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::QuarryConfig;
use crate::errors::{QuarryError, QuarryResult};
use crate::graph::extract::parse_python;
use crate::graph::CodeGraph;
use crate::hash::{sha256_file, sha256_text};
use crate::index::manifest::Manifest;
use crate::index::store::FragmentStore;
use crate::index::vector::Embedder;
use crate::models::{Fragment, FragmentMetadata};

/// One handler in the extraction chain. Dispatch is first-match-wins in the
/// order sources are registered.
pub trait FragmentSource: Send + Sync {
    fn can_handle(&self, path: &Path) -> bool;
    fn extract(&self, path: &Path, rel_path: &str) -> QuarryResult<Vec<Fragment>>;
}

/// Plain-text and markup files become a single whole-file fragment.
pub struct TextSource;

const TEXT_EXTENSIONS: &[&str] = &["md", "txt", "json", "yaml", "yml", "toml"];

impl FragmentSource for TextSource {
    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn extract(&self, path: &Path, rel_path: &str) -> QuarryResult<Vec<Fragment>> {
        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let end_line = text.lines().count().max(1) as i64;
        Ok(vec![Fragment {
            id: sha256_text(&format!("{rel_path}:{}", text.len())),
            metadata: FragmentMetadata {
                source_type: "text".to_string(),
                path: rel_path.to_string(),
                start_line: Some(1),
                end_line: Some(end_line),
                ..Default::default()
            },
            text,
        }])
    }
}

/// Python files split at top-level definitions, decorators included in the
/// span. A file with no definitions falls back to one whole-file fragment.
pub struct PythonSource;

impl FragmentSource for PythonSource {
    fn can_handle(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("py")
    }

    fn extract(&self, path: &Path, rel_path: &str) -> QuarryResult<Vec<Fragment>> {
        let source = std::fs::read_to_string(path)?;
        if source.trim().is_empty() {
            return Ok(Vec::new());
        }
        let tree = parse_python(&source)?;
        let lines: Vec<&str> = source.lines().collect();
        let mut fragments = Vec::new();
        let root = tree.root_node();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            // A decorated definition spans its decorators; name and kind
            // come from the wrapped node.
            let (span, def) = if child.kind() == "decorated_definition" {
                match child.child_by_field_name("definition") {
                    Some(inner) => (child, inner),
                    None => continue,
                }
            } else {
                (child, child)
            };
            let kind = match def.kind() {
                "function_definition" => "function",
                "class_definition" => "class",
                _ => continue,
            };
            let Some(name_node) = def.child_by_field_name("name") else {
                continue;
            };
            let name = name_node
                .utf8_text(source.as_bytes())
                .unwrap_or_default()
                .to_string();
            let start = span.start_position().row + 1;
            let end = (span.end_position().row + 1).min(lines.len());
            let text = lines[start - 1..end].join("\n");
            fragments.push(Fragment {
                id: sha256_text(&format!(
                    "{rel_path}:{name}:{start}:{end}:{}",
                    text.len()
                )),
                metadata: FragmentMetadata {
                    source_type: "code".to_string(),
                    path: rel_path.to_string(),
                    start_line: Some(start as i64),
                    end_line: Some(end as i64),
                    kind: Some(kind.to_string()),
                    name: Some(name),
                    ..Default::default()
                },
                text,
            });
        }
        if fragments.is_empty() {
            fragments.push(Fragment {
                id: sha256_text(&format!("{rel_path}:{}", source.len())),
                metadata: FragmentMetadata {
                    source_type: "code".to_string(),
                    path: rel_path.to_string(),
                    start_line: Some(1),
                    end_line: Some(lines.len().max(1) as i64),
                    ..Default::default()
                },
                text: source,
            });
        }
        Ok(fragments)
    }
}

/// Sources in dispatch order.
pub fn default_sources() -> Vec<Box<dyn FragmentSource>> {
    vec![Box::new(PythonSource), Box::new(TextSource)]
}

/// Split any fragment longer than `max_chars` into overlapping parts. Part
/// boundaries never land inside a multi-byte character.
pub fn split_fragments(fragments: Vec<Fragment>, max_chars: usize, overlap: usize) -> Vec<Fragment> {
    let overlap = overlap.min(max_chars.saturating_sub(1));
    let mut out = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        if fragment.text.len() <= max_chars {
            out.push(fragment);
            continue;
        }
        let text = &fragment.text;
        let mut start = 0usize;
        let mut part = 0usize;
        while start < text.len() {
            let mut end = (start + max_chars).min(text.len());
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            let slice = &text[start..end];
            let mut metadata = fragment.metadata.clone();
            metadata.part = Some(part as i64);
            out.push(Fragment {
                id: sha256_text(&format!("{}:part{part}:{start}:{end}", fragment.id)),
                metadata,
                text: slice.to_string(),
            });
            if end == text.len() {
                break;
            }
            let mut next = end.saturating_sub(overlap).max(start + 1);
            while !text.is_char_boundary(next) {
                next += 1;
            }
            start = next;
            part += 1;
        }
    }
    out
}

/// Walk the repository honoring gitignore rules plus the configured globs.
/// Returns sorted repository-relative paths with forward slashes.
pub fn scan_repo(config: &QuarryConfig, repo_root: &Path) -> QuarryResult<Vec<String>> {
    let mut overrides = OverrideBuilder::new(repo_root);
    for glob in &config.include_globs {
        overrides
            .add(glob)
            .map_err(|e| QuarryError::Index(e.to_string()))?;
    }
    for glob in &config.exclude_globs {
        overrides
            .add(&format!("!{glob}"))
            .map_err(|e| QuarryError::Index(e.to_string()))?;
    }
    let overrides = overrides
        .build()
        .map_err(|e| QuarryError::Index(e.to_string()))?;
    let mut rel_paths = Vec::new();
    for entry in WalkBuilder::new(repo_root).overrides(overrides).build() {
        let entry = entry.map_err(|e| QuarryError::Index(e.to_string()))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(repo_root) {
            rel_paths.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    rel_paths.sort();
    Ok(rel_paths)
}

/// Outcome summary of a full index build.
#[derive(Debug)]
pub struct IndexReport {
    pub files: usize,
    pub fragments: usize,
    pub entities: usize,
}

/// Build the whole index for `repo_root`: fragments, lexical and semantic
/// indexes, code graph, and the content manifest used to detect drift on the
/// next run.
pub fn build_index(
    config: &QuarryConfig,
    repo_root: &Path,
    sources: &[Box<dyn FragmentSource>],
    embedder: Option<Arc<dyn Embedder>>,
) -> QuarryResult<IndexReport> {
    let rel_paths = scan_repo(config, repo_root)?;

    let previous = Manifest::load(&config.cache_path())?;
    let mut manifest = Manifest::default();
    for rel in &rel_paths {
        manifest.insert(rel.clone(), sha256_file(&repo_root.join(rel))?);
    }
    let drift = previous.diff(&manifest);
    info!(
        files = rel_paths.len(),
        new = drift.new.len(),
        modified = drift.modified.len(),
        deleted = drift.deleted.len(),
        "scanned repository"
    );

    let extracted: Vec<Vec<Fragment>> = rel_paths
        .par_iter()
        .map(|rel| {
            let path = repo_root.join(rel);
            let Some(source) = sources.iter().find(|s| s.can_handle(&path)) else {
                return Vec::new();
            };
            match source.extract(&path, rel) {
                Ok(fragments) => fragments,
                Err(e) => {
                    warn!(path = %rel, error = %e, "skipping file");
                    Vec::new()
                }
            }
        })
        .collect();
    let fragments = split_fragments(
        extracted.into_iter().flatten().collect(),
        config.max_chars,
        config.overlap_chars,
    );

    let store = FragmentStore::build(fragments, embedder)?;
    store.save(&config.index_path())?;

    let python: Vec<String> = rel_paths
        .iter()
        .filter(|rel| rel.ends_with(".py"))
        .cloned()
        .collect();
    let graph = CodeGraph::build(repo_root, &python);
    graph.save(&config.index_path())?;
    manifest.save(&config.cache_path())?;

    Ok(IndexReport {
        files: rel_paths.len(),
        fragments: store.len(),
        entities: graph.entity_count(),
    })
}
