//! Graph-aware retrieval: seed hits pull in fragments synthesized from the
//! neighborhoods of the code entities they touch.
//!
//! Without a graph this layer is an exact pass-through over its base
//! retriever. With one, each base hit that overlaps known entities seeds a
//! bounded traversal; every related entity becomes a synthetic fragment
//! scored at a fixed fraction of its seed. Base hits always win id
//! collisions.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::errors::QuarryResult;
use crate::graph::CodeGraph;
use crate::guards;
use crate::models::{EntityKind, Fragment, FragmentMetadata, ScoredFragment};
use crate::retrieve::fusion::Retriever;

pub struct GraphEnhancedRetriever<R: Retriever> {
    base: R,
    graph: Option<Arc<CodeGraph>>,
    max_hops: usize,
    max_expanded_per_seed: usize,
    discount: f64,
}

impl<R: Retriever> GraphEnhancedRetriever<R> {
    pub fn new(
        base: R,
        graph: Option<Arc<CodeGraph>>,
        max_hops: usize,
        max_expanded_per_seed: usize,
        discount: f64,
    ) -> Self {
        Self {
            base,
            graph,
            max_hops: guards::clamp_hops(max_hops),
            max_expanded_per_seed: max_expanded_per_seed.min(guards::MAX_EXPANDED_PER_SEED),
            discount,
        }
    }

    fn expand(&self, graph: &CodeGraph, hits: &[ScoredFragment]) -> Vec<ScoredFragment> {
        let mut seen_entities: IndexMap<String, ()> = IndexMap::new();
        let mut expanded = Vec::new();
        for hit in hits {
            let meta = &hit.fragment.metadata;
            let (Some(start), Some(end)) = (meta.start_line, meta.end_line) else {
                continue;
            };
            // Module entities span the whole file, so every code hit would
            // seed through them and drag in all definitions; only
            // definition-level entities seed the traversal.
            let seeds = graph.entities_overlapping(&meta.path, start, end);
            for seed in seeds
                .into_iter()
                .filter(|e| e.kind != EntityKind::Module)
            {
                let mut taken = 0usize;
                for related in graph.related_entities(&seed.id, self.max_hops) {
                    if taken >= self.max_expanded_per_seed {
                        break;
                    }
                    if seen_entities.contains_key(&related.id) {
                        continue;
                    }
                    let Some(context) = graph.entity_context(&related.id) else {
                        continue;
                    };
                    seen_entities.insert(related.id.clone(), ());
                    taken += 1;
                    expanded.push(ScoredFragment::new(
                        Fragment {
                            id: format!("graph:{}", related.id),
                            text: context,
                            metadata: FragmentMetadata {
                                source_type: "graph_expansion".to_string(),
                                path: related.file.clone(),
                                start_line: Some(related.line_start),
                                end_line: Some(related.line_end),
                                kind: Some(related.kind.as_str().to_string()),
                                name: Some(related.name.clone()),
                                origin_entity: Some(seed.id.clone()),
                                ..Default::default()
                            },
                        },
                        hit.score * self.discount,
                    ));
                }
            }
        }
        expanded
    }
}

impl<R: Retriever> Retriever for GraphEnhancedRetriever<R> {
    fn retrieve(
        &self,
        query: &str,
        k_lexical: usize,
        k_semantic: usize,
        k_final: usize,
    ) -> QuarryResult<Vec<ScoredFragment>> {
        let base_hits = self.base.retrieve(query, k_lexical, k_semantic, k_final)?;
        let Some(graph) = &self.graph else {
            return Ok(base_hits);
        };
        if graph.is_empty() || base_hits.is_empty() {
            return Ok(base_hits);
        }

        let expanded = self.expand(graph, &base_hits);
        debug!(base = base_hits.len(), expanded = expanded.len(), "graph expansion");

        // Base hits enter first and keep their scores on collision.
        let mut merged: IndexMap<String, ScoredFragment> = IndexMap::new();
        for hit in base_hits.into_iter().chain(expanded) {
            merged.entry(hit.id().to_string()).or_insert(hit);
        }
        let mut hits: Vec<ScoredFragment> = merged.into_values().collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(guards::clamp_limit(k_final, guards::MAX_RESULT_LIMIT));
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::fusion::testing::{scored, FixedRetriever};

    fn graph_from(files: &[(&str, &str)]) -> Arc<CodeGraph> {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            std::fs::write(dir.path().join(rel), content).unwrap();
        }
        let rels: Vec<String> = files.iter().map(|(rel, _)| rel.to_string()).collect();
        Arc::new(CodeGraph::build(dir.path(), &rels))
    }

    fn code_hit(path: &str, start: i64, end: i64, score: f64) -> ScoredFragment {
        let mut hit = scored(&format!("{path}:{start}"), "def body(): ...", score);
        hit.fragment.metadata.source_type = "code".to_string();
        hit.fragment.metadata.path = path.to_string();
        hit.fragment.metadata.start_line = Some(start);
        hit.fragment.metadata.end_line = Some(end);
        hit
    }

    #[test]
    fn test_pass_through_without_graph() {
        let hits = vec![scored("a", "alpha", 2.0), scored("b", "beta", 1.0)];
        let retriever =
            GraphEnhancedRetriever::new(FixedRetriever(hits.clone()), None, 2, 4, 0.8);
        assert_eq!(retriever.retrieve("alpha", 4, 4, 4).unwrap(), hits);
    }

    #[test]
    fn test_expansion_adds_discounted_neighbors() {
        let graph = graph_from(&[(
            "app.py",
            "def foo():\n    bar()\n\ndef bar():\n    pass\n",
        )]);
        // The hit covers foo only.
        let retriever = GraphEnhancedRetriever::new(
            FixedRetriever(vec![code_hit("app.py", 1, 2, 2.0)]),
            Some(graph),
            2,
            4,
            0.8,
        );
        let hits = retriever.retrieve("foo", 4, 4, 8).unwrap();
        let bar = hits
            .iter()
            .find(|h| h.id() == "graph:app.py:bar")
            .expect("bar should be pulled in through the call edge");
        assert_eq!(bar.score, 2.0 * 0.8);
        assert_eq!(bar.fragment.metadata.source_type, "graph_expansion");
        assert_eq!(
            bar.fragment.metadata.origin_entity.as_deref(),
            Some("app.py:foo")
        );
        assert!(bar.fragment.text.starts_with("[function] bar"));
    }

    #[test]
    fn test_base_hit_wins_id_collision() {
        let graph = graph_from(&[(
            "app.py",
            "def foo():\n    bar()\n\ndef bar():\n    pass\n",
        )]);
        let mut base = vec![code_hit("app.py", 1, 2, 2.0)];
        // A base hit carrying the same id a synthetic fragment would get.
        let mut collider = scored("graph:app.py:bar", "original text", 9.0);
        collider.fragment.metadata.start_line = None;
        collider.fragment.metadata.end_line = None;
        base.push(collider);
        let retriever =
            GraphEnhancedRetriever::new(FixedRetriever(base), Some(graph), 2, 4, 0.8);
        let hits = retriever.retrieve("foo", 4, 4, 8).unwrap();
        let kept = hits.iter().find(|h| h.id() == "graph:app.py:bar").unwrap();
        assert_eq!(kept.score, 9.0);
        assert_eq!(kept.fragment.text, "original text");
    }

    #[test]
    fn test_per_seed_expansion_cap() {
        let graph = graph_from(&[(
            "hub.py",
            "def hub():\n    a()\n    b()\n    c()\n    d()\n\ndef a():\n    pass\n\ndef b():\n    pass\n\ndef c():\n    pass\n\ndef d():\n    pass\n",
        )]);
        let retriever = GraphEnhancedRetriever::new(
            FixedRetriever(vec![code_hit("hub.py", 1, 5, 1.0)]),
            Some(graph),
            1,
            2,
            0.8,
        );
        let hits = retriever.retrieve("hub", 4, 4, 16).unwrap();
        let synthetic = hits
            .iter()
            .filter(|h| h.fragment.metadata.source_type == "graph_expansion")
            .count();
        assert_eq!(synthetic, 2);
    }

    #[test]
    fn test_results_sorted_and_truncated() {
        let graph = graph_from(&[(
            "app.py",
            "def foo():\n    bar()\n\ndef bar():\n    pass\n",
        )]);
        let retriever = GraphEnhancedRetriever::new(
            FixedRetriever(vec![code_hit("app.py", 1, 2, 2.0)]),
            Some(graph),
            2,
            4,
            0.8,
        );
        let hits = retriever.retrieve("foo", 4, 4, 1).unwrap();
        assert_eq!(hits.len(), 1);
        // Highest score first, so the base hit survives truncation.
        assert_eq!(hits[0].score, 2.0);
    }
}
