//! Subgraph-embedding search: finding the occurrences of a rule right-hand
//! side inside a heap configuration.
//!
//! An embedding is an injective, label-preserving mapping of pattern nodes
//! and hyperedges into the target. Internal (non-external) pattern nodes must
//! map to target nodes whose every incident element lies inside the image;
//! otherwise folding the match into a nonterminal would silently drop
//! reachable structure. External pattern nodes are boundary-only and may map
//! to any compatible target node.

use serde::Serialize;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use tangle_heap::{EdgeId, HeapConfiguration, NodeId, Type, VariableName};
use tracing::trace;

/// How pattern node types are compared against target node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TypeCompatibility {
    /// Types must be identical.
    #[default]
    Exact,
    /// The wildcard type additionally matches every type.
    Relaxed,
}

impl TypeCompatibility {
    pub fn matches(&self, pattern: Type, target: Type) -> bool {
        match self {
            TypeCompatibility::Exact => pattern == target,
            TypeCompatibility::Relaxed => {
                pattern == target || pattern.is_wildcard() || target.is_wildcard()
            }
        }
    }
}

/// Tuning knobs for the embedding search.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingOptions {
    pub type_compatibility: TypeCompatibility,
    /// Target nodes within this selector distance of a variable-attached
    /// node are protected from internal matching, keeping materialization
    /// around program variables cheap.
    pub min_dereference_depth: usize,
    /// Targets at least this large drop the dereference-depth protection.
    pub aggressive_node_threshold: Option<usize>,
    /// Drop the protection for states flagged as return states.
    pub aggressive_for_return: bool,
    /// When false, the node carried by the `null` variable is always
    /// protected.
    pub abstract_null_node: bool,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        EmbeddingOptions {
            type_compatibility: TypeCompatibility::Exact,
            min_dereference_depth: 0,
            aggressive_node_threshold: None,
            aggressive_for_return: false,
            abstract_null_node: true,
        }
    }
}

/// A reported occurrence of a pattern inside a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embedding {
    /// Pattern node index -> target node.
    node_map: Vec<NodeId>,
    /// Pattern hyperedge index -> target hyperedge.
    edge_map: Vec<EdgeId>,
}

impl Embedding {
    pub fn from_parts(node_map: Vec<NodeId>, edge_map: Vec<EdgeId>) -> Self {
        Embedding { node_map, edge_map }
    }

    pub fn node_image(&self, pattern_node: NodeId) -> NodeId {
        self.node_map[pattern_node.index()]
    }

    pub fn edge_image(&self, pattern_edge: EdgeId) -> EdgeId {
        self.edge_map[pattern_edge.index()]
    }

    pub fn node_images(&self) -> &[NodeId] {
        &self.node_map
    }

    pub fn edge_images(&self) -> &[EdgeId] {
        &self.edge_map
    }

    /// Images of the pattern-internal nodes: exactly the target nodes a fold
    /// removes.
    pub fn internal_images(&self, pattern: &HeapConfiguration) -> Vec<NodeId> {
        pattern
            .node_ids()
            .filter(|n| !pattern.is_external(*n))
            .map(|n| self.node_image(n))
            .collect()
    }
}

/// All embeddings of `pattern` into `target` under the given options.
///
/// Zero results is an ordinary outcome: the pattern simply does not occur.
pub fn embeddings(
    pattern: &HeapConfiguration,
    target: &HeapConfiguration,
    options: &EmbeddingOptions,
) -> Vec<Embedding> {
    embeddings_in_state(pattern, target, options, false)
}

/// Like [`embeddings`], with the target flagged as a return state (which may
/// drop the dereference-depth protection, see
/// [`EmbeddingOptions::aggressive_for_return`]).
pub fn embeddings_in_state(
    pattern: &HeapConfiguration,
    target: &HeapConfiguration,
    options: &EmbeddingOptions,
    is_return_state: bool,
) -> Vec<Embedding> {
    if pattern.node_count() == 0 || pattern.node_count() > target.node_count() {
        return Vec::new();
    }
    let mut search = Search {
        pattern,
        target,
        options,
        protected: protected_nodes(target, options, is_return_state),
        node_map: vec![None; pattern.node_count()],
        used: vec![false; target.node_count()],
        results: Vec::new(),
    };
    search.assign_nodes();
    trace!(
        pattern_nodes = pattern.node_count(),
        matches = search.results.len(),
        "embedding search finished"
    );
    search.results
}

/// Target nodes exempt from internal matching under the current options.
fn protected_nodes(
    target: &HeapConfiguration,
    options: &EmbeddingOptions,
    is_return_state: bool,
) -> BTreeSet<NodeId> {
    let aggressive = options
        .aggressive_node_threshold
        .map(|threshold| target.node_count() >= threshold)
        .unwrap_or(false)
        || (is_return_state && options.aggressive_for_return);
    let mut protected = BTreeSet::new();
    if !aggressive && options.min_dereference_depth > 0 {
        let mut queue: VecDeque<(NodeId, usize)> = target
            .variables()
            .iter()
            .map(|(_, node)| (*node, 0usize))
            .collect();
        while let Some((node, depth)) = queue.pop_front() {
            if depth >= options.min_dereference_depth || !protected.insert(node) {
                continue;
            }
            for (_, next) in target.selectors_of(node) {
                queue.push_back((*next, depth + 1));
            }
        }
    }
    if !options.abstract_null_node
        && let Some(null) = target.variable_target(VariableName::null())
    {
        protected.insert(null);
    }
    protected
}

struct Search<'a> {
    pattern: &'a HeapConfiguration,
    target: &'a HeapConfiguration,
    options: &'a EmbeddingOptions,
    protected: BTreeSet<NodeId>,
    node_map: Vec<Option<NodeId>>,
    used: Vec<bool>,
    results: Vec<Embedding>,
}

impl Search<'_> {
    fn assign_nodes(&mut self) {
        let Some(next) = self.next_pattern_node() else {
            self.match_hyperedges(&mut Vec::new(), &mut vec![false; self.target.edge_count()]);
            return;
        };
        for candidate in self.candidates_for(next) {
            if !self.admissible(next, candidate) {
                continue;
            }
            self.node_map[next.index()] = Some(candidate);
            self.used[candidate.index()] = true;
            if self.consistent_with_assigned(next) {
                self.assign_nodes();
            }
            self.node_map[next.index()] = None;
            self.used[candidate.index()] = false;
        }
    }

    /// The next pattern node to assign: the lowest unassigned node adjacent
    /// (via a selector in either direction) to an assigned one, falling back
    /// to the lowest unassigned node for disconnected parts.
    fn next_pattern_node(&self) -> Option<NodeId> {
        let unassigned = || {
            self.pattern
                .node_ids()
                .filter(|n| self.node_map[n.index()].is_none())
        };
        unassigned()
            .find(|n| {
                self.pattern
                    .selectors_of(*n)
                    .iter()
                    .any(|(_, t)| self.node_map[t.index()].is_some())
                    || self
                        .pattern
                        .incoming_selectors(*n)
                        .iter()
                        .any(|(s, _)| self.node_map[s.index()].is_some())
            })
            .or_else(|| unassigned().next())
    }

    /// Candidate target nodes for `node`, narrowed through an assigned
    /// selector neighbor when one exists.
    fn candidates_for(&self, node: NodeId) -> Vec<NodeId> {
        for (source, label) in self.pattern.incoming_selectors(node) {
            if let Some(source_image) = self.node_map[source.index()] {
                return self
                    .target
                    .select_target(source_image, *label)
                    .into_iter()
                    .collect();
            }
        }
        for (label, target) in self.pattern.selectors_of(node) {
            if let Some(target_image) = self.node_map[target.index()] {
                return self
                    .target
                    .incoming_selectors(target_image)
                    .iter()
                    .filter(|(_, l)| l == label)
                    .map(|(s, _)| *s)
                    .collect();
            }
        }
        self.target.node_ids().collect()
    }

    fn admissible(&self, pattern_node: NodeId, candidate: NodeId) -> bool {
        if self.used[candidate.index()]
            || !self.options.type_compatibility.matches(
                self.pattern.node_type(pattern_node),
                self.target.node_type(candidate),
            )
        {
            return false;
        }
        if self.pattern.is_external(pattern_node) {
            return true;
        }
        // internal pattern nodes: the image must be fully covered by the
        // match, so its incident structure has to agree exactly
        !self.target.is_external(candidate)
            && !self.protected.contains(&candidate)
            && self.target.attached_variables(candidate).next().is_none()
            && self.target.selectors_of(candidate).len()
                == self.pattern.selectors_of(pattern_node).len()
            && self.target.incoming_selectors(candidate).len()
                == self.pattern.incoming_selectors(pattern_node).len()
            && tentacle_incidences(self.target, candidate)
                == tentacle_incidences(self.pattern, pattern_node)
    }

    fn consistent_with_assigned(&self, node: NodeId) -> bool {
        let image = self.node_map[node.index()].expect("node was just assigned");
        for (label, target) in self.pattern.selectors_of(node) {
            if let Some(target_image) = self.node_map[target.index()]
                && self.target.select_target(image, *label) != Some(target_image)
            {
                return false;
            }
        }
        for (source, label) in self.pattern.incoming_selectors(node) {
            if let Some(source_image) = self.node_map[source.index()]
                && self.target.select_target(source_image, *label) != Some(image)
            {
                return false;
            }
        }
        true
    }

    /// With all nodes assigned, map pattern hyperedges injectively onto
    /// equal-labeled target hyperedges with the corresponding attachment
    /// tuples; parallel edges make this a small backtracking of its own.
    fn match_hyperedges(&mut self, edge_map: &mut Vec<EdgeId>, used_edges: &mut Vec<bool>) {
        if edge_map.len() == self.pattern.edge_count() {
            let node_map: Vec<NodeId> = self
                .node_map
                .iter()
                .map(|m| m.expect("assignment is complete"))
                .collect();
            self.results
                .push(Embedding::from_parts(node_map, edge_map.clone()));
            return;
        }
        let pattern_edge = EdgeId::from_index(edge_map.len());
        let wanted_label = self.pattern.edge_label(pattern_edge);
        let wanted_tuple: Vec<NodeId> = self
            .pattern
            .attached_nodes(pattern_edge)
            .iter()
            .map(|n| self.node_map[n.index()].expect("assignment is complete"))
            .collect();
        for candidate in self.target.edge_ids() {
            if used_edges[candidate.index()]
                || self.target.edge_label(candidate) != wanted_label
                || self.target.attached_nodes(candidate) != wanted_tuple.as_slice()
            {
                continue;
            }
            edge_map.push(candidate);
            used_edges[candidate.index()] = true;
            self.match_hyperedges(edge_map, used_edges);
            edge_map.pop();
            used_edges[candidate.index()] = false;
        }
    }
}

fn tentacle_incidences(hc: &HeapConfiguration, node: NodeId) -> usize {
    hc.attached_hyperedges(node)
        .iter()
        .map(|e| hc.tentacle_multiplicity(*e, node))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn base_rule_occurs_once_per_cell() {
        let fix = fixtures::list_fixture();
        let pattern = fix.grammar.rule(0).rhs();
        let target = fixtures::concrete_chain(&fix, 3);
        let found = embeddings(pattern, &target, &EmbeddingOptions::default());
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn internal_nodes_reject_covered_structure_violations() {
        let fix = fixtures::list_fixture();
        // recursive rule: x -next-> u, L(u, y); u is internal
        let pattern = fix.grammar.rule(1).rhs();
        // target: chain with an L edge; the middle node also carries an extra
        // incoming selector, so the only candidate for u is over-covered
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(fix.ty, 4);
        builder.add_selector(nodes[0], fix.next, nodes[1]).unwrap();
        builder.add_selector(nodes[3], fix.next, nodes[1]).unwrap();
        builder
            .add_nonterminal_edge(fix.list, &[nodes[1], nodes[2]])
            .unwrap();
        builder.set_external(nodes[0]).unwrap();
        builder.set_external(nodes[2]).unwrap();
        builder.set_external(nodes[3]).unwrap();
        let target = builder.build().unwrap();
        assert!(embeddings(pattern, &target, &EmbeddingOptions::default()).is_empty());
    }

    #[test]
    fn external_images_tolerate_boundary_structure() {
        let fix = fixtures::list_fixture();
        let pattern = fix.grammar.rule(0).rhs();
        // one cell whose endpoints both carry extra structure
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(fix.ty, 3);
        builder.add_selector(nodes[0], fix.next, nodes[1]).unwrap();
        builder.add_selector(nodes[1], fix.next, nodes[2]).unwrap();
        builder.set_external(nodes[0]).unwrap();
        builder.set_external(nodes[1]).unwrap();
        builder.set_external(nodes[2]).unwrap();
        let target = builder.build().unwrap();
        let found = embeddings(pattern, &target, &EmbeddingOptions::default());
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn dereference_depth_protects_variable_neighborhood() {
        let mut fix = fixtures::list_fixture();
        let x = fix.table.variable("x");
        // target: x -> (n0) -next-> (n1) -next-> (n2), L(n2, n3);
        // the recursive rule matches with its internal node at n2
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(fix.ty, 4);
        builder.add_selector(nodes[0], fix.next, nodes[1]).unwrap();
        builder.add_selector(nodes[1], fix.next, nodes[2]).unwrap();
        builder
            .add_nonterminal_edge(fix.list, &[nodes[2], nodes[3]])
            .unwrap();
        builder.set_external(nodes[0]).unwrap();
        builder.set_external(nodes[3]).unwrap();
        builder.add_variable_edge(x, nodes[0]).unwrap();
        let target = builder.build().unwrap();
        let pattern = fix.grammar.rule(1).rhs();

        let mut options = EmbeddingOptions::default();
        assert_eq!(embeddings(pattern, &target, &options).len(), 1);
        // n2 sits at selector distance 2 from x, so depth 3 protects it
        options.min_dereference_depth = 3;
        assert!(embeddings(pattern, &target, &options).is_empty());

        // the aggressive threshold lifts the protection again
        options.aggressive_node_threshold = Some(target.node_count());
        assert_eq!(embeddings(pattern, &target, &options).len(), 1);
    }

    #[test]
    fn relaxed_types_admit_the_wildcard() {
        let mut fix = fixtures::list_fixture();
        let any = fix.table.ty("_");
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(any, 2);
        builder.add_selector(nodes[0], fix.next, nodes[1]).unwrap();
        builder.set_external(nodes[0]).unwrap();
        builder.set_external(nodes[1]).unwrap();
        let pattern = builder.build().unwrap();
        let target = fixtures::concrete_chain(&fix, 1);

        let mut options = EmbeddingOptions::default();
        assert!(embeddings(&pattern, &target, &options).is_empty());
        options.type_compatibility = TypeCompatibility::Relaxed;
        assert_eq!(embeddings(&pattern, &target, &options).len(), 1);
    }
}
