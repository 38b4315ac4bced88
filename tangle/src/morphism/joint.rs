use super::Overlapping;
use crate::embedding::Embedding;
use crate::error::TangleError;
use tangle_heap::{EdgeId, GraphElement, HeapConfiguration, NodeId};

/// The configuration obtained by gluing two rule right-hand sides along an
/// overlapping, together with the images of both sides.
///
/// A node of the joint configuration is external iff it is external in every
/// side containing it: context may only attach where it disables neither
/// fold, and the external order lists the left interface first.
#[derive(Debug, Clone)]
pub struct JointHeapConfiguration {
    heap: HeapConfiguration,
    left_nodes: Vec<NodeId>,
    right_nodes: Vec<NodeId>,
    left_edges: Vec<EdgeId>,
    right_edges: Vec<EdgeId>,
}

impl JointHeapConfiguration {
    /// Materialize the gluing of `left` and `right` along `overlapping`.
    pub fn glue(
        left: &HeapConfiguration,
        right: &HeapConfiguration,
        overlapping: &Overlapping,
    ) -> Result<Self, TangleError> {
        let mut builder = HeapConfiguration::builder();
        let left_nodes: Vec<NodeId> = left
            .node_ids()
            .map(|n| builder.add_node(left.node_type(n)))
            .collect();
        let mut right_nodes: Vec<NodeId> = Vec::with_capacity(right.node_count());
        for n in right.node_ids() {
            match overlapping.node_preimage(n) {
                Some(preimage) => right_nodes.push(left_nodes[preimage.index()]),
                None => right_nodes.push(builder.add_node(right.node_type(n))),
            }
        }

        // selectors: identified pairs coincide after node mapping, so exact
        // duplicates are dropped; a same-source-and-label clash with distinct
        // targets cannot be glued and never reaches this point
        let mut selectors: Vec<(NodeId, tangle_heap::SelectorLabel, NodeId)> = Vec::new();
        for n in left.node_ids() {
            for (label, target) in left.selectors_of(n) {
                selectors.push((
                    left_nodes[n.index()],
                    *label,
                    left_nodes[target.index()],
                ));
            }
        }
        for n in right.node_ids() {
            for (label, target) in right.selectors_of(n) {
                selectors.push((
                    right_nodes[n.index()],
                    *label,
                    right_nodes[target.index()],
                ));
            }
        }
        selectors.sort();
        selectors.dedup();
        for (source, label, target) in selectors {
            builder.add_selector(source, label, target)?;
        }

        let mut left_edges = Vec::with_capacity(left.edge_count());
        for edge in left.edge_ids() {
            let tentacles: Vec<NodeId> = left
                .attached_nodes(edge)
                .iter()
                .map(|n| left_nodes[n.index()])
                .collect();
            left_edges.push(builder.add_nonterminal_edge(left.edge_label(edge), &tentacles)?);
        }
        // identified hyperedges reuse the left copy
        let mut right_edges: Vec<Option<EdgeId>> = vec![None; right.edge_count()];
        for (l, r) in overlapping.pairs() {
            if let (GraphElement::Hyperedge(le), GraphElement::Hyperedge(re)) = (l, r) {
                right_edges[re.index()] = Some(left_edges[le.index()]);
            }
        }
        let right_edges: Vec<EdgeId> = right
            .edge_ids()
            .map(|edge| match right_edges[edge.index()] {
                Some(shared) => Ok(shared),
                None => {
                    let tentacles: Vec<NodeId> = right
                        .attached_nodes(edge)
                        .iter()
                        .map(|n| right_nodes[n.index()])
                        .collect();
                    builder.add_nonterminal_edge(right.edge_label(edge), &tentacles)
                }
            })
            .collect::<Result<_, _>>()?;

        for n in left.externals() {
            let shared_internal_on_right = overlapping
                .node_image(*n)
                .map(|partner| !right.is_external(partner))
                .unwrap_or(false);
            if !shared_internal_on_right {
                builder.set_external(left_nodes[n.index()])?;
            }
        }
        for n in right.externals() {
            match overlapping.node_preimage(*n) {
                // shared nodes were handled from the left side
                Some(_) => {}
                None => {
                    builder.set_external(right_nodes[n.index()])?;
                }
            }
        }

        Ok(JointHeapConfiguration {
            heap: builder.build()?,
            left_nodes,
            right_nodes,
            left_edges,
            right_edges,
        })
    }

    pub fn heap(&self) -> &HeapConfiguration {
        &self.heap
    }

    pub fn left_node_image(&self, node: NodeId) -> NodeId {
        self.left_nodes[node.index()]
    }

    pub fn right_node_image(&self, node: NodeId) -> NodeId {
        self.right_nodes[node.index()]
    }

    /// The left right-hand side's occurrence in the joint configuration.
    pub fn left_embedding(&self) -> Embedding {
        Embedding::from_parts(self.left_nodes.clone(), self.left_edges.clone())
    }

    pub fn right_embedding(&self) -> Embedding {
        Embedding::from_parts(self.right_nodes.clone(), self.right_edges.clone())
    }
}
