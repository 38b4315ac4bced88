mod builder;

pub use builder::HeapConfigurationBuilder;

use crate::element::GraphElement;
use crate::symbols::{Nonterminal, SelectorLabel, Type, VariableName};
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Identifier of a node within one [`HeapConfiguration`].
///
/// Ids are dense indices into the owning configuration's node arena; they are
/// meaningless across configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "n{}", self.0)
    }
}

/// Identifier of a nonterminal hyperedge within one [`HeapConfiguration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    pub fn from_index(index: usize) -> Self {
        EdgeId(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for EdgeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct NodeRecord {
    pub(crate) ty: Type,
    /// Outgoing selectors, sorted by label. At most one target per label.
    pub(crate) selectors: Vec<(SelectorLabel, NodeId)>,
    /// Incoming selectors, sorted by (source, label).
    pub(crate) incoming: Vec<(NodeId, SelectorLabel)>,
    /// Hyperedges with at least one tentacle at this node, deduplicated,
    /// sorted.
    pub(crate) hyperedges: Vec<EdgeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct HyperedgeRecord {
    pub(crate) label: Nonterminal,
    /// Ordered attachment tuple; length always equals `label.rank()`.
    pub(crate) tentacles: Vec<NodeId>,
}

/// A heap configuration: a typed hypergraph modeling one program memory
/// state.
///
/// Nodes are memory cells, selector edges are fields (functional per
/// `(source, label)`), nonterminal hyperedges are abstracted substructures,
/// and the ordered external sequence is the configuration's interface when it
/// serves as a rule right-hand side. Values are built once through a
/// [`HeapConfigurationBuilder`] and are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeapConfiguration {
    pub(crate) nodes: Vec<NodeRecord>,
    pub(crate) edges: Vec<HyperedgeRecord>,
    pub(crate) externals: Vec<NodeId>,
    /// Variable edges, sorted by name. Peripheral to the core algorithms.
    pub(crate) variables: Vec<(VariableName, NodeId)>,
}

impl HeapConfiguration {
    pub fn builder() -> HeapConfigurationBuilder {
        HeapConfigurationBuilder::new()
    }

    /// Reopen this value as a builder. The original is unaffected; external
    /// order and all edges are preserved in the copy.
    pub fn to_builder(&self) -> HeapConfigurationBuilder {
        HeapConfigurationBuilder::from_configuration(self)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + Clone + use<> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + Clone + use<> {
        (0..self.edges.len() as u32).map(EdgeId)
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len()
    }

    pub fn node_type(&self, node: NodeId) -> Type {
        self.nodes[node.index()].ty
    }

    /// Outgoing selectors of `node`, sorted by label.
    pub fn selectors_of(&self, node: NodeId) -> &[(SelectorLabel, NodeId)] {
        &self.nodes[node.index()].selectors
    }

    /// The target of the selector `label` at `node`, if present.
    pub fn select_target(&self, node: NodeId, label: SelectorLabel) -> Option<NodeId> {
        let selectors = &self.nodes[node.index()].selectors;
        selectors
            .binary_search_by(|(l, _)| l.cmp(&label))
            .ok()
            .map(|i| selectors[i].1)
    }

    /// Incoming selectors of `node`, sorted by (source, label).
    pub fn incoming_selectors(&self, node: NodeId) -> &[(NodeId, SelectorLabel)] {
        &self.nodes[node.index()].incoming
    }

    /// Hyperedges attached at `node` (each edge once, regardless of how many
    /// tentacles touch the node), sorted.
    pub fn attached_hyperedges(&self, node: NodeId) -> &[EdgeId] {
        &self.nodes[node.index()].hyperedges
    }

    pub fn edge_label(&self, edge: EdgeId) -> Nonterminal {
        self.edges[edge.index()].label
    }

    /// Ordered attachment tuple of `edge`; its length equals the label's rank.
    pub fn attached_nodes(&self, edge: EdgeId) -> &[NodeId] {
        &self.edges[edge.index()].tentacles
    }

    /// The number of tentacles of `edge` attached at `node`.
    pub fn tentacle_multiplicity(&self, edge: EdgeId, node: NodeId) -> usize {
        self.attached_nodes(edge)
            .iter()
            .filter(|n| **n == node)
            .count()
    }

    pub fn external_count(&self) -> usize {
        self.externals.len()
    }

    /// The external sequence, in interface order.
    pub fn externals(&self) -> &[NodeId] {
        &self.externals
    }

    pub fn external_at(&self, position: usize) -> NodeId {
        self.externals[position]
    }

    pub fn is_external(&self, node: NodeId) -> bool {
        self.externals.contains(&node)
    }

    /// The interface position of `node`, if it is external.
    pub fn external_position(&self, node: NodeId) -> Option<usize> {
        self.externals.iter().position(|n| *n == node)
    }

    /// Variable edges, sorted by name.
    pub fn variables(&self) -> &[(VariableName, NodeId)] {
        &self.variables
    }

    pub fn variable_target(&self, name: VariableName) -> Option<NodeId> {
        self.variables
            .binary_search_by(|(n, _)| n.cmp(&name))
            .ok()
            .map(|i| self.variables[i].1)
    }

    /// Names of the variables attached at `node`.
    pub fn attached_variables(&self, node: NodeId) -> impl Iterator<Item = VariableName> + '_ {
        self.variables
            .iter()
            .filter(move |(_, n)| *n == node)
            .map(|(name, _)| *name)
    }

    /// Total number of edge incidences at `node`: outgoing selectors,
    /// incoming selectors, hyperedge tentacles, and variable edges.
    pub fn incident_element_count(&self, node: NodeId) -> usize {
        let record = &self.nodes[node.index()];
        let tentacles: usize = record
            .hyperedges
            .iter()
            .map(|e| self.tentacle_multiplicity(*e, node))
            .sum();
        record.selectors.len()
            + record.incoming.len()
            + tentacles
            + self.attached_variables(node).count()
    }

    /// All graph elements of this configuration in the canonical
    /// [`GraphElement`] order.
    pub fn elements(&self) -> Vec<GraphElement> {
        let mut out = Vec::with_capacity(self.nodes.len() + self.edges.len());
        for node in self.node_ids() {
            out.push(GraphElement::Node(node));
            for (label, _) in self.selectors_of(node) {
                out.push(GraphElement::Selector(node, *label));
            }
        }
        for edge in self.edge_ids() {
            out.push(GraphElement::Hyperedge(edge));
        }
        out.sort();
        out
    }

    /// The edge elements (selectors and hyperedges) in canonical order.
    pub fn edge_elements(&self) -> Vec<GraphElement> {
        self.elements()
            .into_iter()
            .filter(|e| !matches!(e, GraphElement::Node(_)))
            .collect()
    }

    /// The subconfiguration induced by a node and hyperedge selection.
    ///
    /// Selector edges are kept when both endpoints and the source are
    /// selected and the selector element appears in `selectors`. The
    /// `externals` sequence provides the interface of the extracted value.
    /// Variables are not carried over.
    pub fn induced_subconfiguration(
        &self,
        nodes: &[NodeId],
        selectors: &[(NodeId, SelectorLabel)],
        hyperedges: &[EdgeId],
        externals: &[NodeId],
    ) -> Result<HeapConfiguration, crate::error::HeapError> {
        let mut builder = HeapConfiguration::builder();
        let mut map = vec![None; self.nodes.len()];
        for node in nodes {
            map[node.index()] = Some(builder.add_node(self.node_type(*node)));
        }
        let image = |n: NodeId| map[n.index()].ok_or(crate::error::HeapError::UnknownNode);
        for (source, label) in selectors {
            let target = self
                .select_target(*source, *label)
                .ok_or(crate::error::HeapError::UnknownNode)?;
            builder.add_selector(image(*source)?, *label, image(target)?)?;
        }
        for edge in hyperedges {
            let tentacles = self
                .attached_nodes(*edge)
                .iter()
                .map(|n| image(*n))
                .collect::<Result<Vec<_>, _>>()?;
            builder.add_nonterminal_edge(self.edge_label(*edge), &tentacles)?;
        }
        for node in externals {
            builder.set_external(image(*node)?)?;
        }
        builder.build()
    }

    /// A cheap isomorphism-invariant fingerprint: the sorted multiset of node
    /// signatures plus the edge and external counts. Equal fingerprints are
    /// necessary (not sufficient) for isomorphism.
    pub fn signature(&self) -> Vec<(Type, usize, usize, usize, bool)> {
        let mut sig: Vec<_> = self
            .node_ids()
            .map(|n| {
                (
                    self.node_type(n),
                    self.selectors_of(n).len(),
                    self.incoming_selectors(n).len(),
                    self.attached_hyperedges(n).len(),
                    self.is_external(n),
                )
            })
            .collect();
        sig.sort();
        sig
    }
}

impl Display for HeapConfiguration {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "heap {{")?;
        for node in self.node_ids() {
            write!(f, "  {}: {}", node, self.node_type(node))?;
            if let Some(pos) = self.external_position(node) {
                write!(f, " (ext {pos})")?;
            }
            for (label, target) in self.selectors_of(node) {
                write!(f, " -{label}-> {target}")?;
            }
            writeln!(f)?;
        }
        for edge in self.edge_ids() {
            write!(f, "  {}: {}(", edge, self.edge_label(edge))?;
            for (i, n) in self.attached_nodes(edge).iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{n}")?;
            }
            writeln!(f, ")")?;
        }
        for (name, node) in self.variables() {
            writeln!(f, "  {name} |-> {node}")?;
        }
        write!(f, "}}")
    }
}
