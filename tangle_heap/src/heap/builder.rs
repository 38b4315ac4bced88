use super::{HeapConfiguration, HyperedgeRecord, NodeId, NodeRecord};
use crate::error::HeapError;
use crate::symbols::{Nonterminal, SelectorLabel, Type, VariableName};
use std::collections::BTreeSet;
use tracing::debug;

/// Write-side of a [`HeapConfiguration`].
///
/// All mutation happens here; `build()` consumes the builder and produces the
/// immutable value. Structural violations (unknown node ids, wrong tentacle
/// counts, duplicate selectors) surface immediately at the offending call.
#[derive(Debug, Clone, Default)]
pub struct HeapConfigurationBuilder {
    types: Vec<Type>,
    selectors: Vec<(NodeId, SelectorLabel, NodeId)>,
    edges: Vec<(Nonterminal, Vec<NodeId>)>,
    externals: Vec<NodeId>,
    variables: Vec<(VariableName, NodeId)>,
}

impl HeapConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_configuration(hc: &HeapConfiguration) -> Self {
        let mut builder = Self::new();
        for node in hc.node_ids() {
            builder.types.push(hc.node_type(node));
        }
        for node in hc.node_ids() {
            for (label, target) in hc.selectors_of(node) {
                builder.selectors.push((node, *label, *target));
            }
        }
        for edge in hc.edge_ids() {
            builder
                .edges
                .push((hc.edge_label(edge), hc.attached_nodes(edge).to_vec()));
        }
        builder.externals = hc.externals.clone();
        builder.variables = hc.variables.clone();
        builder
    }

    fn check_node(&self, node: NodeId) -> Result<(), HeapError> {
        if node.index() < self.types.len() {
            Ok(())
        } else {
            Err(HeapError::UnknownNode)
        }
    }

    pub fn node_count(&self) -> usize {
        self.types.len()
    }

    /// Add one node of the given type and return its id.
    pub fn add_node(&mut self, ty: Type) -> NodeId {
        let id = NodeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    /// Add `count` nodes of the given type, returning their ids in order.
    pub fn add_nodes(&mut self, ty: Type, count: usize) -> Vec<NodeId> {
        (0..count).map(|_| self.add_node(ty)).collect()
    }

    /// Add a selector edge. At most one selector per `(source, label)` pair.
    pub fn add_selector(
        &mut self,
        source: NodeId,
        label: SelectorLabel,
        target: NodeId,
    ) -> Result<&mut Self, HeapError> {
        self.check_node(source)?;
        self.check_node(target)?;
        if self
            .selectors
            .iter()
            .any(|(s, l, _)| *s == source && *l == label)
        {
            return Err(HeapError::DuplicateSelector(label));
        }
        self.selectors.push((source, label, target));
        Ok(self)
    }

    /// Add a nonterminal hyperedge; the attachment tuple length must equal
    /// the label's rank.
    pub fn add_nonterminal_edge(
        &mut self,
        label: Nonterminal,
        tentacles: &[NodeId],
    ) -> Result<super::EdgeId, HeapError> {
        if tentacles.len() != label.rank() {
            return Err(HeapError::TentacleCountMismatch {
                label,
                expected: label.rank(),
                actual: tentacles.len(),
            });
        }
        for node in tentacles {
            self.check_node(*node)?;
        }
        let id = super::EdgeId(self.edges.len() as u32);
        self.edges.push((label, tentacles.to_vec()));
        Ok(id)
    }

    /// Remove a previously added nonterminal hyperedge. Later edge ids shift
    /// down by one.
    pub fn remove_nonterminal_edge(&mut self, edge: super::EdgeId) -> Result<&mut Self, HeapError> {
        if edge.index() >= self.edges.len() {
            return Err(HeapError::UnknownEdge);
        }
        self.edges.remove(edge.index());
        Ok(self)
    }

    /// Attach a variable edge. Variable names are unique per configuration.
    pub fn add_variable_edge(
        &mut self,
        name: VariableName,
        node: NodeId,
    ) -> Result<&mut Self, HeapError> {
        self.check_node(node)?;
        if self.variables.iter().any(|(n, _)| *n == name) {
            return Err(HeapError::DuplicateVariable(name));
        }
        self.variables.push((name, node));
        Ok(self)
    }

    /// Append `node` to the external sequence, returning its interface
    /// position.
    pub fn set_external(&mut self, node: NodeId) -> Result<usize, HeapError> {
        self.check_node(node)?;
        if self.externals.contains(&node) {
            return Err(HeapError::AlreadyExternal);
        }
        self.externals.push(node);
        Ok(self.externals.len() - 1)
    }

    /// Identify external nodes block-wise.
    ///
    /// `partition` is a partition of the external *positions*: every position
    /// appears in exactly one block, blocks are non-empty. The nodes within a
    /// block are merged into the block's lowest-position node (all must share
    /// one type); the external sequence shrinks to one node per block,
    /// ordered by lowest original position. Merged-away nodes are removed and
    /// remaining ids are compacted.
    pub fn merge_externals(&mut self, partition: &[Vec<usize>]) -> Result<&mut Self, HeapError> {
        let external_count = self.externals.len();
        let mut seen = BTreeSet::new();
        for block in partition {
            if block.is_empty() {
                return Err(HeapError::EmptyPartitionBlock);
            }
            for position in block {
                if *position >= external_count {
                    return Err(HeapError::UnknownExternalPosition(*position));
                }
                if !seen.insert(*position) {
                    return Err(HeapError::InvalidExternalPartition);
                }
            }
        }
        if seen.len() != external_count {
            return Err(HeapError::InvalidExternalPartition);
        }

        // representative = node at the lowest position of each block
        let mut replacement: Vec<NodeId> = (0..self.types.len() as u32).map(NodeId).collect();
        let mut blocks: Vec<(usize, NodeId)> = Vec::with_capacity(partition.len());
        for block in partition {
            let min_position = *block.iter().min().unwrap_or(&0);
            let representative = self.externals[min_position];
            for position in block {
                let node = self.externals[*position];
                if self.types[node.index()] != self.types[representative.index()] {
                    return Err(HeapError::MergedExternalTypeMismatch);
                }
                replacement[node.index()] = representative;
            }
            blocks.push((min_position, representative));
        }
        blocks.sort();

        let removed: BTreeSet<NodeId> = self
            .externals
            .iter()
            .copied()
            .filter(|n| replacement[n.index()] != *n)
            .collect();
        debug!(
            blocks = partition.len(),
            removed = removed.len(),
            "merging external nodes"
        );

        // compact ids: removed nodes disappear, survivors shift down
        let mut remap: Vec<Option<NodeId>> = Vec::with_capacity(self.types.len());
        let mut next = 0u32;
        for id in 0..self.types.len() as u32 {
            if removed.contains(&NodeId(id)) {
                remap.push(None);
            } else {
                remap.push(Some(NodeId(next)));
                next += 1;
            }
        }
        let resolve = |node: NodeId| -> NodeId {
            let merged = replacement[node.index()];
            remap[merged.index()].expect("representative nodes survive merging")
        };

        self.types = self
            .types
            .iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(&NodeId(*i as u32)))
            .map(|(_, ty)| *ty)
            .collect();
        for (source, _, target) in self.selectors.iter_mut() {
            *source = resolve(*source);
            *target = resolve(*target);
        }
        for (_, tentacles) in self.edges.iter_mut() {
            for node in tentacles.iter_mut() {
                *node = resolve(*node);
            }
        }
        for (_, node) in self.variables.iter_mut() {
            *node = resolve(*node);
        }
        self.externals = blocks.into_iter().map(|(_, n)| resolve(n)).collect();

        // merging can collapse two equal-labeled selectors into one
        self.selectors.sort();
        self.selectors.dedup();
        if let Some(label) = duplicate_selector_label(&self.selectors) {
            return Err(HeapError::DuplicateSelector(label));
        }
        Ok(self)
    }

    /// Finish construction, producing the immutable configuration.
    pub fn build(self) -> Result<HeapConfiguration, HeapError> {
        if let Some(label) = duplicate_selector_label(&self.selectors) {
            return Err(HeapError::DuplicateSelector(label));
        }
        let mut nodes: Vec<NodeRecord> = self
            .types
            .iter()
            .map(|ty| NodeRecord {
                ty: *ty,
                selectors: Vec::new(),
                incoming: Vec::new(),
                hyperedges: Vec::new(),
            })
            .collect();
        for (source, label, target) in &self.selectors {
            nodes[source.index()].selectors.push((*label, *target));
            nodes[target.index()].incoming.push((*source, *label));
        }
        let edges: Vec<HyperedgeRecord> = self
            .edges
            .iter()
            .map(|(label, tentacles)| HyperedgeRecord {
                label: *label,
                tentacles: tentacles.clone(),
            })
            .collect();
        for (idx, record) in edges.iter().enumerate() {
            for node in &record.tentacles {
                let list = &mut nodes[node.index()].hyperedges;
                let id = super::EdgeId(idx as u32);
                if !list.contains(&id) {
                    list.push(id);
                }
            }
        }
        for record in nodes.iter_mut() {
            record.selectors.sort();
            record.incoming.sort();
            record.hyperedges.sort();
        }
        let mut variables = self.variables;
        variables.sort();
        Ok(HeapConfiguration {
            nodes,
            edges,
            externals: self.externals,
            variables,
        })
    }
}

fn duplicate_selector_label(
    selectors: &[(NodeId, SelectorLabel, NodeId)],
) -> Option<SelectorLabel> {
    let mut seen = BTreeSet::new();
    for (source, label, _) in selectors {
        if !seen.insert((*source, *label)) {
            return Some(*label);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;

    #[test]
    fn unknown_node_is_rejected() {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let next = table.selector("next");
        let mut builder = HeapConfiguration::builder();
        let node = builder.add_node(ty);
        let bogus = NodeId(17);
        assert!(matches!(
            builder.add_selector(node, next, bogus),
            Err(HeapError::UnknownNode)
        ));
        assert!(matches!(
            builder.set_external(bogus),
            Err(HeapError::UnknownNode)
        ));
    }

    #[test]
    fn tentacle_count_must_match_rank() {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let nt = table.nonterminal("L", 2).unwrap();
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(ty, 3);
        assert!(matches!(
            builder.add_nonterminal_edge(nt, &nodes),
            Err(HeapError::TentacleCountMismatch { expected: 2, actual: 3, .. })
        ));
        assert!(builder.add_nonterminal_edge(nt, &nodes[..2]).is_ok());
    }

    #[test]
    fn duplicate_selector_is_rejected() {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let next = table.selector("next");
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(ty, 2);
        builder.add_selector(nodes[0], next, nodes[1]).unwrap();
        assert!(matches!(
            builder.add_selector(nodes[0], next, nodes[0]),
            Err(HeapError::DuplicateSelector(_))
        ));
    }

    #[test]
    fn merge_externals_reduces_interface() {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let next = table.selector("next");
        let prev = table.selector("prev");
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(ty, 3);
        builder.add_selector(nodes[0], next, nodes[1]).unwrap();
        builder.add_selector(nodes[1], prev, nodes[2]).unwrap();
        for n in &nodes {
            builder.set_external(*n).unwrap();
        }
        // merge positions 0 and 2; position 1 stays separate
        builder.merge_externals(&[vec![0, 2], vec![1]]).unwrap();
        let hc = builder.build().unwrap();
        assert_eq!(hc.node_count(), 2);
        assert_eq!(hc.external_count(), 2);
        let merged = hc.external_at(0);
        let middle = hc.external_at(1);
        assert_eq!(hc.select_target(merged, next), Some(middle));
        assert_eq!(hc.select_target(middle, prev), Some(merged));
    }

    #[test]
    fn merge_externals_rejects_bad_partitions() {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(ty, 2);
        for n in &nodes {
            builder.set_external(*n).unwrap();
        }
        assert!(matches!(
            builder.clone().merge_externals(&[vec![0, 0], vec![1]]),
            Err(HeapError::InvalidExternalPartition)
        ));
        assert!(matches!(
            builder.clone().merge_externals(&[vec![0]]),
            Err(HeapError::InvalidExternalPartition)
        ));
        assert!(matches!(
            builder.clone().merge_externals(&[vec![0, 5], vec![1]]),
            Err(HeapError::UnknownExternalPosition(5))
        ));
        assert!(matches!(
            builder.merge_externals(&[vec![], vec![0], vec![1]]),
            Err(HeapError::EmptyPartitionBlock)
        ));
    }

    #[test]
    fn merge_externals_requires_equal_types() {
        let mut table = SymbolTable::new();
        let a = table.ty("A");
        let b = table.ty("B");
        let mut builder = HeapConfiguration::builder();
        let first = builder.add_node(a);
        let second = builder.add_node(b);
        builder.set_external(first).unwrap();
        builder.set_external(second).unwrap();
        assert!(matches!(
            builder.merge_externals(&[vec![0, 1]]),
            Err(HeapError::MergedExternalTypeMismatch)
        ));
    }
}
