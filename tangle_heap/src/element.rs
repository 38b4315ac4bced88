use crate::heap::{EdgeId, NodeId};
use crate::symbols::SelectorLabel;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A uniform identifier for "a node", "a nonterminal hyperedge", or "a
/// `(source, label)` selector edge" of one heap configuration.
///
/// The total order over elements is the backbone of every deterministic,
/// duplicate-free enumeration in the morphism machinery: primarily the
/// underlying node/edge id, then selector-less elements (nodes before
/// hyperedges) before selectors, then lexicographically by selector label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GraphElement {
    Node(NodeId),
    Hyperedge(EdgeId),
    Selector(NodeId, SelectorLabel),
}

impl GraphElement {
    fn id(&self) -> u32 {
        match self {
            GraphElement::Node(n) => n.0,
            GraphElement::Hyperedge(e) => e.0,
            GraphElement::Selector(n, _) => n.0,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            GraphElement::Node(_) => 0,
            GraphElement::Hyperedge(_) => 1,
            GraphElement::Selector(_, _) => 2,
        }
    }

    fn selector(&self) -> Option<SelectorLabel> {
        match self {
            GraphElement::Selector(_, label) => Some(*label),
            _ => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, GraphElement::Node(_))
    }

    pub fn is_edge(&self) -> bool {
        !self.is_node()
    }
}

impl Ord for GraphElement {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id()
            .cmp(&other.id())
            .then_with(|| self.kind_rank().cmp(&other.kind_rank()))
            .then_with(|| self.selector().cmp(&other.selector()))
    }
}

impl PartialOrd for GraphElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for GraphElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            GraphElement::Node(n) => write!(f, "{n}"),
            GraphElement::Hyperedge(e) => write!(f, "{e}"),
            GraphElement::Selector(n, label) => write!(f, "{n}.{label}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(e: &GraphElement) -> u64 {
        let mut hasher = DefaultHasher::new();
        e.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn order_matches_the_comparison_table() {
        let mut table = SymbolTable::new();
        let a = table.selector("a");
        let b = table.selector("b");

        // (0, null) vs (0, null) -> equal
        assert_eq!(
            GraphElement::Node(NodeId(0)).cmp(&GraphElement::Node(NodeId(0))),
            Ordering::Equal
        );
        // (5, null) vs (16, null) -> negative
        assert_eq!(
            GraphElement::Node(NodeId(5)).cmp(&GraphElement::Node(NodeId(16))),
            Ordering::Less
        );
        // (0, "a") vs (0, "b") -> negative
        assert_eq!(
            GraphElement::Selector(NodeId(0), a).cmp(&GraphElement::Selector(NodeId(0), b)),
            Ordering::Less
        );
        // (0, null) vs (0, "a") -> negative
        assert_eq!(
            GraphElement::Node(NodeId(0)).cmp(&GraphElement::Selector(NodeId(0), a)),
            Ordering::Less
        );
        // selector-less elements order nodes before hyperedges at equal id
        assert_eq!(
            GraphElement::Node(NodeId(3)).cmp(&GraphElement::Hyperedge(EdgeId(3))),
            Ordering::Less
        );
    }

    #[test]
    fn order_is_antisymmetric_and_consistent_with_eq() {
        let mut table = SymbolTable::new();
        let a = table.selector("a");
        let elements = [
            GraphElement::Node(NodeId(0)),
            GraphElement::Node(NodeId(1)),
            GraphElement::Hyperedge(EdgeId(0)),
            GraphElement::Selector(NodeId(0), a),
            GraphElement::Selector(NodeId(1), a),
        ];
        for x in &elements {
            for y in &elements {
                assert_eq!(x.cmp(y), y.cmp(x).reverse());
                if x.cmp(y) == Ordering::Equal {
                    assert_eq!(x, y);
                    assert_eq!(hash_of(x), hash_of(y));
                }
            }
        }
    }
}
