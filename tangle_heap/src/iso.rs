//! Hypergraph isomorphism over [`HeapConfiguration`] values.
//!
//! Backtracking assignment with per-node signature pruning. Intended for the
//! rule-sized configurations handled by abstraction and confluence analysis,
//! not for whole program heaps.

use crate::heap::{HeapConfiguration, NodeId};
use crate::symbols::{SelectorLabel, Type, VariableName};
use std::collections::BTreeMap;
use tracing::trace;

/// Isomorphism with positionally matched externals: the witness must map the
/// i-th external of `a` to the i-th external of `b`.
pub fn isomorphic(a: &HeapConfiguration, b: &HeapConfiguration) -> bool {
    find_witness(a, b, true)
}

/// Isomorphism where externals must map to externals but interface positions
/// may permute.
pub fn isomorphic_modulo_externals(a: &HeapConfiguration, b: &HeapConfiguration) -> bool {
    find_witness(a, b, false)
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug)]
struct NodeSignature {
    ty: Type,
    out_labels: Vec<SelectorLabel>,
    in_labels: Vec<SelectorLabel>,
    tentacle_count: usize,
    external: Option<usize>,
    variables: Vec<VariableName>,
}

fn node_signature(hc: &HeapConfiguration, node: NodeId, positional: bool) -> NodeSignature {
    let mut in_labels: Vec<SelectorLabel> = hc
        .incoming_selectors(node)
        .iter()
        .map(|(_, l)| *l)
        .collect();
    in_labels.sort();
    let tentacle_count = hc
        .attached_hyperedges(node)
        .iter()
        .map(|e| hc.tentacle_multiplicity(*e, node))
        .sum();
    let mut variables: Vec<VariableName> = hc.attached_variables(node).collect();
    variables.sort();
    let external = if positional {
        hc.external_position(node)
    } else {
        hc.external_position(node).map(|_| 0)
    };
    NodeSignature {
        ty: hc.node_type(node),
        out_labels: hc.selectors_of(node).iter().map(|(l, _)| *l).collect(),
        in_labels,
        tentacle_count,
        external,
        variables,
    }
}

fn find_witness(a: &HeapConfiguration, b: &HeapConfiguration, positional: bool) -> bool {
    if a.node_count() != b.node_count()
        || a.edge_count() != b.edge_count()
        || a.external_count() != b.external_count()
        || a.variables().len() != b.variables().len()
        || a.signature() != b.signature()
    {
        return false;
    }

    let sig_a: Vec<NodeSignature> = a
        .node_ids()
        .map(|n| node_signature(a, n, positional))
        .collect();
    let sig_b: Vec<NodeSignature> = b
        .node_ids()
        .map(|n| node_signature(b, n, positional))
        .collect();
    {
        let mut sa: Vec<&NodeSignature> = sig_a.iter().collect();
        let mut sb: Vec<&NodeSignature> = sig_b.iter().collect();
        sa.sort();
        sb.sort();
        if sa != sb {
            trace!("node signature multisets differ, no witness search needed");
            return false;
        }
    }

    let mut map: Vec<Option<NodeId>> = vec![None; a.node_count()];
    let mut used = vec![false; b.node_count()];
    if positional {
        for (ea, eb) in a.externals().iter().zip(b.externals()) {
            if sig_a[ea.index()] != sig_b[eb.index()] {
                return false;
            }
            // a node occupies one interface position at most, so the seed
            // assignment is conflict-free
            map[ea.index()] = Some(*eb);
            used[eb.index()] = true;
        }
        if !locally_consistent_all(a, b, &map) {
            return false;
        }
    }

    assign(a, b, &sig_a, &sig_b, &mut map, &mut used)
}

fn assign(
    a: &HeapConfiguration,
    b: &HeapConfiguration,
    sig_a: &[NodeSignature],
    sig_b: &[NodeSignature],
    map: &mut Vec<Option<NodeId>>,
    used: &mut Vec<bool>,
) -> bool {
    let next = match map.iter().position(|m| m.is_none()) {
        Some(i) => NodeId(i as u32),
        None => return verify(a, b, map),
    };
    for candidate in b.node_ids() {
        if used[candidate.index()] || sig_a[next.index()] != sig_b[candidate.index()] {
            continue;
        }
        map[next.index()] = Some(candidate);
        used[candidate.index()] = true;
        if locally_consistent(a, b, map, next) && assign(a, b, sig_a, sig_b, map, used) {
            return true;
        }
        map[next.index()] = None;
        used[candidate.index()] = false;
    }
    false
}

/// Selector consistency of `node` against every already-assigned neighbor.
fn locally_consistent(
    a: &HeapConfiguration,
    b: &HeapConfiguration,
    map: &[Option<NodeId>],
    node: NodeId,
) -> bool {
    let image = match map[node.index()] {
        Some(m) => m,
        None => return true,
    };
    for (label, target) in a.selectors_of(node) {
        if let Some(target_image) = map[target.index()]
            && b.select_target(image, *label) != Some(target_image)
        {
            return false;
        }
    }
    for (source, label) in a.incoming_selectors(node) {
        if let Some(source_image) = map[source.index()]
            && b.select_target(source_image, *label) != Some(image)
        {
            return false;
        }
    }
    true
}

fn locally_consistent_all(
    a: &HeapConfiguration,
    b: &HeapConfiguration,
    map: &[Option<NodeId>],
) -> bool {
    a.node_ids().all(|n| locally_consistent(a, b, map, n))
}

/// Full structural verification of a complete node assignment.
fn verify(a: &HeapConfiguration, b: &HeapConfiguration, map: &[Option<NodeId>]) -> bool {
    let image = |n: NodeId| map[n.index()].expect("assignment is complete");
    for node in a.node_ids() {
        for (label, target) in a.selectors_of(node) {
            if b.select_target(image(node), *label) != Some(image(*target)) {
                return false;
            }
        }
    }
    // selector counts agree globally, so the above is a bijection; hyperedges
    // are compared as multisets of (label, mapped attachment tuple)
    let mut counts: BTreeMap<(crate::symbols::Nonterminal, Vec<NodeId>), isize> = BTreeMap::new();
    for edge in a.edge_ids() {
        let key = (
            a.edge_label(edge),
            a.attached_nodes(edge).iter().map(|n| image(*n)).collect(),
        );
        *counts.entry(key).or_insert(0) += 1;
    }
    for edge in b.edge_ids() {
        let key = (b.edge_label(edge), b.attached_nodes(edge).to_vec());
        *counts.entry(key).or_insert(0) -= 1;
    }
    if counts.values().any(|c| *c != 0) {
        return false;
    }
    for (name, node) in a.variables() {
        if b.variable_target(*name) != Some(image(*node)) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;

    fn chain(table: &mut SymbolTable, reorder: bool) -> HeapConfiguration {
        let ty = table.ty("T");
        let next = table.selector("next");
        let nt = table.nonterminal("L", 2).unwrap();
        let mut builder = HeapConfiguration::builder();
        let nodes = if reorder {
            let mut n = builder.add_nodes(ty, 3);
            n.reverse();
            n
        } else {
            builder.add_nodes(ty, 3)
        };
        builder.add_selector(nodes[0], next, nodes[1]).unwrap();
        builder.add_nonterminal_edge(nt, &[nodes[1], nodes[2]]).unwrap();
        builder.set_external(nodes[0]).unwrap();
        builder.set_external(nodes[2]).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn isomorphic_under_renaming() {
        let mut table = SymbolTable::new();
        let a = chain(&mut table, false);
        let b = chain(&mut table, true);
        assert!(isomorphic(&a, &b));
        assert!(isomorphic_modulo_externals(&a, &b));
    }

    #[test]
    fn external_positions_matter_for_strict_isomorphism() {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let next = table.selector("next");
        let make = |flip: bool| {
            let mut builder = HeapConfiguration::builder();
            let nodes = builder.add_nodes(ty, 2);
            builder.add_selector(nodes[0], next, nodes[1]).unwrap();
            let (first, second) = if flip {
                (nodes[1], nodes[0])
            } else {
                (nodes[0], nodes[1])
            };
            builder.set_external(first).unwrap();
            builder.set_external(second).unwrap();
            builder.build().unwrap()
        };
        let forward = make(false);
        let flipped = make(true);
        assert!(!isomorphic(&forward, &flipped));
        assert!(isomorphic_modulo_externals(&forward, &flipped));
    }

    #[test]
    fn structure_differences_are_detected() {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let next = table.selector("next");
        let prev = table.selector("prev");
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(ty, 2);
        builder.add_selector(nodes[0], next, nodes[1]).unwrap();
        let a = builder.build().unwrap();
        let mut builder = HeapConfiguration::builder();
        let nodes = builder.add_nodes(ty, 2);
        builder.add_selector(nodes[0], prev, nodes[1]).unwrap();
        let b = builder.build().unwrap();
        assert!(!isomorphic(&a, &b));
    }

    #[test]
    fn parallel_hyperedges_are_counted() {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let nt = table.nonterminal("L", 2).unwrap();
        let make = |edges: usize| {
            let mut builder = HeapConfiguration::builder();
            let nodes = builder.add_nodes(ty, 2);
            for _ in 0..edges {
                builder.add_nonterminal_edge(nt, &nodes).unwrap();
            }
            builder.build().unwrap()
        };
        assert!(isomorphic(&make(2), &make(2)));
        assert!(!isomorphic(&make(1), &make(2)));
    }

    #[test]
    fn variables_anchor_the_witness() {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let next = table.selector("next");
        let x = table.variable("x");
        let make = |at_source: bool| {
            let mut builder = HeapConfiguration::builder();
            let nodes = builder.add_nodes(ty, 2);
            builder.add_selector(nodes[0], next, nodes[1]).unwrap();
            let target = if at_source { nodes[0] } else { nodes[1] };
            builder.add_variable_edge(x, target).unwrap();
            builder.build().unwrap()
        };
        assert!(isomorphic(&make(true), &make(true)));
        assert!(!isomorphic(&make(true), &make(false)));
    }
}
