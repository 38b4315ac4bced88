//! Structural well-formedness checks for grammars, used to gate completion
//! successors.

use super::Grammar;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tangle_heap::{Nonterminal, SelectorLabel};
use tracing::debug;

/// A closed family of grammar validity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GrammarValidity {
    /// The grammar still describes a data structure: at every node of every
    /// right-hand side, the directly outgoing selectors and the selectors
    /// reachable through each attached nonterminal tentacle are disjoint
    /// (and no two tentacle incidences claim the same selector), and every
    /// nonterminal is productive.
    DataStructureGrammar,
    /// Every selector a nonterminal occurrence claims is realizable by one
    /// materialization step in every rule of the claiming nonterminal.
    LocalConcretizability,
}

impl GrammarValidity {
    pub fn is_satisfied(&self, grammar: &Grammar) -> bool {
        match self {
            GrammarValidity::DataStructureGrammar => is_data_structure_grammar(grammar),
            GrammarValidity::LocalConcretizability => is_locally_concretizable(grammar),
        }
    }
}

/// For every nonterminal and tentacle position, the set of selectors that may
/// emanate from the attached node in some derivation. Computed as a fixpoint
/// over the non-inactive original rules.
pub fn reachable_selectors(
    grammar: &Grammar,
) -> BTreeMap<(Nonterminal, usize), BTreeSet<SelectorLabel>> {
    let mut reachable: BTreeMap<(Nonterminal, usize), BTreeSet<SelectorLabel>> = BTreeMap::new();
    for nt in grammar.nonterminals() {
        for position in 0..nt.rank() {
            reachable.insert((nt, position), BTreeSet::new());
        }
    }
    loop {
        let mut changed = false;
        for (_, rule) in grammar.abstraction_rules() {
            if rule.identity().collapsed_idx.is_some() {
                continue; // variants contribute nothing beyond their original
            }
            let rhs = rule.collapsed().original_rhs();
            let nt = rule.nonterminal();
            for position in 0..nt.rank() {
                let node = rhs.external_at(position);
                let mut update: BTreeSet<SelectorLabel> =
                    rhs.selectors_of(node).iter().map(|(l, _)| *l).collect();
                for edge in rhs.attached_hyperedges(node) {
                    let label = rhs.edge_label(*edge);
                    for (tentacle, attached) in rhs.attached_nodes(*edge).iter().enumerate() {
                        if *attached == node
                            && let Some(inner) = reachable.get(&(label, tentacle))
                        {
                            update.extend(inner.iter().copied());
                        }
                    }
                }
                let entry = reachable.entry((nt, position)).or_default();
                let before = entry.len();
                entry.extend(update);
                changed |= entry.len() != before;
            }
        }
        if !changed {
            return reachable;
        }
    }
}

fn is_data_structure_grammar(grammar: &Grammar) -> bool {
    let reachable = reachable_selectors(grammar);
    for (_, rule) in grammar.abstraction_rules() {
        if rule.identity().collapsed_idx.is_some() {
            continue;
        }
        let rhs = rule.collapsed().original_rhs();
        for node in rhs.node_ids() {
            let direct: BTreeSet<SelectorLabel> =
                rhs.selectors_of(node).iter().map(|(l, _)| *l).collect();
            let mut claimed: BTreeSet<SelectorLabel> = BTreeSet::new();
            for edge in rhs.attached_hyperedges(node) {
                let label = rhs.edge_label(*edge);
                for (tentacle, attached) in rhs.attached_nodes(*edge).iter().enumerate() {
                    if *attached != node {
                        continue;
                    }
                    let Some(inner) = reachable.get(&(label, tentacle)) else {
                        continue;
                    };
                    for selector in inner {
                        if direct.contains(selector) || !claimed.insert(*selector) {
                            debug!(
                                rule = %rule.identity(),
                                selector = %selector,
                                "selector claimed twice at one node"
                            );
                            return false;
                        }
                    }
                }
            }
        }
    }
    unproductive_nonterminals(grammar).is_empty()
}

fn is_locally_concretizable(grammar: &Grammar) -> bool {
    let reachable = reachable_selectors(grammar);
    for ((nt, position), claimed) in &reachable {
        for rule in grammar.rules_for(*nt) {
            if !rule.is_abstraction_rule() || rule.identity().collapsed_idx.is_some() {
                continue;
            }
            let rhs = rule.collapsed().original_rhs();
            let node = rhs.external_at(*position);
            let direct: BTreeSet<SelectorLabel> =
                rhs.selectors_of(node).iter().map(|(l, _)| *l).collect();
            let mut realizable = direct;
            for edge in rhs.attached_hyperedges(node) {
                let label = rhs.edge_label(*edge);
                for (tentacle, attached) in rhs.attached_nodes(*edge).iter().enumerate() {
                    if *attached == node
                        && let Some(inner) = reachable.get(&(label, tentacle))
                    {
                        realizable.extend(inner.iter().copied());
                    }
                }
            }
            if !claimed.is_subset(&realizable) {
                debug!(
                    nonterminal = %nt,
                    position,
                    rule = %rule.identity(),
                    "claimed selector not realizable in one step"
                );
                return false;
            }
        }
    }
    true
}

/// The nonterminal dependency graph: an edge `N -> M` when some rule of `N`
/// mentions `M` in its right-hand side.
pub fn dependency_graph(grammar: &Grammar) -> DiGraph<Nonterminal, ()> {
    let mut graph = DiGraph::new();
    let mut indices: BTreeMap<Nonterminal, NodeIndex> = BTreeMap::new();
    let mut index_of = |graph: &mut DiGraph<Nonterminal, ()>, nt: Nonterminal| {
        *indices.entry(nt).or_insert_with(|| graph.add_node(nt))
    };
    for (_, rule) in grammar.concretization_rules() {
        let from = index_of(&mut graph, rule.nonterminal());
        let rhs = rule.collapsed().original_rhs();
        for edge in rhs.edge_ids() {
            let to = index_of(&mut graph, rhs.edge_label(edge));
            if !graph.contains_edge(from, to) {
                graph.add_edge(from, to, ());
            }
        }
    }
    graph
}

/// Nonterminals that cannot derive any nonterminal-free configuration.
///
/// Processes the strongly connected components of the dependency graph in
/// reverse topological order (mentioned nonterminals first), running the
/// productivity fixpoint within each component.
pub fn unproductive_nonterminals(grammar: &Grammar) -> BTreeSet<Nonterminal> {
    let graph = dependency_graph(grammar);
    let mut productive: BTreeSet<Nonterminal> = BTreeSet::new();
    for component in tarjan_scc(&graph) {
        loop {
            let mut changed = false;
            for index in &component {
                let nt = graph[*index];
                if productive.contains(&nt) {
                    continue;
                }
                let witnessed = grammar.rules_for(nt).any(|rule| {
                    let rhs = rule.collapsed().original_rhs();
                    rhs.edge_ids().all(|e| productive.contains(&rhs.edge_label(e)))
                });
                if witnessed {
                    productive.insert(nt);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }
    grammar
        .nonterminals()
        .filter(|nt| !productive.contains(nt))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::grammar::RuleStatus;
    use tangle_heap::{HeapConfiguration, SymbolTable};

    #[test]
    fn list_grammar_is_valid() {
        let fix = fixtures::list_fixture();
        assert!(GrammarValidity::DataStructureGrammar.is_satisfied(&fix.grammar));
        assert!(GrammarValidity::LocalConcretizability.is_satisfied(&fix.grammar));
    }

    #[test]
    fn reachable_selectors_of_the_list_grammar() {
        let fix = fixtures::list_fixture();
        let reachable = reachable_selectors(&fix.grammar);
        assert_eq!(
            reachable.get(&(fix.list, 0)).unwrap().iter().count(),
            1,
            "position 0 reaches exactly the next selector"
        );
        assert!(reachable.get(&(fix.list, 1)).unwrap().is_empty());
    }

    #[test]
    fn direct_selector_clash_is_rejected() {
        // L -> (x) -next-> (y) with an L(x, y) edge attached at x: the
        // tentacle claims `next`, which x also carries directly.
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let next = table.selector("next");
        let list = table.nonterminal("L", 2).unwrap();

        let mut base = HeapConfiguration::builder();
        let nodes = base.add_nodes(ty, 2);
        base.add_selector(nodes[0], next, nodes[1]).unwrap();
        base.set_external(nodes[0]).unwrap();
        base.set_external(nodes[1]).unwrap();

        let mut clash = HeapConfiguration::builder();
        let nodes = clash.add_nodes(ty, 2);
        clash.add_selector(nodes[0], next, nodes[1]).unwrap();
        clash
            .add_nonterminal_edge(list, &[nodes[0], nodes[1]])
            .unwrap();
        clash.set_external(nodes[0]).unwrap();
        clash.set_external(nodes[1]).unwrap();

        let grammar = Grammar::from_rules([
            (list, base.build().unwrap()),
            (list, clash.build().unwrap()),
        ])
        .unwrap();
        assert!(!GrammarValidity::DataStructureGrammar.is_satisfied(&grammar));
    }

    #[test]
    fn unproductive_nonterminal_is_found() {
        let mut table = SymbolTable::new();
        let ty = table.ty("T");
        let spin = table.nonterminal("Spin", 1).unwrap();
        // Spin -> Spin(x): no nonterminal-free derivation exists
        let mut builder = HeapConfiguration::builder();
        let node = builder.add_node(ty);
        builder.add_nonterminal_edge(spin, &[node]).unwrap();
        builder.set_external(node).unwrap();
        let grammar = Grammar::from_rules([(spin, builder.build().unwrap())]).unwrap();
        assert_eq!(
            unproductive_nonterminals(&grammar).into_iter().collect::<Vec<_>>(),
            vec![spin]
        );
        assert!(!GrammarValidity::DataStructureGrammar.is_satisfied(&grammar));
    }

    #[test]
    fn validity_recomputes_on_the_restricted_rule_set() {
        let fix = fixtures::list_fixture();
        // deactivating the base rule: the recursive rule still realizes
        // `next` directly, and productivity considers every rule
        let restricted = fix
            .grammar
            .with_rule_status(0, RuleStatus::Inactive)
            .unwrap();
        assert!(GrammarValidity::LocalConcretizability.is_satisfied(&restricted));
        assert!(GrammarValidity::DataStructureGrammar.is_satisfied(&restricted));
        // the deactivated rule no longer contributes claimed selectors
        let reachable = reachable_selectors(&restricted);
        assert_eq!(reachable.get(&(fix.list, 0)).unwrap().len(), 1);
    }
}
