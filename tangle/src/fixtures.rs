//! Shared test fixtures: the classic singly-linked-list grammar.

use crate::grammar::Grammar;
use tangle_heap::{HeapConfiguration, Nonterminal, SelectorLabel, SymbolTable, Type};

pub(crate) struct ListFixture {
    pub table: SymbolTable,
    pub ty: Type,
    pub next: SelectorLabel,
    pub list: Nonterminal,
    pub grammar: Grammar,
}

/// The two-rule list grammar: `L -> (x) -next-> (y)` and
/// `L -> (x) -next-> (u), L(u, y)`, externals `x, y` in both rules. The
/// segment end is a reduction tentacle, as usual for list segments.
pub(crate) fn list_fixture() -> ListFixture {
    let mut table = SymbolTable::new();
    let ty = table.ty("ListNode");
    let next = table.selector("next");
    let list = table
        .nonterminal_with_tentacles("L", 2, &[false, true])
        .unwrap();

    let mut base = HeapConfiguration::builder();
    let nodes = base.add_nodes(ty, 2);
    base.add_selector(nodes[0], next, nodes[1]).unwrap();
    base.set_external(nodes[0]).unwrap();
    base.set_external(nodes[1]).unwrap();

    let mut step = HeapConfiguration::builder();
    let nodes = step.add_nodes(ty, 3);
    step.add_selector(nodes[0], next, nodes[1]).unwrap();
    step.add_nonterminal_edge(list, &[nodes[1], nodes[2]])
        .unwrap();
    step.set_external(nodes[0]).unwrap();
    step.set_external(nodes[2]).unwrap();

    let grammar = Grammar::from_rules([
        (list, base.build().unwrap()),
        (list, step.build().unwrap()),
    ])
    .unwrap();

    ListFixture {
        table,
        ty,
        next,
        list,
        grammar,
    }
}

/// A concrete list segment of `cells` selector edges, first and last node
/// external.
pub(crate) fn concrete_chain(fix: &ListFixture, cells: usize) -> HeapConfiguration {
    let mut builder = HeapConfiguration::builder();
    let nodes = builder.add_nodes(fix.ty, cells + 1);
    for window in nodes.windows(2) {
        builder.add_selector(window[0], fix.next, window[1]).unwrap();
    }
    builder.set_external(nodes[0]).unwrap();
    builder.set_external(nodes[cells]).unwrap();
    builder.build().unwrap()
}

/// A chain of `edges` abstract `L` hyperedges, first and last node external.
pub(crate) fn abstract_chain(fix: &ListFixture, edges: usize) -> HeapConfiguration {
    let mut builder = HeapConfiguration::builder();
    let nodes = builder.add_nodes(fix.ty, edges + 1);
    for window in nodes.windows(2) {
        builder
            .add_nonterminal_edge(fix.list, &[window[0], window[1]])
            .unwrap();
    }
    builder.set_external(nodes[0]).unwrap();
    builder.set_external(nodes[edges]).unwrap();
    builder.build().unwrap()
}
