use super::{CompletionContext, CompletionState};
use crate::error::TangleError;
use crate::grammar::{Grammar, RuleStatus};
use serde::Serialize;
use std::collections::BTreeSet;
use tangle_heap::{HeapConfiguration, Nonterminal, isomorphic};
use tracing::debug;

/// The closed family of grammar-editing heuristics.
///
/// A heuristic maps one state to zero or more successor grammars; it either
/// adds rules or removes (deactivates) them, never both in one step. Newly
/// added rules always receive strictly increasing original indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionHeuristic {
    /// Resolve a critical pair by adding rules that fold both canonical
    /// forms into one nonterminal: into an existing nonterminal when one
    /// form is that nonterminal's handle, into a fresh
    /// confluence-generated nonterminal otherwise.
    AddRuleNewNonterminal,
    /// Deactivate one of the two participating rules, trading analysis
    /// precision for confluence. All critical pairs are recomputed, since
    /// removing a rule can un-join previously strongly-joinable overlaps.
    RuleRestriction,
    /// Merge two confluence-generated nonterminals whose rule sets are
    /// structurally interchangeable.
    JoinGeneratedNonterminals,
    /// Add a critical pair's joint configuration to the grammar's
    /// abstraction-blocking set, vetoing the ambiguous overlap outright.
    AbstractionBlocking,
}

impl CompletionHeuristic {
    /// Successor states of `state`, in deterministic order. Successors
    /// failing the configured validity checks are dropped by the caller.
    pub(crate) fn successors(
        &self,
        state: &CompletionState,
        ctx: &mut CompletionContext<'_>,
    ) -> Result<Vec<CompletionState>, TangleError> {
        match self {
            CompletionHeuristic::AddRuleNewNonterminal => add_rule_successors(state, ctx),
            CompletionHeuristic::RuleRestriction => restriction_successors(state, ctx),
            CompletionHeuristic::JoinGeneratedNonterminals => join_successors(state, ctx),
            CompletionHeuristic::AbstractionBlocking => blocking_successors(state, ctx),
        }
    }
}

/// A configuration that is exactly one nonterminal hyperedge whose
/// attachment tuple equals its external sequence.
fn as_handle(hc: &HeapConfiguration) -> Option<Nonterminal> {
    if hc.edge_count() != 1 || !hc.variables().is_empty() {
        return None;
    }
    if hc.node_ids().any(|n| !hc.selectors_of(n).is_empty()) {
        return None;
    }
    let edge = hc.edge_ids().next()?;
    if hc.attached_nodes(edge) != hc.externals() || hc.node_count() != hc.external_count() {
        return None;
    }
    Some(hc.edge_label(edge))
}

fn has_equivalent_rule(grammar: &Grammar, nonterminal: Nonterminal, rhs: &HeapConfiguration) -> bool {
    grammar
        .rules_for(nonterminal)
        .any(|rule| isomorphic(rule.rhs(), rhs))
}

fn add_rule_successors(
    state: &CompletionState,
    ctx: &mut CompletionContext<'_>,
) -> Result<Vec<CompletionState>, TangleError> {
    let mut out = Vec::new();
    for pair in state.critical_pairs() {
        let left = pair.left_canonical();
        let right = pair.right_canonical();
        let grammar = state.grammar().grammar();

        let (target, new_rules) = match (as_handle(left), as_handle(right)) {
            // one side already folds to a nonterminal handle: orient the
            // other side into that nonterminal
            (Some(nt), _) if !has_equivalent_rule(grammar, nt, right) => {
                (nt, vec![right.clone()])
            }
            (_, Some(nt)) if !has_equivalent_rule(grammar, nt, left) => (nt, vec![left.clone()]),
            (Some(_), _) | (_, Some(_)) => continue, // nothing left to add
            (None, None) => {
                let fresh = ctx.fresh_nonterminal(grammar, left.external_count())?;
                (fresh, vec![left.clone(), right.clone()])
            }
        };
        debug!(nonterminal = %target, rules = new_rules.len(), "proposing rule addition");
        let edited =
            grammar.with_added_rules(target, new_rules, RuleStatus::ConfluenceGenerated)?;
        out.push(ctx.derive_state(
            state,
            edited,
            format!("add-rule:{target}@{}", pair.left_rule()),
        )?);
    }
    Ok(out)
}

fn restriction_successors(
    state: &CompletionState,
    ctx: &mut CompletionContext<'_>,
) -> Result<Vec<CompletionState>, TangleError> {
    let mut restricted: BTreeSet<usize> = BTreeSet::new();
    for pair in state.critical_pairs() {
        restricted.insert(pair.left_rule().original_idx);
        restricted.insert(pair.right_rule().original_idx);
    }
    let mut out = Vec::new();
    for original_idx in restricted {
        let grammar = state.grammar().grammar();
        let edited = grammar.with_rule_status(original_idx, RuleStatus::Inactive)?;
        out.push(ctx.derive_state(state, edited, format!("restrict:r{original_idx}"))?);
    }
    Ok(out)
}

/// Merge `merged` into `kept`. Both nonterminals must consist of
/// confluence-generated rules only; anything else is an unsupported
/// configuration and fails loudly.
pub(crate) fn merge_generated(
    grammar: &Grammar,
    kept: Nonterminal,
    merged: Nonterminal,
) -> Result<Grammar, TangleError> {
    let generated_only = |nt: Nonterminal| {
        grammar
            .rules_for(nt)
            .all(|r| r.status() == RuleStatus::ConfluenceGenerated)
            && grammar.rules_for(nt).next().is_some()
    };
    if !generated_only(kept) || !generated_only(merged) {
        return Err(TangleError::MergeRequiresGeneratedNonterminals);
    }
    grammar.with_merged_nonterminals(kept, merged)
}

fn join_successors(
    state: &CompletionState,
    ctx: &mut CompletionContext<'_>,
) -> Result<Vec<CompletionState>, TangleError> {
    let grammar = state.grammar().grammar();
    let generated: Vec<Nonterminal> = grammar
        .nonterminals()
        .filter(|nt| {
            let mut rules = grammar.rules_for(*nt).peekable();
            rules.peek().is_some()
                && grammar
                    .rules_for(*nt)
                    .all(|r| r.status() == RuleStatus::ConfluenceGenerated)
        })
        .collect();
    let mut out = Vec::new();
    for (i, kept) in generated.iter().enumerate() {
        for merged in generated.iter().skip(i + 1) {
            if kept.rank() != merged.rank()
                || !interchangeable_rule_sets(grammar, *kept, *merged)
            {
                continue;
            }
            let edited = merge_generated(grammar, *kept, *merged)?;
            out.push(ctx.derive_state(state, edited, format!("join:{kept}<-{merged}"))?);
        }
    }
    Ok(out)
}

/// Whether every original rule of one nonterminal has an isomorphic
/// counterpart in the other, with the two labels identified.
fn interchangeable_rule_sets(grammar: &Grammar, a: Nonterminal, b: Nonterminal) -> bool {
    let originals = |nt: Nonterminal| {
        grammar
            .rules_for(nt)
            .filter(|r| r.identity().collapsed_idx.is_none())
    };
    let matched = |x: Nonterminal, y: Nonterminal| {
        originals(x).all(|rx| {
            let relabeled = crate::grammar::relabel(rx.rhs(), x, y);
            match relabeled {
                Ok(relabeled) => originals(y).any(|ry| {
                    let other = crate::grammar::relabel(ry.rhs(), x, y);
                    other.map(|o| isomorphic(&relabeled, &o)).unwrap_or(false)
                }),
                Err(_) => false,
            }
        })
    };
    matched(a, b) && matched(b, a)
}

fn blocking_successors(
    state: &CompletionState,
    ctx: &mut CompletionContext<'_>,
) -> Result<Vec<CompletionState>, TangleError> {
    let grammar = state.grammar().grammar();
    // one successor per participating rule shape: vetoing either side's
    // match shape removes the ambiguous overlap
    let mut shapes: Vec<(usize, HeapConfiguration)> = Vec::new();
    for pair in state.critical_pairs() {
        for identity in [pair.left_rule(), pair.right_rule()] {
            let Some(rule) = grammar
                .rules()
                .iter()
                .find(|r| r.identity().original_idx == identity.original_idx
                    && r.identity().collapsed_idx == identity.collapsed_idx)
                .or_else(|| {
                    grammar
                        .rules()
                        .iter()
                        .find(|r| r.identity().original_idx == identity.original_idx)
                })
            else {
                continue;
            };
            let rhs = rule.rhs();
            if grammar.is_abstraction_blocked(rhs)
                || shapes.iter().any(|(_, s)| isomorphic(s, rhs))
            {
                continue;
            }
            shapes.push((identity.original_idx, rhs.clone()));
        }
    }
    let mut out = Vec::new();
    for (original_idx, shape) in shapes {
        let edited = grammar.with_blocking_configuration(shape);
        out.push(ctx.derive_state(state, edited, format!("block:r{original_idx}"))?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn handles_are_recognized() {
        let fix = fixtures::list_fixture();
        let handle = fixtures::abstract_chain(&fix, 1);
        assert_eq!(as_handle(&handle), Some(fix.list));
        assert_eq!(as_handle(&fixtures::abstract_chain(&fix, 2)), None);
        assert_eq!(as_handle(&fixtures::concrete_chain(&fix, 1)), None);
    }

    #[test]
    fn joining_requires_generated_nonterminals() {
        let fix = fixtures::list_fixture();
        assert!(matches!(
            merge_generated(&fix.grammar, fix.list, fix.list),
            Err(TangleError::MergeRequiresGeneratedNonterminals)
        ));
    }
}
