//! Canonicalization: repeated backward rule application until no grammar
//! rule embeds any more.
//!
//! Because application order matters for a non-confluent grammar, the
//! exhaustive mode returns every maximal-reduction result (deduplicated up to
//! isomorphism); the lenient mode commits to the deterministic first
//! applicable transition and returns a single representative.

use crate::embedding::{Embedding, EmbeddingOptions, embeddings_in_state};
use crate::error::TangleError;
use crate::grammar::{Grammar, GrammarRule};
use crate::rewrite::fold_embedding;
use serde::Serialize;
use tangle_heap::{HeapConfiguration, isomorphic};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CanonicalizationMode {
    /// All maximal-reduction results.
    #[default]
    Exhaustive,
    /// One representative, following the deterministic first applicable
    /// transition.
    Lenient,
}

/// The abstraction strategy: a grammar, embedding options, and a mode.
///
/// This is the sole entry point the surrounding state-space exploration uses;
/// one call per generated program state.
#[derive(Debug, Clone)]
pub struct CanonicalizationStrategy {
    grammar: Grammar,
    options: EmbeddingOptions,
    mode: CanonicalizationMode,
}

impl CanonicalizationStrategy {
    pub fn new(grammar: Grammar, options: EmbeddingOptions, mode: CanonicalizationMode) -> Self {
        CanonicalizationStrategy {
            grammar,
            options,
            mode,
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn mode(&self) -> CanonicalizationMode {
        self.mode
    }

    /// Canonicalize a heap configuration.
    ///
    /// An input that no rule embeds into is already canonical and is returned
    /// unchanged; absence of matches is not an error.
    pub fn canonicalize(
        &self,
        heap: &HeapConfiguration,
    ) -> Result<Vec<HeapConfiguration>, TangleError> {
        self.canonicalize_state(heap, false)
    }

    /// Like [`canonicalize`](Self::canonicalize), with the input flagged as a
    /// return state for the embedding options.
    pub fn canonicalize_state(
        &self,
        heap: &HeapConfiguration,
        is_return_state: bool,
    ) -> Result<Vec<HeapConfiguration>, TangleError> {
        match self.mode {
            CanonicalizationMode::Lenient => {
                Ok(vec![self.reduce_leniently(heap, is_return_state)?])
            }
            CanonicalizationMode::Exhaustive => self.reduce_exhaustively(heap, is_return_state),
        }
    }

    fn reduce_leniently(
        &self,
        heap: &HeapConfiguration,
        is_return_state: bool,
    ) -> Result<HeapConfiguration, TangleError> {
        let mut state = heap.clone();
        while let Some(next) = self.first_transition(&state, is_return_state)? {
            state = next;
        }
        Ok(state)
    }

    fn reduce_exhaustively(
        &self,
        heap: &HeapConfiguration,
        is_return_state: bool,
    ) -> Result<Vec<HeapConfiguration>, TangleError> {
        let mut results: Vec<HeapConfiguration> = Vec::new();
        let mut seen: Vec<HeapConfiguration> = vec![heap.clone()];
        let mut pending: Vec<HeapConfiguration> = vec![heap.clone()];
        while let Some(state) = pending.pop() {
            let successors = self.transitions(&state, is_return_state)?;
            if successors.is_empty() {
                if !results.iter().any(|r| isomorphic(r, &state)) {
                    results.push(state);
                }
                continue;
            }
            for successor in successors {
                if !seen.iter().any(|s| isomorphic(s, &successor)) {
                    seen.push(successor.clone());
                    pending.push(successor);
                }
            }
        }
        trace!(
            results = results.len(),
            visited = seen.len(),
            "exhaustive reduction finished"
        );
        Ok(results)
    }

    /// Abstraction rules in application order: largest right-hand side
    /// first, then rule identity. Preferring the largest fold makes the
    /// lenient representative a maximal reduction and fixes the tie-break
    /// between overlapping applicable rules.
    fn ordered_rules(&self) -> Vec<&GrammarRule> {
        let mut rules: Vec<&GrammarRule> =
            self.grammar.abstraction_rules().map(|(_, r)| r).collect();
        rules.sort_by_key(|r| (std::cmp::Reverse(rhs_size(r.rhs())), r.identity()));
        rules
    }

    /// All one-step reductions of `heap`, in deterministic (rule, embedding)
    /// order, with blocked matches suppressed.
    fn transitions(
        &self,
        heap: &HeapConfiguration,
        is_return_state: bool,
    ) -> Result<Vec<HeapConfiguration>, TangleError> {
        let mut out = Vec::new();
        for rule in self.ordered_rules() {
            for embedding in
                embeddings_in_state(rule.rhs(), heap, &self.options, is_return_state)
            {
                if self.is_blocked(heap, rule, &embedding)? {
                    continue;
                }
                out.push(fold_embedding(heap, rule, &embedding)?);
            }
        }
        Ok(out)
    }

    fn first_transition(
        &self,
        heap: &HeapConfiguration,
        is_return_state: bool,
    ) -> Result<Option<HeapConfiguration>, TangleError> {
        for rule in self.ordered_rules() {
            for embedding in
                embeddings_in_state(rule.rhs(), heap, &self.options, is_return_state)
            {
                if self.is_blocked(heap, rule, &embedding)? {
                    continue;
                }
                return Ok(Some(fold_embedding(heap, rule, &embedding)?));
            }
        }
        Ok(None)
    }

    /// Whether the matched subgraph is vetoed by the grammar's
    /// abstraction-blocking set.
    fn is_blocked(
        &self,
        heap: &HeapConfiguration,
        rule: &GrammarRule,
        embedding: &Embedding,
    ) -> Result<bool, TangleError> {
        if self.grammar.abstraction_blocking().is_empty() {
            return Ok(false);
        }
        let pattern = rule.rhs();
        let selectors: Vec<_> = pattern
            .node_ids()
            .flat_map(|n| {
                pattern
                    .selectors_of(n)
                    .iter()
                    .map(move |(label, _)| (embedding.node_image(n), *label))
            })
            .collect();
        let externals: Vec<_> = pattern
            .externals()
            .iter()
            .map(|n| embedding.node_image(*n))
            .collect();
        let image = heap.induced_subconfiguration(
            embedding.node_images(),
            &selectors,
            embedding.edge_images(),
            &externals,
        )?;
        Ok(self.grammar.is_abstraction_blocked(&image))
    }
}

fn rhs_size(hc: &HeapConfiguration) -> usize {
    let selectors: usize = hc.node_ids().map(|n| hc.selectors_of(n).len()).sum();
    hc.node_count() + hc.edge_count() + selectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn strategy(mode: CanonicalizationMode) -> CanonicalizationStrategy {
        let fix = fixtures::list_fixture();
        CanonicalizationStrategy::new(fix.grammar, EmbeddingOptions::default(), mode)
    }

    #[test]
    fn single_cell_reduces_to_one_edge() {
        let fix = fixtures::list_fixture();
        let strategy = strategy(CanonicalizationMode::Exhaustive);
        let results = strategy
            .canonicalize(&fixtures::concrete_chain(&fix, 1))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(tangle_heap::isomorphic(
            &results[0],
            &fixtures::abstract_chain(&fix, 1)
        ));
    }

    #[test]
    fn the_list_grammar_is_order_dependent() {
        let fix = fixtures::list_fixture();
        let strategy = strategy(CanonicalizationMode::Exhaustive);
        let results = strategy
            .canonicalize(&fixtures::concrete_chain(&fix, 2))
            .unwrap();
        // reducing left-to-right strands an L·L chain; right-to-left reaches
        // the single edge
        assert_eq!(results.len(), 2);
        assert!(
            results
                .iter()
                .any(|r| tangle_heap::isomorphic(r, &fixtures::abstract_chain(&fix, 1)))
        );
        assert!(
            results
                .iter()
                .any(|r| tangle_heap::isomorphic(r, &fixtures::abstract_chain(&fix, 2)))
        );
    }

    #[test]
    fn lenient_mode_returns_one_representative() {
        let fix = fixtures::list_fixture();
        let strategy = strategy(CanonicalizationMode::Lenient);
        let results = strategy
            .canonicalize(&fixtures::concrete_chain(&fix, 2))
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let fix = fixtures::list_fixture();
        let strategy = strategy(CanonicalizationMode::Exhaustive);
        let first = strategy
            .canonicalize(&fixtures::concrete_chain(&fix, 3))
            .unwrap();
        for result in &first {
            let again = strategy.canonicalize(result).unwrap();
            assert_eq!(again.len(), 1);
            assert!(tangle_heap::isomorphic(&again[0], result));
        }
    }

    #[test]
    fn already_canonical_input_is_returned_unchanged() {
        let fix = fixtures::list_fixture();
        let strategy = strategy(CanonicalizationMode::Exhaustive);
        let canonical = fixtures::abstract_chain(&fix, 1);
        let results = strategy.canonicalize(&canonical).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0], canonical);
    }

    #[test]
    fn blocking_configurations_veto_matches() {
        let fix = fixtures::list_fixture();
        // veto folding a single concrete cell
        let blocked_grammar = fix
            .grammar
            .with_blocking_configuration(fix.grammar.rule(0).rhs().clone());
        let strategy = CanonicalizationStrategy::new(
            blocked_grammar,
            EmbeddingOptions::default(),
            CanonicalizationMode::Exhaustive,
        );
        let cell = fixtures::concrete_chain(&fix, 1);
        let results = strategy.canonicalize(&cell).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0], cell);
    }
}
