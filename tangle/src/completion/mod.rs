//! Grammar completion: a state-space search over grammar edits driving the
//! critical-pair count to zero.
//!
//! Each visited grammar variant becomes an immutable [`CompletionState`];
//! heuristics propose edited successors, validity checks gate them, a loss
//! function ranks them, and a strategy (greedy or A*) explores until
//! confluence or the depth budget. Exhausting the budget is a normal
//! terminal outcome, reported through the returned state's remaining
//! critical pairs.

mod heuristics;
mod loss;
mod strategy;

pub use heuristics::CompletionHeuristic;
pub use loss::CompletionLoss;
pub use strategy::CompletionStrategy;

use crate::confluence::{CriticalPair, CriticalPairFinder};
use crate::embedding::EmbeddingOptions;
use crate::error::TangleError;
use crate::grammar::validity::GrammarValidity;
use crate::grammar::{Grammar, NamedGrammar};
use tangle_heap::{Nonterminal, SymbolTable};
use tracing::{debug, info};

/// One node of the completion search tree: a grammar variant, its critical
/// pairs, and how it was reached. Created once per visited variant, never
/// mutated.
#[derive(Debug, Clone)]
pub struct CompletionState {
    grammar: NamedGrammar,
    critical_pairs: Vec<CriticalPair>,
    depth: usize,
    trail: Vec<String>,
}

impl CompletionState {
    pub fn grammar(&self) -> &NamedGrammar {
        &self.grammar
    }

    /// The critical pairs of this variant that are not strongly joinable.
    pub fn critical_pairs(&self) -> &[CriticalPair] {
        &self.critical_pairs
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The heuristic applications that produced this state, root first.
    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    pub fn is_confluent(&self) -> bool {
        self.critical_pairs.is_empty()
    }
}

/// The terminal outcome of a completion run: the best state reached plus any
/// still-unresolved critical pairs (through [`CompletionState`]).
#[derive(Debug, Clone)]
pub struct CompletionResult {
    state: CompletionState,
}

impl CompletionResult {
    pub fn state(&self) -> &CompletionState {
        &self.state
    }

    pub fn is_confluent(&self) -> bool {
        self.state.is_confluent()
    }

    pub fn unresolved_pairs(&self) -> &[CriticalPair] {
        self.state.critical_pairs()
    }
}

/// Shared machinery the heuristics use to derive successor states.
pub(crate) struct CompletionContext<'a> {
    options: EmbeddingOptions,
    symbols: &'a mut SymbolTable,
    fresh_counter: usize,
}

impl CompletionContext<'_> {
    /// Recompute the full critical-pair set of an edited grammar and wrap it
    /// as a successor state. Every edit recomputes from scratch; stale pair
    /// sets are never carried over.
    pub(crate) fn derive_state(
        &mut self,
        parent: &CompletionState,
        edited: Grammar,
        step: String,
    ) -> Result<CompletionState, TangleError> {
        let grammar = parent.grammar.modified(edited);
        let analysis = CriticalPairFinder::new(grammar.grammar(), self.options.clone()).find()?;
        let mut trail = parent.trail.clone();
        trail.push(step);
        Ok(CompletionState {
            grammar,
            critical_pairs: analysis.critical_pairs().to_vec(),
            depth: parent.depth + 1,
            trail,
        })
    }

    /// Mint a fresh confluence-generated nonterminal of the given rank. All
    /// tentacles are reduction tentacles: the externals of a generated
    /// nonterminal are glue points of a critical overlap, and merging them
    /// would manufacture overlaps the original grammar never exhibits.
    pub(crate) fn fresh_nonterminal(
        &mut self,
        grammar: &Grammar,
        rank: usize,
    ) -> Result<Nonterminal, TangleError> {
        loop {
            self.fresh_counter += 1;
            let label = format!("X{}", self.fresh_counter);
            let taken = self.symbols.is_declared(&label)
                || grammar.nonterminals().any(|nt| nt.label() == label);
            if !taken {
                return Ok(self
                    .symbols
                    .nonterminal_with_tentacles(&label, rank, &vec![true; rank])?);
            }
        }
    }
}

/// The complete configuration of one completion run: heuristics, validity
/// checks, loss function, strategy, and depth bound.
#[derive(Debug, Clone)]
pub struct CompletionAlgorithm {
    heuristics: Vec<CompletionHeuristic>,
    validity: Vec<GrammarValidity>,
    loss: CompletionLoss,
    strategy: CompletionStrategy,
    max_depth: usize,
    options: EmbeddingOptions,
}

impl CompletionAlgorithm {
    pub fn new(strategy: CompletionStrategy, max_depth: usize) -> Self {
        CompletionAlgorithm {
            heuristics: Vec::new(),
            validity: Vec::new(),
            loss: CompletionLoss::default(),
            strategy,
            max_depth,
            options: EmbeddingOptions::default(),
        }
    }

    pub fn with_heuristic(mut self, heuristic: CompletionHeuristic) -> Self {
        self.heuristics.push(heuristic);
        self
    }

    pub fn with_validity_check(mut self, check: GrammarValidity) -> Self {
        self.validity.push(check);
        self
    }

    pub fn with_loss(mut self, loss: CompletionLoss) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_embedding_options(mut self, options: EmbeddingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn heuristics(&self) -> &[CompletionHeuristic] {
        &self.heuristics
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Run completion on a grammar. Always terminates with a definite
    /// outcome; the input grammar value is never touched.
    pub fn run(
        &self,
        symbols: &mut SymbolTable,
        grammar: NamedGrammar,
    ) -> Result<CompletionResult, TangleError> {
        if self.heuristics.is_empty() {
            return Err(TangleError::NoHeuristicsConfigured);
        }
        let analysis =
            CriticalPairFinder::new(grammar.grammar(), self.options.clone()).find()?;
        let root = CompletionState {
            grammar,
            critical_pairs: analysis.critical_pairs().to_vec(),
            depth: 0,
            trail: Vec::new(),
        };
        info!(
            grammar = %root.grammar,
            critical_pairs = root.critical_pairs.len(),
            strategy = ?self.strategy,
            "starting completion"
        );
        let mut ctx = CompletionContext {
            options: self.options.clone(),
            symbols,
            fresh_counter: 0,
        };
        let best = match self.strategy {
            CompletionStrategy::Greedy => strategy::run_greedy(self, root, &mut ctx)?,
            CompletionStrategy::AStar => strategy::run_astar(self, root, &mut ctx)?,
        };
        info!(
            grammar = %best.grammar,
            remaining = best.critical_pairs.len(),
            depth = best.depth,
            "completion finished"
        );
        Ok(CompletionResult { state: best })
    }

    /// Expand one state through one heuristic, dropping successors that fail
    /// a validity check.
    pub(crate) fn expand(
        &self,
        heuristic: CompletionHeuristic,
        state: &CompletionState,
        ctx: &mut CompletionContext<'_>,
    ) -> Result<Vec<CompletionState>, TangleError> {
        let successors = heuristic.successors(state, ctx)?;
        let mut admitted = Vec::new();
        for successor in successors {
            let valid = self
                .validity
                .iter()
                .all(|check| check.is_satisfied(successor.grammar.grammar()));
            if valid {
                admitted.push(successor);
            } else {
                debug!(grammar = %successor.grammar, "successor rejected by validity check");
            }
        }
        Ok(admitted)
    }

    pub(crate) fn score(&self, state: &CompletionState) -> u64 {
        self.loss.score(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::grammar::RuleStatus;

    fn named_list_grammar() -> (tangle_heap::SymbolTable, NamedGrammar) {
        let fix = fixtures::list_fixture();
        (fix.table, NamedGrammar::new("sll", fix.grammar))
    }

    #[test]
    fn completion_requires_heuristics() {
        let (mut symbols, grammar) = named_list_grammar();
        let algorithm = CompletionAlgorithm::new(CompletionStrategy::Greedy, 1);
        assert!(matches!(
            algorithm.run(&mut symbols, grammar),
            Err(TangleError::NoHeuristicsConfigured)
        ));
    }

    #[test]
    fn rule_addition_completes_the_list_grammar_at_depth_one() {
        let (mut symbols, grammar) = named_list_grammar();
        let algorithm = CompletionAlgorithm::new(CompletionStrategy::Greedy, 1)
            .with_heuristic(CompletionHeuristic::AddRuleNewNonterminal)
            .with_validity_check(GrammarValidity::DataStructureGrammar)
            .with_validity_check(GrammarValidity::LocalConcretizability);
        let result = algorithm.run(&mut symbols, grammar).unwrap();
        assert!(result.is_confluent());
        assert!(result.unresolved_pairs().is_empty());
        let state = result.state();
        assert_eq!(state.depth(), 1);
        // the divergence is oriented into L itself: one generated rule, no
        // fresh nonterminal
        let generated: Vec<_> = state
            .grammar()
            .grammar()
            .rules()
            .iter()
            .filter(|r| r.status() == RuleStatus::ConfluenceGenerated)
            .collect();
        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].rhs().edge_count(), 2);
    }

    #[test]
    fn completion_never_mutates_the_input_grammar() {
        let (mut symbols, grammar) = named_list_grammar();
        let rule_count = grammar.grammar().rule_count();
        let algorithm = CompletionAlgorithm::new(CompletionStrategy::Greedy, 1)
            .with_heuristic(CompletionHeuristic::AddRuleNewNonterminal);
        let _ = algorithm.run(&mut symbols, grammar.clone()).unwrap();
        assert_eq!(grammar.grammar().rule_count(), rule_count);
        assert_eq!(grammar.version(), 0);
    }

    #[test]
    fn rule_restriction_trades_precision_for_confluence() {
        let (mut symbols, grammar) = named_list_grammar();
        let algorithm = CompletionAlgorithm::new(CompletionStrategy::AStar, 2)
            .with_heuristic(CompletionHeuristic::RuleRestriction);
        let result = algorithm.run(&mut symbols, grammar).unwrap();
        assert!(result.is_confluent());
        let state = result.state();
        assert!(
            state
                .grammar()
                .grammar()
                .rules()
                .iter()
                .any(|r| r.status() == RuleStatus::Inactive)
        );
    }

    #[test]
    fn abstraction_blocking_resolves_the_overlap() {
        let (mut symbols, grammar) = named_list_grammar();
        let algorithm = CompletionAlgorithm::new(CompletionStrategy::Greedy, 2)
            .with_heuristic(CompletionHeuristic::AbstractionBlocking);
        let result = algorithm.run(&mut symbols, grammar).unwrap();
        assert!(result.is_confluent());
        let state = result.state();
        assert!(!state.grammar().grammar().abstraction_blocking().is_empty());
    }

    #[test]
    fn completed_grammar_canonicalizes_uniquely() {
        use crate::canonicalization::{CanonicalizationMode, CanonicalizationStrategy};
        use crate::embedding::EmbeddingOptions;

        let fix = fixtures::list_fixture();
        let mut symbols = fixtures::list_fixture().table;
        let algorithm = CompletionAlgorithm::new(CompletionStrategy::Greedy, 1)
            .with_heuristic(CompletionHeuristic::AddRuleNewNonterminal);
        let result = algorithm
            .run(&mut symbols, NamedGrammar::new("sll", fix.grammar.clone()))
            .unwrap();
        assert!(result.is_confluent());

        // a confluent grammar gives every configuration a unique canonical
        // form; a four-cell chain collapses to the single segment edge
        let strategy = CanonicalizationStrategy::new(
            result.state().grammar().grammar().clone(),
            EmbeddingOptions::default(),
            CanonicalizationMode::Exhaustive,
        );
        let forms = strategy
            .canonicalize(&fixtures::concrete_chain(&fix, 4))
            .unwrap();
        assert_eq!(forms.len(), 1);
        assert!(tangle_heap::isomorphic(
            &forms[0],
            &fixtures::abstract_chain(&fix, 1)
        ));
    }

    #[test]
    fn budget_exhaustion_is_a_normal_outcome() {
        let (mut symbols, grammar) = named_list_grammar();
        // depth 0 forbids any edit; the single critical pair remains
        let algorithm = CompletionAlgorithm::new(CompletionStrategy::Greedy, 0)
            .with_heuristic(CompletionHeuristic::AddRuleNewNonterminal);
        let result = algorithm.run(&mut symbols, grammar).unwrap();
        assert!(!result.is_confluent());
        assert_eq!(result.unresolved_pairs().len(), 1);
    }
}
