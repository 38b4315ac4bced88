use super::CompletionState;
use serde::Serialize;

/// Scores a completion state; lower is better.
///
/// The critical-pair count dominates; rule count and total external-node
/// count break ties toward smaller grammars. The default weights keep the
/// primary term dominant for any realistic grammar size.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionLoss {
    pub critical_pair_weight: u64,
    pub rule_weight: u64,
    pub external_weight: u64,
}

impl Default for CompletionLoss {
    fn default() -> Self {
        CompletionLoss {
            critical_pair_weight: 1_000_000,
            rule_weight: 100,
            external_weight: 1,
        }
    }
}

impl CompletionLoss {
    pub fn score(&self, state: &CompletionState) -> u64 {
        let grammar = state.grammar().grammar();
        let externals: usize = grammar
            .rules()
            .iter()
            .map(|r| r.rhs().external_count())
            .sum();
        self.critical_pair_weight * state.critical_pairs().len() as u64
            + self.rule_weight * grammar.rule_count() as u64
            + self.external_weight * externals as u64
    }
}
