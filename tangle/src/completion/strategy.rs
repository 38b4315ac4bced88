use super::{CompletionAlgorithm, CompletionContext, CompletionState};
use crate::error::TangleError;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::debug;

/// How the completion search explores grammar variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionStrategy {
    /// Repeatedly apply the best-scoring successor of the first improving
    /// heuristic (cycling through the heuristic list) until no heuristic
    /// improves the loss.
    Greedy,
    /// Loss-ordered priority search over all heuristic successors, bounded
    /// by the algorithm's maximum depth.
    AStar,
}

pub(crate) fn run_greedy(
    algorithm: &CompletionAlgorithm,
    root: CompletionState,
    ctx: &mut CompletionContext<'_>,
) -> Result<CompletionState, TangleError> {
    let mut current = root;
    let mut current_score = algorithm.score(&current);
    while !current.is_confluent() && current.depth() < algorithm.max_depth() {
        let mut improved: Option<(CompletionState, u64)> = None;
        for heuristic in algorithm.heuristics() {
            let successors = algorithm.expand(*heuristic, &current, ctx)?;
            let best = successors
                .into_iter()
                .map(|s| {
                    let score = algorithm.score(&s);
                    (s, score)
                })
                .min_by_key(|(_, score)| *score);
            if let Some((state, score)) = best
                && score < current_score
            {
                debug!(?heuristic, score, "greedy step");
                improved = Some((state, score));
                break;
            }
        }
        match improved {
            Some((state, score)) => {
                current = state;
                current_score = score;
            }
            None => break,
        }
    }
    Ok(current)
}

/// Heap entry ordered by (score, depth, insertion sequence); the sequence
/// keeps exploration deterministic among equal scores.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct Ranked(u64, usize, usize);

pub(crate) fn run_astar(
    algorithm: &CompletionAlgorithm,
    root: CompletionState,
    ctx: &mut CompletionContext<'_>,
) -> Result<CompletionState, TangleError> {
    let mut sequence = 0usize;
    let mut frontier: BinaryHeap<Reverse<Ranked>> = BinaryHeap::new();
    let mut states: Vec<Option<CompletionState>> = Vec::new();

    let root_score = algorithm.score(&root);
    let mut best_score = root_score;
    let mut best = root.clone();
    frontier.push(Reverse(Ranked(root_score, root.depth(), sequence)));
    states.push(Some(root));

    while let Some(Reverse(Ranked(score, _, idx))) = frontier.pop() {
        let Some(state) = states[idx].take() else {
            continue;
        };
        if score < best_score {
            best_score = score;
            best = state.clone();
        }
        if state.is_confluent() {
            return Ok(state);
        }
        if state.depth() >= algorithm.max_depth() {
            continue;
        }
        for heuristic in algorithm.heuristics() {
            for successor in algorithm.expand(*heuristic, &state, ctx)? {
                sequence += 1;
                let successor_score = algorithm.score(&successor);
                debug!(?heuristic, successor_score, depth = successor.depth(), "frontier push");
                frontier.push(Reverse(Ranked(successor_score, successor.depth(), sequence)));
                states.push(Some(successor));
            }
        }
    }
    Ok(best)
}
