//! Flattening of a state space into indexed probability edges.

use crate::error::{ModelError, ModelResult};
use crate::policy::HerdPolicy;
use crate::space::StateSpace;
use crate::state::CowState;
use crate::transition::TransitionModel;
use serde::Serialize;
use std::vec;

/// One non-structural entry of the transition matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub probability: f64,
}

/// Lazy stream of edges, one per (state, successor) pair, in state order.
///
/// A state with a single successor gets probability 1 without evaluating the
/// probability terms. A successor outside the state space is reported as an
/// error item and the stream continues with the next pair.
pub struct Edges<'a> {
    model: TransitionModel<'a>,
    space: &'a StateSpace,
    next_from: usize,
    from: usize,
    successors: vec::IntoIter<CowState>,
    single_successor: bool,
}

/// Start a fresh edge stream over `space`.
pub fn generate_edges<'a>(policy: &'a HerdPolicy, space: &'a StateSpace) -> Edges<'a> {
    Edges {
        model: TransitionModel::new(policy, space.limits()),
        space,
        next_from: 0,
        from: 0,
        successors: Vec::new().into_iter(),
        single_successor: false,
    }
}

impl Edges<'_> {
    fn edge_to(&self, to: CowState) -> ModelResult<Edge> {
        let to_index = self
            .space
            .index_of(&to)
            .ok_or_else(|| ModelError::StateNotFound {
                state: format!("{to:?}"),
            })?;
        let probability = if self.single_successor {
            1.0
        } else {
            let from = &self.space.states()[self.from];
            self.model.probability(from, &to)?
        };
        Ok(Edge {
            from: self.from,
            to: to_index,
            probability,
        })
    }
}

impl Iterator for Edges<'_> {
    type Item = ModelResult<Edge>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(to) = self.successors.next() {
                return Some(self.edge_to(to));
            }

            let from = self.space.states().get(self.next_from)?;
            self.from = self.next_from;
            self.next_from += 1;
            match self.model.possible_new_states(from) {
                Ok(successors) => {
                    self.single_successor = successors.len() == 1;
                    self.successors = successors.into_iter();
                }
                Err(error) => return Some(Err(error)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::generate_total_states;
    use std::collections::BTreeMap;

    fn small_policy() -> HerdPolicy {
        HerdPolicy {
            voluntary_waiting_period: vec![20, 10, 10],
            insemination_window: vec![15, 15, 15],
            days_pregnant_limit: vec![190, 190, 190],
            duration_dry: vec![30, 30],
            ..HerdPolicy::default()
        }
    }

    #[test]
    fn edges_are_in_state_order_and_stochastic() {
        let policy = small_policy();
        let space = generate_total_states(&policy, 300, 1).unwrap();
        let edges: Vec<Edge> = generate_edges(&policy, &space)
            .collect::<ModelResult<_>>()
            .unwrap();

        assert!(edges.windows(2).all(|pair| pair[0].from <= pair[1].from));
        let mut row_sums = BTreeMap::new();
        for edge in &edges {
            assert!((0.0..=1.0).contains(&edge.probability));
            *row_sums.entry(edge.from).or_insert(0.0) += edge.probability;
        }
        assert_eq!(row_sums.len(), space.len());
        for (from, sum) in row_sums {
            assert!((sum - 1.0).abs() < 1e-9, "row {from} sums to {sum}");
        }
    }

    #[test]
    fn stream_is_restartable() {
        let policy = small_policy();
        let space = generate_total_states(&policy, 300, 1).unwrap();
        let first: Vec<_> = generate_edges(&policy, &space).map(|e| e.unwrap()).collect();
        let second: Vec<_> = generate_edges(&policy, &space).map(|e| e.unwrap()).collect();
        assert_eq!(first, second);
    }
}
