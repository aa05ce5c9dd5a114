//! Summary of a generated chain.

use crate::cow::Cow;
use crate::error::ModelResult;
use crate::state::LifePhase;
use crate::stats::{Accumulator, AccumulatorReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node and edge counts plus row-sum statistics of a cow's transition matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainReport {
    pub node_count: usize,
    pub edge_count: usize,
    /// Number of states per life phase.
    pub phase_counts: BTreeMap<LifePhase, usize>,
    pub row_sums: AccumulatorReport,
    /// Largest absolute deviation of a row sum from 1.
    pub max_row_deviation: f64,
    /// Row with the largest deviation.
    pub worst_row: Option<usize>,
}

impl ChainReport {
    /// Consume the cow's edge stream and summarize it.
    pub fn from_cow(cow: &Cow) -> ModelResult<Self> {
        let space = cow.total_states()?;

        let mut phase_counts = BTreeMap::new();
        for state in space.states() {
            *phase_counts.entry(state.life_phase()).or_insert(0) += 1;
        }

        let mut sums = vec![0.0; space.len()];
        let mut edge_count = 0;
        for edge in cow.generate_edges()? {
            let edge = edge?;
            sums[edge.from] += edge.probability;
            edge_count += 1;
        }

        let mut row_sums = Accumulator::new();
        let mut max_row_deviation = 0.0;
        let mut worst_row = None;
        for (row, &sum) in sums.iter().enumerate() {
            row_sums.add(sum);
            let deviation = (sum - 1.0).abs();
            if deviation > max_row_deviation {
                max_row_deviation = deviation;
                worst_row = Some(row);
            }
        }

        Ok(Self {
            node_count: space.len(),
            edge_count,
            phase_counts,
            row_sums: row_sums.report(),
            max_row_deviation,
            worst_row,
        })
    }

    /// Whether every row sums to 1 within `tol`.
    pub fn is_stochastic(&self, tol: f64) -> bool {
        if self.max_row_deviation > tol {
            log::warn!(
                "row {:?} deviates from 1 by {}",
                self.worst_row,
                self.max_row_deviation
            );
            return false;
        }
        true
    }
}
