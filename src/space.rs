//! Enumeration of every state a cow can reach.
//!
//! The generator walks forward one day in milk at a time, lactation after
//! lactation, and emits the states of each life phase that are legal on that
//! day. Pregnant states form a lattice of (days in milk, days pregnant): a cow
//! can conceive on any day of the insemination window, so each day carries a
//! band of concurrent pregnancy cohorts.

use crate::biology::{MilkBot, day_state};
use crate::error::{ModelError, ModelResult};
use crate::policy::HerdPolicy;
use crate::state::{CowState, LifePhase};
use serde::Serialize;
use std::collections::HashMap;

/// Limits a state space was generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationLimits {
    pub days_in_milk_limit: u32,
    pub lactation_number_limit: u32,
    /// Gestation length in effect when generation terminated.
    pub days_pregnant_limit: u32,
}

/// Ordered, duplicate-free set of states with a stable index.
#[derive(Debug, Clone)]
pub struct StateSpace {
    states: Vec<CowState>,
    index: HashMap<CowState, usize>,
    limits: GenerationLimits,
}

impl StateSpace {
    pub fn states(&self) -> &[CowState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn index_of(&self, state: &CowState) -> Option<usize> {
        self.index.get(state).copied()
    }

    pub fn contains(&self, state: &CowState) -> bool {
        self.index.contains_key(state)
    }

    pub fn limits(&self) -> GenerationLimits {
        self.limits
    }
}

/// Enumerate all states reachable under `policy` up to the given limits.
///
/// The days-in-milk limit must be at least 2: the forced exit is emitted on
/// the day before the limit.
pub fn generate_total_states(
    policy: &HerdPolicy,
    days_in_milk_limit: u32,
    lactation_number_limit: u32,
) -> ModelResult<StateSpace> {
    policy.validate()?;
    if days_in_milk_limit < 2 {
        return Err(ModelError::InvalidPolicy {
            message: format!("days in milk limit must be at least 2, got {days_in_milk_limit}"),
        });
    }

    let mut generator = Generator::new(policy, days_in_milk_limit, lactation_number_limit);
    generator.run()?;

    let limits = GenerationLimits {
        days_in_milk_limit,
        lactation_number_limit,
        days_pregnant_limit: policy.days_pregnant_limit(generator.lactation_number),
    };
    log::info!(
        "generated {} states (dim limit {days_in_milk_limit}, lactation limit {lactation_number_limit})",
        generator.states.len()
    );

    Ok(StateSpace {
        states: generator.states,
        index: generator.index,
        limits,
    })
}

struct Generator<'a> {
    policy: &'a HerdPolicy,
    dim_limit: u32,
    ln_limit: u32,

    states: Vec<CowState>,
    index: HashMap<CowState, usize>,

    days_in_milk: u32,
    lactation_number: u32,
    // Pregnancy cohort lattice.
    days_pregnant: u32,
    days_pregnant_start: u32,
    simulated_dp_limit: u32,
    // Terminal flags for the last lactation.
    stop_pregnant_state: bool,
    last_pregnancy: bool,
    not_heifer: bool,
}

impl<'a> Generator<'a> {
    fn new(policy: &'a HerdPolicy, dim_limit: u32, ln_limit: u32) -> Self {
        Self {
            policy,
            dim_limit,
            ln_limit,
            states: Vec::new(),
            index: HashMap::new(),
            days_in_milk: 0,
            lactation_number: 0,
            days_pregnant: 1,
            days_pregnant_start: 1,
            simulated_dp_limit: 1,
            stop_pregnant_state: false,
            last_pregnancy: false,
            not_heifer: false,
        }
    }

    fn run(&mut self) -> ModelResult<()> {
        while self.lactation_number <= self.ln_limit {
            let ln = self.lactation_number;
            for life_phase in LifePhase::ALL {
                match life_phase {
                    LifePhase::Open => self.open_states()?,
                    LifePhase::Pregnant => self.pregnant_states()?,
                    LifePhase::DoNotBreed => self.do_not_breed_states()?,
                    LifePhase::Exit => self.exit_states()?,
                }
            }

            let mut rolled_over = false;
            if self.days_in_milk + 1 == self.dim_limit && self.not_heifer {
                self.emit(day_state(self.policy, LifePhase::Exit, self.dim_limit, ln, 0)?);
                if ln == self.ln_limit {
                    self.emit(day_state(self.policy, LifePhase::Exit, self.dim_limit, ln + 1, 0)?);
                }
                self.next_lactation();
                rolled_over = true;
            } else {
                self.days_in_milk += 1;
            }

            // Cull on the yield of the day just simulated.
            if self.not_heifer && !rolled_over {
                let previous = MilkBot::for_lactation(ln).curve(self.days_in_milk as f64 - 1.0);
                if previous < self.policy.milk_threshold() {
                    log::debug!(
                        "lactation {ln} culled for low yield at day {}",
                        self.days_in_milk - 1
                    );
                    self.next_lactation();
                }
            }

            if self.lactation_number == 0 {
                let heifer_end = self.policy.insemination_cutoff(0) + self.policy.days_pregnant_limit(0) + 2;
                if self.days_in_milk == heifer_end {
                    // Heifers calving in the last lactation still need the exit after their last day.
                    if self.last_pregnancy {
                        self.emit(day_state(self.policy, LifePhase::Exit, heifer_end, 1, 0)?);
                    }
                    self.next_lactation();
                    self.not_heifer = true;
                }
            }
        }
        Ok(())
    }

    fn open_states(&mut self) -> ModelResult<()> {
        let ln = self.lactation_number;
        if self.days_in_milk <= self.policy.insemination_cutoff(ln) + 1 {
            let state = day_state(self.policy, LifePhase::Open, self.days_in_milk, ln, 0)?;
            if self.passes_threshold(&state) {
                self.emit(state);
            }
        }
        Ok(())
    }

    fn pregnant_states(&mut self) -> ModelResult<()> {
        let ln = self.lactation_number;
        let dim = self.days_in_milk;
        let vwp = self.policy.voluntary_waiting_period(ln);
        let cutoff = self.policy.insemination_cutoff(ln);
        let dp_limit = self.policy.days_pregnant_limit(ln);

        if !(vwp < dim && dim <= cutoff + dp_limit) || self.stop_pregnant_state {
            return Ok(());
        }

        while self.days_pregnant <= self.simulated_dp_limit {
            let state = day_state(self.policy, LifePhase::Pregnant, dim, ln, self.days_pregnant)?;
            self.emit(state);
            self.days_pregnant += 1;
        }
        // Once past the insemination window, the earliest cohort moves up each day.
        if cutoff < dim && dim < cutoff + dp_limit {
            self.days_pregnant_start += 1;
        }
        self.days_pregnant = self.days_pregnant_start;

        if self.simulated_dp_limit != dp_limit {
            self.simulated_dp_limit += 1;
        } else if ln == self.ln_limit {
            if self.days_pregnant_start > dp_limit {
                self.stop_pregnant_state = true;
            } else if dim == vwp + dp_limit + 1 {
                log::debug!("first calving of the last lactation at day {dim}");
                self.last_pregnancy = true;
            }
        }
        Ok(())
    }

    fn do_not_breed_states(&mut self) -> ModelResult<()> {
        let ln = self.lactation_number;
        let dim = self.days_in_milk;
        if dim <= self.policy.insemination_cutoff(ln) + 1 {
            return Ok(());
        }

        if ln != 0 {
            let state = day_state(self.policy, LifePhase::DoNotBreed, dim, ln, 0)?;
            if self.passes_threshold(&state) {
                self.emit(state);
            }
        }
        // Cows calving in the last lactation continue as do-not-breed one
        // lactation ahead. A calving heifer enters regardless of yield.
        if self.last_pregnancy {
            let state = day_state(self.policy, LifePhase::DoNotBreed, dim, ln + 1, 0)?;
            if state.milk_output() >= self.policy.milk_threshold() || ln == 0 {
                self.emit(state);
            }
        }
        Ok(())
    }

    fn exit_states(&mut self) -> ModelResult<()> {
        let ln = self.lactation_number;
        let dim = self.days_in_milk;
        self.emit(day_state(self.policy, LifePhase::Exit, dim, ln, 0)?);
        if self.last_pregnancy {
            self.emit(day_state(self.policy, LifePhase::Exit, dim, ln + 1, 0)?);
        }
        Ok(())
    }

    fn passes_threshold(&self, state: &CowState) -> bool {
        state.milk_output() >= self.policy.milk_threshold() || state.is_heifer()
    }

    fn next_lactation(&mut self) {
        log::debug!(
            "lactation {} done after {} states",
            self.lactation_number,
            self.states.len()
        );
        self.days_in_milk = 0;
        self.days_pregnant = 1;
        self.days_pregnant_start = 1;
        self.simulated_dp_limit = 1;
        self.lactation_number += 1;
    }

    fn emit(&mut self, state: CowState) {
        if !self.index.contains_key(&state) {
            self.index.insert(state, self.states.len());
            self.states.push(state);
        }
    }
}
