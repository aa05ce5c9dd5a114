//! Successor enumeration and daily transition probabilities.

use crate::biology::day_state;
use crate::error::ModelResult;
use crate::policy::{ExitPolicy, HerdPolicy};
use crate::space::GenerationLimits;
use crate::state::{CowState, LifePhase};

/// Probability of involuntary death per day (5% per year).
pub const DAILY_DEATH_PROBABILITY: f64 = 0.05 / 365.0;

/// Transition rules for a state space generated with `limits`.
#[derive(Debug, Clone, Copy)]
pub struct TransitionModel<'a> {
    policy: &'a HerdPolicy,
    limits: GenerationLimits,
}

impl<'a> TransitionModel<'a> {
    pub fn new(policy: &'a HerdPolicy, limits: GenerationLimits) -> Self {
        Self { policy, limits }
    }

    /// States reachable from `from` in one day.
    ///
    /// The first entry is always the exit of the following day, or, for an
    /// exited cow, the state that follows exit under the herd's exit policy.
    pub fn possible_new_states(&self, from: &CowState) -> ModelResult<Vec<CowState>> {
        let policy = self.policy;
        let dim = from.days_in_milk();
        let ln = from.lactation_number();
        let dp = from.days_pregnant();
        let next = dim + 1;

        if from.life_phase() == LifePhase::Exit {
            let successor = match policy.exit_policy() {
                ExitPolicy::Replace => day_state(policy, LifePhase::Open, 0, 0, 0)?,
                ExitPolicy::Absorb => *from,
            };
            return Ok(vec![successor]);
        }

        let mut states = vec![day_state(policy, LifePhase::Exit, next, ln, 0)?];
        if next == self.limits.days_in_milk_limit {
            return Ok(states);
        }

        let threshold = policy.milk_threshold();
        let vwp = policy.voluntary_waiting_period(ln);
        let cutoff = policy.insemination_cutoff(ln);
        let gestation = policy.days_pregnant_limit(ln);
        let above_threshold = from.milk_output() > threshold || from.is_heifer();

        match from.life_phase() {
            LifePhase::Open if above_threshold => {
                if vwp <= dim && dim <= cutoff {
                    states.push(day_state(policy, LifePhase::Pregnant, next, ln, 1)?);
                }
                if dim > cutoff && ln != 0 {
                    states.push(day_state(policy, LifePhase::DoNotBreed, next, ln, 0)?);
                } else if dim <= cutoff {
                    states.push(day_state(policy, LifePhase::Open, next, ln, 0)?);
                }
            }
            LifePhase::Pregnant if above_threshold || dp >= policy.dry_off_day(ln) => {
                let ln_limit = self.limits.lactation_number_limit;
                if dp == gestation && ln <= ln_limit {
                    // Calving: the last generated lactation continues as do-not-breed.
                    if ln == ln_limit {
                        let state = day_state(policy, LifePhase::DoNotBreed, next, ln + 1, 0)?;
                        if state.milk_output() >= threshold || ln == 0 {
                            states.push(state);
                        }
                    } else {
                        states.push(day_state(policy, LifePhase::Open, 0, ln + 1, 0)?);
                    }
                } else if dp < gestation {
                    states.push(day_state(policy, LifePhase::Pregnant, next, ln, dp + 1)?);
                    if dim <= cutoff {
                        states.push(day_state(policy, LifePhase::Open, next, ln, 0)?);
                    } else if ln != 0 {
                        states.push(day_state(policy, LifePhase::DoNotBreed, next, ln, 0)?);
                    }
                }
            }
            LifePhase::DoNotBreed if from.milk_output() > threshold => {
                let state = day_state(policy, LifePhase::DoNotBreed, next, ln, 0)?;
                if state.milk_output() >= threshold {
                    states.push(state);
                }
            }
            _ => {}
        }
        Ok(states)
    }

    /// Probability that a cow in `from` is in `to` the next day.
    ///
    /// Zero for any `to` that is not a possible new state of `from`.
    pub fn probability(&self, from: &CowState, to: &CowState) -> ModelResult<f64> {
        if !self.possible_new_states(from)?.contains(to) {
            return Ok(0.0);
        }

        let terms = ProbabilityTerms::new(self.policy, from);
        let policy = self.policy;
        let dim = from.days_in_milk();
        let ln = from.lactation_number();
        let vwp = policy.voluntary_waiting_period(ln);
        let cutoff = policy.insemination_cutoff(ln);

        let not_death = 1.0 - terms.death;
        let not_pregnant = 1.0 - terms.pregnancy;
        let not_below = 1.0 - terms.below_threshold;
        let not_above = 1.0 - terms.above_cutoff;

        let probability = match (from.life_phase(), to.life_phase()) {
            (LifePhase::Open, LifePhase::Open) => {
                if dim < vwp {
                    not_below * not_death
                } else {
                    not_pregnant * not_below * not_above * not_death
                }
            }
            (LifePhase::Open, LifePhase::Pregnant) => {
                terms.pregnancy * not_below * not_above * not_death
            }
            (LifePhase::Open, LifePhase::DoNotBreed) => terms.above_cutoff * not_below * not_death,
            (LifePhase::Open, LifePhase::Exit) => {
                if terms.below_threshold == 1.0 {
                    1.0
                } else if dim == cutoff + 1 && ln == 0 {
                    not_pregnant * not_death + terms.death
                } else {
                    terms.death
                }
            }
            (LifePhase::Pregnant, LifePhase::Open | LifePhase::DoNotBreed) => {
                if to.lactation_number() == ln + 1 {
                    terms.birth * not_below * not_death
                } else {
                    terms.abortion * not_below * not_death
                }
            }
            (LifePhase::Pregnant, LifePhase::Pregnant) => {
                (1.0 - terms.abortion) * not_below * not_death
            }
            (LifePhase::Pregnant, LifePhase::Exit) => {
                if terms.below_threshold == 1.0 {
                    1.0
                } else if terms.birth == 1.0 && ln == 0 {
                    terms.death
                } else if dim > cutoff && ln == 0 {
                    terms.abortion * not_death + terms.death
                } else {
                    terms.death
                }
            }
            (LifePhase::DoNotBreed, LifePhase::DoNotBreed) => not_below * not_death,
            (LifePhase::DoNotBreed, LifePhase::Exit) => {
                if terms.below_threshold == 1.0 {
                    1.0
                } else {
                    terms.death
                }
            }
            (LifePhase::Exit, _) => 1.0,
            _ => 0.0,
        };
        Ok(probability)
    }
}

/// Daily event probabilities for a cow in a given state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityTerms {
    pub death: f64,
    pub ovulation: f64,
    pub insemination: f64,
    pub conception: f64,
    /// Ovulation, insemination and conception on the same day.
    pub pregnancy: f64,
    pub birth: f64,
    pub abortion: f64,
    /// 1 when a lactating, undried cow yields less than the milk threshold.
    pub below_threshold: f64,
    /// 1 past the last insemination day.
    pub above_cutoff: f64,
}

impl ProbabilityTerms {
    pub fn new(policy: &HerdPolicy, state: &CowState) -> Self {
        let dim = state.days_in_milk();
        let ln = state.lactation_number();
        let dp = state.days_pregnant();
        let gestation = policy.days_pregnant_limit(ln);

        let ovulation = if ln == 0 { 1.0 / 19.0 } else { 1.0 / 21.0 };
        let insemination = match (dim < policy.voluntary_waiting_period(ln), ln) {
            (true, _) => 0.0,
            (false, 0) => 0.85,
            (false, _) => 0.65,
        };
        let conception = match ln {
            0 => 0.5,
            1 => 0.45,
            _ => 0.35,
        };
        let below_threshold = state.milk_output() < policy.milk_threshold()
            && ln != 0
            && dp < policy.dry_off_day(ln);

        Self {
            death: DAILY_DEATH_PROBABILITY,
            ovulation,
            insemination,
            conception,
            pregnancy: ovulation * insemination * conception,
            birth: indicator(dp == gestation),
            abortion: abortion_probability(dp, gestation),
            below_threshold: indicator(below_threshold),
            above_cutoff: indicator(dim > policy.insemination_cutoff(ln)),
        }
    }
}

/// Daily abortion probability at `days_pregnant` into a gestation of `gestation` days.
pub fn abortion_probability(days_pregnant: u32, gestation: u32) -> f64 {
    match days_pregnant {
        0..=29 => 0.0,
        30..=45 => 0.125 / 15.0,
        46..=180 => 0.099 / 135.0,
        dp if dp <= gestation => 0.02 / (gestation as f64 - 180.0),
        _ => 0.0,
    }
}

fn indicator(condition: bool) -> f64 {
    if condition { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::generate_total_states;

    fn limits(days_in_milk_limit: u32, lactation_number_limit: u32) -> GenerationLimits {
        GenerationLimits {
            days_in_milk_limit,
            lactation_number_limit,
            days_pregnant_limit: 282,
        }
    }

    fn state(policy: &HerdPolicy, phase: LifePhase, dim: u32, ln: u32, dp: u32) -> CowState {
        day_state(policy, phase, dim, ln, dp).unwrap()
    }

    fn row_sum(model: &TransitionModel, from: &CowState) -> f64 {
        model
            .possible_new_states(from)
            .unwrap()
            .iter()
            .map(|to| model.probability(from, to).unwrap())
            .sum()
    }

    #[test]
    fn abortion_tiers() {
        assert_eq!(abortion_probability(29, 280), 0.0);
        assert_eq!(abortion_probability(30, 280), 0.125 / 15.0);
        assert_eq!(abortion_probability(45, 280), 0.125 / 15.0);
        assert_eq!(abortion_probability(46, 280), 0.099 / 135.0);
        assert_eq!(abortion_probability(180, 280), 0.099 / 135.0);
        assert_eq!(abortion_probability(181, 280), 0.02 / 100.0);
        assert_eq!(abortion_probability(280, 280), 0.02 / 100.0);
        assert_eq!(abortion_probability(281, 280), 0.0);
    }

    #[test]
    fn exit_is_always_first_successor() {
        let policy = HerdPolicy::default();
        let model = TransitionModel::new(&policy, limits(1000, 3));
        let from = state(&policy, LifePhase::Open, 100, 1, 0);
        let successors = model.possible_new_states(&from).unwrap();
        assert_eq!(successors[0], state(&policy, LifePhase::Exit, 101, 1, 0));
        assert_eq!(successors[0].milk_output(), 0.0);
    }

    #[test]
    fn open_in_insemination_window() {
        let policy = HerdPolicy::default();
        let model = TransitionModel::new(&policy, limits(1000, 3));
        let from = state(&policy, LifePhase::Open, 100, 1, 0);
        let successors = model.possible_new_states(&from).unwrap();
        assert_eq!(
            successors,
            vec![
                state(&policy, LifePhase::Exit, 101, 1, 0),
                state(&policy, LifePhase::Pregnant, 101, 1, 1),
                state(&policy, LifePhase::Open, 101, 1, 0),
            ]
        );

        let terms = ProbabilityTerms::new(&policy, &from);
        let pregnant = model.probability(&from, &successors[1]).unwrap();
        let expected = (1.0 / 21.0) * 0.65 * 0.45 * (1.0 - DAILY_DEATH_PROBABILITY);
        assert!((pregnant - expected).abs() < 1e-15);
        assert_eq!(terms.pregnancy, (1.0 / 21.0) * 0.65 * 0.45);
        assert!((row_sum(&model, &from) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn open_past_cutoff_moves_to_do_not_breed() {
        let policy = HerdPolicy::default();
        let model = TransitionModel::new(&policy, limits(1000, 3));
        let cutoff = policy.insemination_cutoff(1);
        let phases = |from: &CowState| -> Vec<LifePhase> {
            model
                .possible_new_states(from)
                .unwrap()
                .iter()
                .map(|s| s.life_phase())
                .collect()
        };

        let last_day = state(&policy, LifePhase::Open, cutoff, 1, 0);
        assert_eq!(
            phases(&last_day),
            vec![LifePhase::Exit, LifePhase::Pregnant, LifePhase::Open]
        );
        assert!((row_sum(&model, &last_day) - 1.0).abs() < 1e-12);

        let past = state(&policy, LifePhase::Open, cutoff + 1, 1, 0);
        assert_eq!(phases(&past), vec![LifePhase::Exit, LifePhase::DoNotBreed]);
        assert!((row_sum(&model, &past) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn open_inseminated_through_last_window_day() {
        let policy = HerdPolicy::default();
        let model = TransitionModel::new(&policy, limits(1000, 3));
        let last_day = policy.voluntary_waiting_period(1) + policy.insemination_window(1);
        let from = state(&policy, LifePhase::Open, last_day, 1, 0);
        assert_eq!(
            model.possible_new_states(&from).unwrap(),
            vec![
                state(&policy, LifePhase::Exit, last_day + 1, 1, 0),
                state(&policy, LifePhase::Pregnant, last_day + 1, 1, 1),
                state(&policy, LifePhase::Open, last_day + 1, 1, 0),
            ]
        );
    }

    #[test]
    fn low_yield_calving_in_last_lactation_only_exits() {
        let policy = HerdPolicy {
            milk_threshold: 60.0,
            ..HerdPolicy::default()
        };
        let model = TransitionModel::new(&policy, limits(1000, 1));
        let from = state(&policy, LifePhase::Pregnant, 300, 1, 280);
        assert_eq!(
            model.possible_new_states(&from).unwrap(),
            vec![state(&policy, LifePhase::Exit, 301, 1, 0)]
        );

        // A heifer calving in the last lactation continues whatever her yield.
        let model = TransitionModel::new(&policy, limits(1000, 0));
        let heifer = state(&policy, LifePhase::Pregnant, 700, 0, 279);
        assert_eq!(
            model.possible_new_states(&heifer).unwrap(),
            vec![
                state(&policy, LifePhase::Exit, 701, 0, 0),
                state(&policy, LifePhase::DoNotBreed, 701, 1, 0),
            ]
        );
    }

    #[test]
    fn calving_starts_next_lactation() {
        let policy = HerdPolicy::default();
        let model = TransitionModel::new(&policy, limits(1000, 3));
        let from = state(&policy, LifePhase::Pregnant, 300, 1, 280);
        let calf = state(&policy, LifePhase::Open, 0, 2, 0);
        let successors = model.possible_new_states(&from).unwrap();
        assert_eq!(successors.len(), 2);
        assert_eq!(successors[1], calf);
        assert!((model.probability(&from, &calf).unwrap() - (1.0 - DAILY_DEATH_PROBABILITY)).abs() < 1e-15);
        assert!((row_sum(&model, &from) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn calving_in_last_lactation_continues_as_do_not_breed() {
        let policy = HerdPolicy::default();
        let model = TransitionModel::new(&policy, limits(1000, 1));
        let from = state(&policy, LifePhase::Pregnant, 300, 1, 280);
        let successors = model.possible_new_states(&from).unwrap();
        assert_eq!(
            successors[1],
            state(&policy, LifePhase::DoNotBreed, 301, 2, 0)
        );
    }

    #[test]
    fn abortion_returns_cow_to_open() {
        let policy = HerdPolicy::default();
        let model = TransitionModel::new(&policy, limits(1000, 3));
        let from = state(&policy, LifePhase::Pregnant, 120, 1, 40);
        let open = state(&policy, LifePhase::Open, 121, 1, 0);
        let pregnant = state(&policy, LifePhase::Pregnant, 121, 1, 41);
        let not_death = 1.0 - DAILY_DEATH_PROBABILITY;
        assert!((model.probability(&from, &open).unwrap() - 0.125 / 15.0 * not_death).abs() < 1e-15);
        assert!((model.probability(&from, &pregnant).unwrap() - (1.0 - 0.125 / 15.0) * not_death).abs() < 1e-15);
        assert!((row_sum(&model, &from) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn low_yield_only_exits() {
        let policy = HerdPolicy {
            milk_threshold: 40.0,
            ..HerdPolicy::default()
        };
        let model = TransitionModel::new(&policy, limits(1000, 3));
        let from = state(&policy, LifePhase::DoNotBreed, 400, 1, 0);
        let successors = model.possible_new_states(&from).unwrap();
        assert_eq!(successors, vec![state(&policy, LifePhase::Exit, 401, 1, 0)]);
        assert_eq!(model.probability(&from, &successors[0]).unwrap(), 1.0);
    }

    #[test]
    fn last_day_only_exits() {
        let policy = HerdPolicy::default();
        let model = TransitionModel::new(&policy, limits(400, 3));
        let from = state(&policy, LifePhase::DoNotBreed, 399, 2, 0);
        assert_eq!(
            model.possible_new_states(&from).unwrap(),
            vec![state(&policy, LifePhase::Exit, 400, 2, 0)]
        );
    }

    #[test]
    fn exit_policy_decides_what_follows_exit() {
        let mut policy = HerdPolicy::default();
        let from = state(&policy, LifePhase::Exit, 250, 3, 0);
        let replaced = TransitionModel::new(&policy, limits(1000, 3))
            .possible_new_states(&from)
            .unwrap();
        assert_eq!(replaced, vec![state(&policy, LifePhase::Open, 0, 0, 0)]);

        policy.exit = ExitPolicy::Absorb;
        let model = TransitionModel::new(&policy, limits(1000, 3));
        assert_eq!(model.possible_new_states(&from).unwrap(), vec![from]);
        assert_eq!(model.probability(&from, &from).unwrap(), 1.0);
    }

    #[test]
    fn unreachable_state_has_zero_probability() {
        let policy = HerdPolicy::default();
        let model = TransitionModel::new(&policy, limits(1000, 3));
        let from = state(&policy, LifePhase::Open, 100, 1, 0);
        let far = state(&policy, LifePhase::Open, 150, 1, 0);
        assert_eq!(model.probability(&from, &far).unwrap(), 0.0);
    }

    #[test]
    fn rows_are_stochastic_over_generated_space() {
        let policy = HerdPolicy::default();
        let space = generate_total_states(&policy, 400, 2).unwrap();
        let model = TransitionModel::new(&policy, space.limits());
        for from in space.states() {
            let successors = model.possible_new_states(from).unwrap();
            let sum = if successors.len() == 1 {
                1.0
            } else {
                row_sum(&model, from)
            };
            assert!((sum - 1.0).abs() < 1e-9, "row {from:?} sums to {sum}");
        }
    }
}
