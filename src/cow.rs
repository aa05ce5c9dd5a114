//! A single cow: its current state, traits and generated chain.

use crate::biology::{Diet, Memo, MilkBot, body_weight, day_state, dry_matter_intake, nitrogen_emission};
use crate::edges::{Edges, generate_edges};
use crate::error::{ModelError, ModelResult};
use crate::policy::HerdPolicy;
use crate::space::{StateSpace, generate_total_states};
use crate::state::{CowState, LifePhase};
use crate::transition::TransitionModel;
use std::sync::Arc;

const MEMO_CAPACITY: usize = 1 << 16;

/// Per-cow traits that are not part of the day-state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CowTraits {
    /// Age in days.
    pub age: u32,
    pub diet: Diet,
    pub age_at_first_heat: Option<u32>,
}

#[derive(Debug)]
pub struct Cow {
    policy: Arc<HerdPolicy>,
    state: CowState,
    traits: CowTraits,
    total_states: Option<StateSpace>,
    milkbot: MilkBot,
    body_weights: Memo<(CowState, u32), f64>,
}

impl Cow {
    /// Create a cow whose milk output follows from the policy.
    pub fn new(
        policy: Arc<HerdPolicy>,
        life_phase: LifePhase,
        days_in_milk: u32,
        lactation_number: u32,
        days_pregnant: u32,
        traits: CowTraits,
    ) -> ModelResult<Self> {
        policy.validate()?;
        let state = day_state(&policy, life_phase, days_in_milk, lactation_number, days_pregnant)?;
        Ok(Self {
            policy,
            state,
            traits,
            total_states: None,
            milkbot: MilkBot::for_lactation(lactation_number),
            body_weights: Memo::new(MEMO_CAPACITY),
        })
    }

    pub fn policy(&self) -> &HerdPolicy {
        &self.policy
    }

    pub fn current_state(&self) -> &CowState {
        &self.state
    }

    pub fn age(&self) -> u32 {
        self.traits.age
    }

    pub fn diet(&self) -> &Diet {
        &self.traits.diet
    }

    pub fn age_at_first_heat(&self) -> Option<u32> {
        self.traits.age_at_first_heat
    }

    /// MilkBot coefficients of the current lactation.
    pub fn milkbot(&self) -> MilkBot {
        self.milkbot
    }

    pub fn set_age(&mut self, age: u32) {
        self.traits.age = age;
    }

    pub fn set_diet(&mut self, diet: Diet) {
        self.traits.diet = diet;
    }

    pub(crate) fn set_age_at_first_heat(&mut self, age_at_first_heat: Option<u32>) {
        self.traits.age_at_first_heat = age_at_first_heat;
    }

    pub fn set_life_phase(&mut self, life_phase: LifePhase) -> ModelResult<()> {
        let days_pregnant = match life_phase {
            LifePhase::Pregnant => self.state.days_pregnant().max(1),
            _ => 0,
        };
        self.rebuild_state(
            life_phase,
            self.state.days_in_milk(),
            self.state.lactation_number(),
            days_pregnant,
        )
    }

    pub fn set_days_in_milk(&mut self, days_in_milk: u32) -> ModelResult<()> {
        self.rebuild_state(
            self.state.life_phase(),
            days_in_milk,
            self.state.lactation_number(),
            self.state.days_pregnant(),
        )
    }

    pub fn set_lactation_number(&mut self, lactation_number: u32) -> ModelResult<()> {
        self.rebuild_state(
            self.state.life_phase(),
            self.state.days_in_milk(),
            lactation_number,
            self.state.days_pregnant(),
        )
    }

    pub fn set_days_pregnant(&mut self, days_pregnant: u32) -> ModelResult<()> {
        self.rebuild_state(
            self.state.life_phase(),
            self.state.days_in_milk(),
            self.state.lactation_number(),
            days_pregnant,
        )
    }

    fn rebuild_state(
        &mut self,
        life_phase: LifePhase,
        days_in_milk: u32,
        lactation_number: u32,
        days_pregnant: u32,
    ) -> ModelResult<()> {
        self.state = day_state(
            &self.policy,
            life_phase,
            days_in_milk,
            lactation_number,
            days_pregnant,
        )?;
        self.milkbot = MilkBot::for_lactation(lactation_number);
        Ok(())
    }

    /// Enumerate the cow's state space, defaulting the limits to the policy's.
    pub fn generate_total_states(
        &mut self,
        days_in_milk_limit: Option<u32>,
        lactation_number_limit: Option<u32>,
    ) -> ModelResult<&StateSpace> {
        let space = generate_total_states(
            &self.policy,
            days_in_milk_limit.unwrap_or(self.policy.days_in_milk_limit()),
            lactation_number_limit.unwrap_or(self.policy.lactation_number_limit()),
        )?;
        if !space.contains(&self.state) {
            log::warn!("current state {:?} is not in the generated state space", self.state);
        }
        Ok(self.total_states.insert(space))
    }

    pub fn total_states(&self) -> ModelResult<&StateSpace> {
        self.total_states.as_ref().ok_or(ModelError::StatesNotGenerated)
    }

    pub fn transition_model(&self) -> ModelResult<TransitionModel<'_>> {
        Ok(TransitionModel::new(&self.policy, self.total_states()?.limits()))
    }

    pub fn generate_edges(&self) -> ModelResult<Edges<'_>> {
        Ok(generate_edges(&self.policy, self.total_states()?))
    }

    pub fn node_count(&self) -> ModelResult<usize> {
        Ok(self.total_states()?.len())
    }

    /// Total number of successors over all states.
    pub fn edge_count(&self) -> ModelResult<usize> {
        let model = self.transition_model()?;
        self.total_states()?
            .states()
            .iter()
            .try_fold(0, |count, state| {
                Ok(count + model.possible_new_states(state)?.len())
            })
    }

    /// One-hot distribution on the current state.
    pub fn initial_state_vector(&self) -> ModelResult<Vec<f64>> {
        let space = self.total_states()?;
        let index = space
            .index_of(&self.state)
            .ok_or_else(|| ModelError::StateNotFound {
                state: format!("{:?}", self.state),
            })?;
        let mut vector = vec![0.0; space.len()];
        vector[index] = 1.0;
        Ok(vector)
    }

    /// Expected daily milk yield under a distribution over the state space.
    pub fn expected_milk(&self, vector: &[f64]) -> ModelResult<f64> {
        let space = self.checked_space(vector)?;
        Ok(space
            .states()
            .iter()
            .zip(vector)
            .map(|(state, p)| p * state.milk_output())
            .sum())
    }

    /// Expected daily nitrogen emission in g, `step` days after the current day.
    pub fn expected_nitrogen(&mut self, vector: &[f64], step: u32) -> ModelResult<f64> {
        self.checked_space(vector)?;
        let Some(space) = self.total_states.as_ref() else {
            return Err(ModelError::StatesNotGenerated);
        };

        let mut expected = 0.0;
        for (state, &p) in space.states().iter().zip(vector) {
            if p == 0.0 || state.life_phase() == LifePhase::Exit {
                continue;
            }
            let age = if state.is_heifer() {
                state.days_in_milk()
            } else {
                self.traits.age + step
            };
            let policy = &self.policy;
            let weight = self.body_weights.get_or_insert_with((*state, age), || {
                body_weight(state, age, policy.voluntary_waiting_period(state.lactation_number()))
            });
            let dmi = dry_matter_intake(state, weight);
            expected += p * nitrogen_emission(state, policy, &self.traits.diet, dmi);
        }
        Ok(expected)
    }

    fn checked_space(&self, vector: &[f64]) -> ModelResult<&StateSpace> {
        let space = self.total_states()?;
        if vector.len() != space.len() {
            return Err(ModelError::VectorLength {
                expected: space.len(),
                actual: vector.len(),
            });
        }
        Ok(space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_lactation_cow() -> Cow {
        Cow::new(
            Arc::new(HerdPolicy::default()),
            LifePhase::Open,
            0,
            1,
            0,
            CowTraits {
                age: 800,
                ..CowTraits::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn queries_before_generation_fail() {
        let cow = first_lactation_cow();
        assert!(matches!(cow.node_count(), Err(ModelError::StatesNotGenerated)));
        assert!(matches!(
            cow.initial_state_vector(),
            Err(ModelError::StatesNotGenerated)
        ));
        assert!(cow.generate_edges().is_err());
    }

    #[test]
    fn short_days_in_milk_limit_is_rejected() {
        let mut cow = first_lactation_cow();
        assert!(matches!(
            cow.generate_total_states(Some(0), Some(1)),
            Err(ModelError::InvalidPolicy { .. })
        ));
        assert!(matches!(cow.node_count(), Err(ModelError::StatesNotGenerated)));
    }

    #[test]
    fn current_state_carries_model_milk() {
        let cow = first_lactation_cow();
        let expected = MilkBot::for_lactation(1).curve(0.0);
        assert_eq!(cow.current_state().milk_output(), expected);
    }

    #[test]
    fn initial_vector_is_one_hot_on_current_state() {
        let mut cow = first_lactation_cow();
        cow.generate_total_states(Some(300), Some(1)).unwrap();
        let vector = cow.initial_state_vector().unwrap();
        assert_eq!(vector.len(), cow.node_count().unwrap());
        assert_eq!(vector.iter().sum::<f64>(), 1.0);

        let index = vector.iter().position(|&p| p == 1.0).unwrap();
        assert_eq!(
            &cow.total_states().unwrap().states()[index],
            cow.current_state()
        );
        assert_eq!(
            cow.expected_milk(&vector).unwrap(),
            cow.current_state().milk_output()
        );
    }

    #[test]
    fn edge_count_matches_stream() {
        let mut cow = first_lactation_cow();
        cow.generate_total_states(Some(300), Some(1)).unwrap();
        let streamed = cow.generate_edges().unwrap().count();
        assert_eq!(cow.edge_count().unwrap(), streamed);
        assert!(streamed > cow.node_count().unwrap());
    }

    #[test]
    fn setters_go_through_validation() {
        let mut cow = first_lactation_cow();
        assert!(cow.set_days_pregnant(5).is_err());
        cow.set_life_phase(LifePhase::Pregnant).unwrap();
        assert_eq!(cow.current_state().days_pregnant(), 1);
        cow.set_days_in_milk(90).unwrap();
        cow.set_days_pregnant(30).unwrap();
        assert_eq!(cow.current_state().days_pregnant(), 30);
        cow.set_life_phase(LifePhase::DoNotBreed).unwrap();
        assert_eq!(cow.current_state().days_pregnant(), 0);
        cow.set_lactation_number(3).unwrap();
        assert_eq!(cow.milkbot(), MilkBot::for_lactation(3));
        assert_eq!(
            cow.current_state().milk_output(),
            MilkBot::for_lactation(3).curve(90.0)
        );
    }

    #[test]
    fn vectors_must_match_state_count() {
        let mut cow = first_lactation_cow();
        cow.generate_total_states(Some(300), Some(1)).unwrap();
        let err = cow.expected_milk(&[1.0]).unwrap_err();
        assert!(matches!(err, ModelError::VectorLength { actual: 1, .. }));
        assert!(cow.expected_nitrogen(&[1.0], 0).is_err());
    }

    #[test]
    fn expected_nitrogen_of_current_state() {
        let mut cow = first_lactation_cow();
        cow.generate_total_states(Some(300), Some(1)).unwrap();
        let vector = cow.initial_state_vector().unwrap();
        let nitrogen = cow.expected_nitrogen(&vector, 0).unwrap();
        assert!(nitrogen > 0.0);
        // Memoized body weights give the same answer.
        assert_eq!(cow.expected_nitrogen(&vector, 0).unwrap(), nitrogen);
    }
}
