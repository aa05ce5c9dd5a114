//! Herd: cows sharing one policy, plus the age-at-first-heat distribution.

use crate::cow::{Cow, CowTraits};
use crate::error::{ModelError, ModelResult};
use crate::policy::HerdPolicy;
use crate::state::LifePhase;
use crate::stats::Accumulator;
use rand::prelude::*;
use rand::rngs::OsRng;
use rand_chacha::ChaCha12Rng;
use rand_distr::Normal;
use std::sync::Arc;

/// Stable handle of a cow in a [`Herd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CowId(usize);

/// Arena of cows. Removed cows leave an empty slot so handles stay valid.
#[derive(Debug)]
pub struct Herd {
    policy: Arc<HerdPolicy>,
    slots: Vec<Option<Cow>>,
    n_cows: usize,
    ages_at_first_heat: Accumulator,
    rng: ChaCha12Rng,
}

impl Herd {
    /// Create an empty herd. Without a seed the generator is seeded by the OS.
    pub fn new(policy: HerdPolicy, seed: Option<u64>) -> ModelResult<Self> {
        policy.validate()?;
        let rng = match seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_rng(&mut OsRng)?,
        };
        Ok(Self {
            policy: Arc::new(policy),
            slots: Vec::new(),
            n_cows: 0,
            ages_at_first_heat: Accumulator::new(),
            rng,
        })
    }

    pub fn policy(&self) -> &Arc<HerdPolicy> {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.n_cows
    }

    pub fn is_empty(&self) -> bool {
        self.n_cows == 0
    }

    pub fn add_cow(
        &mut self,
        life_phase: LifePhase,
        days_in_milk: u32,
        lactation_number: u32,
        days_pregnant: u32,
        traits: CowTraits,
    ) -> ModelResult<CowId> {
        let cow = Cow::new(
            Arc::clone(&self.policy),
            life_phase,
            days_in_milk,
            lactation_number,
            days_pregnant,
            traits,
        )?;
        if let Some(age) = cow.age_at_first_heat() {
            self.ages_at_first_heat.add(age as f64);
        }
        let id = CowId(self.slots.len());
        self.slots.push(Some(cow));
        self.n_cows += 1;
        log::debug!("added cow {id:?}");
        Ok(id)
    }

    pub fn remove_cow(&mut self, id: CowId) -> ModelResult<Cow> {
        let cow = self
            .slots
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(ModelError::CowNotFound(id))?;
        if let Some(age) = cow.age_at_first_heat() {
            self.ages_at_first_heat.remove(age as f64);
        }
        self.n_cows -= 1;
        Ok(cow)
    }

    pub fn cow(&self, id: CowId) -> ModelResult<&Cow> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(ModelError::CowNotFound(id))
    }

    pub fn cow_mut(&mut self, id: CowId) -> ModelResult<&mut Cow> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ModelError::CowNotFound(id))
    }

    pub fn cows(&self) -> impl Iterator<Item = (CowId, &Cow)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|cow| (CowId(idx), cow)))
    }

    /// Mean age at first heat of the cows that have one, or the policy prior.
    pub fn mean_age_at_first_heat(&self) -> ModelResult<f64> {
        if self.is_empty() {
            return Err(ModelError::EmptyHerd);
        }
        Ok(self
            .ages_at_first_heat
            .mean()
            .unwrap_or(self.policy.mu_age_at_first_heat))
    }

    /// Draw an age at first heat in days around the current herd mean.
    pub fn generate_age_at_first_heat(&mut self) -> ModelResult<u32> {
        let mean = self.mean_age_at_first_heat()?;
        let dist = Normal::new(mean, self.policy.sigma_age_at_first_heat)?;
        let age = dist.sample(&mut self.rng).round().max(0.0);
        Ok(age as u32)
    }

    /// Give a cow an age at first heat if she has none, and return it.
    pub fn assign_age_at_first_heat(&mut self, id: CowId) -> ModelResult<u32> {
        if let Some(age) = self.cow(id)?.age_at_first_heat() {
            return Ok(age);
        }
        let age = self.generate_age_at_first_heat()?;
        self.cow_mut(id)?.set_age_at_first_heat(Some(age));
        self.ages_at_first_heat.add(age as f64);
        Ok(age)
    }
}
