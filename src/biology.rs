//! Biological sub-models: milk yield, body weight, intake and excretion.
//!
//! Every function here is pure in its arguments, so the generator and the
//! transition model always agree on the value computed for a given state.

use crate::error::ModelResult;
use crate::policy::HerdPolicy;
use crate::state::{CowState, LifePhase};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, hash::Hash};

/// Coefficients of the MilkBot lactation curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MilkBot {
    pub scale: f64,
    pub ramp: f64,
    pub offset: f64,
    pub decay: f64,
}

impl MilkBot {
    /// Coefficients for a lactation tier: heifers, first lactation, later lactations.
    pub fn for_lactation(lactation_number: u32) -> Self {
        match lactation_number {
            0 => Self {
                scale: 0.0,
                ramp: 1.0,
                offset: 1.0,
                decay: 1.0,
            },
            1 => Self {
                scale: 34.8,
                ramp: 29.6,
                offset: 0.0,
                decay: 0.693 / 358.0,
            },
            _ => Self {
                scale: 47.7,
                ramp: 22.1,
                offset: 0.0,
                decay: 0.693 / 240.0,
            },
        }
    }

    /// Raw curve value at a (possibly fractional) day in milk.
    pub fn curve(&self, days_in_milk: f64) -> f64 {
        self.scale
            * (1.0 - ((self.offset - days_in_milk) / self.ramp).exp() / 2.0)
            * (-self.decay * days_in_milk).exp()
    }
}

/// Daily milk yield in kg.
///
/// Zero for heifers, for exited cows and from the dry-off day of a pregnancy on.
pub fn milk_production(
    milkbot: &MilkBot,
    life_phase: LifePhase,
    days_in_milk: u32,
    lactation_number: u32,
    days_pregnant: u32,
    dry_off_day: u32,
) -> f64 {
    if lactation_number == 0 || life_phase == LifePhase::Exit || days_pregnant >= dry_off_day {
        return 0.0;
    }
    milkbot.curve(days_in_milk as f64)
}

/// Build a state whose milk output is derived from the policy.
pub fn day_state(
    policy: &HerdPolicy,
    life_phase: LifePhase,
    days_in_milk: u32,
    lactation_number: u32,
    days_pregnant: u32,
) -> ModelResult<CowState> {
    let milk_output = milk_production(
        &MilkBot::for_lactation(lactation_number),
        life_phase,
        days_in_milk,
        lactation_number,
        days_pregnant,
        policy.dry_off_day(lactation_number),
    );
    CowState::new(
        life_phase,
        days_in_milk,
        lactation_number,
        days_pregnant,
        milk_output,
    )
}

/// Parameters of the Korver growth and pregnancy curve (De Vries, 2006).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Korver {
    pub mature_live_weight: f64,
    pub growth_rate: f64,
    pub pregnancy_parameter: f64,
    pub max_decrease_live_weight: f64,
    pub duration_minimum_live_weight: f64,
}

pub const BIRTH_WEIGHT: f64 = 42.0;

const HEIFER_MAX_WEIGHT: f64 = 1270.0;

impl Korver {
    /// Curve parameters for a lactating tier; heifers follow a linear curve instead.
    pub fn for_lactation(lactation_number: u32) -> Option<Self> {
        match lactation_number {
            0 => None,
            1 => Some(Self {
                mature_live_weight: 550.0,
                growth_rate: 0.0039,
                pregnancy_parameter: 0.0187,
                max_decrease_live_weight: 20.0,
                duration_minimum_live_weight: 65.0,
            }),
            _ => Some(Self {
                mature_live_weight: 640.0,
                growth_rate: 0.006,
                pregnancy_parameter: 0.0187,
                max_decrease_live_weight: 40.0,
                duration_minimum_live_weight: 70.0,
            }),
        }
    }
}

/// Body weight in kg of a cow of `age` days in `state`.
pub fn body_weight(state: &CowState, age: u32, voluntary_waiting_period: u32) -> f64 {
    let dim = state.days_in_milk() as f64;
    let Some(korver) = Korver::for_lactation(state.lactation_number()) else {
        return (27.2 + 0.822 * dim).max(BIRTH_WEIGHT).min(HEIFER_MAX_WEIGHT);
    };

    // Days after conception minus 50, with conception assumed at the end of the waiting period.
    let dpc = (dim - voluntary_waiting_period as f64 - 50.0).max(0.0);
    let growth = korver.mature_live_weight
        * (1.0
            - (1.0 - (BIRTH_WEIGHT / korver.mature_live_weight).cbrt())
                * (-korver.growth_rate * age as f64).exp())
        .powi(3);
    let lactation = korver.max_decrease_live_weight
        * (dim / korver.duration_minimum_live_weight)
        * (1.0 - dim / korver.duration_minimum_live_weight).exp();
    let pregnancy = korver.pregnancy_parameter.powi(3) * dpc.powi(3);
    growth + lactation + pregnancy
}

/// Dry matter intake in kg (Giordano et al., 2012).
pub fn dry_matter_intake(state: &CowState, body_weight: f64) -> f64 {
    let fcm = state.milk_output() * 0.04;
    let ramp_up = 1.0 - (-0.192 * (state.days_in_milk() as f64 / 7.0 + 3.67)).exp();
    (0.372 * fcm + 0.0968 * body_weight.powf(0.75)) * ramp_up
}

/// Feeding phase that decides the crude protein content of the ration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DietPhase {
    /// Second half of the dry period; also fed to heifers younger than half their waiting period.
    CloseUp,
    /// First half of the dry period; also fed to older heifers.
    FarOff,
    /// First 100 days in milk.
    EarlyLactation,
    /// From day 100 in milk until dry-off.
    LateLactation,
}

impl DietPhase {
    pub fn of(state: &CowState, policy: &HerdPolicy) -> Self {
        let ln = state.lactation_number();
        let dim = state.days_in_milk() as f64;
        let dp = state.days_pregnant() as f64;
        let gestation = policy.days_pregnant_limit(ln) as f64;
        let dry = policy.duration_dry(ln) as f64;
        let close_up = dry / 2.0;
        let half_vwp = policy.voluntary_waiting_period(ln) as f64 / 2.0;

        if dp >= gestation - close_up {
            DietPhase::CloseUp
        } else if ln == 0 {
            if dim < half_vwp {
                DietPhase::CloseUp
            } else {
                DietPhase::FarOff
            }
        } else if dim < 100.0 {
            DietPhase::EarlyLactation
        } else if dp >= gestation - dry {
            DietPhase::FarOff
        } else {
            DietPhase::LateLactation
        }
    }
}

/// Crude protein concentrations of the rations and the milk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diet {
    /// Close-up ration crude protein in g/kg.
    pub cp_close_up: f64,
    /// Far-off ration crude protein in g/kg.
    pub cp_far_off: f64,
    /// Milk crude protein in %.
    pub milk_cp: f64,
}

impl Default for Diet {
    fn default() -> Self {
        Self {
            cp_close_up: 160.0,
            cp_far_off: 140.0,
            milk_cp: 3.4,
        }
    }
}

impl Diet {
    /// Crude protein fraction of the dry matter fed in `phase`.
    pub fn crude_protein(&self, phase: DietPhase) -> f64 {
        match phase {
            DietPhase::CloseUp | DietPhase::EarlyLactation => self.cp_close_up / 1000.0,
            DietPhase::FarOff => self.cp_far_off / 1000.0,
            DietPhase::LateLactation => (self.cp_close_up + self.cp_far_off) / 2.0 / 1000.0,
        }
    }
}

/// Mean and prediction bounds of a regression estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NitrogenRange {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

// Regressions below are from the NRC dairy nutrient requirements, 8th revised edition (2021).

/// Manure nitrogen in g/day of a lactating cow by mass balance.
pub fn manure_nitrogen_output(dmi: f64, diet_cp_percent: f64, milk_yield: f64, milk_cp: f64) -> f64 {
    dmi * diet_cp_percent / 0.625 - milk_yield * milk_cp / 0.638 - 5.0
}

/// Urine nitrogen in g/day from nitrogen intake.
pub fn urine_nitrogen_output(lactating: bool, nitrogen_intake: f64) -> NitrogenRange {
    if lactating {
        NitrogenRange {
            mean: 12.0 + 0.333 * nitrogen_intake,
            min: 6.2 + 0.322 * nitrogen_intake,
            max: 17.8 + 0.344 * nitrogen_intake,
        }
    } else {
        NitrogenRange {
            mean: 14.3 + 0.51 * nitrogen_intake,
            min: 11.12 + 0.39 * nitrogen_intake,
            max: 17.48 + 0.63 * nitrogen_intake,
        }
    }
}

/// Fecal nitrogen in g/day; lactating cows regress on DMI, dry cows on intake.
pub fn fecal_nitrogen_output(lactating: bool, dmi: f64, nitrogen_intake: f64) -> NitrogenRange {
    if lactating {
        NitrogenRange {
            mean: -18.5 + 10.1 * dmi,
            min: -22.09 + 9.931 * dmi,
            max: -14.91 + 10.269 * dmi,
        }
    } else {
        NitrogenRange {
            mean: 0.35 + 0.32 * nitrogen_intake,
            min: -1.38 + 0.3136 * nitrogen_intake,
            max: 2.08 + 0.3264 * nitrogen_intake,
        }
    }
}

/// Total manure (urine and feces) nitrogen in g/day.
pub fn total_manure_nitrogen_output(lactating: bool, nitrogen_intake: f64) -> NitrogenRange {
    if lactating {
        NitrogenRange {
            mean: 20.3 + 0.654 * nitrogen_intake,
            min: 15.58 + 0.645 * nitrogen_intake,
            max: 25.02 + 0.663 * nitrogen_intake,
        }
    } else {
        NitrogenRange {
            mean: 15.1 + 0.83 * nitrogen_intake,
            min: 12.6 + 0.812 * nitrogen_intake,
            max: 17.6 + 0.848 * nitrogen_intake,
        }
    }
}

/// Milk nitrogen in g/day from DMI.
pub fn milk_nitrogen_output(dmi: f64) -> NitrogenRange {
    NitrogenRange {
        mean: -19.0 + 8.13 * dmi,
        min: -22.21 + 7.885 * dmi,
        max: -15.79 + 8.375 * dmi,
    }
}

/// Fecal phosphorus in g/day from phosphorus intake and milk yield.
pub fn fecal_phosphorus_output(phosphorus_intake: f64, milk_yield: f64) -> NitrogenRange {
    NitrogenRange {
        mean: 0.73 * phosphorus_intake - 0.37 * milk_yield,
        min: 0.7 * phosphorus_intake - 0.29 * milk_yield,
        max: 0.76 * phosphorus_intake - 0.45 * milk_yield,
    }
}

/// Whether a state is milked.
pub fn is_lactating(state: &CowState, policy: &HerdPolicy) -> bool {
    !state.is_heifer() && state.days_pregnant() < policy.dry_off_day(state.lactation_number())
}

/// Daily nitrogen emission in g of a cow in `state`, given its body weight and DMI.
pub fn nitrogen_emission(state: &CowState, policy: &HerdPolicy, diet: &Diet, dmi: f64) -> f64 {
    if state.life_phase() == LifePhase::Exit {
        return 0.0;
    }
    let diet_cp = diet.crude_protein(DietPhase::of(state, policy));
    if is_lactating(state, policy) {
        manure_nitrogen_output(dmi, diet_cp * 100.0, state.milk_output(), diet.milk_cp)
    } else {
        let intake = dmi * diet_cp / 0.625;
        total_manure_nitrogen_output(false, intake).mean
    }
}

/// Bounded memo table for pure model functions.
///
/// When the table reaches its capacity it is cleared before the next insert.
#[derive(Debug)]
pub struct Memo<K, V> {
    map: HashMap<K, V>,
    capacity: usize,
}

impl<K: Eq + Hash, V: Copy> Memo<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, f: F) -> V {
        if let Some(&val) = self.map.get(&key) {
            return val;
        }
        if self.map.len() >= self.capacity {
            self.map.clear();
        }
        let val = f();
        self.map.insert(key, val);
        val
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
