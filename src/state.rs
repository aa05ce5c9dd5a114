//! Day-states of a cow.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

/// Life phase of a cow on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LifePhase {
    /// Not pregnant and still eligible for insemination.
    Open,
    /// Carrying a calf.
    Pregnant,
    /// Past the insemination window; will not be bred again this lactation.
    DoNotBreed,
    /// Culled or dead.
    Exit,
}

impl LifePhase {
    /// All phases in the order the generator visits them each day.
    pub const ALL: [LifePhase; 4] = [
        LifePhase::Open,
        LifePhase::Pregnant,
        LifePhase::DoNotBreed,
        LifePhase::Exit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LifePhase::Open => "Open",
            LifePhase::Pregnant => "Pregnant",
            LifePhase::DoNotBreed => "DoNotBreed",
            LifePhase::Exit => "Exit",
        }
    }
}

impl fmt::Display for LifePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifePhase {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        LifePhase::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownLifePhase(s.to_string()))
    }
}

impl TryFrom<String> for LifePhase {
    type Error = ModelError;

    fn try_from(value: String) -> ModelResult<Self> {
        value.parse()
    }
}

impl From<LifePhase> for String {
    fn from(phase: LifePhase) -> Self {
        phase.as_str().to_string()
    }
}

/// One day-state of a cow.
///
/// Fields are private so that every value goes through [`CowState::new`],
/// which enforces `days_pregnant > 0` exactly when the phase is
/// [`LifePhase::Pregnant`]. Equality and hashing are structural, with the
/// milk output compared bit for bit.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CowState {
    life_phase: LifePhase,
    days_in_milk: u32,
    lactation_number: u32,
    days_pregnant: u32,
    milk_output: f64,
}

impl CowState {
    pub fn new(
        life_phase: LifePhase,
        days_in_milk: u32,
        lactation_number: u32,
        days_pregnant: u32,
        milk_output: f64,
    ) -> ModelResult<Self> {
        if (days_pregnant > 0) != (life_phase == LifePhase::Pregnant) {
            return Err(ModelError::InvalidState {
                life_phase,
                days_pregnant,
            });
        }
        if !milk_output.is_finite() || milk_output < 0.0 {
            return Err(ModelError::InvalidMilkOutput { milk_output });
        }
        Ok(Self {
            life_phase,
            days_in_milk,
            lactation_number,
            days_pregnant,
            milk_output,
        })
    }

    pub fn life_phase(&self) -> LifePhase {
        self.life_phase
    }

    pub fn days_in_milk(&self) -> u32 {
        self.days_in_milk
    }

    pub fn lactation_number(&self) -> u32 {
        self.lactation_number
    }

    pub fn days_pregnant(&self) -> u32 {
        self.days_pregnant
    }

    pub fn milk_output(&self) -> f64 {
        self.milk_output
    }

    pub fn is_heifer(&self) -> bool {
        self.lactation_number == 0
    }

    /// Copy of this state with a different life phase and days pregnant.
    pub fn with_phase(&self, life_phase: LifePhase, days_pregnant: u32) -> ModelResult<Self> {
        Self::new(
            life_phase,
            self.days_in_milk,
            self.lactation_number,
            days_pregnant,
            self.milk_output,
        )
    }

    /// Copy of this state with a different days in milk.
    pub fn with_days_in_milk(&self, days_in_milk: u32) -> ModelResult<Self> {
        Self::new(
            self.life_phase,
            days_in_milk,
            self.lactation_number,
            self.days_pregnant,
            self.milk_output,
        )
    }

    /// Copy of this state with a different lactation number.
    pub fn with_lactation_number(&self, lactation_number: u32) -> ModelResult<Self> {
        Self::new(
            self.life_phase,
            self.days_in_milk,
            lactation_number,
            self.days_pregnant,
            self.milk_output,
        )
    }

    /// Copy of this state with a different milk output.
    pub fn with_milk_output(&self, milk_output: f64) -> ModelResult<Self> {
        Self::new(
            self.life_phase,
            self.days_in_milk,
            self.lactation_number,
            self.days_pregnant,
            milk_output,
        )
    }
}

impl PartialEq for CowState {
    fn eq(&self, other: &Self) -> bool {
        self.life_phase == other.life_phase
            && self.days_in_milk == other.days_in_milk
            && self.lactation_number == other.lactation_number
            && self.days_pregnant == other.days_pregnant
            && self.milk_output.to_bits() == other.milk_output.to_bits()
    }
}

impl Eq for CowState {}

impl Hash for CowState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.life_phase.hash(state);
        self.days_in_milk.hash(state);
        self.lactation_number.hash(state);
        self.days_pregnant.hash(state);
        self.milk_output.to_bits().hash(state);
    }
}
