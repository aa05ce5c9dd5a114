//! Herd-wide breeding and culling policy.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};

/// What happens to a cow after she leaves the herd.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    /// Exit is followed by a replacement heifer at `Open(0, 0)`.
    #[default]
    Replace,
    /// Exit is absorbing and loops onto itself.
    Absorb,
}

/// Policy parameters shared by every cow in a herd.
///
/// Lactation-indexed lists hold values for lactation 0, 1 and 2+. The dry
/// period list has two entries: the first is used for lactation 0, the
/// second for every later lactation. Lookups clamp the lactation number to
/// the last entry.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HerdPolicy {
    /// Prior mean age at first heat in days.
    pub mu_age_at_first_heat: f64,
    /// Standard deviation of the age at first heat in days.
    pub sigma_age_at_first_heat: f64,

    /// Days after calving (or birth) before a cow may be inseminated.
    pub voluntary_waiting_period: Vec<u32>,
    /// Days after the voluntary waiting period during which inseminations continue.
    pub insemination_window: Vec<u32>,
    /// Gestation length in days.
    pub days_pregnant_limit: Vec<u32>,
    /// Days before calving during which a cow is not milked.
    pub duration_dry: Vec<u32>,

    /// Daily milk yield in kg below which a lactating cow is culled.
    pub milk_threshold: f64,
    /// Days in milk after which a cow is forced out.
    pub days_in_milk_limit: u32,
    /// Lactation number after which a cow is forced out.
    pub lactation_number_limit: u32,

    pub exit: ExitPolicy,
}

impl Default for HerdPolicy {
    fn default() -> Self {
        Self {
            mu_age_at_first_heat: 365.0,
            sigma_age_at_first_heat: 0.0,
            voluntary_waiting_period: vec![365, 80, 60],
            insemination_window: vec![100, 100, 100],
            days_pregnant_limit: vec![279, 280, 282],
            duration_dry: vec![60, 60],
            milk_threshold: 10.0,
            days_in_milk_limit: 1000,
            lactation_number_limit: 9,
            exit: ExitPolicy::Replace,
        }
    }
}

impl HerdPolicy {
    /// Check that every lookup the model performs is well defined.
    pub fn validate(&self) -> ModelResult<()> {
        check_tiers("voluntary waiting period", &self.voluntary_waiting_period, 3)?;
        check_tiers("insemination window", &self.insemination_window, 3)?;
        check_tiers("days pregnant limit", &self.days_pregnant_limit, 3)?;
        check_tiers("duration dry", &self.duration_dry, 2)?;

        if self.insemination_window.iter().any(|&window| window == 0) {
            return Err(invalid("insemination window must be at least 1 day"));
        }
        if self.days_pregnant_limit.iter().any(|&limit| limit == 0) {
            return Err(invalid("days pregnant limit must be at least 1 day"));
        }
        for ln in 0..3 {
            if self.duration_dry(ln) >= self.days_pregnant_limit(ln) {
                return Err(invalid("duration dry must be shorter than gestation"));
            }
        }
        if !self.milk_threshold.is_finite() || self.milk_threshold < 0.0 {
            return Err(invalid("milk threshold must be a non-negative number"));
        }
        if self.days_in_milk_limit < 2 {
            return Err(invalid("days in milk limit must be at least 2"));
        }
        if !self.mu_age_at_first_heat.is_finite() || self.mu_age_at_first_heat < 0.0 {
            return Err(invalid("mean age at first heat must be a non-negative number"));
        }
        if !self.sigma_age_at_first_heat.is_finite() || self.sigma_age_at_first_heat < 0.0 {
            return Err(invalid("age at first heat deviation must be a non-negative number"));
        }
        Ok(())
    }

    pub fn voluntary_waiting_period(&self, lactation_number: u32) -> u32 {
        tier(&self.voluntary_waiting_period, lactation_number)
    }

    pub fn insemination_window(&self, lactation_number: u32) -> u32 {
        tier(&self.insemination_window, lactation_number)
    }

    /// Last day in milk on which an open cow can still be inseminated.
    pub fn insemination_cutoff(&self, lactation_number: u32) -> u32 {
        self.voluntary_waiting_period(lactation_number) + self.insemination_window(lactation_number)
    }

    pub fn days_pregnant_limit(&self, lactation_number: u32) -> u32 {
        tier(&self.days_pregnant_limit, lactation_number)
    }

    pub fn duration_dry(&self, lactation_number: u32) -> u32 {
        tier(&self.duration_dry, lactation_number)
    }

    /// Days pregnant from which the cow is dried off.
    pub fn dry_off_day(&self, lactation_number: u32) -> u32 {
        self.days_pregnant_limit(lactation_number)
            .saturating_sub(self.duration_dry(lactation_number))
    }

    pub fn milk_threshold(&self) -> f64 {
        self.milk_threshold
    }

    pub fn days_in_milk_limit(&self) -> u32 {
        self.days_in_milk_limit
    }

    pub fn lactation_number_limit(&self) -> u32 {
        self.lactation_number_limit
    }

    pub fn exit_policy(&self) -> ExitPolicy {
        self.exit
    }
}

fn tier(values: &[u32], lactation_number: u32) -> u32 {
    let last = values.len().saturating_sub(1);
    values
        .get((lactation_number as usize).min(last))
        .copied()
        .unwrap_or_default()
}

fn check_tiers(name: &str, values: &[u32], min_len: usize) -> ModelResult<()> {
    if values.len() < min_len {
        return Err(invalid(&format!(
            "{name} must have at least {min_len} entries, but has {}",
            values.len()
        )));
    }
    Ok(())
}

fn invalid(message: &str) -> ModelError {
    ModelError::InvalidPolicy {
        message: message.to_string(),
    }
}
