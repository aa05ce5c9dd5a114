use anyhow::{Context, Result, bail};
use cowchain::{Diet, HerdPolicy, LifePhase};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Run configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Herd-wide policy; every field has a default.
    #[serde(default)]
    pub herd: HerdPolicy,
    /// Cow whose chain is generated.
    pub cow: CowConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CowConfig {
    pub life_phase: LifePhase,
    pub days_in_milk: u32,
    pub lactation_number: u32,
    #[serde(default)]
    pub days_pregnant: u32,
    /// Age in days.
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub age_at_first_heat: Option<u32>,
    #[serde(default)]
    pub diet: Diet,
}

#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Overrides the herd's days-in-milk limit.
    pub days_in_milk_limit: Option<u32>,
    /// Overrides the herd's lactation number limit.
    pub lactation_number_limit: Option<u32>,
    /// Seed for age-at-first-heat draws.
    pub seed: Option<u64>,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be a TOML document with `[herd]`, `[cow]` and
    /// `[generation]` tables; only `[cow]` is required.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn days_in_milk_limit(&self) -> u32 {
        self.generation
            .days_in_milk_limit
            .unwrap_or(self.herd.days_in_milk_limit)
    }

    pub fn lactation_number_limit(&self) -> u32 {
        self.generation
            .lactation_number_limit
            .unwrap_or(self.herd.lactation_number_limit)
    }

    fn validate(&self) -> Result<()> {
        let herd = &self.herd;
        check_num(herd.mu_age_at_first_heat, 0.0..2000.0)
            .context("invalid mean age at first heat")?;
        check_num(herd.sigma_age_at_first_heat, 0.0..365.0)
            .context("invalid age at first heat deviation")?;

        check_len(&herd.voluntary_waiting_period, 3)
            .context("invalid voluntary waiting periods")?;
        check_len(&herd.insemination_window, 3).context("invalid insemination windows")?;
        check_len(&herd.days_pregnant_limit, 3).context("invalid days pregnant limits")?;
        check_len(&herd.duration_dry, 2).context("invalid dry period durations")?;
        for &window in &herd.insemination_window {
            check_num(window, 1..1000).context("invalid insemination window")?;
        }
        for &limit in &herd.days_pregnant_limit {
            check_num(limit, 181..400).context("invalid days pregnant limit")?;
        }
        for ln in 0..3 {
            check_num(herd.duration_dry(ln), 0..herd.days_pregnant_limit(ln))
                .context("invalid dry period duration")?;
        }

        check_num(herd.milk_threshold, 0.0..100.0).context("invalid milk threshold")?;
        check_num(self.days_in_milk_limit(), 2..10_000).context("invalid days in milk limit")?;
        check_num(self.lactation_number_limit(), 0..30)
            .context("invalid lactation number limit")?;

        let cow = &self.cow;
        if (cow.days_pregnant > 0) != (cow.life_phase == LifePhase::Pregnant) {
            bail!("days pregnant must be positive exactly when the cow is pregnant");
        }
        check_num(cow.days_in_milk, 0..self.days_in_milk_limit())
            .context("invalid days in milk")?;
        check_num(cow.lactation_number, 0..=self.lactation_number_limit())
            .context("invalid lactation number")?;
        check_num(cow.diet.cp_close_up, 50.0..400.0)
            .context("invalid close-up crude protein")?;
        check_num(cow.diet.cp_far_off, 50.0..400.0).context("invalid far-off crude protein")?;
        check_num(cow.diet.milk_cp, 1.0..10.0).context("invalid milk crude protein")?;

        herd.validate().context("invalid herd policy")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_len(vec: &[u32], min_len: usize) -> Result<()> {
    let len = vec.len();
    if len < min_len {
        bail!("vector length must be at least {min_len}, but is {len}");
    }
    Ok(())
}
