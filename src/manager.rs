use crate::config::Config;
use anyhow::{Context, Result, bail};
use cowchain::{ChainReport, CowTraits, Herd};
use glob::glob;
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

/// Tolerance on row sums accepted by [`Manager::check_chain`].
const ROW_SUM_TOL: f64 = 1e-9;

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Generate the configured cow's chain and save its report.
    pub fn generate_chain(&self) -> Result<()> {
        let mut herd = Herd::new(self.cfg.herd.clone(), self.cfg.generation.seed)
            .context("failed to construct herd")?;

        let cow_cfg = &self.cfg.cow;
        let traits = CowTraits {
            age: cow_cfg.age,
            diet: cow_cfg.diet,
            age_at_first_heat: cow_cfg.age_at_first_heat,
        };
        let id = herd
            .add_cow(
                cow_cfg.life_phase,
                cow_cfg.days_in_milk,
                cow_cfg.lactation_number,
                cow_cfg.days_pregnant,
                traits,
            )
            .context("failed to add cow")?;
        if cow_cfg.lactation_number == 0 {
            let age = herd
                .assign_age_at_first_heat(id)
                .context("failed to assign age at first heat")?;
            log::info!("age at first heat: {age} days");
        }

        let cow = herd.cow_mut(id).context("failed to get cow")?;
        cow.generate_total_states(
            Some(self.cfg.days_in_milk_limit()),
            Some(self.cfg.lactation_number_limit()),
        )
        .context("failed to generate total states")?;

        let report = ChainReport::from_cow(cow).context("failed to build chain report")?;
        log::info!(
            "{} nodes, {} edges, max row deviation {:e}",
            report.node_count,
            report.edge_count,
            report.max_row_deviation
        );

        self.save_report(&report).context("failed to save report")?;

        Ok(())
    }

    /// Fail unless the saved report describes a stochastic matrix.
    pub fn check_chain(&self) -> Result<()> {
        let report = self.load_report().context("failed to load report")?;
        if !report.is_stochastic(ROW_SUM_TOL) {
            bail!(
                "row {:?} sums to 1 only within {:e} (tolerance: {ROW_SUM_TOL:e})",
                report.worst_row,
                report.max_row_deviation
            );
        }
        log::info!("all {} rows sum to 1", report.node_count);
        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let pattern = self.sim_dir.join("*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for entry in glob(pattern).context("failed to glob msgpack files")? {
            let file = entry.context("failed to read glob entry")?;
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            log::info!("removed {file:?}");
        }
        Ok(())
    }

    fn save_report(&self, report: &ChainReport) -> Result<()> {
        let file = self.report_file();
        let file = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        rmp_serde::encode::write(&mut writer, report).context("failed to serialize report")?;
        Ok(())
    }

    fn load_report(&self) -> Result<ChainReport> {
        let file = self.report_file();
        let file = File::open(&file).with_context(|| format!("failed to open {file:?}"))?;
        let reader = BufReader::new(file);
        let report = rmp_serde::decode::from_read(reader).context("failed to deserialize report")?;
        Ok(report)
    }

    fn report_file(&self) -> PathBuf {
        self.sim_dir.join("report.msgpack")
    }
}
