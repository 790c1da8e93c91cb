//! Staged male and female gametocyte development.
//!
//! Stage 0 receives newly committed gametocytes; the last stage is mature.
//! At every cycle boundary the pipeline kills and shifts existing cohorts
//! one stage up, then seeds stage 0.

use malaria_types::GametocyteCohort;

use crate::config::InfectionParameters;
use crate::error::InfectionError;
use crate::immunity::SusceptibilityContext;
use crate::killing::{exposure_survival, scaled, surviving};

/// Mature gametocyte counts after a pipeline advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatureGametocytes {
    /// Mature male gametocytes.
    pub male: u64,
    /// Mature female gametocytes.
    pub female: u64,
}

impl MatureGametocytes {
    /// Combined mature count, saturating.
    pub const fn total(&self) -> u64 {
        self.male.saturating_add(self.female)
    }

    /// Sum of two counts, saturating.
    pub const fn combined(self, other: Self) -> Self {
        Self {
            male: self.male.saturating_add(other.male),
            female: self.female.saturating_add(other.female),
        }
    }
}

/// Per-stage male and female gametocyte counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GametocyteStagePipeline {
    male: Vec<u64>,
    female: Vec<u64>,
}

impl GametocyteStagePipeline {
    /// An empty pipeline with `stages` stages.
    pub fn new(stages: usize) -> Self {
        Self {
            male: vec![0; stages],
            female: vec![0; stages],
        }
    }

    /// Rebuild a pipeline from persisted per-stage counts.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::SnapshotMismatch`] if either vector does not
    /// have exactly `stages` entries.
    pub fn restore(male: Vec<u64>, female: Vec<u64>, stages: usize) -> Result<Self, InfectionError> {
        if male.len() != stages || female.len() != stages {
            return Err(InfectionError::SnapshotMismatch {
                reason: format!(
                    "gametocyte stages {}/{}, expected {stages}",
                    male.len(),
                    female.len()
                ),
            });
        }
        Ok(Self { male, female })
    }

    /// Number of stages.
    pub fn stages(&self) -> usize {
        self.male.len()
    }

    /// Male count at `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Index`] if `stage` is out of range.
    pub fn male(&self, stage: usize) -> Result<u64, InfectionError> {
        stage_count(&self.male, stage)
    }

    /// Female count at `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Index`] if `stage` is out of range.
    pub fn female(&self, stage: usize) -> Result<u64, InfectionError> {
        stage_count(&self.female, stage)
    }

    /// Zero the male count at `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Index`] if `stage` is out of range; nothing
    /// changes in that case.
    pub fn reset_male(&mut self, stage: usize) -> Result<(), InfectionError> {
        reset_stage(&mut self.male, stage)
    }

    /// Zero the female count at `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Index`] if `stage` is out of range; nothing
    /// changes in that case.
    pub fn reset_female(&mut self, stage: usize) -> Result<(), InfectionError> {
        reset_stage(&mut self.female, stage)
    }

    /// Per-stage male counts.
    pub fn male_stages(&self) -> &[u64] {
        &self.male
    }

    /// Per-stage female counts.
    pub fn female_stages(&self) -> &[u64] {
        &self.female
    }

    /// Every stage as a cohort, youngest first.
    pub fn cohorts(&self) -> Vec<GametocyteCohort> {
        self.male
            .iter()
            .zip(&self.female)
            .enumerate()
            .map(|(stage, (&male, &female))| GametocyteCohort {
                stage,
                male,
                female,
            })
            .collect()
    }

    /// Mature-stage counts.
    pub fn mature(&self) -> MatureGametocytes {
        MatureGametocytes {
            male: self.male.last().copied().unwrap_or(0),
            female: self.female.last().copied().unwrap_or(0),
        }
    }

    /// Total across every stage and both sexes, saturating.
    pub fn total(&self) -> u64 {
        self.male
            .iter()
            .chain(&self.female)
            .fold(0_u64, |acc, &n| acc.saturating_add(n))
    }

    /// Age every cohort by one stage and seed stage 0 with `production`.
    ///
    /// The mature stage decays by `mature_gametocyte_survival`, immature
    /// stages by `gametocyte_stage_survival`, both combined with drug
    /// killing over `exposure_days`. Stage `S-2` survivors join the mature
    /// stage. New gametocytes split by `base_gametocyte_sexratio`, male
    /// share floored.
    pub fn advance_stages<C>(
        &mut self,
        production: u64,
        params: &InfectionParameters,
        context: &C,
        resistance_scale: f64,
        exposure_days: f64,
    ) -> MatureGametocytes
    where
        C: SusceptibilityContext + ?Sized,
    {
        let drug = exposure_survival(
            context.drug_gametocyte_kill_rate() * resistance_scale,
            exposure_days,
        );
        let mature_survival = params.mature_gametocyte_survival * drug;
        let stage_survival = params.gametocyte_stage_survival * drug;

        age_cohorts(&mut self.male, mature_survival, stage_survival);
        age_cohorts(&mut self.female, mature_survival, stage_survival);

        let male = scaled(production, params.base_gametocyte_sexratio, "male gametocytes")
            .min(production);
        let female = production.saturating_sub(male);
        if let Some(first) = self.male.first_mut() {
            *first = first.saturating_add(male);
        }
        if let Some(first) = self.female.first_mut() {
            *first = first.saturating_add(female);
        }
        self.mature()
    }

    /// Zero every stage.
    pub fn clear(&mut self) {
        self.male.fill(0);
        self.female.fill(0);
    }
}

fn stage_count(stages: &[u64], stage: usize) -> Result<u64, InfectionError> {
    stages.get(stage).copied().ok_or(InfectionError::Index {
        what: "gametocyte stage",
        index: stage,
        len: stages.len(),
    })
}

fn reset_stage(stages: &mut [u64], stage: usize) -> Result<(), InfectionError> {
    let len = stages.len();
    let slot = stages.get_mut(stage).ok_or(InfectionError::Index {
        what: "gametocyte stage",
        index: stage,
        len,
    })?;
    *slot = 0;
    Ok(())
}

/// Kill and shift one sex's cohorts one stage towards maturity.
fn age_cohorts(stages: &mut [u64], mature_survival: f64, stage_survival: f64) {
    let Some(mature_index) = stages.len().checked_sub(1) else {
        return;
    };
    let mut next = vec![0_u64; stages.len()];
    if let (Some(mature), Some(slot)) = (stages.get(mature_index), next.get_mut(mature_index)) {
        *slot = surviving(*mature, mature_survival, "mature gametocytes");
    }
    for stage in (0..mature_index).rev() {
        let survivors = stages
            .get(stage)
            .map_or(0, |&n| surviving(n, stage_survival, "immature gametocytes"));
        if let Some(slot) = next.get_mut(stage.saturating_add(1)) {
            *slot = slot.saturating_add(survivors);
        }
    }
    stages.copy_from_slice(&next);
}
