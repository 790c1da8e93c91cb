//! Cohort of independent hosts exposed to infectious bites.
//!
//! Each host runs its whole timeline on its own blocking worker: seeded
//! challenges, then fixed-size update steps with a daily chance of a new
//! infectious bite. Hosts share only the immutable parameter set, so no
//! locking is needed; each worker owns its host and antibody store.

use std::sync::Arc;

use malaria_intrahost::{HostContext, ImmunityConfig, InfectionParameters, MalariaHost};
use malaria_types::HostId;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::EngineError;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Cohort settings, loaded from the `cohort` section of
/// `malaria-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CohortConfig {
    /// Number of hosts to simulate.
    #[serde(default = "default_hosts")]
    pub hosts: u32,

    /// Base seed; host `i` uses `seed + i`.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of update steps per host.
    #[serde(default = "default_steps")]
    pub steps: u32,

    /// Length of one update step in days.
    #[serde(default = "default_dt_days")]
    pub dt_days: f64,

    /// Blood volume of every host in microliters.
    #[serde(default = "default_microliters_blood")]
    pub microliters_blood: f64,

    /// Infectious bites delivered to every host before the first step.
    #[serde(default = "default_initial_bites")]
    pub initial_bites: i64,

    /// Probability per day that a host receives one more infectious bite.
    #[serde(default = "default_daily_bite_probability")]
    pub daily_bite_probability: f64,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            seed: default_seed(),
            steps: default_steps(),
            dt_days: default_dt_days(),
            microliters_blood: default_microliters_blood(),
            initial_bites: default_initial_bites(),
            daily_bite_probability: default_daily_bite_probability(),
        }
    }
}

impl CohortConfig {
    /// Check the cohort settings.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cohort`] describing the first bad value.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.dt_days.is_finite() || self.dt_days <= 0.0 {
            return Err(EngineError::Cohort {
                message: format!("dt_days must be positive, got {}", self.dt_days),
            });
        }
        if !self.microliters_blood.is_finite() || self.microliters_blood <= 0.0 {
            return Err(EngineError::Cohort {
                message: format!(
                    "microliters_blood must be positive, got {}",
                    self.microliters_blood
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.daily_bite_probability) {
            return Err(EngineError::Cohort {
                message: format!(
                    "daily_bite_probability must be within [0, 1], got {}",
                    self.daily_bite_probability
                ),
            });
        }
        Ok(())
    }

    /// Probability of a bite within one step.
    fn bite_probability_per_step(&self) -> f64 {
        let miss = (1.0 - self.daily_bite_probability).powf(self.dt_days);
        (1.0 - miss).clamp(0.0, 1.0)
    }
}

const fn default_hosts() -> u32 {
    100
}

const fn default_seed() -> u64 {
    42
}

const fn default_steps() -> u32 {
    365
}

const fn default_dt_days() -> f64 {
    1.0
}

const fn default_microliters_blood() -> f64 {
    malaria_intrahost::ADULT_MICROLITERS_BLOOD
}

const fn default_initial_bites() -> i64 {
    1
}

const fn default_daily_bite_probability() -> f64 {
    0.01
}

// -----------------------------------------------------------------------
// Outcomes
// -----------------------------------------------------------------------

/// What happened to one host over the run.
#[derive(Debug, Clone, PartialEq)]
pub struct HostOutcome {
    /// Position of the host in the cohort.
    pub index: u32,
    /// Host identifier.
    pub host_id: HostId,
    /// Challenges that started a new infection.
    pub infections_started: u32,
    /// Infections cleared over the run.
    pub infections_cleared: u32,
    /// Highest parasite density (IRBC per microliter) seen.
    pub peak_parasite_density: f64,
    /// Day the host died, if it did.
    pub died_on_day: Option<f64>,
    /// Infections still present at the end of the run.
    pub active_infections: usize,
    /// Mature gametocytes at the end of the run.
    pub mature_gametocytes: u64,
    /// Distinct strains infecting the host at the end of the run.
    pub infecting_strains: usize,
}

/// Aggregate over the whole cohort.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortSummary {
    /// Per-host outcomes, ordered by host index.
    pub outcomes: Vec<HostOutcome>,
}

impl CohortSummary {
    /// Hosts that ever carried an infection.
    pub fn infected_hosts(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.infections_started > 0)
            .count()
    }

    /// Hosts that died.
    pub fn deaths(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.died_on_day.is_some())
            .count()
    }

    /// Hosts still infected at the end of the run.
    pub fn still_infected(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.active_infections > 0)
            .count()
    }

    /// Highest parasite density across the cohort.
    pub fn peak_parasite_density(&self) -> f64 {
        self.outcomes
            .iter()
            .map(|o| o.peak_parasite_density)
            .fold(0.0, f64::max)
    }
}

// -----------------------------------------------------------------------
// Execution
// -----------------------------------------------------------------------

/// Run every host of the cohort to completion on blocking workers.
///
/// # Errors
///
/// Returns [`EngineError::Cohort`] for invalid settings,
/// [`EngineError::Infection`] if a host rejects its parameters or any host
/// update fails, or
/// [`EngineError::Join`] if a worker task fails.
pub async fn run_cohort(
    config: &CohortConfig,
    params: Arc<InfectionParameters>,
    immunity: &ImmunityConfig,
) -> Result<CohortSummary, EngineError> {
    config.validate()?;

    let mut workers = JoinSet::new();
    for index in 0..config.hosts {
        let config = config.clone();
        let params = Arc::clone(&params);
        let immunity = immunity.clone();
        workers.spawn_blocking(move || simulate_host(index, &config, params, immunity));
    }

    let mut outcomes = Vec::with_capacity(usize::try_from(config.hosts).unwrap_or(0));
    while let Some(joined) = workers.join_next().await {
        let outcome = joined??;
        debug!(
            index = outcome.index,
            host_id = %outcome.host_id,
            infections = outcome.infections_started,
            cleared = outcome.infections_cleared,
            active = outcome.active_infections,
            mature_gametocytes = outcome.mature_gametocytes,
            strains = outcome.infecting_strains,
            died = outcome.died_on_day.is_some(),
            "host finished"
        );
        outcomes.push(outcome);
    }
    outcomes.sort_by_key(|o| o.index);

    let summary = CohortSummary { outcomes };
    info!(
        hosts = config.hosts,
        infected = summary.infected_hosts(),
        deaths = summary.deaths(),
        still_infected = summary.still_infected(),
        peak_density = summary.peak_parasite_density(),
        "cohort complete"
    );
    Ok(summary)
}

/// Run one host's whole timeline.
#[allow(clippy::needless_pass_by_value)]
fn simulate_host(
    index: u32,
    config: &CohortConfig,
    params: Arc<InfectionParameters>,
    immunity: ImmunityConfig,
) -> Result<HostOutcome, EngineError> {
    let mut rng = SmallRng::seed_from_u64(config.seed.wrapping_add(u64::from(index)));
    let context = HostContext::new(HostId::new(), config.microliters_blood);
    let mut host = MalariaHost::new(context, params, immunity)?;

    let mut infections_started = 0_u32;
    if host.challenge_with_bites(config.initial_bites, &mut rng)? {
        infections_started = infections_started.saturating_add(1);
    }

    let bite_probability = config.bite_probability_per_step();
    let mut infections_cleared = 0_u32;
    let mut peak_parasite_density = host.parasite_density();
    let mut died_on_day = None;
    let mut mature_gametocytes = 0;

    for step in 1..=config.steps {
        if rng.random_bool(bite_probability) && host.challenge_with_bites(1, &mut rng)? {
            infections_started = infections_started.saturating_add(1);
        }
        let update = host.update(config.dt_days, &mut rng)?;
        infections_cleared = infections_cleared
            .saturating_add(u32::try_from(update.cleared_infections).unwrap_or(u32::MAX));
        peak_parasite_density = peak_parasite_density.max(host.parasite_density());
        mature_gametocytes = update.mature_gametocytes.total();
        if update.fatal {
            died_on_day = Some(f64::from(step) * config.dt_days);
            break;
        }
    }

    Ok(HostOutcome {
        index,
        host_id: context.host_id,
        infections_started,
        infections_cleared,
        peak_parasite_density,
        died_on_day,
        active_infections: host.infections().len(),
        mature_gametocytes,
        infecting_strains: host.infecting_strains().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cohort() -> CohortConfig {
        CohortConfig {
            hosts: 4,
            steps: 30,
            initial_bites: 3,
            daily_bite_probability: 0.0,
            ..CohortConfig::default()
        }
    }

    fn infectious() -> Arc<InfectionParameters> {
        Arc::new(InfectionParameters {
            base_sporozoite_survival_fraction: 1.0,
            ..InfectionParameters::default()
        })
    }

    #[test]
    fn default_config_is_valid() {
        assert!(CohortConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_step_length_rejected() {
        let config = CohortConfig {
            dt_days: 0.0,
            ..CohortConfig::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::Cohort { .. })));
    }

    #[test]
    fn bite_probability_scales_with_step() {
        let config = CohortConfig {
            daily_bite_probability: 0.5,
            dt_days: 2.0,
            ..CohortConfig::default()
        };
        assert!((config.bite_probability_per_step() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn parse_cohort_section() {
        let yaml = "hosts: 12\nsteps: 10\ndt_days: 0.5\n";
        let config: Result<CohortConfig, _> = serde_yml::from_str(yaml);
        assert!(config.is_ok());
        let config = config.unwrap_or_default();
        assert_eq!(config.hosts, 12);
        assert_eq!(config.seed, 42);
        assert!((config.dt_days - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn every_challenged_host_is_infected() {
        let summary = run_cohort(&small_cohort(), infectious(), &ImmunityConfig::default()).await;
        assert!(summary.is_ok());
        let summary = summary.unwrap_or(CohortSummary {
            outcomes: Vec::new(),
        });
        assert_eq!(summary.outcomes.len(), 4);
        assert_eq!(summary.infected_hosts(), 4);
        assert!(summary.peak_parasite_density() > 0.0);
        let indices: Vec<u32> = summary.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(
            summary
                .outcomes
                .iter()
                .all(|o| o.infecting_strains <= o.active_infections)
        );
    }

    #[tokio::test]
    async fn invalid_parameters_fail_the_host() {
        let params = Arc::new(InfectionParameters {
            variant_slots: 0,
            ..InfectionParameters::default()
        });
        let result = run_cohort(&small_cohort(), params, &ImmunityConfig::default()).await;
        assert!(matches!(result, Err(EngineError::Infection { .. })));
    }

    #[tokio::test]
    async fn seeded_cohorts_are_reproducible() {
        let params = infectious();
        let immunity = ImmunityConfig::default();
        let a = run_cohort(&small_cohort(), Arc::clone(&params), &immunity).await;
        let b = run_cohort(&small_cohort(), params, &immunity).await;
        let densities = |s: Result<CohortSummary, EngineError>| {
            s.map(|s| {
                s.outcomes
                    .iter()
                    .map(|o| (o.infections_started, o.peak_parasite_density.to_bits()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
        };
        let a = densities(a);
        assert!(!a.is_empty());
        assert_eq!(a, densities(b));
    }

    #[tokio::test]
    async fn invalid_cohort_fails_before_spawning() {
        let config = CohortConfig {
            microliters_blood: -1.0,
            ..small_cohort()
        };
        let result = run_cohort(&config, infectious(), &ImmunityConfig::default()).await;
        assert!(matches!(result, Err(EngineError::Cohort { .. })));
    }
}
