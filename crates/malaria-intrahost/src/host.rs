//! A host individual carrying zero or more infections.
//!
//! [`MalariaHost`] owns the antibody store every one of its infections reads
//! and stimulates, converts sporozoite challenges into new infections, and
//! updates its infections one after another so the store only ever has a
//! single writer. Mature gametocytes are totalled per strain as well as
//! overall.

use std::collections::BTreeMap;
use std::sync::Arc;

use malaria_types::{AntibodyKind, HostId, InfectionId, LifecycleStatus, StrainIdentity};
use rand::Rng;
use rand_distr::{Binomial, Distribution, Poisson};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ImmunityConfig, InfectionParameters};
use crate::error::InfectionError;
use crate::gametocytes::MatureGametocytes;
use crate::immunity::{HostImmunity, SusceptibilityContext};
use crate::infection::Infection;
use crate::killing::probability;

/// Blood volume of an adult host in microliters.
pub const ADULT_MICROLITERS_BLOOD: f64 = 5.0e6;

/// The host attributes an infection needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostContext {
    /// Host identifier.
    pub host_id: HostId,
    /// Blood volume in microliters.
    pub microliters_blood: f64,
}

impl HostContext {
    /// Context for `host_id` with the given blood volume.
    pub const fn new(host_id: HostId, microliters_blood: f64) -> Self {
        Self {
            host_id,
            microliters_blood,
        }
    }

    /// Reciprocal of the blood volume; zero for a non-positive volume.
    pub fn inv_microliters_blood(&self) -> f64 {
        if self.microliters_blood.is_finite() && self.microliters_blood > 0.0 {
            self.microliters_blood.recip()
        } else {
            0.0
        }
    }
}

impl Default for HostContext {
    fn default() -> Self {
        Self::new(HostId::new(), ADULT_MICROLITERS_BLOOD)
    }
}

/// Aggregate result of one host update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostUpdate {
    /// Infections still present after the update.
    pub active_infections: usize,
    /// Infections cleared during this update.
    pub cleared_infections: usize,
    /// Whether any infection turned fatal during this update.
    pub fatal: bool,
    /// Mature gametocytes summed over every infection.
    pub mature_gametocytes: MatureGametocytes,
}

/// Mature gametocytes keyed by the strain that produced them.
pub type GametocytesByStrain = BTreeMap<StrainIdentity, MatureGametocytes>;

/// A host individual.
#[derive(Debug, Clone)]
pub struct MalariaHost {
    context: HostContext,
    params: Arc<InfectionParameters>,
    immunity: HostImmunity,
    infections: Vec<Infection>,
    mature_gametocytes: MatureGametocytes,
    gametocytes_by_strain: GametocytesByStrain,
    deceased: bool,
}

impl MalariaHost {
    /// A naive, uninfected host.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Parameters`] if `params` or `immunity`
    /// fails validation.
    pub fn new(
        context: HostContext,
        params: Arc<InfectionParameters>,
        immunity: ImmunityConfig,
    ) -> Result<Self, InfectionError> {
        params.validate()?;
        immunity.validate()?;
        Ok(Self {
            context,
            params,
            immunity: HostImmunity::new(immunity),
            infections: Vec::new(),
            mature_gametocytes: MatureGametocytes::default(),
            gametocytes_by_strain: GametocytesByStrain::new(),
            deceased: false,
        })
    }

    /// Challenge the host with `sporozoites` sporozoites.
    ///
    /// Each sporozoite independently reaches a hepatocyte with probability
    /// `base_sporozoite_survival_fraction * (1 - csp_kill)`, where
    /// `csp_kill` is a Hill function of the CSP antibody concentration.
    /// The CSP antibody is stimulated only after the draw and any new
    /// infection have succeeded, so an error leaves the antibody store
    /// untouched. Returns whether a new infection was started.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Distribution`] if the binomial draw cannot
    /// be constructed, or any error from creating the infection.
    pub fn challenge_with_sporozoites<R: Rng + ?Sized>(
        &mut self,
        sporozoites: i64,
        rng: &mut R,
    ) -> Result<bool, InfectionError> {
        if self.deceased || sporozoites <= 0 {
            return Ok(false);
        }
        let trials = u64::try_from(sporozoites).unwrap_or(0);

        let concentration = self
            .immunity
            .find(AntibodyKind::Csp, 0)
            .map_or(0.0, |csp| self.immunity.antibody_concentration(csp));
        let kill = csp_kill_fraction(concentration, &self.params);
        let survival = probability(self.params.base_sporozoite_survival_fraction * (1.0 - kill));

        let hepatocytes = Binomial::new(trials, survival)
            .map_err(|e| InfectionError::Distribution {
                reason: format!("binomial({trials}, {survival}): {e}"),
            })?
            .sample(rng);
        debug!(
            host_id = %self.context.host_id,
            sporozoites,
            csp_kill = kill,
            hepatocytes,
            "sporozoite challenge"
        );
        let infected = if hepatocytes > 0 {
            let strain = StrainIdentity {
                antigen_id: rng.random_range(0..self.params.pfemp1_variants.max(1)),
                genetic_id: rng.random(),
            };
            self.add_infection(strain, hepatocytes, -1.0, rng)?;
            true
        } else {
            false
        };

        let csp = self.immunity.register_antibody(AntibodyKind::Csp, 0);
        #[allow(clippy::cast_precision_loss)]
        self.immunity.stimulate_antibody(csp, trials as f64);
        Ok(infected)
    }

    /// Challenge the host with `bites` infectious bites, each injecting a
    /// Poisson number of sporozoites.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Distribution`] if a draw cannot be
    /// constructed, or any error from the resulting sporozoite challenge.
    pub fn challenge_with_bites<R: Rng + ?Sized>(
        &mut self,
        bites: i64,
        rng: &mut R,
    ) -> Result<bool, InfectionError> {
        let mean = self.params.mean_sporozoites_per_bite;
        if self.deceased || bites <= 0 || mean <= 0.0 {
            return Ok(false);
        }
        let poisson = Poisson::new(mean).map_err(|e| InfectionError::Distribution {
            reason: format!("poisson({mean}): {e}"),
        })?;
        let mut sporozoites = 0_i64;
        for _ in 0..bites {
            #[allow(clippy::cast_possible_truncation)]
            let drawn = poisson.sample(rng) as i64;
            sporozoites = sporozoites.saturating_add(drawn);
        }
        self.challenge_with_sporozoites(sporozoites, rng)
    }

    /// Start an infection of a known strain with `hepatocytes` liver-stage
    /// parasites. A negative `incubation_override` keeps the configured
    /// incubation period.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Infection::create`] or
    /// [`Infection::set_parameters`].
    pub fn add_infection<R: Rng + ?Sized>(
        &mut self,
        strain: StrainIdentity,
        hepatocytes: u64,
        incubation_override: f64,
        rng: &mut R,
    ) -> Result<InfectionId, InfectionError> {
        let mut infection = Infection::create(
            Arc::clone(&self.params),
            self.context,
            InfectionId::new(),
            hepatocytes,
            rng,
        )?;
        infection.set_parameters(strain, incubation_override, &mut self.immunity, rng)?;
        let id = infection.id();
        info!(
            host_id = %self.context.host_id,
            infection_id = %id,
            hepatocytes,
            antigen_id = strain.antigen_id,
            "new infection"
        );
        self.infections.push(infection);
        Ok(id)
    }

    /// Advance the host and every infection by `dt` days.
    ///
    /// Cleared infections are removed. A fatal infection marks the host
    /// deceased; later updates and challenges are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the first [`InfectionError`] raised by an infection update.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        rng: &mut R,
    ) -> Result<HostUpdate, InfectionError> {
        if self.deceased {
            return Ok(HostUpdate {
                active_infections: self.infections.len(),
                mature_gametocytes: self.mature_gametocytes,
                ..HostUpdate::default()
            });
        }
        if !dt.is_finite() || dt < 0.0 {
            return Err(InfectionError::InvalidTimestep(dt));
        }

        self.immunity.decay(dt);
        let mut fatal = false;
        for infection in &mut self.infections {
            let status = infection.update(dt, &mut self.immunity, rng)?;
            fatal |= status == LifecycleStatus::Fatal;
        }

        let before = self.infections.len();
        self.infections
            .retain(|infection| infection.status() != LifecycleStatus::Cleared);
        let cleared = before.saturating_sub(self.infections.len());

        self.tally_gametocytes();

        if fatal {
            self.deceased = true;
            info!(host_id = %self.context.host_id, "host died of severe malaria");
        }
        Ok(HostUpdate {
            active_infections: self.infections.len(),
            cleared_infections: cleared,
            fatal,
            mature_gametocytes: self.mature_gametocytes,
        })
    }

    /// Remove every infection, as a curative treatment would.
    pub fn clear_all_infections(&mut self) {
        for infection in &mut self.infections {
            infection.clear();
        }
        self.infections.clear();
        self.mature_gametocytes = MatureGametocytes::default();
        self.gametocytes_by_strain.clear();
    }

    /// Host attributes shared with every infection.
    pub const fn context(&self) -> HostContext {
        self.context
    }

    /// Change the blood volume seen by every infection.
    pub fn set_microliters_blood(&mut self, microliters_blood: f64) {
        self.context.microliters_blood = microliters_blood;
        for infection in &mut self.infections {
            infection.set_host_context(self.context);
        }
    }

    /// The host antibody store.
    pub const fn immunity(&self) -> &HostImmunity {
        &self.immunity
    }

    /// Mutable access to the antibody store, for interventions.
    pub const fn immunity_mut(&mut self) -> &mut HostImmunity {
        &mut self.immunity
    }

    /// Current infections in creation order.
    pub fn infections(&self) -> &[Infection] {
        &self.infections
    }

    /// Mature gametocytes summed at the last update.
    pub const fn mature_gametocytes(&self) -> MatureGametocytes {
        self.mature_gametocytes
    }

    /// Mature gametocytes per infecting strain, summed at the last update.
    pub const fn gametocytes_by_strain(&self) -> &GametocytesByStrain {
        &self.gametocytes_by_strain
    }

    /// Distinct strains among the current infections, in strain order.
    pub fn infecting_strains(&self) -> Vec<StrainIdentity> {
        let mut strains: Vec<StrainIdentity> =
            self.infections.iter().filter_map(Infection::strain).collect();
        strains.sort_unstable();
        strains.dedup();
        strains
    }

    /// Whether a fatal infection has killed this host.
    pub const fn is_deceased(&self) -> bool {
        self.deceased
    }

    /// Total IRBC across every infection.
    pub fn total_irbc(&self) -> u64 {
        self.infections
            .iter()
            .fold(0_u64, |acc, i| acc.saturating_add(i.total_irbc()))
    }

    /// IRBC per microliter across every infection.
    pub fn parasite_density(&self) -> f64 {
        self.infections.iter().map(Infection::parasite_density).sum()
    }

    /// Recompute the overall and per-strain mature gametocyte totals.
    fn tally_gametocytes(&mut self) {
        self.mature_gametocytes = MatureGametocytes::default();
        self.gametocytes_by_strain.clear();
        for infection in &self.infections {
            let mature = infection.mature_gametocytes();
            self.mature_gametocytes = self.mature_gametocytes.combined(mature);
            if let Some(strain) = infection.strain() {
                let entry = self.gametocytes_by_strain.entry(strain).or_default();
                *entry = entry.combined(mature);
            }
        }
    }
}

/// Fraction of sporozoites neutralised at CSP antibody concentration
/// `concentration`: `x^w / (1 + x^w)` with `x = concentration / threshold`.
fn csp_kill_fraction(concentration: f64, params: &InfectionParameters) -> f64 {
    if concentration.is_nan() || concentration <= 0.0 {
        return 0.0;
    }
    let threshold = params.antibody_csp_killing_threshold;
    if threshold <= 0.0 {
        return 1.0;
    }
    let hill = (concentration / threshold).powf(params.antibody_csp_killing_invwidth);
    probability(hill / (1.0 + hill))
}
