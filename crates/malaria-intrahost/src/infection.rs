//! A single malaria infection.
//!
//! [`Infection`] composes the asexual cycle engine, the variant tracker, the
//! gametocyte pipeline and the clearance monitor, and drives them in a fixed
//! order on every update: engine, then pipeline (only when a boundary was
//! crossed), then monitor. Alongside, it records the peak parasite count and
//! how long the blood stage has lasted.
//!
//! Lifecycle: [`Infection::create`] seeds the hepatocyte reservoir,
//! [`Infection::set_parameters`] fixes the strain and registers antibodies,
//! and [`Infection::update`] advances time until the infection is cleared
//! or fatal. Terminal states are absorbing.

use std::sync::Arc;

use malaria_types::{
    AntigenicVariant, CycleState, GametocyteCohort, InfectionId, InfectionSnapshot,
    LifecycleStatus, MalariaStrains, ParasitemiaRecord, StrainIdentity,
};
use rand::Rng;
use tracing::{debug, info};

use crate::asexual::{AsexualCycleEngine, CycleOutcome};
use crate::config::InfectionParameters;
use crate::error::InfectionError;
use crate::gametocytes::{GametocyteStagePipeline, MatureGametocytes};
use crate::host::HostContext;
use crate::immunity::SusceptibilityContext;
use crate::killing::probability;
use crate::monitor::ClearanceMonitor;
use crate::variants::{AntigenicVariantTracker, MinorEpitopeSet};

/// One parasite infection inside one host.
#[derive(Debug, Clone)]
pub struct Infection {
    id: InfectionId,
    params: Arc<InfectionParameters>,
    host: HostContext,
    strain: Option<StrainIdentity>,
    engine: AsexualCycleEngine,
    tracker: AntigenicVariantTracker,
    pipeline: GametocyteStagePipeline,
    monitor: ClearanceMonitor,
    parasitemia: ParasitemiaRecord,
    updated: bool,
}

impl Infection {
    /// Create an infection holding `initial_hepatocytes` liver-stage
    /// parasites. The drug resistance flag is drawn here and never changes.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Configuration`] if `initial_hepatocytes` is
    /// zero, or [`InfectionError::Parameters`] if `params` fails validation.
    pub fn create<R: Rng + ?Sized>(
        params: Arc<InfectionParameters>,
        host: HostContext,
        id: InfectionId,
        initial_hepatocytes: u64,
        rng: &mut R,
    ) -> Result<Self, InfectionError> {
        if initial_hepatocytes < 1 {
            return Err(InfectionError::Configuration {
                reason: "an infection needs at least one hepatocyte".to_owned(),
            });
        }
        params.validate()?;

        let drug_resistant = rng.random_bool(probability(params.drug_resistance_probability));
        let genetic_clone = 0;
        let infection = Self {
            id,
            host,
            strain: None,
            engine: AsexualCycleEngine::new(initial_hepatocytes, params.incubation_period_days),
            tracker: AntigenicVariantTracker::new(
                params.variant_slots,
                params.pfemp1_variants,
                genetic_clone,
            ),
            pipeline: GametocyteStagePipeline::new(params.gametocyte_stages),
            monitor: ClearanceMonitor::new(drug_resistant),
            parasitemia: ParasitemiaRecord::default(),
            updated: false,
            params,
        };
        debug!(
            infection_id = %id,
            host_id = %host.host_id,
            hepatocytes = initial_hepatocytes,
            drug_resistant,
            "infection created"
        );
        Ok(infection)
    }

    /// Fix the strain, assign the epitope repertoire and merozoite antigen
    /// types, and register every antibody with the host.
    ///
    /// A negative (or NaN) `incubation_override` keeps the configured
    /// incubation period.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::AlreadyCycling`] once the infection has
    /// been updated, even by a zero-length step.
    pub fn set_parameters<C, R>(
        &mut self,
        strain: StrainIdentity,
        incubation_override: f64,
        context: &mut C,
        rng: &mut R,
    ) -> Result<(), InfectionError>
    where
        C: SusceptibilityContext + ?Sized,
        R: Rng + ?Sized,
    {
        if self.updated {
            return Err(InfectionError::AlreadyCycling(self.id));
        }

        let per_set = self.params.minor_epitopes_per_set;
        let (msp_type, nonspecific_type) = match self.params.malaria_strains {
            MalariaStrains::NonRandom => {
                let msp_type = strain.antigen_id.checked_rem(self.params.msp_variants).unwrap_or(0);
                let nonspecific_type = strain
                    .antigen_id
                    .checked_rem(self.params.nonspecific_types)
                    .unwrap_or(0);
                self.tracker.assign_non_random(
                    strain.antigen_id,
                    strain.genetic_id,
                    MinorEpitopeSet::for_type(nonspecific_type, per_set),
                );
                (msp_type, nonspecific_type)
            }
            MalariaStrains::Random => {
                let msp_type = rng.random_range(0..self.params.msp_variants.max(1));
                let nonspecific_type = rng.random_range(0..self.params.nonspecific_types.max(1));
                self.tracker.assign_random(
                    rng,
                    strain.genetic_id,
                    MinorEpitopeSet::for_type(nonspecific_type, per_set),
                );
                (msp_type, nonspecific_type)
            }
        };

        let incubation = if incubation_override >= 0.0 {
            incubation_override
        } else {
            self.params.incubation_period_days
        };
        self.engine.configure(msp_type, nonspecific_type, incubation);
        self.engine.resolve_antibodies(&mut self.tracker, context);
        self.strain = Some(strain);

        debug!(
            infection_id = %self.id,
            antigen_id = strain.antigen_id,
            genetic_id = strain.genetic_id,
            msp_type,
            nonspecific_type,
            incubation,
            "infection parameters set"
        );
        Ok(())
    }

    /// Advance the infection by `dt` days.
    ///
    /// Returns the lifecycle status after the step. Once cleared or fatal,
    /// further calls change nothing and return the same status.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::ParametersNotSet`] before
    /// [`Infection::set_parameters`], or [`InfectionError::InvalidTimestep`]
    /// for a negative or non-finite `dt`.
    pub fn update<C, R>(
        &mut self,
        dt: f64,
        context: &mut C,
        rng: &mut R,
    ) -> Result<LifecycleStatus, InfectionError>
    where
        C: SusceptibilityContext + ?Sized,
        R: Rng + ?Sized,
    {
        if self.monitor.status().is_terminal() {
            return Ok(self.monitor.status());
        }
        if self.strain.is_none() {
            return Err(InfectionError::ParametersNotSet(self.id));
        }
        if !dt.is_finite() || dt < 0.0 {
            return Err(InfectionError::InvalidTimestep(dt));
        }

        let scale = self.monitor.resistance_scale(&self.params);
        let cycle_days = self.engine.current_cycle_days(&self.params);

        let outcome = self
            .engine
            .advance(dt, &self.params, &mut self.tracker, context, scale, rng)?;
        self.updated = true;
        if let Some(report) = outcome.report() {
            self.pipeline.advance_stages(
                report.new_gametocytes,
                &self.params,
                &*context,
                scale,
                cycle_days,
            );
        }

        self.parasitemia.record(self.tracker.total_irbc(), dt);
        self.monitor.on_step(dt, &self.params);
        let Some(report) = outcome.report() else {
            return Ok(self.monitor.status());
        };
        self.monitor.on_cycle_boundary(
            report.ruptured_irbc,
            self.host.inv_microliters_blood(),
            &self.params,
        );
        if matches!(outcome, CycleOutcome::Extinct(_)) {
            debug!(infection_id = %self.id, "asexual population extinct");
        }

        // Clearance and death are only declared after a cycle boundary.
        let evaluation = self.monitor.evaluate(
            self.tracker.total_irbc(),
            self.pipeline.total(),
            self.engine.state().hepatocytes,
            &self.params,
        );
        let status = self.monitor.apply(evaluation);
        if status.is_terminal() {
            info!(
                infection_id = %self.id,
                host_id = %self.host.host_id,
                status = %status,
                cycles = self.engine.state().cycle_count,
                peak_irbc = self.parasitemia.peak_irbc,
                blood_stage_days = self.parasitemia.blood_stage_days,
                rbc_destroyed = self.monitor.rbc_destroyed_per_microliter(),
                "infection ended"
            );
        }
        Ok(status)
    }

    /// Remove every parasite, as a curative intervention would, and mark the
    /// infection cleared.
    pub fn clear(&mut self) {
        self.tracker.clear_counts();
        self.pipeline.clear();
        self.engine.clear_hepatocytes();
        self.monitor.mark_cleared();
        info!(infection_id = %self.id, status = %self.monitor.status(), "infection cleared externally");
    }

    /// Point the infection at a new host context (e.g. after a blood volume
    /// change).
    pub fn set_host_context(&mut self, host: HostContext) {
        self.host = host;
    }

    // -----------------------------------------------------------------------
    // Gametocyte accessors
    // -----------------------------------------------------------------------

    /// Male gametocytes at `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Index`] if `stage` is not below the stage
    /// count.
    pub fn male_gametocytes(&self, stage: usize) -> Result<u64, InfectionError> {
        self.pipeline.male(stage)
    }

    /// Female gametocytes at `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Index`] if `stage` is not below the stage
    /// count.
    pub fn female_gametocytes(&self, stage: usize) -> Result<u64, InfectionError> {
        self.pipeline.female(stage)
    }

    /// Zero the male gametocytes at `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Index`] if `stage` is out of range; nothing
    /// changes in that case.
    pub fn reset_male_gametocytes(&mut self, stage: usize) -> Result<(), InfectionError> {
        self.pipeline.reset_male(stage)
    }

    /// Zero the female gametocytes at `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Index`] if `stage` is out of range; nothing
    /// changes in that case.
    pub fn reset_female_gametocytes(&mut self, stage: usize) -> Result<(), InfectionError> {
        self.pipeline.reset_female(stage)
    }

    /// Every gametocyte stage as a cohort, youngest first.
    pub fn gametocyte_cohorts(&self) -> Vec<GametocyteCohort> {
        self.pipeline.cohorts()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Infection identifier.
    pub const fn id(&self) -> InfectionId {
        self.id
    }

    /// Host this infection lives in.
    pub const fn host(&self) -> HostContext {
        self.host
    }

    /// Current lifecycle status.
    pub const fn status(&self) -> LifecycleStatus {
        self.monitor.status()
    }

    /// Strain identity, once parameters are set.
    pub const fn strain(&self) -> Option<StrainIdentity> {
        self.strain
    }

    /// The shared parameter set.
    pub fn parameters(&self) -> &InfectionParameters {
        &self.params
    }

    /// Total infected red blood cells.
    pub fn total_irbc(&self) -> u64 {
        self.tracker.total_irbc()
    }

    /// Total gametocytes across every stage.
    pub fn total_gametocytes(&self) -> u64 {
        self.pipeline.total()
    }

    /// Mature gametocyte counts.
    pub fn mature_gametocytes(&self) -> MatureGametocytes {
        self.pipeline.mature()
    }

    /// IRBC per microliter of host blood.
    #[allow(clippy::cast_precision_loss)]
    pub fn parasite_density(&self) -> f64 {
        self.tracker.total_irbc() as f64 * self.host.inv_microliters_blood()
    }

    /// Whether this infection is drug resistant.
    pub const fn drug_resistant(&self) -> bool {
        self.monitor.drug_resistant()
    }

    /// Timer, completed cycles, and hepatocyte reservoir.
    pub const fn cycle_state(&self) -> CycleState {
        self.engine.state()
    }

    /// Destroyed red blood cells per microliter attributed to this infection.
    pub const fn rbc_destroyed_per_microliter(&self) -> f64 {
        self.monitor.rbc_destroyed_per_microliter()
    }

    /// Peak IRBC count and blood-stage duration so far.
    pub const fn parasitemia(&self) -> ParasitemiaRecord {
        self.parasitemia
    }

    /// Largest total IRBC count seen after any update.
    pub const fn peak_irbc(&self) -> u64 {
        self.parasitemia.peak_irbc
    }

    /// Whether the infection has been updated at least once.
    pub const fn has_updated(&self) -> bool {
        self.updated
    }

    /// Antigenic variant in `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Index`] if `slot` is out of range.
    pub fn variant(&self, slot: usize) -> Result<&AntigenicVariant, InfectionError> {
        self.tracker.variant(slot)
    }

    /// The full variant registry.
    pub const fn variants(&self) -> &AntigenicVariantTracker {
        &self.tracker
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Capture every field needed to resume this infection exactly.
    pub fn snapshot(&self) -> InfectionSnapshot {
        InfectionSnapshot {
            id: self.id,
            host_id: self.host.host_id,
            status: self.monitor.status(),
            updated: self.updated,
            strain: self.strain,
            incubation_days: self.engine.incubation_days(),
            cycle: self.engine.state(),
            msp_type: self.engine.msp_type(),
            nonspecific_type: self.engine.nonspecific_type(),
            variants: self
                .tracker
                .iter()
                .map(|v| {
                    let mut variant = v.clone();
                    variant.forget_antibodies();
                    variant
                })
                .collect(),
            male_gametocytes: self.pipeline.male_stages().to_vec(),
            female_gametocytes: self.pipeline.female_stages().to_vec(),
            drug_resistant: self.monitor.drug_resistant(),
            rbc_destroyed_per_microliter: self.monitor.rbc_destroyed_per_microliter(),
            parasitemia: self.parasitemia,
        }
    }

    /// Resume an infection from a snapshot. Antibody handles are resolved
    /// against the host on the next update.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::SnapshotMismatch`] if the snapshot belongs
    /// to another host or its slot or stage counts do not match `params`,
    /// or [`InfectionError::Parameters`] if `params` fails validation.
    pub fn restore(
        params: Arc<InfectionParameters>,
        host: HostContext,
        snapshot: InfectionSnapshot,
    ) -> Result<Self, InfectionError> {
        params.validate()?;
        if snapshot.host_id != host.host_id {
            return Err(InfectionError::SnapshotMismatch {
                reason: format!(
                    "snapshot belongs to host {}, not {}",
                    snapshot.host_id, host.host_id
                ),
            });
        }
        let tracker = AntigenicVariantTracker::restore(
            snapshot.variants,
            params.variant_slots,
            params.pfemp1_variants,
            MinorEpitopeSet::for_type(snapshot.nonspecific_type, params.minor_epitopes_per_set),
        )?;
        let pipeline = GametocyteStagePipeline::restore(
            snapshot.male_gametocytes,
            snapshot.female_gametocytes,
            params.gametocyte_stages,
        )?;
        let engine = AsexualCycleEngine::restore(
            snapshot.cycle,
            snapshot.incubation_days,
            snapshot.msp_type,
            snapshot.nonspecific_type,
        );
        let monitor = ClearanceMonitor::restore(
            snapshot.drug_resistant,
            snapshot.rbc_destroyed_per_microliter,
            snapshot.status,
        );
        Ok(Self {
            id: snapshot.id,
            params,
            host,
            strain: snapshot.strain,
            engine,
            tracker,
            pipeline,
            monitor,
            parasitemia: snapshot.parasitemia,
            updated: snapshot.updated,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use malaria_types::HostId;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::config::ImmunityConfig;
    use crate::immunity::HostImmunity;

    fn params() -> Arc<InfectionParameters> {
        Arc::new(InfectionParameters {
            variant_slots: 5,
            pfemp1_variants: 50,
            gametocyte_stages: 4,
            ..InfectionParameters::default()
        })
    }

    fn host() -> HostContext {
        HostContext::new(HostId::new(), 5.0e6)
    }

    fn immunity() -> HostImmunity {
        HostImmunity::new(ImmunityConfig::default())
    }

    fn strain() -> StrainIdentity {
        StrainIdentity {
            antigen_id: 3,
            genetic_id: 9,
        }
    }

    #[test]
    fn zero_hepatocytes_rejected() {
        let mut rng = SmallRng::seed_from_u64(42);
        let result = Infection::create(params(), host(), InfectionId::new(), 0, &mut rng);
        assert!(matches!(result, Err(InfectionError::Configuration { .. })));
    }

    #[test]
    fn invalid_parameters_rejected() {
        let mut rng = SmallRng::seed_from_u64(42);
        let bad = Arc::new(InfectionParameters {
            variant_slots: 0,
            ..InfectionParameters::default()
        });
        let result = Infection::create(bad, host(), InfectionId::new(), 1, &mut rng);
        assert!(matches!(result, Err(InfectionError::Parameters { .. })));
    }

    #[test]
    fn update_before_parameters_fails() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let mut infection =
            Infection::create(params(), host(), InfectionId::new(), 1, &mut rng).unwrap();
        let result = infection.update(1.0, &mut context, &mut rng);
        assert!(matches!(result, Err(InfectionError::ParametersNotSet(_))));
    }

    #[test]
    fn set_parameters_after_cycling_fails() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let mut infection =
            Infection::create(params(), host(), InfectionId::new(), 1, &mut rng).unwrap();
        assert!(infection.set_parameters(strain(), -1.0, &mut context, &mut rng).is_ok());
        assert!(infection.update(0.5, &mut context, &mut rng).is_ok());
        let again = infection.set_parameters(strain(), -1.0, &mut context, &mut rng);
        assert!(matches!(again, Err(InfectionError::AlreadyCycling(_))));
    }

    #[test]
    fn zero_length_update_still_fixes_parameters() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let mut infection =
            Infection::create(params(), host(), InfectionId::new(), 1, &mut rng).unwrap();
        assert!(infection.set_parameters(strain(), -1.0, &mut context, &mut rng).is_ok());
        assert!(!infection.has_updated());
        assert!(infection.update(0.0, &mut context, &mut rng).is_ok());
        assert!(infection.cycle_state().timer.abs() < f64::EPSILON);
        assert!(infection.has_updated());
        let again = infection.set_parameters(strain(), -1.0, &mut context, &mut rng);
        assert!(matches!(again, Err(InfectionError::AlreadyCycling(_))));
    }

    #[test]
    fn invalid_timestep_rejected() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let mut infection =
            Infection::create(params(), host(), InfectionId::new(), 1, &mut rng).unwrap();
        assert!(infection.set_parameters(strain(), -1.0, &mut context, &mut rng).is_ok());
        assert!(matches!(
            infection.update(-1.0, &mut context, &mut rng),
            Err(InfectionError::InvalidTimestep(_))
        ));
        assert!(infection.update(f64::NAN, &mut context, &mut rng).is_err());
        assert!(infection.cycle_state().timer.abs() < f64::EPSILON);
    }

    #[test]
    fn non_random_strain_derives_epitopes() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let mut infection =
            Infection::create(params(), host(), InfectionId::new(), 1, &mut rng).unwrap();
        assert!(infection.set_parameters(strain(), -1.0, &mut context, &mut rng).is_ok());
        let epitopes = infection.variants().epitopes();
        assert_eq!(epitopes, vec![15, 16, 17, 18, 19]);
        assert!(infection.variants().iter().all(|v| v.clone == 9));
        // Non-specific type 3 owns minor epitopes 15..20.
        let minors: Vec<u32> = infection.variants().iter().map(|v| v.minor_epitope).collect();
        assert_eq!(minors, vec![15, 16, 17, 18, 19]);
        // Five major and five minor PfEMP1 antibodies plus MSP1 and
        // non-specific.
        assert_eq!(context.len(), 12);
    }

    #[test]
    fn random_strains_draw_within_every_space() {
        let params = Arc::new(InfectionParameters {
            malaria_strains: MalariaStrains::Random,
            variant_slots: 10,
            pfemp1_variants: 20,
            msp_variants: 7,
            nonspecific_types: 3,
            minor_epitopes_per_set: 4,
            ..InfectionParameters::default()
        });
        let mut rng = SmallRng::seed_from_u64(42);
        let mut nonspecific_seen = [false; 3];
        for _ in 0..40 {
            let mut context = immunity();
            let mut infection =
                Infection::create(Arc::clone(&params), host(), InfectionId::new(), 1, &mut rng)
                    .unwrap();
            infection
                .set_parameters(strain(), -1.0, &mut context, &mut rng)
                .unwrap();
            let snapshot = infection.snapshot();
            assert!(snapshot.msp_type < 7);
            assert!(snapshot.nonspecific_type < 3);
            if let Some(flag) = usize::try_from(snapshot.nonspecific_type)
                .ok()
                .and_then(|i| nonspecific_seen.get_mut(i))
            {
                *flag = true;
            }

            let mut epitopes = infection.variants().epitopes();
            assert!(epitopes.iter().all(|&e| e < 20));
            epitopes.sort_unstable();
            epitopes.dedup();
            assert_eq!(epitopes.len(), 10);

            let minor_set = infection.variants().minor_set();
            assert_eq!(minor_set, MinorEpitopeSet::for_type(snapshot.nonspecific_type, 4));
            assert!(
                infection
                    .variants()
                    .iter()
                    .all(|v| minor_set.contains(v.minor_epitope))
            );
            assert!(infection.variants().iter().all(|v| v.clone == 9));
        }
        assert_eq!(nonspecific_seen, [true; 3]);
    }

    #[test]
    fn parasitemia_tracks_peak_and_blood_stage_days() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let mut infection =
            Infection::create(params(), host(), InfectionId::new(), 1, &mut rng).unwrap();
        infection
            .set_parameters(strain(), 1.0, &mut context, &mut rng)
            .unwrap();
        infection.update(0.5, &mut context, &mut rng).unwrap();
        assert!(!infection.parasitemia().measuring);

        infection.update(0.5, &mut context, &mut rng).unwrap();
        assert!(infection.parasitemia().measuring);
        assert_eq!(infection.peak_irbc(), 15_000);
        assert!(infection.parasitemia().blood_stage_days.abs() < f64::EPSILON);

        infection.update(0.5, &mut context, &mut rng).unwrap();
        infection.update(0.25, &mut context, &mut rng).unwrap();
        assert!((infection.parasitemia().blood_stage_days - 0.75).abs() < f64::EPSILON);
        assert_eq!(infection.snapshot().parasitemia, infection.parasitemia());
    }

    #[test]
    fn rupture_damage_is_counted_before_regeneration() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let small = HostContext::new(HostId::new(), 1_000.0);
        let mut infection =
            Infection::create(params(), small, InfectionId::new(), 1, &mut rng).unwrap();
        infection
            .set_parameters(strain(), 1.0, &mut context, &mut rng)
            .unwrap();
        infection.update(1.0, &mut context, &mut rng).unwrap();
        assert!(infection.rbc_destroyed_per_microliter().abs() < f64::EPSILON);

        let status = infection.update(2.0, &mut context, &mut rng).unwrap();
        assert_eq!(status, LifecycleStatus::EndOfCycle);
        let destroyed = 15_000.0 * 9.5 / 1_000.0;
        assert!((infection.rbc_destroyed_per_microliter() - destroyed).abs() < 1e-9);

        let status = infection.update(1.0, &mut context, &mut rng).unwrap();
        assert_eq!(status, LifecycleStatus::Growing);
        let regenerated = destroyed * (-0.02_f64).exp();
        assert!((infection.rbc_destroyed_per_microliter() - regenerated).abs() < 1e-9);
    }

    #[test]
    fn incubation_override_sets_first_cycle() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let mut infection =
            Infection::create(params(), host(), InfectionId::new(), 1, &mut rng).unwrap();
        assert!(infection.set_parameters(strain(), 1.0, &mut context, &mut rng).is_ok());
        assert_eq!(
            infection.update(1.0, &mut context, &mut rng).ok(),
            Some(LifecycleStatus::EndOfCycle)
        );
        assert_eq!(infection.cycle_state().hepatocytes, 0);
        assert_eq!(infection.total_irbc(), 15_000);
        assert_eq!(
            infection.update(0.5, &mut context, &mut rng).ok(),
            Some(LifecycleStatus::Growing)
        );
    }

    #[test]
    fn clear_removes_everything() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let mut infection =
            Infection::create(params(), host(), InfectionId::new(), 3, &mut rng).unwrap();
        assert!(infection.set_parameters(strain(), 1.0, &mut context, &mut rng).is_ok());
        assert!(infection.update(1.0, &mut context, &mut rng).is_ok());
        infection.clear();
        assert_eq!(infection.status(), LifecycleStatus::Cleared);
        assert_eq!(infection.total_irbc(), 0);
        assert_eq!(infection.cycle_state().hepatocytes, 0);
        assert_eq!(
            infection.update(1.0, &mut context, &mut rng).ok(),
            Some(LifecycleStatus::Cleared)
        );
    }

    #[test]
    fn restore_rejects_foreign_host() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let mut infection =
            Infection::create(params(), host(), InfectionId::new(), 1, &mut rng).unwrap();
        assert!(infection.set_parameters(strain(), -1.0, &mut context, &mut rng).is_ok());
        let snapshot = infection.snapshot();
        let result = Infection::restore(params(), host(), snapshot);
        assert!(matches!(result, Err(InfectionError::SnapshotMismatch { .. })));
    }

    #[test]
    fn density_scales_with_blood_volume() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut context = immunity();
        let small = HostContext::new(HostId::new(), 1_000.0);
        let mut infection =
            Infection::create(params(), small, InfectionId::new(), 1, &mut rng).unwrap();
        assert!(infection.set_parameters(strain(), 1.0, &mut context, &mut rng).is_ok());
        assert!(infection.update(1.0, &mut context, &mut rng).is_ok());
        assert!((infection.parasite_density() - 15.0).abs() < 1e-9);
    }
}
