//! Asexual blood-stage cycle engine.
//!
//! Advances the cycle timer, applies continuous IRBC killing between cycle
//! boundaries, and at each boundary runs the fixed sequence: kill, immune
//! stimulation, antigenic switching, growth with gametocyte diversion and
//! the one-time hepatocyte burst, then the timer reset.
//!
//! Each phase of the boundary sequence runs across every variant before the
//! next phase starts, so the result does not depend on slot order.

use malaria_types::{AntibodyId, AntibodyKind, AntigenicVariant, CycleState, ParasiteSwitchType};
use rand::Rng;
use tracing::debug;

use crate::config::InfectionParameters;
use crate::error::InfectionError;
use crate::immunity::SusceptibilityContext;
use crate::killing::{exposure_survival, probability, scaled, surviving};
use crate::variants::AntigenicVariantTracker;

/// What a single call to [`AsexualCycleEngine::advance`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The step stayed inside the current cycle.
    Continuing,
    /// The step crossed a cycle boundary and parasites remain.
    CycleCompleted(CycleReport),
    /// The step crossed a cycle boundary and no IRBC or hepatocytes remain.
    Extinct(CycleReport),
}

impl CycleOutcome {
    /// The boundary report, if a boundary was crossed.
    pub const fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Continuing => None,
            Self::CycleCompleted(report) | Self::Extinct(report) => Some(report),
        }
    }
}

/// Summary of one cycle boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// IRBC that ruptured at the boundary (total before the boundary kill).
    pub ruptured_irbc: u64,
    /// Merozoites diverted to the sexual pathway.
    pub new_gametocytes: u64,
    /// Variant slots that switched epitope.
    pub switches: u32,
    /// Cycle number that just completed (1-based).
    pub cycle: u32,
}

/// Timer, hepatocyte reservoir, and merozoite antigen state of one
/// infection.
#[derive(Debug, Clone, PartialEq)]
pub struct AsexualCycleEngine {
    state: CycleState,
    incubation_days: f64,
    msp_type: u32,
    nonspecific_type: u32,
    msp_antibody: Option<AntibodyId>,
    nonspecific_antibody: Option<AntibodyId>,
}

impl AsexualCycleEngine {
    /// A fresh engine holding `hepatocytes` liver-stage parasites.
    pub const fn new(hepatocytes: u64, incubation_days: f64) -> Self {
        Self {
            state: CycleState {
                timer: 0.0,
                cycle_count: 0,
                hepatocytes,
            },
            incubation_days,
            msp_type: 0,
            nonspecific_type: 0,
            msp_antibody: None,
            nonspecific_antibody: None,
        }
    }

    /// Rebuild an engine from persisted state. Antibody handles are
    /// resolved again on the next advance.
    pub const fn restore(
        state: CycleState,
        incubation_days: f64,
        msp_type: u32,
        nonspecific_type: u32,
    ) -> Self {
        Self {
            state,
            incubation_days,
            msp_type,
            nonspecific_type,
            msp_antibody: None,
            nonspecific_antibody: None,
        }
    }

    /// Current timer, cycle count and reservoir.
    pub const fn state(&self) -> CycleState {
        self.state
    }

    /// Liver-stage duration used for the first cycle.
    pub const fn incubation_days(&self) -> f64 {
        self.incubation_days
    }

    /// MSP1 type of this infection's merozoites.
    pub const fn msp_type(&self) -> u32 {
        self.msp_type
    }

    /// Non-specific antigen type of this infection.
    pub const fn nonspecific_type(&self) -> u32 {
        self.nonspecific_type
    }

    /// Whether the engine has started timing or completed any cycle.
    pub fn has_started(&self) -> bool {
        self.state.timer > 0.0 || self.state.cycle_count > 0
    }

    /// Length of the cycle currently in progress.
    pub fn current_cycle_days(&self, params: &InfectionParameters) -> f64 {
        if self.state.hepatocytes > 0 {
            self.incubation_days
        } else {
            params.asexual_cycle_days
        }
    }

    /// Set the merozoite antigen types and the liver-stage duration.
    pub(crate) fn configure(&mut self, msp_type: u32, nonspecific_type: u32, incubation_days: f64) {
        self.msp_type = msp_type;
        self.nonspecific_type = nonspecific_type;
        self.incubation_days = incubation_days;
        self.msp_antibody = None;
        self.nonspecific_antibody = None;
    }

    /// Drop the hepatocyte reservoir.
    pub(crate) const fn clear_hepatocytes(&mut self) {
        self.state.hepatocytes = 0;
    }

    /// Make sure every antibody handle this infection reads is registered
    /// with the host.
    pub(crate) fn resolve_antibodies<C>(
        &mut self,
        tracker: &mut AntigenicVariantTracker,
        context: &mut C,
    ) -> (AntibodyId, AntibodyId)
    where
        C: SusceptibilityContext + ?Sized,
    {
        for variant in tracker.slots_mut() {
            if variant.antibody.is_none() {
                variant.antibody =
                    Some(context.register_antibody(AntibodyKind::Pfemp1Major, variant.epitope));
            }
            if variant.minor_antibody.is_none() {
                variant.minor_antibody = Some(
                    context.register_antibody(AntibodyKind::Pfemp1Minor, variant.minor_epitope),
                );
            }
        }
        let (msp_type, nonspecific_type) = (self.msp_type, self.nonspecific_type);
        let msp = *self
            .msp_antibody
            .get_or_insert_with(|| context.register_antibody(AntibodyKind::Msp1, msp_type));
        let nonspecific = *self.nonspecific_antibody.get_or_insert_with(|| {
            context.register_antibody(AntibodyKind::NonSpecific, nonspecific_type)
        });
        (msp, nonspecific)
    }

    /// Advance the cycle by `dt` days.
    ///
    /// `resistance_scale` multiplies the drug IRBC kill rate.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError`] only if the variant tracker rejects a
    /// switch, which the unused-epitope draw rules out.
    pub fn advance<C, R>(
        &mut self,
        dt: f64,
        params: &InfectionParameters,
        tracker: &mut AntigenicVariantTracker,
        context: &mut C,
        resistance_scale: f64,
        rng: &mut R,
    ) -> Result<CycleOutcome, InfectionError>
    where
        C: SusceptibilityContext + ?Sized,
        R: Rng + ?Sized,
    {
        let (msp, nonspecific) = self.resolve_antibodies(tracker, context);
        let cycle_days = self.current_cycle_days(params);
        self.state.timer += dt;

        let drug_rate = context.drug_irbc_kill_rate() * resistance_scale;
        let nonspecific_rate =
            params.nonspecific_killrate * context.antibody_concentration(nonspecific);

        if self.state.timer < cycle_days {
            for variant in tracker.slots_mut() {
                if !variant.is_occupied() {
                    continue;
                }
                let antibody_rate =
                    variant_kill_rate(variant, params, &*context) + nonspecific_rate;
                let survival =
                    exposure_survival(drug_rate, dt) * exposure_survival(antibody_rate, dt);
                variant.count = surviving(variant.count, survival, "irbc");
            }
            return Ok(CycleOutcome::Continuing);
        }

        let ruptured_irbc = tracker.total_irbc();

        // 1. Boundary kill, including merozoites neutralised by MSP1
        //    antibodies at rupture.
        let merozoite_survival =
            1.0 - params.msp1_merozoite_kill * context.antibody_concentration(msp);
        for variant in tracker.slots_mut() {
            if !variant.is_occupied() {
                continue;
            }
            let antibody_rate = variant_kill_rate(variant, params, &*context) + nonspecific_rate;
            let survival = exposure_survival(drug_rate, dt)
                * exposure_survival(antibody_rate, dt)
                * merozoite_survival;
            variant.count = surviving(variant.count, survival, "irbc");
        }

        // 2. Immune stimulation by the surviving parasites.
        let mut merozoite_antigen = 0.0;
        for variant in tracker.iter().filter(|v| v.is_occupied()) {
            let antigen = as_antigen(variant.count);
            if let Some(id) = variant.antibody {
                context.stimulate_antibody(id, antigen);
            }
            if let Some(id) = variant.minor_antibody {
                context.stimulate_antibody(id, antigen * params.non_specific_antigenicity);
            }
            merozoite_antigen += antigen;
        }
        context.stimulate_antibody(msp, merozoite_antigen);
        context.stimulate_antibody(
            nonspecific,
            merozoite_antigen * params.non_specific_antigenicity,
        );

        // 3. Antigenic switching.
        let switches = Self::switch_variants(params, tracker, context, rng)?;

        // 4. Growth, gametocyte diversion, hepatocyte burst.
        let divert = self.state.cycle_count >= params.n_asexual_cycles_wo_gametocytes;
        let mut new_gametocytes = 0_u64;
        for variant in tracker.slots_mut() {
            if !variant.is_occupied() {
                continue;
            }
            let merozoites = scaled(variant.count, params.merozoites_per_schizont, "merozoites");
            let diverted = if divert {
                scaled(merozoites, params.base_gametocyte_production, "gametocytes")
            } else {
                0
            };
            new_gametocytes = new_gametocytes.saturating_add(diverted);
            variant.count = merozoites.saturating_sub(diverted);
        }
        self.burst_hepatocytes(params, tracker);

        // 5. Reset.
        self.state.timer = 0.0;
        self.state.cycle_count = self.state.cycle_count.saturating_add(1);

        let report = CycleReport {
            ruptured_irbc,
            new_gametocytes,
            switches,
            cycle: self.state.cycle_count,
        };
        debug!(
            cycle = report.cycle,
            ruptured = report.ruptured_irbc,
            irbc = tracker.total_irbc(),
            gametocytes = report.new_gametocytes,
            switches = report.switches,
            "asexual cycle completed"
        );

        if tracker.total_irbc() == 0 && self.state.hepatocytes == 0 {
            Ok(CycleOutcome::Extinct(report))
        } else {
            Ok(CycleOutcome::CycleCompleted(report))
        }
    }

    fn switch_variants<C, R>(
        params: &InfectionParameters,
        tracker: &mut AntigenicVariantTracker,
        context: &mut C,
        rng: &mut R,
    ) -> Result<u32, InfectionError>
    where
        C: SusceptibilityContext + ?Sized,
        R: Rng + ?Sized,
    {
        let rate = probability(params.antigen_switch_rate);
        if rate <= 0.0 {
            return Ok(0);
        }
        let mut switches = 0_u32;
        for slot in 0..tracker.len() {
            let count = tracker.variant(slot)?.count;
            if count == 0 {
                continue;
            }
            let p = match params.parasite_switch_type {
                ParasiteSwitchType::ConstantRate => rate,
                ParasiteSwitchType::RatePerParasite => {
                    1.0 - (1.0 - rate).powf(as_antigen(count))
                }
            };
            if !rng.random_bool(probability(p)) {
                continue;
            }
            let epitope = tracker.draw_unused_epitope(rng);
            let minor_epitope = tracker.minor_set().draw(rng);
            let previous = tracker.switch_variant(slot, epitope, minor_epitope)?;
            let antibody = context.register_antibody(AntibodyKind::Pfemp1Major, epitope);
            let minor_antibody =
                context.register_antibody(AntibodyKind::Pfemp1Minor, minor_epitope);
            if let Some(variant) = tracker.slots_mut().get_mut(slot) {
                variant.antibody = Some(antibody);
                variant.minor_antibody = Some(minor_antibody);
            }
            debug!(slot, from = previous, to = epitope, "antigenic switch");
            switches = switches.saturating_add(1);
        }
        Ok(switches)
    }

    /// Hepatocyte `j` seeds slot `j mod N`; the reservoir empties.
    fn burst_hepatocytes(
        &mut self,
        params: &InfectionParameters,
        tracker: &mut AntigenicVariantTracker,
    ) {
        let hepatocytes = self.state.hepatocytes;
        if hepatocytes == 0 || tracker.is_empty() {
            return;
        }
        let per_hepatocyte = scaled(1, params.merozoites_per_hepatocyte, "hepatocyte burst");
        let slots = u64::try_from(tracker.len()).unwrap_or(u64::MAX);
        let base = hepatocytes.checked_div(slots).unwrap_or(0);
        let extra = hepatocytes.checked_rem(slots).unwrap_or(0);
        for slot in 0..tracker.len() {
            let index = u64::try_from(slot).unwrap_or(u64::MAX);
            let seeded_by = if index < extra {
                base.saturating_add(1)
            } else {
                base
            };
            tracker.seed(slot, seeded_by.saturating_mul(per_hepatocyte));
        }
        debug!(hepatocytes, per_hepatocyte, "hepatocytes ruptured");
        self.state.hepatocytes = 0;
    }
}

/// Antibody kill rate per day on one variant from its major and minor
/// `PfEMP1` antibodies.
fn variant_kill_rate<C>(
    variant: &AntigenicVariant,
    params: &InfectionParameters,
    context: &C,
) -> f64
where
    C: SusceptibilityContext + ?Sized,
{
    let level = |id: Option<AntibodyId>| id.map_or(0.0, |id| context.antibody_concentration(id));
    params.antibody_irbc_killrate * level(variant.antibody)
        + params.nonspecific_killrate * level(variant.minor_antibody)
}

#[allow(clippy::cast_precision_loss)]
const fn as_antigen(count: u64) -> f64 {
    count as f64
}
