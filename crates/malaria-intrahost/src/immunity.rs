//! Host-side antibody store and drug exposure.
//!
//! An infection never owns antibodies. It asks its host's
//! [`SusceptibilityContext`] for a handle to the antibody raised against a
//! given antigen, reads concentrations through that handle, and reports
//! antigen exposure back so the host can mount a response. Several
//! infections in one host share the same store; the `&mut` borrow taken by
//! each update serialises them.
//!
//! [`HostImmunity`] is the concrete store used by [`crate::host::MalariaHost`].

use std::collections::BTreeMap;

use malaria_types::{AntibodyId, AntibodyKind};
use tracing::debug;

use crate::config::ImmunityConfig;

/// The host-side collaborator an infection reads immunity and drug effects
/// from.
pub trait SusceptibilityContext {
    /// Return the handle of the antibody against `(kind, variant)`,
    /// registering a naive antibody if none exists yet.
    fn register_antibody(&mut self, kind: AntibodyKind, variant: u32) -> AntibodyId;

    /// Current concentration of an antibody in `[0, 1]`. Unknown handles read
    /// as zero.
    fn antibody_concentration(&self, antibody: AntibodyId) -> f64;

    /// Report `antigen` units of exposure to the antigen an antibody targets.
    fn stimulate_antibody(&mut self, antibody: AntibodyId, antigen: f64);

    /// Drug kill rate per day acting on infected red blood cells.
    fn drug_irbc_kill_rate(&self) -> f64;

    /// Drug kill rate per day acting on gametocytes.
    fn drug_gametocyte_kill_rate(&self) -> f64;
}

/// A single antibody tracked by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Antibody {
    /// Antigen family.
    pub kind: AntibodyKind,
    /// Variant within the family.
    pub variant: u32,
    /// Concentration in `[0, 1]`.
    pub concentration: f64,
}

/// Antibody store and drug state of one host.
#[derive(Debug, Clone)]
pub struct HostImmunity {
    config: ImmunityConfig,
    antibodies: Vec<Antibody>,
    index: BTreeMap<(AntibodyKind, u32), AntibodyId>,
    concentration_floor: f64,
    drug_irbc_kill_rate: f64,
    drug_gametocyte_kill_rate: f64,
}

impl HostImmunity {
    /// Create an empty store with no drug on board.
    pub fn new(config: ImmunityConfig) -> Self {
        Self {
            config,
            antibodies: Vec::new(),
            index: BTreeMap::new(),
            concentration_floor: 0.0,
            drug_irbc_kill_rate: 0.0,
            drug_gametocyte_kill_rate: 0.0,
        }
    }

    /// Number of distinct antibodies registered.
    pub fn len(&self) -> usize {
        self.antibodies.len()
    }

    /// Whether no antibody has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.antibodies.is_empty()
    }

    /// Look up an antibody by handle.
    pub fn antibody(&self, id: AntibodyId) -> Option<&Antibody> {
        usize::try_from(id.index())
            .ok()
            .and_then(|i| self.antibodies.get(i))
    }

    /// Look up the handle for `(kind, variant)` without registering.
    pub fn find(&self, kind: AntibodyKind, variant: u32) -> Option<AntibodyId> {
        self.index.get(&(kind, variant)).copied()
    }

    /// Exponential decay of every antibody over `dt` days, never below the
    /// concentration floor.
    pub fn decay(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let retained = (-self.config.decay_per_day * dt).exp();
        let floor = self.concentration_floor;
        for antibody in &mut self.antibodies {
            antibody.concentration = (antibody.concentration * retained).max(floor);
        }
    }

    /// Raise every antibody, present and future, to at least `floor`.
    ///
    /// Models passively transferred or vaccine-induced antibody levels.
    pub fn set_concentration_floor(&mut self, floor: f64) {
        let floor = if floor.is_nan() { 0.0 } else { floor.clamp(0.0, 1.0) };
        self.concentration_floor = floor;
        for antibody in &mut self.antibodies {
            antibody.concentration = antibody.concentration.max(floor);
        }
    }

    /// Set one antibody's concentration, clamped to `[floor, 1]`.
    ///
    /// Returns whether the handle was known.
    pub fn set_concentration(&mut self, id: AntibodyId, concentration: f64) -> bool {
        let floor = self.concentration_floor;
        let Some(target) = usize::try_from(id.index())
            .ok()
            .and_then(|i| self.antibodies.get_mut(i))
        else {
            return false;
        };
        let level = if concentration.is_nan() { 0.0 } else { concentration };
        target.concentration = level.clamp(floor, 1.0);
        true
    }

    /// Drive every antibody, present and future, to full concentration.
    pub fn saturate(&mut self) {
        self.set_concentration_floor(1.0);
    }

    /// Set drug kill rates (per day). Negative or NaN rates are treated as
    /// no drug.
    pub fn set_drug_kill_rates(&mut self, irbc: f64, gametocyte: f64) {
        self.drug_irbc_kill_rate = non_negative_rate(irbc);
        self.drug_gametocyte_kill_rate = non_negative_rate(gametocyte);
        debug!(
            irbc = self.drug_irbc_kill_rate,
            gametocyte = self.drug_gametocyte_kill_rate,
            "drug kill rates updated"
        );
    }
}

fn non_negative_rate(rate: f64) -> f64 {
    if rate.is_nan() { 0.0 } else { rate.max(0.0) }
}

impl SusceptibilityContext for HostImmunity {
    fn register_antibody(&mut self, kind: AntibodyKind, variant: u32) -> AntibodyId {
        if let Some(id) = self.find(kind, variant) {
            return id;
        }
        // The arena never approaches u32::MAX entries; a saturated handle
        // simply reads as an unknown antibody.
        let id = AntibodyId(u32::try_from(self.antibodies.len()).unwrap_or(u32::MAX));
        self.antibodies.push(Antibody {
            kind,
            variant,
            concentration: self.config.naive_concentration.max(self.concentration_floor),
        });
        self.index.insert((kind, variant), id);
        id
    }

    fn antibody_concentration(&self, antibody: AntibodyId) -> f64 {
        self.antibody(antibody).map_or(0.0, |a| a.concentration)
    }

    fn stimulate_antibody(&mut self, antibody: AntibodyId, antigen: f64) {
        if antigen.is_nan() || antigen <= 0.0 {
            return;
        }
        let response = 1.0 - (-self.config.stimulation_per_antigen * antigen).exp();
        let Some(target) = usize::try_from(antibody.index())
            .ok()
            .and_then(|i| self.antibodies.get_mut(i))
        else {
            return;
        };
        let gap = 1.0 - target.concentration;
        target.concentration = (target.concentration + gap * response).clamp(0.0, 1.0);
    }

    fn drug_irbc_kill_rate(&self) -> f64 {
        self.drug_irbc_kill_rate
    }

    fn drug_gametocyte_kill_rate(&self) -> f64 {
        self.drug_gametocyte_kill_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HostImmunity {
        HostImmunity::new(ImmunityConfig::default())
    }

    #[test]
    fn register_is_idempotent() {
        let mut immunity = store();
        let a = immunity.register_antibody(AntibodyKind::Pfemp1Major, 12);
        let b = immunity.register_antibody(AntibodyKind::Pfemp1Major, 12);
        let c = immunity.register_antibody(AntibodyKind::Msp1, 12);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(immunity.len(), 2);
    }

    #[test]
    fn naive_antibody_starts_at_configured_level() {
        let mut immunity = HostImmunity::new(ImmunityConfig {
            naive_concentration: 0.1,
            ..ImmunityConfig::default()
        });
        let id = immunity.register_antibody(AntibodyKind::Csp, 0);
        assert!((immunity.antibody_concentration(id) - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn stimulation_grows_toward_one() {
        let mut immunity = store();
        let id = immunity.register_antibody(AntibodyKind::Pfemp1Major, 3);
        immunity.stimulate_antibody(id, 1.0e8);
        let first = immunity.antibody_concentration(id);
        immunity.stimulate_antibody(id, 1.0e8);
        let second = immunity.antibody_concentration(id);
        assert!(first > 0.0);
        assert!(second > first);
        assert!(second <= 1.0);
    }

    #[test]
    fn stimulation_is_proportional_to_exposure() {
        let mut immunity = store();
        let low = immunity.register_antibody(AntibodyKind::Pfemp1Major, 1);
        let high = immunity.register_antibody(AntibodyKind::Pfemp1Major, 2);
        immunity.stimulate_antibody(low, 1.0e6);
        immunity.stimulate_antibody(high, 1.0e7);
        assert!(immunity.antibody_concentration(high) > immunity.antibody_concentration(low));
    }

    #[test]
    fn zero_or_negative_antigen_is_ignored() {
        let mut immunity = store();
        let id = immunity.register_antibody(AntibodyKind::Msp1, 0);
        immunity.stimulate_antibody(id, 0.0);
        immunity.stimulate_antibody(id, -5.0);
        assert!(immunity.antibody_concentration(id).abs() < f64::EPSILON);
    }

    #[test]
    fn decay_respects_floor() {
        let mut immunity = store();
        let id = immunity.register_antibody(AntibodyKind::Msp1, 0);
        immunity.stimulate_antibody(id, 1.0e9);
        let before = immunity.antibody_concentration(id);
        immunity.decay(10.0);
        let after = immunity.antibody_concentration(id);
        assert!(after < before);

        immunity.set_concentration_floor(0.9);
        immunity.decay(1000.0);
        assert!((immunity.antibody_concentration(id) - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn saturate_applies_to_future_antibodies() {
        let mut immunity = store();
        let existing = immunity.register_antibody(AntibodyKind::Msp1, 0);
        immunity.saturate();
        let later = immunity.register_antibody(AntibodyKind::Pfemp1Major, 44);
        assert!((immunity.antibody_concentration(existing) - 1.0).abs() < f64::EPSILON);
        assert!((immunity.antibody_concentration(later) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn single_antibody_level_is_clamped() {
        let mut immunity = store();
        let id = immunity.register_antibody(AntibodyKind::Pfemp1Minor, 2);
        assert!(immunity.set_concentration(id, 3.0));
        assert!((immunity.antibody_concentration(id) - 1.0).abs() < f64::EPSILON);
        assert!(immunity.set_concentration(id, f64::NAN));
        assert!(immunity.antibody_concentration(id).abs() < f64::EPSILON);
        assert!(!immunity.set_concentration(AntibodyId(99), 0.5));
    }

    #[test]
    fn unknown_handle_reads_zero() {
        let immunity = store();
        assert!(immunity.antibody_concentration(AntibodyId(99)).abs() < f64::EPSILON);
    }

    #[test]
    fn drug_rates_clamp_negative() {
        let mut immunity = store();
        immunity.set_drug_kill_rates(-1.0, f64::NAN);
        assert!(immunity.drug_irbc_kill_rate().abs() < f64::EPSILON);
        assert!(immunity.drug_gametocyte_kill_rate().abs() < f64::EPSILON);
        immunity.set_drug_kill_rates(4.0, 1.5);
        assert!((immunity.drug_irbc_kill_rate() - 4.0).abs() < f64::EPSILON);
    }
}
