//! Drug resistance flag and clearance/fatality monitoring.
//!
//! The monitor owns the infection's lifecycle status. Severity is tracked as
//! destroyed red blood cells per microliter of blood: every rupture adds to
//! it, and the host regenerates a fixed fraction per day. Crossing the
//! lethal threshold makes the infection fatal.

use malaria_types::LifecycleStatus;

use crate::config::InfectionParameters;

/// Result of a monitor evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Parasites remain and the host is alive.
    Ongoing,
    /// No parasites of any kind remain.
    Cleared,
    /// RBC destruction exceeded the lethal threshold.
    Fatal,
}

/// Lifecycle state machine and severity proxy of one infection.
#[derive(Debug, Clone, PartialEq)]
pub struct ClearanceMonitor {
    drug_resistant: bool,
    rbc_destroyed_per_microliter: f64,
    status: LifecycleStatus,
}

impl ClearanceMonitor {
    /// A monitor for a new, growing infection.
    pub const fn new(drug_resistant: bool) -> Self {
        Self {
            drug_resistant,
            rbc_destroyed_per_microliter: 0.0,
            status: LifecycleStatus::Growing,
        }
    }

    /// Rebuild a monitor from persisted state.
    pub const fn restore(
        drug_resistant: bool,
        rbc_destroyed_per_microliter: f64,
        status: LifecycleStatus,
    ) -> Self {
        Self {
            drug_resistant,
            rbc_destroyed_per_microliter,
            status,
        }
    }

    /// Whether the infection carries the resistance flag.
    pub const fn drug_resistant(&self) -> bool {
        self.drug_resistant
    }

    /// Current lifecycle status.
    pub const fn status(&self) -> LifecycleStatus {
        self.status
    }

    /// Destroyed red blood cells per microliter attributed to this infection.
    pub const fn rbc_destroyed_per_microliter(&self) -> f64 {
        self.rbc_destroyed_per_microliter
    }

    /// Multiplier applied to drug kill rates.
    pub const fn resistance_scale(&self, params: &InfectionParameters) -> f64 {
        if self.drug_resistant {
            params.resistant_drug_efficacy
        } else {
            1.0
        }
    }

    /// Regenerate red blood cells over `dt` days and leave the end-of-cycle
    /// state.
    pub fn on_step(&mut self, dt: f64, params: &InfectionParameters) {
        if self.status.is_terminal() {
            return;
        }
        let retained = (-params.rbc_regeneration_per_day * dt).exp();
        if retained.is_finite() {
            self.rbc_destroyed_per_microliter *= retained.clamp(0.0, 1.0);
        }
        if self.status == LifecycleStatus::EndOfCycle {
            self.status = LifecycleStatus::Growing;
        }
    }

    /// Account for the red blood cells destroyed by a rupture and mark the
    /// end of a cycle.
    #[allow(clippy::cast_precision_loss)]
    pub fn on_cycle_boundary(
        &mut self,
        ruptured_irbc: u64,
        inv_microliters_blood: f64,
        params: &InfectionParameters,
    ) {
        if self.status.is_terminal() {
            return;
        }
        let destroyed =
            ruptured_irbc as f64 * params.rbc_destruction_multiplier * inv_microliters_blood;
        if destroyed.is_finite() && destroyed > 0.0 {
            self.rbc_destroyed_per_microliter += destroyed;
        }
        self.status = LifecycleStatus::EndOfCycle;
    }

    /// Check for death or clearance. Fatal takes precedence over cleared.
    pub fn evaluate(
        &self,
        irbc: u64,
        gametocytes: u64,
        hepatocytes: u64,
        params: &InfectionParameters,
    ) -> Evaluation {
        if self.rbc_destroyed_per_microliter > params.lethal_rbc_destruction {
            Evaluation::Fatal
        } else if irbc == 0 && gametocytes == 0 && hepatocytes == 0 {
            Evaluation::Cleared
        } else {
            Evaluation::Ongoing
        }
    }

    /// Apply an evaluation to the lifecycle state. Terminal states are
    /// absorbing.
    pub fn apply(&mut self, evaluation: Evaluation) -> LifecycleStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        match evaluation {
            Evaluation::Ongoing => {}
            Evaluation::Cleared => self.status = LifecycleStatus::Cleared,
            Evaluation::Fatal => self.status = LifecycleStatus::Fatal,
        }
        self.status
    }

    /// Force clearance, used for external curative removal.
    pub fn mark_cleared(&mut self) {
        if !self.status.is_terminal() {
            self.status = LifecycleStatus::Cleared;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> InfectionParameters {
        InfectionParameters {
            rbc_destruction_multiplier: 10.0,
            lethal_rbc_destruction: 100.0,
            rbc_regeneration_per_day: 0.1,
            resistant_drug_efficacy: 0.2,
            ..InfectionParameters::default()
        }
    }

    #[test]
    fn resistance_scale_follows_flag() {
        let params = params();
        assert!((ClearanceMonitor::new(false).resistance_scale(&params) - 1.0).abs() < f64::EPSILON);
        assert!((ClearanceMonitor::new(true).resistance_scale(&params) - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn rupture_accumulates_and_regenerates() {
        let params = params();
        let mut monitor = ClearanceMonitor::new(false);
        monitor.on_cycle_boundary(50, 0.1, &params);
        assert!((monitor.rbc_destroyed_per_microliter() - 50.0).abs() < 1e-9);
        assert_eq!(monitor.status(), LifecycleStatus::EndOfCycle);

        monitor.on_step(1.0, &params);
        assert!(monitor.rbc_destroyed_per_microliter() < 50.0);
        assert_eq!(monitor.status(), LifecycleStatus::Growing);
    }

    #[test]
    fn fatal_takes_precedence_over_cleared() {
        let params = params();
        let mut monitor = ClearanceMonitor::new(false);
        monitor.on_cycle_boundary(200, 0.1, &params);
        assert_eq!(monitor.evaluate(0, 0, 0, &params), Evaluation::Fatal);
    }

    #[test]
    fn cleared_requires_every_population_empty() {
        let params = params();
        let monitor = ClearanceMonitor::new(false);
        assert_eq!(monitor.evaluate(0, 0, 0, &params), Evaluation::Cleared);
        assert_eq!(monitor.evaluate(1, 0, 0, &params), Evaluation::Ongoing);
        assert_eq!(monitor.evaluate(0, 1, 0, &params), Evaluation::Ongoing);
        assert_eq!(monitor.evaluate(0, 0, 1, &params), Evaluation::Ongoing);
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let params = params();
        let mut monitor = ClearanceMonitor::new(false);
        assert_eq!(monitor.apply(Evaluation::Cleared), LifecycleStatus::Cleared);
        assert_eq!(monitor.apply(Evaluation::Fatal), LifecycleStatus::Cleared);
        monitor.on_cycle_boundary(1_000, 1.0, &params);
        assert!(monitor.rbc_destroyed_per_microliter().abs() < f64::EPSILON);
        monitor.on_step(1.0, &params);
        assert_eq!(monitor.status(), LifecycleStatus::Cleared);
    }
}
