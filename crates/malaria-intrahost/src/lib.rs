//! Within-host dynamics of *Plasmodium falciparum* infections.
//!
//! This crate contains the logic layer for a single infection and the host
//! that carries it -- everything that operates on parasite state without
//! touching I/O. It sits between `malaria-types` (which defines the shared
//! data structures) and the engine binary (which handles configuration and
//! orchestration across hosts).
//!
//! # Modules
//!
//! - [`asexual`] -- Blood-stage cycle timer, boundary processing, growth ([`AsexualCycleEngine`])
//! - [`config`] -- Biological parameters and immunity tuning ([`InfectionParameters`])
//! - [`error`] -- Error types for all infection operations ([`InfectionError`])
//! - [`gametocytes`] -- Staged male/female gametocyte development ([`GametocyteStagePipeline`])
//! - [`host`] -- Host aggregate, sporozoite and bite challenges, per-strain gametocytes ([`MalariaHost`])
//! - [`immunity`] -- Antibody store and drug exposure ([`SusceptibilityContext`], [`HostImmunity`])
//! - [`infection`] -- Infection lifecycle controller ([`Infection`])
//! - [`killing`] -- Survival fractions and floored integer population updates
//! - [`monitor`] -- Drug resistance flag, severity, clearance and death ([`ClearanceMonitor`])
//! - [`variants`] -- Antigenic variant slots, minor epitope sets, switching targets ([`AntigenicVariantTracker`])

pub mod asexual;
pub mod config;
pub mod error;
pub mod gametocytes;
pub mod host;
pub mod immunity;
pub mod infection;
pub mod killing;
pub mod monitor;
pub mod variants;

// Re-export primary types at crate root for convenience.
pub use asexual::{AsexualCycleEngine, CycleOutcome, CycleReport};
pub use config::{ConfigError, ImmunityConfig, InfectionParameters};
pub use error::InfectionError;
pub use gametocytes::{GametocyteStagePipeline, MatureGametocytes};
pub use host::{ADULT_MICROLITERS_BLOOD, HostContext, HostUpdate, MalariaHost};
pub use immunity::{Antibody, HostImmunity, SusceptibilityContext};
pub use infection::Infection;
pub use monitor::{ClearanceMonitor, Evaluation};
pub use variants::{AntigenicVariantTracker, MinorEpitopeSet};
