//! Shared type definitions for the within-host malaria model.
//!
//! This crate is the single source of truth for the data shared between the
//! infection engine and its callers: identifiers, lifecycle and model
//! selector enums, and the persisted infection snapshot.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifiers for hosts, infections, and antibodies
//! - [`enums`] -- Lifecycle status, switch and strain model selectors, antibody kinds
//! - [`structs`] -- Variants, gametocyte cohorts, cycle state, parasitemia, snapshots

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{AntibodyKind, LifecycleStatus, MalariaStrains, ParasiteSwitchType};
pub use ids::{AntibodyId, HostId, InfectionId};
pub use structs::{
    AntigenicVariant, CycleState, GametocyteCohort, InfectionSnapshot, ParasitemiaRecord,
    StrainIdentity,
};
