//! Core data structs for the within-host malaria model.
//!
//! These types are the persisted shape of an infection. Every field the
//! engine needs to resume an infection exactly is enumerated in
//! [`InfectionSnapshot`]; the encoding is left to the caller (any serde
//! format works).

use serde::{Deserialize, Serialize};

use crate::enums::LifecycleStatus;
use crate::ids::{AntibodyId, HostId, InfectionId};

// ---------------------------------------------------------------------------
// Strain
// ---------------------------------------------------------------------------

/// Identity of the parasite strain an infection was seeded with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct StrainIdentity {
    /// Antigenic identity; drives the epitope repertoire for non-random strains.
    pub antigen_id: u32,
    /// Genetic identity; recorded as the clone id of every variant.
    pub genetic_id: u32,
}

// ---------------------------------------------------------------------------
// Antigenic variants
// ---------------------------------------------------------------------------

/// One clonal antigenic variant slot of an infection.
///
/// The antibody handles are weak lookups into the host's antibody store and
/// are not persisted: they are re-resolved from the epitopes after a restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntigenicVariant {
    /// Major `PfEMP1` epitope currently expressed by this slot.
    pub epitope: u32,
    /// Minor `PfEMP1` epitope, drawn from the clone's non-specific set.
    #[serde(default)]
    pub minor_epitope: u32,
    /// Clone (genetic) identity the slot belongs to.
    pub clone: u32,
    /// Live infected red blood cells expressing this epitope.
    pub count: u64,
    /// Antibody raised against `epitope`, once registered with the host.
    #[serde(skip, default)]
    pub antibody: Option<AntibodyId>,
    /// Antibody raised against `minor_epitope`, once registered.
    #[serde(skip, default)]
    pub minor_antibody: Option<AntibodyId>,
}

impl AntigenicVariant {
    /// Create an empty slot for the given epitope.
    pub const fn new(epitope: u32, clone: u32) -> Self {
        Self {
            epitope,
            minor_epitope: 0,
            clone,
            count: 0,
            antibody: None,
            minor_antibody: None,
        }
    }

    /// Drop both antibody handles.
    pub const fn forget_antibodies(&mut self) {
        self.antibody = None;
        self.minor_antibody = None;
    }

    /// Whether the slot currently holds any parasites.
    pub const fn is_occupied(&self) -> bool {
        self.count > 0
    }
}

// ---------------------------------------------------------------------------
// Gametocytes
// ---------------------------------------------------------------------------

/// Male and female gametocyte counts at one developmental stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GametocyteCohort {
    /// Stage index, `0` is the youngest, `S - 1` is mature.
    pub stage: usize,
    /// Male gametocytes at this stage.
    pub male: u64,
    /// Female gametocytes at this stage.
    pub female: u64,
}

impl GametocyteCohort {
    /// Combined male and female count.
    pub const fn total(&self) -> u64 {
        self.male.saturating_add(self.female)
    }
}

// ---------------------------------------------------------------------------
// Cycle state
// ---------------------------------------------------------------------------

/// Timer and counters of the asexual replication cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CycleState {
    /// Days elapsed within the current cycle.
    pub timer: f64,
    /// Completed cycle boundaries. Never decreases.
    pub cycle_count: u32,
    /// Infected hepatocytes that have not yet ruptured.
    pub hepatocytes: u64,
}

// ---------------------------------------------------------------------------
// Parasitemia
// ---------------------------------------------------------------------------

/// Peak and duration of an infection's blood-stage parasitemia.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParasitemiaRecord {
    /// Largest total IRBC count seen after any update.
    pub peak_irbc: u64,
    /// Days elapsed since IRBC first appeared in the blood.
    pub blood_stage_days: f64,
    /// Whether IRBC have appeared yet.
    pub measuring: bool,
}

impl ParasitemiaRecord {
    /// Account for a step of `dt` days that ended with `irbc` parasites.
    ///
    /// The step on which parasites first appear adds no duration.
    pub fn record(&mut self, irbc: u64, dt: f64) {
        if self.measuring {
            self.blood_stage_days += dt;
        } else if irbc > 0 {
            self.measuring = true;
        }
        self.peak_irbc = self.peak_irbc.max(irbc);
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Complete persisted state of one infection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfectionSnapshot {
    /// Infection identifier.
    pub id: InfectionId,
    /// Host the infection lives in.
    pub host_id: HostId,
    /// Lifecycle status at the time of the snapshot.
    pub status: LifecycleStatus,
    /// Whether the infection had been updated; parameters are fixed after.
    pub updated: bool,
    /// Strain, present once parameters have been set.
    pub strain: Option<StrainIdentity>,
    /// Length of the first (liver-stage) cycle in days.
    pub incubation_days: f64,
    /// Cycle timer, cycle count, hepatocyte reservoir.
    pub cycle: CycleState,
    /// MSP1 type of the clone.
    pub msp_type: u32,
    /// Non-specific antigen type of the clone.
    pub nonspecific_type: u32,
    /// Every variant slot in slot order.
    pub variants: Vec<AntigenicVariant>,
    /// Male gametocytes per stage.
    pub male_gametocytes: Vec<u64>,
    /// Female gametocytes per stage.
    pub female_gametocytes: Vec<u64>,
    /// Drug resistance flag drawn at creation.
    pub drug_resistant: bool,
    /// Severity proxy: destroyed red blood cells per microliter of blood.
    pub rbc_destroyed_per_microliter: f64,
    /// Peak IRBC and blood-stage duration.
    pub parasitemia: ParasitemiaRecord,
}
