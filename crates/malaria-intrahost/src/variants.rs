//! Clonal antigenic variant registry of one infection.
//!
//! The tracker owns a fixed number of variant slots, each expressing one
//! major `PfEMP1` epitope and one minor epitope, and carrying the IRBC
//! sub-population that expresses them. No two slots express the same major
//! epitope; minor epitopes come from the clone's non-specific set and may
//! repeat. Slots are only
//! mutated by the asexual cycle engine during cycle-boundary processing and
//! by the controller when the infection is initialised or restored;
//! external callers get read access only.

use malaria_types::AntigenicVariant;
use rand::Rng;

use crate::error::InfectionError;

/// The contiguous block of minor epitope ids belonging to one non-specific
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinorEpitopeSet {
    first: u32,
    size: u32,
}

impl MinorEpitopeSet {
    /// The set of `nonspecific_type`, holding `per_set` epitopes.
    pub const fn for_type(nonspecific_type: u32, per_set: u32) -> Self {
        Self {
            first: nonspecific_type.saturating_mul(per_set),
            size: if per_set == 0 { 1 } else { per_set },
        }
    }

    /// Epitope at position `index`, wrapping around the set.
    pub const fn nth(&self, index: u32) -> u32 {
        match index.checked_rem(self.size) {
            Some(offset) => self.first.saturating_add(offset),
            None => self.first,
        }
    }

    /// Draw an epitope of the set uniformly.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        self.nth(rng.random_range(0..self.size))
    }

    /// Whether `epitope` belongs to the set.
    pub const fn contains(&self, epitope: u32) -> bool {
        match epitope.checked_sub(self.first) {
            Some(offset) => offset < self.size,
            None => false,
        }
    }
}

/// Registry of an infection's antigenic variant slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntigenicVariantTracker {
    slots: Vec<AntigenicVariant>,
    variant_space: u32,
    minor_set: MinorEpitopeSet,
}

impl AntigenicVariantTracker {
    /// Create `capacity` empty slots expressing epitopes `0..capacity`.
    ///
    /// `variant_space` must exceed `capacity`; parameter validation
    /// guarantees it.
    pub fn new(capacity: usize, variant_space: u32, clone: u32) -> Self {
        let slots = (0..capacity)
            .map(|i| AntigenicVariant::new(u32::try_from(i).unwrap_or(u32::MAX), clone))
            .collect();
        Self {
            slots,
            variant_space,
            minor_set: MinorEpitopeSet::for_type(0, 1),
        }
    }

    /// Rebuild a tracker from persisted slots.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::SnapshotMismatch`] if the slot count
    /// differs from `capacity`, an epitope is outside the variant space, two
    /// slots share an epitope, or a minor epitope is outside `minor_set`.
    pub fn restore(
        slots: Vec<AntigenicVariant>,
        capacity: usize,
        variant_space: u32,
        minor_set: MinorEpitopeSet,
    ) -> Result<Self, InfectionError> {
        if slots.len() != capacity {
            return Err(InfectionError::SnapshotMismatch {
                reason: format!("{} variant slots, expected {capacity}", slots.len()),
            });
        }
        let mut seen: Vec<u32> = slots.iter().map(|v| v.epitope).collect();
        seen.sort_unstable();
        if seen.windows(2).any(|w| w.first() == w.get(1)) {
            return Err(InfectionError::SnapshotMismatch {
                reason: "duplicate epitope across variant slots".to_owned(),
            });
        }
        if seen.last().is_some_and(|&max| max >= variant_space) {
            return Err(InfectionError::SnapshotMismatch {
                reason: format!("epitope outside variant space of {variant_space}"),
            });
        }
        if let Some(stray) = slots.iter().find(|v| !minor_set.contains(v.minor_epitope)) {
            return Err(InfectionError::SnapshotMismatch {
                reason: format!("minor epitope {} outside its set", stray.minor_epitope),
            });
        }
        let slots = slots
            .into_iter()
            .map(|mut v| {
                v.forget_antibodies();
                v
            })
            .collect();
        Ok(Self {
            slots,
            variant_space,
            minor_set,
        })
    }

    /// Number of slots (the fixed variant capacity).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the tracker has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Size of the epitope space switches draw from.
    pub const fn variant_space(&self) -> u32 {
        self.variant_space
    }

    /// Minor epitopes available to this clone.
    pub const fn minor_set(&self) -> MinorEpitopeSet {
        self.minor_set
    }

    /// The variant in `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`InfectionError::Index`] if `slot` is out of range.
    pub fn variant(&self, slot: usize) -> Result<&AntigenicVariant, InfectionError> {
        self.slots.get(slot).ok_or(InfectionError::Index {
            what: "variant slot",
            index: slot,
            len: self.slots.len(),
        })
    }

    /// Iterate over all slots in order.
    pub fn iter(&self) -> impl Iterator<Item = &AntigenicVariant> {
        self.slots.iter()
    }

    /// Slots currently holding parasites.
    pub fn occupied_slots(&self) -> usize {
        self.slots.iter().filter(|v| v.is_occupied()).count()
    }

    /// Total IRBC across every slot, saturating.
    pub fn total_irbc(&self) -> u64 {
        self.slots
            .iter()
            .fold(0_u64, |acc, v| acc.saturating_add(v.count))
    }

    /// Epitopes currently expressed, in slot order.
    pub fn epitopes(&self) -> Vec<u32> {
        self.slots.iter().map(|v| v.epitope).collect()
    }

    /// Draw an epitope uniformly from those no slot currently expresses.
    ///
    /// Because the variant space exceeds the slot count there is always at
    /// least one candidate.
    pub fn draw_unused_epitope<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let mut in_use = self.epitopes();
        in_use.sort_unstable();
        in_use.dedup();
        let used = u32::try_from(in_use.len()).unwrap_or(u32::MAX);
        let free = self.variant_space.saturating_sub(used).max(1);
        let mut pick = rng.random_range(0..free);
        // Map the pick onto the free epitopes by stepping over every used
        // epitope at or below it.
        for &taken in &in_use {
            if taken <= pick {
                pick = pick.saturating_add(1);
            } else {
                break;
            }
        }
        pick
    }

    /// Mutable access for the cycle engine.
    pub(crate) fn slots_mut(&mut self) -> &mut [AntigenicVariant] {
        &mut self.slots
    }

    /// Replace the major and minor epitopes of `slot`, dropping its
    /// antibody handles.
    ///
    /// Returns the previous major epitope.
    pub(crate) fn switch_variant(
        &mut self,
        slot: usize,
        epitope: u32,
        minor_epitope: u32,
    ) -> Result<u32, InfectionError> {
        if let Some(held_by) = self
            .slots
            .iter()
            .position(|v| v.epitope == epitope)
            .filter(|&held| held != slot)
        {
            return Err(InfectionError::EpitopeInUse { epitope, held_by });
        }
        let len = self.slots.len();
        let variant = self.slots.get_mut(slot).ok_or(InfectionError::Index {
            what: "variant slot",
            index: slot,
            len,
        })?;
        let previous = variant.epitope;
        variant.epitope = epitope;
        variant.minor_epitope = minor_epitope;
        variant.forget_antibodies();
        Ok(previous)
    }

    /// Assign the deterministic repertoire of a non-random strain: slot `i`
    /// expresses `(antigen_id * N + i) mod space` and the `i`-th minor
    /// epitope of `minor_set`, wrapping.
    pub(crate) fn assign_non_random(
        &mut self,
        antigen_id: u32,
        clone: u32,
        minor_set: MinorEpitopeSet,
    ) {
        let space = u64::from(self.variant_space);
        let n = u64::try_from(self.slots.len()).unwrap_or(u64::MAX);
        let base = u64::from(antigen_id).saturating_mul(n);
        for (i, variant) in self.slots.iter_mut().enumerate() {
            let offset = u64::try_from(i).unwrap_or(u64::MAX);
            let epitope = base.saturating_add(offset).checked_rem(space).unwrap_or(0);
            variant.epitope = u32::try_from(epitope).unwrap_or(0);
            variant.minor_epitope = minor_set.nth(u32::try_from(i).unwrap_or(u32::MAX));
            variant.clone = clone;
            variant.forget_antibodies();
        }
        self.minor_set = minor_set;
    }

    /// Assign distinct uniform epitopes to every slot, each with a uniform
    /// minor epitope from `minor_set`.
    pub(crate) fn assign_random<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        clone: u32,
        minor_set: MinorEpitopeSet,
    ) {
        let mut taken: Vec<u32> = Vec::with_capacity(self.slots.len());
        for variant in &mut self.slots {
            let free = self
                .variant_space
                .saturating_sub(u32::try_from(taken.len()).unwrap_or(u32::MAX))
                .max(1);
            let mut pick = rng.random_range(0..free);
            for &used in &taken {
                if used <= pick {
                    pick = pick.saturating_add(1);
                } else {
                    break;
                }
            }
            let at = taken.partition_point(|&used| used < pick);
            taken.insert(at, pick);
            variant.epitope = pick;
            variant.minor_epitope = minor_set.draw(rng);
            variant.clone = clone;
            variant.forget_antibodies();
        }
        self.minor_set = minor_set;
    }

    /// Add `count` IRBC to `slot`, saturating.
    pub(crate) fn seed(&mut self, slot: usize, count: u64) {
        if let Some(variant) = self.slots.get_mut(slot) {
            variant.count = variant.count.saturating_add(count);
        }
    }

    /// Zero every sub-population.
    pub(crate) fn clear_counts(&mut self) {
        for variant in &mut self.slots {
            variant.count = 0;
        }
    }
}
