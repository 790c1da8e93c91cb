//! Enumeration types for the within-host malaria model.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of a single infection.
///
/// `Growing` and `EndOfCycle` are the live states; `Cleared` and `Fatal` are
/// absorbing. Once an infection reports a terminal status, further updates
/// leave it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Within an asexual cycle; the timer has not yet expired.
    Growing,
    /// The last update crossed a cycle boundary and the infection survived it.
    EndOfCycle,
    /// All parasite populations reached zero.
    Cleared,
    /// The host died from this infection.
    Fatal,
}

impl LifecycleStatus {
    /// Whether no further transitions are possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cleared | Self::Fatal)
    }
}

impl core::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Growing => write!(f, "growing"),
            Self::EndOfCycle => write!(f, "end_of_cycle"),
            Self::Cleared => write!(f, "cleared"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Model selectors
// ---------------------------------------------------------------------------

/// Which antigenic switching model is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParasiteSwitchType {
    /// Every occupied variant switches with the configured probability once
    /// per cycle, independent of its population size.
    #[default]
    ConstantRate,
    /// The configured rate applies per parasite; a variant switches if any of
    /// its parasites does, so large clones switch more often.
    RatePerParasite,
}

/// How the initial epitope repertoire of an infection is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalariaStrains {
    /// Epitopes and MSP1 type derive deterministically from the strain's
    /// antigen id, so two infections of the same strain look identical to
    /// the immune system.
    #[default]
    NonRandom,
    /// Epitopes are distinct uniform draws from the full variant space.
    Random,
}

// ---------------------------------------------------------------------------
// Antibodies
// ---------------------------------------------------------------------------

/// Antigen family an antibody is raised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntibodyKind {
    /// Circumsporozoite protein; acts on sporozoites before liver invasion.
    Csp,
    /// Merozoite surface protein 1; acts on free merozoites at rupture.
    Msp1,
    /// Major `PfEMP1` epitope on the infected red blood cell surface.
    Pfemp1Major,
    /// Minor `PfEMP1` epitope, shared by variants of the same non-specific
    /// type.
    Pfemp1Minor,
    /// Non-specific antigens shared across variants of a clone.
    NonSpecific,
}

impl core::fmt::Display for AntibodyKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Csp => write!(f, "csp"),
            Self::Msp1 => write!(f, "msp1"),
            Self::Pfemp1Major => write!(f, "pfemp1_major"),
            Self::Pfemp1Minor => write!(f, "pfemp1_minor"),
            Self::NonSpecific => write!(f, "non_specific"),
        }
    }
}
