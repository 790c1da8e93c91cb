//! Biological parameters for the within-host infection model.
//!
//! [`InfectionParameters`] holds every process-wide constant the infection
//! engine reads: switch and kill rates, survival fractions, the sex ratio,
//! growth multipliers, and the fixed slot and stage counts. It is built
//! once at startup (from YAML or from [`Default`]), validated, wrapped in an
//! `Arc`, and shared read-only by every infection.
//!
//! [`ImmunityConfig`] tunes the concrete host antibody store in
//! [`crate::immunity`].

use std::path::Path;

use malaria_types::{MalariaStrains, ParasiteSwitchType};
use serde::Deserialize;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A parameter is outside its valid range.
    #[error("invalid parameter `{field}`: {reason}")]
    Invalid {
        /// Name of the offending parameter.
        field: &'static str,
        /// Explanation of the valid range.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

// ---------------------------------------------------------------------------
// Infection parameters
// ---------------------------------------------------------------------------

/// Immutable biological constants shared by every infection.
///
/// Rates are per day; survival and kill fractions are per cycle unless
/// stated otherwise. Counts (`variant_slots`, `gametocyte_stages`) fix the
/// shape of every infection created with these parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InfectionParameters {
    /// Which antigenic switching model is active.
    #[serde(default)]
    pub parasite_switch_type: ParasiteSwitchType,

    /// How the initial epitope repertoire is chosen.
    #[serde(default)]
    pub malaria_strains: MalariaStrains,

    /// Per-cycle switch probability (constant-rate model) or per-parasite
    /// switch rate (rate-per-parasite model).
    #[serde(default = "default_antigen_switch_rate")]
    pub antigen_switch_rate: f64,

    /// IRBC kill rate per day at full `PfEMP1` antibody concentration.
    #[serde(default = "default_antibody_irbc_killrate", alias = "antibody_IRBC_killrate")]
    pub antibody_irbc_killrate: f64,

    /// Fraction of merozoites killed at rupture at full MSP1 concentration.
    #[serde(default = "default_msp1_merozoite_kill", alias = "MSP1_merozoite_kill")]
    pub msp1_merozoite_kill: f64,

    /// IRBC kill rate per day at full non-specific or minor-epitope
    /// antibody concentration.
    #[serde(default = "default_nonspecific_killrate")]
    pub nonspecific_killrate: f64,

    /// Per-cycle survival of each immature gametocyte stage.
    #[serde(default = "default_gametocyte_stage_survival")]
    pub gametocyte_stage_survival: f64,

    /// Per-cycle survival of mature gametocytes.
    #[serde(default = "default_mature_gametocyte_survival")]
    pub mature_gametocyte_survival: f64,

    /// Male fraction of newly committed gametocytes.
    #[serde(default = "default_base_gametocyte_sexratio")]
    pub base_gametocyte_sexratio: f64,

    /// Fraction of new merozoites committed to the sexual pathway.
    #[serde(default = "default_base_gametocyte_production")]
    pub base_gametocyte_production: f64,

    /// IRBC seeded per ruptured hepatocyte.
    #[serde(default = "default_merozoites_per_hepatocyte")]
    pub merozoites_per_hepatocyte: f64,

    /// Merozoites released per schizont (per-cycle multiplication).
    #[serde(default = "default_merozoites_per_schizont")]
    pub merozoites_per_schizont: f64,

    /// Weight of non-specific antibody stimulation relative to variant count.
    #[serde(default = "default_non_specific_antigenicity")]
    pub non_specific_antigenicity: f64,

    /// Red blood cells destroyed per ruptured IRBC.
    #[serde(default = "default_rbc_destruction_multiplier", alias = "RBC_destruction_multiplier")]
    pub rbc_destruction_multiplier: f64,

    /// Completed asexual cycles before any gametocytes are produced.
    #[serde(default = "default_n_asexual_cycles_wo_gametocytes")]
    pub n_asexual_cycles_wo_gametocytes: u32,

    /// Length of one asexual blood-stage cycle in days.
    #[serde(default = "default_asexual_cycle_days")]
    pub asexual_cycle_days: f64,

    /// Liver-stage duration in days; the length of the first cycle.
    #[serde(default = "default_incubation_period_days")]
    pub incubation_period_days: f64,

    /// Number of antigenic variant slots per infection.
    #[serde(default = "default_variant_slots")]
    pub variant_slots: usize,

    /// Size of the major `PfEMP1` epitope space.
    #[serde(default = "default_pfemp1_variants")]
    pub pfemp1_variants: u32,

    /// Size of the MSP1 type space.
    #[serde(default = "default_msp_variants")]
    pub msp_variants: u32,

    /// Size of the non-specific antigen type space.
    #[serde(default = "default_nonspecific_types")]
    pub nonspecific_types: u32,

    /// Minor `PfEMP1` epitopes in each non-specific type's set. Minor
    /// epitope ids of type `t` are `t * minor_epitopes_per_set + k`.
    #[serde(default = "default_minor_epitopes_per_set")]
    pub minor_epitopes_per_set: u32,

    /// Number of gametocyte developmental stages, the last one mature.
    #[serde(default = "default_gametocyte_stages")]
    pub gametocyte_stages: usize,

    /// Probability that a new infection carries the drug resistance flag.
    #[serde(default)]
    pub drug_resistance_probability: f64,

    /// Multiplier on drug kill rates for resistant infections.
    #[serde(default = "default_resistant_drug_efficacy")]
    pub resistant_drug_efficacy: f64,

    /// Destroyed red blood cells per microliter at which the host dies.
    #[serde(default = "default_lethal_rbc_destruction")]
    pub lethal_rbc_destruction: f64,

    /// Daily exponential recovery rate of the red blood cell deficit.
    #[serde(default = "default_rbc_regeneration_per_day")]
    pub rbc_regeneration_per_day: f64,

    /// Mean sporozoites injected per infectious bite.
    #[serde(default = "default_mean_sporozoites_per_bite")]
    pub mean_sporozoites_per_bite: f64,

    /// Per-sporozoite probability of reaching and infecting a hepatocyte
    /// in a host without CSP antibodies.
    #[serde(default = "default_base_sporozoite_survival_fraction")]
    pub base_sporozoite_survival_fraction: f64,

    /// CSP antibody concentration at half-maximal sporozoite killing.
    #[serde(default = "default_antibody_csp_killing_threshold")]
    pub antibody_csp_killing_threshold: f64,

    /// Steepness of the CSP killing curve.
    #[serde(default = "default_antibody_csp_killing_invwidth")]
    pub antibody_csp_killing_invwidth: f64,
}

impl Default for InfectionParameters {
    fn default() -> Self {
        Self {
            parasite_switch_type: ParasiteSwitchType::default(),
            malaria_strains: MalariaStrains::default(),
            antigen_switch_rate: default_antigen_switch_rate(),
            antibody_irbc_killrate: default_antibody_irbc_killrate(),
            msp1_merozoite_kill: default_msp1_merozoite_kill(),
            nonspecific_killrate: default_nonspecific_killrate(),
            gametocyte_stage_survival: default_gametocyte_stage_survival(),
            mature_gametocyte_survival: default_mature_gametocyte_survival(),
            base_gametocyte_sexratio: default_base_gametocyte_sexratio(),
            base_gametocyte_production: default_base_gametocyte_production(),
            merozoites_per_hepatocyte: default_merozoites_per_hepatocyte(),
            merozoites_per_schizont: default_merozoites_per_schizont(),
            non_specific_antigenicity: default_non_specific_antigenicity(),
            rbc_destruction_multiplier: default_rbc_destruction_multiplier(),
            n_asexual_cycles_wo_gametocytes: default_n_asexual_cycles_wo_gametocytes(),
            asexual_cycle_days: default_asexual_cycle_days(),
            incubation_period_days: default_incubation_period_days(),
            variant_slots: default_variant_slots(),
            pfemp1_variants: default_pfemp1_variants(),
            msp_variants: default_msp_variants(),
            nonspecific_types: default_nonspecific_types(),
            minor_epitopes_per_set: default_minor_epitopes_per_set(),
            gametocyte_stages: default_gametocyte_stages(),
            drug_resistance_probability: 0.0,
            resistant_drug_efficacy: default_resistant_drug_efficacy(),
            lethal_rbc_destruction: default_lethal_rbc_destruction(),
            rbc_regeneration_per_day: default_rbc_regeneration_per_day(),
            mean_sporozoites_per_bite: default_mean_sporozoites_per_bite(),
            base_sporozoite_survival_fraction: default_base_sporozoite_survival_fraction(),
            antibody_csp_killing_threshold: default_antibody_csp_killing_threshold(),
            antibody_csp_killing_invwidth: default_antibody_csp_killing_invwidth(),
        }
    }
}

impl InfectionParameters {
    /// Load and validate parameters from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate parameters from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_yml::from_str(yaml)?;
        params.validate()?;
        Ok(params)
    }

    /// Size of the minor epitope id space, or `None` if it overflows `u32`.
    pub const fn minor_epitope_space(&self) -> Option<u32> {
        self.nonspecific_types.checked_mul(self.minor_epitopes_per_set)
    }

    /// Check every parameter against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fraction("antigen_switch_rate", self.antigen_switch_rate)?;
        fraction("msp1_merozoite_kill", self.msp1_merozoite_kill)?;
        fraction("gametocyte_stage_survival", self.gametocyte_stage_survival)?;
        fraction("mature_gametocyte_survival", self.mature_gametocyte_survival)?;
        fraction("base_gametocyte_sexratio", self.base_gametocyte_sexratio)?;
        fraction("base_gametocyte_production", self.base_gametocyte_production)?;
        fraction("drug_resistance_probability", self.drug_resistance_probability)?;
        fraction("resistant_drug_efficacy", self.resistant_drug_efficacy)?;
        fraction(
            "base_sporozoite_survival_fraction",
            self.base_sporozoite_survival_fraction,
        )?;

        non_negative("antibody_irbc_killrate", self.antibody_irbc_killrate)?;
        non_negative("nonspecific_killrate", self.nonspecific_killrate)?;
        non_negative("merozoites_per_hepatocyte", self.merozoites_per_hepatocyte)?;
        non_negative("merozoites_per_schizont", self.merozoites_per_schizont)?;
        non_negative("non_specific_antigenicity", self.non_specific_antigenicity)?;
        non_negative("rbc_destruction_multiplier", self.rbc_destruction_multiplier)?;
        non_negative("rbc_regeneration_per_day", self.rbc_regeneration_per_day)?;
        non_negative("mean_sporozoites_per_bite", self.mean_sporozoites_per_bite)?;
        non_negative(
            "antibody_csp_killing_threshold",
            self.antibody_csp_killing_threshold,
        )?;
        non_negative(
            "antibody_csp_killing_invwidth",
            self.antibody_csp_killing_invwidth,
        )?;

        positive("asexual_cycle_days", self.asexual_cycle_days)?;
        positive("incubation_period_days", self.incubation_period_days)?;
        positive("lethal_rbc_destruction", self.lethal_rbc_destruction)?;

        if self.variant_slots == 0 {
            return Err(ConfigError::Invalid {
                field: "variant_slots",
                reason: "at least one variant slot is required".to_owned(),
            });
        }
        let slots = u64::try_from(self.variant_slots).unwrap_or(u64::MAX);
        if u64::from(self.pfemp1_variants) <= slots {
            return Err(ConfigError::Invalid {
                field: "pfemp1_variants",
                reason: format!(
                    "epitope space ({}) must exceed variant_slots ({})",
                    self.pfemp1_variants, self.variant_slots
                ),
            });
        }
        if self.msp_variants == 0 {
            return Err(ConfigError::Invalid {
                field: "msp_variants",
                reason: "at least one MSP1 type is required".to_owned(),
            });
        }
        if self.nonspecific_types == 0 {
            return Err(ConfigError::Invalid {
                field: "nonspecific_types",
                reason: "at least one non-specific type is required".to_owned(),
            });
        }
        if self.minor_epitopes_per_set == 0 {
            return Err(ConfigError::Invalid {
                field: "minor_epitopes_per_set",
                reason: "at least one minor epitope per set is required".to_owned(),
            });
        }
        if self.minor_epitope_space().is_none() {
            return Err(ConfigError::Invalid {
                field: "minor_epitopes_per_set",
                reason: format!(
                    "{} sets of {} minor epitopes overflow the epitope id range",
                    self.nonspecific_types, self.minor_epitopes_per_set
                ),
            });
        }
        if self.gametocyte_stages < 2 {
            return Err(ConfigError::Invalid {
                field: "gametocyte_stages",
                reason: "need at least one immature and one mature stage".to_owned(),
            });
        }
        Ok(())
    }
}

fn fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is not within [0, 1]"),
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} must be finite and non-negative"),
        })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} must be finite and positive"),
        })
    }
}

// ---------------------------------------------------------------------------
// Host immunity
// ---------------------------------------------------------------------------

/// Tuning of the host antibody store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImmunityConfig {
    /// Per-antigen stimulation coefficient. One cycle's exposure to `n`
    /// antigens closes `1 - exp(-k * n)` of the gap to full concentration.
    #[serde(default = "default_stimulation_per_antigen")]
    pub stimulation_per_antigen: f64,

    /// Daily exponential decay of antibody concentration.
    #[serde(default = "default_antibody_decay_per_day")]
    pub decay_per_day: f64,

    /// Concentration of a freshly registered (naive) antibody.
    #[serde(default)]
    pub naive_concentration: f64,
}

impl Default for ImmunityConfig {
    fn default() -> Self {
        Self {
            stimulation_per_antigen: default_stimulation_per_antigen(),
            decay_per_day: default_antibody_decay_per_day(),
            naive_concentration: 0.0,
        }
    }
}

impl ImmunityConfig {
    /// Check every field against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("stimulation_per_antigen", self.stimulation_per_antigen)?;
        non_negative("decay_per_day", self.decay_per_day)?;
        fraction("naive_concentration", self.naive_concentration)
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_antigen_switch_rate() -> f64 {
    0.1
}

const fn default_antibody_irbc_killrate() -> f64 {
    2.0
}

const fn default_msp1_merozoite_kill() -> f64 {
    0.5
}

const fn default_nonspecific_killrate() -> f64 {
    0.5
}

const fn default_gametocyte_stage_survival() -> f64 {
    0.7
}

const fn default_mature_gametocyte_survival() -> f64 {
    0.5
}

const fn default_base_gametocyte_sexratio() -> f64 {
    0.2
}

const fn default_base_gametocyte_production() -> f64 {
    0.02
}

const fn default_merozoites_per_hepatocyte() -> f64 {
    15_000.0
}

const fn default_merozoites_per_schizont() -> f64 {
    16.0
}

const fn default_non_specific_antigenicity() -> f64 {
    0.2
}

const fn default_rbc_destruction_multiplier() -> f64 {
    9.5
}

const fn default_n_asexual_cycles_wo_gametocytes() -> u32 {
    1
}

const fn default_asexual_cycle_days() -> f64 {
    2.0
}

const fn default_incubation_period_days() -> f64 {
    7.0
}

const fn default_variant_slots() -> usize {
    50
}

const fn default_pfemp1_variants() -> u32 {
    1070
}

const fn default_msp_variants() -> u32 {
    100
}

const fn default_nonspecific_types() -> u32 {
    20
}

const fn default_minor_epitopes_per_set() -> u32 {
    5
}

const fn default_gametocyte_stages() -> usize {
    6
}

const fn default_resistant_drug_efficacy() -> f64 {
    0.2
}

const fn default_lethal_rbc_destruction() -> f64 {
    3.0e6
}

const fn default_rbc_regeneration_per_day() -> f64 {
    0.02
}

const fn default_mean_sporozoites_per_bite() -> f64 {
    11.0
}

const fn default_base_sporozoite_survival_fraction() -> f64 {
    0.25
}

const fn default_antibody_csp_killing_threshold() -> f64 {
    0.5
}

const fn default_antibody_csp_killing_invwidth() -> f64 {
    10.0
}

const fn default_stimulation_per_antigen() -> f64 {
    1.0e-8
}

const fn default_antibody_decay_per_day() -> f64 {
    0.005
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_are_valid() {
        let params = InfectionParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.variant_slots, 50);
        assert_eq!(params.gametocyte_stages, 6);
        assert_eq!(params.n_asexual_cycles_wo_gametocytes, 1);
    }

    #[test]
    fn parse_partial_yaml_keeps_defaults() {
        let yaml = r"
antigen_switch_rate: 0.0
merozoites_per_schizont: 10
parasite_switch_type: rate_per_parasite
malaria_strains: random
";
        let params = InfectionParameters::parse(yaml);
        assert!(params.is_ok());
        let params = params.unwrap_or_default();
        assert_eq!(params.parasite_switch_type, ParasiteSwitchType::RatePerParasite);
        assert_eq!(params.malaria_strains, MalariaStrains::Random);
        assert!(params.antigen_switch_rate.abs() < f64::EPSILON);
        assert!((params.merozoites_per_schizont - 10.0).abs() < f64::EPSILON);
        assert_eq!(params.variant_slots, 50);
    }

    #[test]
    fn legacy_key_aliases_are_accepted() {
        let yaml = r"
antibody_IRBC_killrate: 3.5
MSP1_merozoite_kill: 0.25
RBC_destruction_multiplier: 4.0
";
        let params = InfectionParameters::parse(yaml).unwrap_or_default();
        assert!((params.antibody_irbc_killrate - 3.5).abs() < f64::EPSILON);
        assert!((params.msp1_merozoite_kill - 0.25).abs() < f64::EPSILON);
        assert!((params.rbc_destruction_multiplier - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_fraction_rejected() {
        let result = InfectionParameters::parse("gametocyte_stage_survival: 1.5\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "gametocyte_stage_survival",
                ..
            })
        ));
    }

    #[test]
    fn epitope_space_must_exceed_slots() {
        let params = InfectionParameters {
            variant_slots: 10,
            pfemp1_variants: 10,
            ..InfectionParameters::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::Invalid {
                field: "pfemp1_variants",
                ..
            })
        ));
    }

    #[test]
    fn minor_epitope_sets_must_fit() {
        let empty = InfectionParameters {
            minor_epitopes_per_set: 0,
            ..InfectionParameters::default()
        };
        assert!(empty.validate().is_err());

        let huge = InfectionParameters {
            nonspecific_types: u32::MAX,
            minor_epitopes_per_set: 2,
            ..InfectionParameters::default()
        };
        assert!(matches!(
            huge.validate(),
            Err(ConfigError::Invalid {
                field: "minor_epitopes_per_set",
                ..
            })
        ));
        assert_eq!(InfectionParameters::default().minor_epitope_space(), Some(100));
    }

    #[test]
    fn single_stage_pipeline_rejected() {
        let params = InfectionParameters {
            gametocyte_stages: 1,
            ..InfectionParameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn zero_cycle_length_rejected() {
        let params = InfectionParameters {
            asexual_cycle_days: 0.0,
            ..InfectionParameters::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::Invalid {
                field: "asexual_cycle_days",
                ..
            })
        ));
    }

    #[test]
    fn nan_rate_rejected() {
        let params = InfectionParameters {
            antibody_irbc_killrate: f64::NAN,
            ..InfectionParameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn invalid_yaml_is_a_yaml_error() {
        let result = InfectionParameters::parse("variant_slots: [not, a, number]");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn immunity_defaults_valid() {
        assert!(ImmunityConfig::default().validate().is_ok());
        let bad = ImmunityConfig {
            naive_concentration: 2.0,
            ..ImmunityConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
