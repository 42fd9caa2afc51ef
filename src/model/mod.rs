//! Row and enum types shared between the staging and core schemas.
//!
//! Every table this crate touches gets its own struct here rather than a
//! stringly-keyed map. Enumerated columns are real Rust enums
//! (`strum`-derived, the way `annonars`/`varfish-server-worker` model
//! bounded string columns) so an invalid value is a parse error at the row
//! boundary, not a typo that propagates silently.

pub mod core;
pub mod staging;

use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum InfoType {
    #[strum(serialize = "DIRECT")]
    Direct,
    #[strum(serialize = "DEPENDENT")]
    Dependent,
    #[strum(serialize = "SEQUENCE_MATCH")]
    SequenceMatch,
    #[strum(serialize = "CHECKSUM")]
    Checksum,
    #[strum(serialize = "INFERRED_PAIR")]
    InferredPair,
    #[strum(serialize = "MISC")]
    Misc,
    #[strum(serialize = "PROJECTION")]
    Projection,
    #[strum(serialize = "UNMAPPED")]
    Unmapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum OxStatus {
    #[strum(serialize = "DUMP_OUT")]
    DumpOut,
    #[strum(serialize = "FAILED_PRIORITY")]
    FailedPriority,
    #[strum(serialize = "MULTI_DELETE")]
    MultiDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
pub enum EnsemblObjectType {
    Gene,
    Transcript,
    Translation,
}

impl EnsemblObjectType {
    /// Precedence used by the BiomartNormaliser: Gene > Translation >
    /// Transcript.
    fn rank(self) -> u8 {
        match self {
            EnsemblObjectType::Gene => 2,
            EnsemblObjectType::Translation => 1,
            EnsemblObjectType::Transcript => 0,
        }
    }

    pub fn collapse(a: EnsemblObjectType, b: EnsemblObjectType) -> EnsemblObjectType {
        if a.rank() >= b.rank() {
            a
        } else {
            b
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum DumpedState {
    #[strum(serialize = "MAPPED")]
    Mapped,
    #[strum(serialize = "UNMAPPED_NO_STABLE_ID")]
    UnmappedNoStableId,
    #[strum(serialize = "UNMAPPED_NO_MAPPING")]
    UnmappedNoMapping,
    #[strum(serialize = "UNMAPPED_MASTER_FAILED")]
    UnmappedMasterFailed,
    #[strum(serialize = "UNMAPPED_NO_MASTER")]
    UnmappedNoMaster,
    #[strum(serialize = "UNMAPPED_FAILED_MAP")]
    UnmappedFailedMap,
    /// Preserved verbatim across re-runs; never cleared by the reset phase
    ///.
    #[strum(serialize = "NO_DUMP_ANOTHER_PRIORITY")]
    NoDumpAnotherPriority,
}

impl DumpedState {
    /// `true` for the one dumped value that the reset phase must not clear.
    pub fn survives_reset(self) -> bool {
        matches!(self, DumpedState::NoDumpAnotherPriority)
    }
}

/// The five enumerated unmapped-reason kinds from  Per-source
/// threshold reasons are not part of this enum: they are looked up/created
/// dynamically by [`crate::unmapped_reasons::UnmappedReasonRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnmappedReasonKind {
    NoStableId,
    FailedMap,
    NoMapping,
    MasterFailed,
    NoMaster,
}

impl UnmappedReasonKind {
    pub fn summary(self) -> &'static str {
        match self {
            UnmappedReasonKind::NoStableId => "No stable id",
            UnmappedReasonKind::FailedMap => "Failed to map",
            UnmappedReasonKind::NoMapping => "No mapping",
            UnmappedReasonKind::MasterFailed => "Master failed to map",
            UnmappedReasonKind::NoMaster => "No master xref",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            UnmappedReasonKind::NoStableId => {
                "Could not find the stable id in the current ensembl database"
            }
            UnmappedReasonKind::FailedMap => "Could not map to any ensembl entity",
            UnmappedReasonKind::NoMapping => "No mapping could be found at all",
            UnmappedReasonKind::MasterFailed => {
                "The master xref for this dependent xref failed to map"
            }
            UnmappedReasonKind::NoMaster => "No master xref could be found for this dependent xref",
        }
    }

    pub fn dumped_state(self) -> DumpedState {
        match self {
            UnmappedReasonKind::NoStableId => DumpedState::UnmappedNoStableId,
            UnmappedReasonKind::FailedMap => DumpedState::UnmappedFailedMap,
            UnmappedReasonKind::NoMapping => DumpedState::UnmappedNoMapping,
            UnmappedReasonKind::MasterFailed => DumpedState::UnmappedMasterFailed,
            UnmappedReasonKind::NoMaster => DumpedState::UnmappedNoMaster,
        }
    }
}

/// Truncates an xref description to 255 characters, appending ` /.../` when
/// truncation happened. Operates on `char`
/// boundaries so multi-byte accessions never get split.
pub fn truncate_description(description: &str) -> (String, bool) {
    const MAX_LEN: usize = 255;
    const SUFFIX: &str = " /.../";
    if description.chars().count() <= MAX_LEN {
        return (description.to_string(), false);
    }
    let budget = MAX_LEN - SUFFIX.len();
    let truncated: String = description.chars().take(budget).collect();
    (format!("{truncated}{SUFFIX}"), true)
}
