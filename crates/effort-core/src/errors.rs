use crate::model::{GroupId, ParticipantId, Slot};
use thiserror::Error;

/// Session configuration errors. All of these are fatal for the session.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unsupported config version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("no round config for round {round} (configured rounds: {configured})")]
    MissingRound { round: u32, configured: usize },

    #[error("group size must be at least 1")]
    EmptyGroup,
}

/// Errors raised while driving participants through a round.
///
/// A rejected transcription is not an error; see
/// [`crate::rounds::TranscriptionOutcome`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    #[error("unknown group: {0}")]
    UnknownGroup(GroupId),

    #[error("participant {participant} has not entered round {round}")]
    RoundNotEntered { participant: ParticipantId, round: u32 },

    #[error("transcription stage {slot} is not shown to {participant} in round {round}")]
    StageSkipped {
        participant: ParticipantId,
        round: u32,
        slot: Slot,
    },

    #[error("transcription stage {slot} is out of order for {participant} in round {round}")]
    StageOutOfOrder {
        participant: ParticipantId,
        round: u32,
        slot: Slot,
    },

    #[error("transcription for {participant} in round {round} is closed")]
    TranscriptionClosed { participant: ParticipantId, round: u32 },

    #[error("income for {participant} in round {round} has not been computed")]
    IncomeNotComputed { participant: ParticipantId, round: u32 },

    #[error("contribution {contribution} from {participant} in round {round} outside [0, {income}]")]
    ContributionOutOfRange {
        participant: ParticipantId,
        round: u32,
        contribution: f64,
        income: f64,
    },

    #[error("no contribution recorded for {participant} in round {round}")]
    NoContribution { participant: ParticipantId, round: u32 },

    #[error("participant {participant} is not a member of group {group}")]
    NotInGroup {
        participant: ParticipantId,
        group: GroupId,
    },

    #[error("duplicate contribution from {participant} for group {group} round {round}")]
    DuplicateContribution {
        participant: ParticipantId,
        group: GroupId,
        round: u32,
    },

    #[error("group {group} round {round} waiting on contributions: {arrived}/{expected}")]
    SettlementPending {
        group: GroupId,
        round: u32,
        arrived: usize,
        expected: usize,
    },

    #[error("round {round} for {participant} is already settled")]
    RoundSettled { participant: ParticipantId, round: u32 },
}
