//! Scoring and payoff engine for multi-round real-effort sessions.
//!
//! Participants transcribe reference texts under an error tolerance; the
//! measured accuracy scales their income, which then feeds a taxed
//! public-goods contribution game settled per group and round.
//!
//! Data flows one way:
//! [`config::SessionConfig`] → [`rounds::RoundStateMachine`] →
//! [`evaluator`] → [`payoff::PayoffEngine`] → payoffs surfaced to the host.

pub mod config;
pub mod errors;
pub mod evaluator;
pub mod model;
pub mod payoff;
pub mod rounds;
pub mod session;
pub mod view;

pub use config::{
    load_config, parse_config, MissingSubmissionPolicy, ReferenceText, RoundConfig, SessionConfig,
    TranscriptionSlot, SUPPORTED_CONFIG_VERSION,
};
pub use errors::{ConfigError, EngineError};
pub use evaluator::{distance_and_verdict, DistanceVerdict};
pub use model::{
    GroupId, GroupRoster, GroupRoundRecord, Participant, ParticipantId, ParticipantRoundRecord,
    RecordPhase, Slot,
};
pub use payoff::{
    Arrival, MemberContribution, MemberPayoff, PayoffEngine, Settlement, SettlementBarrier,
};
pub use rounds::{
    score_transcription, Rejection, RejectionCode, RoundStateMachine, Stage, TaskProgress,
    TranscriptionOutcome,
};
pub use session::{RoundPhase, Session, SessionReport};
