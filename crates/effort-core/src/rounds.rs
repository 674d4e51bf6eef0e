//! Per-participant stage gating for transcription rounds.
//!
//! A participant moves through `PendingFirstTask → PendingSecondTask → Done`.
//! Transcription stages are skipped when the round does not require them or
//! when the participant already finished transcription in an earlier round.

use crate::config::{MissingSubmissionPolicy, SessionConfig, TranscriptionSlot};
use crate::errors::EngineError;
use crate::evaluator::{accuracy_ratio, allowed_edits, distance_and_verdict};
use crate::model::{Participant, ParticipantRoundRecord, RecordPhase, Slot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const EXACT_MATCH_MESSAGE: &str =
    "The transcription should be exactly the same as on the image.";
pub const TOO_MANY_ERRORS_MESSAGE: &str = "This transcription appears to contain too many errors.";

/// Pages a host can ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcription(Slot),
    /// Accuracy table shown after the second transcription.
    AccuracyResults,
    Contribution,
    GroupResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskProgress {
    PendingFirstTask,
    PendingSecondTask,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    ExactMatchRequired,
    TooManyErrors,
}

/// Validation failure returned to the submitter. Nothing is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: RejectionCode,
    pub message: String,
    pub distance: usize,
    pub allowed: usize,
}

impl Rejection {
    pub fn details(&self) -> serde_json::Value {
        serde_json::json!({
            "message": self.message,
            "distance": self.distance,
            "allowed": self.allowed,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranscriptionOutcome {
    Accepted { distance: usize, ratio: f64 },
    Rejected(Rejection),
}

impl TranscriptionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TranscriptionOutcome::Accepted { .. })
    }
}

/// Score `text` against one slot without touching any participant state.
pub fn score_transcription(slot: &TranscriptionSlot, text: &str) -> TranscriptionOutcome {
    let reference = &slot.reference_text;
    let rate = slot.allowed_error_rate;
    let verdict = distance_and_verdict(text, reference.as_str(), rate);
    if verdict.accepted {
        return TranscriptionOutcome::Accepted {
            distance: verdict.distance,
            ratio: accuracy_ratio(verdict.distance, reference.max_distance()),
        };
    }

    let (code, message) = if rate > 0.0 {
        (RejectionCode::TooManyErrors, TOO_MANY_ERRORS_MESSAGE)
    } else {
        (RejectionCode::ExactMatchRequired, EXACT_MATCH_MESSAGE)
    };
    TranscriptionOutcome::Rejected(Rejection {
        code,
        message: message.to_string(),
        distance: verdict.distance,
        allowed: allowed_edits(reference.max_distance(), rate),
    })
}

#[derive(Clone)]
pub struct RoundStateMachine {
    config: Arc<SessionConfig>,
}

impl RoundStateMachine {
    pub fn new(config: Arc<SessionConfig>) -> Self {
        Self { config }
    }

    /// Whether transcription stages are live for this participant and round.
    pub fn transcription_active(
        &self,
        participant: &Participant,
        round: u32,
    ) -> Result<bool, EngineError> {
        let rc = self.config.round(round)?;
        Ok(rc.requires_transcription && !participant.transcription_done())
    }

    pub fn is_displayed(
        &self,
        participant: &Participant,
        round: u32,
        stage: Stage,
    ) -> Result<bool, EngineError> {
        match stage {
            Stage::Transcription(_) | Stage::AccuracyResults => {
                self.transcription_active(participant, round)
            }
            Stage::Contribution => {
                self.config.round(round)?;
                Ok(true)
            }
            Stage::GroupResults => Ok(participant
                .record(round)
                .map(ParticipantRoundRecord::is_settled)
                .unwrap_or(false)),
        }
    }

    /// Create the participant's record for `round` if it does not exist yet.
    ///
    /// Returns whether the transcription stages are shown this round.
    pub fn enter_round(&self, participant: &mut Participant, round: u32) -> Result<bool, EngineError> {
        if let Some(record) = participant.record(round) {
            return Ok(record.transcription_required);
        }
        let active = self.transcription_active(participant, round)?;
        let record = ParticipantRoundRecord::new(round, active, participant.transcription_done());
        participant.insert_record(record);
        debug!(participant = %participant.id, round, transcription = active, "round entered");
        Ok(active)
    }

    pub fn progress(&self, participant: &Participant, round: u32) -> TaskProgress {
        if participant.transcription_done() {
            return TaskProgress::Done;
        }
        match participant.record(round) {
            Some(r) if r.slot_accepted(Slot::First) && r.slot_accepted(Slot::Second) => {
                TaskProgress::Done
            }
            Some(r) if r.slot_accepted(Slot::First) => TaskProgress::PendingSecondTask,
            _ => TaskProgress::PendingFirstTask,
        }
    }

    /// Score a submission for `slot`. Rejections leave the participant untouched.
    pub fn submit_transcription(
        &self,
        participant: &mut Participant,
        round: u32,
        slot: Slot,
        text: &str,
    ) -> Result<TranscriptionOutcome, EngineError> {
        if !self.enter_round(participant, round)? || participant.transcription_done() {
            return Err(EngineError::StageSkipped {
                participant: participant.id.clone(),
                round,
                slot,
            });
        }
        let record = open_record(participant, round)?;
        // First must be accepted before Second; neither reopens once Second is in.
        let in_order = match slot {
            Slot::First => !record.slot_accepted(Slot::Second),
            Slot::Second => record.slot_accepted(Slot::First),
        };
        if !in_order {
            return Err(EngineError::StageOutOfOrder {
                participant: participant.id.clone(),
                round,
                slot,
            });
        }

        let slot_cfg = self.config.slot(slot);
        let (distance, ratio) = match score_transcription(slot_cfg, text) {
            TranscriptionOutcome::Accepted { distance, ratio } => (distance, ratio),
            rejected => {
                debug!(participant = %participant.id, round, %slot, "transcription rejected");
                return Ok(rejected);
            }
        };

        let id = participant.id.clone();
        let record = open_record(participant, round)?;
        record.transcribed_text = Some(text.to_string());
        record.slots_accepted[slot.index()] = true;
        record.edit_distance = distance;
        record.reference_text_length = slot_cfg.reference_text.max_distance();
        record.accuracy_ratio = ratio;
        record.payoff = 0.0;

        debug!(participant = %id, round, %slot, distance, ratio, "transcription accepted");
        Ok(TranscriptionOutcome::Accepted { distance, ratio })
    }

    /// Close the transcription stages for this participant, for this and every
    /// later round. Returns `false` when the stages were not shown.
    pub fn finish_transcription(
        &self,
        participant: &mut Participant,
        round: u32,
    ) -> Result<bool, EngineError> {
        if !self.enter_round(participant, round)? || participant.transcription_done() {
            return Ok(false);
        }
        let phase = participant
            .record(round)
            .map_or(RecordPhase::Transcribing, |r| r.phase);
        if phase == RecordPhase::Transcribing {
            self.resolve_missing_submission(participant, round)?;
        }
        participant.mark_transcription_done(round);
        if phase != RecordPhase::Settled {
            if let Some(record) = participant.record_mut(round) {
                record.transcription_done = true;
            }
        }
        info!(participant = %participant.id, round, "transcription done");
        Ok(true)
    }

    /// Apply the missing-submission policy when the stages were shown but no
    /// text was ever accepted.
    pub(crate) fn resolve_missing_submission(
        &self,
        participant: &mut Participant,
        round: u32,
    ) -> Result<(), EngineError> {
        let policy = self.config.missing_submission;
        let max_distance = self.config.slot(Slot::Second).reference_text.max_distance();
        let id = participant.id.clone();
        let record = participant
            .record_mut(round)
            .ok_or_else(|| EngineError::RoundNotEntered {
                participant: id.clone(),
                round,
            })?;
        if !record.transcription_required || record.transcribed_text.is_some() {
            return Ok(());
        }

        record.transcribed_text = Some(String::new());
        record.reference_text_length = max_distance;
        match policy {
            MissingSubmissionPolicy::Perfect => {
                record.edit_distance = 0;
                record.accuracy_ratio = 1.0;
            }
            MissingSubmissionPolicy::Zero => {
                record.edit_distance = max_distance;
                record.accuracy_ratio = 0.0;
            }
        }
        info!(participant = %id, round, ?policy, "no transcription submitted");
        Ok(())
    }
}

fn open_record(
    participant: &mut Participant,
    round: u32,
) -> Result<&mut ParticipantRoundRecord, EngineError> {
    let id = participant.id.clone();
    let record = participant
        .record_mut(round)
        .ok_or_else(|| EngineError::RoundNotEntered {
            participant: id.clone(),
            round,
        })?;
    if record.phase != RecordPhase::Transcribing {
        return Err(EngineError::TranscriptionClosed {
            participant: id,
            round,
        });
    }
    Ok(record)
}
