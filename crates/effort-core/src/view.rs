//! Values the host renders on each page.

use crate::config::SessionConfig;
use crate::errors::EngineError;
use crate::evaluator::text_len;
use crate::model::{Participant, RecordPhase, Slot};
use crate::payoff::Settlement;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionView {
    pub slot: Slot,
    pub reference_text: String,
    /// Percent, e.g. `90.0` for a 10% error tolerance.
    pub required_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRow {
    pub round_number: u32,
    pub reference_text_length: usize,
    pub transcribed_text_length: usize,
    pub distance: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionView {
    /// Rounded to 5 decimals.
    pub ratio: f64,
    pub income: f64,
    pub contribution_max: f64,
    /// Percent.
    pub tax: f64,
    pub transcription_round: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResultsView {
    pub total_contribution: f64,
    pub total_earnings: f64,
    pub player_earnings: f64,
    pub payoff: f64,
}

pub fn transcription_view(config: &SessionConfig, slot: Slot) -> TranscriptionView {
    let s = config.slot(slot);
    TranscriptionView {
        slot,
        reference_text: s.reference_text.as_str().to_string(),
        required_accuracy: s.required_accuracy_percent(),
    }
}

/// One row per round in which a transcription was measured.
pub fn accuracy_history(participant: &Participant) -> Vec<AccuracyRow> {
    participant
        .records()
        .filter_map(|r| {
            let text = r.transcribed_text.as_deref()?;
            Some(AccuracyRow {
                round_number: r.round_number,
                reference_text_length: r.reference_text_length,
                transcribed_text_length: text_len(text),
                distance: r.edit_distance,
                ratio: r.accuracy_ratio,
            })
        })
        .collect()
}

pub fn contribution_view(
    config: &SessionConfig,
    participant: &Participant,
    round: u32,
) -> Result<ContributionView, EngineError> {
    let rc = config.round(round)?;
    let record = participant
        .record(round)
        .filter(|r| r.phase >= RecordPhase::Contributing)
        .ok_or_else(|| EngineError::IncomeNotComputed {
            participant: participant.id.clone(),
            round,
        })?;
    Ok(ContributionView {
        ratio: round5(participant.worst_ratio()),
        income: record.income,
        contribution_max: record.income,
        tax: rc.tax_rate * 100.0,
        transcription_round: rc.requires_transcription,
    })
}

/// `None` until the participant's round is settled.
pub fn group_results_view(
    settlement: &Settlement,
    participant: &Participant,
) -> Option<GroupResultsView> {
    let record = participant.record(settlement.round)?;
    if !record.is_settled() {
        return None;
    }
    Some(GroupResultsView {
        total_contribution: settlement.record.total_contribution,
        total_earnings: settlement.record.total_earnings,
        player_earnings: settlement.record.individual_share,
        payoff: record.payoff,
    })
}

fn round5(x: f64) -> f64 {
    (x * 1e5).round() / 1e5
}
