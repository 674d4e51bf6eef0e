use crate::errors::ConfigError;
use crate::evaluator::text_len;
use crate::model::Slot;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// Settings for one round. Round keys also accept the short names used by
/// older session files (`transcription`, `tax`, `end`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundConfig {
    #[serde(alias = "transcription")]
    pub requires_transcription: bool,
    #[serde(alias = "tax")]
    pub tax_rate: f64,
    pub multiplier: f64,
    #[serde(alias = "end")]
    pub baseline_endowment: f64,
}

/// Immutable reference text and the length it normalizes distances by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ReferenceText {
    text: String,
    max_distance: usize,
}

impl ReferenceText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let max_distance = text_len(&text);
        Self { text, max_distance }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Character length of the text.
    pub fn max_distance(&self) -> usize {
        self.max_distance
    }
}

impl From<String> for ReferenceText {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<ReferenceText> for String {
    fn from(reference: ReferenceText) -> Self {
        reference.text
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSlot {
    pub reference_text: ReferenceText,
    pub allowed_error_rate: f64,
}

impl TranscriptionSlot {
    /// Minimum accuracy shown to participants, in percent.
    pub fn required_accuracy_percent(&self) -> f64 {
        100.0 * (1.0 - self.allowed_error_rate)
    }
}

/// How a transcription stage that was shown but never submitted is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSubmissionPolicy {
    /// Distance 0, ratio 1. Matches the behaviour of earlier sessions.
    #[default]
    Perfect,
    /// Distance equal to the reference length, ratio 0.
    Zero,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub version: u32,
    pub players_per_group: usize,
    pub slots: [TranscriptionSlot; 2],
    pub rounds: Vec<RoundConfig>,
    #[serde(default)]
    pub missing_submission: MissingSubmissionPolicy,
}

impl SessionConfig {
    /// Config for a 1-based round number.
    pub fn round(&self, round: u32) -> Result<&RoundConfig, ConfigError> {
        round
            .checked_sub(1)
            .and_then(|idx| self.rounds.get(idx as usize))
            .ok_or(ConfigError::MissingRound {
                round,
                configured: self.rounds.len(),
            })
    }

    pub fn slot(&self, slot: Slot) -> &TranscriptionSlot {
        &self.slots[slot.index()]
    }

    pub fn num_rounds(&self) -> u32 {
        self.rounds.len() as u32
    }

    pub fn group_size(&self) -> Result<usize, ConfigError> {
        if self.players_per_group == 0 {
            return Err(ConfigError::EmptyGroup);
        }
        Ok(self.players_per_group)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SUPPORTED_CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                supported: SUPPORTED_CONFIG_VERSION,
            });
        }
        self.group_size()?;
        if self.rounds.is_empty() {
            return Err(ConfigError::Invalid("config has no rounds".into()));
        }
        for slot in Slot::ALL {
            let rate = self.slot(slot).allowed_error_rate;
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "slot {}: allowed_error_rate {} outside [0, 1]",
                    slot, rate
                )));
            }
        }
        for (idx, rc) in self.rounds.iter().enumerate() {
            let round = idx + 1;
            if !(0.0..=1.0).contains(&rc.tax_rate) {
                return Err(ConfigError::Invalid(format!(
                    "round {}: tax_rate {} outside [0, 1]",
                    round, rc.tax_rate
                )));
            }
            if !rc.multiplier.is_finite() || rc.multiplier < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "round {}: multiplier {} must be finite and >= 0",
                    round, rc.multiplier
                )));
            }
            if !rc.baseline_endowment.is_finite() || rc.baseline_endowment < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "round {}: baseline_endowment {} must be finite and >= 0",
                    round, rc.baseline_endowment
                )));
            }
        }
        Ok(())
    }
}

pub fn parse_config(raw: &str) -> Result<SessionConfig, ConfigError> {
    let cfg: SessionConfig = serde_yaml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> Result<SessionConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&raw)
}
