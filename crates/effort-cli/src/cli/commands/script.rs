//! Recorded session scripts: group rosters plus the ordered host events.

use anyhow::Context;
use effort_core::{GroupRoster, ParticipantId, Slot};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub groups: Vec<GroupRoster>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Event {
    EnterRound {
        participant: ParticipantId,
        round: u32,
    },
    Transcribe {
        participant: ParticipantId,
        round: u32,
        slot: Slot,
        text: String,
    },
    FinishTranscription {
        participant: ParticipantId,
        round: u32,
    },
    ComputeIncome {
        participant: ParticipantId,
        round: u32,
    },
    /// Income is computed first if the host skipped that step.
    Contribute {
        participant: ParticipantId,
        round: u32,
        amount: f64,
    },
}

impl Event {
    pub fn participant(&self) -> &ParticipantId {
        match self {
            Event::EnterRound { participant, .. }
            | Event::Transcribe { participant, .. }
            | Event::FinishTranscription { participant, .. }
            | Event::ComputeIncome { participant, .. }
            | Event::Contribute { participant, .. } => participant,
        }
    }
}

pub fn parse_script(raw: &str) -> anyhow::Result<Script> {
    let script: Script = serde_yaml::from_str(raw).context("failed to parse event script")?;
    if script.groups.is_empty() {
        anyhow::bail!("event script declares no groups");
    }
    Ok(script)
}

pub fn load_script(path: &Path) -> anyhow::Result<Script> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    parse_script(&raw)
}
