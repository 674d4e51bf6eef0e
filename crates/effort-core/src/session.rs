//! Single-threaded session driver.
//!
//! Owns every participant and routes host events through the round state
//! machine, the payoff engine and the settlement barrier. Hosts that run
//! participants on separate threads can use those components directly.

use crate::config::SessionConfig;
use crate::errors::{ConfigError, EngineError};
use crate::model::{
    GroupId, GroupRoster, GroupRoundRecord, Participant, ParticipantId, RecordPhase, Slot,
};
use crate::payoff::{Arrival, PayoffEngine, Settlement, SettlementBarrier};
use crate::rounds::{RoundStateMachine, Stage, TaskProgress, TranscriptionOutcome};
use crate::view::{self, AccuracyRow, ContributionView, GroupResultsView, TranscriptionView};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Lifecycle of one group's round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    AwaitingTranscription,
    AwaitingContributions,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRoundReport {
    pub group: GroupId,
    pub round: u32,
    #[serde(flatten)]
    pub record: GroupRoundRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub participants: Vec<Participant>,
    pub groups: Vec<GroupRoundReport>,
}

pub struct Session {
    config: Arc<SessionConfig>,
    rounds: RoundStateMachine,
    payoffs: PayoffEngine,
    barrier: SettlementBarrier,
    rosters: BTreeMap<GroupId, GroupRoster>,
    participants: BTreeMap<ParticipantId, Participant>,
}

impl Session {
    pub fn new(config: Arc<SessionConfig>, rosters: Vec<GroupRoster>) -> Result<Self, EngineError> {
        let size = config.group_size()?;
        let mut participants = BTreeMap::new();
        let mut by_group = BTreeMap::new();
        for roster in rosters {
            if roster.size() != size {
                return Err(ConfigError::Invalid(format!(
                    "group {} has {} members, players_per_group is {}",
                    roster.group,
                    roster.size(),
                    size
                ))
                .into());
            }
            for member in &roster.members {
                let p = Participant::new(member.clone(), roster.group.clone());
                if participants.insert(member.clone(), p).is_some() {
                    return Err(ConfigError::Invalid(format!(
                        "participant {} assigned to more than one group",
                        member
                    ))
                    .into());
                }
            }
            if by_group.contains_key(&roster.group) {
                return Err(
                    ConfigError::Invalid(format!("group {} listed twice", roster.group)).into(),
                );
            }
            by_group.insert(roster.group.clone(), roster);
        }
        info!(
            groups = by_group.len(),
            participants = participants.len(),
            rounds = config.num_rounds(),
            "session created"
        );

        Ok(Self {
            rounds: RoundStateMachine::new(Arc::clone(&config)),
            payoffs: PayoffEngine::new(Arc::clone(&config)),
            barrier: SettlementBarrier::new(Arc::clone(&config)),
            config,
            rosters: by_group,
            participants,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn is_displayed(
        &self,
        id: &ParticipantId,
        round: u32,
        stage: Stage,
    ) -> Result<bool, EngineError> {
        self.rounds.is_displayed(self.get(id)?, round, stage)
    }

    pub fn progress(&self, id: &ParticipantId, round: u32) -> Result<TaskProgress, EngineError> {
        Ok(self.rounds.progress(self.get(id)?, round))
    }

    pub fn enter_round(&mut self, id: &ParticipantId, round: u32) -> Result<bool, EngineError> {
        let p = get_mut(&mut self.participants, id)?;
        self.rounds.enter_round(p, round)
    }

    pub fn submit_transcription(
        &mut self,
        id: &ParticipantId,
        round: u32,
        slot: Slot,
        text: &str,
    ) -> Result<TranscriptionOutcome, EngineError> {
        let p = get_mut(&mut self.participants, id)?;
        self.rounds.submit_transcription(p, round, slot, text)
    }

    pub fn finish_transcription(&mut self, id: &ParticipantId, round: u32) -> Result<bool, EngineError> {
        let p = get_mut(&mut self.participants, id)?;
        self.rounds.finish_transcription(p, round)
    }

    pub fn compute_income(&mut self, id: &ParticipantId, round: u32) -> Result<f64, EngineError> {
        let p = get_mut(&mut self.participants, id)?;
        self.payoffs.compute_income(p, round)
    }

    /// Record a contribution and, when it completes the group, settle the
    /// round and copy payoffs into every member's record.
    pub fn contribute(
        &mut self,
        id: &ParticipantId,
        round: u32,
        amount: f64,
    ) -> Result<Arrival, EngineError> {
        let p = get_mut(&mut self.participants, id)?;
        let group = p.group.clone();
        let roster = self
            .rosters
            .get(&group)
            .ok_or_else(|| EngineError::UnknownGroup(group.clone()))?;

        let contribution = self.payoffs.submit_contribution(p, round, amount)?;
        let arrival = self.barrier.arrive(roster, round, contribution)?;
        if let Arrival::Released(settlement) = &arrival {
            for member in &roster.members {
                let m = get_mut(&mut self.participants, member)?;
                self.payoffs.apply_settlement(m, settlement)?;
            }
        }
        Ok(arrival)
    }

    pub fn settlement(&self, group: &GroupId, round: u32) -> Option<Arc<Settlement>> {
        self.barrier.settlement(group, round)
    }

    pub fn group_record(&self, group: &GroupId, round: u32) -> Option<GroupRoundRecord> {
        self.settlement(group, round).map(|s| s.record)
    }

    pub fn round_phase(&self, group: &GroupId, round: u32) -> Result<RoundPhase, EngineError> {
        let roster = self
            .rosters
            .get(group)
            .ok_or_else(|| EngineError::UnknownGroup(group.clone()))?;
        if self.barrier.settlement(group, round).is_some() {
            return Ok(RoundPhase::Settled);
        }
        let transcribing = roster.members.iter().any(|m| {
            !matches!(
                self.participants.get(m).and_then(|p| p.record(round)),
                Some(r) if r.phase != RecordPhase::Transcribing
            )
        });
        if transcribing {
            Ok(RoundPhase::AwaitingTranscription)
        } else {
            Ok(RoundPhase::AwaitingContributions)
        }
    }

    pub fn transcription_view(&self, slot: Slot) -> TranscriptionView {
        view::transcription_view(&self.config, slot)
    }

    pub fn accuracy_history(&self, id: &ParticipantId) -> Result<Vec<AccuracyRow>, EngineError> {
        Ok(view::accuracy_history(self.get(id)?))
    }

    pub fn contribution_view(
        &self,
        id: &ParticipantId,
        round: u32,
    ) -> Result<ContributionView, EngineError> {
        view::contribution_view(&self.config, self.get(id)?, round)
    }

    pub fn group_results_view(
        &self,
        id: &ParticipantId,
        round: u32,
    ) -> Result<Option<GroupResultsView>, EngineError> {
        let p = self.get(id)?;
        Ok(self
            .barrier
            .settlement(&p.group, round)
            .and_then(|s| view::group_results_view(&s, p)))
    }

    pub fn report(&self) -> SessionReport {
        let mut groups = Vec::new();
        for group in self.rosters.keys() {
            for round in 1..=self.config.num_rounds() {
                if let Some(s) = self.barrier.settlement(group, round) {
                    groups.push(GroupRoundReport {
                        group: group.clone(),
                        round,
                        record: s.record,
                    });
                }
            }
        }
        SessionReport {
            participants: self.participants.values().cloned().collect(),
            groups,
        }
    }

    fn get(&self, id: &ParticipantId) -> Result<&Participant, EngineError> {
        self.participants
            .get(id)
            .ok_or_else(|| EngineError::UnknownParticipant(id.clone()))
    }
}

fn get_mut<'a>(
    participants: &'a mut BTreeMap<ParticipantId, Participant>,
    id: &ParticipantId,
) -> Result<&'a mut Participant, EngineError> {
    participants
        .get_mut(id)
        .ok_or_else(|| EngineError::UnknownParticipant(id.clone()))
}
