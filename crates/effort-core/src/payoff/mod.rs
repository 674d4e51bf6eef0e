//! Income, contribution and group settlement.
//!
//! Per round: income is computed from the endowment and the participant's
//! worst accuracy so far, a contribution up to that income is declared, and
//! once the whole group has contributed the pool is taxed, multiplied and
//! split equally.

pub mod barrier;
pub mod settlement;

pub use barrier::{Arrival, SettlementBarrier};
pub use settlement::{settle, MemberContribution, MemberPayoff, Settlement};

use crate::config::SessionConfig;
use crate::errors::EngineError;
use crate::model::{Participant, ParticipantRoundRecord, RecordPhase};
use crate::rounds::RoundStateMachine;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct PayoffEngine {
    config: Arc<SessionConfig>,
    rounds: RoundStateMachine,
}

impl PayoffEngine {
    pub fn new(config: Arc<SessionConfig>) -> Self {
        let rounds = RoundStateMachine::new(Arc::clone(&config));
        Self { config, rounds }
    }

    /// Phase 1: `income = endowment * worst_ratio` whenever the worst ratio
    /// recorded so far is below 1.
    ///
    /// Closes the round's transcription stages. Calling it again before the
    /// contribution is declared recomputes the same value; afterwards the
    /// stored income is returned unchanged.
    pub fn compute_income(
        &self,
        participant: &mut Participant,
        round: u32,
    ) -> Result<f64, EngineError> {
        let rc = self.config.round(round)?;
        self.rounds.enter_round(participant, round)?;
        match phase(participant, round)? {
            RecordPhase::Transcribing | RecordPhase::Contributing => {}
            RecordPhase::Contributed => return Ok(record(participant, round)?.income),
            RecordPhase::Settled => {
                return Err(EngineError::RoundSettled {
                    participant: participant.id.clone(),
                    round,
                })
            }
        }

        self.rounds.resolve_missing_submission(participant, round)?;
        let (required, ratio) = {
            let r = record(participant, round)?;
            (r.transcription_required, r.accuracy_ratio)
        };
        if required {
            participant.observe_ratio(ratio);
        }

        let worst = participant.worst_ratio();
        let mut income = rc.baseline_endowment;
        if worst < 1.0 {
            income *= worst;
        }

        let id = participant.id.clone();
        let r = record_mut(participant, round)?;
        r.income = income;
        r.phase = RecordPhase::Contributing;
        info!(participant = %id, round, income, worst_ratio = worst, "income computed");
        Ok(income)
    }

    /// Phase 2: declare a contribution in `[0, income]`.
    pub fn submit_contribution(
        &self,
        participant: &mut Participant,
        round: u32,
        amount: f64,
    ) -> Result<MemberContribution, EngineError> {
        let id = participant.id.clone();
        let group = participant.group.clone();
        let r = record_mut(participant, round)?;
        match r.phase {
            RecordPhase::Contributing => {}
            RecordPhase::Transcribing => {
                return Err(EngineError::IncomeNotComputed {
                    participant: id,
                    round,
                })
            }
            RecordPhase::Contributed => {
                return Err(EngineError::DuplicateContribution {
                    participant: id,
                    group,
                    round,
                })
            }
            RecordPhase::Settled => {
                return Err(EngineError::RoundSettled {
                    participant: id,
                    round,
                })
            }
        }

        if !amount.is_finite() || amount < 0.0 || amount > r.income {
            warn!(participant = %id, round, amount, income = r.income, "contribution out of range");
            return Err(EngineError::ContributionOutOfRange {
                participant: id,
                round,
                contribution: amount,
                income: r.income,
            });
        }

        r.contribution = amount;
        r.phase = RecordPhase::Contributed;
        Ok(MemberContribution {
            participant: id,
            income: r.income,
            contribution: amount,
        })
    }

    /// Phase 3 fan-out: copy the participant's payoff out of a settlement.
    pub fn apply_settlement(
        &self,
        participant: &mut Participant,
        settlement: &Settlement,
    ) -> Result<f64, EngineError> {
        let id = participant.id.clone();
        let member = settlement
            .payoff_for(&id)
            .ok_or_else(|| EngineError::NotInGroup {
                participant: id.clone(),
                group: settlement.group.clone(),
            })?;
        let r = record_mut(participant, settlement.round)?;
        match r.phase {
            RecordPhase::Contributed => {
                r.payoff = member.payoff;
                r.phase = RecordPhase::Settled;
                Ok(member.payoff)
            }
            RecordPhase::Settled => Ok(r.payoff),
            RecordPhase::Transcribing | RecordPhase::Contributing => {
                Err(EngineError::NoContribution {
                    participant: id,
                    round: settlement.round,
                })
            }
        }
    }
}

fn phase(participant: &Participant, round: u32) -> Result<RecordPhase, EngineError> {
    record(participant, round).map(|r| r.phase)
}

fn record(participant: &Participant, round: u32) -> Result<&ParticipantRoundRecord, EngineError> {
    participant
        .record(round)
        .ok_or_else(|| EngineError::RoundNotEntered {
            participant: participant.id.clone(),
            round,
        })
}

fn record_mut(
    participant: &mut Participant,
    round: u32,
) -> Result<&mut ParticipantRoundRecord, EngineError> {
    let id = participant.id.clone();
    participant
        .record_mut(round)
        .ok_or(EngineError::RoundNotEntered {
            participant: id,
            round,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReferenceText, RoundConfig, TranscriptionSlot, SUPPORTED_CONFIG_VERSION};
    use crate::model::{GroupId, ParticipantId, Slot};

    fn config(rounds: &[bool]) -> Arc<SessionConfig> {
        Arc::new(SessionConfig {
            version: SUPPORTED_CONFIG_VERSION,
            players_per_group: 2,
            slots: [
                TranscriptionSlot {
                    reference_text: ReferenceText::new("abcde"),
                    allowed_error_rate: 0.0,
                },
                TranscriptionSlot {
                    reference_text: ReferenceText::new("abcdefghij"),
                    allowed_error_rate: 0.3,
                },
            ],
            rounds: rounds
                .iter()
                .map(|&t| RoundConfig {
                    requires_transcription: t,
                    tax_rate: 0.5,
                    multiplier: 2.0,
                    baseline_endowment: 100.0,
                })
                .collect(),
            missing_submission: Default::default(),
        })
    }

    fn participant() -> Participant {
        Participant::new(ParticipantId::new("p1"), GroupId::new("g1"))
    }

    #[test]
    fn test_income_scaled_by_ratio() {
        let cfg = config(&[true]);
        let rounds = RoundStateMachine::new(Arc::clone(&cfg));
        let engine = PayoffEngine::new(cfg);
        let mut p = participant();

        rounds
            .submit_transcription(&mut p, 1, Slot::First, "abcde")
            .unwrap();
        rounds
            .submit_transcription(&mut p, 1, Slot::Second, "abcdefghXY")
            .unwrap();
        let income = engine.compute_income(&mut p, 1).unwrap();
        assert!((income - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_worst_ratio_sticks_across_rounds() {
        let cfg = config(&[true, false, true]);
        let rounds = RoundStateMachine::new(Arc::clone(&cfg));
        let engine = PayoffEngine::new(cfg);
        let mut p = participant();

        rounds
            .submit_transcription(&mut p, 1, Slot::First, "abcde")
            .unwrap();
        rounds
            .submit_transcription(&mut p, 1, Slot::Second, "abcdefghXY")
            .unwrap();
        engine.compute_income(&mut p, 1).unwrap();

        let skipped = engine.compute_income(&mut p, 2).unwrap();
        assert!((skipped - 80.0).abs() < 1e-9);

        rounds
            .submit_transcription(&mut p, 3, Slot::First, "abcde")
            .unwrap();
        rounds
            .submit_transcription(&mut p, 3, Slot::Second, "abcdefghij")
            .unwrap();
        let perfect = engine.compute_income(&mut p, 3).unwrap();
        assert!((perfect - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_contribution_bounds() {
        let engine = PayoffEngine::new(config(&[false]));
        let mut p = participant();

        let early = engine.submit_contribution(&mut p, 1, 10.0).unwrap_err();
        assert!(matches!(early, EngineError::RoundNotEntered { .. }));

        engine.compute_income(&mut p, 1).unwrap();
        for bad in [-1.0, 100.5, f64::NAN] {
            let err = engine.submit_contribution(&mut p, 1, bad).unwrap_err();
            assert!(matches!(
                err,
                EngineError::ContributionOutOfRange { round: 1, .. }
            ));
        }

        let ok = engine.submit_contribution(&mut p, 1, 100.0).unwrap();
        assert_eq!(ok.income, 100.0);
        let dup = engine.submit_contribution(&mut p, 1, 5.0).unwrap_err();
        assert!(matches!(dup, EngineError::DuplicateContribution { .. }));
    }

    #[test]
    fn test_income_closes_transcription() {
        let cfg = config(&[true]);
        let rounds = RoundStateMachine::new(Arc::clone(&cfg));
        let engine = PayoffEngine::new(cfg);
        let mut p = participant();

        engine.compute_income(&mut p, 1).unwrap();
        let err = rounds
            .submit_transcription(&mut p, 1, Slot::First, "abcde")
            .unwrap_err();
        assert!(matches!(err, EngineError::TranscriptionClosed { .. }));
    }

    #[test]
    fn test_settled_round_is_immutable() {
        let engine = PayoffEngine::new(config(&[false]));
        let mut p = participant();
        engine.compute_income(&mut p, 1).unwrap();
        let c = engine.submit_contribution(&mut p, 1, 40.0).unwrap();
        let other = MemberContribution {
            participant: ParticipantId::new("p2"),
            income: 100.0,
            contribution: 40.0,
        };
        let s = settle(
            &GroupId::new("g1"),
            1,
            &RoundConfig {
                requires_transcription: false,
                tax_rate: 0.5,
                multiplier: 2.0,
                baseline_endowment: 100.0,
            },
            2,
            &[c, other],
        )
        .unwrap();

        // 100 - 40 * 0.5 + (20 + 20) * 2 / 2
        assert_eq!(engine.apply_settlement(&mut p, &s).unwrap(), 120.0);
        assert!(p.record(1).unwrap().is_settled());
        let err = engine.compute_income(&mut p, 1).unwrap_err();
        assert!(matches!(err, EngineError::RoundSettled { .. }));
    }

    #[test]
    fn test_finish_after_settlement_keeps_record() {
        let cfg = config(&[true, true]);
        let rounds = RoundStateMachine::new(Arc::clone(&cfg));
        let engine = PayoffEngine::new(Arc::clone(&cfg));
        let mut p = participant();

        rounds
            .submit_transcription(&mut p, 1, Slot::First, "abcde")
            .unwrap();
        rounds
            .submit_transcription(&mut p, 1, Slot::Second, "abcdefghij")
            .unwrap();
        engine.compute_income(&mut p, 1).unwrap();
        let c = engine.submit_contribution(&mut p, 1, 50.0).unwrap();
        let s = settle(&GroupId::new("g1"), 1, cfg.round(1).unwrap(), 1, &[c]).unwrap();
        engine.apply_settlement(&mut p, &s).unwrap();

        let before = p.record(1).unwrap().clone();
        assert!(!before.transcription_done);
        assert!(rounds.finish_transcription(&mut p, 1).unwrap());

        assert_eq!(p.record(1).unwrap(), &before);
        assert!(p.transcription_done());
        assert!(!rounds.transcription_active(&p, 2).unwrap());
    }
}
