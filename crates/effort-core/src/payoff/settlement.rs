use crate::config::RoundConfig;
use crate::errors::{ConfigError, EngineError};
use crate::model::{GroupId, GroupRoundRecord, ParticipantId};
use serde::{Deserialize, Serialize};

/// A member's income and declared contribution, as handed to settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberContribution {
    pub participant: ParticipantId,
    pub income: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberPayoff {
    pub participant: ParticipantId,
    pub income: f64,
    pub contribution: f64,
    pub taxed_contribution: f64,
    pub payoff: f64,
}

/// Outcome of one group's round: the group totals and every member's payoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub group: GroupId,
    pub round: u32,
    pub record: GroupRoundRecord,
    pub payoffs: Vec<MemberPayoff>,
}

impl Settlement {
    pub fn payoff_for(&self, participant: &ParticipantId) -> Option<&MemberPayoff> {
        self.payoffs.iter().find(|p| &p.participant == participant)
    }
}

/// Taxes each contribution, multiplies the pool and splits it equally.
///
/// Requires exactly `group_size` contributions; anything less is reported as
/// pending rather than settled partially.
pub fn settle(
    group: &GroupId,
    round: u32,
    rc: &RoundConfig,
    group_size: usize,
    contributions: &[MemberContribution],
) -> Result<Settlement, EngineError> {
    if group_size == 0 {
        return Err(ConfigError::EmptyGroup.into());
    }
    if contributions.len() != group_size {
        return Err(EngineError::SettlementPending {
            group: group.clone(),
            round,
            arrived: contributions.len(),
            expected: group_size,
        });
    }

    let taxed: Vec<f64> = contributions
        .iter()
        .map(|c| c.contribution * rc.tax_rate)
        .collect();
    let total_contribution: f64 = taxed.iter().sum();
    let total_earnings = total_contribution * rc.multiplier;
    let individual_share = total_earnings / group_size as f64;

    let payoffs = contributions
        .iter()
        .zip(taxed)
        .map(|(c, taxed_contribution)| MemberPayoff {
            participant: c.participant.clone(),
            income: c.income,
            contribution: c.contribution,
            taxed_contribution,
            payoff: c.income - taxed_contribution + individual_share,
        })
        .collect();

    Ok(Settlement {
        group: group.clone(),
        round,
        record: GroupRoundRecord {
            total_contribution,
            total_earnings,
            individual_share,
        },
        payoffs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rc(tax_rate: f64, multiplier: f64) -> RoundConfig {
        RoundConfig {
            requires_transcription: true,
            tax_rate,
            multiplier,
            baseline_endowment: 100.0,
        }
    }

    fn member(id: &str, income: f64, contribution: f64) -> MemberContribution {
        MemberContribution {
            participant: ParticipantId::new(id),
            income,
            contribution,
        }
    }

    #[test]
    fn test_two_member_worked_example() {
        let contributions = vec![member("a", 80.0, 40.0), member("b", 80.0, 40.0)];
        let s = settle(&GroupId::new("g"), 1, &rc(0.5, 2.0), 2, &contributions).unwrap();

        assert_eq!(s.record.total_contribution, 40.0);
        assert_eq!(s.record.total_earnings, 80.0);
        assert_eq!(s.record.individual_share, 40.0);
        for p in &s.payoffs {
            assert_eq!(p.taxed_contribution, 20.0);
            assert_eq!(p.payoff, 100.0);
        }
    }

    #[test]
    fn test_share_is_equal_regardless_of_contribution() {
        let contributions = vec![
            member("a", 100.0, 100.0),
            member("b", 100.0, 0.0),
            member("c", 50.0, 10.0),
        ];
        let s = settle(&GroupId::new("g"), 2, &rc(1.0, 1.5), 3, &contributions).unwrap();
        assert_eq!(s.record.total_contribution, 110.0);
        assert_eq!(s.record.total_earnings, 165.0);
        assert_eq!(s.record.individual_share, 55.0);
        assert_eq!(s.payoff_for(&ParticipantId::new("a")).unwrap().payoff, 55.0);
        assert_eq!(s.payoff_for(&ParticipantId::new("b")).unwrap().payoff, 155.0);
        assert_eq!(s.payoff_for(&ParticipantId::new("c")).unwrap().payoff, 95.0);
    }

    #[test]
    fn test_partial_group_is_pending() {
        let contributions = vec![member("a", 80.0, 40.0)];
        let err = settle(&GroupId::new("g"), 1, &rc(0.5, 2.0), 2, &contributions).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SettlementPending {
                arrived: 1,
                expected: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_group_is_config_error() {
        let err = settle(&GroupId::new("g"), 1, &rc(0.5, 2.0), 0, &[]).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::EmptyGroup)));
    }
}
