//! Settlement barrier keyed by (group, round).
//!
//! Members arrive with their contribution in any order. The arrival that
//! completes the roster runs settlement exactly once under the lock and wakes
//! every waiter; later lookups return the same shared [`Settlement`].

use super::settlement::{settle, MemberContribution, Settlement};
use crate::config::SessionConfig;
use crate::errors::{ConfigError, EngineError};
use crate::model::{GroupId, GroupRoster};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

type RoundKey = (GroupId, u32);

#[derive(Debug, Clone)]
pub enum Arrival {
    /// Contribution recorded; the group is still incomplete.
    Waiting { arrived: usize, expected: usize },
    /// This arrival completed the group and released the settlement.
    Released(Arc<Settlement>),
}

#[derive(Debug, Default)]
struct Rendezvous {
    arrivals: Vec<MemberContribution>,
    settled: Option<Arc<Settlement>>,
}

pub struct SettlementBarrier {
    config: Arc<SessionConfig>,
    state: Mutex<HashMap<RoundKey, Rendezvous>>,
    released: Condvar,
}

impl SettlementBarrier {
    pub fn new(config: Arc<SessionConfig>) -> Self {
        Self {
            config,
            state: Mutex::new(HashMap::new()),
            released: Condvar::new(),
        }
    }

    pub fn arrive(
        &self,
        roster: &GroupRoster,
        round: u32,
        contribution: MemberContribution,
    ) -> Result<Arrival, EngineError> {
        let expected = self.config.group_size()?;
        if roster.size() != expected {
            return Err(ConfigError::Invalid(format!(
                "group {} has {} members, players_per_group is {}",
                roster.group,
                roster.size(),
                expected
            ))
            .into());
        }
        if !roster.contains(&contribution.participant) {
            return Err(EngineError::NotInGroup {
                participant: contribution.participant,
                group: roster.group.clone(),
            });
        }
        let rc = self.config.round(round)?;

        let mut state = self.lock();
        let rendezvous = state.entry((roster.group.clone(), round)).or_default();
        let seen = rendezvous
            .arrivals
            .iter()
            .any(|a| a.participant == contribution.participant);
        if seen || rendezvous.settled.is_some() {
            return Err(EngineError::DuplicateContribution {
                participant: contribution.participant,
                group: roster.group.clone(),
                round,
            });
        }

        debug!(
            group = %roster.group,
            round,
            participant = %contribution.participant,
            contribution = contribution.contribution,
            "contribution arrived"
        );
        rendezvous.arrivals.push(contribution);
        let arrived = rendezvous.arrivals.len();
        if arrived < expected {
            return Ok(Arrival::Waiting { arrived, expected });
        }

        let settlement = Arc::new(settle(
            &roster.group,
            round,
            rc,
            expected,
            &rendezvous.arrivals,
        )?);
        rendezvous.settled = Some(Arc::clone(&settlement));
        drop(state);
        self.released.notify_all();

        info!(
            group = %settlement.group,
            round,
            total_contribution = settlement.record.total_contribution,
            total_earnings = settlement.record.total_earnings,
            individual_share = settlement.record.individual_share,
            "group settled"
        );
        Ok(Arrival::Released(settlement))
    }

    /// Block until the group's round is settled.
    pub fn wait(&self, group: &GroupId, round: u32) -> Arc<Settlement> {
        let key = (group.clone(), round);
        let mut state = self.lock();
        loop {
            if let Some(settlement) = settled(&state, &key) {
                return settlement;
            }
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn wait_timeout(
        &self,
        group: &GroupId,
        round: u32,
        timeout: Duration,
    ) -> Option<Arc<Settlement>> {
        let key = (group.clone(), round);
        let (state, _) = self
            .released
            .wait_timeout_while(self.lock(), timeout, |state| {
                settled(state, &key).is_none()
            })
            .unwrap_or_else(PoisonError::into_inner);
        settled(&state, &key)
    }

    pub fn settlement(&self, group: &GroupId, round: u32) -> Option<Arc<Settlement>> {
        settled(&self.lock(), &(group.clone(), round))
    }

    /// Contributions received so far for the group's round.
    pub fn arrived(&self, group: &GroupId, round: u32) -> usize {
        self.lock()
            .get(&(group.clone(), round))
            .map(|r| r.arrivals.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RoundKey, Rendezvous>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn settled(state: &HashMap<RoundKey, Rendezvous>, key: &RoundKey) -> Option<Arc<Settlement>> {
    state.get(key).and_then(|r| r.settled.clone())
}
