use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transcription task slot. `First` is shown before `Second` in every round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::First, Slot::Second];

    pub fn index(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::First => f.write_str("first"),
            Slot::Second => f.write_str("second"),
        }
    }
}

/// Where a participant's round record is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPhase {
    #[default]
    Transcribing,
    /// Income computed; contribution not yet submitted.
    Contributing,
    /// Contribution submitted; waiting on the group.
    Contributed,
    Settled,
}

/// One participant's state for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRoundRecord {
    pub round_number: u32,
    /// Whether the transcription stages were shown on entry to this round.
    pub transcription_required: bool,
    /// Text of the last accepted submission; `None` while nothing was accepted.
    pub transcribed_text: Option<String>,
    pub slots_accepted: [bool; 2],
    pub edit_distance: usize,
    /// Normalization length used for `accuracy_ratio`.
    pub reference_text_length: usize,
    pub accuracy_ratio: f64,
    pub transcription_done: bool,
    pub income: f64,
    pub contribution: f64,
    pub payoff: f64,
    pub phase: RecordPhase,
}

impl ParticipantRoundRecord {
    pub fn new(round_number: u32, transcription_required: bool, transcription_done: bool) -> Self {
        Self {
            round_number,
            transcription_required,
            transcribed_text: None,
            slots_accepted: [false; 2],
            edit_distance: 0,
            reference_text_length: 0,
            accuracy_ratio: 1.0,
            transcription_done,
            income: 0.0,
            contribution: 0.0,
            payoff: 0.0,
            phase: RecordPhase::Transcribing,
        }
    }

    pub fn slot_accepted(&self, slot: Slot) -> bool {
        self.slots_accepted[slot.index()]
    }

    pub fn is_settled(&self) -> bool {
        self.phase == RecordPhase::Settled
    }
}

/// Participant-scoped state carried across rounds.
///
/// `transcription_done` only ever flips false → true, and `worst_ratio` only
/// ever decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub group: GroupId,
    transcription_done: bool,
    worst_ratio: f64,
    records: BTreeMap<u32, ParticipantRoundRecord>,
}

impl Participant {
    pub fn new(id: ParticipantId, group: GroupId) -> Self {
        Self {
            id,
            group,
            transcription_done: false,
            worst_ratio: 1.0,
            records: BTreeMap::new(),
        }
    }

    pub fn transcription_done(&self) -> bool {
        self.transcription_done
    }

    /// Lowest accuracy ratio recorded in any round so far.
    pub fn worst_ratio(&self) -> f64 {
        self.worst_ratio
    }

    pub fn record(&self, round: u32) -> Option<&ParticipantRoundRecord> {
        self.records.get(&round)
    }

    /// Records in increasing round order.
    pub fn records(&self) -> impl Iterator<Item = &ParticipantRoundRecord> {
        self.records.values()
    }

    pub(crate) fn record_mut(&mut self, round: u32) -> Option<&mut ParticipantRoundRecord> {
        self.records.get_mut(&round)
    }

    pub(crate) fn insert_record(&mut self, record: ParticipantRoundRecord) {
        self.records.insert(record.round_number, record);
    }

    /// Later rounds entered ahead of time stop requiring transcription, unless
    /// a submission was already accepted there.
    pub(crate) fn mark_transcription_done(&mut self, round: u32) {
        self.transcription_done = true;
        for (_, record) in self.records.range_mut(round.saturating_add(1)..) {
            if record.phase == RecordPhase::Transcribing && record.transcribed_text.is_none() {
                record.transcription_required = false;
            }
        }
    }

    pub(crate) fn observe_ratio(&mut self, ratio: f64) {
        if ratio < self.worst_ratio {
            self.worst_ratio = ratio;
        }
    }
}

/// Derived totals for one group in one round. Written once at settlement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupRoundRecord {
    pub total_contribution: f64,
    pub total_earnings: f64,
    pub individual_share: f64,
}

/// The members of one group, as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRoster {
    pub group: GroupId,
    pub members: Vec<ParticipantId>,
}

impl GroupRoster {
    pub fn new(group: GroupId, members: Vec<ParticipantId>) -> Self {
        Self { group, members }
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.members.contains(participant)
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }
}
