use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt, str::FromStr};

use crate::error::BracketError;

// ── Identifiers ────────────────────────────────────────────────────────

/// Dense, globally unique match ordinal. Advancement edges point at these.
pub type DisplayOrder = u32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(raw: impl Into<String>) -> Self {
        ParticipantId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(raw: &str) -> Self {
        ParticipantId(raw.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(raw: String) -> Self {
        ParticipantId(raw)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    pub fn new(raw: impl Into<String>) -> Self {
        MatchId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MatchId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Bracket vocabulary ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    SingleElimination,
    DoubleElimination,
    DoubleEliminationSplit,
}

impl Format {
    pub fn is_double(&self) -> bool {
        !matches!(self, Format::SingleElimination)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Format::SingleElimination => "single_elimination",
            Format::DoubleElimination => "double_elimination",
            Format::DoubleEliminationSplit => "double_elimination_split",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Format {
    type Err = BracketError;

    /// Accepts the canonical names plus the loose aliases tournament organizers type in
    /// ("double", "DE", "sabo_de16", ...). Case, `-`, `_` and spaces are ignored.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|ch| !matches!(ch, '_' | '-' | ' '))
            .collect();
        match normalized.as_str() {
            "singleelimination" | "single" | "elimination" | "se" => Ok(Format::SingleElimination),
            "doubleelimination" | "double" | "de" => Ok(Format::DoubleElimination),
            "doubleeliminationsplit" | "splitdoubleelimination" | "split" | "sabo" | "sabode16"
            | "sabode32" | "de16" | "de32" | "sabodouble16" | "sabodouble32" => {
                Ok(Format::DoubleEliminationSplit)
            }
            _ => Err(BracketError::UnsupportedFormat(raw.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BracketType {
    #[serde(rename = "WB")]
    Winners,
    #[serde(rename = "LB")]
    Losers,
    #[serde(rename = "LB-A")]
    LosersA,
    #[serde(rename = "LB-B")]
    LosersB,
    #[serde(rename = "GF")]
    GrandFinal,
}

impl BracketType {
    pub fn code(&self) -> &'static str {
        match self {
            BracketType::Winners => "WB",
            BracketType::Losers => "LB",
            BracketType::LosersA => "LB-A",
            BracketType::LosersB => "LB-B",
            BracketType::GrandFinal => "GF",
        }
    }

    pub fn is_losers(&self) -> bool {
        matches!(self, BracketType::Losers | BracketType::LosersA | BracketType::LosersB)
    }
}

impl fmt::Display for BracketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BracketGroup {
    A,
    B,
}

impl fmt::Display for BracketGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BracketGroup::A => f.write_str("A"),
            BracketGroup::B => f.write_str("B"),
        }
    }
}

/// One of the two player positions of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    #[serde(rename = "slot1")]
    One,
    #[serde(rename = "slot2")]
    Two,
}

impl Slot {
    /// Odd match numbers feed slot 1 of the next round, even ones slot 2.
    pub fn for_match_number(number: u32) -> Slot {
        if number % 2 == 1 {
            Slot::One
        } else {
            Slot::Two
        }
    }

    pub fn index(self) -> usize {
        match self {
            Slot::One => 0,
            Slot::Two => 1,
        }
    }

    pub fn other(self) -> Slot {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }

    pub fn both() -> [Slot; 2] {
        [Slot::One, Slot::Two]
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::One => f.write_str("slot1"),
            Slot::Two => f.write_str("slot2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStatus {
    AwaitingPlayers,
    Ready,
    InProgress,
    Completed,
    /// A bracket-reset decider that was not needed.
    Skipped,
}

impl MatchStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, MatchStatus::Completed | MatchStatus::Skipped)
    }

    pub fn is_playable(&self) -> bool {
        matches!(self, MatchStatus::Ready | MatchStatus::InProgress)
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchStatus::AwaitingPlayers => "awaiting-players",
            MatchStatus::Ready => "ready",
            MatchStatus::InProgress => "in-progress",
            MatchStatus::Completed => "completed",
            MatchStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Winner,
    Loser,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Winner => f.write_str("winner"),
            Outcome::Loser => f.write_str("loser"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedingMode {
    /// 1 v N, 2 v N-1, interleaved so the top seeds meet as late as possible.
    #[default]
    Standard,
    /// 1 v 2, 3 v 4, ... in list order.
    Sequential,
}

impl FromStr for SeedingMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" | "seeded" => Ok(SeedingMode::Standard),
            "sequential" | "list" | "in-order" => Ok(SeedingMode::Sequential),
            other => Err(format!("unknown seeding mode \"{other}\"")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BracketOptions {
    pub allow_grand_final_reset: bool,
    pub race_to: Option<u32>,
    pub seeding: SeedingMode,
}

impl Default for BracketOptions {
    fn default() -> Self {
        BracketOptions {
            allow_grand_final_reset: true,
            race_to: None,
            seeding: SeedingMode::Standard,
        }
    }
}

// ── Matches ────────────────────────────────────────────────────────────

/// Destination of a winner or loser: a match plus the slot it fills there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub display_order: DisplayOrder,
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: MatchId,
    pub bracket_type: BracketType,
    pub bracket_group: Option<BracketGroup>,
    pub stage_round: u32,
    pub match_number: u32,
    pub display_order: DisplayOrder,
    pub round_label: String,
    pub slots: [Option<ParticipantId>; 2],
    pub scores: Option<[u32; 2]>,
    pub status: MatchStatus,
    pub winner_id: Option<ParticipantId>,
    pub winner_advances_to: Option<Target>,
    pub loser_advances_to: Option<Target>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn player(&self, slot: Slot) -> Option<&ParticipantId> {
        self.slots[slot.index()].as_ref()
    }

    pub fn has_both_players(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_some())
    }

    pub fn slot_of(&self, participant: &ParticipantId) -> Option<Slot> {
        Slot::both()
            .into_iter()
            .find(|slot| self.player(*slot) == Some(participant))
    }

    pub fn loser_id(&self) -> Option<&ParticipantId> {
        let winner = self.winner_id.as_ref()?;
        let winner_slot = self.slot_of(winner)?;
        self.player(winner_slot.other())
    }

    pub fn round_ref(&self) -> RoundRef {
        RoundRef {
            bracket_type: self.bracket_type,
            bracket_group: self.bracket_group,
            stage_round: self.stage_round,
        }
    }
}

/// Persisted shape of a match, one record per match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: MatchId,
    pub bracket_type: BracketType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bracket_group: Option<BracketGroup>,
    pub stage_round: u32,
    pub match_number: u32,
    pub display_order: DisplayOrder,
    pub round_label: String,
    pub slot1_player: Option<ParticipantId>,
    pub slot2_player: Option<ParticipantId>,
    #[serde(default)]
    pub slot1_score: Option<u32>,
    #[serde(default)]
    pub slot2_score: Option<u32>,
    pub status: MatchStatus,
    #[serde(default)]
    pub winner_id: Option<ParticipantId>,
    #[serde(default)]
    pub winner_advances_to: Option<DisplayOrder>,
    #[serde(default)]
    pub loser_advances_to: Option<DisplayOrder>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Match> for MatchRecord {
    fn from(m: &Match) -> Self {
        MatchRecord {
            id: m.id.clone(),
            bracket_type: m.bracket_type,
            bracket_group: m.bracket_group,
            stage_round: m.stage_round,
            match_number: m.match_number,
            display_order: m.display_order,
            round_label: m.round_label.clone(),
            slot1_player: m.slots[0].clone(),
            slot2_player: m.slots[1].clone(),
            slot1_score: m.scores.map(|s| s[0]),
            slot2_score: m.scores.map(|s| s[1]),
            status: m.status,
            winner_id: m.winner_id.clone(),
            winner_advances_to: m.winner_advances_to.map(|t| t.display_order),
            loser_advances_to: m.loser_advances_to.map(|t| t.display_order),
            completed_at: m.completed_at,
        }
    }
}

// ── Results ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRef {
    pub bracket_type: BracketType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bracket_group: Option<BracketGroup>,
    pub stage_round: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub participant_id: ParticipantId,
    pub outcome: Outcome,
    pub target_id: MatchId,
    pub target: Target,
}

/// Everything one accepted result changed downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancementEffects {
    pub match_id: MatchId,
    pub display_order: DisplayOrder,
    pub winner_id: ParticipantId,
    pub loser_id: ParticipantId,
    pub placements: Vec<Placement>,
    pub newly_ready: Vec<MatchId>,
    pub skipped: Vec<MatchId>,
    pub completed_round: Option<RoundRef>,
    pub champion_id: Option<ParticipantId>,
    /// True when the same result had already been recorded and nothing changed.
    pub already_recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSnapshot {
    pub format: Format,
    pub bracket_size: u32,
    pub participant_count: usize,
    pub matches: Vec<MatchRecord>,
    pub champion_id: Option<ParticipantId>,
    pub terminal: bool,
    pub fault: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandingState {
    Alive,
    Eliminated,
    Champion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub participant_id: ParticipantId,
    pub seed: u32,
    pub state: StandingState,
    pub wins: u32,
    pub losses: u32,
    pub received_bye: bool,
    pub current_match: Option<MatchId>,
}
