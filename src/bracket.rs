use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::advancement::{self, AdvancementMap};
use crate::error::BracketError;
use crate::processor::{self, Submission};
use crate::topology;
use crate::types::{
  AdvancementEffects, BracketOptions, BracketSnapshot, Format, Match, MatchId, MatchRecord, MatchStatus,
  Outcome, ParticipantId, Standing, StandingState,
};
use crate::validator::validate;

/// One running bracket: the generated structure plus the live state of every match.
///
/// Mutations take `&mut self`; share an instance across threads behind `Arc<Mutex<_>>`.
#[derive(Debug, Clone)]
pub struct BracketInstance {
  format: Format,
  options: BracketOptions,
  participants: Vec<ParticipantId>,
  bracket_size: u32,
  matches: Vec<Match>,
  index: HashMap<MatchId, usize>,
  advancement: AdvancementMap,
  champion: Option<ParticipantId>,
  fault: Option<String>,
}

impl BracketInstance {
  /// Builds the bracket for `participants`, given in seed order (seed 1 first).
  pub fn generate(
    format: Format,
    participants: Vec<ParticipantId>,
    options: BracketOptions,
  ) -> Result<Self, BracketError> {
    let mut seen = HashSet::new();
    for participant in &participants {
      if !seen.insert(participant) {
        return Err(BracketError::DuplicateParticipant(participant.clone()));
      }
    }

    let skeleton = topology::generate(format, participants.len(), &options)?;
    let advancement = advancement::build(&skeleton)?;

    let mut matches = skeleton
      .matches
      .iter()
      .map(|descriptor| {
        let edges = advancement.get(descriptor.display_order).copied().unwrap_or_default();
        Match {
          id: descriptor.id.clone(),
          bracket_type: descriptor.bracket_type(),
          bracket_group: descriptor.bracket_group,
          stage_round: descriptor.stage_round(),
          match_number: descriptor.match_number(),
          display_order: descriptor.display_order,
          round_label: descriptor.round_label.clone(),
          slots: [None, None],
          scores: None,
          status: MatchStatus::AwaitingPlayers,
          winner_id: None,
          winner_advances_to: edges.winner,
          loser_advances_to: edges.loser,
          completed_at: None,
        }
      })
      .collect::<Vec<_>>();
    let index = matches
      .iter()
      .enumerate()
      .map(|(idx, m)| (m.id.clone(), idx))
      .collect::<HashMap<_, _>>();

    let by_order = matches
      .iter()
      .enumerate()
      .map(|(idx, m)| (m.display_order, idx))
      .collect::<HashMap<_, _>>();
    for placement in advancement.seeds() {
      let participant = participants
        .get(placement.seed as usize - 1)
        .cloned()
        .ok_or_else(|| BracketError::InvariantViolation(format!("seed {} has no participant", placement.seed)))?;
      let idx = by_order.get(&placement.target.display_order).copied().ok_or_else(|| {
        BracketError::UnreachableTarget {
          origin: format!("seed {}", placement.seed),
          outcome: Outcome::Winner,
        }
      })?;
      matches[idx].slots[placement.target.slot.index()] = Some(participant);
    }
    for m in matches.iter_mut() {
      if m.has_both_players() {
        m.status = MatchStatus::Ready;
      }
    }

    validate(format, &participants, &matches, &advancement)?;
    info!(
      "created {format} bracket: {} participants, size {}, {} matches",
      participants.len(),
      skeleton.shape.bracket_size,
      matches.len()
    );

    Ok(BracketInstance {
      format,
      options,
      participants,
      bracket_size: skeleton.shape.bracket_size,
      matches,
      index,
      advancement,
      champion: None,
      fault: None,
    })
  }

  /// Rebuilds an instance from persisted match records. The structure is regenerated and
  /// must agree with the records; only the mutable per-match state is taken from them.
  pub fn restore(
    format: Format,
    participants: Vec<ParticipantId>,
    options: BracketOptions,
    records: &[MatchRecord],
  ) -> Result<Self, BracketError> {
    let mut bracket = Self::generate(format, participants, options)?;
    if records.len() != bracket.matches.len() {
      return Err(BracketError::InvariantViolation(format!(
        "expected {} match records, got {}",
        bracket.matches.len(),
        records.len()
      )));
    }

    let roster = bracket.participants.iter().collect::<HashSet<_>>();
    for record in records {
      let idx = bracket
        .index
        .get(&record.id)
        .copied()
        .ok_or_else(|| BracketError::InvariantViolation(format!("record for unknown match {}", record.id)))?;
      let m = &mut bracket.matches[idx];
      let fresh = MatchRecord::from(&*m);
      let same_shape = fresh.bracket_type == record.bracket_type
        && fresh.bracket_group == record.bracket_group
        && fresh.stage_round == record.stage_round
        && fresh.match_number == record.match_number
        && fresh.display_order == record.display_order
        && fresh.winner_advances_to == record.winner_advances_to
        && fresh.loser_advances_to == record.loser_advances_to;
      if !same_shape {
        return Err(BracketError::InvariantViolation(format!(
          "record for {} does not match the generated structure",
          record.id
        )));
      }
      for player in [&record.slot1_player, &record.slot2_player].into_iter().flatten() {
        if !roster.contains(player) {
          return Err(BracketError::InvariantViolation(format!(
            "{} holds unknown participant {player}",
            record.id
          )));
        }
      }

      m.slots = [record.slot1_player.clone(), record.slot2_player.clone()];
      m.scores = match (record.slot1_score, record.slot2_score) {
        (Some(a), Some(b)) => Some([a, b]),
        _ => None,
      };
      m.status = record.status;
      m.winner_id = record.winner_id.clone();
      m.completed_at = record.completed_at;
    }

    validate(bracket.format, &bracket.participants, &bracket.matches, &bracket.advancement)?;
    bracket.champion = bracket.find_champion();
    info!(
      "restored {} bracket with {} completed matches",
      bracket.format,
      bracket.matches.iter().filter(|m| m.status == MatchStatus::Completed).count()
    );
    Ok(bracket)
  }

  fn find_champion(&self) -> Option<ParticipantId> {
    if let Some(rule) = self.advancement.reset() {
      let decider = self.by_display_order(rule.decider)?;
      if decider.status == MatchStatus::Skipped {
        return self.by_display_order(rule.first)?.winner_id.clone();
      }
    }
    self
      .matches
      .iter()
      .find(|m| m.winner_advances_to.is_none() && m.status == MatchStatus::Completed)
      .and_then(|m| m.winner_id.clone())
  }

  fn by_display_order(&self, display_order: u32) -> Option<&Match> {
    self.matches.iter().find(|m| m.display_order == display_order)
  }

  pub fn format(&self) -> Format {
    self.format
  }

  pub fn options(&self) -> &BracketOptions {
    &self.options
  }

  pub fn participants(&self) -> &[ParticipantId] {
    &self.participants
  }

  pub fn bracket_size(&self) -> u32 {
    self.bracket_size
  }

  pub fn matches(&self) -> &[Match] {
    &self.matches
  }

  pub fn advancement(&self) -> &AdvancementMap {
    &self.advancement
  }

  pub fn champion(&self) -> Option<&ParticipantId> {
    self.champion.as_ref()
  }

  pub fn fault(&self) -> Option<&str> {
    self.fault.as_deref()
  }

  pub fn is_terminal(&self) -> bool {
    self.champion.is_some()
  }

  pub fn index_of(&self, match_id: &str) -> Result<usize, BracketError> {
    self
      .index
      .get(match_id)
      .copied()
      .ok_or_else(|| BracketError::MatchNotFound(match_id.to_string()))
  }

  pub fn get(&self, match_id: &str) -> Option<&Match> {
    self.index.get(match_id).map(|idx| &self.matches[*idx])
  }

  /// Matches that can take a result right now, in display order.
  pub fn playable(&self) -> Vec<&Match> {
    self.matches.iter().filter(|m| m.status.is_playable()).collect()
  }

  fn ensure_healthy(&self) -> Result<(), BracketError> {
    match &self.fault {
      Some(reason) => Err(BracketError::BracketFaulted(reason.clone())),
      None => Ok(()),
    }
  }

  pub fn start_match(&mut self, match_id: &str) -> Result<(), BracketError> {
    self.ensure_healthy()?;
    let idx = self.index_of(match_id)?;
    let m = &mut self.matches[idx];
    match m.status {
      MatchStatus::Ready => {
        m.status = MatchStatus::InProgress;
        info!("match {} started", m.id);
        Ok(())
      }
      MatchStatus::AwaitingPlayers => Err(BracketError::MatchNotReady(m.id.clone())),
      status => Err(BracketError::MatchNotPlayable {
        match_id: m.id.clone(),
        status,
      }),
    }
  }

  pub fn submit_result(
    &mut self,
    match_id: &str,
    score1: u32,
    score2: u32,
  ) -> Result<AdvancementEffects, BracketError> {
    self.ensure_healthy()?;
    let idx = self.index_of(match_id)?;
    let outcome = processor::process(
      self.format,
      &self.options,
      &self.participants,
      &self.matches,
      &self.advancement,
      idx,
      [score1, score2],
      Utc::now(),
    );

    match outcome {
      Ok(Submission::AlreadyRecorded(effects)) => Ok(effects),
      Ok(Submission::Staged { matches, effects }) => {
        self.matches = matches;
        info!(
          "{match_id} {score1}-{score2}: {} beats {}",
          effects.winner_id, effects.loser_id
        );
        if let Some(round) = &effects.completed_round {
          let group = round.bracket_group.map(|g| format!(" group {g}")).unwrap_or_default();
          info!("{}{group} round {} complete", round.bracket_type, round.stage_round);
        }
        if let Some(champion) = &effects.champion_id {
          info!("{} bracket finished, champion {champion}", self.format);
          self.champion = Some(champion.clone());
        }
        Ok(effects)
      }
      Err(err) if err.is_fatal() => {
        error!("bracket faulted while recording {match_id}: {err}");
        self.fault = Some(err.to_string());
        Err(err)
      }
      Err(err) => {
        warn!("rejected result for {match_id}: {err}");
        Err(err)
      }
    }
  }

  pub fn records(&self) -> Vec<MatchRecord> {
    self.matches.iter().map(MatchRecord::from).collect()
  }

  pub fn inspect(&self) -> BracketSnapshot {
    BracketSnapshot {
      format: self.format,
      bracket_size: self.bracket_size,
      participant_count: self.participants.len(),
      matches: self.records(),
      champion_id: self.champion.clone(),
      terminal: self.is_terminal(),
      fault: self.fault.clone(),
    }
  }

  pub fn standings(&self) -> Vec<Standing> {
    let byes = self
      .advancement
      .seeds()
      .iter()
      .filter(|seed| seed.bye)
      .map(|seed| seed.seed)
      .collect::<HashSet<_>>();

    self
      .participants
      .iter()
      .enumerate()
      .map(|(idx, participant)| {
        let seed = idx as u32 + 1;
        let mut wins = 0;
        let mut losses = 0;
        let mut current_match = None;
        for m in &self.matches {
          if m.slot_of(participant).is_none() {
            continue;
          }
          if m.status == MatchStatus::Completed {
            if m.winner_id.as_ref() == Some(participant) {
              wins += 1;
            } else {
              losses += 1;
            }
          } else if m.status.is_open() {
            current_match = Some(m.id.clone());
          }
        }
        let state = if self.champion.as_ref() == Some(participant) {
          StandingState::Champion
        } else if current_match.is_some() {
          StandingState::Alive
        } else {
          StandingState::Eliminated
        };
        Standing {
          participant_id: participant.clone(),
          seed,
          state,
          wins,
          losses,
          received_bye: byes.contains(&seed),
          current_match,
        }
      })
      .collect()
  }
}
