use chrono::{DateTime, Utc};
use tracing::debug;

use crate::advancement::AdvancementMap;
use crate::error::BracketError;
use crate::types::{
  AdvancementEffects, BracketOptions, Format, Match, MatchStatus, Outcome, ParticipantId, Placement, Slot,
  Target,
};
use crate::validator::validate;

#[derive(Debug)]
pub enum Submission {
  /// The identical result was already on record; nothing to commit.
  AlreadyRecorded(AdvancementEffects),
  /// A fully validated working copy, ready to swap in.
  Staged {
    matches: Vec<Match>,
    effects: AdvancementEffects,
  },
}

pub fn check_scores(options: &BracketOptions, scores: [u32; 2]) -> Result<Slot, BracketError> {
  let [score1, score2] = scores;
  if score1 == score2 {
    return Err(BracketError::InvalidResult(format!(
      "scores {score1}-{score2} are tied, elimination matches need a winner"
    )));
  }
  let (high, low) = (score1.max(score2), score1.min(score2));
  if let Some(race_to) = options.race_to {
    if high != race_to {
      return Err(BracketError::InvalidResult(format!(
        "winner must reach exactly {race_to}, got {high}-{low}"
      )));
    }
  }
  Ok(if score1 > score2 { Slot::One } else { Slot::Two })
}

/// Applies one result to a copy of `matches`. The caller swaps the copy in only when this
/// returns `Submission::Staged`, so a failure at any step leaves the bracket untouched.
///
/// A completed match's outcome is its full score pair: resubmitting the same pair is a
/// no-op, while any other pair (even with the same winner) is a `ResultConflict`.
#[allow(clippy::too_many_arguments)]
pub fn process(
  format: Format,
  options: &BracketOptions,
  participants: &[ParticipantId],
  matches: &[Match],
  map: &AdvancementMap,
  index: usize,
  scores: [u32; 2],
  now: DateTime<Utc>,
) -> Result<Submission, BracketError> {
  let current = matches
    .get(index)
    .ok_or_else(|| BracketError::MatchNotFound(format!("#{index}")))?;

  match current.status {
    MatchStatus::Completed => {
      let recorded = current.scores.unwrap_or_default();
      if recorded != scores {
        return Err(BracketError::ResultConflict {
          match_id: current.id.clone(),
          recorded,
          submitted: scores,
        });
      }
      return recorded_effects(current, map).map(Submission::AlreadyRecorded);
    }
    MatchStatus::Skipped => {
      return Err(BracketError::MatchNotPlayable {
        match_id: current.id.clone(),
        status: current.status,
      })
    }
    MatchStatus::AwaitingPlayers => return Err(BracketError::MatchNotReady(current.id.clone())),
    MatchStatus::Ready | MatchStatus::InProgress => {}
  }

  let winner_slot = check_scores(options, scores)?;
  let (winner, loser) = match (current.player(winner_slot), current.player(winner_slot.other())) {
    (Some(winner), Some(loser)) => (winner.clone(), loser.clone()),
    _ => {
      return Err(BracketError::InvariantViolation(format!(
        "{} is {} without two players",
        current.id, current.status
      )))
    }
  };

  let mut work = matches.to_vec();
  {
    let m = &mut work[index];
    m.status = MatchStatus::Completed;
    m.scores = Some(scores);
    m.winner_id = Some(winner.clone());
    m.completed_at = Some(now);
  }
  let display_order = work[index].display_order;
  let winner_target = work[index].winner_advances_to;
  let loser_target = work[index].loser_advances_to;

  let mut effects = AdvancementEffects {
    match_id: work[index].id.clone(),
    display_order,
    winner_id: winner.clone(),
    loser_id: loser.clone(),
    placements: Vec::new(),
    newly_ready: Vec::new(),
    skipped: Vec::new(),
    completed_round: None,
    champion_id: None,
    already_recorded: false,
  };

  match map.reset() {
    // The upper-bracket finalist keeps slot 1 of the grand final; only a loss there forces
    // the decider.
    Some(rule) if rule.first == display_order && winner_slot == Slot::One => {
      let decider = find_mut(&mut work, rule.decider)?;
      decider.status = MatchStatus::Skipped;
      effects.skipped.push(decider.id.clone());
      effects.champion_id = Some(winner.clone());
    }
    _ => {
      match winner_target {
        Some(target) => place(&mut work, target, &winner, Outcome::Winner, &mut effects)?,
        None => effects.champion_id = Some(winner.clone()),
      }
      if let Some(target) = loser_target {
        place(&mut work, target, &loser, Outcome::Loser, &mut effects)?;
      }
    }
  }

  let round = work[index].round_ref();
  let round_done = work
    .iter()
    .filter(|m| m.round_ref() == round)
    .all(|m| !m.status.is_open());
  if round_done {
    effects.completed_round = Some(round);
  }

  validate(format, participants, &work, map)?;
  Ok(Submission::Staged { matches: work, effects })
}

/// Effects reported for a repeated result. Only the match that crowned the champion reports
/// one: the final, or a first grand final whose decider was skipped.
fn recorded_effects(m: &Match, map: &AdvancementMap) -> Result<AdvancementEffects, BracketError> {
  let (Some(winner), Some(loser)) = (m.winner_id.clone(), m.loser_id().cloned()) else {
    return Err(BracketError::InvariantViolation(format!(
      "{} is completed without a seated winner",
      m.id
    )));
  };
  let skipped_decider = map.reset().map(|rule| rule.first) == Some(m.display_order)
    && m.slot_of(&winner) == Some(Slot::One);
  let champion_id = (m.winner_advances_to.is_none() || skipped_decider).then(|| winner.clone());
  Ok(AdvancementEffects {
    match_id: m.id.clone(),
    display_order: m.display_order,
    winner_id: winner,
    loser_id: loser,
    placements: Vec::new(),
    newly_ready: Vec::new(),
    skipped: Vec::new(),
    completed_round: None,
    champion_id,
    already_recorded: true,
  })
}

fn find_mut(work: &mut [Match], display_order: u32) -> Result<&mut Match, BracketError> {
  work
    .iter_mut()
    .find(|m| m.display_order == display_order)
    .ok_or_else(|| BracketError::InvariantViolation(format!("no match with display order {display_order}")))
}

/// Compare-and-set write of one participant into one slot.
fn place(
  work: &mut [Match],
  target: Target,
  participant: &ParticipantId,
  outcome: Outcome,
  effects: &mut AdvancementEffects,
) -> Result<(), BracketError> {
  let m = find_mut(work, target.display_order)?;
  for slot in [target.slot, target.slot.other()] {
    if let Some(existing) = m.player(slot) {
      if slot == target.slot || existing == participant {
        return Err(BracketError::DuplicateSlotAssignment {
          match_id: m.id.clone(),
          slot,
          existing: existing.clone(),
          incoming: participant.clone(),
        });
      }
    }
  }
  m.slots[target.slot.index()] = Some(participant.clone());
  debug!("{outcome} {participant} placed into {} {}", m.id, target.slot);

  effects.placements.push(Placement {
    participant_id: participant.clone(),
    outcome,
    target_id: m.id.clone(),
    target,
  });
  if m.has_both_players() && m.status == MatchStatus::AwaitingPlayers {
    m.status = MatchStatus::Ready;
    effects.newly_ready.push(m.id.clone());
  }
  Ok(())
}
