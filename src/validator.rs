use std::collections::HashMap;

use crate::advancement::AdvancementMap;
use crate::error::BracketError;
use crate::types::{BracketType, DisplayOrder, Format, Match, MatchStatus, Outcome, ParticipantId, Slot};

/// Checks the structural and occupancy invariants over a whole set of matches. Runs after
/// generation, on restore, and on the working copy of every result before it is committed.
///
/// `participants` is the roster in seed order; seeded slots must hold exactly their seed.
pub fn validate(
  format: Format,
  participants: &[ParticipantId],
  matches: &[Match],
  map: &AdvancementMap,
) -> Result<(), BracketError> {
  let by_order = matches
    .iter()
    .map(|m| (m.display_order, m))
    .collect::<HashMap<DisplayOrder, &Match>>();
  if by_order.len() != matches.len() {
    return Err(violation("display orders are not unique"));
  }

  check_slots(matches)?;
  check_terminal(matches)?;
  check_loser_edges(format, matches, map)?;
  check_feeds(matches, &by_order, map)?;
  check_statuses(matches, map)?;
  check_propagation(participants, matches, &by_order, map)?;
  Ok(())
}

fn violation(message: impl Into<String>) -> BracketError {
  BracketError::InvariantViolation(message.into())
}

fn check_slots(matches: &[Match]) -> Result<(), BracketError> {
  let mut open: HashMap<&ParticipantId, &Match> = HashMap::new();
  for m in matches {
    if let [Some(a), Some(b)] = &m.slots {
      if a == b {
        return Err(violation(format!("{} has {a} in both slots", m.id)));
      }
    }
    if !m.status.is_open() {
      continue;
    }
    for player in m.slots.iter().flatten() {
      if let Some(other) = open.insert(player, m) {
        return Err(violation(format!(
          "{player} is waiting in both {} and {}",
          other.id, m.id
        )));
      }
    }
  }
  Ok(())
}

fn check_terminal(matches: &[Match]) -> Result<(), BracketError> {
  let terminal = matches
    .iter()
    .filter(|m| m.winner_advances_to.is_none())
    .map(|m| m.id.as_str())
    .collect::<Vec<_>>();
  if terminal.len() != 1 {
    return Err(violation(format!(
      "expected exactly one final match, found {}: [{}]",
      terminal.len(),
      terminal.join(", ")
    )));
  }
  Ok(())
}

fn check_loser_edges(format: Format, matches: &[Match], map: &AdvancementMap) -> Result<(), BracketError> {
  let reset_first = map.reset().map(|rule| rule.first);
  for m in matches {
    let expected = match m.bracket_type {
      kind if !format.is_double() || kind.is_losers() => false,
      BracketType::Winners => true,
      BracketType::GrandFinal => Some(m.display_order) == reset_first,
      _ => false,
    };
    if expected != m.loser_advances_to.is_some() {
      let problem = if expected { "has no loser target" } else { "must eliminate its loser" };
      return Err(violation(format!("{} {problem}", m.id)));
    }
  }
  Ok(())
}

fn check_feeds(
  matches: &[Match],
  by_order: &HashMap<DisplayOrder, &Match>,
  map: &AdvancementMap,
) -> Result<(), BracketError> {
  let mut fed: HashMap<(DisplayOrder, Slot), u32> = HashMap::new();
  for m in matches {
    for target in [m.winner_advances_to, m.loser_advances_to].into_iter().flatten() {
      if target.display_order <= m.display_order {
        return Err(violation(format!(
          "{} advances backwards to display order {}",
          m.id, target.display_order
        )));
      }
      if !by_order.contains_key(&target.display_order) {
        return Err(violation(format!(
          "{} advances to unknown display order {}",
          m.id, target.display_order
        )));
      }
      *fed.entry((target.display_order, target.slot)).or_default() += 1;
    }
  }
  for seed in map.seeds() {
    *fed.entry((seed.target.display_order, seed.target.slot)).or_default() += 1;
  }
  for m in matches {
    for slot in Slot::both() {
      let count = fed.get(&(m.display_order, slot)).copied().unwrap_or(0);
      if count != 1 {
        return Err(violation(format!("{slot} of {} is fed {count} times", m.id)));
      }
    }
  }
  Ok(())
}

fn check_statuses(matches: &[Match], map: &AdvancementMap) -> Result<(), BracketError> {
  let decider = map.reset().map(|rule| rule.decider);
  for m in matches {
    match m.status {
      MatchStatus::Completed => {
        let winner_seated = m
          .winner_id
          .as_ref()
          .map(|winner| m.slot_of(winner).is_some())
          .unwrap_or(false);
        if !winner_seated || !m.has_both_players() || m.scores.is_none() {
          return Err(violation(format!("{} is completed without a seated winner", m.id)));
        }
        let by_score = match m.scores {
          Some([a, b]) if a > b => m.player(Slot::One),
          Some([a, b]) if b > a => m.player(Slot::Two),
          _ => None,
        };
        if by_score != m.winner_id.as_ref() {
          return Err(violation(format!("{} winner does not match its scores", m.id)));
        }
      }
      MatchStatus::Ready | MatchStatus::InProgress => {
        if !m.has_both_players() {
          return Err(violation(format!("{} is {} with an empty slot", m.id, m.status)));
        }
      }
      MatchStatus::AwaitingPlayers => {
        if m.has_both_players() {
          return Err(violation(format!("{} has both players but is still waiting", m.id)));
        }
      }
      MatchStatus::Skipped => {
        if Some(m.display_order) != decider || m.winner_id.is_some() {
          return Err(violation(format!("{} cannot be skipped", m.id)));
        }
      }
    }
    if m.status != MatchStatus::Completed && m.winner_id.is_some() {
      return Err(violation(format!("{} has a winner but is {}", m.id, m.status)));
    }
  }
  Ok(())
}

enum Feed {
  Seed(u32),
  Result(DisplayOrder, Outcome),
}

/// Every slot must hold exactly what its feed has produced so far: the seeded participant,
/// the winner or loser of a completed source match, or nobody while the source is open.
/// A first grand final won from slot 1 feeds nobody, since the decider is skipped.
fn check_propagation(
  participants: &[ParticipantId],
  matches: &[Match],
  by_order: &HashMap<DisplayOrder, &Match>,
  map: &AdvancementMap,
) -> Result<(), BracketError> {
  let mut feeds: HashMap<(DisplayOrder, Slot), Feed> = HashMap::new();
  for m in matches {
    for (target, outcome) in [(m.winner_advances_to, Outcome::Winner), (m.loser_advances_to, Outcome::Loser)] {
      if let Some(target) = target {
        feeds.insert((target.display_order, target.slot), Feed::Result(m.display_order, outcome));
      }
    }
  }
  for seed in map.seeds() {
    feeds.insert((seed.target.display_order, seed.target.slot), Feed::Seed(seed.seed));
  }
  let reset_first = map.reset().map(|rule| rule.first);

  for m in matches {
    for slot in Slot::both() {
      let (expected, source) = match feeds.get(&(m.display_order, slot)) {
        Some(Feed::Seed(seed)) => (
          (*seed as usize).checked_sub(1).and_then(|idx| participants.get(idx)),
          format!("seed {seed}"),
        ),
        Some(Feed::Result(order, outcome)) => {
          let from = by_order
            .get(order)
            .copied()
            .ok_or_else(|| violation(format!("{slot} of {} is fed by unknown display order {order}", m.id)))?;
          let decider_skipped = Some(from.display_order) == reset_first
            && from.winner_id.as_ref().and_then(|w| from.slot_of(w)) == Some(Slot::One);
          let produced = if from.status != MatchStatus::Completed || decider_skipped {
            None
          } else {
            match outcome {
              Outcome::Winner => from.winner_id.as_ref(),
              Outcome::Loser => from.loser_id(),
            }
          };
          (produced, format!("the {outcome} of {}", from.id))
        }
        None => return Err(violation(format!("{slot} of {} has no feed", m.id))),
      };
      let actual = m.player(slot);
      if actual != expected {
        return Err(violation(format!(
          "{slot} of {} holds {} but {source} is {}",
          m.id,
          describe(actual),
          describe(expected)
        )));
      }
    }
  }
  Ok(())
}

fn describe(participant: Option<&ParticipantId>) -> String {
  participant.map(|p| p.to_string()).unwrap_or_else(|| "nobody".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::advancement::build;
  use crate::topology::generate;
  use crate::types::{BracketOptions, MatchId, Target};

  struct TestBracket {
    format: Format,
    roster: Vec<ParticipantId>,
    matches: Vec<Match>,
    map: AdvancementMap,
  }

  impl TestBracket {
    fn validate(&self) -> Result<(), BracketError> {
      validate(self.format, &self.roster, &self.matches, &self.map)
    }

    fn find(&mut self, id: &str) -> &mut Match {
      self.matches.iter_mut().find(|m| m.id == MatchId::new(id)).unwrap()
    }
  }

  // Bare matches straight from the map, with seeds placed and no results.
  fn make_test_bracket(format: Format, n: usize) -> TestBracket {
    let skeleton = generate(format, n, &BracketOptions::default()).unwrap();
    let map = build(&skeleton).unwrap();
    let mut matches = skeleton
      .matches
      .iter()
      .map(|d| {
        let edges = map.get(d.display_order).copied().unwrap_or_default();
        Match {
          id: d.id.clone(),
          bracket_type: d.bracket_type(),
          bracket_group: d.bracket_group,
          stage_round: d.stage_round(),
          match_number: d.match_number(),
          display_order: d.display_order,
          round_label: d.round_label.clone(),
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
    let roster = (1..=n).map(|i| ParticipantId::new(format!("p{i}"))).collect::<Vec<_>>();
    for seed in map.seeds() {
      let idx = seed.target.display_order as usize - 1;
      matches[idx].slots[seed.target.slot.index()] = Some(roster[seed.seed as usize - 1].clone());
    }
    for m in matches.iter_mut() {
      if m.has_both_players() {
        m.status = MatchStatus::Ready;
      }
    }
    TestBracket {
      format,
      roster,
      matches,
      map,
    }
  }

  // Records a result by hand and moves both players on, the way the processor would.
  fn complete(bracket: &mut TestBracket, id: &str, scores: [u32; 2]) {
    let m = bracket.find(id);
    let winner_slot = if scores[0] > scores[1] { Slot::One } else { Slot::Two };
    m.status = MatchStatus::Completed;
    m.scores = Some(scores);
    m.winner_id = m.player(winner_slot).cloned();
    let moves = [
      (m.winner_advances_to, m.player(winner_slot).cloned()),
      (m.loser_advances_to, m.player(winner_slot.other()).cloned()),
    ];
    for (target, player) in moves {
      let Some(target) = target else { continue };
      let next = bracket
        .matches
        .iter_mut()
        .find(|m| m.display_order == target.display_order)
        .unwrap();
      next.slots[target.slot.index()] = player;
      if next.has_both_players() {
        next.status = MatchStatus::Ready;
      }
    }
  }

  #[test]
  fn test_fresh_brackets_validate() {
    for format in [Format::SingleElimination, Format::DoubleElimination] {
      for n in [2usize, 3, 5, 8, 13, 16] {
        make_test_bracket(format, n).validate().unwrap();
      }
    }
    make_test_bracket(Format::DoubleEliminationSplit, 16).validate().unwrap();
  }

  #[test]
  fn test_same_player_twice_in_a_match() {
    let mut bracket = make_test_bracket(Format::SingleElimination, 8);
    let m = bracket.find("W1-1");
    m.slots[1] = m.slots[0].clone();
    let err = bracket.validate().unwrap_err();
    assert!(err.to_string().contains("both slots"), "{err}");
  }

  #[test]
  fn test_player_in_two_open_matches() {
    let mut bracket = make_test_bracket(Format::SingleElimination, 8);
    bracket.find("W2-1").slots[0] = Some(ParticipantId::new("p1"));
    let err = bracket.validate().unwrap_err();
    assert!(err.to_string().contains("waiting in both"), "{err}");
  }

  #[test]
  fn test_two_terminal_matches() {
    let mut bracket = make_test_bracket(Format::SingleElimination, 8);
    bracket.find("W2-2").winner_advances_to = None;
    assert!(bracket.validate().is_err());
  }

  #[test]
  fn test_loser_edge_rules() {
    let mut bracket = make_test_bracket(Format::DoubleElimination, 8);
    bracket.find("W2-1").loser_advances_to = None;
    let err = bracket.validate().unwrap_err();
    assert!(err.to_string().contains("W2-1 has no loser target"), "{err}");

    let mut bracket = make_test_bracket(Format::DoubleElimination, 8);
    let gf2 = bracket.find("GF2").display_order;
    bracket.find("L1-1").loser_advances_to = Some(Target {
      display_order: gf2,
      slot: Slot::One,
    });
    let err = bracket.validate().unwrap_err();
    assert!(err.to_string().contains("L1-1 must eliminate its loser"), "{err}");
  }

  #[test]
  fn test_backward_edge() {
    let mut bracket = make_test_bracket(Format::SingleElimination, 8);
    bracket.find("W2-1").winner_advances_to = Some(Target {
      display_order: 1,
      slot: Slot::One,
    });
    let err = bracket.validate().unwrap_err();
    assert!(err.to_string().contains("backwards"), "{err}");
  }

  #[test]
  fn test_completed_needs_seated_winner() {
    let mut bracket = make_test_bracket(Format::SingleElimination, 4);
    let m = bracket.find("W1-1");
    m.status = MatchStatus::Completed;
    m.scores = Some([2, 0]);
    m.winner_id = Some(ParticipantId::new("p9"));
    let err = bracket.validate().unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("seated winner"), "{err}");
  }

  #[test]
  fn test_winner_must_match_scores() {
    let mut bracket = make_test_bracket(Format::SingleElimination, 4);
    complete(&mut bracket, "W1-1", [2, 0]);
    bracket.validate().unwrap();

    bracket.find("W1-1").scores = Some([0, 2]);
    let err = bracket.validate().unwrap_err();
    assert!(err.to_string().contains("does not match its scores"), "{err}");

    bracket.find("W1-1").scores = Some([1, 1]);
    assert!(bracket.validate().is_err());
  }

  #[test]
  fn test_played_results_flow_to_their_targets() {
    let mut bracket = make_test_bracket(Format::DoubleElimination, 8);
    for id in ["W1-1", "W1-2", "W1-3", "W1-4"] {
      complete(&mut bracket, id, [2, 1]);
    }
    complete(&mut bracket, "W2-1", [0, 2]);
    bracket.validate().unwrap();

    // Winner never moved on.
    let mut stuck = make_test_bracket(Format::DoubleElimination, 8);
    complete(&mut stuck, "W1-1", [2, 0]);
    stuck.find("W2-1").slots[0] = None;
    let err = stuck.validate().unwrap_err();
    assert!(err.to_string().contains("the winner of W1-1 is p1"), "{err}");

    // Loser never dropped.
    let mut stuck = make_test_bracket(Format::DoubleElimination, 8);
    complete(&mut stuck, "W1-1", [2, 0]);
    let target = stuck.find("W1-1").loser_advances_to.unwrap();
    let lower = stuck
      .matches
      .iter_mut()
      .find(|m| m.display_order == target.display_order)
      .unwrap();
    lower.slots[target.slot.index()] = None;
    let err = stuck.validate().unwrap_err();
    assert!(err.to_string().contains("the loser of W1-1 is p8"), "{err}");
  }

  #[test]
  fn test_eliminated_player_cannot_advance() {
    let mut bracket = make_test_bracket(Format::SingleElimination, 4);
    complete(&mut bracket, "W1-1", [2, 0]);
    bracket.find("W2-1").slots[0] = Some(ParticipantId::new("p4"));
    let err = bracket.validate().unwrap_err();
    assert!(err.to_string().contains("holds p4 but the winner of W1-1 is p1"), "{err}");
  }

  #[test]
  fn test_seeded_slot_holds_its_seed() {
    let mut bracket = make_test_bracket(Format::SingleElimination, 4);
    bracket.find("W1-1").slots.swap(0, 1);
    bracket.validate().unwrap_err();

    let mut bracket = make_test_bracket(Format::SingleElimination, 4);
    bracket.roster.swap(0, 3);
    let err = bracket.validate().unwrap_err();
    assert!(err.to_string().contains("seed 1 is p4"), "{err}");
  }

  #[test]
  fn test_skipped_decider_stays_empty() {
    let mut bracket = make_test_bracket(Format::DoubleElimination, 4);
    for (id, scores) in [("W1-1", [2, 0]), ("W1-2", [2, 0]), ("W2-1", [2, 0]), ("L1-1", [2, 0]), ("L2-1", [2, 0])] {
      complete(&mut bracket, id, scores);
    }
    let m = bracket.find("GF1");
    m.status = MatchStatus::Completed;
    m.scores = Some([2, 1]);
    m.winner_id = m.slots[0].clone();
    bracket.find("GF2").status = MatchStatus::Skipped;
    bracket.validate().unwrap();

    bracket.find("GF2").slots[0] = Some(ParticipantId::new("p1"));
    let err = bracket.validate().unwrap_err();
    assert!(err.to_string().contains("GF2 holds p1"), "{err}");
  }
}
