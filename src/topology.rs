use std::collections::HashMap;
use tracing::debug;

use crate::error::BracketError;
use crate::routing::{match_id, next_power_of_two, seed_positions, Position, Route, Shape};
use crate::types::{BracketGroup, BracketOptions, BracketType, DisplayOrder, Format, MatchId, SeedingMode, Slot};

pub const MAX_PARTICIPANTS: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchDescriptor {
  pub display_order: DisplayOrder,
  pub id: MatchId,
  pub position: Position,
  pub bracket_group: Option<BracketGroup>,
  pub round_label: String,
}

impl MatchDescriptor {
  pub fn bracket_type(&self) -> BracketType {
    self.position.bracket
  }

  pub fn stage_round(&self) -> u32 {
    self.position.round
  }

  pub fn match_number(&self) -> u32 {
    self.position.number
  }
}

/// Where a seed starts in the full shape. `bye` is set when that first-round position
/// collapsed, i.e. the seed has no opponent there and enters a later round directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedEntry {
  pub seed: u32,
  pub position: Position,
  pub slot: Slot,
  pub bye: bool,
}

#[derive(Clone, Debug)]
pub struct MatchSkeleton {
  pub format: Format,
  pub participant_count: usize,
  pub shape: Shape,
  pub matches: Vec<MatchDescriptor>,
  pub entries: Vec<SeedEntry>,
}

impl MatchSkeleton {
  pub fn len(&self) -> usize {
    self.matches.len()
  }

  pub fn is_empty(&self) -> bool {
    self.matches.is_empty()
  }

  pub fn rounds(&self, bracket: BracketType) -> u32 {
    self
      .matches
      .iter()
      .filter(|m| m.bracket_type() == bracket)
      .map(|m| m.stage_round())
      .max()
      .unwrap_or(0)
  }
}

pub fn generate(
  format: Format,
  participant_count: usize,
  options: &BracketOptions,
) -> Result<MatchSkeleton, BracketError> {
  check_participant_count(format, participant_count)?;

  let bracket_size = next_power_of_two(participant_count) as u32;
  let shape = Shape::new(format, bracket_size, options.allow_grand_final_reset);

  let line_order = match options.seeding {
    SeedingMode::Standard => seed_positions(bracket_size),
    SeedingMode::Sequential => (1..=bracket_size).collect(),
  };
  let mut entries = Vec::with_capacity(participant_count);
  for (idx, seed) in line_order.iter().copied().enumerate() {
    if seed as usize > participant_count {
      continue;
    }
    entries.push(SeedEntry {
      seed,
      position: Position::new(BracketType::Winners, 1, idx as u32 / 2 + 1),
      slot: if idx % 2 == 0 { Slot::One } else { Slot::Two },
      bye: false,
    });
  }
  entries.sort_by_key(|entry| entry.seed);

  // Count real players flowing into every full-shape position. Two means a playable
  // match; one means the position collapses and passes its only player forward.
  let mut inflow: HashMap<Position, u32> = HashMap::new();
  for entry in &entries {
    *inflow.entry(entry.position).or_default() += 1;
  }
  let mut live = Vec::new();
  for pos in shape.positions() {
    let fed = inflow.get(&pos).copied().unwrap_or(0);
    match fed {
      0 => {}
      1 => {
        if let Route::Match(next, _) = shape.winner_route(pos) {
          *inflow.entry(next).or_default() += 1;
        }
      }
      2 => {
        live.push(pos);
        if let Route::Match(next, _) = shape.winner_route(pos) {
          *inflow.entry(next).or_default() += 1;
        }
        if let Some((next, _)) = shape.loser_route(pos) {
          *inflow.entry(next).or_default() += 1;
        }
      }
      _ => {
        return Err(BracketError::InvariantViolation(format!(
          "{} receives {fed} players",
          match_id(pos)
        )))
      }
    }
  }

  for entry in entries.iter_mut() {
    entry.bye = !live.contains(&entry.position);
  }

  let matches = live
    .into_iter()
    .enumerate()
    .map(|(idx, pos)| MatchDescriptor {
      display_order: idx as DisplayOrder + 1,
      id: match_id(pos),
      position: pos,
      bracket_group: shape.group(pos),
      round_label: shape.round_label(pos),
    })
    .collect::<Vec<_>>();

  debug!(
    "generated {format} topology: {participant_count} participants, bracket size {bracket_size}, {} matches",
    matches.len()
  );

  Ok(MatchSkeleton {
    format,
    participant_count,
    shape,
    matches,
    entries,
  })
}

fn check_participant_count(format: Format, count: usize) -> Result<(), BracketError> {
  let reject = |reason: &str| BracketError::UnsupportedParticipantCount {
    format,
    count,
    reason: reason.to_string(),
  };
  if count < 2 {
    return Err(reject("at least two participants are required"));
  }
  if count > MAX_PARTICIPANTS {
    return Err(reject("more than 1024 participants"));
  }
  if format == Format::DoubleEliminationSplit {
    if !count.is_power_of_two() {
      return Err(reject("split loser brackets need a power-of-two field"));
    }
    if count < 8 {
      return Err(reject("split loser brackets need at least 8 participants"));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn options() -> BracketOptions {
    BracketOptions::default()
  }

  fn count(skeleton: &MatchSkeleton, bracket: BracketType) -> usize {
    skeleton.matches.iter().filter(|m| m.bracket_type() == bracket).count()
  }

  #[test]
  fn test_single_elimination_has_n_minus_one_matches() {
    for n in 2..=40 {
      let skeleton = generate(Format::SingleElimination, n, &options()).unwrap();
      assert_eq!(skeleton.len(), n - 1, "n = {n}");
    }
  }

  #[test]
  fn test_double_elimination_counts() {
    for n in 2..=40 {
      let skeleton = generate(Format::DoubleElimination, n, &options()).unwrap();
      assert_eq!(count(&skeleton, BracketType::Winners), n - 1, "n = {n}");
      assert_eq!(count(&skeleton, BracketType::Losers), n - 2, "n = {n}");
      assert_eq!(count(&skeleton, BracketType::GrandFinal), 2, "n = {n}");

      let no_reset = BracketOptions {
        allow_grand_final_reset: false,
        ..options()
      };
      let skeleton = generate(Format::DoubleElimination, n, &no_reset).unwrap();
      assert_eq!(skeleton.len(), (n - 1) + (n - 2) + 1, "n = {n}");
    }
  }

  #[test]
  fn test_split_counts_and_groups() {
    for n in [8usize, 16, 32, 64] {
      let skeleton = generate(Format::DoubleEliminationSplit, n, &options()).unwrap();
      let group_size = n / 2 - 2;
      assert_eq!(count(&skeleton, BracketType::Winners), n - 1);
      assert_eq!(count(&skeleton, BracketType::LosersA), group_size);
      assert_eq!(count(&skeleton, BracketType::LosersB), group_size);
      assert_eq!(count(&skeleton, BracketType::Losers), 2);
      for m in &skeleton.matches {
        match m.bracket_type() {
          BracketType::LosersA => assert_eq!(m.bracket_group, Some(BracketGroup::A)),
          BracketType::LosersB => assert_eq!(m.bracket_group, Some(BracketGroup::B)),
          BracketType::Losers | BracketType::GrandFinal => assert_eq!(m.bracket_group, None),
          BracketType::Winners => {}
        }
      }
    }
  }

  #[test]
  fn test_unsupported_counts() {
    assert!(matches!(
      generate(Format::SingleElimination, 1, &options()),
      Err(BracketError::UnsupportedParticipantCount { count: 1, .. })
    ));
    for n in [4usize, 6, 12, 24] {
      assert!(matches!(
        generate(Format::DoubleEliminationSplit, n, &options()),
        Err(BracketError::UnsupportedParticipantCount { .. })
      ));
    }
  }

  #[test]
  fn test_display_order_is_dense_and_ordered() {
    let skeleton = generate(Format::DoubleEliminationSplit, 16, &options()).unwrap();
    for (idx, m) in skeleton.matches.iter().enumerate() {
      assert_eq!(m.display_order as usize, idx + 1);
    }
    assert_eq!(skeleton.matches.last().unwrap().id.as_str(), "GF2");
  }

  #[test]
  fn test_top_seeds_get_byes() {
    let skeleton = generate(Format::SingleElimination, 5, &options()).unwrap();
    let byes = skeleton
      .entries
      .iter()
      .filter(|entry| entry.bye)
      .map(|entry| entry.seed)
      .collect::<Vec<_>>();
    assert_eq!(byes, vec![1, 2, 3]);
    assert_eq!(skeleton.rounds(BracketType::Winners), 3);
  }

  #[test]
  fn test_sequential_seeding_pairs_in_order() {
    let sequential = BracketOptions {
      seeding: SeedingMode::Sequential,
      ..options()
    };
    let skeleton = generate(Format::SingleElimination, 8, &sequential).unwrap();
    let first = skeleton.entries.iter().find(|e| e.seed == 2).unwrap();
    assert_eq!(first.position, Position::new(BracketType::Winners, 1, 1));
    assert_eq!(first.slot, Slot::Two);

    // Seeds 7 and 8 are missing, so the fourth opening pair disappears entirely.
    let skeleton = generate(Format::DoubleElimination, 6, &sequential).unwrap();
    assert_eq!(count(&skeleton, BracketType::Winners), 5);
    assert_eq!(count(&skeleton, BracketType::Losers), 4);
  }
}
