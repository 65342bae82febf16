use std::collections::{BTreeMap, HashMap};

use crate::error::BracketError;
use crate::routing::{match_id, Position, Route};
use crate::topology::MatchSkeleton;
use crate::types::{BracketType, DisplayOrder, Outcome, Slot, Target};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Advancement {
  pub winner: Option<Target>,
  pub loser: Option<Target>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedPlacement {
  pub seed: u32,
  pub target: Target,
  pub bye: bool,
}

/// The first grand final and the decider that is only played when the losers-bracket
/// champion takes the first one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetRule {
  pub first: DisplayOrder,
  pub decider: DisplayOrder,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdvancementMap {
  edges: BTreeMap<DisplayOrder, Advancement>,
  seeds: Vec<SeedPlacement>,
  reset: Option<ResetRule>,
}

impl AdvancementMap {
  pub fn get(&self, display_order: DisplayOrder) -> Option<&Advancement> {
    self.edges.get(&display_order)
  }

  pub fn iter(&self) -> impl Iterator<Item = (DisplayOrder, &Advancement)> {
    self.edges.iter().map(|(order, adv)| (*order, adv))
  }

  pub fn seeds(&self) -> &[SeedPlacement] {
    &self.seeds
  }

  pub fn reset(&self) -> Option<ResetRule> {
    self.reset
  }

  pub fn len(&self) -> usize {
    self.edges.len()
  }

  pub fn is_empty(&self) -> bool {
    self.edges.is_empty()
  }
}

pub fn build(skeleton: &MatchSkeleton) -> Result<AdvancementMap, BracketError> {
  let shape = skeleton.shape;
  let live = skeleton
    .matches
    .iter()
    .map(|m| (m.position, m.display_order))
    .collect::<HashMap<Position, DisplayOrder>>();
  let hop_limit = shape.positions().len();

  // Follow collapsed positions forward until a live match takes the player.
  let resolve = |start: Position, slot: Slot, origin: &str, outcome: Outcome| {
    let mut pos = start;
    let mut slot = slot;
    for _ in 0..=hop_limit {
      if let Some(display_order) = live.get(&pos) {
        return Ok(Target {
          display_order: *display_order,
          slot,
        });
      }
      match shape.winner_route(pos) {
        Route::Match(next, next_slot) => {
          pos = next;
          slot = next_slot;
        }
        Route::Terminal => break,
      }
    }
    Err(BracketError::UnreachableTarget {
      origin: origin.to_string(),
      outcome,
    })
  };

  let mut edges = BTreeMap::new();
  for descriptor in &skeleton.matches {
    let origin = descriptor.id.as_str();
    let winner = match shape.winner_route(descriptor.position) {
      Route::Terminal => None,
      Route::Match(pos, slot) => Some(resolve(pos, slot, origin, Outcome::Winner)?),
    };
    let loser = match shape.loser_route(descriptor.position) {
      None => None,
      Some((pos, slot)) => Some(resolve(pos, slot, origin, Outcome::Loser)?),
    };
    edges.insert(descriptor.display_order, Advancement { winner, loser });
  }

  let mut seeds = Vec::with_capacity(skeleton.entries.len());
  for entry in &skeleton.entries {
    let origin = format!("seed {}", entry.seed);
    let target = resolve(entry.position, entry.slot, &origin, Outcome::Winner)?;
    seeds.push(SeedPlacement {
      seed: entry.seed,
      target,
      bye: entry.bye,
    });
  }

  let reset = if shape.reset {
    let first = live.get(&Position::new(BracketType::GrandFinal, 1, 1));
    let decider = live.get(&Position::new(BracketType::GrandFinal, 2, 1));
    match (first, decider) {
      (Some(first), Some(decider)) => Some(ResetRule {
        first: *first,
        decider: *decider,
      }),
      _ => {
        return Err(BracketError::UnreachableTarget {
          origin: match_id(Position::new(BracketType::GrandFinal, 1, 1)).to_string(),
          outcome: Outcome::Winner,
        })
      }
    }
  } else {
    None
  };

  let map = AdvancementMap { edges, seeds, reset };
  check_feeds(skeleton, &map)?;
  Ok(map)
}

/// Every slot of every live match must be fed by exactly one edge or seed, and edges must
/// point to a later display order.
fn check_feeds(skeleton: &MatchSkeleton, map: &AdvancementMap) -> Result<(), BracketError> {
  let ids = skeleton
    .matches
    .iter()
    .map(|m| (m.display_order, m.id.as_str()))
    .collect::<HashMap<_, _>>();
  let mut feeds: HashMap<(DisplayOrder, Slot), String> = HashMap::new();
  let mut claim = |target: Target, origin: String| -> Result<(), BracketError> {
    if let Some(previous) = feeds.insert((target.display_order, target.slot), origin.clone()) {
      return Err(BracketError::InvariantViolation(format!(
        "{} of {} is fed by both {previous} and {origin}",
        target.slot,
        ids.get(&target.display_order).copied().unwrap_or("?"),
      )));
    }
    Ok(())
  };

  for (order, advancement) in map.iter() {
    let origin = ids.get(&order).copied().unwrap_or("?");
    for (target, outcome) in [(advancement.winner, Outcome::Winner), (advancement.loser, Outcome::Loser)] {
      let Some(target) = target else {
        continue;
      };
      if target.display_order <= order {
        return Err(BracketError::InvariantViolation(format!(
          "{outcome} edge of {origin} points backwards to {}",
          target.display_order
        )));
      }
      claim(target, format!("{outcome} of {origin}"))?;
    }
  }
  for seed in map.seeds() {
    claim(seed.target, format!("seed {}", seed.seed))?;
  }

  for descriptor in &skeleton.matches {
    for slot in Slot::both() {
      if !feeds.contains_key(&(descriptor.display_order, slot)) {
        return Err(BracketError::InvariantViolation(format!(
          "{slot} of {} is never filled",
          descriptor.id
        )));
      }
    }
  }
  Ok(())
}
