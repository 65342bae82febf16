//! Slot routing over the full power-of-two bracket shape.
//!
//! Every rule here works in "full shape" coordinates: the bracket as it would look if every
//! seed were present. The topology generator uses these rules to find out which positions
//! collapse into byes; the advancement builder follows them through collapsed positions to
//! the live match a player actually lands in.

use crate::types::{BracketGroup, BracketType, Format, MatchId, Slot};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
  pub bracket: BracketType,
  pub round: u32,
  pub number: u32,
}

impl Position {
  pub fn new(bracket: BracketType, round: u32, number: u32) -> Self {
    Position { bracket, round, number }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
  Match(Position, Slot),
  Terminal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape {
  pub format: Format,
  pub bracket_size: u32,
  pub rounds: u32,
  pub reset: bool,
}

impl Shape {
  pub fn new(format: Format, bracket_size: u32, allow_reset: bool) -> Self {
    Shape {
      format,
      bracket_size,
      rounds: bracket_size.trailing_zeros(),
      reset: allow_reset && format.is_double(),
    }
  }

  fn split(&self) -> bool {
    self.format == Format::DoubleEliminationSplit
  }

  pub fn winners_count(&self, round: u32) -> u32 {
    self.bracket_size >> round
  }

  /// Rounds in one loser bracket (per group for the split format).
  pub fn losers_rounds(&self) -> u32 {
    match self.format {
      Format::SingleElimination => 0,
      Format::DoubleElimination => 2 * self.rounds.saturating_sub(1),
      Format::DoubleEliminationSplit => 2 * self.rounds.saturating_sub(2),
    }
  }

  /// Losers round `k` has the same count as the "drop-in" round that follows it, so counts
  /// come in pairs: size/4, size/4, size/8, size/8, ...
  pub fn losers_count(&self, round: u32) -> u32 {
    let size = if self.split() {
      self.bracket_size / 2
    } else {
      self.bracket_size
    };
    size >> ((round + 1) / 2 + 1)
  }

  fn grand_final(&self, round: u32) -> Position {
    Position::new(BracketType::GrandFinal, round, 1)
  }

  /// All positions of the full shape in creation order. Every route points to a position
  /// later in this list.
  pub fn positions(&self) -> Vec<Position> {
    let mut out = Vec::new();
    for round in 1..=self.rounds {
      for number in 1..=self.winners_count(round) {
        out.push(Position::new(BracketType::Winners, round, number));
      }
    }
    let loser_brackets: &[BracketType] = match self.format {
      Format::SingleElimination => &[],
      Format::DoubleElimination => &[BracketType::Losers],
      Format::DoubleEliminationSplit => &[BracketType::LosersA, BracketType::LosersB],
    };
    for bracket in loser_brackets.iter().copied() {
      for round in 1..=self.losers_rounds() {
        for number in 1..=self.losers_count(round) {
          out.push(Position::new(bracket, round, number));
        }
      }
    }
    if self.split() {
      out.push(Position::new(BracketType::Losers, 1, 1));
      out.push(Position::new(BracketType::Losers, 2, 1));
    }
    if self.format.is_double() {
      out.push(self.grand_final(1));
      if self.reset {
        out.push(self.grand_final(2));
      }
    }
    out
  }

  pub fn winner_route(&self, pos: Position) -> Route {
    match pos.bracket {
      BracketType::Winners => {
        if pos.round < self.rounds {
          Route::Match(
            Position::new(BracketType::Winners, pos.round + 1, (pos.number + 1) / 2),
            Slot::for_match_number(pos.number),
          )
        } else if self.format.is_double() {
          Route::Match(self.grand_final(1), Slot::One)
        } else {
          Route::Terminal
        }
      }
      BracketType::Losers if self.split() => {
        if pos.round == 1 {
          Route::Match(Position::new(BracketType::Losers, 2, 1), Slot::One)
        } else {
          Route::Match(self.grand_final(1), Slot::Two)
        }
      }
      BracketType::Losers | BracketType::LosersA | BracketType::LosersB => {
        if pos.round < self.losers_rounds() {
          if pos.round % 2 == 1 {
            // Survivors meet the next wave of winners-bracket drop-ins one to one.
            Route::Match(Position::new(pos.bracket, pos.round + 1, pos.number), Slot::One)
          } else {
            Route::Match(
              Position::new(pos.bracket, pos.round + 1, (pos.number + 1) / 2),
              Slot::for_match_number(pos.number),
            )
          }
        } else {
          match pos.bracket {
            BracketType::LosersA => Route::Match(Position::new(BracketType::Losers, 1, 1), Slot::One),
            BracketType::LosersB => Route::Match(Position::new(BracketType::Losers, 1, 1), Slot::Two),
            _ => Route::Match(self.grand_final(1), Slot::Two),
          }
        }
      }
      BracketType::GrandFinal => {
        if pos.round == 1 && self.reset {
          Route::Match(self.grand_final(2), Slot::One)
        } else {
          Route::Terminal
        }
      }
    }
  }

  pub fn loser_route(&self, pos: Position) -> Option<(Position, Slot)> {
    match (pos.bracket, self.format) {
      (_, Format::SingleElimination) => None,
      (BracketType::Winners, Format::DoubleElimination) => {
        if self.rounds == 1 {
          return Some((self.grand_final(1), Slot::Two));
        }
        Some(drop_into(BracketType::Losers, pos.round, pos.number))
      }
      (BracketType::Winners, Format::DoubleEliminationSplit) => {
        if pos.round == self.rounds {
          return Some((Position::new(BracketType::Losers, 2, 1), Slot::Two));
        }
        let half = self.winners_count(pos.round) / 2;
        if pos.number <= half {
          Some(drop_into(BracketType::LosersA, pos.round, pos.number))
        } else {
          Some(drop_into(BracketType::LosersB, pos.round, pos.number - half))
        }
      }
      (BracketType::GrandFinal, _) if pos.round == 1 && self.reset => {
        Some((self.grand_final(2), Slot::Two))
      }
      _ => None,
    }
  }

  /// Split format only: which half of the winners bracket a position belongs to.
  pub fn group(&self, pos: Position) -> Option<BracketGroup> {
    match pos.bracket {
      BracketType::LosersA => Some(BracketGroup::A),
      BracketType::LosersB => Some(BracketGroup::B),
      BracketType::Winners if self.split() && pos.round < self.rounds => {
        if pos.number <= self.winners_count(pos.round) / 2 {
          Some(BracketGroup::A)
        } else {
          Some(BracketGroup::B)
        }
      }
      _ => None,
    }
  }

  pub fn round_label(&self, pos: Position) -> String {
    match pos.bracket {
      BracketType::Winners => {
        let name = match self.rounds - pos.round {
          0 => "Final",
          1 => "Semifinal",
          2 => "Quarterfinal",
          _ => "",
        };
        match (self.format.is_double(), name.is_empty()) {
          (false, false) => name.to_string(),
          (false, true) => format!("Round {}", pos.round),
          (true, false) => format!("Winners {name}"),
          (true, true) => format!("Winners Round {}", pos.round),
        }
      }
      BracketType::Losers if self.split() => {
        if pos.round == 1 {
          "Losers Semifinal".to_string()
        } else {
          "Losers Final".to_string()
        }
      }
      BracketType::Losers => {
        if pos.round == self.losers_rounds() {
          "Losers Final".to_string()
        } else {
          format!("Losers Round {}", pos.round)
        }
      }
      BracketType::LosersA | BracketType::LosersB => {
        let group = if pos.bracket == BracketType::LosersA { "A" } else { "B" };
        if pos.round == self.losers_rounds() {
          format!("Losers Branch {group} Final")
        } else {
          format!("Losers Branch {group} R{}", pos.round)
        }
      }
      BracketType::GrandFinal => {
        if pos.round == 1 {
          "Grand Final".to_string()
        } else {
          "Grand Final Reset".to_string()
        }
      }
    }
  }
}

/// Winners round 1 losers pair up in losers round 1; later winners-bracket losers drop
/// into the even losers round that matches their winners round, against a survivor.
fn drop_into(bracket: BracketType, winners_round: u32, number: u32) -> (Position, Slot) {
  if winners_round == 1 {
    (Position::new(bracket, 1, (number + 1) / 2), Slot::for_match_number(number))
  } else {
    (Position::new(bracket, 2 * (winners_round - 1), number), Slot::Two)
  }
}

pub fn match_id(pos: Position) -> MatchId {
  let code = match pos.bracket {
    BracketType::Winners => "W",
    BracketType::Losers => "L",
    BracketType::LosersA => "LA",
    BracketType::LosersB => "LB",
    BracketType::GrandFinal => return MatchId::new(format!("GF{}", pos.round)),
  };
  MatchId::new(format!("{code}{}-{}", pos.round, pos.number))
}

/// Bracket line order for `size` seeds: 1 v size, then each pair split so the top seeds
/// only meet in the late rounds.
pub fn seed_positions(size: u32) -> Vec<u32> {
  let mut seeds = vec![1u32];
  while seeds.len() < size as usize {
    let n = seeds.len() as u32;
    let mut next = Vec::with_capacity(seeds.len() * 2);
    for seed in seeds.iter().copied() {
      next.push(seed);
      next.push((n * 2 + 1).saturating_sub(seed));
    }
    seeds = next;
  }
  seeds
}

pub fn next_power_of_two(n: usize) -> usize {
  n.max(1).next_power_of_two()
}
