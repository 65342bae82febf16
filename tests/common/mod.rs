#![allow(dead_code)]

use bracket_engine::{BracketInstance, BracketOptions, Format, Match, ParticipantId};

pub fn participants(n: usize) -> Vec<ParticipantId> {
    (1..=n).map(|i| ParticipantId::new(format!("p{i}"))).collect()
}

pub fn make_bracket(format: Format, n: usize) -> BracketInstance {
    BracketInstance::generate(format, participants(n), BracketOptions::default()).unwrap()
}

pub fn seed_of(participant: &ParticipantId) -> u32 {
    participant.as_str().trim_start_matches('p').parse().unwrap()
}

/// Scores that let the lower seed number win.
pub fn favourite_wins(m: &Match) -> [u32; 2] {
    let a = seed_of(m.slots[0].as_ref().unwrap());
    let b = seed_of(m.slots[1].as_ref().unwrap());
    if a < b {
        [2, 0]
    } else {
        [0, 2]
    }
}

/// Plays every playable match until none remain. Returns the number of results submitted.
pub fn play_out(bracket: &mut BracketInstance, mut pick: impl FnMut(&Match) -> [u32; 2]) -> usize {
    let mut played = 0;
    loop {
        let Some(m) = bracket.playable().first().map(|m| (*m).clone()) else {
            break;
        };
        let [a, b] = pick(&m);
        bracket.submit_result(m.id.as_str(), a, b).unwrap();
        played += 1;
    }
    played
}
