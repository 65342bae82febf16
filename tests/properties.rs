//! Random full playthroughs: whatever the results, a bracket ends with exactly one champion
//! and every other participant eliminated.

mod common;

use bracket_engine::{Format, StandingState};
use common::{make_bracket, play_out};
use proptest::prelude::*;

fn format_and_size() -> impl Strategy<Value = (Format, usize)> {
    prop_oneof![
        (2usize..=48).prop_map(|n| (Format::SingleElimination, n)),
        (2usize..=48).prop_map(|n| (Format::DoubleElimination, n)),
        prop::sample::select(vec![8usize, 16, 32]).prop_map(|n| (Format::DoubleEliminationSplit, n)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_random_results_crown_one_champion(
        (format, n) in format_and_size(),
        coin in prop::collection::vec(any::<bool>(), 1..64),
    ) {
        let mut bracket = make_bracket(format, n);
        let mut flips = coin.iter().copied().cycle();
        let played = play_out(&mut bracket, |_| {
            if flips.next().unwrap_or(true) { [2, 1] } else { [0, 2] }
        });

        prop_assert!(bracket.champion().is_some());
        prop_assert!(bracket.playable().is_empty());
        prop_assert!(bracket.fault().is_none());

        let standings = bracket.standings();
        let champions = standings.iter().filter(|s| s.state == StandingState::Champion).count();
        let alive = standings.iter().filter(|s| s.state == StandingState::Alive).count();
        prop_assert_eq!(champions, 1);
        prop_assert_eq!(alive, 0);

        let losses_to_exit = if format.is_double() { 2 } else { 1 };
        for standing in standings.iter().filter(|s| s.state == StandingState::Eliminated) {
            prop_assert_eq!(standing.losses, losses_to_exit);
        }

        let minimum = if format.is_double() { 2 * n - 2 } else { n - 1 };
        prop_assert!(played == minimum || (format.is_double() && played == minimum + 1));
    }

    #[test]
    fn prop_tied_scores_never_change_state(
        n in 2usize..=24,
        score in 0u32..5,
    ) {
        let mut bracket = make_bracket(Format::DoubleElimination, n);
        let before = bracket.records();
        let first = bracket.playable()[0].id.clone();
        prop_assert!(bracket.submit_result(first.as_str(), score, score).is_err());
        prop_assert_eq!(bracket.records(), before);
    }
}
