use thiserror::Error;

use crate::types::{Format, MatchId, MatchStatus, Outcome, ParticipantId, Slot};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BracketError {
    #[error("unsupported bracket format \"{0}\"")]
    UnsupportedFormat(String),

    #[error("{format} cannot be played with {count} participants: {reason}")]
    UnsupportedParticipantCount {
        format: Format,
        count: usize,
        reason: String,
    },

    #[error("participant {0} appears more than once in the seed list")]
    DuplicateParticipant(ParticipantId),

    #[error("{outcome} of {origin} has no reachable target match")]
    UnreachableTarget { origin: String, outcome: Outcome },

    #[error("match {0} not found")]
    MatchNotFound(String),

    #[error("match {0} is still waiting for players")]
    MatchNotReady(MatchId),

    #[error("match {match_id} is {status} and cannot take a result")]
    MatchNotPlayable { match_id: MatchId, status: MatchStatus },

    #[error("invalid result: {0}")]
    InvalidResult(String),

    #[error("match {match_id} already completed with {recorded:?}, refusing {submitted:?}")]
    ResultConflict {
        match_id: MatchId,
        recorded: [u32; 2],
        submitted: [u32; 2],
    },

    #[error("{slot} of match {match_id} already holds {existing}, cannot place {incoming}")]
    DuplicateSlotAssignment {
        match_id: MatchId,
        slot: Slot,
        existing: ParticipantId,
        incoming: ParticipantId,
    },

    #[error("bracket invariant violated: {0}")]
    InvariantViolation(String),

    #[error("bracket is faulted and needs manual reconciliation: {0}")]
    BracketFaulted(String),
}

impl BracketError {
    /// Fatal errors mean the bracket structure itself is wrong; the instance stops
    /// accepting mutations once one is seen.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BracketError::UnreachableTarget { .. }
                | BracketError::DuplicateSlotAssignment { .. }
                | BracketError::InvariantViolation(_)
                | BracketError::BracketFaulted(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BracketError::InvariantViolation("x".into()).is_fatal());
        assert!(BracketError::UnreachableTarget {
            origin: "W1-1".into(),
            outcome: Outcome::Loser,
        }
        .is_fatal());
        assert!(!BracketError::InvalidResult("tie".into()).is_fatal());
        assert!(!BracketError::ResultConflict {
            match_id: MatchId::new("W1-1"),
            recorded: [2, 0],
            submitted: [0, 2],
        }
        .is_fatal());
    }

    #[test]
    fn test_messages_name_the_match() {
        let err = BracketError::DuplicateSlotAssignment {
            match_id: MatchId::new("W2-1"),
            slot: Slot::One,
            existing: ParticipantId::new("p1"),
            incoming: ParticipantId::new("p8"),
        };
        assert_eq!(
            err.to_string(),
            "slot1 of match W2-1 already holds p1, cannot place p8"
        );
    }
}
