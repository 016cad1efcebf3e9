//! Per-direction state machine edges (§4.5). One tagged `SwapState` enum
//! is shared across directions (`crate::types::SwapState`); this module
//! is the single source of truth for which edges are legal for a given
//! `Direction`, so "state is monotone along the legal transition set"
//! (Invariant 2, Testable property 3) is checked in one place.

use crate::types::{Direction, SwapState};

/// Whether `from -> to` is a legal transition for `direction`.
pub fn is_valid_transition(direction: Direction, from: SwapState, to: SwapState) -> bool {
    use SwapState::*;

    match direction {
        Direction::ToBtc | Direction::ToBtcLn => matches!(
            (from, to),
            (Created, Committed)
                | (Created, QuoteExpired)
                | (Created, Failed)
                | (Committed, Claimed)
                | (Committed, Refundable)
                | (Committed, Failed)
                | (Refundable, Refunded)
                | (Refundable, Claimed)
        ),
        Direction::FromBtc => matches!(
            (from, to),
            (Created, Committed)
                | (Created, QuoteExpired)
                | (Created, Failed)
                | (Committed, Claimed)
                | (Committed, Refundable)
                | (Committed, Failed)
                | (Refundable, Refunded)
        ),
        Direction::FromBtcLn => matches!(
            (from, to),
            (Created, PrCreated)
                | (Created, QuoteExpired)
                | (Created, Failed)
                | (PrCreated, PrPaid)
                | (PrCreated, QuoteExpired)
                | (PrCreated, Failed)
                | (PrPaid, ClaimCommitted)
                | (PrPaid, Failed)
                | (ClaimCommitted, ClaimClaimed)
                | (ClaimCommitted, Failed)
        ),
        Direction::LnForGas => matches!(
            (from, to),
            (Created, PrCreated) | (PrCreated, Finished) | (PrCreated, Expired) | (Created, Failed) | (PrCreated, Failed)
        ),
    }
}

/// Validate an entire observed sequence of state changes against the
/// direction's FSM (Testable property 3).
pub fn validate_sequence(direction: Direction, states: &[SwapState]) -> Result<(), (SwapState, SwapState)> {
    for pair in states.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        if !is_valid_transition(direction, from, to) {
            return Err((from, to));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_btc_happy_path_is_valid() {
        let states = [SwapState::Created, SwapState::Committed, SwapState::Claimed];
        assert!(validate_sequence(Direction::ToBtc, &states).is_ok());
    }

    #[test]
    fn to_btc_refund_path_is_valid() {
        let states = [
            SwapState::Created,
            SwapState::Committed,
            SwapState::Refundable,
            SwapState::Refunded,
        ];
        assert!(validate_sequence(Direction::ToBtc, &states).is_ok());
    }

    #[test]
    fn state_regression_is_invalid() {
        let states = [SwapState::Committed, SwapState::Created];
        assert!(validate_sequence(Direction::ToBtc, &states).is_err());
    }

    #[test]
    fn from_btcln_full_path_is_valid() {
        let states = [
            SwapState::Created,
            SwapState::PrCreated,
            SwapState::PrPaid,
            SwapState::ClaimCommitted,
            SwapState::ClaimClaimed,
        ];
        assert!(validate_sequence(Direction::FromBtcLn, &states).is_ok());
    }

    #[test]
    fn ln_for_gas_path_is_valid() {
        let states = [SwapState::Created, SwapState::PrCreated, SwapState::Finished];
        assert!(validate_sequence(Direction::LnForGas, &states).is_ok());
    }

    #[test]
    fn cross_direction_edge_rejected() {
        // ClaimCommitted is meaningless for ToBTC.
        assert!(!is_valid_transition(Direction::ToBtc, SwapState::Committed, SwapState::ClaimCommitted));
    }
}
