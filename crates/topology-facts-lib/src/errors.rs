use thiserror::Error;

use crate::models::core::{PropertyId, SpaceId, ValueId};

/// Errors surfaced by the deductive core.
///
/// `VerifyFailed` and `Ambiguous` are expected outcomes of inference
/// primitives and are swallowed by `Prover::apply`; everything else
/// propagates to the caller with the offending objects echoed back.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LogicError {
    #[error("could not parse formula: {0}")]
    Parse(String),

    #[error("could not parse property \"{0}\"")]
    UnknownProperty(String),

    #[error("could not parse value \"{0}\"")]
    UnknownValue(String),

    #[error("could not parse formula: combined AND and OR is not supported")]
    MixedOperators,

    #[error("negation is only defined for boolean values")]
    UnsupportedNegation,

    #[error("space {space} already has value {existing} for property {property}, not {proposed}")]
    TraitConflict {
        space: SpaceId,
        property: PropertyId,
        existing: ValueId,
        proposed: ValueId,
    },

    #[error("value {value} is not in the value set of property {property}")]
    InvalidValue { property: PropertyId, value: ValueId },

    #[error("contradiction: {0}")]
    Contradiction(String),

    #[error("cannot save implication with known counterexamples: {0:?}")]
    ImplicationHasCounterexamples(Vec<SpaceId>),

    #[error("{0} did not match the formula")]
    VerifyFailed(String),

    #[error("tried to force an OR statement with multiple unknowns: {0}")]
    Ambiguous(String),

    #[error("no {kind} with id {id}")]
    MissingObject { kind: &'static str, id: u32 },
}

impl LogicError {
    /// True for the outcomes of `force_match`/`verify_match` that mean
    /// "no new fact derivable right now" rather than a real failure.
    pub fn is_soft(&self) -> bool {
        matches!(self, LogicError::VerifyFailed(_) | LogicError::Ambiguous(_))
    }
}
