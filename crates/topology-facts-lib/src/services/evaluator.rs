use serde::{Deserialize, Serialize};

use crate::errors::LogicError;
use crate::models::core::{SpaceId, TraitId};
use crate::models::formula::Formula;
use crate::services::store::Database;

/// The three-valued result of evaluating a formula against a space's
/// known traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Valuation {
    True,
    False,
    Unknown,
}

/// Evaluates a formula on a space:
/// - an atom is true if the stored trait has its value, false if a
///   different value is stored, and unknown if nothing is stored;
/// - a conjunction is false as soon as any child is, true when all are;
/// - a disjunction is true as soon as any child is, false when all are;
/// - the empty formula is true.
pub fn eval(db: &Database, space: SpaceId, formula: &Formula) -> Valuation {
    match formula {
        Formula::Atom {
            property, value, ..
        } => match db.value_of(space, *property) {
            Some(stored) if stored == *value => Valuation::True,
            Some(_) => Valuation::False,
            None => Valuation::Unknown,
        },
        Formula::And(subs) => {
            let mut result = Valuation::True;
            for sf in subs {
                match eval(db, space, sf) {
                    Valuation::False => return Valuation::False,
                    Valuation::Unknown => result = Valuation::Unknown,
                    Valuation::True => {}
                }
            }
            result
        }
        Formula::Or(subs) => {
            let mut result = Valuation::False;
            for sf in subs {
                match eval(db, space, sf) {
                    Valuation::True => return Valuation::True,
                    Valuation::Unknown => result = Valuation::Unknown,
                    Valuation::False => {}
                }
            }
            result
        }
        Formula::Empty => Valuation::True,
    }
}

/// Verifies that the formula evaluates to true on the space and returns
/// the minimal list of traits demonstrating it: for a conjunction the
/// witnesses of every child, for a disjunction the witnesses of the first
/// satisfied child. Fails with `VerifyFailed` if the space does not match
/// as claimed.
pub fn verify_match(
    db: &Database,
    space: SpaceId,
    formula: &Formula,
) -> Result<Vec<TraitId>, LogicError> {
    match formula {
        Formula::Atom {
            property, value, ..
        } => match db.get_trait(space, *property) {
            Some(t) if t.value == *value => Ok(vec![t.id]),
            _ => Err(verify_failed(db, space, formula)),
        },
        Formula::And(subs) => {
            let mut witnesses = Vec::new();
            for sf in subs {
                witnesses.extend(verify_match(db, space, sf)?);
            }
            Ok(witnesses)
        }
        Formula::Or(subs) => {
            for sf in subs {
                if let Ok(witnesses) = verify_match(db, space, sf) {
                    return Ok(witnesses);
                }
            }
            Err(verify_failed(db, space, formula))
        }
        Formula::Empty => Ok(Vec::new()),
    }
}

fn verify_failed(db: &Database, space: SpaceId, formula: &Formula) -> LogicError {
    let name = db
        .space(space)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| format!("space {}", space));
    LogicError::VerifyFailed(format!("{} ({})", name, formula.render(Some(db), false)))
}
