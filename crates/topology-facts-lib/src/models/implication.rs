use serde::{Deserialize, Serialize};

use crate::errors::LogicError;
use crate::models::core::ImplicationId;
use crate::models::formula::{AtomLookup, Formula};

/// An Implication allows us to deduce new properties from old ones: a
/// universally quantified rule `antecedent ⇒ consequent` over formulas.
///
/// The save-time invariant (no counterexamples in the current database) is
/// enforced by `Prover::add_implication`, not by this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implication {
    pub id: ImplicationId,
    pub antecedent: Formula,
    pub consequent: Formula,
    /// Marks whether an implication is actually an equivalence (its
    /// converse is recorded elsewhere in the database).
    #[serde(default)]
    pub reverses: bool,
}

impl Implication {
    pub fn new(id: ImplicationId, antecedent: Formula, consequent: Formula) -> Self {
        Self {
            id,
            antecedent,
            consequent,
            reverses: false,
        }
    }

    /// Constructs the logically equivalent contrapositive of this
    /// implication: `¬C ⇒ ¬A`. It keeps the same id, since it stands in
    /// for this implication during inference and proof recording.
    pub fn contrapositive(&self) -> Result<Implication, LogicError> {
        Ok(Implication {
            id: self.id,
            antecedent: self.consequent.negate()?,
            consequent: self.antecedent.negate()?,
            reverses: self.reverses,
        })
    }

    /// Constructs the logical converse of this implication: `C ⇒ A`.
    /// Unlike the contrapositive it is not equivalent; it is used to
    /// surface candidate equivalences.
    pub fn converse(&self) -> Implication {
        Implication {
            id: self.id,
            antecedent: self.consequent.clone(),
            consequent: self.antecedent.clone(),
            reverses: self.reverses,
        }
    }

    /// Renders `antecedent ⇒ consequent`, optionally with names and links.
    pub fn render(&self, lookup: Option<&dyn AtomLookup>, link: bool) -> String {
        format!(
            "{} ⇒ {}",
            self.antecedent.render(lookup, link),
            self.consequent.render(lookup, link)
        )
    }
}

impl std::fmt::Display for Implication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render(None, false))
    }
}
