use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr};

use crate::errors::LogicError;
use crate::models::core::{atomize, PropertyId, Value, ValueId};

/// Comparison operator of an atomic formula. Only equality is supported;
/// the variant exists so the stored grammar stays forward-compatible with
/// value sets ordered by something other than identity (e.g. cardinals).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    #[default]
    Eq,
}

/// Resolves atom ids to display names and URLs when rendering a formula.
pub trait AtomLookup {
    fn property_name(&self, property: PropertyId) -> Option<String>;
    fn value_name(&self, value: ValueId) -> Option<String>;
    fn property_url(&self, property: PropertyId) -> Option<String>;
}

/// A simple logical statement about a topological space. A Formula is
/// exactly one of:
/// - a statement of the form Property = Value
/// - a conjunction (&) of other formulae
/// - a disjunction (|) of other formulae
/// - the trivially-true empty formula ("no constraint")
///
/// Compound nodes are always flattened (a child of an And is never itself
/// an And, similarly Or) and always carry at least two children; the
/// constructors collapse degenerate cases to the sole child.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Formula {
    Atom {
        property: PropertyId,
        value: ValueId,
        #[serde(default)]
        comparison: Comparison,
    },
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Empty,
}

impl Formula {
    pub const AND: char = '&';
    pub const OR: char = '|';

    /// Builds the atomic formula `property = value`.
    pub fn atom(property: PropertyId, value: ValueId) -> Formula {
        Formula::Atom {
            property,
            value,
            comparison: Comparison::Eq,
        }
    }

    /// Builds a flattened conjunction. Children that are themselves
    /// conjunctions are spliced in; the empty formula is dropped.
    pub fn and(subs: Vec<Formula>) -> Formula {
        Self::compound(subs, true)
    }

    /// Builds a flattened disjunction, the dual of [`Formula::and`].
    pub fn or(subs: Vec<Formula>) -> Formula {
        Self::compound(subs, false)
    }

    fn compound(subs: Vec<Formula>, conjunction: bool) -> Formula {
        let mut flat = Vec::with_capacity(subs.len());
        for sf in subs {
            match sf {
                Formula::Empty => {}
                Formula::And(inner) if conjunction => flat.extend(inner),
                Formula::Or(inner) if !conjunction => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Formula::Empty,
            1 => flat.remove(0),
            _ if conjunction => Formula::And(flat),
            _ => Formula::Or(flat),
        }
    }

    /// Determines whether this formula is atomic (has no subformulae)
    pub fn is_atom(&self) -> bool {
        matches!(self, Formula::Atom { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Formula::Empty)
    }

    /// Node count: 1 for an atom, 1 + Σ children for a compound.
    pub fn len(&self) -> usize {
        match self {
            Formula::Atom { .. } => 1,
            Formula::And(subs) | Formula::Or(subs) => {
                1 + subs.iter().map(Formula::len).sum::<usize>()
            }
            Formula::Empty => 0,
        }
    }

    /// Returns a new Formula that is the logical negation of this Formula.
    ///
    /// Atoms negate their value (boolean values only); compounds negate by
    /// De Morgan duality. The empty formula has no negation.
    pub fn negate(&self) -> Result<Formula, LogicError> {
        match self {
            Formula::Atom {
                property,
                value,
                comparison,
            } => Ok(Formula::Atom {
                property: *property,
                value: Value::negate(*value)?,
                comparison: *comparison,
            }),
            Formula::And(subs) => Ok(Formula::Or(Self::negate_all(subs)?)),
            Formula::Or(subs) => Ok(Formula::And(Self::negate_all(subs)?)),
            Formula::Empty => Err(LogicError::UnsupportedNegation),
        }
    }

    fn negate_all(subs: &[Formula]) -> Result<Vec<Formula>, LogicError> {
        subs.iter().map(Formula::negate).collect()
    }

    /// Whether any atom of this formula references the given property.
    pub fn mentions_property(&self, property: PropertyId) -> bool {
        match self {
            Formula::Atom { property: p, .. } => *p == property,
            Formula::And(subs) | Formula::Or(subs) => {
                subs.iter().any(|sf| sf.mentions_property(property))
            }
            Formula::Empty => false,
        }
    }

    /// Pretty-prints the formula. With a `lookup`, atoms display actual
    /// property and value names; `link` additionally wraps each atom in an
    /// anchor to its property page (this always requires a lookup).
    pub fn render(&self, lookup: Option<&dyn AtomLookup>, link: bool) -> String {
        match self {
            Formula::Atom {
                property, value, ..
            } => {
                let (pname, vname) = match lookup {
                    Some(l) => (
                        l.property_name(*property)
                            .unwrap_or_else(|| property.to_string()),
                        l.value_name(*value).unwrap_or_else(|| value.to_string()),
                    ),
                    None => (property.to_string(), value.to_string()),
                };
                let text = atomize(&pname, *value, &vname);
                match lookup.and_then(|l| l.property_url(*property)) {
                    Some(url) if link => format!("<a href=\"{}\">{}</a>", url, text),
                    _ => text,
                }
            }
            Formula::And(subs) => Self::render_compound(subs, Formula::AND, lookup, link),
            Formula::Or(subs) => Self::render_compound(subs, Formula::OR, lookup, link),
            Formula::Empty => String::new(),
        }
    }

    fn render_compound(
        subs: &[Formula],
        operator: char,
        lookup: Option<&dyn AtomLookup>,
        link: bool,
    ) -> String {
        let joined = subs
            .iter()
            .map(|sf| sf.render(lookup, link))
            .collect::<Vec<_>>()
            .join(&format!(" {} ", operator));
        format!("({})", joined)
    }

    /// Serializes the formula for persistence:
    /// - `<property_id>=<value_id>` for atoms
    /// - `(OPf1,f2,...,fn)` for compounds, OP ∈ {&,|}
    /// - the empty string for the empty formula
    pub fn to_stored(&self) -> String {
        match self {
            Formula::Atom {
                property, value, ..
            } => format!("{}={}", property, value),
            Formula::And(subs) => Self::stored_compound(subs, Formula::AND),
            Formula::Or(subs) => Self::stored_compound(subs, Formula::OR),
            Formula::Empty => String::new(),
        }
    }

    fn stored_compound(subs: &[Formula], operator: char) -> String {
        let joined = subs
            .iter()
            .map(Formula::to_stored)
            .collect::<Vec<_>>()
            .join(",");
        format!("({}{})", operator, joined)
    }

    /// Converts a stored string back to a Formula, the inverse of
    /// [`Formula::to_stored`].
    pub fn from_stored(string: &str) -> Result<Formula, LogicError> {
        if string.is_empty() {
            return Ok(Formula::Empty);
        }
        if let Some(inner) = string.strip_prefix('(') {
            let inner = inner
                .strip_suffix(')')
                .ok_or_else(|| LogicError::Parse(format!("unbalanced parentheses: {}", string)))?;
            let mut chars = inner.chars();
            let operator = chars
                .next()
                .ok_or_else(|| LogicError::Parse("empty compound".to_string()))?;
            if operator != Formula::AND && operator != Formula::OR {
                return Err(LogicError::Parse(format!(
                    "unknown operator '{}'",
                    operator
                )));
            }
            let subs = Self::split_subformulae(chars.as_str())?
                .into_iter()
                .map(Formula::from_stored)
                .collect::<Result<Vec<_>, _>>()?;
            if subs.len() < 2 {
                return Err(LogicError::Parse(format!(
                    "compound with fewer than two subformulae: {}",
                    string
                )));
            }
            if operator == Formula::AND {
                Ok(Formula::And(subs))
            } else {
                Ok(Formula::Or(subs))
            }
        } else {
            // This string represents an atom and has the form p=v
            let (p, v) = string
                .split_once('=')
                .ok_or_else(|| LogicError::Parse(format!("malformed atom: {}", string)))?;
            let property = p
                .parse::<PropertyId>()
                .map_err(|_| LogicError::Parse(format!("malformed property id: {}", p)))?;
            let value = v
                .parse::<ValueId>()
                .map_err(|_| LogicError::Parse(format!("malformed value id: {}", v)))?;
            Ok(Formula::atom(property, value))
        }
    }

    /// Splits `f1,f2,...` at commas that are not nested inside parentheses.
    fn split_subformulae(string: &str) -> Result<Vec<&str>, LogicError> {
        let mut subs = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        for (i, c) in string.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        LogicError::Parse(format!("unbalanced parentheses: {}", string))
                    })?;
                }
                ',' if depth == 0 => {
                    subs.push(&string[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(LogicError::Parse(format!(
                "unbalanced parentheses: {}",
                string
            )));
        }
        subs.push(&string[start..]);
        Ok(subs)
    }
}

impl BitAnd for Formula {
    type Output = Formula;

    /// Joins two formulae together with a logical 'and'
    fn bitand(self, other: Formula) -> Formula {
        Formula::and(vec![self, other])
    }
}

impl BitOr for Formula {
    type Output = Formula;

    /// Joins two formulae together with a logical 'or'
    fn bitor(self, other: Formula) -> Formula {
        Formula::or(vec![self, other])
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render(None, false))
    }
}
