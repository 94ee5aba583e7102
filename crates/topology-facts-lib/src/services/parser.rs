use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::errors::LogicError;
use crate::models::core::{PropertyId, Value, ValueId};
use crate::models::formula::Formula;
use crate::services::store::Database;

/// Removes diacritics by NFD-decomposing the input and discarding
/// combining marks.
pub fn strip_diacritics(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// A query that either parsed as a formula or falls back to plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    Formula(Formula),
    Text(String),
}

/// Takes a string (as would be received from a human-completed form
/// field) and attempts to return the formula it represents.
///
/// Atoms take the forms `P`, `~P`, `not P` and `P = V`, with property and
/// value names matched case-insensitively (numeric ids are also
/// accepted). Atoms are joined by `+` (AND) or `|` (OR); combining both
/// in one input is rejected, and a trailing separator is trimmed.
pub fn human_to_formula(db: &Database, input: &str) -> Result<Formula, LogicError> {
    let stripped = strip_diacritics(input);
    let mut s = stripped.trim();
    if let Some(trimmed) = s.strip_suffix(['+', '|']) {
        s = trimmed.trim_end();
    }
    if s.is_empty() {
        return Err(LogicError::Parse("cannot parse an empty formula".to_string()));
    }

    let has_and = s.contains('+');
    let has_or = s.contains('|');
    if has_and && has_or {
        return Err(LogicError::MixedOperators);
    }

    let atoms: Vec<&str> = if has_and {
        s.split('+').collect()
    } else if has_or {
        s.split('|').collect()
    } else {
        vec![s]
    };

    let mut subs = Vec::with_capacity(atoms.len());
    for atom in atoms {
        let (pstr, vtoken) = deatomize(atom.trim());
        let property = resolve_property(db, pstr)?;
        let value = resolve_value(db, vtoken)?;
        subs.push(Formula::atom(property, value));
    }

    if has_and {
        Ok(Formula::and(subs))
    } else if has_or {
        Ok(Formula::or(subs))
    } else {
        Ok(subs.remove(0))
    }
}

/// Interprets a search box query: a parsable formula, or free text with
/// trailing separators trimmed.
pub fn parse_search(db: &Database, query: &str) -> SearchQuery {
    let stripped = strip_diacritics(query);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return SearchQuery::Text(String::new());
    }
    match human_to_formula(db, trimmed) {
        Ok(formula) => SearchQuery::Formula(formula),
        Err(_) => {
            let mut text = trimmed;
            if let Some(t) = text.strip_suffix(['+', '|']) {
                text = t.trim_end();
            }
            SearchQuery::Text(text.to_string())
        }
    }
}

/// Splits one atom token into its property part and a value marker.
fn deatomize(atom: &str) -> (&str, &str) {
    if let Some((p, v)) = atom.split_once('=') {
        (p.trim(), v.trim())
    } else if let Some(rest) = atom.strip_prefix('~') {
        (rest.trim(), "~")
    } else if atom.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("not ")) {
        (atom[4..].trim(), "~")
    } else {
        (atom, "+")
    }
}

fn resolve_property(db: &Database, pstr: &str) -> Result<PropertyId, LogicError> {
    if let Ok(id) = pstr.parse::<PropertyId>() {
        if db.property(id).is_some() {
            return Ok(id);
        }
    } else if let Some(p) = db.find_property(pstr) {
        return Ok(p.id);
    }
    Err(LogicError::UnknownProperty(pstr.to_string()))
}

fn resolve_value(db: &Database, vstr: &str) -> Result<ValueId, LogicError> {
    match vstr {
        "+" => Ok(Value::TRUE),
        "~" | "-" => Ok(Value::FALSE),
        _ => {
            if let Ok(id) = vstr.parse::<ValueId>() {
                if db.value(id).is_some() {
                    return Ok(id);
                }
            } else if let Some(v) = db.find_value(vstr) {
                return Ok(v.id);
            }
            Err(LogicError::UnknownValue(vstr.to_string()))
        }
    }
}
