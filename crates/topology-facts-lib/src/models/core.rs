use serde::{Deserialize, Serialize};

use crate::errors::LogicError;

pub type ValueSetId = u32;
pub type ValueId = u32;
pub type PropertyId = u32;
pub type SpaceId = u32;
pub type TraitId = u32;
pub type ImplicationId = u32;

/// A collection of values a property may take - booleans, cardinals, &c.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSet {
    pub id: ValueSetId,
    pub name: String,
}

impl ValueSet {
    pub const BOOLEAN: ValueSetId = 1;
}

/// A single value - True (boolean), ω (cardinal), &c.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub id: ValueId,
    pub name: String,
    pub value_set: ValueSetId,
}

impl Value {
    pub const TRUE: ValueId = 1;
    pub const FALSE: ValueId = 2;

    /// Negates a boolean value id. Values outside the boolean set have no
    /// defined negation.
    pub fn negate(value: ValueId) -> Result<ValueId, LogicError> {
        match value {
            Value::TRUE => Ok(Value::FALSE),
            Value::FALSE => Ok(Value::TRUE),
            _ => Err(LogicError::UnsupportedNegation),
        }
    }

    /// Formats the value for display in the summary table
    pub fn table_display(&self) -> &'static str {
        match self.id {
            Value::TRUE => "+",
            Value::FALSE => "-",
            _ => "",
        }
    }
}

/// A property like "compact" or "Hausdorff"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub slug: String,
    pub value_set: ValueSetId,
}

/// A topological space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    pub name: String,
    pub slug: String,
    pub fully_defined: bool,
}

/// A Trait records whether a Space has a particular Property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trait {
    pub id: TraitId,
    pub space: SpaceId,
    pub property: PropertyId,
    pub value: ValueId,
}

/// Replaces (P=True) with P and (P=False) with ~P
pub fn atomize(property: &str, value: ValueId, value_name: &str) -> String {
    match value {
        Value::TRUE => property.to_string(),
        Value::FALSE => format!("~{}", property),
        _ => format!("{} = {}", property, value_name),
    }
}

/// Derives a URL-safe slug from a display name: lowercased, with runs of
/// anything that is not alphanumeric collapsed to single hyphens.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negate_boolean_values() {
        assert_eq!(Value::negate(Value::TRUE).unwrap(), Value::FALSE);
        assert_eq!(Value::negate(Value::FALSE).unwrap(), Value::TRUE);
    }

    #[test]
    fn test_negate_non_boolean_value() {
        let err = Value::negate(7).unwrap_err();
        assert_eq!(err, LogicError::UnsupportedNegation);
    }

    #[test]
    fn test_atomize() {
        assert_eq!(atomize("compact", Value::TRUE, "True"), "compact");
        assert_eq!(atomize("compact", Value::FALSE, "False"), "~compact");
        assert_eq!(atomize("cardinality", 7, "omega"), "cardinality = omega");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Sorgenfrey line"), "sorgenfrey-line");
        assert_eq!(slugify("T_2"), "t-2");
        assert_eq!(slugify("  Fully   Normal  "), "fully-normal");
    }
}
