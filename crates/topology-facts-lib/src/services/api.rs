use serde::{Deserialize, Serialize};

use crate::models::core::{PropertyId, SpaceId, TraitId, ValueId};
use crate::models::formula::Formula;
use crate::models::snippet::ObjectRef;
use crate::services::store::Database;

/// The shapes served by the JSON read API. Each collection function
/// returns an array ordered by id; all ids are integers.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceJson {
    pub id: SpaceId,
    pub name: String,
    pub slug: String,
    pub fully_defined: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyJson {
    pub id: PropertyId,
    pub name: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitJson {
    pub id: TraitId,
    pub space_id: SpaceId,
    pub property_id: PropertyId,
    /// The value's display name, not its id.
    pub value: String,
    pub description: String,
    /// True iff the trait's description was produced by an automated
    /// proof agent.
    pub auto: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplicationJson {
    pub id: u32,
    pub antecedent: String,
    pub consequent: String,
    pub description: String,
}

pub fn spaces(db: &Database) -> Vec<SpaceJson> {
    db.spaces()
        .map(|s| SpaceJson {
            id: s.id,
            name: s.name.clone(),
            slug: s.slug.clone(),
            fully_defined: s.fully_defined,
            description: describe(db, ObjectRef::Space(s.id)),
        })
        .collect()
}

pub fn properties(db: &Database) -> Vec<PropertyJson> {
    db.properties()
        .map(|p| PropertyJson {
            id: p.id,
            name: p.name.clone(),
            slug: p.slug.clone(),
            description: describe(db, ObjectRef::Property(p.id)),
        })
        .collect()
}

/// Traits, paginated by index into the id-ordered collection.
pub fn traits(db: &Database, start: usize, end: Option<usize>) -> Vec<TraitJson> {
    let all: Vec<_> = db.traits().collect();
    let start = start.min(all.len());
    let end = end.unwrap_or(all.len()).clamp(start, all.len());
    all[start..end]
        .iter()
        .map(|t| TraitJson {
            id: t.id,
            space_id: t.space,
            property_id: t.property,
            value: value_name(db, t.value),
            description: describe(db, ObjectRef::Trait(t.id)),
            auto: db
                .snippets_for(ObjectRef::Trait(t.id))
                .first()
                .map(|s| s.automatically_added())
                .unwrap_or(false),
        })
        .collect()
}

pub fn implications(db: &Database) -> Vec<ImplicationJson> {
    db.implications()
        .map(|i| ImplicationJson {
            id: i.id,
            antecedent: formula_string(db, &i.antecedent),
            consequent: formula_string(db, &i.consequent),
            description: describe(db, ObjectRef::Implication(i.id)),
        })
        .collect()
}

/// The API form of a formula: atoms as `<property_id>=<value_name>`,
/// compounds as `(OPs1,s2,...)`.
pub fn formula_string(db: &Database, formula: &Formula) -> String {
    match formula {
        Formula::Atom {
            property, value, ..
        } => format!("{}={}", property, value_name(db, *value)),
        Formula::And(subs) => compound_string(db, subs, Formula::AND),
        Formula::Or(subs) => compound_string(db, subs, Formula::OR),
        Formula::Empty => String::new(),
    }
}

fn compound_string(db: &Database, subs: &[Formula], operator: char) -> String {
    let joined = subs
        .iter()
        .map(|sf| formula_string(db, sf))
        .collect::<Vec<_>>()
        .join(",");
    format!("({}{})", operator, joined)
}

fn value_name(db: &Database, value: ValueId) -> String {
    db.value(value)
        .map(|v| v.name.clone())
        .unwrap_or_else(|| value.to_string())
}

fn describe(db: &Database, object: ObjectRef) -> String {
    db.description(object).unwrap_or_default().to_string()
}
