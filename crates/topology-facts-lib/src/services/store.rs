use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::errors::LogicError;
use crate::models::core::{
    atomize, ImplicationId, Property, PropertyId, Space, SpaceId, Trait, TraitId, Value, ValueId,
    ValueSet, ValueSetId, slugify,
};
use crate::models::formula::{AtomLookup, Formula};
use crate::models::implication::Implication;
use crate::models::proof::{Proof, ProofStep};
use crate::models::snippet::{ObjectRef, Snippet};

/// The shared mutable state of the deductive core: object tables keyed by
/// stable integer ids, description snippets, and the secondary indices
/// the evaluator, matcher and prover read.
///
/// The secondary indices (including the proof dependency edge table) are
/// derived data; they are skipped during serialization and rebuilt on
/// load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    value_sets: BTreeMap<ValueSetId, ValueSet>,
    values: BTreeMap<ValueId, Value>,
    properties: BTreeMap<PropertyId, Property>,
    spaces: BTreeMap<SpaceId, Space>,
    traits: BTreeMap<TraitId, Trait>,
    implications: BTreeMap<ImplicationId, Implication>,
    snippets: Vec<Snippet>,

    next_value_id: ValueId,
    next_property_id: PropertyId,
    next_space_id: SpaceId,
    next_trait_id: TraitId,
    next_implication_id: ImplicationId,

    /// `(space, property)` is the uniqueness key for traits.
    #[serde(skip)]
    by_pair: HashMap<(SpaceId, PropertyId), TraitId>,
    #[serde(skip)]
    by_space: HashMap<SpaceId, Vec<TraitId>>,
    #[serde(skip)]
    by_property: HashMap<PropertyId, Vec<TraitId>>,
    /// Edge table: derived trait -> the steps of its automated proof.
    #[serde(skip)]
    proof_refs: HashMap<TraitId, Vec<ProofStep>>,
    /// Reverse edge table: proof step -> traits whose proofs use it.
    #[serde(skip)]
    consumers: HashMap<ProofStep, Vec<TraitId>>,
}

impl Database {
    /// Creates an empty database seeded with the boolean value set.
    pub fn new() -> Self {
        let mut value_sets = BTreeMap::new();
        value_sets.insert(
            ValueSet::BOOLEAN,
            ValueSet {
                id: ValueSet::BOOLEAN,
                name: "boolean".to_string(),
            },
        );
        let mut values = BTreeMap::new();
        values.insert(
            Value::TRUE,
            Value {
                id: Value::TRUE,
                name: "True".to_string(),
                value_set: ValueSet::BOOLEAN,
            },
        );
        values.insert(
            Value::FALSE,
            Value {
                id: Value::FALSE,
                name: "False".to_string(),
                value_set: ValueSet::BOOLEAN,
            },
        );
        Self {
            value_sets,
            values,
            properties: BTreeMap::new(),
            spaces: BTreeMap::new(),
            traits: BTreeMap::new(),
            implications: BTreeMap::new(),
            snippets: Vec::new(),
            next_value_id: 3,
            next_property_id: 1,
            next_space_id: 1,
            next_trait_id: 1,
            next_implication_id: 1,
            by_pair: HashMap::new(),
            by_space: HashMap::new(),
            by_property: HashMap::new(),
            proof_refs: HashMap::new(),
            consumers: HashMap::new(),
        }
    }

    /// Loads a database snapshot and rebuilds the derived indices.
    pub fn from_json(json: &str) -> Result<Self, LogicError> {
        let mut db: Database = serde_json::from_str(json)
            .map_err(|e| LogicError::Parse(format!("invalid database snapshot: {}", e)))?;
        db.rebuild_indices();
        Ok(db)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("database snapshot serializes")
    }

    fn rebuild_indices(&mut self) {
        self.by_pair.clear();
        self.by_space.clear();
        self.by_property.clear();
        self.proof_refs.clear();
        self.consumers.clear();
        let trait_ids: Vec<TraitId> = self.traits.keys().copied().collect();
        for id in trait_ids {
            let t = self.traits[&id].clone();
            self.index_trait(&t);
        }
        let proofs: Vec<(TraitId, String)> = self
            .snippets
            .iter()
            .filter_map(|s| match (s.object, s.automatically_added()) {
                (ObjectRef::Trait(t), true) => Some((t, s.text.clone())),
                _ => None,
            })
            .collect();
        for (t, text) in proofs {
            match Proof::decode(&text) {
                Ok(proof) => self.index_proof(t, &proof),
                Err(e) => log::error!("discarding malformed proof for trait {}: {}", t, e),
            }
        }
    }

    fn index_trait(&mut self, t: &Trait) {
        self.by_pair.insert((t.space, t.property), t.id);
        sorted_insert(self.by_space.entry(t.space).or_default(), t.id);
        sorted_insert(self.by_property.entry(t.property).or_default(), t.id);
    }

    fn index_proof(&mut self, consumer: TraitId, proof: &Proof) {
        for step in &proof.steps {
            sorted_insert(self.consumers.entry(*step).or_default(), consumer);
        }
        self.proof_refs.insert(consumer, proof.steps.clone());
    }

    // ── Object creation ──────────────────────────────────────────────────

    pub fn add_value_set(&mut self, name: &str) -> ValueSetId {
        let id = self.value_sets.keys().max().copied().unwrap_or(0) + 1;
        self.value_sets.insert(
            id,
            ValueSet {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn add_value(&mut self, name: &str, value_set: ValueSetId) -> ValueId {
        let id = self.next_value_id;
        self.next_value_id += 1;
        self.values.insert(
            id,
            Value {
                id,
                name: name.to_string(),
                value_set,
            },
        );
        id
    }

    /// Adds a property with the boolean value set and a slug derived from
    /// its name.
    pub fn add_property(&mut self, name: &str) -> PropertyId {
        let id = self.next_property_id;
        self.next_property_id += 1;
        self.properties.insert(
            id,
            Property {
                id,
                name: name.to_string(),
                slug: slugify(name),
                value_set: ValueSet::BOOLEAN,
            },
        );
        id
    }

    pub fn add_space(&mut self, name: &str) -> SpaceId {
        let id = self.next_space_id;
        self.next_space_id += 1;
        self.spaces.insert(
            id,
            Space {
                id,
                name: name.to_string(),
                slug: slugify(name),
                fully_defined: true,
            },
        );
        id
    }

    /// Inserts an implication record without the counterexample check or
    /// the trigger sweep; `Prover::add_implication` is the checked entry
    /// point.
    pub fn insert_implication(&mut self, antecedent: Formula, consequent: Formula) -> ImplicationId {
        let id = self.next_implication_id;
        self.next_implication_id += 1;
        self.implications
            .insert(id, Implication::new(id, antecedent, consequent));
        id
    }

    pub fn set_reverses(&mut self, id: ImplicationId, reverses: bool) -> Result<(), LogicError> {
        let imp = self
            .implications
            .get_mut(&id)
            .ok_or(LogicError::MissingObject {
                kind: "implication",
                id,
            })?;
        imp.reverses = reverses;
        Ok(())
    }

    // ── Traits ───────────────────────────────────────────────────────────

    /// Records `(space, property) = value`. Idempotent when the same value
    /// is already stored; fails with `TraitConflict` on a different one.
    pub fn put_trait(
        &mut self,
        space: SpaceId,
        property: PropertyId,
        value: ValueId,
    ) -> Result<TraitId, LogicError> {
        if !self.spaces.contains_key(&space) {
            return Err(LogicError::MissingObject {
                kind: "space",
                id: space,
            });
        }
        let prop = self
            .properties
            .get(&property)
            .ok_or(LogicError::MissingObject {
                kind: "property",
                id: property,
            })?;
        match self.values.get(&value) {
            Some(v) if v.value_set == prop.value_set => {}
            _ => return Err(LogicError::InvalidValue { property, value }),
        }
        if let Some(&existing) = self.by_pair.get(&(space, property)) {
            let t = &self.traits[&existing];
            if t.value == value {
                return Ok(existing);
            }
            return Err(LogicError::TraitConflict {
                space,
                property,
                existing: t.value,
                proposed: value,
            });
        }
        let id = self.next_trait_id;
        self.next_trait_id += 1;
        let t = Trait {
            id,
            space,
            property,
            value,
        };
        self.index_trait(&t);
        self.traits.insert(id, t);
        Ok(id)
    }

    /// Removes a trait along with its snippets and proof edges. Traits
    /// whose proofs referenced it are left to the caller (see
    /// `Prover::remove_trait`).
    pub fn delete_trait(&mut self, id: TraitId) -> Result<Trait, LogicError> {
        let t = self.traits.remove(&id).ok_or(LogicError::MissingObject {
            kind: "trait",
            id,
        })?;
        self.by_pair.remove(&(t.space, t.property));
        if let Some(v) = self.by_space.get_mut(&t.space) {
            v.retain(|&x| x != id);
        }
        if let Some(v) = self.by_property.get_mut(&t.property) {
            v.retain(|&x| x != id);
        }
        self.remove_snippets_for(ObjectRef::Trait(id));
        Ok(t)
    }

    pub fn delete_implication(&mut self, id: ImplicationId) -> Result<Implication, LogicError> {
        let imp = self
            .implications
            .remove(&id)
            .ok_or(LogicError::MissingObject {
                kind: "implication",
                id,
            })?;
        self.remove_snippets_for(ObjectRef::Implication(id));
        Ok(imp)
    }

    // ── Snippets & the proof edge table ──────────────────────────────────

    /// Attaches a snippet; automated proofs on traits also populate the
    /// dependency edge table.
    pub fn attach_snippet(&mut self, snippet: Snippet) -> Result<Uuid, LogicError> {
        let id = snippet.id;
        if let (ObjectRef::Trait(t), true) = (snippet.object, snippet.automatically_added()) {
            let proof = Proof::decode(&snippet.text)?;
            self.index_proof(t, &proof);
        }
        self.snippets.push(snippet);
        Ok(id)
    }

    fn remove_snippets_for(&mut self, object: ObjectRef) {
        if let ObjectRef::Trait(t) = object {
            if let Some(steps) = self.proof_refs.remove(&t) {
                for step in steps {
                    if let Some(v) = self.consumers.get_mut(&step) {
                        v.retain(|&x| x != t);
                    }
                }
            }
        }
        self.snippets.retain(|s| s.object != object);
    }

    /// The first snippet attached to an object; by convention its
    /// description.
    pub fn description(&self, object: ObjectRef) -> Option<&str> {
        self.snippets
            .iter()
            .find(|s| s.object == object)
            .map(|s| s.text.as_str())
    }

    pub fn snippets_for(&self, object: ObjectRef) -> Vec<&Snippet> {
        self.snippets.iter().filter(|s| s.object == object).collect()
    }

    /// The first proof-bearing snippet attached to a trait.
    pub fn proof_snippet(&self, id: TraitId) -> Option<&Snippet> {
        self.snippets
            .iter()
            .find(|s| s.object == ObjectRef::Trait(id) && s.is_proof())
    }

    /// The decoded automated proof of a trait, if it has one.
    pub fn auto_proof(&self, id: TraitId) -> Option<Proof> {
        self.proof_refs.get(&id).map(|steps| Proof::new(steps.clone()))
    }

    /// Traits whose automated proofs reference the given step directly.
    pub fn implied_traits(&self, step: ProofStep) -> Vec<TraitId> {
        self.consumers.get(&step).cloned().unwrap_or_default()
    }

    /// Snippets which need improved descriptions.
    pub fn incomplete_snippets(&self) -> Vec<&Snippet> {
        self.snippets.iter().filter(|s| s.text.is_empty()).collect()
    }

    // ── Lookups ──────────────────────────────────────────────────────────

    pub fn space(&self, id: SpaceId) -> Option<&Space> {
        self.spaces.get(&id)
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(&id)
    }

    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(&id)
    }

    pub fn implication(&self, id: ImplicationId) -> Option<&Implication> {
        self.implications.get(&id)
    }

    pub fn trait_by_id(&self, id: TraitId) -> Option<&Trait> {
        self.traits.get(&id)
    }

    pub fn get_trait(&self, space: SpaceId, property: PropertyId) -> Option<&Trait> {
        self.by_pair
            .get(&(space, property))
            .and_then(|id| self.traits.get(id))
    }

    /// The stored value of a property on a space, if any.
    pub fn value_of(&self, space: SpaceId, property: PropertyId) -> Option<ValueId> {
        self.get_trait(space, property).map(|t| t.value)
    }

    pub fn spaces(&self) -> impl Iterator<Item = &Space> {
        self.spaces.values()
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn traits(&self) -> impl Iterator<Item = &Trait> {
        self.traits.values()
    }

    pub fn implications(&self) -> impl Iterator<Item = &Implication> {
        self.implications.values()
    }

    /// All space ids, ascending.
    pub fn space_ids(&self) -> Vec<SpaceId> {
        self.spaces.keys().copied().collect()
    }

    pub fn implication_ids(&self) -> Vec<ImplicationId> {
        self.implications.keys().copied().collect()
    }

    pub fn traits_of_space(&self, space: SpaceId) -> Vec<TraitId> {
        self.by_space.get(&space).cloned().unwrap_or_default()
    }

    pub fn traits_of_property(&self, property: PropertyId) -> Vec<TraitId> {
        self.by_property.get(&property).cloned().unwrap_or_default()
    }

    pub fn find_space(&self, name: &str) -> Option<&Space> {
        self.spaces
            .values()
            .find(|s| s.name.eq_ignore_ascii_case(name) || s.slug == name)
    }

    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.properties
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name) || p.slug == name)
    }

    pub fn find_value(&self, name: &str) -> Option<&Value> {
        self.values
            .values()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Implications whose antecedent or consequent mentions the property.
    pub fn implications_mentioning(&self, property: PropertyId) -> Vec<ImplicationId> {
        self.implications
            .values()
            .filter(|i| {
                i.antecedent.mentions_property(property)
                    || i.consequent.mentions_property(property)
            })
            .map(|i| i.id)
            .collect()
    }

    /// Spaces for which this property's value is unknown, restricted to
    /// fully defined spaces.
    pub fn unknown_spaces(&self, property: PropertyId) -> Vec<SpaceId> {
        self.spaces
            .values()
            .filter(|s| s.fully_defined && !self.by_pair.contains_key(&(s.id, property)))
            .map(|s| s.id)
            .collect()
    }

    // ── Display names & URLs ─────────────────────────────────────────────

    pub fn space_url(&self, id: SpaceId) -> Option<String> {
        self.spaces.get(&id).map(|s| format!("/spaces/{}", s.slug))
    }

    pub fn property_url_of(&self, id: PropertyId) -> Option<String> {
        self.properties
            .get(&id)
            .map(|p| format!("/properties/{}", p.slug))
    }

    pub fn trait_url(&self, id: TraitId) -> Option<String> {
        let t = self.traits.get(&id)?;
        Some(format!(
            "/spaces/{}/properties/{}",
            self.spaces.get(&t.space)?.slug,
            self.properties.get(&t.property)?.slug
        ))
    }

    pub fn implication_url(&self, id: ImplicationId) -> String {
        format!("/implications/{}", id)
    }

    /// `Space: property` display name for a trait; `with_space` controls
    /// the space prefix.
    pub fn trait_name(&self, id: TraitId, with_space: bool) -> Result<String, LogicError> {
        let t = self.traits.get(&id).ok_or(LogicError::MissingObject {
            kind: "trait",
            id,
        })?;
        let property = self
            .properties
            .get(&t.property)
            .ok_or(LogicError::MissingObject {
                kind: "property",
                id: t.property,
            })?;
        let value = self.values.get(&t.value).ok_or(LogicError::MissingObject {
            kind: "value",
            id: t.value,
        })?;
        let atom = atomize(&property.name, t.value, &value.name);
        if with_space {
            let space = self.spaces.get(&t.space).ok_or(LogicError::MissingObject {
                kind: "space",
                id: t.space,
            })?;
            Ok(format!("{}: {}", space.name, atom))
        } else {
            Ok(atom)
        }
    }

    pub fn implication_name(&self, id: ImplicationId) -> Result<String, LogicError> {
        let imp = self.implications.get(&id).ok_or(LogicError::MissingObject {
            kind: "implication",
            id,
        })?;
        Ok(imp.render(Some(self), false))
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomLookup for Database {
    fn property_name(&self, property: PropertyId) -> Option<String> {
        self.properties.get(&property).map(|p| p.name.clone())
    }

    fn value_name(&self, value: ValueId) -> Option<String> {
        self.values.get(&value).map(|v| v.name.clone())
    }

    fn property_url(&self, property: PropertyId) -> Option<String> {
        self.property_url_of(property)
    }
}

fn sorted_insert(v: &mut Vec<u32>, id: u32) {
    if let Err(pos) = v.binary_search(&id) {
        v.insert(pos, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_pair() -> (Database, SpaceId, PropertyId) {
        let mut db = Database::new();
        let s = db.add_space("Sorgenfrey line");
        let p = db.add_property("compact");
        (db, s, p)
    }

    #[test]
    fn test_put_trait_and_lookup() {
        let (mut db, s, p) = db_with_pair();
        let t = db.put_trait(s, p, Value::FALSE).unwrap();
        assert_eq!(db.value_of(s, p), Some(Value::FALSE));
        assert_eq!(db.traits_of_space(s), vec![t]);
        assert_eq!(db.traits_of_property(p), vec![t]);
    }

    #[test]
    fn test_put_trait_is_idempotent() {
        let (mut db, s, p) = db_with_pair();
        let t1 = db.put_trait(s, p, Value::TRUE).unwrap();
        let t2 = db.put_trait(s, p, Value::TRUE).unwrap();
        assert_eq!(t1, t2);
        assert_eq!(db.traits().count(), 1);
    }

    #[test]
    fn test_put_trait_conflict() {
        let (mut db, s, p) = db_with_pair();
        db.put_trait(s, p, Value::TRUE).unwrap();
        let err = db.put_trait(s, p, Value::FALSE).unwrap_err();
        assert!(matches!(err, LogicError::TraitConflict { .. }));
    }

    #[test]
    fn test_put_trait_checks_value_set() {
        let (mut db, s, p) = db_with_pair();
        let cardinals = db.add_value_set("cardinals");
        let omega = db.add_value("omega", cardinals);
        let err = db.put_trait(s, p, omega).unwrap_err();
        assert!(matches!(err, LogicError::InvalidValue { .. }));
    }

    #[test]
    fn test_delete_trait_clears_indices() {
        let (mut db, s, p) = db_with_pair();
        let t = db.put_trait(s, p, Value::TRUE).unwrap();
        db.delete_trait(t).unwrap();
        assert_eq!(db.value_of(s, p), None);
        assert!(db.traits_of_space(s).is_empty());
    }

    #[test]
    fn test_trait_ids_are_not_reused() {
        let (mut db, s, p) = db_with_pair();
        let t1 = db.put_trait(s, p, Value::TRUE).unwrap();
        db.delete_trait(t1).unwrap();
        let t2 = db.put_trait(s, p, Value::TRUE).unwrap();
        assert!(t2 > t1);
    }

    #[test]
    fn test_proof_edge_table() {
        let (mut db, s, p) = db_with_pair();
        let q = db.add_property("metrizable");
        let t1 = db.put_trait(s, p, Value::TRUE).unwrap();
        let t2 = db.put_trait(s, q, Value::TRUE).unwrap();
        db.attach_snippet(Snippet::proof(
            ObjectRef::Trait(t2),
            format!("t{},i1,", t1),
            "prover",
        ))
        .unwrap();
        assert_eq!(db.implied_traits(ProofStep::Trait(t1)), vec![t2]);
        assert_eq!(db.implied_traits(ProofStep::Implication(1)), vec![t2]);
        assert_eq!(
            db.auto_proof(t2).unwrap().steps,
            vec![ProofStep::Trait(t1), ProofStep::Implication(1)]
        );
    }

    #[test]
    fn test_snapshot_round_trip_rebuilds_indices() {
        let (mut db, s, p) = db_with_pair();
        let q = db.add_property("metrizable");
        let t1 = db.put_trait(s, p, Value::TRUE).unwrap();
        let t2 = db.put_trait(s, q, Value::TRUE).unwrap();
        db.attach_snippet(Snippet::proof(
            ObjectRef::Trait(t2),
            format!("t{},i1,", t1),
            "prover",
        ))
        .unwrap();

        let restored = Database::from_json(&db.to_json_pretty()).unwrap();
        assert_eq!(restored.value_of(s, p), Some(Value::TRUE));
        assert_eq!(restored.implied_traits(ProofStep::Trait(t1)), vec![t2]);
    }

    #[test]
    fn test_unknown_spaces() {
        let (mut db, s, p) = db_with_pair();
        let s2 = db.add_space("Cantor set");
        db.put_trait(s, p, Value::TRUE).unwrap();
        assert_eq!(db.unknown_spaces(p), vec![s2]);
    }

    #[test]
    fn test_incomplete_snippets() {
        let (mut db, s, _) = db_with_pair();
        db.attach_snippet(Snippet::description(ObjectRef::Space(s), "")).unwrap();
        let s2 = db.add_space("Cantor set");
        db.attach_snippet(Snippet::description(
            ObjectRef::Space(s2),
            "the middle-thirds set",
        ))
        .unwrap();
        let incomplete = db.incomplete_snippets();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].object, ObjectRef::Space(s));
    }

    #[test]
    fn test_trait_name() {
        let (mut db, s, p) = db_with_pair();
        let t = db.put_trait(s, p, Value::FALSE).unwrap();
        assert_eq!(db.trait_name(t, true).unwrap(), "Sorgenfrey line: ~compact");
        assert_eq!(db.trait_name(t, false).unwrap(), "~compact");
    }
}
