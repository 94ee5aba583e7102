use log::debug;
use std::collections::HashSet;

use crate::errors::LogicError;
use crate::models::core::{ImplicationId, PropertyId, SpaceId, TraitId, ValueId};
use crate::models::formula::Formula;
use crate::models::implication::Implication;
use crate::models::proof::{Proof, ProofStep};
use crate::models::snippet::{ObjectRef, Snippet};
use crate::services::consistency;
use crate::services::evaluator::{eval, verify_match, Valuation};
use crate::services::matcher::spaces_matching;
use crate::services::store::Database;

/// The agent string recorded on automatically generated proof snippets.
pub const PROOF_AGENT: &str = "topology_facts_lib::services::prover::Prover";

/// The public interface to automatic proof generation: forward chaining
/// over the implication set, with an auditable proof recorded for every
/// derived trait.
pub struct Prover;

impl Prover {
    /// Spaces where the implication can prove new traits: the antecedent
    /// holds but the consequent is not yet known to.
    pub fn find_forward(db: &Database, implication: &Implication) -> Vec<SpaceId> {
        let all = db.space_ids();
        spaces_matching(db, &implication.antecedent, Valuation::True, &all)
            .into_iter()
            .filter(|&s| eval(db, s, &implication.consequent) != Valuation::True)
            .collect()
    }

    /// Spaces where the contrapositive can prove new traits: the
    /// consequent fails but the antecedent is not yet known to.
    pub fn find_contra(db: &Database, implication: &Implication) -> Vec<SpaceId> {
        let all = db.space_ids();
        spaces_matching(db, &implication.consequent, Valuation::False, &all)
            .into_iter()
            .filter(|&s| eval(db, s, &implication.antecedent) != Valuation::False)
            .collect()
    }

    /// Applies the implication to the space, adding new traits (with
    /// proofs) if possible.
    pub fn prove(
        db: &mut Database,
        implication: &Implication,
        space: SpaceId,
    ) -> Result<Vec<TraitId>, LogicError> {
        let witnesses = verify_match(db, space, &implication.antecedent)?;
        let mut steps: Vec<ProofStep> = witnesses.into_iter().map(ProofStep::Trait).collect();
        steps.push(ProofStep::Implication(implication.id));
        let mut created = Vec::new();
        Self::force_match(db, space, &implication.consequent, &steps, &mut created)?;
        Ok(created)
    }

    /// Applies the contrapositive of the implication to the space,
    /// similar to [`Prover::prove`].
    pub fn prove_contrapositive(
        db: &mut Database,
        implication: &Implication,
        space: SpaceId,
    ) -> Result<Vec<TraitId>, LogicError> {
        let negated_consequent = implication.consequent.negate()?;
        let witnesses = verify_match(db, space, &negated_consequent)?;
        let mut steps: Vec<ProofStep> = witnesses.into_iter().map(ProofStep::Trait).collect();
        steps.push(ProofStep::Implication(implication.id));
        let negated_antecedent = implication.antecedent.negate()?;
        let mut created = Vec::new();
        Self::force_match(db, space, &negated_antecedent, &steps, &mut created)?;
        Ok(created)
    }

    /// Applies the implication and its contrapositive to the space,
    /// deducing new traits if possible. `VerifyFailed` and `Ambiguous`
    /// just mean "no new fact derivable right now" and are swallowed; a
    /// `Contradiction` is surfaced.
    pub fn apply(
        db: &mut Database,
        implication: ImplicationId,
        space: SpaceId,
    ) -> Result<Vec<TraitId>, LogicError> {
        let imp = db
            .implication(implication)
            .cloned()
            .ok_or(LogicError::MissingObject {
                kind: "implication",
                id: implication,
            })?;
        let mut created = Vec::new();
        match Self::prove(db, &imp, space) {
            Ok(mut ids) => created.append(&mut ids),
            Err(e) if e.is_soft() => debug!("({}|{}) {}", implication, space, e),
            Err(e) => return Err(e),
        }
        match Self::prove_contrapositive(db, &imp, space) {
            Ok(mut ids) => created.append(&mut ids),
            Err(e) if e.is_soft() => debug!("({}|{}) {}", implication, space, e),
            Err(e) => return Err(e),
        }
        Ok(created)
    }

    /// Forces the space to match the formula by adding traits as needed.
    ///
    /// `steps` are prepended to the proof of every trait added. A
    /// disjunction can only be forced when all but one child is already
    /// false: the witnesses of the other children's negations join the
    /// proof and the remaining child is forced in turn.
    fn force_match(
        db: &mut Database,
        space: SpaceId,
        formula: &Formula,
        steps: &[ProofStep],
        created: &mut Vec<TraitId>,
    ) -> Result<(), LogicError> {
        match formula {
            Formula::Atom {
                property, value, ..
            } => match db.value_of(space, *property) {
                Some(stored) if stored == *value => Ok(()),
                Some(stored) => Err(contradiction(db, space, *property, stored, *value)),
                None => {
                    let id = Self::add_proof(db, space, *property, *value, steps)?;
                    created.push(id);
                    Ok(())
                }
            },
            Formula::And(subs) => {
                for sf in subs {
                    Self::force_match(db, space, sf, steps, created)?;
                }
                Ok(())
            }
            Formula::Or(subs) => {
                let mut unknown = None;
                let mut extra_steps = Vec::new();
                for sf in subs {
                    match eval(db, space, sf) {
                        Valuation::True => return Ok(()),
                        Valuation::False => {
                            let witnesses = verify_match(db, space, &sf.negate()?)?;
                            extra_steps.extend(witnesses.into_iter().map(ProofStep::Trait));
                        }
                        Valuation::Unknown => {
                            if unknown.is_some() {
                                return Err(LogicError::Ambiguous(
                                    formula.render(Some(db), false),
                                ));
                            }
                            unknown = Some(sf);
                        }
                    }
                }
                match unknown {
                    // The single (formerly) unknown must be true
                    Some(sf) => {
                        let mut all_steps = steps.to_vec();
                        all_steps.append(&mut extra_steps);
                        Self::force_match(db, space, sf, &all_steps, created)
                    }
                    // Every child is false: the formula is unsatisfiable
                    // on this space.
                    None => Err(LogicError::Contradiction(format!(
                        "every disjunct of {} is false on space {}",
                        formula.render(Some(db), false),
                        space
                    ))),
                }
            }
            Formula::Empty => Ok(()),
        }
    }

    /// Records a derived trait together with its proof snippet.
    fn add_proof(
        db: &mut Database,
        space: SpaceId,
        property: PropertyId,
        value: ValueId,
        steps: &[ProofStep],
    ) -> Result<TraitId, LogicError> {
        let id = db.put_trait(space, property, value)?;
        let proof = Proof::new(steps.to_vec());
        db.attach_snippet(Snippet::proof(
            ObjectRef::Trait(id),
            proof.encode(),
            PROOF_AGENT,
        ))?;
        debug!(
            "added trait {} with proof \"{}\"",
            db.trait_name(id, true)
                .unwrap_or_else(|_| format!("{}", id)),
            proof
        );
        Ok(id)
    }

    // ── Triggers ─────────────────────────────────────────────────────────

    /// Records a user-entered trait and checks all implications involving
    /// its property for new proofs, cascading through any traits derived
    /// along the way.
    pub fn add_trait(
        db: &mut Database,
        space: SpaceId,
        property: PropertyId,
        value: ValueId,
        description: &str,
    ) -> Result<TraitId, LogicError> {
        let id = db.put_trait(space, property, value)?;
        db.attach_snippet(Snippet::description(ObjectRef::Trait(id), description))?;
        Self::on_trait_added(db, id)?;
        Ok(id)
    }

    /// The insertion trigger: applies every implication mentioning the
    /// new trait's property to its space, then does the same for each
    /// trait that derivation produced, until no new trait appears.
    pub fn on_trait_added(db: &mut Database, trait_id: TraitId) -> Result<(), LogicError> {
        let mut queue = vec![trait_id];
        while let Some(id) = queue.pop() {
            let Some(t) = db.trait_by_id(id).cloned() else {
                continue;
            };
            for implication in db.implications_mentioning(t.property) {
                let created = Self::apply(db, implication, t.space)?;
                queue.extend(created);
            }
        }
        Ok(())
    }

    /// Verifies that the implication has no counterexamples, saves it,
    /// and runs the initial inference sweep over every space it (or its
    /// contrapositive) can prove something new about.
    pub fn add_implication(
        db: &mut Database,
        antecedent: Formula,
        consequent: Formula,
        description: &str,
    ) -> Result<ImplicationId, LogicError> {
        let candidate = Implication::new(0, antecedent, consequent);
        let cx = consistency::counterexamples(db, &candidate);
        if !cx.is_empty() {
            return Err(LogicError::ImplicationHasCounterexamples(cx));
        }
        let id = db.insert_implication(candidate.antecedent, candidate.consequent);
        db.attach_snippet(Snippet::description(ObjectRef::Implication(id), description))?;

        let imp = db
            .implication(id)
            .cloned()
            .expect("implication was just inserted");
        for space in Self::find_forward(db, &imp) {
            for t in Self::apply(db, id, space)? {
                Self::on_trait_added(db, t)?;
            }
        }
        for space in Self::find_contra(db, &imp) {
            for t in Self::apply(db, id, space)? {
                Self::on_trait_added(db, t)?;
            }
        }
        Ok(id)
    }

    // ── Deletion & recovery ──────────────────────────────────────────────

    /// Returns all traits that would have no proof if `trait_id` were
    /// deleted, transitively, ascending by id.
    pub fn orphans(db: &Database, trait_id: TraitId) -> Vec<TraitId> {
        let mut result = Vec::new();
        let mut seen: HashSet<TraitId> = HashSet::from([trait_id]);
        let mut to_visit = vec![trait_id];
        while let Some(t) = to_visit.pop() {
            for dep in db.implied_traits(ProofStep::Trait(t)) {
                if seen.insert(dep) {
                    result.push(dep);
                    to_visit.push(dep);
                }
            }
        }
        result.sort_unstable();
        result
    }

    /// Deletes a trait together with the traits whose proofs transitively
    /// depended on it, then re-derives whatever still follows from the
    /// remaining facts. Returns the ids of the traits deleted alongside.
    pub fn remove_trait(db: &mut Database, trait_id: TraitId) -> Result<Vec<TraitId>, LogicError> {
        let orphaned = Self::orphans(db, trait_id);
        db.delete_trait(trait_id)?;
        for &t in &orphaned {
            if db.trait_by_id(t).is_some() {
                db.delete_trait(t)?;
            }
        }
        Self::add_proofs(db)?;
        Ok(orphaned)
    }

    /// Deletes an implication and every trait whose proof depended on it,
    /// then re-derives from the remaining implications.
    pub fn remove_implication(
        db: &mut Database,
        implication: ImplicationId,
    ) -> Result<Vec<TraitId>, LogicError> {
        let direct = db.implied_traits(ProofStep::Implication(implication));
        let mut orphaned: HashSet<TraitId> = HashSet::new();
        for t in direct {
            orphaned.insert(t);
            orphaned.extend(Self::orphans(db, t));
        }
        db.delete_implication(implication)?;
        let mut orphaned: Vec<TraitId> = orphaned.into_iter().collect();
        orphaned.sort_unstable();
        for &t in &orphaned {
            if db.trait_by_id(t).is_some() {
                db.delete_trait(t)?;
            }
        }
        Self::add_proofs(db)?;
        Ok(orphaned)
    }

    /// Extrapolates the existing traits as far as possible: applies every
    /// implication over every relevant space, repeating until a full pass
    /// derives nothing new.
    pub fn add_proofs(db: &mut Database) -> Result<(), LogicError> {
        loop {
            let before = db.traits().count();
            for id in db.implication_ids() {
                let imp = match db.implication(id) {
                    Some(imp) => imp.clone(),
                    None => continue,
                };
                for space in Self::find_forward(db, &imp) {
                    Self::apply(db, id, space)?;
                }
                for space in Self::find_contra(db, &imp) {
                    Self::apply(db, id, space)?;
                }
            }
            if db.traits().count() == before {
                return Ok(());
            }
        }
    }
}

fn contradiction(
    db: &Database,
    space: SpaceId,
    property: PropertyId,
    stored: ValueId,
    proposed: ValueId,
) -> LogicError {
    let name = db
        .property(property)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| property.to_string());
    LogicError::Contradiction(format!(
        "space {} has value {} for {}, cannot force {}",
        space, stored, name, proposed
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::Value;
    use crate::services::parser::human_to_formula;

    struct Fixture {
        db: Database,
        space: SpaceId,
        a: PropertyId,
        b: PropertyId,
        c: PropertyId,
    }

    fn fixture() -> Fixture {
        let mut db = Database::new();
        let space = db.add_space("space");
        let a = db.add_property("A");
        let b = db.add_property("B");
        let c = db.add_property("C");
        Fixture { db, space, a, b, c }
    }

    fn imp(db: &mut Database, antecedent: &str, consequent: &str) -> ImplicationId {
        let ant = human_to_formula(db, antecedent).unwrap();
        let cons = human_to_formula(db, consequent).unwrap();
        Prover::add_implication(db, ant, cons, "").unwrap()
    }

    #[test]
    fn test_direct_implication() {
        // A & A => B creates B
        let Fixture {
            mut db, space, a, b, ..
        } = fixture();
        let i = imp(&mut db, "A", "B");
        let ta = Prover::add_trait(&mut db, space, a, Value::TRUE, "").unwrap();

        assert_eq!(db.traits_of_space(space).len(), 2);
        assert_eq!(db.value_of(space, b), Some(Value::TRUE));
        let tb = db.get_trait(space, b).unwrap().id;
        assert_eq!(
            db.auto_proof(tb).unwrap().steps,
            vec![ProofStep::Trait(ta), ProofStep::Implication(i)]
        );
    }

    #[test]
    fn test_contrapositive_implication() {
        // ~B & A => B creates ~A
        let Fixture {
            mut db, space, a, b, ..
        } = fixture();
        imp(&mut db, "A", "B");
        Prover::add_trait(&mut db, space, b, Value::FALSE, "").unwrap();

        assert_eq!(db.traits_of_space(space).len(), 2);
        assert_eq!(db.value_of(space, a), Some(Value::FALSE));
    }

    #[test]
    fn test_conjunctive_consequent() {
        // A => B + C
        let Fixture {
            mut db,
            space,
            a,
            b,
            c,
        } = fixture();
        imp(&mut db, "A", "B + C");
        Prover::add_trait(&mut db, space, a, Value::TRUE, "").unwrap();
        assert_eq!(db.traits_of_space(space).len(), 3);
        assert_eq!(db.value_of(space, b), Some(Value::TRUE));
        assert_eq!(db.value_of(space, c), Some(Value::TRUE));

        // Clear the slate; a false conjunct fires the contrapositive
        for id in db.traits_of_space(space) {
            db.delete_trait(id).unwrap();
        }
        Prover::add_trait(&mut db, space, c, Value::FALSE, "").unwrap();
        assert_eq!(db.traits_of_space(space).len(), 2);
        assert_eq!(db.value_of(space, a), Some(Value::FALSE));
    }

    #[test]
    fn test_disjunctive_consequent() {
        // A => B | C
        let Fixture {
            mut db,
            space,
            a,
            b,
            c,
        } = fixture();
        let i = imp(&mut db, "A", "B | C");
        let ta = Prover::add_trait(&mut db, space, a, Value::TRUE, "").unwrap();
        // Two unknown disjuncts: nothing can be forced yet
        assert_eq!(db.traits_of_space(space).len(), 1);

        let tc = Prover::add_trait(&mut db, space, c, Value::FALSE, "").unwrap();
        assert_eq!(db.traits_of_space(space).len(), 3);
        assert_eq!(db.value_of(space, b), Some(Value::TRUE));
        let tb = db.get_trait(space, b).unwrap().id;
        assert_eq!(
            db.auto_proof(tb).unwrap().steps,
            vec![
                ProofStep::Trait(ta),
                ProofStep::Implication(i),
                ProofStep::Trait(tc)
            ]
        );
    }

    #[test]
    fn test_chained_proofs() {
        // I1: ~A => B, I2: B => ~C; asserting ~A settles all three
        let Fixture {
            mut db,
            space,
            a,
            b,
            c,
        } = fixture();
        imp(&mut db, "~A", "B");
        imp(&mut db, "B", "~C");
        let ta = Prover::add_trait(&mut db, space, a, Value::FALSE, "").unwrap();

        assert_eq!(db.value_of(space, a), Some(Value::FALSE));
        assert_eq!(db.value_of(space, b), Some(Value::TRUE));
        assert_eq!(db.value_of(space, c), Some(Value::FALSE));

        let tb = db.get_trait(space, b).unwrap().id;
        let tc = db.get_trait(space, c).unwrap().id;
        assert_eq!(db.auto_proof(tc).unwrap().assumed_traits(), vec![tb]);
        assert_eq!(db.auto_proof(tb).unwrap().assumed_traits(), vec![ta]);
    }

    #[test]
    fn test_counterexample_refusal() {
        let Fixture {
            mut db, space, a, b, ..
        } = fixture();
        Prover::add_trait(&mut db, space, a, Value::TRUE, "").unwrap();
        Prover::add_trait(&mut db, space, b, Value::TRUE, "").unwrap();

        let ant = human_to_formula(&db, "A").unwrap();
        let cons = human_to_formula(&db, "~B").unwrap();
        let err = Prover::add_implication(&mut db, ant, cons, "").unwrap_err();
        assert_eq!(err, LogicError::ImplicationHasCounterexamples(vec![space]));
        assert_eq!(db.implications().count(), 0);
        assert_eq!(db.traits_of_space(space).len(), 2);
    }

    #[test]
    fn test_new_implication_sweeps_existing_spaces() {
        let Fixture {
            mut db, space, a, b, ..
        } = fixture();
        let other = db.add_space("other");
        Prover::add_trait(&mut db, space, a, Value::TRUE, "").unwrap();
        Prover::add_trait(&mut db, other, b, Value::FALSE, "").unwrap();

        imp(&mut db, "A", "B");
        // Forward on `space`, contrapositive on `other`
        assert_eq!(db.value_of(space, b), Some(Value::TRUE));
        assert_eq!(db.value_of(other, a), Some(Value::FALSE));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let Fixture {
            mut db, space, a, b, ..
        } = fixture();
        let i = imp(&mut db, "A", "B");
        Prover::add_trait(&mut db, space, a, Value::TRUE, "").unwrap();
        assert_eq!(db.value_of(space, b), Some(Value::TRUE));

        let created = Prover::apply(&mut db, i, space).unwrap();
        assert!(created.is_empty());
        assert_eq!(db.traits_of_space(space).len(), 2);
    }

    #[test]
    fn test_orphans_are_transitive() {
        let Fixture {
            mut db,
            space,
            a,
            b,
            c,
        } = fixture();
        imp(&mut db, "~A", "B");
        imp(&mut db, "B", "~C");
        let ta = Prover::add_trait(&mut db, space, a, Value::FALSE, "").unwrap();

        let tb = db.get_trait(space, b).unwrap().id;
        let tc = db.get_trait(space, c).unwrap().id;
        assert_eq!(Prover::orphans(&db, ta), vec![tb, tc]);
        assert_eq!(Prover::orphans(&db, tb), vec![tc]);
        assert!(Prover::orphans(&db, tc).is_empty());
    }

    #[test]
    fn test_remove_trait_deletes_orphans_and_rederives() {
        let Fixture {
            mut db,
            space,
            a,
            b,
            c,
        } = fixture();
        imp(&mut db, "~A", "B");
        imp(&mut db, "B", "~C");
        let ta = Prover::add_trait(&mut db, space, a, Value::FALSE, "").unwrap();

        let removed = Prover::remove_trait(&mut db, ta).unwrap();
        assert_eq!(removed.len(), 2);
        // Nothing left to derive from
        assert!(db.traits_of_space(space).is_empty());
    }

    #[test]
    fn test_remove_trait_keeps_rederivable_facts() {
        let Fixture {
            mut db, space, a, b, ..
        } = fixture();
        imp(&mut db, "A", "B");
        let ta = Prover::add_trait(&mut db, space, a, Value::TRUE, "").unwrap();
        let tb = db.get_trait(space, b).unwrap().id;

        // Deleting the derived trait re-derives it from A
        Prover::remove_trait(&mut db, tb).unwrap();
        assert_eq!(db.value_of(space, b), Some(Value::TRUE));
        assert_eq!(db.value_of(space, a), Some(Value::TRUE));
        let _ = ta;
    }

    #[test]
    fn test_remove_implication_deletes_dependent_traits() {
        let Fixture {
            mut db, space, a, b, ..
        } = fixture();
        let i = imp(&mut db, "A", "B");
        Prover::add_trait(&mut db, space, a, Value::TRUE, "").unwrap();
        assert_eq!(db.value_of(space, b), Some(Value::TRUE));

        Prover::remove_implication(&mut db, i).unwrap();
        assert_eq!(db.value_of(space, b), None);
        assert_eq!(db.value_of(space, a), Some(Value::TRUE));
        assert_eq!(db.implications().count(), 0);
    }

    #[test]
    fn test_derived_traits_have_proofs_and_user_traits_do_not() {
        let Fixture {
            mut db, space, a, b, ..
        } = fixture();
        imp(&mut db, "A", "B");
        let ta = Prover::add_trait(&mut db, space, a, Value::TRUE, "").unwrap();
        let tb = db.get_trait(space, b).unwrap().id;

        assert!(db.auto_proof(ta).is_none());
        let proof = db.auto_proof(tb).unwrap();
        assert!(!proof.is_empty());
        for t in proof.assumed_traits() {
            assert!(db.trait_by_id(t).is_some());
        }
    }
}
