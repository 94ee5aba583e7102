use log::{debug, error};

use crate::models::core::{ImplicationId, SpaceId};
use crate::models::implication::Implication;
use crate::services::evaluator::Valuation;
use crate::services::matcher::{intersection, spaces_matching};
use crate::services::store::Database;

/// Spaces where this implication holds: antecedent and consequent both
/// evaluate to true.
pub fn examples(db: &Database, implication: &Implication) -> Vec<SpaceId> {
    find_spaces(db, implication, Valuation::True, Valuation::True)
}

/// Spaces where this implication does not hold: the antecedent evaluates
/// to true and the consequent to false. Should be empty for any saved
/// implication.
pub fn counterexamples(db: &Database, implication: &Implication) -> Vec<SpaceId> {
    find_spaces(db, implication, Valuation::True, Valuation::False)
}

fn find_spaces(
    db: &Database,
    implication: &Implication,
    antecedent_target: Valuation,
    consequent_target: Valuation,
) -> Vec<SpaceId> {
    let all = db.space_ids();
    intersection(
        [
            spaces_matching(db, &implication.antecedent, antecedent_target, &all),
            spaces_matching(db, &implication.consequent, consequent_target, &all),
        ]
        .into_iter(),
    )
}

/// Implications not marked as equivalences whose converse has no known
/// counterexample: candidates for being equivalences.
pub fn open_converses(db: &Database) -> Vec<ImplicationId> {
    db.implications()
        .filter(|i| !i.reverses && counterexamples(db, &i.converse()).is_empty())
        .map(|i| i.id)
        .collect()
}

/// Checks the entire database for consistency, returning every
/// implication with counterexamples. Must be empty in a healthy database.
pub fn check_consistency(db: &Database) -> Vec<(ImplicationId, Vec<SpaceId>)> {
    let mut errors = Vec::new();
    for implication in db.implications() {
        let cx = counterexamples(db, implication);
        if !cx.is_empty() {
            errors.push((implication.id, cx));
        }
    }
    if errors.is_empty() {
        debug!("no errors found");
    } else {
        error!("found {} implications with counterexamples", errors.len());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LogicError;
    use crate::models::core::Value;
    use crate::models::formula::Formula;
    use crate::services::parser::human_to_formula;
    use crate::services::prover::Prover;

    fn fixture() -> (Database, SpaceId, u32, u32) {
        let mut db = Database::new();
        let s = db.add_space("space");
        let a = db.add_property("A");
        let b = db.add_property("B");
        (db, s, a, b)
    }

    #[test]
    fn test_examples_and_counterexamples() {
        let (mut db, s1, a, b) = fixture();
        let s2 = db.add_space("other");
        db.put_trait(s1, a, Value::TRUE).unwrap();
        db.put_trait(s1, b, Value::TRUE).unwrap();
        db.put_trait(s2, a, Value::TRUE).unwrap();
        db.put_trait(s2, b, Value::FALSE).unwrap();

        let imp = Implication::new(
            0,
            Formula::atom(a, Value::TRUE),
            Formula::atom(b, Value::TRUE),
        );
        assert_eq!(examples(&db, &imp), vec![s1]);
        assert_eq!(counterexamples(&db, &imp), vec![s2]);
    }

    #[test]
    fn test_saved_implications_have_no_counterexamples() {
        let (mut db, s, a, _) = fixture();
        Prover::add_trait(&mut db, s, a, Value::TRUE, "").unwrap();
        let ant = human_to_formula(&db, "A").unwrap();
        let cons = human_to_formula(&db, "B").unwrap();
        Prover::add_implication(&mut db, ant, cons, "").unwrap();

        for imp in db.implications() {
            assert!(counterexamples(&db, imp).is_empty());
        }
        assert!(check_consistency(&db).is_empty());
    }

    #[test]
    fn test_consistency_sweep_finds_bypassed_implication() {
        let (mut db, s, a, b) = fixture();
        db.put_trait(s, a, Value::TRUE).unwrap();
        db.put_trait(s, b, Value::TRUE).unwrap();

        // Bypass the counterexample check
        let i = db.insert_implication(
            Formula::atom(a, Value::TRUE),
            Formula::atom(b, Value::FALSE),
        );
        assert_eq!(check_consistency(&db), vec![(i, vec![s])]);
    }

    #[test]
    fn test_applying_inconsistent_implication_is_a_contradiction() {
        let (mut db, s, a, b) = fixture();
        db.put_trait(s, a, Value::TRUE).unwrap();
        db.put_trait(s, b, Value::TRUE).unwrap();
        let i = db.insert_implication(
            Formula::atom(a, Value::TRUE),
            Formula::atom(b, Value::FALSE),
        );

        let err = Prover::apply(&mut db, i, s).unwrap_err();
        assert!(matches!(err, LogicError::Contradiction(_)));
    }

    #[test]
    fn test_open_converses() {
        let (mut db, s, a, b) = fixture();
        let s2 = db.add_space("other");
        // s: A, B; s2: ~A. The converse B => A gains a counterexample
        // once s2 also gets B.
        Prover::add_trait(&mut db, s, a, Value::TRUE, "").unwrap();
        Prover::add_trait(&mut db, s, b, Value::TRUE, "").unwrap();
        Prover::add_trait(&mut db, s2, a, Value::FALSE, "").unwrap();

        let ant = human_to_formula(&db, "A").unwrap();
        let cons = human_to_formula(&db, "B").unwrap();
        let i = Prover::add_implication(&mut db, ant, cons, "").unwrap();
        assert_eq!(open_converses(&db), vec![i]);

        Prover::add_trait(&mut db, s2, b, Value::TRUE, "").unwrap();
        assert!(open_converses(&db).is_empty());
    }
}
