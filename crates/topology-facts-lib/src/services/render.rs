use serde::Serialize;

use crate::errors::LogicError;
use crate::models::core::TraitId;
use crate::models::proof::{Proof, ProofStep};
use crate::models::snippet::ObjectRef;
use crate::services::store::Database;

/// Takes a proof of the form `t<id>,t<id>,i<id>,t<id>,...` and formats it
/// as plain comma-separated text. `with_space` controls whether trait
/// names carry their space prefix.
pub fn render_text(db: &Database, proof: &str, with_space: bool) -> Result<String, LogicError> {
    let names = step_names(db, proof, with_space)?;
    Ok(names
        .into_iter()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(", "))
}

/// Formats a proof as an HTML list with a link per referenced object.
pub fn render_html(db: &Database, proof: &str, with_space: bool) -> Result<String, LogicError> {
    let names = step_names(db, proof, with_space)?;
    let mut rv = String::new();
    for (name, url) in names {
        rv.push_str(&format!("<a href=\"{}\">{}</a><br/>", url, name));
    }
    Ok(rv)
}

fn step_names(
    db: &Database,
    proof: &str,
    with_space: bool,
) -> Result<Vec<(String, String)>, LogicError> {
    let proof = Proof::decode(proof)?;
    let mut names = Vec::with_capacity(proof.steps.len());
    for step in proof.steps {
        match step {
            ProofStep::Trait(id) => {
                let url = db.trait_url(id).ok_or(LogicError::MissingObject {
                    kind: "trait",
                    id,
                })?;
                names.push((db.trait_name(id, with_space)?, url));
            }
            ProofStep::Implication(id) => {
                names.push((db.implication_name(id)?, db.implication_url(id)));
            }
        }
    }
    Ok(names)
}

/// A node of the proof visualization graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProofNode {
    pub id: String,
    pub name: String,
    pub adjacencies: Vec<Adjacency>,
    pub data: ProofNodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Adjacency {
    #[serde(rename = "nodeTo")]
    pub node_to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProofNodeData {
    pub text: String,
    pub url: String,
}

/// Builds the full proof graph rooted at a trait: the trait itself plus,
/// recursively, every trait its automated proof assumed, with an edge
/// from each assumption to its consumer. Forward chaining only ever adds
/// traits depending on previously present ones, so the graph is a finite
/// DAG. Node ids are unique within one call.
pub fn get_full_proof(db: &Database, trait_id: TraitId) -> Result<Vec<ProofNode>, LogicError> {
    let mut node_count = 0usize;
    full_proof(db, trait_id, &mut node_count)
}

fn full_proof(
    db: &Database,
    trait_id: TraitId,
    node_count: &mut usize,
) -> Result<Vec<ProofNode>, LogicError> {
    // Every proof will include the node proved
    *node_count += 1;
    let node_id = format!("t{}_{}", trait_id, node_count);
    let url = db.trait_url(trait_id).ok_or(LogicError::MissingObject {
        kind: "trait",
        id: trait_id,
    })?;
    let mut data = vec![ProofNode {
        id: node_id.clone(),
        name: db.trait_name(trait_id, false)?,
        adjacencies: Vec::new(),
        data: ProofNodeData {
            text: String::new(),
            url,
        },
    }];

    // If the trait was automatically added, include the full proof of
    // each trait it needed to assume.
    match db.auto_proof(trait_id) {
        Some(proof) => {
            for assumed in proof.assumed_traits() {
                let mut sub = full_proof(db, assumed, node_count)?;
                sub[0].adjacencies = vec![Adjacency {
                    node_to: node_id.clone(),
                }];
                data.append(&mut sub);
            }
            data[0].data.text = render_html(db, &proof.encode(), false)?;
        }
        None => {
            data[0].data.text = db
                .description(ObjectRef::Trait(trait_id))
                .unwrap_or_default()
                .to_string();
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::Value;
    use crate::services::parser::human_to_formula;
    use crate::services::prover::Prover;
    use crate::services::store::Database;

    fn chained_fixture() -> (Database, TraitId, TraitId, TraitId) {
        let mut db = Database::new();
        let s = db.add_space("space");
        let a = db.add_property("A");
        let b = db.add_property("B");
        let c = db.add_property("C");
        let i1_ant = human_to_formula(&db, "~A").unwrap();
        let i1_cons = human_to_formula(&db, "B").unwrap();
        Prover::add_implication(&mut db, i1_ant, i1_cons, "").unwrap();
        let i2_ant = human_to_formula(&db, "B").unwrap();
        let i2_cons = human_to_formula(&db, "~C").unwrap();
        Prover::add_implication(&mut db, i2_ant, i2_cons, "").unwrap();
        let ta = Prover::add_trait(&mut db, s, a, Value::FALSE, "not A here").unwrap();
        let tb = db.get_trait(s, b).unwrap().id;
        let tc = db.get_trait(s, c).unwrap().id;
        (db, ta, tb, tc)
    }

    #[test]
    fn test_render_text() {
        let (db, ta, tb, _) = chained_fixture();
        let rendered = render_text(&db, &format!("t{},i1,", ta), true).unwrap();
        assert_eq!(rendered, "space: ~A, ~A ⇒ B");
        let no_space = render_text(&db, &format!("t{},i1,", tb), false).unwrap();
        assert_eq!(no_space, "B, ~A ⇒ B");
    }

    #[test]
    fn test_render_html_links_every_step() {
        let (db, ta, ..) = chained_fixture();
        let html = render_html(&db, &format!("t{},i1,", ta), true).unwrap();
        assert_eq!(
            html,
            "<a href=\"/spaces/space/properties/a\">space: ~A</a><br/>\
             <a href=\"/implications/1\">~A ⇒ B</a><br/>"
        );
    }

    #[test]
    fn test_render_rejects_dangling_references() {
        let (db, ..) = chained_fixture();
        assert!(matches!(
            render_text(&db, "t999,", true),
            Err(LogicError::MissingObject { .. })
        ));
    }

    #[test]
    fn test_full_proof_is_a_dag_rooted_at_the_trait() {
        let (db, ta, tb, tc) = chained_fixture();
        let nodes = get_full_proof(&db, tc).unwrap();

        // Nodes for ~C, B and ~A, in discovery order
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].name, "~C");
        assert_eq!(nodes[1].name, "B");
        assert_eq!(nodes[2].name, "~A");

        // Each assumption points at its consumer
        assert_eq!(nodes[1].adjacencies, vec![Adjacency { node_to: nodes[0].id.clone() }]);
        assert_eq!(nodes[2].adjacencies, vec![Adjacency { node_to: nodes[1].id.clone() }]);
        assert!(nodes[0].adjacencies.is_empty());

        // Node ids are unique within the call
        let mut ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        let _ = (ta, tb);
    }

    #[test]
    fn test_full_proof_of_user_trait_uses_description() {
        let (db, ta, ..) = chained_fixture();
        let nodes = get_full_proof(&db, ta).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].data.text, "not A here");
    }

    #[test]
    fn test_full_proof_body_of_derived_trait_is_rendered_html() {
        let (db, _, tb, _) = chained_fixture();
        let nodes = get_full_proof(&db, tb).unwrap();
        assert!(nodes[0].data.text.contains("<a href="));
        assert!(nodes[0].data.text.contains("~A ⇒ B"));
    }
}
