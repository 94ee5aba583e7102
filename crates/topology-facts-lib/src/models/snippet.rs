use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::core::{ImplicationId, PropertyId, SpaceId, TraitId};

/// The domain object a snippet is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum ObjectRef {
    Space(SpaceId),
    Property(PropertyId),
    Trait(TraitId),
    Implication(ImplicationId),
}

/// A snippet is a blob of text describing a particular object in the
/// database. Machine-generated proofs are stored as snippets whose
/// `proof_agent` names the procedure that produced them; user-entered
/// descriptions leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub id: Uuid,
    pub object: ObjectRef,
    pub text: String,
    pub proof_agent: String,
    pub created_at: DateTime<Utc>,
}

impl Snippet {
    pub const USER: &'static str = "user";

    /// A plain description with no proof semantics.
    pub fn description(object: ObjectRef, text: impl Into<String>) -> Self {
        Self::with_agent(object, text, String::new())
    }

    /// A proof snippet recording the agent that produced it.
    pub fn proof(object: ObjectRef, text: impl Into<String>, agent: impl Into<String>) -> Self {
        Self::with_agent(object, text, agent.into())
    }

    fn with_agent(object: ObjectRef, text: impl Into<String>, proof_agent: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            object,
            text: text.into(),
            proof_agent,
            created_at: Utc::now(),
        }
    }

    /// Determines whether this snippet represents a complete proof
    pub fn is_proof(&self) -> bool {
        !self.proof_agent.is_empty()
    }

    /// Whether the proof was produced by an automated agent rather than
    /// entered by hand.
    pub fn automatically_added(&self) -> bool {
        self.is_proof() && self.proof_agent != Self::USER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_is_not_a_proof() {
        let s = Snippet::description(ObjectRef::Space(1), "the Sorgenfrey line");
        assert!(!s.is_proof());
        assert!(!s.automatically_added());
    }

    #[test]
    fn test_user_proof_is_not_automatic() {
        let s = Snippet::proof(ObjectRef::Trait(3), "see Counterexamples #42", Snippet::USER);
        assert!(s.is_proof());
        assert!(!s.automatically_added());
    }

    #[test]
    fn test_agent_proof_is_automatic() {
        let s = Snippet::proof(ObjectRef::Trait(3), "t1,i2,", "prover");
        assert!(s.is_proof());
        assert!(s.automatically_added());
    }
}
