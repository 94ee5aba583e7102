use serde::{Deserialize, Serialize};

use crate::errors::LogicError;
use crate::models::core::{ImplicationId, TraitId};

/// One reference in a proof: an assumed trait or the implication applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum ProofStep {
    Trait(TraitId),
    Implication(ImplicationId),
}

impl ProofStep {
    /// The persisted token for this step: `t<id>` or `i<id>`.
    pub fn token(&self) -> String {
        match self {
            ProofStep::Trait(id) => format!("t{}", id),
            ProofStep::Implication(id) => format!("i{}", id),
        }
    }
}

/// An ordered, immutable record of the assumptions behind a derived trait.
///
/// Persisted as a series of Traits or Implications formatted as
/// `t<id>,t<id>,i<id>,t<id>,...` with a trailing comma.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub steps: Vec<ProofStep>,
}

impl Proof {
    pub fn new(steps: Vec<ProofStep>) -> Self {
        Self { steps }
    }

    /// Encodes the proof in its persisted form (trailing comma included).
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&step.token());
            out.push(',');
        }
        out
    }

    /// Parses the persisted form back into steps. Tolerates a missing
    /// trailing comma but rejects malformed tokens.
    pub fn decode(string: &str) -> Result<Proof, LogicError> {
        let mut steps = Vec::new();
        for token in string.split(',') {
            if token.is_empty() {
                continue;
            }
            let parse_id = |id: &str| {
                id.parse::<u32>()
                    .map_err(|_| LogicError::Parse(format!("malformed proof token: {}", token)))
            };
            if let Some(id) = token.strip_prefix('t') {
                steps.push(ProofStep::Trait(parse_id(id)?));
            } else if let Some(id) = token.strip_prefix('i') {
                steps.push(ProofStep::Implication(parse_id(id)?));
            } else {
                return Err(LogicError::Parse(format!(
                    "malformed proof token: {}",
                    token
                )));
            }
        }
        Ok(Proof { steps })
    }

    /// The traits this proof assumes, in proof order.
    pub fn assumed_traits(&self) -> Vec<TraitId> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                ProofStep::Trait(id) => Some(*id),
                ProofStep::Implication(_) => None,
            })
            .collect()
    }

    /// The implications this proof applies, in proof order.
    pub fn implications(&self) -> Vec<ImplicationId> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                ProofStep::Implication(id) => Some(*id),
                ProofStep::Trait(_) => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Display for Proof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_has_trailing_comma() {
        let proof = Proof::new(vec![
            ProofStep::Trait(1),
            ProofStep::Trait(7),
            ProofStep::Implication(4),
        ]);
        assert_eq!(proof.encode(), "t1,t7,i4,");
    }

    #[test]
    fn test_decode_round_trip() {
        let proof = Proof::decode("t1,i4,t7,").unwrap();
        assert_eq!(
            proof.steps,
            vec![
                ProofStep::Trait(1),
                ProofStep::Implication(4),
                ProofStep::Trait(7)
            ]
        );
        assert_eq!(Proof::decode(&proof.encode()).unwrap(), proof);
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert!(matches!(Proof::decode("x1,"), Err(LogicError::Parse(_))));
        assert!(matches!(Proof::decode("tx,"), Err(LogicError::Parse(_))));
    }

    #[test]
    fn test_assumed_traits_and_implications() {
        let proof = Proof::decode("t1,t2,i4,t9,").unwrap();
        assert_eq!(proof.assumed_traits(), vec![1, 2, 9]);
        assert_eq!(proof.implications(), vec![4]);
    }

    #[test]
    fn test_empty_proof() {
        let proof = Proof::decode("").unwrap();
        assert!(proof.is_empty());
        assert_eq!(proof.encode(), "");
    }
}
