pub mod api;
pub mod consistency;
pub mod evaluator;
pub mod matcher;
pub mod parser;
pub mod prover;
pub mod render;
pub mod store;

pub use evaluator::{eval, verify_match, Valuation};
pub use matcher::spaces_matching;
pub use parser::{human_to_formula, parse_search, SearchQuery};
pub use prover::Prover;
pub use store::Database;
