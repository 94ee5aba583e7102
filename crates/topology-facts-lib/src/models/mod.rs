pub mod core;
pub mod formula;
pub mod implication;
pub mod proof;
pub mod snippet;

pub use self::core::*;
pub use formula::*;
pub use implication::*;
pub use proof::*;
pub use snippet::*;
