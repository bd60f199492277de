pub mod dispatch;
pub mod extract;
pub mod model;
pub mod solver;
pub mod types;
pub mod validation;

pub use dispatch::*;
pub use extract::*;
pub use model::{build, ConstraintKind, LinearConstraint, LinearProgramModel, Relation};
pub use solver::*;
pub use types::*;
pub use validation::*;
