pub mod linear;
pub mod nlp;
pub mod nonlinear;
pub mod pareto;
pub mod sectoral;
pub mod types;

pub use linear::*;
pub use nonlinear::*;
pub use pareto::*;
pub use sectoral::*;
pub use types::*;
