pub mod allocation;
pub mod node;

pub use allocation::*;
pub use node::*;
