//! The DAG planner and data mapper: turning a requirement record's
//! discovered endpoints into an ordered, acyclic workflow graph, and
//! synthesizing the input-binding expression for each edge.

pub mod error;
pub mod mapper;
pub mod planner;

pub mod prelude {
    //! Convenience re-export of the most commonly used types.
    pub use crate::error::PlannerError;
    pub use crate::mapper::Mapper;
    pub use crate::planner::{PlanInput, Planner};
}
