//! Static security review: a fixed-blacklist scanner over generated
//! artifact source text.

pub mod error;
pub mod scanner;
pub mod violation;

pub mod prelude {
    //! Convenience re-export of the most commonly used types.
    pub use crate::error::SecurityViolationError;
    pub use crate::scanner::Scanner;
    pub use crate::violation::{Category, Severity, Violation};
}
