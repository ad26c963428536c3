//! Sandboxed execution of generated artifacts, and the self-debug
//! classify/patch cycle that runs against their failures.

pub mod debugger;
pub mod error;
pub mod executor;

pub mod prelude {
    //! Convenience re-export of the most commonly used types.
    pub use crate::debugger::SelfDebugger;
    pub use crate::error::{DebugError, SandboxError};
    pub use crate::executor::{ContainerBackend, InProcessValidator, SandboxBackend};
}
