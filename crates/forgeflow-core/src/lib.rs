//! The pipeline runner: wires every collaborator crate's stage seam
//! into the fourteen-stage state machine described by
//! [`transitions::allowed_transitions`], threading one [`forgeflow_types::pipeline_state::PipelineState`]
//! through conversation, discovery, planning, mapping, codegen,
//! security review, test scaffolding, sandbox execution, self-debug,
//! and deploy.

pub mod checkpoint;
pub mod config;
pub mod conversation;
pub mod deploy;
pub mod error;
pub mod runner;
pub mod secrets;
pub mod transitions;

pub mod prelude {
    //! Convenience re-export of the most commonly used types.
    pub use crate::checkpoint::{CheckpointError, CheckpointStore, InMemoryCheckpointStore};
    pub use crate::config::Config;
    pub use crate::conversation::{ConversationEngine, ConversationError};
    pub use crate::deploy::{DeployError, NullPackager, Packager};
    pub use crate::error::ForgeFlowError;
    pub use crate::runner::{
        CancellationToken, PipelineRunner, PipelineStage, RunnerDeps, RunnerError,
        DEFAULT_PIPELINE_TIMEOUT,
    };
    pub use crate::secrets::{
        EnvSecretResolver, NullSecretResolver, SecretError, SecretResolver, StaticSecretResolver,
    };
    pub use crate::transitions::{allowed_transitions, validate_transition, IllegalTransition};
}
