//! Semantic API discovery: corpus loading, a read-only vector index,
//! and LLM-ranked endpoint selection per requirement-record action.

pub mod corpus;
pub mod discovery;
pub mod error;
pub mod index;
pub mod loader;

pub mod prelude {
    //! Convenience re-export of the most commonly used types.
    pub use crate::corpus::{Corpus, CredentialGate};
    pub use crate::discovery::{DiscoveryReport, Discoverer, DEFAULT_SIMILARITY_FLOOR, DEFAULT_TOP_K};
    pub use crate::error::DiscoveryError;
    pub use crate::index::{ScoredCandidate, VectorIndex};
    pub use crate::loader::{default_corpus, load_from_path, load_from_str};
}
