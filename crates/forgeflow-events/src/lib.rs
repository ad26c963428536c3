//! The event envelope contract and the push-channel event sink.

pub mod envelope;
pub mod sink;

pub mod prelude {
    //! Convenience re-export of the most commonly used types.
    pub use crate::envelope::EventEnvelope;
    pub use crate::sink::{BroadcastEventSink, EventError, EventSink, NullEventSink};
}
