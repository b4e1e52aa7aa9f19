//! Genie SDK
//!
//! Shared data model and error types for the Genie meeting assistant.
//! The engine and anything embedding it speak in these types.

/// Error types and handling
pub mod errors;

/// Meeting, participant and retrieval fragment types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, GenieErrorExt};
pub use types::{Fragment, Meeting, MeetingError, Participant, SourceKind, TimeWindow};
