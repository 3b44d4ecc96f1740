//! Classroom session registry.
//!
//! Sessions are addressed by short numeric join codes issued by a
//! [`CodeAllocator`]. The [`SessionRegistry`] owns them for their lifetime:
//!
//! - **Creation** allocates a code that no held session uses, re-checked
//!   under the registry lock so concurrent creators never collide.
//! - **Participants** join and leave; the first join moves the session from
//!   waiting to active and the last leave moves it back.
//! - **Expiry** is lazy. A session past its TTL answers
//!   [`SessionError::Expired`] until [`SessionRegistry::cleanup_expired`] or
//!   the background reaper removes it.
//! - **Ending** a session is terminal and forces every participant offline.
//!
//! All time comes from an injected [`lectern_types::Clock`].

pub mod code;
pub mod config;
pub mod error;
pub mod registry;
pub mod session;

pub use code::CodeAllocator;
pub use config::RegistryConfig;
pub use error::{Result, SessionError};
pub use registry::{RegistryStats, SessionRegistry};
pub use session::{
    NewParticipant, ParticipantInfo, Question, Session, SessionOptions, SessionStatistics,
    SessionStatus, Vote,
};
