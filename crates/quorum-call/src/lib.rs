//! Voice call sessions driven by call-platform webhooks.
//!
//! [`CallRegistry`] owns every tracked [`CallSession`], applies normalized
//! platform events to them, and routes recognized speech through an
//! [`Answerer`].

pub mod acs;
pub mod control;
pub mod error;
pub mod registry;
pub mod session;

pub use acs::AcsCallControl;
pub use control::{normalize_acs_event, CallAction, CallControl, NormalizedEvent, UnconfiguredCallControl};
pub use error::CallError;
pub use registry::{Answerer, CallRegistry, CallSettings, EventOutcome, JoinOutcome, LeaveOutcome, RegistryStatus, WebhookAck};
pub use session::{CallEvent, CallSession, CallStatus, CallSummary, TranscriptEntry};
